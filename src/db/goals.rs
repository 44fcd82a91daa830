use chrono::NaiveDate;
use sqlx::{Pool, Sqlite, SqliteConnection};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::{DbGoal, Goal, GoalData};

const GOAL_SELECT: &str =
    "SELECT id, user_id, name, piece, date, time, is_concluded, additional_info FROM goals";

async fn goal_piece_ids(pool: &Pool<Sqlite>, goal_id: i64) -> Result<Vec<i64>, AppError> {
    let ids: Vec<i64> =
        sqlx::query_scalar("SELECT piece_id FROM goal_pieces WHERE goal_id = ? ORDER BY piece_id")
            .bind(goal_id)
            .fetch_all(pool)
            .await?;

    Ok(ids)
}

async fn with_pieces(pool: &Pool<Sqlite>, rows: Vec<DbGoal>) -> Result<Vec<Goal>, AppError> {
    let mut goals = Vec::with_capacity(rows.len());
    for row in rows {
        let mut goal = Goal::from(row);
        goal.piece_ids = goal_piece_ids(pool, goal.id).await?;
        goals.push(goal);
    }
    Ok(goals)
}

async fn set_goal_pieces_in(
    conn: &mut SqliteConnection,
    goal_id: i64,
    piece_ids: &[i64],
) -> Result<(), AppError> {
    sqlx::query("DELETE FROM goal_pieces WHERE goal_id = ?")
        .bind(goal_id)
        .execute(&mut *conn)
        .await?;

    for piece_id in piece_ids {
        sqlx::query("INSERT OR IGNORE INTO goal_pieces (goal_id, piece_id) VALUES (?, ?)")
            .bind(goal_id)
            .bind(piece_id)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

#[instrument(skip(pool))]
pub async fn get_goals(pool: &Pool<Sqlite>, user_id: i64) -> Result<Vec<Goal>, AppError> {
    info!("Fetching goals of user");
    let rows = sqlx::query_as::<_, DbGoal>(&format!(
        "{} WHERE user_id = ? ORDER BY date IS NULL, date, time, id",
        GOAL_SELECT
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    with_pieces(pool, rows).await
}

#[instrument(skip(pool))]
pub async fn get_goal(pool: &Pool<Sqlite>, user_id: i64, goal_id: i64) -> Result<Goal, AppError> {
    info!("Fetching goal");
    let row = sqlx::query_as::<_, DbGoal>(&format!("{} WHERE id = ? AND user_id = ?", GOAL_SELECT))
        .bind(goal_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => {
            let mut goal = Goal::from(row);
            goal.piece_ids = goal_piece_ids(pool, goal.id).await?;
            Ok(goal)
        }
        _ => Err(AppError::not_found("Goal", goal_id)),
    }
}

/// Goals dated within `[from, to]`, both ends inclusive.
#[instrument(skip(pool))]
pub async fn get_goals_between(
    pool: &Pool<Sqlite>,
    user_id: i64,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<Goal>, AppError> {
    info!("Fetching goals in date range");
    let rows = sqlx::query_as::<_, DbGoal>(&format!(
        "{} WHERE user_id = ? AND date >= ? AND date <= ? ORDER BY date, time, id",
        GOAL_SELECT
    ))
    .bind(user_id)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await?;

    with_pieces(pool, rows).await
}

#[instrument(skip(pool))]
pub async fn create_goal(
    pool: &Pool<Sqlite>,
    user_id: i64,
    data: &GoalData,
) -> Result<i64, AppError> {
    info!("Creating goal");
    let mut tx = pool.begin().await?;

    let res = sqlx::query(
        "INSERT INTO goals (user_id, name, piece, date, time, is_concluded, additional_info)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(&data.name)
    .bind(&data.piece)
    .bind(data.date)
    .bind(data.time)
    .bind(data.is_concluded)
    .bind(&data.additional_info)
    .execute(&mut *tx)
    .await?;

    let goal_id = res.last_insert_rowid();
    set_goal_pieces_in(&mut tx, goal_id, &data.piece_ids).await?;

    tx.commit().await?;
    Ok(goal_id)
}

#[instrument(skip(pool))]
pub async fn update_goal(
    pool: &Pool<Sqlite>,
    user_id: i64,
    goal_id: i64,
    data: &GoalData,
) -> Result<(), AppError> {
    info!("Updating goal");
    let mut tx = pool.begin().await?;

    let res = sqlx::query(
        "UPDATE goals
         SET name = ?, piece = ?, date = ?, time = ?, is_concluded = ?, additional_info = ?
         WHERE id = ? AND user_id = ?",
    )
    .bind(&data.name)
    .bind(&data.piece)
    .bind(data.date)
    .bind(data.time)
    .bind(data.is_concluded)
    .bind(&data.additional_info)
    .bind(goal_id)
    .bind(user_id)
    .execute(&mut *tx)
    .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::not_found("Goal", goal_id));
    }

    set_goal_pieces_in(&mut tx, goal_id, &data.piece_ids).await?;

    tx.commit().await?;
    Ok(())
}

#[instrument(skip(pool))]
pub async fn delete_goal(pool: &Pool<Sqlite>, user_id: i64, goal_id: i64) -> Result<(), AppError> {
    info!("Deleting goal");
    let res = sqlx::query("DELETE FROM goals WHERE id = ? AND user_id = ?")
        .bind(goal_id)
        .bind(user_id)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::not_found("Goal", goal_id));
    }

    Ok(())
}
