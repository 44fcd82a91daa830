use sqlx::{Pool, Sqlite, SqliteConnection};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::{Challenge, ChallengeData, DbChallenge, TaskData};

use super::create_task_in;

const CHALLENGE_SELECT: &str = "SELECT id, user_id, task_id, start_date, minimum_number_of_days,
            minimum_number_of_repetitions, minimum_total_repetitions,
            are_requirements_fulfilled, is_completed, created_at
     FROM challenges";

async fn create_challenge_in(
    conn: &mut SqliteConnection,
    user_id: i64,
    task_id: i64,
    data: &ChallengeData,
) -> Result<i64, AppError> {
    let res = sqlx::query(
        "INSERT INTO challenges (user_id, task_id, start_date, minimum_number_of_days,
                minimum_number_of_repetitions, minimum_total_repetitions, is_completed)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(task_id)
    .bind(data.start_date)
    .bind(data.minimum_number_of_days)
    .bind(data.minimum_number_of_repetitions)
    .bind(data.minimum_total_repetitions)
    .bind(data.is_completed)
    .execute(&mut *conn)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool))]
pub async fn get_challenges(pool: &Pool<Sqlite>, user_id: i64) -> Result<Vec<Challenge>, AppError> {
    info!("Fetching challenges of user");
    let rows = sqlx::query_as::<_, DbChallenge>(&format!(
        "{} WHERE user_id = ? ORDER BY created_at DESC, id DESC",
        CHALLENGE_SELECT
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Challenge::from).collect())
}

#[instrument(skip(pool))]
pub async fn get_challenge(
    pool: &Pool<Sqlite>,
    user_id: i64,
    challenge_id: i64,
) -> Result<Challenge, AppError> {
    info!("Fetching challenge");
    let row = sqlx::query_as::<_, DbChallenge>(&format!(
        "{} WHERE id = ? AND user_id = ?",
        CHALLENGE_SELECT
    ))
    .bind(challenge_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(Challenge::from(row)),
        _ => Err(AppError::not_found("Challenge", challenge_id)),
    }
}

/// Attaches a challenge to an existing task of `user_id`.
#[instrument(skip(pool))]
pub async fn create_challenge(
    pool: &Pool<Sqlite>,
    user_id: i64,
    task_id: i64,
    data: &ChallengeData,
) -> Result<i64, AppError> {
    info!("Creating challenge for existing task");
    let mut tx = pool.begin().await?;

    let owned: Option<i64> = sqlx::query_scalar("SELECT id FROM tasks WHERE id = ? AND user_id = ?")
        .bind(task_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
    if owned.is_none() {
        return Err(AppError::not_found("Task", task_id));
    }

    let challenge_id = create_challenge_in(&mut tx, user_id, task_id, data).await?;

    tx.commit().await?;
    Ok(challenge_id)
}

/// Creates the task and its challenge together. Returns `(task_id, challenge_id)`.
#[instrument(skip(pool))]
pub async fn create_challenge_with_task(
    pool: &Pool<Sqlite>,
    user_id: i64,
    task: &TaskData,
    data: &ChallengeData,
) -> Result<(i64, i64), AppError> {
    info!("Creating challenge with new task");
    let mut tx = pool.begin().await?;

    let task_id = create_task_in(&mut tx, user_id, task).await?;
    let challenge_id = create_challenge_in(&mut tx, user_id, task_id, data).await?;

    tx.commit().await?;
    Ok((task_id, challenge_id))
}

/// Updates the thresholds. `complete` can only raise `is_completed`.
#[instrument(skip(pool))]
pub async fn update_challenge(
    pool: &Pool<Sqlite>,
    user_id: i64,
    challenge_id: i64,
    data: &ChallengeData,
    complete: bool,
) -> Result<(), AppError> {
    info!("Updating challenge");
    let res = sqlx::query(
        "UPDATE challenges SET start_date = ?, minimum_number_of_days = ?,
                minimum_number_of_repetitions = ?, minimum_total_repetitions = ?,
                is_completed = (is_completed OR ?)
         WHERE id = ? AND user_id = ?",
    )
    .bind(data.start_date)
    .bind(data.minimum_number_of_days)
    .bind(data.minimum_number_of_repetitions)
    .bind(data.minimum_total_repetitions)
    .bind(complete)
    .bind(challenge_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::not_found("Challenge", challenge_id));
    }

    Ok(())
}

#[instrument(skip(pool))]
pub async fn delete_challenge(
    pool: &Pool<Sqlite>,
    user_id: i64,
    challenge_id: i64,
) -> Result<(), AppError> {
    info!("Deleting challenge");
    let res = sqlx::query("DELETE FROM challenges WHERE id = ? AND user_id = ?")
        .bind(challenge_id)
        .bind(user_id)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::not_found("Challenge", challenge_id));
    }

    Ok(())
}

#[instrument(skip(pool))]
pub async fn set_requirements_fulfilled(
    pool: &Pool<Sqlite>,
    challenge_id: i64,
) -> Result<(), AppError> {
    info!("Recording fulfilled challenge requirements");
    sqlx::query("UPDATE challenges SET are_requirements_fulfilled = TRUE WHERE id = ?")
        .bind(challenge_id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn mark_challenge_completed(
    pool: &Pool<Sqlite>,
    challenge_id: i64,
) -> Result<(), AppError> {
    info!("Marking challenge completed");
    sqlx::query("UPDATE challenges SET is_completed = TRUE WHERE id = ?")
        .bind(challenge_id)
        .execute(pool)
        .await?;

    Ok(())
}
