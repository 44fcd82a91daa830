use chrono::NaiveDate;
use sqlx::{Pool, Sqlite, SqliteConnection};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::{DbTask, Part, Practice, PracticeData, Task, TaskData};

const TASK_SELECT: &str = "SELECT t.id, t.user_id, t.goal_id, t.piece_id,
            COALESCE(NULLIF(g.name, ''), g.piece) AS goal_name,
            p.name_to_display AS piece_name,
            t.element, t.method, t.is_suggested, t.are_suggestions_enabled,
            t.was_practiced, t.created_at
     FROM tasks t
     LEFT JOIN goals g ON g.id = t.goal_id
     LEFT JOIN pieces p ON p.id = t.piece_id";

const PRACTICE_SELECT: &str = "SELECT pr.id, pr.task_id, pr.date, pr.start_time, pr.end_time,
            pr.repetitions, pr.is_summarized, pr.is_completed
     FROM practices pr";

async fn with_parts(pool: &Pool<Sqlite>, rows: Vec<DbTask>) -> Result<Vec<Task>, AppError> {
    let mut tasks = Vec::with_capacity(rows.len());
    for row in rows {
        let mut task = Task::from(row);
        task.part_ids =
            sqlx::query_scalar("SELECT part_id FROM task_parts WHERE task_id = ? ORDER BY part_id")
                .bind(task.id)
                .fetch_all(pool)
                .await?;
        tasks.push(task);
    }
    Ok(tasks)
}

async fn set_task_parts_in(
    conn: &mut SqliteConnection,
    task_id: i64,
    part_ids: &[i64],
) -> Result<(), AppError> {
    sqlx::query("DELETE FROM task_parts WHERE task_id = ?")
        .bind(task_id)
        .execute(&mut *conn)
        .await?;

    for part_id in part_ids {
        sqlx::query("INSERT OR IGNORE INTO task_parts (task_id, part_id) VALUES (?, ?)")
            .bind(task_id)
            .bind(part_id)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

#[instrument(skip(pool))]
pub async fn get_parts(pool: &Pool<Sqlite>, user_id: i64) -> Result<Vec<Part>, AppError> {
    info!("Fetching parts of user");
    let rows = sqlx::query_as::<_, Part>(
        "SELECT id, user_id, name FROM parts WHERE user_id = ? ORDER BY name",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[instrument(skip(pool))]
pub async fn create_part(pool: &Pool<Sqlite>, user_id: i64, name: &str) -> Result<i64, AppError> {
    info!("Creating part");
    let res = sqlx::query("INSERT INTO parts (user_id, name) VALUES (?, ?)")
        .bind(user_id)
        .bind(name)
        .execute(pool)
        .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool))]
pub async fn get_tasks(pool: &Pool<Sqlite>, user_id: i64) -> Result<Vec<Task>, AppError> {
    info!("Fetching tasks of user");
    let rows = sqlx::query_as::<_, DbTask>(&format!(
        "{} WHERE t.user_id = ? ORDER BY t.created_at DESC, t.id DESC",
        TASK_SELECT
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    with_parts(pool, rows).await
}

#[instrument(skip(pool))]
pub async fn get_suggested_tasks(pool: &Pool<Sqlite>, user_id: i64) -> Result<Vec<Task>, AppError> {
    info!("Fetching suggested tasks of user");
    let rows = sqlx::query_as::<_, DbTask>(&format!(
        "{} WHERE t.user_id = ? AND t.are_suggestions_enabled = TRUE AND t.is_suggested = TRUE
         ORDER BY t.id",
        TASK_SELECT
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    with_parts(pool, rows).await
}

/// Every task, across all users, that opted in to suggestions.
#[instrument(skip(pool))]
pub async fn get_tasks_with_suggestions_enabled(
    pool: &Pool<Sqlite>,
) -> Result<Vec<Task>, AppError> {
    info!("Fetching tasks with suggestions enabled");
    let rows = sqlx::query_as::<_, DbTask>(&format!(
        "{} WHERE t.are_suggestions_enabled = TRUE ORDER BY t.user_id, t.id",
        TASK_SELECT
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Task::from).collect())
}

#[instrument(skip(pool))]
pub async fn get_task(pool: &Pool<Sqlite>, user_id: i64, task_id: i64) -> Result<Task, AppError> {
    info!("Fetching task");
    let row = sqlx::query_as::<_, DbTask>(&format!(
        "{} WHERE t.id = ? AND t.user_id = ?",
        TASK_SELECT
    ))
    .bind(task_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let mut tasks = with_parts(pool, vec![row]).await?;
            tasks
                .pop()
                .ok_or_else(|| AppError::not_found("Task", task_id))
        }
        _ => Err(AppError::not_found("Task", task_id)),
    }
}

pub(crate) async fn create_task_in(
    conn: &mut SqliteConnection,
    user_id: i64,
    data: &TaskData,
) -> Result<i64, AppError> {
    let res = sqlx::query(
        "INSERT INTO tasks
            (user_id, goal_id, piece_id, element, method, is_suggested, are_suggestions_enabled)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(data.goal_id)
    .bind(data.piece_id)
    .bind(&data.element)
    .bind(&data.method)
    .bind(data.is_suggested)
    .bind(data.are_suggestions_enabled)
    .execute(&mut *conn)
    .await?;

    let task_id = res.last_insert_rowid();
    set_task_parts_in(conn, task_id, &data.part_ids).await?;

    Ok(task_id)
}

async fn create_practice_in(
    conn: &mut SqliteConnection,
    task_id: i64,
    data: &PracticeData,
) -> Result<i64, AppError> {
    let res = sqlx::query(
        "INSERT INTO practices
            (task_id, date, start_time, end_time, repetitions, is_summarized, is_completed)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(task_id)
    .bind(data.date)
    .bind(data.start_time)
    .bind(data.end_time)
    .bind(data.repetitions)
    .bind(data.is_summarized)
    .bind(data.is_completed)
    .execute(&mut *conn)
    .await?;

    sqlx::query("UPDATE tasks SET was_practiced = TRUE WHERE id = ?")
        .bind(task_id)
        .execute(&mut *conn)
        .await?;

    Ok(res.last_insert_rowid())
}

/// Creates a task, optionally together with its first practice.
#[instrument(skip(pool))]
pub async fn create_task(
    pool: &Pool<Sqlite>,
    user_id: i64,
    data: &TaskData,
    practice: Option<&PracticeData>,
) -> Result<i64, AppError> {
    info!("Creating task");
    let mut tx = pool.begin().await?;

    let task_id = create_task_in(&mut tx, user_id, data).await?;
    if let Some(practice) = practice {
        create_practice_in(&mut tx, task_id, practice).await?;
    }

    tx.commit().await?;
    Ok(task_id)
}

#[instrument(skip(pool))]
pub async fn update_task(
    pool: &Pool<Sqlite>,
    user_id: i64,
    task_id: i64,
    data: &TaskData,
) -> Result<(), AppError> {
    info!("Updating task");
    let mut tx = pool.begin().await?;

    let res = sqlx::query(
        "UPDATE tasks SET goal_id = ?, piece_id = ?, element = ?, method = ?, is_suggested = ?,
                are_suggestions_enabled = ?
         WHERE id = ? AND user_id = ?",
    )
    .bind(data.goal_id)
    .bind(data.piece_id)
    .bind(&data.element)
    .bind(&data.method)
    .bind(data.is_suggested)
    .bind(data.are_suggestions_enabled)
    .bind(task_id)
    .bind(user_id)
    .execute(&mut *tx)
    .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::not_found("Task", task_id));
    }

    set_task_parts_in(&mut tx, task_id, &data.part_ids).await?;

    tx.commit().await?;
    Ok(())
}

/// Deletes a task. Its practices, challenges and part links go with it.
#[instrument(skip(pool))]
pub async fn delete_task(pool: &Pool<Sqlite>, user_id: i64, task_id: i64) -> Result<(), AppError> {
    info!("Deleting task");
    let res = sqlx::query("DELETE FROM tasks WHERE id = ? AND user_id = ?")
        .bind(task_id)
        .bind(user_id)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::not_found("Task", task_id));
    }

    Ok(())
}

#[instrument(skip(pool))]
pub async fn set_task_suggested(
    pool: &Pool<Sqlite>,
    task_id: i64,
    is_suggested: bool,
) -> Result<(), AppError> {
    info!("Setting task suggestion flag");
    sqlx::query("UPDATE tasks SET is_suggested = ? WHERE id = ?")
        .bind(is_suggested)
        .bind(task_id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn get_practices_for_task(
    pool: &Pool<Sqlite>,
    task_id: i64,
) -> Result<Vec<Practice>, AppError> {
    info!("Fetching practices of task");
    let rows = sqlx::query_as::<_, Practice>(&format!(
        "{} WHERE pr.task_id = ? ORDER BY pr.date, pr.start_time, pr.id",
        PRACTICE_SELECT
    ))
    .bind(task_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Practices of all tasks of `user_id` within `[from, to]`.
#[instrument(skip(pool))]
pub async fn get_practices_between(
    pool: &Pool<Sqlite>,
    user_id: i64,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<Practice>, AppError> {
    info!("Fetching practices in date range");
    let rows = sqlx::query_as::<_, Practice>(&format!(
        "{} JOIN tasks t ON t.id = pr.task_id
         WHERE t.user_id = ? AND pr.date >= ? AND pr.date <= ?
         ORDER BY pr.date, pr.start_time, pr.id",
        PRACTICE_SELECT
    ))
    .bind(user_id)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Earliest and latest practice dates of a task, if it was ever practised.
#[instrument(skip(pool))]
pub async fn get_practice_date_range(
    pool: &Pool<Sqlite>,
    task_id: i64,
) -> Result<Option<(NaiveDate, NaiveDate)>, AppError> {
    let (first, last): (Option<NaiveDate>, Option<NaiveDate>) =
        sqlx::query_as("SELECT MIN(date), MAX(date) FROM practices WHERE task_id = ?")
            .bind(task_id)
            .fetch_one(pool)
            .await?;

    Ok(first.zip(last))
}

#[instrument(skip(pool))]
pub async fn get_practice(
    pool: &Pool<Sqlite>,
    user_id: i64,
    practice_id: i64,
) -> Result<Practice, AppError> {
    info!("Fetching practice");
    let row = sqlx::query_as::<_, Practice>(&format!(
        "{} JOIN tasks t ON t.id = pr.task_id WHERE pr.id = ? AND t.user_id = ?",
        PRACTICE_SELECT
    ))
    .bind(practice_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    row.ok_or_else(|| AppError::not_found("Practice", practice_id))
}

/// Records a practice of a task owned by `user_id` and marks the task as
/// practised.
#[instrument(skip(pool))]
pub async fn create_practice(
    pool: &Pool<Sqlite>,
    user_id: i64,
    task_id: i64,
    data: &PracticeData,
) -> Result<i64, AppError> {
    info!("Creating practice");
    let mut tx = pool.begin().await?;

    let owned: Option<i64> = sqlx::query_scalar("SELECT id FROM tasks WHERE id = ? AND user_id = ?")
        .bind(task_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
    if owned.is_none() {
        return Err(AppError::not_found("Task", task_id));
    }

    let practice_id = create_practice_in(&mut tx, task_id, data).await?;

    tx.commit().await?;
    Ok(practice_id)
}

#[instrument(skip(pool))]
pub async fn update_practice(
    pool: &Pool<Sqlite>,
    user_id: i64,
    practice_id: i64,
    data: &PracticeData,
) -> Result<(), AppError> {
    info!("Updating practice");
    let res = sqlx::query(
        "UPDATE practices SET date = ?, start_time = ?, end_time = ?, repetitions = ?,
                is_summarized = ?, is_completed = ?
         WHERE id = ? AND task_id IN (SELECT id FROM tasks WHERE user_id = ?)",
    )
    .bind(data.date)
    .bind(data.start_time)
    .bind(data.end_time)
    .bind(data.repetitions)
    .bind(data.is_summarized)
    .bind(data.is_completed)
    .bind(practice_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::not_found("Practice", practice_id));
    }

    Ok(())
}

#[instrument(skip(pool))]
pub async fn delete_practice(
    pool: &Pool<Sqlite>,
    user_id: i64,
    practice_id: i64,
) -> Result<(), AppError> {
    info!("Deleting practice");
    let res = sqlx::query(
        "DELETE FROM practices
         WHERE id = ? AND task_id IN (SELECT id FROM tasks WHERE user_id = ?)",
    )
    .bind(practice_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::not_found("Practice", practice_id));
    }

    Ok(())
}
