use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite, SqliteConnection};
use tracing::{info, instrument};

use crate::auth::{ProfileRole, User};
use crate::error::AppError;

/// A pending invitation as seen by the account that received it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, sqlx::FromRow)]
pub struct ReceivedInvitation {
    pub username: String,
    pub invited_by: String,
}

#[instrument(skip(conn))]
pub async fn ensure_profile_in(
    conn: &mut SqliteConnection,
    user_id: i64,
    role: ProfileRole,
) -> Result<i64, AppError> {
    sqlx::query(&format!(
        "INSERT INTO {} (user_id) VALUES (?) ON CONFLICT(user_id) DO NOTHING",
        role.table()
    ))
    .bind(user_id)
    .execute(&mut *conn)
    .await?;

    let id: i64 = sqlx::query_scalar(&format!("SELECT id FROM {} WHERE user_id = ?", role.table()))
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;

    Ok(id)
}

/// Get-or-create of the `role` profile of a user. Returns the profile id.
#[instrument(skip(pool))]
pub async fn ensure_profile(
    pool: &Pool<Sqlite>,
    user_id: i64,
    role: ProfileRole,
) -> Result<i64, AppError> {
    info!("Ensuring profile exists");
    let mut conn = pool.acquire().await?;
    ensure_profile_in(&mut conn, user_id, role).await
}

#[instrument(skip(pool))]
pub async fn is_linked(
    pool: &Pool<Sqlite>,
    teacher_id: i64,
    student_id: i64,
) -> Result<bool, AppError> {
    let mut conn = pool.acquire().await?;
    is_linked_in(&mut conn, teacher_id, student_id).await
}

pub async fn is_linked_in(
    conn: &mut SqliteConnection,
    teacher_id: i64,
    student_id: i64,
) -> Result<bool, AppError> {
    let found: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM teacher_students WHERE teacher_id = ? AND student_id = ?",
    )
    .bind(teacher_id)
    .bind(student_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(found.is_some())
}

#[instrument(skip(conn))]
pub async fn link_in(
    conn: &mut SqliteConnection,
    teacher_id: i64,
    student_id: i64,
) -> Result<(), AppError> {
    info!("Linking teacher and student");
    sqlx::query(
        "INSERT INTO teacher_students (teacher_id, student_id) VALUES (?, ?)
         ON CONFLICT(teacher_id, student_id) DO NOTHING",
    )
    .bind(teacher_id)
    .bind(student_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[instrument(skip(conn))]
pub async fn add_invitation_in(
    conn: &mut SqliteConnection,
    student_id: i64,
    teacher_id: i64,
    invited_by: ProfileRole,
) -> Result<(), AppError> {
    info!("Recording invitation");
    sqlx::query(
        "INSERT INTO invitations (student_id, teacher_id, invited_by) VALUES (?, ?, ?)
         ON CONFLICT(student_id, teacher_id, invited_by) DO NOTHING",
    )
    .bind(student_id)
    .bind(teacher_id)
    .bind(invited_by.as_str())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn has_invitation(
    pool: &Pool<Sqlite>,
    student_id: i64,
    teacher_id: i64,
    invited_by: ProfileRole,
) -> Result<bool, AppError> {
    let found: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM invitations WHERE student_id = ? AND teacher_id = ? AND invited_by = ?",
    )
    .bind(student_id)
    .bind(teacher_id)
    .bind(invited_by.as_str())
    .fetch_optional(pool)
    .await?;

    Ok(found.is_some())
}

/// Drops every pending invitation between the two profiles, whichever side
/// sent it.
#[instrument(skip(conn))]
pub async fn clear_invitations_in(
    conn: &mut SqliteConnection,
    student_id: i64,
    teacher_id: i64,
) -> Result<u64, AppError> {
    info!("Clearing invitations between profiles");
    let result = sqlx::query("DELETE FROM invitations WHERE student_id = ? AND teacher_id = ?")
        .bind(student_id)
        .bind(teacher_id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected())
}

/// Teachers who invited `user` as their student.
#[instrument(skip(pool, user), fields(username = %user.username))]
pub async fn get_teacher_invitations(
    pool: &Pool<Sqlite>,
    user: &User,
) -> Result<Vec<ReceivedInvitation>, AppError> {
    let Some(student_id) = user.student_id else {
        return Ok(Vec::new());
    };

    let rows = sqlx::query_as::<_, ReceivedInvitation>(
        "SELECT u.username, i.invited_by
         FROM invitations i
         JOIN teachers t ON t.id = i.teacher_id
         JOIN users u ON u.id = t.user_id
         WHERE i.student_id = ? AND i.invited_by = 'teacher'
         ORDER BY i.created_at",
    )
    .bind(student_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Students who invited `user` as their teacher.
#[instrument(skip(pool, user), fields(username = %user.username))]
pub async fn get_student_invitations(
    pool: &Pool<Sqlite>,
    user: &User,
) -> Result<Vec<ReceivedInvitation>, AppError> {
    let Some(teacher_id) = user.teacher_id else {
        return Ok(Vec::new());
    };

    let rows = sqlx::query_as::<_, ReceivedInvitation>(
        "SELECT u.username, i.invited_by
         FROM invitations i
         JOIN students s ON s.id = i.student_id
         JOIN users u ON u.id = s.user_id
         WHERE i.teacher_id = ? AND i.invited_by = 'student'
         ORDER BY i.created_at",
    )
    .bind(teacher_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
