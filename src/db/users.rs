use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::auth::{DbUser, User};
use crate::error::AppError;

const USER_SELECT: &str = "SELECT u.id, u.username, u.email, u.first_name, u.last_name,
            s.id AS student_id, t.id AS teacher_id
     FROM users u
     LEFT JOIN students s ON s.user_id = u.id
     LEFT JOIN teachers t ON t.user_id = u.id";

#[instrument]
pub async fn get_user(pool: &Pool<Sqlite>, id: i64) -> Result<User, AppError> {
    info!("Fetching user by ID");
    let row = sqlx::query_as::<_, DbUser>(&format!("{} WHERE u.id = ?", USER_SELECT))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(user) => Ok(User::from(user)),
        _ => Err(AppError::not_found("User", id)),
    }
}

#[instrument]
pub async fn find_user_by_username(
    pool: &Pool<Sqlite>,
    username: &str,
) -> Result<Option<User>, AppError> {
    info!("Finding user by username");
    let row = sqlx::query_as::<_, DbUser>(&format!("{} WHERE u.username = ?", USER_SELECT))
        .bind(username)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(User::from))
}

#[instrument]
pub async fn get_user_by_username(pool: &Pool<Sqlite>, username: &str) -> Result<User, AppError> {
    match find_user_by_username(pool, username).await? {
        Some(user) => Ok(user),
        _ => Err(AppError::not_found("User", username)),
    }
}

#[instrument(skip_all, fields(username))]
pub async fn create_user(
    pool: &Pool<Sqlite>,
    username: &str,
    password: &str,
    email: Option<&str>,
) -> Result<i64, AppError> {
    info!("Creating new user");

    let existing_user: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?;

    if existing_user.is_some() {
        return Err(AppError::Validation(format!(
            "Username '{}' already exists",
            username
        )));
    }

    let hashed_password = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;

    let res = sqlx::query("INSERT INTO users (username, password, email) VALUES (?, ?, ?)")
        .bind(username)
        .bind(hashed_password)
        .bind(email)
        .execute(pool)
        .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip_all, fields(username))]
pub async fn authenticate_user(
    pool: &Pool<Sqlite>,
    username: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    info!("Authenticating user");
    let stored: Option<(i64, String)> =
        sqlx::query_as("SELECT id, password FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(pool)
            .await?;

    match stored {
        Some((id, hash)) => match bcrypt::verify(password, &hash) {
            Ok(true) => Ok(Some(get_user(pool, id).await?)),
            _ => Ok(None),
        },
        _ => Ok(None),
    }
}

#[instrument]
pub async fn update_user_details(
    pool: &Pool<Sqlite>,
    user_id: i64,
    first_name: &str,
    last_name: &str,
    email: Option<&str>,
) -> Result<(), AppError> {
    info!("Updating user details");
    sqlx::query("UPDATE users SET first_name = ?, last_name = ?, email = ? WHERE id = ?")
        .bind(first_name)
        .bind(last_name)
        .bind(email)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument]
pub async fn get_linked_students(
    pool: &Pool<Sqlite>,
    teacher_id: i64,
) -> Result<Vec<User>, AppError> {
    info!("Getting confirmed students of teacher");
    let rows = sqlx::query_as::<_, DbUser>(&format!(
        "{} JOIN teacher_students ts ON ts.student_id = s.id
         WHERE ts.teacher_id = ?
         ORDER BY u.username",
        USER_SELECT
    ))
    .bind(teacher_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(User::from).collect())
}

#[instrument]
pub async fn get_linked_teachers(
    pool: &Pool<Sqlite>,
    student_id: i64,
) -> Result<Vec<User>, AppError> {
    info!("Getting confirmed teachers of student");
    let rows = sqlx::query_as::<_, DbUser>(&format!(
        "{} JOIN teacher_students ts ON ts.teacher_id = t.id
         WHERE ts.student_id = ?
         ORDER BY u.username",
        USER_SELECT
    ))
    .bind(student_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(User::from).collect())
}
