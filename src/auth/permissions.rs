use serde::Serialize;
use sqlx::{Pool, Sqlite};
use std::fmt;
use tracing::instrument;

use crate::db::{get_user_by_username, is_linked};
use crate::error::AppError;

use super::User;

/// The two profiles an account can hold. An invitation carries the role the
/// inviting account takes; the invited account gets the other one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileRole {
    Student,
    Teacher,
}

impl ProfileRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileRole::Student => "student",
            ProfileRole::Teacher => "teacher",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, AppError> {
        match s {
            "student" => Ok(ProfileRole::Student),
            "teacher" => Ok(ProfileRole::Teacher),
            _ => Err(AppError::Validation(
                "Form tampered. Please do not do this.".to_string(),
            )),
        }
    }

    pub fn complement(&self) -> Self {
        match self {
            ProfileRole::Student => ProfileRole::Teacher,
            ProfileRole::Teacher => ProfileRole::Student,
        }
    }

    pub(crate) fn table(&self) -> &'static str {
        match self {
            ProfileRole::Student => "students",
            ProfileRole::Teacher => "teachers",
        }
    }
}

impl fmt::Display for ProfileRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Who may reach a resource that lives under `/<username>/...`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Owner,
    OwnerOrTeacher,
    Teacher,
    OwnerOrTeacherNotStudent,
}

/// True when `teacher` holds a teacher profile whose confirmed students
/// include the student profile of `student`.
#[instrument(skip(pool), fields(teacher = %teacher.username, student = %student.username))]
pub async fn teaches(
    pool: &Pool<Sqlite>,
    teacher: &User,
    student: &User,
) -> Result<bool, AppError> {
    if teacher.id == student.id {
        return Ok(false);
    }

    match (teacher.teacher_id, student.student_id) {
        (Some(teacher_id), Some(student_id)) => is_linked(pool, teacher_id, student_id).await,
        _ => Ok(false),
    }
}

pub async fn is_owner(pool: &Pool<Sqlite>, user: &User, username: &str) -> Result<bool, AppError> {
    let owner = get_user_by_username(pool, username).await?;
    Ok(user.id == owner.id)
}

/// Is `user` a confirmed teacher of the account named `username`.
pub async fn is_teacher(
    pool: &Pool<Sqlite>,
    user: &User,
    username: &str,
) -> Result<bool, AppError> {
    let owner = get_user_by_username(pool, username).await?;
    teaches(pool, user, &owner).await
}

/// Is `user` a confirmed student of the teacher named `username`.
pub async fn is_student(
    pool: &Pool<Sqlite>,
    user: &User,
    username: &str,
) -> Result<bool, AppError> {
    let owner = get_user_by_username(pool, username).await?;
    teaches(pool, &owner, user).await
}

pub async fn is_owner_or_is_teacher(
    pool: &Pool<Sqlite>,
    user: &User,
    username: &str,
) -> Result<bool, AppError> {
    let owner = get_user_by_username(pool, username).await?;
    if user.id == owner.id {
        return Ok(true);
    }
    teaches(pool, user, &owner).await
}

/// Resolves the owner named in the URL and checks `viewer` against `access`.
/// Unknown usernames are 404, a failed check is 403.
#[instrument(skip(pool, viewer), fields(viewer = %viewer.username))]
pub async fn authorize(
    pool: &Pool<Sqlite>,
    viewer: &User,
    username: &str,
    access: Access,
) -> Result<User, AppError> {
    let owner = get_user_by_username(pool, username).await?;
    let is_self = viewer.id == owner.id;

    let allowed = match access {
        Access::Owner => is_self,
        Access::OwnerOrTeacher => is_self || teaches(pool, viewer, &owner).await?,
        Access::Teacher => teaches(pool, viewer, &owner).await?,
        Access::OwnerOrTeacherNotStudent => {
            (is_self || teaches(pool, viewer, &owner).await?)
                && !teaches(pool, &owner, viewer).await?
        }
    };

    if allowed {
        Ok(owner)
    } else {
        tracing::warn!(
            viewer = %viewer.username,
            owner = %owner.username,
            access = ?access,
            "Permission denied"
        );
        Err(AppError::Authorization(format!(
            "{} may not access resources of {}",
            viewer.username, owner.username
        )))
    }
}
