use serde::Serialize;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::auth::{ProfileRole, User};
use crate::db::{
    ReceivedInvitation, add_invitation_in, clear_invitations_in, ensure_profile_in,
    get_student_invitations, get_teacher_invitations, get_user_by_username, has_invitation,
    is_linked_in, link_in,
};
use crate::error::AppError;
use crate::forms::Operation;

/// Pending invitations addressed to one account, split by the role of the
/// sender.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PendingInvitations {
    pub from_teachers: Vec<ReceivedInvitation>,
    pub from_students: Vec<ReceivedInvitation>,
}

impl PendingInvitations {
    pub fn is_empty(&self) -> bool {
        self.from_teachers.is_empty() && self.from_students.is_empty()
    }
}

/// Orders a pair of profile ids as `(student_id, teacher_id)` given the role
/// of the first one.
fn as_pair(role: ProfileRole, own: i64, other: i64) -> (i64, i64) {
    match role {
        ProfileRole::Student => (own, other),
        ProfileRole::Teacher => (other, own),
    }
}

/// `inviting` asks `invited_username` to link up, taking `role` for
/// themselves. Both sides get the profile they need.
#[instrument(skip(pool, inviting), fields(inviting = %inviting.username))]
pub async fn propose(
    pool: &Pool<Sqlite>,
    inviting: &User,
    invited_username: &str,
    role: ProfileRole,
) -> Result<(), AppError> {
    let invited = get_user_by_username(pool, invited_username).await?;
    if invited.id == inviting.id {
        return Err(AppError::Validation("You cannot invite yourself.".to_string()));
    }

    let mut tx = pool.begin().await?;

    let inviting_profile = ensure_profile_in(&mut tx, inviting.id, role).await?;
    let invited_profile = ensure_profile_in(&mut tx, invited.id, role.complement()).await?;
    let (student_id, teacher_id) = as_pair(role, inviting_profile, invited_profile);

    if is_linked_in(&mut tx, teacher_id, student_id).await? {
        return Err(AppError::Validation(format!(
            "You are already linked with {}.",
            invited.username
        )));
    }

    add_invitation_in(&mut tx, student_id, teacher_id, role).await?;

    tx.commit().await?;
    info!(invited = %invited.username, role = %role, "Invitation proposed");
    Ok(())
}

/// Resolves the pending invitation sent by `inviting_username`, acting as
/// `role`, to `invited`. Returns `(student_id, teacher_id)`.
async fn pending_pair(
    pool: &Pool<Sqlite>,
    invited: &User,
    inviting_username: &str,
    role: ProfileRole,
) -> Result<(i64, i64), AppError> {
    let inviting = get_user_by_username(pool, inviting_username).await?;

    let not_found = || {
        AppError::NotFound(format!(
            "No pending invitation from {} as {}",
            inviting_username, role
        ))
    };

    let inviting_profile = inviting.profile_id(role).ok_or_else(not_found)?;
    let invited_profile = invited.profile_id(role.complement()).ok_or_else(not_found)?;
    let (student_id, teacher_id) = as_pair(role, inviting_profile, invited_profile);

    if !has_invitation(pool, student_id, teacher_id, role).await? {
        return Err(not_found());
    }

    Ok((student_id, teacher_id))
}

#[instrument(skip(pool, invited), fields(invited = %invited.username))]
pub async fn accept(
    pool: &Pool<Sqlite>,
    invited: &User,
    inviting_username: &str,
    role: ProfileRole,
) -> Result<(), AppError> {
    let (student_id, teacher_id) = pending_pair(pool, invited, inviting_username, role).await?;

    let mut tx = pool.begin().await?;
    link_in(&mut tx, teacher_id, student_id).await?;
    clear_invitations_in(&mut tx, student_id, teacher_id).await?;
    tx.commit().await?;

    info!("Invitation accepted");
    Ok(())
}

#[instrument(skip(pool, invited), fields(invited = %invited.username))]
pub async fn reject(
    pool: &Pool<Sqlite>,
    invited: &User,
    inviting_username: &str,
    role: ProfileRole,
) -> Result<(), AppError> {
    let (student_id, teacher_id) = pending_pair(pool, invited, inviting_username, role).await?;

    let mut tx = pool.begin().await?;
    clear_invitations_in(&mut tx, student_id, teacher_id).await?;
    tx.commit().await?;

    info!("Invitation rejected");
    Ok(())
}

pub async fn respond(
    pool: &Pool<Sqlite>,
    invited: &User,
    inviting_username: &str,
    role: ProfileRole,
    operation: Operation,
) -> Result<(), AppError> {
    match operation {
        Operation::Yes => accept(pool, invited, inviting_username, role).await,
        Operation::No => reject(pool, invited, inviting_username, role).await,
    }
}

#[instrument(skip(pool, user), fields(username = %user.username))]
pub async fn pending_invitations(
    pool: &Pool<Sqlite>,
    user: &User,
) -> Result<PendingInvitations, AppError> {
    Ok(PendingInvitations {
        from_teachers: get_teacher_invitations(pool, user).await?,
        from_students: get_student_invitations(pool, user).await?,
    })
}
