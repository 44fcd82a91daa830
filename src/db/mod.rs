pub mod challenges;
pub mod goals;
pub mod pieces;
pub mod profiles;
pub mod sessions;
pub mod tasks;
pub mod users;

pub use challenges::*;
pub use goals::*;
pub use pieces::*;
pub use profiles::*;
pub use sessions::*;
pub use tasks::*;
pub use users::*;

use sqlx::{Pool, Sqlite};

use crate::error::AppError;

/// Checks that every id in `ids` names a row of `table` owned by `user_id`.
/// `table` only ever comes from a fixed set of names inside this crate.
pub(crate) async fn all_owned_by(
    pool: &Pool<Sqlite>,
    table: &'static str,
    user_id: i64,
    ids: &[i64],
) -> Result<bool, AppError> {
    for id in ids {
        let found: Option<i64> = sqlx::query_scalar(&format!(
            "SELECT id FROM {} WHERE id = ? AND user_id = ?",
            table
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        if found.is_none() {
            return Ok(false);
        }
    }

    Ok(true)
}
