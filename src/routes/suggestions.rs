use rocket::State;
use rocket::serde::json::Json;
use sqlx::{Pool, Sqlite};

use crate::auth::{Access, User, authorize};
use crate::db::get_suggested_tasks;
use crate::models::Task;
use crate::validation::{ApiError, AppErrorExt};

use super::Listing;

#[get("/<username>/suggestions")]
pub async fn suggestion_list(
    username: &str,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Listing<Task>>, ApiError> {
    let owner = authorize(db, &user, username, Access::Owner)
        .await
        .validate_custom()?;
    let tasks = get_suggested_tasks(db, owner.id).await.validate_custom()?;

    Ok(Json(Listing::new(&owner.username, tasks)))
}

pub fn routes() -> Vec<rocket::Route> {
    routes![suggestion_list]
}
