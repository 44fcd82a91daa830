use rocket::State;
use rocket::form::Form;
use rocket::response::Redirect;
use rocket::serde::json::Json;
use serde::Serialize;
use sqlx::{Pool, Sqlite};

use crate::auth::{Access, User, authorize};
use crate::db::{create_goal, delete_goal, get_goal, get_goals, get_pieces, update_goal};
use crate::forms::{ConfirmationForm, GoalForm, Operation};
use crate::models::{Goal, Piece};
use crate::validation::{ApiError, AppErrorExt, FormOutcome};

use super::{DeletePrompt, Listing};

#[derive(Debug, Serialize)]
pub struct GoalFormContext {
    pub owner: String,
    pub pieces: Vec<Piece>,
}

#[get("/<username>/goals")]
pub async fn goal_list(
    username: &str,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Listing<Goal>>, ApiError> {
    let owner = authorize(db, &user, username, Access::OwnerOrTeacher)
        .await
        .validate_custom()?;
    let goals = get_goals(db, owner.id).await.validate_custom()?;

    Ok(Json(Listing::new(&owner.username, goals)))
}

#[get("/<username>/goals/<id>", rank = 2)]
pub async fn goal_detail(
    username: &str,
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Goal>, ApiError> {
    let owner = authorize(db, &user, username, Access::OwnerOrTeacher)
        .await
        .validate_custom()?;

    Ok(Json(get_goal(db, owner.id, id).await.validate_custom()?))
}

#[get("/<username>/goals/new")]
pub async fn goal_new(
    username: &str,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<GoalFormContext>, ApiError> {
    let owner = authorize(db, &user, username, Access::Owner)
        .await
        .validate_custom()?;
    let pieces = get_pieces(db, owner.id).await.validate_custom()?;

    Ok(Json(GoalFormContext {
        owner: owner.username,
        pieces,
    }))
}

#[post("/<username>/goals/new", data = "<form>")]
pub async fn goal_create(
    username: &str,
    form: Form<GoalForm>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<FormOutcome, ApiError> {
    let owner = authorize(db, &user, username, Access::Owner)
        .await
        .validate_custom()?;

    let data = match form.clean_owned(db, owner.id).await.validate_custom()? {
        Ok(data) => data,
        Err(errors) => return Ok(errors.into()),
    };

    let id = create_goal(db, owner.id, &data).await.validate_custom()?;
    Ok(FormOutcome::Saved(Redirect::to(uri!(goal_detail(
        owner.username.as_str(),
        id
    )))))
}

#[post("/<username>/goals/<id>/update", data = "<form>")]
pub async fn goal_update(
    username: &str,
    id: i64,
    form: Form<GoalForm>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<FormOutcome, ApiError> {
    let owner = authorize(db, &user, username, Access::Owner)
        .await
        .validate_custom()?;
    get_goal(db, owner.id, id).await.validate_custom()?;

    let data = match form.clean_owned(db, owner.id).await.validate_custom()? {
        Ok(data) => data,
        Err(errors) => return Ok(errors.into()),
    };

    update_goal(db, owner.id, id, &data).await.validate_custom()?;
    Ok(FormOutcome::Saved(Redirect::to(uri!(goal_detail(
        owner.username.as_str(),
        id
    )))))
}

#[get("/<username>/goals/<id>/delete")]
pub async fn goal_delete_prompt(
    username: &str,
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<DeletePrompt<Goal>>, ApiError> {
    let owner = authorize(db, &user, username, Access::Owner)
        .await
        .validate_custom()?;
    let goal = get_goal(db, owner.id, id).await.validate_custom()?;

    Ok(Json(DeletePrompt {
        question: format!("Do you want to delete the goal \"{}\"?", goal.label()),
        object: goal,
    }))
}

#[post("/<username>/goals/<id>/delete", data = "<form>")]
pub async fn goal_delete(
    username: &str,
    id: i64,
    form: Form<ConfirmationForm>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Redirect, ApiError> {
    let owner = authorize(db, &user, username, Access::Owner)
        .await
        .validate_custom()?;

    match form.operation {
        Operation::Yes => {
            delete_goal(db, owner.id, id).await.validate_custom()?;
            Ok(Redirect::to(uri!(goal_list(owner.username.as_str()))))
        }
        Operation::No => Ok(Redirect::to(uri!(goal_detail(owner.username.as_str(), id)))),
    }
}

pub fn routes() -> Vec<rocket::Route> {
    routes![
        goal_list,
        goal_detail,
        goal_new,
        goal_create,
        goal_update,
        goal_delete_prompt,
        goal_delete
    ]
}
