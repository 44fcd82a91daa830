use rocket::State;
use rocket::form::Form;
use rocket::response::Redirect;
use rocket::serde::json::Json;
use serde::Serialize;
use sqlx::{Pool, Sqlite};

use crate::auth::{Access, User, authorize};
use crate::db::{
    create_composer, create_part, create_piece, delete_piece, get_composers, get_goals, get_parts,
    get_piece, get_pieces, update_piece,
};
use crate::forms::{ConfirmationForm, NameForm, Operation, PieceForm};
use crate::models::{Composer, Goal, Part, Piece};
use crate::validation::{ApiError, AppErrorExt, FormOutcome};

use super::{DeletePrompt, Listing};

#[derive(Debug, Serialize)]
pub struct PieceFormContext {
    pub owner: String,
    pub composers: Vec<Composer>,
    pub goals: Vec<Goal>,
}

#[get("/<username>/pieces")]
pub async fn piece_list(
    username: &str,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Listing<Piece>>, ApiError> {
    let owner = authorize(db, &user, username, Access::OwnerOrTeacher)
        .await
        .validate_custom()?;
    let pieces = get_pieces(db, owner.id).await.validate_custom()?;

    Ok(Json(Listing::new(&owner.username, pieces)))
}

#[get("/<username>/pieces/<id>", rank = 2)]
pub async fn piece_detail(
    username: &str,
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Piece>, ApiError> {
    let owner = authorize(db, &user, username, Access::OwnerOrTeacher)
        .await
        .validate_custom()?;

    Ok(Json(get_piece(db, owner.id, id).await.validate_custom()?))
}

#[get("/<username>/pieces/new")]
pub async fn piece_new(
    username: &str,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<PieceFormContext>, ApiError> {
    let owner = authorize(db, &user, username, Access::Owner)
        .await
        .validate_custom()?;

    Ok(Json(PieceFormContext {
        composers: get_composers(db, owner.id).await.validate_custom()?,
        goals: get_goals(db, owner.id).await.validate_custom()?,
        owner: owner.username,
    }))
}

#[post("/<username>/pieces/new", data = "<form>")]
pub async fn piece_create(
    username: &str,
    form: Form<PieceForm>,
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

    let id = create_piece(db, owner.id, &data).await.validate_custom()?;
    Ok(FormOutcome::Saved(Redirect::to(uri!(piece_detail(
        owner.username.as_str(),
        id
    )))))
}

#[post("/<username>/pieces/<id>/update", data = "<form>")]
pub async fn piece_update(
    username: &str,
    id: i64,
    form: Form<PieceForm>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<FormOutcome, ApiError> {
    let owner = authorize(db, &user, username, Access::Owner)
        .await
        .validate_custom()?;
    get_piece(db, owner.id, id).await.validate_custom()?;

    let data = match form.clean_owned(db, owner.id).await.validate_custom()? {
        Ok(data) => data,
        Err(errors) => return Ok(errors.into()),
    };

    update_piece(db, owner.id, id, &data).await.validate_custom()?;
    Ok(FormOutcome::Saved(Redirect::to(uri!(piece_detail(
        owner.username.as_str(),
        id
    )))))
}

#[get("/<username>/pieces/<id>/delete")]
pub async fn piece_delete_prompt(
    username: &str,
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<DeletePrompt<Piece>>, ApiError> {
    let owner = authorize(db, &user, username, Access::Owner)
        .await
        .validate_custom()?;
    let piece = get_piece(db, owner.id, id).await.validate_custom()?;

    Ok(Json(DeletePrompt {
        question: format!(
            "Do you want to delete the piece \"{}\"?",
            piece.name_to_display
        ),
        object: piece,
    }))
}

#[post("/<username>/pieces/<id>/delete", data = "<form>")]
pub async fn piece_delete(
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
            delete_piece(db, owner.id, id).await.validate_custom()?;
            Ok(Redirect::to(uri!(piece_list(owner.username.as_str()))))
        }
        Operation::No => Ok(Redirect::to(uri!(piece_detail(
            owner.username.as_str(),
            id
        )))),
    }
}

#[get("/<username>/composers")]
pub async fn composer_list(
    username: &str,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Listing<Composer>>, ApiError> {
    let owner = authorize(db, &user, username, Access::OwnerOrTeacher)
        .await
        .validate_custom()?;
    let composers = get_composers(db, owner.id).await.validate_custom()?;

    Ok(Json(Listing::new(&owner.username, composers)))
}

#[post("/<username>/composers/new", data = "<form>")]
pub async fn composer_create(
    username: &str,
    form: Form<NameForm>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<FormOutcome, ApiError> {
    let owner = authorize(db, &user, username, Access::Owner)
        .await
        .validate_custom()?;

    let name = match form.clean() {
        Ok(name) => name,
        Err(errors) => return Ok(errors.into()),
    };

    create_composer(db, owner.id, &name).await.validate_custom()?;
    Ok(FormOutcome::Saved(Redirect::to(uri!(composer_list(
        owner.username.as_str()
    )))))
}

#[get("/<username>/parts")]
pub async fn part_list(
    username: &str,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Listing<Part>>, ApiError> {
    let owner = authorize(db, &user, username, Access::OwnerOrTeacher)
        .await
        .validate_custom()?;
    let parts = get_parts(db, owner.id).await.validate_custom()?;

    Ok(Json(Listing::new(&owner.username, parts)))
}

#[post("/<username>/parts/new", data = "<form>")]
pub async fn part_create(
    username: &str,
    form: Form<NameForm>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<FormOutcome, ApiError> {
    let owner = authorize(db, &user, username, Access::Owner)
        .await
        .validate_custom()?;

    let name = match form.clean() {
        Ok(name) => name,
        Err(errors) => return Ok(errors.into()),
    };

    create_part(db, owner.id, &name).await.validate_custom()?;
    Ok(FormOutcome::Saved(Redirect::to(uri!(part_list(
        owner.username.as_str()
    )))))
}

pub fn routes() -> Vec<rocket::Route> {
    routes![
        piece_list,
        piece_detail,
        piece_new,
        piece_create,
        piece_update,
        piece_delete_prompt,
        piece_delete,
        composer_list,
        composer_create,
        part_list,
        part_create
    ]
}
