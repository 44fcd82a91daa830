use rocket::State;
use rocket::form::Form;
use rocket::response::Redirect;
use rocket::serde::json::Json;
use serde::Serialize;
use sqlx::{Pool, Sqlite};

use crate::auth::{Access, User, authorize};
use crate::db::{
    create_practice, create_task, delete_practice, delete_task, get_goals, get_parts, get_pieces,
    get_practice, get_practices_for_task, get_task, get_tasks, update_practice, update_task,
};
use crate::forms::{ConfirmationForm, Operation, PracticeForm, TaskCreateForm, TaskForm};
use crate::models::{Goal, Part, Piece, Practice, Task};
use crate::validation::{ApiError, AppErrorExt, FormErrors, FormOutcome};

use super::{DeletePrompt, Listing};

#[derive(Debug, Serialize)]
pub struct TaskDetail {
    pub owner: String,
    pub task: Task,
    pub label: String,
    pub practices: Vec<Practice>,
}

#[derive(Debug, Serialize)]
pub struct TaskFormContext {
    pub owner: String,
    pub goals: Vec<Goal>,
    pub pieces: Vec<Piece>,
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
pub struct PracticeDetail {
    pub owner: String,
    pub task_label: String,
    pub practice: Practice,
}

#[get("/<username>/tasks")]
pub async fn task_list(
    username: &str,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Listing<Task>>, ApiError> {
    let owner = authorize(db, &user, username, Access::OwnerOrTeacher)
        .await
        .validate_custom()?;
    let tasks = get_tasks(db, owner.id).await.validate_custom()?;

    Ok(Json(Listing::new(&owner.username, tasks)))
}

#[get("/<username>/tasks/<id>", rank = 2)]
pub async fn task_detail(
    username: &str,
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<TaskDetail>, ApiError> {
    let owner = authorize(db, &user, username, Access::OwnerOrTeacher)
        .await
        .validate_custom()?;
    let task = get_task(db, owner.id, id).await.validate_custom()?;
    let practices = get_practices_for_task(db, task.id).await.validate_custom()?;

    Ok(Json(TaskDetail {
        owner: owner.username,
        label: task.label(),
        task,
        practices,
    }))
}

#[get("/<username>/tasks/new")]
pub async fn task_new(
    username: &str,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<TaskFormContext>, ApiError> {
    let owner = authorize(db, &user, username, Access::OwnerOrTeacher)
        .await
        .validate_custom()?;

    Ok(Json(TaskFormContext {
        goals: get_goals(db, owner.id).await.validate_custom()?,
        pieces: get_pieces(db, owner.id).await.validate_custom()?,
        parts: get_parts(db, owner.id).await.validate_custom()?,
        owner: owner.username,
    }))
}

#[post("/<username>/tasks/new", data = "<form>")]
pub async fn task_create(
    username: &str,
    form: Form<TaskCreateForm>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<FormOutcome, ApiError> {
    let owner = authorize(db, &user, username, Access::OwnerOrTeacher)
        .await
        .validate_custom()?;

    let (task_form, practice_form) = form.into_inner().split();
    let mut errors = FormErrors::new();

    let task = match task_form.clean_owned(db, owner.id).await.validate_custom()? {
        Ok(task) => Some(task),
        Err(task_errors) => {
            errors.merge(task_errors);
            None
        }
    };
    let practice = match practice_form.as_ref().map(PracticeForm::clean) {
        Some(Ok(practice)) => Some(practice),
        Some(Err(practice_errors)) => {
            errors.merge(practice_errors);
            None
        }
        None => None,
    };

    let task = match task {
        Some(task) if errors.is_empty() => task,
        _ => return Ok(errors.into()),
    };

    let id = create_task(db, owner.id, &task, practice.as_ref())
        .await
        .validate_custom()?;
    Ok(FormOutcome::Saved(Redirect::to(uri!(task_detail(
        owner.username.as_str(),
        id
    )))))
}

#[post("/<username>/tasks/<id>/update", data = "<form>")]
pub async fn task_update(
    username: &str,
    id: i64,
    form: Form<TaskForm>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<FormOutcome, ApiError> {
    let owner = authorize(db, &user, username, Access::OwnerOrTeacher)
        .await
        .validate_custom()?;
    get_task(db, owner.id, id).await.validate_custom()?;

    let data = match form.clean_owned(db, owner.id).await.validate_custom()? {
        Ok(data) => data,
        Err(errors) => return Ok(errors.into()),
    };

    update_task(db, owner.id, id, &data).await.validate_custom()?;
    Ok(FormOutcome::Saved(Redirect::to(uri!(task_detail(
        owner.username.as_str(),
        id
    )))))
}

#[get("/<username>/tasks/<id>/delete")]
pub async fn task_delete_prompt(
    username: &str,
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<DeletePrompt<Task>>, ApiError> {
    let owner = authorize(db, &user, username, Access::OwnerOrTeacher)
        .await
        .validate_custom()?;
    let task = get_task(db, owner.id, id).await.validate_custom()?;

    Ok(Json(DeletePrompt {
        question: format!(
            "Do you want to delete the task \"{}\" together with its practices?",
            task.label()
        ),
        object: task,
    }))
}

#[post("/<username>/tasks/<id>/delete", data = "<form>")]
pub async fn task_delete(
    username: &str,
    id: i64,
    form: Form<ConfirmationForm>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Redirect, ApiError> {
    let owner = authorize(db, &user, username, Access::OwnerOrTeacher)
        .await
        .validate_custom()?;

    match form.operation {
        Operation::Yes => {
            delete_task(db, owner.id, id).await.validate_custom()?;
            Ok(Redirect::to(uri!(task_list(owner.username.as_str()))))
        }
        Operation::No => Ok(Redirect::to(uri!(task_detail(owner.username.as_str(), id)))),
    }
}

#[post("/<username>/tasks/<id>/practice", data = "<form>")]
pub async fn practice_create(
    username: &str,
    id: i64,
    form: Form<PracticeForm>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<FormOutcome, ApiError> {
    let owner = authorize(db, &user, username, Access::Owner)
        .await
        .validate_custom()?;

    let data = match form.clean() {
        Ok(data) => data,
        Err(errors) => return Ok(errors.into()),
    };

    create_practice(db, owner.id, id, &data)
        .await
        .validate_custom()?;
    Ok(FormOutcome::Saved(Redirect::to(uri!(task_detail(
        owner.username.as_str(),
        id
    )))))
}

#[get("/<username>/practice/<id>")]
pub async fn practice_detail(
    username: &str,
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<PracticeDetail>, ApiError> {
    let owner = authorize(db, &user, username, Access::OwnerOrTeacher)
        .await
        .validate_custom()?;
    let practice = get_practice(db, owner.id, id).await.validate_custom()?;
    let task = get_task(db, owner.id, practice.task_id)
        .await
        .validate_custom()?;

    Ok(Json(PracticeDetail {
        owner: owner.username,
        task_label: task.label(),
        practice,
    }))
}

#[post("/<username>/practice/<id>", data = "<form>")]
pub async fn practice_update(
    username: &str,
    id: i64,
    form: Form<PracticeForm>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<FormOutcome, ApiError> {
    let owner = authorize(db, &user, username, Access::Owner)
        .await
        .validate_custom()?;
    get_practice(db, owner.id, id).await.validate_custom()?;

    let data = match form.clean() {
        Ok(data) => data,
        Err(errors) => return Ok(errors.into()),
    };

    update_practice(db, owner.id, id, &data)
        .await
        .validate_custom()?;
    Ok(FormOutcome::Saved(Redirect::to(uri!(practice_detail(
        owner.username.as_str(),
        id
    )))))
}

#[get("/<username>/practice/<id>/delete")]
pub async fn practice_delete_prompt(
    username: &str,
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<DeletePrompt<Practice>>, ApiError> {
    let owner = authorize(db, &user, username, Access::OwnerOrTeacher)
        .await
        .validate_custom()?;
    let practice = get_practice(db, owner.id, id).await.validate_custom()?;

    Ok(Json(DeletePrompt {
        question: format!(
            "Do you want to delete the practice from {}?",
            practice.date.format("%Y-%m-%d")
        ),
        object: practice,
    }))
}

#[post("/<username>/practice/<id>/delete", data = "<form>")]
pub async fn practice_delete(
    username: &str,
    id: i64,
    form: Form<ConfirmationForm>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Redirect, ApiError> {
    let owner = authorize(db, &user, username, Access::OwnerOrTeacher)
        .await
        .validate_custom()?;
    let practice = get_practice(db, owner.id, id).await.validate_custom()?;

    match form.operation {
        Operation::Yes => {
            delete_practice(db, owner.id, id).await.validate_custom()?;
            Ok(Redirect::to(uri!(task_detail(
                owner.username.as_str(),
                practice.task_id
            ))))
        }
        Operation::No => Ok(Redirect::to(uri!(practice_detail(
            owner.username.as_str(),
            id
        )))),
    }
}

pub fn routes() -> Vec<rocket::Route> {
    routes![
        task_list,
        task_detail,
        task_new,
        task_create,
        task_update,
        task_delete_prompt,
        task_delete,
        practice_create,
        practice_detail,
        practice_update,
        practice_delete_prompt,
        practice_delete
    ]
}
