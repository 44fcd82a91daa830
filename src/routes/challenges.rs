use rocket::State;
use rocket::form::Form;
use rocket::response::Redirect;
use rocket::serde::json::Json;
use serde::Serialize;
use sqlx::{Pool, Sqlite};

use crate::auth::{Access, User, authorize, teaches};
use crate::challenges::{ChallengeState, Evaluation, evaluate};
use crate::db::{
    create_challenge, create_challenge_with_task, delete_challenge, get_challenge, get_challenges,
    get_goals, get_parts, get_pieces, get_practices_for_task, get_task, mark_challenge_completed,
    set_requirements_fulfilled, update_challenge,
};
use crate::forms::{ChallengeCreateForm, ChallengeForm, ConfirmationForm, Operation};
use crate::models::{Challenge, Goal, Part, Piece, Task};
use crate::validation::{ApiError, AppErrorExt, FormErrors, FormOutcome};

use super::{DeletePrompt, Listing};

#[derive(Debug, Serialize)]
pub struct ChallengeSummary {
    pub challenge: Challenge,
    pub task_label: String,
    pub state: ChallengeState,
}

#[derive(Debug, Serialize)]
pub struct ChallengeDetail {
    pub owner: String,
    pub challenge: Challenge,
    pub task: Task,
    pub evaluation: Evaluation,
    pub viewer_is_teacher: bool,
}

#[derive(Debug, Serialize)]
pub struct ChallengeFormContext {
    pub owner: String,
    pub task: Option<Task>,
    pub goals: Vec<Goal>,
    pub pieces: Vec<Piece>,
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
pub struct ConfirmPrompt {
    pub question: String,
    pub challenge: Challenge,
    pub evaluation: Evaluation,
}

async fn load_detail(
    db: &Pool<Sqlite>,
    owner: &User,
    id: i64,
) -> Result<(Challenge, Task, Evaluation), ApiError> {
    let challenge = get_challenge(db, owner.id, id).await.validate_custom()?;
    let task = get_task(db, owner.id, challenge.task_id)
        .await
        .validate_custom()?;
    let practices = get_practices_for_task(db, task.id).await.validate_custom()?;
    let evaluation = evaluate(&challenge, &practices);

    Ok((challenge, task, evaluation))
}

/// `is_completed` from a form is honoured only when a teacher of the owner
/// submits it.
async fn completion_allowed(
    db: &Pool<Sqlite>,
    viewer: &User,
    owner: &User,
    requested: bool,
) -> Result<bool, ApiError> {
    if !requested {
        return Ok(false);
    }
    teaches(db, viewer, owner).await.validate_custom()
}

async fn form_context(
    db: &Pool<Sqlite>,
    owner: User,
    task: Option<Task>,
) -> Result<ChallengeFormContext, ApiError> {
    Ok(ChallengeFormContext {
        goals: get_goals(db, owner.id).await.validate_custom()?,
        pieces: get_pieces(db, owner.id).await.validate_custom()?,
        parts: get_parts(db, owner.id).await.validate_custom()?,
        owner: owner.username,
        task,
    })
}

#[get("/<username>/challenges")]
pub async fn challenge_list(
    username: &str,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Listing<ChallengeSummary>>, ApiError> {
    let owner = authorize(db, &user, username, Access::OwnerOrTeacher)
        .await
        .validate_custom()?;

    let mut items = Vec::new();
    for challenge in get_challenges(db, owner.id).await.validate_custom()? {
        let (challenge, task, evaluation) = load_detail(db, &owner, challenge.id).await?;
        items.push(ChallengeSummary {
            task_label: task.label(),
            state: evaluation.state,
            challenge,
        });
    }

    Ok(Json(Listing::new(&owner.username, items)))
}

#[get("/<username>/challenges/<id>", rank = 2)]
pub async fn challenge_detail(
    username: &str,
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<ChallengeDetail>, ApiError> {
    let owner = authorize(db, &user, username, Access::OwnerOrTeacher)
        .await
        .validate_custom()?;
    let (challenge, task, evaluation) = load_detail(db, &owner, id).await?;
    let viewer_is_teacher = teaches(db, &user, &owner).await.validate_custom()?;

    Ok(Json(ChallengeDetail {
        owner: owner.username,
        challenge,
        task,
        evaluation,
        viewer_is_teacher,
    }))
}

#[get("/<username>/challenges/new")]
pub async fn challenge_new(
    username: &str,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<ChallengeFormContext>, ApiError> {
    let owner = authorize(db, &user, username, Access::OwnerOrTeacher)
        .await
        .validate_custom()?;

    Ok(Json(form_context(db, owner, None).await?))
}

#[post("/<username>/challenges/new", data = "<form>")]
pub async fn challenge_create(
    username: &str,
    form: Form<ChallengeCreateForm>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<FormOutcome, ApiError> {
    let owner = authorize(db, &user, username, Access::OwnerOrTeacher)
        .await
        .validate_custom()?;

    let (task_form, challenge_form) = form.into_inner().split();
    let mut errors = FormErrors::new();

    let task = match task_form.clean_owned(db, owner.id).await.validate_custom()? {
        Ok(task) => Some(task),
        Err(task_errors) => {
            errors.merge(task_errors);
            None
        }
    };
    let challenge = match challenge_form.clean() {
        Ok(challenge) => Some(challenge),
        Err(challenge_errors) => {
            errors.merge(challenge_errors);
            None
        }
    };

    let (task, mut challenge) = match (task, challenge) {
        (Some(task), Some(challenge)) if errors.is_empty() => (task, challenge),
        _ => return Ok(errors.into()),
    };
    challenge.is_completed = completion_allowed(db, &user, &owner, challenge.is_completed).await?;

    let (_, id) = create_challenge_with_task(db, owner.id, &task, &challenge)
        .await
        .validate_custom()?;
    Ok(FormOutcome::Saved(Redirect::to(uri!(challenge_detail(
        owner.username.as_str(),
        id
    )))))
}

#[get("/<username>/challenges/from-task/<task_id>", rank = 2)]
pub async fn challenge_from_task_new(
    username: &str,
    task_id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<ChallengeFormContext>, ApiError> {
    let owner = authorize(db, &user, username, Access::OwnerOrTeacher)
        .await
        .validate_custom()?;
    let task = get_task(db, owner.id, task_id).await.validate_custom()?;

    Ok(Json(form_context(db, owner, Some(task)).await?))
}

#[post("/<username>/challenges/from-task/<task_id>", data = "<form>", rank = 2)]
pub async fn challenge_from_task_create(
    username: &str,
    task_id: i64,
    form: Form<ChallengeForm>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<FormOutcome, ApiError> {
    let owner = authorize(db, &user, username, Access::OwnerOrTeacher)
        .await
        .validate_custom()?;

    let mut data = match form.clean() {
        Ok(data) => data,
        Err(errors) => return Ok(errors.into()),
    };
    data.is_completed = completion_allowed(db, &user, &owner, data.is_completed).await?;

    let id = create_challenge(db, owner.id, task_id, &data)
        .await
        .validate_custom()?;
    Ok(FormOutcome::Saved(Redirect::to(uri!(challenge_detail(
        owner.username.as_str(),
        id
    )))))
}

#[post("/<username>/challenges/<id>/update", data = "<form>")]
pub async fn challenge_update(
    username: &str,
    id: i64,
    form: Form<ChallengeForm>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<FormOutcome, ApiError> {
    let owner = authorize(db, &user, username, Access::OwnerOrTeacher)
        .await
        .validate_custom()?;
    get_challenge(db, owner.id, id).await.validate_custom()?;

    let data = match form.clean() {
        Ok(data) => data,
        Err(errors) => return Ok(errors.into()),
    };
    let complete = completion_allowed(db, &user, &owner, data.is_completed).await?;

    update_challenge(db, owner.id, id, &data, complete)
        .await
        .validate_custom()?;
    Ok(FormOutcome::Saved(Redirect::to(uri!(challenge_detail(
        owner.username.as_str(),
        id
    )))))
}

#[get("/<username>/challenges/<id>/delete")]
pub async fn challenge_delete_prompt(
    username: &str,
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<DeletePrompt<Challenge>>, ApiError> {
    let owner = authorize(db, &user, username, Access::OwnerOrTeacherNotStudent)
        .await
        .validate_custom()?;
    let (challenge, task, _) = load_detail(db, &owner, id).await?;

    Ok(Json(DeletePrompt {
        question: format!(
            "Do you want to delete the challenge for \"{}\"?",
            task.label()
        ),
        object: challenge,
    }))
}

#[post("/<username>/challenges/<id>/delete", data = "<form>")]
pub async fn challenge_delete(
    username: &str,
    id: i64,
    form: Form<ConfirmationForm>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Redirect, ApiError> {
    let owner = authorize(db, &user, username, Access::OwnerOrTeacherNotStudent)
        .await
        .validate_custom()?;

    match form.operation {
        Operation::Yes => {
            delete_challenge(db, owner.id, id).await.validate_custom()?;
            Ok(Redirect::to(uri!(challenge_list(owner.username.as_str()))))
        }
        Operation::No => Ok(Redirect::to(uri!(challenge_detail(
            owner.username.as_str(),
            id
        )))),
    }
}

#[get("/<username>/challenges/<id>/confirm")]
pub async fn challenge_confirm_prompt(
    username: &str,
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<ConfirmPrompt>, ApiError> {
    let owner = authorize(db, &user, username, Access::Teacher)
        .await
        .validate_custom()?;
    let (mut challenge, task, evaluation) = load_detail(db, &owner, id).await?;

    let question = if evaluation.is_fulfilled {
        if !challenge.are_requirements_fulfilled {
            set_requirements_fulfilled(db, challenge.id)
                .await
                .validate_custom()?;
            challenge.are_requirements_fulfilled = true;
        }
        format!(
            "{} fulfilled the challenge for \"{}\". Do you confirm it?",
            owner.display_name(),
            task.label()
        )
    } else {
        format!(
            "The requirements of the challenge for \"{}\" are not met. \
             Do you want to confirm it anyway?",
            task.label()
        )
    };

    Ok(Json(ConfirmPrompt {
        question,
        challenge,
        evaluation,
    }))
}

#[post("/<username>/challenges/<id>/confirm", data = "<form>")]
pub async fn challenge_confirm(
    username: &str,
    id: i64,
    form: Form<ConfirmationForm>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Redirect, ApiError> {
    let owner = authorize(db, &user, username, Access::Teacher)
        .await
        .validate_custom()?;
    let challenge = get_challenge(db, owner.id, id).await.validate_custom()?;

    if form.operation == Operation::Yes {
        mark_challenge_completed(db, challenge.id)
            .await
            .validate_custom()?;
    }

    Ok(Redirect::to(uri!(challenge_detail(
        owner.username.as_str(),
        id
    ))))
}

pub fn routes() -> Vec<rocket::Route> {
    routes![
        challenge_list,
        challenge_detail,
        challenge_new,
        challenge_create,
        challenge_from_task_new,
        challenge_from_task_create,
        challenge_update,
        challenge_delete_prompt,
        challenge_delete,
        challenge_confirm_prompt,
        challenge_confirm
    ]
}
