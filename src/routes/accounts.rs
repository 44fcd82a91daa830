use chrono::Utc;
use rocket::State;
use rocket::form::Form;
use rocket::http::{Cookie, CookieJar, SameSite};
use rocket::response::Redirect;
use rocket::serde::json::Json;
use serde::Serialize;
use sqlx::{Pool, Sqlite};

use crate::auth::{Access, ProfileRole, SESSION_COOKIE, User, UserSession, authorize};
use crate::config::AppConfig;
use crate::db::{
    authenticate_user, create_user, create_user_session, get_linked_students, get_linked_teachers,
    invalidate_session, update_user_details,
};
use crate::error::AppError;
use crate::forms::{AccountForm, ConfirmationForm, InvitationForm, LoginForm, RegisterForm};
use crate::invitations::{PendingInvitations, pending_invitations, propose, respond};
use crate::validation::{
    ApiError, AppErrorExt, FormErrors, FormOutcome, NON_FIELD_ERRORS, ToValidationResponse,
};

#[derive(Debug, Serialize)]
pub struct UserDetail {
    pub user: User,
    pub is_student: bool,
    pub is_teacher: bool,
    pub teachers: Vec<String>,
    pub students: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct InvitationPrompt {
    pub inviting: String,
    pub invitation_type: ProfileRole,
    pub question: String,
}

#[get("/health")]
pub fn health() -> &'static str {
    "OK"
}

#[post("/user/create", data = "<form>")]
pub async fn register(
    form: Form<RegisterForm>,
    db: &State<Pool<Sqlite>>,
) -> Result<FormOutcome, ApiError> {
    let email = match form.clean() {
        Ok(email) => email,
        Err(errors) => return Ok(errors.into()),
    };

    let created = create_user(db, &form.username, &form.password1, email.as_deref()).await;
    FormOutcome::settle(created.map(|_| Redirect::to("/login")))
}

#[post("/login", data = "<form>")]
pub async fn login(
    form: Form<LoginForm>,
    cookies: &CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> Result<FormOutcome, ApiError> {
    let Some(user) = authenticate_user(db, &form.username, &form.password)
        .await
        .validate_custom()?
    else {
        let mut errors = FormErrors::new();
        errors.add(NON_FIELD_ERRORS, "Invalid username or password.");
        return Ok(errors.into());
    };

    let token = UserSession::generate_token();
    let expires_at = Utc::now() + chrono::Duration::hours(config.session_hours);

    create_user_session(db, user.id, &token, expires_at.naive_utc())
        .await
        .validate_custom()?;

    let cookie = Cookie::build((SESSION_COOKIE, token))
        .same_site(SameSite::Lax)
        .http_only(true)
        .max_age(rocket::time::Duration::hours(config.session_hours));
    cookies.add_private(cookie);

    Ok(FormOutcome::Saved(Redirect::to(uri!(user_detail(
        user.username.as_str()
    )))))
}

#[post("/logout")]
pub async fn logout(cookies: &CookieJar<'_>, db: &State<Pool<Sqlite>>) -> Redirect {
    let token = cookies
        .get_private(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string());

    if let Some(token) = token {
        if let Err(e) = invalidate_session(db, &token).await {
            e.log_and_record("Invalidating session on logout");
        }
    }

    cookies.remove_private(Cookie::build(SESSION_COOKIE));
    Redirect::to("/")
}

#[get("/me")]
pub async fn me(user: User) -> Json<User> {
    Json(user)
}

#[get("/<username>")]
pub async fn user_detail(
    username: &str,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<UserDetail>, ApiError> {
    let owner = authorize(db, &user, username, Access::OwnerOrTeacher)
        .await
        .validate_custom()?;

    let teachers = match owner.student_id {
        Some(student_id) => get_linked_teachers(db, student_id).await.validate_custom()?,
        None => Vec::new(),
    };
    let students = match owner.teacher_id {
        Some(teacher_id) => get_linked_students(db, teacher_id).await.validate_custom()?,
        None => Vec::new(),
    };

    Ok(Json(UserDetail {
        is_student: owner.is_student(),
        is_teacher: owner.is_teacher(),
        teachers: teachers.into_iter().map(|u| u.username).collect(),
        students: students.into_iter().map(|u| u.username).collect(),
        user: owner,
    }))
}

#[post("/account/update", data = "<form>")]
pub async fn account_update(
    form: Form<AccountForm>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<FormOutcome, ApiError> {
    let (first_name, last_name, email) = match form.clean() {
        Ok(data) => data,
        Err(errors) => return Ok(errors.into()),
    };

    update_user_details(db, user.id, &first_name, &last_name, email.as_deref())
        .await
        .validate_custom()?;
    Ok(FormOutcome::Saved(Redirect::to(uri!(user_detail(
        user.username.as_str()
    )))))
}

#[get("/invitations")]
pub async fn invitation_list(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<PendingInvitations>, ApiError> {
    Ok(Json(pending_invitations(db, &user).await.validate_custom()?))
}

#[post("/invitations", data = "<form>")]
pub async fn invitation_create(
    form: Form<InvitationForm>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<FormOutcome, ApiError> {
    let (invited, role) = match form.clean(&user.username) {
        Ok(cleaned) => cleaned,
        Err(errors) => return Ok(errors.into()),
    };

    match propose(db, &user, &invited, role).await {
        Err(AppError::NotFound(_)) => {
            let mut errors = FormErrors::new();
            errors.add("invited", "User does not exist.");
            Ok(errors.into())
        }
        result => FormOutcome::settle(result.map(|_| Redirect::to(uri!(invitation_list)))),
    }
}

#[get("/invitations/<invitation_type>/<username>", rank = 1)]
pub async fn invitation_prompt(
    invitation_type: &str,
    username: &str,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<InvitationPrompt>, ApiError> {
    let role = ProfileRole::from_str(invitation_type).validate_custom()?;
    let pending = pending_invitations(db, &user).await.validate_custom()?;

    let received = match role {
        ProfileRole::Teacher => &pending.from_teachers,
        ProfileRole::Student => &pending.from_students,
    };
    if !received.iter().any(|invitation| invitation.username == username) {
        return Err(AppError::NotFound(format!(
            "No pending invitation from {} as {}",
            username, role
        ))
        .to_validation_response());
    }

    let question = match role {
        ProfileRole::Teacher => format!("Do you want {} to become your teacher?", username),
        ProfileRole::Student => format!("Do you want {} to become your student?", username),
    };

    Ok(Json(InvitationPrompt {
        inviting: username.to_string(),
        invitation_type: role,
        question,
    }))
}

#[post("/invitations/<invitation_type>/<username>", data = "<form>", rank = 1)]
pub async fn invitation_respond(
    invitation_type: &str,
    username: &str,
    form: Form<ConfirmationForm>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Redirect, ApiError> {
    let role = ProfileRole::from_str(invitation_type).validate_custom()?;

    respond(db, &user, username, role, form.operation)
        .await
        .validate_custom()?;

    Ok(Redirect::to(uri!(invitation_list)))
}

pub fn routes() -> Vec<rocket::Route> {
    routes![
        health,
        register,
        login,
        logout,
        me,
        user_detail,
        account_update,
        invitation_list,
        invitation_create,
        invitation_prompt,
        invitation_respond
    ]
}
