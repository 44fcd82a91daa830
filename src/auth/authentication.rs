use rocket::Request;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket::serde::json::Json;
use sqlx::SqlitePool;
use tracing::{info, instrument};

use crate::db::{get_session_by_token, get_user, invalidate_session};
use crate::error::AppError;
use crate::validation::{ToValidationResponse, ValidationResponse};

use super::User;

pub const SESSION_COOKIE: &str = "session_token";

/// Resolves a session token to its user. Expired tokens are deleted on sight.
#[instrument(skip_all)]
async fn user_for_token(db: &SqlitePool, token: &str) -> Result<User, AppError> {
    let session = get_session_by_token(db, token).await?;

    if !session.is_valid() {
        invalidate_session(db, token).await?;
        return Err(AppError::Authentication("Session token expired".to_string()));
    }

    let user = get_user(db, session.user_id).await?;
    info!(username = %user.username, "User authenticated via session token");
    Ok(user)
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for User {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let Some(token) = request
            .cookies()
            .get_private(SESSION_COOKIE)
            .map(|c| c.value().to_string())
        else {
            return Outcome::Error((Status::Unauthorized, ()));
        };

        let Some(db) = request.rocket().state::<SqlitePool>() else {
            tracing::error!("Database pool not found in managed state");
            return Outcome::Error((Status::InternalServerError, ()));
        };

        // Several guards on one route share a single lookup.
        let resolved: &Option<User> = request
            .local_cache_async(async {
                match user_for_token(db, &token).await {
                    Ok(user) => Some(user),
                    Err(err) => {
                        err.log_and_record("Session guard");
                        None
                    }
                }
            })
            .await;

        match resolved {
            Some(user) => Outcome::Success(user.clone()),
            None => Outcome::Error((Status::Unauthorized, ())),
        }
    }
}

#[catch(default)]
pub fn default_catcher(
    status: Status,
    _req: &Request,
) -> rocket::response::status::Custom<Json<ValidationResponse>> {
    status.to_validation_response()
}
