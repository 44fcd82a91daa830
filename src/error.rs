use std::fmt::Display;

use opentelemetry_semantic_conventions::{attribute::OTEL_STATUS_CODE, trace::ERROR_TYPE};
use rocket::http::Status;
use thiserror::Error;
use tracing::{Span, error, warn};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// A record of `kind` that does not exist or is not visible to the caller.
    pub fn not_found(kind: &str, id: impl Display) -> Self {
        AppError::NotFound(format!("{} {} not found", kind, id))
    }

    fn kind(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database_error",
            AppError::Authentication(_) => "authentication_error",
            AppError::Authorization(_) => "authorization_error",
            AppError::NotFound(_) => "not_found_error",
            AppError::Validation(_) => "validation_error",
            AppError::ExternalService(_) => "external_service_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    /// Server-side failures; everything else is the caller's doing.
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            AppError::Database(_) | AppError::Internal(_) | AppError::ExternalService(_)
        )
    }

    pub fn log_and_record(&self, ctx: &str) {
        let message = self.to_string();
        let error_kind = self.kind();

        match self {
            AppError::Database(err) => {
                error!(error = %message, context = %ctx, db_error = %err, "Database error");
            }
            _ if self.is_server_error() => {
                error!(error = %message, context = %ctx, kind = error_kind, "Request failed");
            }
            _ => {
                warn!(error = %message, context = %ctx, kind = error_kind, "Request rejected");
            }
        }

        let current_span = Span::current();
        if current_span.is_none() {
            return;
        }

        current_span.record("error", tracing::field::display(true));
        current_span.record(ERROR_TYPE, tracing::field::display(error_kind));
        current_span.record("error.message", tracing::field::display(&message));
        if self.is_server_error() {
            current_span.record(OTEL_STATUS_CODE, tracing::field::display("ERROR"));
        }
    }

    pub fn status_code(&self) -> Status {
        match self {
            AppError::Database(_) => Status::InternalServerError,
            AppError::Authentication(_) => Status::Unauthorized,
            AppError::Authorization(_) => Status::Forbidden,
            AppError::NotFound(_) => Status::NotFound,
            AppError::Validation(_) => Status::BadRequest,
            AppError::ExternalService(_) => Status::ServiceUnavailable,
            AppError::Internal(_) => Status::InternalServerError,
        }
    }
}

impl<'r> rocket::response::Responder<'r, 'static> for AppError {
    fn respond_to(self, req: &'r rocket::Request<'_>) -> rocket::response::Result<'static> {
        self.log_and_record(&format!("Request to {} {}", req.method(), req.uri()));
        self.status_code().respond_to(req)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::Validation(format!("Duplicate record: {}", db_err.message()))
            }
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                AppError::Validation(format!("Unknown reference: {}", db_err.message()))
            }
            _ => AppError::Database(error),
        }
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> Self {
        AppError::Internal(format!("Cryptography error: {}", error))
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(error: sqlx::migrate::MigrateError) -> Self {
        AppError::Internal(format!("Migration error: {}", error))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        AppError::ExternalService(format!("Mail relay error: {}", error))
    }
}
