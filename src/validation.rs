use std::collections::HashMap;

use rocket::Responder;
use rocket::http::Status;
use rocket::response::Redirect;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::AppError;

/// Field name used for errors that are not tied to one input.
pub const NON_FIELD_ERRORS: &str = "__all__";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ValidationResponse {
    pub status: String,
    pub errors: HashMap<String, Vec<String>>,
}

impl ValidationResponse {
    pub fn new(errors: HashMap<String, Vec<String>>) -> Self {
        Self {
            status: "error".to_string(),
            errors,
        }
    }

    pub fn with_error(field: &str, message: &str) -> Self {
        let mut errors = HashMap::new();
        errors.insert(field.to_string(), vec![message.to_string()]);
        Self::new(errors)
    }
}

pub type ApiError = Custom<Json<ValidationResponse>>;

pub trait ToValidationResponse {
    fn to_validation_response(self) -> ApiError;
}

impl ToValidationResponse for AppError {
    #[instrument]
    fn to_validation_response(self) -> ApiError {
        self.log_and_record("API Validation Error");
        let status = self.status_code();

        let (field, message) = match &self {
            AppError::Database(_) => ("database", "Database error".to_string()),
            AppError::Authentication(msg) => {
                ("authentication", format!("Authentication error: {}", msg))
            }
            AppError::Authorization(msg) => {
                ("permission", format!("Permission denied: {}", msg))
            }
            AppError::NotFound(msg) => ("resource", format!("Not found: {}", msg)),
            AppError::Validation(msg) => (NON_FIELD_ERRORS, msg.clone()),
            AppError::ExternalService(msg) => ("service", format!("Service error: {}", msg)),
            AppError::Internal(_) => ("server", "Internal server error".to_string()),
        };

        Custom(status, Json(ValidationResponse::with_error(field, &message)))
    }
}

impl ToValidationResponse for Status {
    #[instrument]
    fn to_validation_response(self) -> ApiError {
        let (field, message) = match self.code {
            403 => (
                "permission",
                "You don't have permission to perform this action",
            ),
            401 => ("authentication", "Authentication required"),
            404 => ("resource", "Resource not found"),
            400 => ("request", "Bad request"),
            422 => ("request", "Malformed form data"),
            500 => ("server", "Internal server error"),
            503 => ("service", "Service unavailable"),
            _ => ("error", "An error occurred"),
        };

        Custom(self, Json(ValidationResponse::with_error(field, message)))
    }
}

pub trait AppErrorExt<T> {
    fn validate_custom(self) -> Result<T, ApiError>;
}

impl<T> AppErrorExt<T> for Result<T, AppError> {
    fn validate_custom(self) -> Result<T, ApiError> {
        self.map_err(ToValidationResponse::to_validation_response)
    }
}

/// Per-field messages collected while cleaning a submitted form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormErrors(HashMap<String, Vec<String>>);

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: &str) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&Vec<String>> {
        self.0.get(field)
    }

    pub fn merge(&mut self, other: FormErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    /// `Ok(value)` when nothing was recorded.
    pub fn finish<T>(self, value: T) -> Result<T, FormErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }

    pub fn into_response(self) -> ValidationResponse {
        ValidationResponse::new(self.0)
    }
}

impl From<validator::ValidationErrors> for FormErrors {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut form_errors = FormErrors::new();

        for (field, field_errors) in errors.field_errors() {
            for error in field_errors.iter() {
                let message = error
                    .message
                    .clone()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "Invalid value".to_string());
                form_errors.add(&field, &message);
            }
        }

        form_errors
    }
}

/// Result of a form POST: a redirect once saved, or the errors to show on
/// the re-rendered form.
#[derive(Debug, Responder)]
pub enum FormOutcome {
    Saved(Redirect),
    Rejected(Json<ValidationResponse>),
}

impl FormOutcome {
    pub fn rejected(errors: FormErrors) -> Self {
        FormOutcome::Rejected(Json(errors.into_response()))
    }

    /// Domain validation failures go back to the form; anything else is an
    /// error response.
    pub fn settle(result: Result<Redirect, AppError>) -> Result<Self, ApiError> {
        match result {
            Ok(redirect) => Ok(FormOutcome::Saved(redirect)),
            Err(AppError::Validation(message)) => {
                tracing::warn!(message = %message, "Form rejected");
                let mut errors = FormErrors::new();
                errors.add(NON_FIELD_ERRORS, &message);
                Ok(FormOutcome::rejected(errors))
            }
            Err(e) => Err(e.to_validation_response()),
        }
    }
}

impl From<FormErrors> for FormOutcome {
    fn from(errors: FormErrors) -> Self {
        FormOutcome::rejected(errors)
    }
}
