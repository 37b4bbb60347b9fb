//! API error types with IntoResponse
//!
//! Errors are converted to JSON responses with appropriate status codes.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::NaiveDate;
use serde_json::json;

use crate::auth::AuthError;
use crate::db::{DbError, EMAIL_CONSTRAINT, HABIT_LOG_DATE_CONSTRAINT, USERNAME_CONSTRAINT};
use crate::models::ValidationError;

/// API error type with automatic HTTP status mapping
#[derive(Debug)]
pub enum ApiError {
    /// Validation failed (400)
    Validation(ValidationError),

    /// Habit already logged for that date (400)
    DuplicateLog { completed_date: Option<NaiveDate> },

    /// Missing or bad credentials (401)
    Unauthorized { reason: &'static str },

    /// Resource not found or owned by someone else (404)
    NotFound { resource: &'static str, id: String },

    /// Database error (500, logged)
    Database(DbError),

    /// Internal error (500)
    Internal { message: String },
}

impl ApiError {
    pub fn duplicate_log(completed_date: NaiveDate) -> Self {
        Self::DuplicateLog {
            completed_date: Some(completed_date),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::Validation(e) => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": "validation_error",
                    "message": e.to_string()
                }),
            ),
            Self::DuplicateLog { completed_date } => {
                let message = match completed_date {
                    Some(date) => format!("habit already completed on {}", date),
                    None => "habit already completed on that date".to_owned(),
                };
                (
                    StatusCode::BAD_REQUEST,
                    json!({
                        "error": "duplicate",
                        "message": message
                    }),
                )
            }
            Self::Unauthorized { reason } => (
                StatusCode::UNAUTHORIZED,
                json!({
                    "error": "unauthorized",
                    "message": reason
                }),
            ),
            Self::NotFound { resource, id } => (
                StatusCode::NOT_FOUND,
                json!({
                    "error": "not_found",
                    "message": format!("{} '{}' not found", resource, id)
                }),
            ),
            Self::Database(e) => {
                // Log the actual error, return generic message
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "error": "internal_error",
                        "message": "an internal error occurred"
                    }),
                )
            }
            Self::Internal { message } => {
                tracing::error!("Internal error: {}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "error": "internal_error",
                        "message": "an internal error occurred"
                    }),
                )
            }
        };

        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                axum::http::header::WWW_AUTHENTICATE,
                axum::http::HeaderValue::from_static("Bearer"),
            );
        }
        response
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        if e.violates(HABIT_LOG_DATE_CONSTRAINT) {
            return Self::DuplicateLog {
                completed_date: None,
            };
        }
        if e.violates(USERNAME_CONSTRAINT) {
            return Self::Validation(ValidationError::Taken { field: "username" });
        }
        if e.violates(EMAIL_CONSTRAINT) {
            return Self::Validation(ValidationError::Taken { field: "email" });
        }
        match e {
            DbError::NotFound { resource, id } => Self::NotFound { resource, id },
            _ => Self::Database(e),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        Self::Internal {
            message: e.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(ValidationError::Malformed {
            message: rejection.body_text(),
        })
    }
}
