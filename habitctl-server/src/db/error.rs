//! Storage error type shared by every store implementation

use thiserror::Error;

/// Unique constraint on `users.username`
pub const USERNAME_CONSTRAINT: &str = "users_username_key";

/// Unique constraint on `users.email`
pub const EMAIL_CONSTRAINT: &str = "users_email_key";

/// Unique constraint on `habit_logs (habit_id, completed_date)`
pub const HABIT_LOG_DATE_CONSTRAINT: &str = "habit_logs_habit_date_key";

/// Database error type
#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(sqlx::Error),

    #[error("not found: {resource} '{id}'")]
    NotFound { resource: &'static str, id: String },

    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },
}

impl DbError {
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    pub fn unique(constraint: &str) -> Self {
        Self::UniqueViolation {
            constraint: constraint.to_owned(),
        }
    }

    /// True when this error is a violation of the named unique constraint.
    pub fn violates(&self, constraint: &str) -> bool {
        matches!(self, Self::UniqueViolation { constraint: c } if c == constraint)
    }
}

impl From<sqlx::Error> for DbError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.is_unique_violation() {
                return Self::UniqueViolation {
                    constraint: db_err.constraint().unwrap_or_default().to_owned(),
                };
            }
        }
        Self::Sqlx(e)
    }
}

pub type DbResult<T> = Result<T, DbError>;
