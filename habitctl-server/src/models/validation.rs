//! Validation error types

use std::fmt;

/// Validation error for domain models
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Required field was not supplied
    Missing { field: &'static str },

    /// Field was sent as an explicit null but cannot be cleared
    Null { field: &'static str },

    /// Field is empty when it shouldn't be
    Empty { field: &'static str },

    /// Field exceeds maximum length
    TooLong { field: &'static str, max: usize },

    /// Field is shorter than the minimum length
    TooShort { field: &'static str, min: usize },

    /// String doesn't match required format
    InvalidFormat { field: &'static str, reason: &'static str },

    /// Referenced object does not exist (or is not visible to the caller)
    UnknownReference { field: &'static str, id: String },

    /// Unique field already used by another record
    Taken { field: &'static str },

    /// Request body could not be decoded
    Malformed { message: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing { field } => write!(f, "{} is required", field),
            Self::Null { field } => write!(f, "{} may not be null", field),
            Self::Empty { field } => write!(f, "{} cannot be empty", field),
            Self::TooLong { field, max } => {
                write!(f, "{} exceeds maximum length of {} characters", field, max)
            }
            Self::TooShort { field, min } => {
                write!(f, "{} must be at least {} characters", field, min)
            }
            Self::InvalidFormat { field, reason } => {
                write!(f, "{}: {}", field, reason)
            }
            Self::UnknownReference { field, id } => {
                write!(f, "invalid {} '{}': object does not exist", field, id)
            }
            Self::Taken { field } => write!(f, "a user with that {} already exists", field),
            Self::Malformed { message } => write!(f, "malformed request: {}", message),
        }
    }
}

impl std::error::Error for ValidationError {}
