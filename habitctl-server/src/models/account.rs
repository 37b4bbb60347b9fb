//! Account field validation
//!
//! Username: letters, digits and `@ . + - _`, up to 150 characters
//! Email: `local@domain.tld`, stored lower-cased
//! Password: at least 8 characters, not entirely numeric

use once_cell::sync::Lazy;
use regex::Regex;

use super::ValidationError;

const MAX_USERNAME_LEN: usize = 150;
const MAX_EMAIL_LEN: usize = 254;
const MIN_PASSWORD_LEN: usize = 8;

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w.@+-]+$").expect("invalid username regex"));

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("invalid email regex"));

/// Validated username
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Username(String);

impl Username {
    /// Create a new username.
    ///
    /// # Example
    /// ```
    /// use habitctl_server::models::Username;
    ///
    /// assert!(Username::new("alice_01").is_ok());
    /// assert!(Username::new("has space").is_err());
    /// ```
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        if s.is_empty() {
            return Err(ValidationError::Empty { field: "username" });
        }

        if s.chars().count() > MAX_USERNAME_LEN {
            return Err(ValidationError::TooLong {
                field: "username",
                max: MAX_USERNAME_LEN,
            });
        }

        if !USERNAME_RE.is_match(s) {
            return Err(ValidationError::InvalidFormat {
                field: "username",
                reason: "may contain only letters, numbers, and @/./+/-/_ characters",
            });
        }

        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Validated, lower-cased email address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Email(String);

impl Email {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        let trimmed = s.trim();

        if trimmed.is_empty() {
            return Err(ValidationError::Empty { field: "email" });
        }

        if trimmed.chars().count() > MAX_EMAIL_LEN {
            return Err(ValidationError::TooLong {
                field: "email",
                max: MAX_EMAIL_LEN,
            });
        }

        if !EMAIL_RE.is_match(trimmed) {
            return Err(ValidationError::InvalidFormat {
                field: "email",
                reason: "enter a valid email address",
            });
        }

        Ok(Self(trimmed.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Plaintext password that passed the strength rules.
///
/// Never stored; hashed by [`crate::auth::hash_password`].
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        if s.is_empty() {
            return Err(ValidationError::Empty { field: "password" });
        }

        if s.chars().count() < MIN_PASSWORD_LEN {
            return Err(ValidationError::TooShort {
                field: "password",
                min: MIN_PASSWORD_LEN,
            });
        }

        if s.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError::InvalidFormat {
                field: "password",
                reason: "password is entirely numeric",
            });
        }

        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(***)")
    }
}
