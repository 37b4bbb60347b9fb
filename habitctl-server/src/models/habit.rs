//! Habit field validation

use super::ValidationError;

/// Maximum length for habit titles
const MAX_TITLE_LEN: usize = 200;

/// Validated habit title
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HabitTitle(String);

impl HabitTitle {
    /// Create a new habit title.
    ///
    /// # Rules
    /// - Non-empty (after trimming whitespace)
    /// - Max 200 characters
    ///
    /// # Example
    /// ```
    /// use habitctl_server::models::HabitTitle;
    ///
    /// assert!(HabitTitle::new("Drink water").is_ok());
    /// assert!(HabitTitle::new("").is_err());
    /// assert!(HabitTitle::new("   ").is_err());  // whitespace only
    /// ```
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        let trimmed = s.trim();

        if trimmed.is_empty() {
            return Err(ValidationError::Empty { field: "title" });
        }

        if trimmed.chars().count() > MAX_TITLE_LEN {
            return Err(ValidationError::TooLong {
                field: "title",
                max: MAX_TITLE_LEN,
            });
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Get the title as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the inner string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for HabitTitle {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalize an optional habit description.
///
/// Descriptions are free text and may be blank; only surrounding
/// whitespace is removed.
pub fn normalize_description(description: Option<String>) -> Option<String> {
    description.map(|d| d.trim().to_owned())
}
