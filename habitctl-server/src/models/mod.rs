//! Domain models with validation at construction
//!
//! All user input is validated when creating these types.
//! Invalid input returns ValidationError, not panic.

pub mod validation;
pub mod account;
pub mod habit;

pub use validation::ValidationError;
pub use account::{Email, Password, Username};
pub use habit::{normalize_description, HabitTitle};
