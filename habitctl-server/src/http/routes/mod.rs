//! Route handlers organized by resource

pub mod accounts;
pub mod health;
pub mod habits;
pub mod logs;

use serde::{Deserialize, Deserializer};

/// Distinguish an absent field (`None`) from an explicit `null` (`Some(None)`).
///
/// Use with `#[serde(default, deserialize_with = "double_option")]`.
pub(crate) fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
