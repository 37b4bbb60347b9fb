//! habitctl-server: habit tracking HTTP backend
//!
//! Users register, create habits, and record one completion per habit per
//! day. Storage sits behind [`db::HabitStore`] with Postgres and in-memory
//! implementations; the HTTP surface lives in [`http`].

pub mod auth;
pub mod db;
pub mod http;
pub mod models;

pub use db::{HabitStore, MemoryStore, PgStore};
pub use http::{build_router, run_server, AppState, ServerConfig};
