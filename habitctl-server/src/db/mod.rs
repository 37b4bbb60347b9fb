//! Database layer - connection pool, schema, and store implementations
//!
//! # Design Principles
//!
//! - Connection pool (max 5 connections by default)
//! - Habit lists fetch logs in one extra query, not one per habit
//! - Every habit/log query is scoped to the owning user
//! - Unique constraints are the final word on duplicates

pub mod error;
pub mod memory;
pub mod migrations;
pub mod pool;
pub mod postgres;
pub mod store;

pub use error::{DbError, DbResult, EMAIL_CONSTRAINT, HABIT_LOG_DATE_CONSTRAINT, USERNAME_CONSTRAINT};
pub use memory::MemoryStore;
pub use pool::{create_pool, create_pool_with_options, DEFAULT_MAX_CONNECTIONS};
pub use postgres::PgStore;
pub use store::{
    Habit, HabitChanges, HabitLog, HabitStore, HabitWithLogs, LogChanges, NewToken, NewUser,
    TokenKind, User, UserCredentials,
};
