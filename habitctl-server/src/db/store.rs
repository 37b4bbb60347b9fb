//! HabitStore trait and the records it traffics in.
//!
//! Every habit and log query takes the caller's user id and filters by
//! ownership, so a record owned by someone else is indistinguishable from
//! a missing one.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::error::DbResult;
use crate::models::{Email, HabitTitle, Username};

/// Account record (no credentials)
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub date_joined: DateTime<Utc>,
}

/// Account record with its password hash, for login only
#[derive(Debug, Clone, FromRow)]
pub struct UserCredentials {
    #[sqlx(flatten)]
    pub user: User,
    pub password_hash: String,
}

/// Input for account creation
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: Username,
    pub email: Email,
    pub password_hash: String,
}

/// Bearer token kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

/// Token to persist; only the hash of the bearer value is stored
#[derive(Debug, Clone)]
pub struct NewToken {
    pub token_hash: String,
    pub user_id: Uuid,
    pub kind: TokenKind,
    pub expires_at: DateTime<Utc>,
}

/// Habit record from database
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Habit {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Completion record from database
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct HabitLog {
    pub id: Uuid,
    pub habit_id: Uuid,
    pub completed_date: NaiveDate,
}

/// Habit with its completion logs, oldest date first
#[derive(Debug, Clone)]
pub struct HabitWithLogs {
    pub habit: Habit,
    pub logs: Vec<HabitLog>,
}

/// Field changes for a habit update.
///
/// `description: Some(None)` clears the description; `None` leaves it.
#[derive(Debug, Clone, Default)]
pub struct HabitChanges {
    pub title: Option<HabitTitle>,
    pub description: Option<Option<String>>,
}

/// Field changes for a log update
#[derive(Debug, Clone, Default)]
pub struct LogChanges {
    pub habit_id: Option<Uuid>,
    pub completed_date: Option<NaiveDate>,
}

/// Abstract storage interface for accounts, habits and logs.
///
/// Implementations must be thread-safe (Send + Sync). Unique constraint
/// violations are reported as `DbError::UniqueViolation` carrying the
/// constraint names from [`super::error`].
#[async_trait]
pub trait HabitStore: Send + Sync + 'static {
    /// Cheap round trip used by the health check.
    async fn ping(&self) -> DbResult<()>;

    // Accounts

    async fn create_user(&self, new_user: NewUser) -> DbResult<User>;

    async fn find_credentials(&self, username: &str) -> DbResult<Option<UserCredentials>>;

    async fn get_user(&self, id: Uuid) -> DbResult<User>;

    /// Deletes the account along with its tokens, habits and logs.
    async fn delete_user(&self, id: Uuid) -> DbResult<()>;

    // Tokens

    async fn insert_token(&self, token: NewToken) -> DbResult<()>;

    /// Resolves an unexpired token of the given kind to its owner.
    async fn user_for_token(
        &self,
        token_hash: &str,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> DbResult<Option<User>>;

    /// Removes tokens that expired at or before `now`; returns the count.
    async fn purge_expired_tokens(&self, now: DateTime<Utc>) -> DbResult<u64>;

    // Habits

    /// Owner's habits, newest first, each with nested logs.
    async fn list_habits(&self, owner: Uuid) -> DbResult<Vec<HabitWithLogs>>;

    async fn create_habit(
        &self,
        owner: Uuid,
        title: HabitTitle,
        description: Option<String>,
    ) -> DbResult<Habit>;

    async fn get_habit(&self, owner: Uuid, id: Uuid) -> DbResult<HabitWithLogs>;

    async fn update_habit(
        &self,
        owner: Uuid,
        id: Uuid,
        changes: HabitChanges,
    ) -> DbResult<HabitWithLogs>;

    /// Deletes the habit and its logs.
    async fn delete_habit(&self, owner: Uuid, id: Uuid) -> DbResult<()>;

    async fn habit_owned_by(&self, owner: Uuid, habit_id: Uuid) -> DbResult<bool>;

    // Logs

    /// Owner's logs across all habits, by date then id.
    async fn list_logs(&self, owner: Uuid) -> DbResult<Vec<HabitLog>>;

    async fn log_exists(&self, habit_id: Uuid, completed_date: NaiveDate) -> DbResult<bool>;

    async fn create_log(&self, habit_id: Uuid, completed_date: NaiveDate) -> DbResult<HabitLog>;

    async fn get_log(&self, owner: Uuid, id: Uuid) -> DbResult<HabitLog>;

    async fn update_log(&self, owner: Uuid, id: Uuid, changes: LogChanges) -> DbResult<HabitLog>;

    async fn delete_log(&self, owner: Uuid, id: Uuid) -> DbResult<()>;
}

/// Group logs under their habits, preserving habit order.
pub(crate) fn attach_logs(habits: Vec<Habit>, logs: Vec<HabitLog>) -> Vec<HabitWithLogs> {
    let mut by_habit: HashMap<Uuid, Vec<HabitLog>> = HashMap::new();
    for log in logs {
        by_habit.entry(log.habit_id).or_default().push(log);
    }

    habits
        .into_iter()
        .map(|habit| {
            let logs = by_habit.remove(&habit.id).unwrap_or_default();
            HabitWithLogs { habit, logs }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn habit(title: &str) -> Habit {
        Habit {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: title.into(),
            description: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn attach_logs_groups_by_habit() {
        let a = habit("a");
        let b = habit("b");
        let day = |d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
        let logs = vec![
            HabitLog { id: Uuid::new_v4(), habit_id: a.id, completed_date: day(1) },
            HabitLog { id: Uuid::new_v4(), habit_id: b.id, completed_date: day(1) },
            HabitLog { id: Uuid::new_v4(), habit_id: a.id, completed_date: day(2) },
        ];

        let grouped = attach_logs(vec![b.clone(), a.clone()], logs);

        assert_eq!(grouped[0].habit.id, b.id);
        assert_eq!(grouped[0].logs.len(), 1);
        assert_eq!(grouped[1].habit.id, a.id);
        let dates: Vec<_> = grouped[1].logs.iter().map(|l| l.completed_date).collect();
        assert_eq!(dates, vec![day(1), day(2)]);
    }

    #[test]
    fn habit_without_logs_gets_empty_vec() {
        let grouped = attach_logs(vec![habit("lonely")], vec![]);
        assert!(grouped[0].logs.is_empty());
    }
}
