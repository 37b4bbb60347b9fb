//! In-memory store for tests and local development.
//!
//! All tables live behind a single `RwLock`, so a check-then-insert under
//! one write guard is atomic and unique constraints hold the same way they
//! do in Postgres. Cascades are applied by hand.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::error::{
    DbError, DbResult, EMAIL_CONSTRAINT, HABIT_LOG_DATE_CONSTRAINT, USERNAME_CONSTRAINT,
};
use super::store::{
    attach_logs, Habit, HabitChanges, HabitLog, HabitStore, HabitWithLogs, LogChanges, NewToken,
    NewUser, TokenKind, User, UserCredentials,
};
use crate::models::HabitTitle;

#[derive(Debug, Clone)]
struct StoredToken {
    user_id: Uuid,
    kind: TokenKind,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<Uuid, UserCredentials>,
    tokens: HashMap<String, StoredToken>,
    habits: HashMap<Uuid, Habit>,
    logs: HashMap<Uuid, HabitLog>,
}

impl Tables {
    fn owns_habit(&self, owner: Uuid, habit_id: Uuid) -> bool {
        self.habits
            .get(&habit_id)
            .is_some_and(|h| h.user_id == owner)
    }

    fn date_taken(&self, habit_id: Uuid, date: NaiveDate, except: Option<Uuid>) -> bool {
        self.logs.values().any(|l| {
            l.habit_id == habit_id && l.completed_date == date && Some(l.id) != except
        })
    }

    fn owned_logs(&self, owner: Uuid) -> Vec<HabitLog> {
        let mut logs: Vec<HabitLog> = self
            .logs
            .values()
            .filter(|l| self.owns_habit(owner, l.habit_id))
            .cloned()
            .collect();
        sort_logs(&mut logs);
        logs
    }

    fn logs_for_habit(&self, habit_id: Uuid) -> Vec<HabitLog> {
        let mut logs: Vec<HabitLog> = self
            .logs
            .values()
            .filter(|l| l.habit_id == habit_id)
            .cloned()
            .collect();
        sort_logs(&mut logs);
        logs
    }

    fn remove_habit(&mut self, habit_id: Uuid) {
        self.habits.remove(&habit_id);
        self.logs.retain(|_, l| l.habit_id != habit_id);
    }
}

fn sort_logs(logs: &mut [HabitLog]) {
    logs.sort_by(|a, b| {
        a.completed_date
            .cmp(&b.completed_date)
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// In-memory implementation of [`HabitStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory store wrapped in Arc.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl HabitStore for MemoryStore {
    async fn ping(&self) -> DbResult<()> {
        Ok(())
    }

    async fn create_user(&self, new_user: NewUser) -> DbResult<User> {
        let mut tables = self.tables.write().await;

        if tables
            .users
            .values()
            .any(|c| c.user.username == new_user.username.as_str())
        {
            return Err(DbError::unique(USERNAME_CONSTRAINT));
        }
        if tables
            .users
            .values()
            .any(|c| c.user.email == new_user.email.as_str())
        {
            return Err(DbError::unique(EMAIL_CONSTRAINT));
        }

        let user = User {
            id: Uuid::new_v4(),
            username: new_user.username.as_str().to_owned(),
            email: new_user.email.as_str().to_owned(),
            date_joined: Utc::now(),
        };
        tables.users.insert(
            user.id,
            UserCredentials {
                user: user.clone(),
                password_hash: new_user.password_hash,
            },
        );

        Ok(user)
    }

    async fn find_credentials(&self, username: &str) -> DbResult<Option<UserCredentials>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|c| c.user.username == username)
            .cloned())
    }

    async fn get_user(&self, id: Uuid) -> DbResult<User> {
        let tables = self.tables.read().await;
        tables
            .users
            .get(&id)
            .map(|c| c.user.clone())
            .ok_or_else(|| DbError::not_found("user", id))
    }

    async fn delete_user(&self, id: Uuid) -> DbResult<()> {
        let mut tables = self.tables.write().await;

        if tables.users.remove(&id).is_none() {
            return Err(DbError::not_found("user", id));
        }

        tables.tokens.retain(|_, t| t.user_id != id);
        let owned: Vec<Uuid> = tables
            .habits
            .values()
            .filter(|h| h.user_id == id)
            .map(|h| h.id)
            .collect();
        for habit_id in owned {
            tables.remove_habit(habit_id);
        }

        Ok(())
    }

    async fn insert_token(&self, token: NewToken) -> DbResult<()> {
        let mut tables = self.tables.write().await;

        if !tables.users.contains_key(&token.user_id) {
            return Err(DbError::not_found("user", token.user_id));
        }
        tables.tokens.insert(
            token.token_hash,
            StoredToken {
                user_id: token.user_id,
                kind: token.kind,
                expires_at: token.expires_at,
            },
        );

        Ok(())
    }

    async fn user_for_token(
        &self,
        token_hash: &str,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> DbResult<Option<User>> {
        let tables = self.tables.read().await;

        let user = tables
            .tokens
            .get(token_hash)
            .filter(|t| t.kind == kind && t.expires_at > now)
            .and_then(|t| tables.users.get(&t.user_id))
            .map(|c| c.user.clone());

        Ok(user)
    }

    async fn purge_expired_tokens(&self, now: DateTime<Utc>) -> DbResult<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.tokens.len();
        tables.tokens.retain(|_, t| t.expires_at > now);
        Ok((before - tables.tokens.len()) as u64)
    }

    async fn list_habits(&self, owner: Uuid) -> DbResult<Vec<HabitWithLogs>> {
        let tables = self.tables.read().await;

        let mut habits: Vec<Habit> = tables
            .habits
            .values()
            .filter(|h| h.user_id == owner)
            .cloned()
            .collect();
        habits.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        Ok(attach_logs(habits, tables.owned_logs(owner)))
    }

    async fn create_habit(
        &self,
        owner: Uuid,
        title: HabitTitle,
        description: Option<String>,
    ) -> DbResult<Habit> {
        let mut tables = self.tables.write().await;

        if !tables.users.contains_key(&owner) {
            return Err(DbError::not_found("user", owner));
        }

        let habit = Habit {
            id: Uuid::new_v4(),
            user_id: owner,
            title: title.into_string(),
            description,
            created_at: Utc::now(),
        };
        tables.habits.insert(habit.id, habit.clone());

        Ok(habit)
    }

    async fn get_habit(&self, owner: Uuid, id: Uuid) -> DbResult<HabitWithLogs> {
        let tables = self.tables.read().await;

        let habit = tables
            .habits
            .get(&id)
            .filter(|h| h.user_id == owner)
            .cloned()
            .ok_or_else(|| DbError::not_found("habit", id))?;
        let logs = tables.logs_for_habit(id);

        Ok(HabitWithLogs { habit, logs })
    }

    async fn update_habit(
        &self,
        owner: Uuid,
        id: Uuid,
        changes: HabitChanges,
    ) -> DbResult<HabitWithLogs> {
        let mut tables = self.tables.write().await;

        let habit = tables
            .habits
            .get_mut(&id)
            .filter(|h| h.user_id == owner)
            .ok_or_else(|| DbError::not_found("habit", id))?;

        if let Some(title) = changes.title {
            habit.title = title.into_string();
        }
        if let Some(description) = changes.description {
            habit.description = description;
        }
        let habit = habit.clone();
        let logs = tables.logs_for_habit(id);

        Ok(HabitWithLogs { habit, logs })
    }

    async fn delete_habit(&self, owner: Uuid, id: Uuid) -> DbResult<()> {
        let mut tables = self.tables.write().await;

        if !tables.owns_habit(owner, id) {
            return Err(DbError::not_found("habit", id));
        }
        tables.remove_habit(id);

        Ok(())
    }

    async fn habit_owned_by(&self, owner: Uuid, habit_id: Uuid) -> DbResult<bool> {
        Ok(self.tables.read().await.owns_habit(owner, habit_id))
    }

    async fn list_logs(&self, owner: Uuid) -> DbResult<Vec<HabitLog>> {
        Ok(self.tables.read().await.owned_logs(owner))
    }

    async fn log_exists(&self, habit_id: Uuid, completed_date: NaiveDate) -> DbResult<bool> {
        Ok(self
            .tables
            .read()
            .await
            .date_taken(habit_id, completed_date, None))
    }

    async fn create_log(&self, habit_id: Uuid, completed_date: NaiveDate) -> DbResult<HabitLog> {
        let mut tables = self.tables.write().await;

        if !tables.habits.contains_key(&habit_id) {
            return Err(DbError::not_found("habit", habit_id));
        }
        if tables.date_taken(habit_id, completed_date, None) {
            return Err(DbError::unique(HABIT_LOG_DATE_CONSTRAINT));
        }

        let log = HabitLog {
            id: Uuid::new_v4(),
            habit_id,
            completed_date,
        };
        tables.logs.insert(log.id, log.clone());

        Ok(log)
    }

    async fn get_log(&self, owner: Uuid, id: Uuid) -> DbResult<HabitLog> {
        let tables = self.tables.read().await;

        tables
            .logs
            .get(&id)
            .filter(|l| tables.owns_habit(owner, l.habit_id))
            .cloned()
            .ok_or_else(|| DbError::not_found("log", id))
    }

    async fn update_log(&self, owner: Uuid, id: Uuid, changes: LogChanges) -> DbResult<HabitLog> {
        let mut tables = self.tables.write().await;

        let current = tables
            .logs
            .get(&id)
            .filter(|l| tables.owns_habit(owner, l.habit_id))
            .cloned()
            .ok_or_else(|| DbError::not_found("log", id))?;

        let habit_id = changes.habit_id.unwrap_or(current.habit_id);
        let completed_date = changes.completed_date.unwrap_or(current.completed_date);

        if !tables.habits.contains_key(&habit_id) {
            return Err(DbError::not_found("habit", habit_id));
        }
        if tables.date_taken(habit_id, completed_date, Some(id)) {
            return Err(DbError::unique(HABIT_LOG_DATE_CONSTRAINT));
        }

        let updated = HabitLog {
            id,
            habit_id,
            completed_date,
        };
        tables.logs.insert(id, updated.clone());

        Ok(updated)
    }

    async fn delete_log(&self, owner: Uuid, id: Uuid) -> DbResult<()> {
        let mut tables = self.tables.write().await;

        let owned = tables
            .logs
            .get(&id)
            .is_some_and(|l| tables.owns_habit(owner, l.habit_id));
        if !owned {
            return Err(DbError::not_found("log", id));
        }
        tables.logs.remove(&id);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use crate::models::{Email, Username};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    async fn user(store: &MemoryStore, name: &str) -> User {
        store
            .create_user(NewUser {
                username: Username::new(name).unwrap(),
                email: Email::new(&format!("{}@example.com", name)).unwrap(),
                password_hash: "hash".into(),
            })
            .await
            .unwrap()
    }

    async fn habit(store: &MemoryStore, owner: &User, title: &str) -> Habit {
        store
            .create_habit(owner.id, HabitTitle::new(title).unwrap(), None)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn rejects_duplicate_username_and_email() {
        let store = MemoryStore::new();
        user(&store, "alice").await;

        let err = store
            .create_user(NewUser {
                username: Username::new("alice").unwrap(),
                email: Email::new("other@example.com").unwrap(),
                password_hash: "hash".into(),
            })
            .await
            .unwrap_err();
        assert!(err.violates(USERNAME_CONSTRAINT));

        let err = store
            .create_user(NewUser {
                username: Username::new("alice2").unwrap(),
                email: Email::new("ALICE@example.com").unwrap(),
                password_hash: "hash".into(),
            })
            .await
            .unwrap_err();
        assert!(err.violates(EMAIL_CONSTRAINT));
    }

    #[tokio::test]
    async fn duplicate_log_violates_constraint() {
        let store = MemoryStore::new();
        let alice = user(&store, "alice").await;
        let h = habit(&store, &alice, "Drink water").await;

        store.create_log(h.id, day(1)).await.unwrap();
        let err = store.create_log(h.id, day(1)).await.unwrap_err();

        assert!(err.violates(HABIT_LOG_DATE_CONSTRAINT));
        assert_eq!(store.list_logs(alice.id).await.unwrap().len(), 1);
        assert!(store.log_exists(h.id, day(1)).await.unwrap());
        assert!(!store.log_exists(h.id, day(2)).await.unwrap());
    }

    #[tokio::test]
    async fn deleting_habit_removes_logs() {
        let store = MemoryStore::new();
        let alice = user(&store, "alice").await;
        let h = habit(&store, &alice, "Stretch").await;
        store.create_log(h.id, day(1)).await.unwrap();
        store.create_log(h.id, day(2)).await.unwrap();

        store.delete_habit(alice.id, h.id).await.unwrap();

        assert!(store.list_logs(alice.id).await.unwrap().is_empty());
        assert!(!store.log_exists(h.id, day(1)).await.unwrap());
    }

    #[tokio::test]
    async fn deleting_user_cascades() {
        let store = MemoryStore::new();
        let alice = user(&store, "alice").await;
        let h = habit(&store, &alice, "Read").await;
        store.create_log(h.id, day(1)).await.unwrap();
        store
            .insert_token(NewToken {
                token_hash: "t".into(),
                user_id: alice.id,
                kind: TokenKind::Access,
                expires_at: Utc::now() + Duration::hours(1),
            })
            .await
            .unwrap();

        store.delete_user(alice.id).await.unwrap();

        assert!(store.list_habits(alice.id).await.unwrap().is_empty());
        assert!(!store.log_exists(h.id, day(1)).await.unwrap());
        assert!(store
            .user_for_token("t", TokenKind::Access, Utc::now())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn other_users_cannot_see_or_touch_records() {
        let store = MemoryStore::new();
        let alice = user(&store, "alice").await;
        let bob = user(&store, "bob").await;
        let h = habit(&store, &alice, "Meditate").await;
        let log = store.create_log(h.id, day(1)).await.unwrap();

        assert!(store.list_habits(bob.id).await.unwrap().is_empty());
        assert!(store.list_logs(bob.id).await.unwrap().is_empty());
        assert!(matches!(
            store.get_habit(bob.id, h.id).await,
            Err(DbError::NotFound { .. })
        ));
        assert!(matches!(
            store.delete_habit(bob.id, h.id).await,
            Err(DbError::NotFound { .. })
        ));
        assert!(matches!(
            store.get_log(bob.id, log.id).await,
            Err(DbError::NotFound { .. })
        ));
        assert!(matches!(
            store.delete_log(bob.id, log.id).await,
            Err(DbError::NotFound { .. })
        ));
        assert!(store.get_habit(alice.id, h.id).await.is_ok());
    }

    #[tokio::test]
    async fn habits_listed_newest_first_with_sorted_logs() {
        let store = MemoryStore::new();
        let alice = user(&store, "alice").await;
        let first = habit(&store, &alice, "First").await;
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let second = habit(&store, &alice, "Second").await;
        store.create_log(first.id, day(3)).await.unwrap();
        store.create_log(first.id, day(1)).await.unwrap();

        let habits = store.list_habits(alice.id).await.unwrap();

        assert_eq!(habits[0].habit.id, second.id);
        assert_eq!(habits[1].habit.id, first.id);
        let dates: Vec<_> = habits[1].logs.iter().map(|l| l.completed_date).collect();
        assert_eq!(dates, vec![day(1), day(3)]);
    }

    #[tokio::test]
    async fn update_log_respects_uniqueness() {
        let store = MemoryStore::new();
        let alice = user(&store, "alice").await;
        let h = habit(&store, &alice, "Walk").await;
        store.create_log(h.id, day(1)).await.unwrap();
        let second = store.create_log(h.id, day(2)).await.unwrap();

        let err = store
            .update_log(
                alice.id,
                second.id,
                LogChanges {
                    completed_date: Some(day(1)),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(err.violates(HABIT_LOG_DATE_CONSTRAINT));

        // Re-saving the same date is not a conflict with itself
        let same = store
            .update_log(
                alice.id,
                second.id,
                LogChanges {
                    completed_date: Some(day(2)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(same.completed_date, day(2));
    }

    #[tokio::test]
    async fn update_habit_clears_description() {
        let store = MemoryStore::new();
        let alice = user(&store, "alice").await;
        let h = store
            .create_habit(
                alice.id,
                HabitTitle::new("Journal").unwrap(),
                Some("nightly".into()),
            )
            .await
            .unwrap();

        let updated = store
            .update_habit(
                alice.id,
                h.id,
                HabitChanges {
                    title: None,
                    description: Some(None),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.habit.title, "Journal");
        assert_eq!(updated.habit.description, None);
    }

    #[tokio::test]
    async fn tokens_expire_and_respect_kind() {
        let store = MemoryStore::new();
        let alice = user(&store, "alice").await;
        let now = Utc::now();
        store
            .insert_token(NewToken {
                token_hash: "fresh".into(),
                user_id: alice.id,
                kind: TokenKind::Refresh,
                expires_at: now + Duration::minutes(5),
            })
            .await
            .unwrap();
        store
            .insert_token(NewToken {
                token_hash: "stale".into(),
                user_id: alice.id,
                kind: TokenKind::Access,
                expires_at: now - Duration::minutes(5),
            })
            .await
            .unwrap();

        let found = store
            .user_for_token("fresh", TokenKind::Refresh, now)
            .await
            .unwrap();
        assert_eq!(found.map(|u| u.id), Some(alice.id));
        assert!(store
            .user_for_token("fresh", TokenKind::Access, now)
            .await
            .unwrap()
            .is_none());
        assert!(store
            .user_for_token("stale", TokenKind::Access, now)
            .await
            .unwrap()
            .is_none());

        assert_eq!(store.purge_expired_tokens(now).await.unwrap(), 1);
    }
}
