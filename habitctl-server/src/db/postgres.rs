//! PostgreSQL store
//!
//! - Habit lists: one query for habits, one JOIN for all their logs
//! - Ownership enforced in the WHERE clause, never after the fetch
//! - Duplicate (habit, date) pairs surface from the unique constraint

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::error::{DbError, DbResult};
use super::store::{
    attach_logs, Habit, HabitChanges, HabitLog, HabitStore, HabitWithLogs, LogChanges, NewToken,
    NewUser, TokenKind, User, UserCredentials,
};
use crate::models::HabitTitle;

/// Postgres-backed [`HabitStore`]
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn logs_for_habit(&self, habit_id: Uuid) -> DbResult<Vec<HabitLog>> {
        let logs = sqlx::query_as::<_, HabitLog>(
            r#"
            SELECT id, habit_id, completed_date
            FROM habit_logs
            WHERE habit_id = $1
            ORDER BY completed_date ASC, id ASC
            "#,
        )
        .bind(habit_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(logs)
    }
}

#[async_trait]
impl HabitStore for PgStore {
    async fn ping(&self) -> DbResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn create_user(&self, new_user: NewUser) -> DbResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, username, email, date_joined
            "#,
        )
        .bind(new_user.username.as_str())
        .bind(new_user.email.as_str())
        .bind(&new_user.password_hash)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_credentials(&self, username: &str) -> DbResult<Option<UserCredentials>> {
        let creds = sqlx::query_as::<_, UserCredentials>(
            r#"
            SELECT id, username, email, date_joined, password_hash
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(creds)
    }

    async fn get_user(&self, id: Uuid) -> DbResult<User> {
        sqlx::query_as::<_, User>(
            "SELECT id, username, email, date_joined FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("user", id))
    }

    async fn delete_user(&self, id: Uuid) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("user", id));
        }
        Ok(())
    }

    async fn insert_token(&self, token: NewToken) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO auth_tokens (token_hash, user_id, kind, expires_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&token.token_hash)
        .bind(token.user_id)
        .bind(token.kind.as_str())
        .bind(token.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn user_for_token(
        &self,
        token_hash: &str,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.username, u.email, u.date_joined
            FROM auth_tokens t
            JOIN users u ON u.id = t.user_id
            WHERE t.token_hash = $1
              AND t.kind = $2
              AND t.expires_at > $3
            "#,
        )
        .bind(token_hash)
        .bind(kind.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn purge_expired_tokens(&self, now: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM auth_tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn list_habits(&self, owner: Uuid) -> DbResult<Vec<HabitWithLogs>> {
        let habits = sqlx::query_as::<_, Habit>(
            r#"
            SELECT id, user_id, title, description, created_at
            FROM habits
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        let logs = sqlx::query_as::<_, HabitLog>(
            r#"
            SELECT l.id, l.habit_id, l.completed_date
            FROM habit_logs l
            JOIN habits h ON h.id = l.habit_id
            WHERE h.user_id = $1
            ORDER BY l.completed_date ASC, l.id ASC
            "#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        Ok(attach_logs(habits, logs))
    }

    async fn create_habit(
        &self,
        owner: Uuid,
        title: HabitTitle,
        description: Option<String>,
    ) -> DbResult<Habit> {
        let habit = sqlx::query_as::<_, Habit>(
            r#"
            INSERT INTO habits (user_id, title, description)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, title, description, created_at
            "#,
        )
        .bind(owner)
        .bind(title.as_str())
        .bind(description)
        .fetch_one(&self.pool)
        .await?;

        Ok(habit)
    }

    async fn get_habit(&self, owner: Uuid, id: Uuid) -> DbResult<HabitWithLogs> {
        let habit = sqlx::query_as::<_, Habit>(
            r#"
            SELECT id, user_id, title, description, created_at
            FROM habits
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("habit", id))?;

        let logs = self.logs_for_habit(habit.id).await?;
        Ok(HabitWithLogs { habit, logs })
    }

    async fn update_habit(
        &self,
        owner: Uuid,
        id: Uuid,
        changes: HabitChanges,
    ) -> DbResult<HabitWithLogs> {
        let set_description = changes.description.is_some();
        let description = changes.description.flatten();

        let habit = sqlx::query_as::<_, Habit>(
            r#"
            UPDATE habits
            SET title = COALESCE($3, title),
                description = CASE WHEN $4::boolean THEN $5::text ELSE description END
            WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, title, description, created_at
            "#,
        )
        .bind(id)
        .bind(owner)
        .bind(changes.title.map(HabitTitle::into_string))
        .bind(set_description)
        .bind(description)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("habit", id))?;

        let logs = self.logs_for_habit(habit.id).await?;
        Ok(HabitWithLogs { habit, logs })
    }

    async fn delete_habit(&self, owner: Uuid, id: Uuid) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM habits WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("habit", id));
        }
        Ok(())
    }

    async fn habit_owned_by(&self, owner: Uuid, habit_id: Uuid) -> DbResult<bool> {
        let owned: (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM habits WHERE id = $1 AND user_id = $2)",
        )
        .bind(habit_id)
        .bind(owner)
        .fetch_one(&self.pool)
        .await?;

        Ok(owned.0)
    }

    async fn list_logs(&self, owner: Uuid) -> DbResult<Vec<HabitLog>> {
        let logs = sqlx::query_as::<_, HabitLog>(
            r#"
            SELECT l.id, l.habit_id, l.completed_date
            FROM habit_logs l
            JOIN habits h ON h.id = l.habit_id
            WHERE h.user_id = $1
            ORDER BY l.completed_date ASC, l.id ASC
            "#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        Ok(logs)
    }

    async fn log_exists(&self, habit_id: Uuid, completed_date: NaiveDate) -> DbResult<bool> {
        let exists: (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM habit_logs WHERE habit_id = $1 AND completed_date = $2)",
        )
        .bind(habit_id)
        .bind(completed_date)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists.0)
    }

    async fn create_log(&self, habit_id: Uuid, completed_date: NaiveDate) -> DbResult<HabitLog> {
        let log = sqlx::query_as::<_, HabitLog>(
            r#"
            INSERT INTO habit_logs (habit_id, completed_date)
            VALUES ($1, $2)
            RETURNING id, habit_id, completed_date
            "#,
        )
        .bind(habit_id)
        .bind(completed_date)
        .fetch_one(&self.pool)
        .await?;

        Ok(log)
    }

    async fn get_log(&self, owner: Uuid, id: Uuid) -> DbResult<HabitLog> {
        sqlx::query_as::<_, HabitLog>(
            r#"
            SELECT l.id, l.habit_id, l.completed_date
            FROM habit_logs l
            JOIN habits h ON h.id = l.habit_id
            WHERE l.id = $1 AND h.user_id = $2
            "#,
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("log", id))
    }

    async fn update_log(&self, owner: Uuid, id: Uuid, changes: LogChanges) -> DbResult<HabitLog> {
        // The join checks ownership of the log's current habit
        sqlx::query_as::<_, HabitLog>(
            r#"
            UPDATE habit_logs l
            SET habit_id = COALESCE($3, l.habit_id),
                completed_date = COALESCE($4, l.completed_date)
            FROM habits h
            WHERE l.id = $1 AND h.id = l.habit_id AND h.user_id = $2
            RETURNING l.id, l.habit_id, l.completed_date
            "#,
        )
        .bind(id)
        .bind(owner)
        .bind(changes.habit_id)
        .bind(changes.completed_date)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("log", id))
    }

    async fn delete_log(&self, owner: Uuid, id: Uuid) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            DELETE FROM habit_logs l
            USING habits h
            WHERE l.id = $1 AND h.id = l.habit_id AND h.user_id = $2
            "#,
        )
        .bind(id)
        .bind(owner)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("log", id));
        }
        Ok(())
    }
}
