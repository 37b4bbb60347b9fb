//! Habit log endpoints
//!
//! A log is visible only when its parent habit belongs to the caller.
//! Creation checks for an existing (habit, date) pair before inserting;
//! the unique constraint catches whoever loses the race in between.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::double_option;
use crate::db::{DbError, HabitLog, LogChanges, HABIT_LOG_DATE_CONSTRAINT};
use crate::http::error::ApiError;
use crate::http::extractors::{AuthUser, ValidJson, ValidUuid};
use crate::http::server::AppState;
use crate::models::ValidationError;

/// Create log request; `completed_date` defaults to today
#[derive(Deserialize)]
pub struct CreateLogRequest {
    pub habit: Uuid,
    #[serde(default)]
    pub completed_date: Option<NaiveDate>,
}

/// Update log request (PUT requires `habit`, PATCH requires nothing).
///
/// Both columns are NOT NULL, so an explicit `null` is rejected rather
/// than read as "unchanged".
#[derive(Deserialize, Default)]
pub struct UpdateLogRequest {
    #[serde(default, deserialize_with = "double_option")]
    pub habit: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "double_option")]
    pub completed_date: Option<Option<NaiveDate>>,
}

fn non_null<T>(value: Option<Option<T>>, field: &'static str) -> Result<Option<T>, ValidationError> {
    match value {
        Some(None) => Err(ValidationError::Null { field }),
        other => Ok(other.flatten()),
    }
}

/// Log response
#[derive(Debug, Serialize)]
pub struct LogResponse {
    pub id: Uuid,
    pub habit: Uuid,
    pub completed_date: NaiveDate,
}

impl From<HabitLog> for LogResponse {
    fn from(l: HabitLog) -> Self {
        Self {
            id: l.id,
            habit: l.habit_id,
            completed_date: l.completed_date,
        }
    }
}

/// Reject habit ids the caller does not own, without revealing whether
/// the habit exists under another account.
async fn ensure_habit_owned(state: &AppState, owner: Uuid, habit_id: Uuid) -> Result<(), ApiError> {
    if state.store.habit_owned_by(owner, habit_id).await? {
        Ok(())
    } else {
        Err(ValidationError::UnknownReference {
            field: "habit",
            id: habit_id.to_string(),
        }
        .into())
    }
}

fn duplicate_or(err: DbError, completed_date: NaiveDate) -> ApiError {
    if err.violates(HABIT_LOG_DATE_CONSTRAINT) {
        ApiError::duplicate_log(completed_date)
    } else {
        err.into()
    }
}

/// GET /api/logs - list logs across the caller's habits
async fn list_logs(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<LogResponse>>, ApiError> {
    let logs = state.store.list_logs(user.id).await?;
    Ok(Json(logs.into_iter().map(LogResponse::from).collect()))
}

/// POST /api/logs - mark a habit done for a date
async fn create_log(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ValidJson(req): ValidJson<CreateLogRequest>,
) -> Result<(StatusCode, Json<LogResponse>), ApiError> {
    let completed_date = req.completed_date.unwrap_or_else(|| state.today());

    ensure_habit_owned(&state, user.id, req.habit).await?;

    if state.store.log_exists(req.habit, completed_date).await? {
        tracing::debug!(habit_id = %req.habit, %completed_date, "duplicate completion rejected");
        return Err(ApiError::duplicate_log(completed_date));
    }

    let log = state
        .store
        .create_log(req.habit, completed_date)
        .await
        .map_err(|e| duplicate_or(e, completed_date))?;

    tracing::info!(habit_id = %log.habit_id, log_id = %log.id, %completed_date, "habit completed");
    Ok((StatusCode::CREATED, Json(LogResponse::from(log))))
}

/// GET /api/logs/{id}
async fn get_log(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ValidUuid(id): ValidUuid,
) -> Result<Json<LogResponse>, ApiError> {
    let log = state.store.get_log(user.id, id).await?;
    Ok(Json(LogResponse::from(log)))
}

async fn apply_log_update(
    state: &AppState,
    owner: Uuid,
    id: Uuid,
    req: UpdateLogRequest,
) -> Result<LogResponse, ApiError> {
    let habit = non_null(req.habit, "habit")?;
    let completed_date = non_null(req.completed_date, "completed_date")?;

    let current = state.store.get_log(owner, id).await?;

    if let Some(habit_id) = habit {
        if habit_id != current.habit_id {
            ensure_habit_owned(state, owner, habit_id).await?;
        }
    }

    let target_date = completed_date.unwrap_or(current.completed_date);
    let changes = LogChanges {
        habit_id: habit,
        completed_date,
    };
    let log = state
        .store
        .update_log(owner, id, changes)
        .await
        .map_err(|e| duplicate_or(e, target_date))?;

    Ok(LogResponse::from(log))
}

/// PUT /api/logs/{id} - full update
async fn replace_log(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ValidUuid(id): ValidUuid,
    ValidJson(req): ValidJson<UpdateLogRequest>,
) -> Result<Json<LogResponse>, ApiError> {
    if req.habit.is_none() {
        return Err(ValidationError::Missing { field: "habit" }.into());
    }
    Ok(Json(apply_log_update(&state, user.id, id, req).await?))
}

/// PATCH /api/logs/{id} - partial update
async fn patch_log(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ValidUuid(id): ValidUuid,
    ValidJson(req): ValidJson<UpdateLogRequest>,
) -> Result<Json<LogResponse>, ApiError> {
    Ok(Json(apply_log_update(&state, user.id, id, req).await?))
}

/// DELETE /api/logs/{id}
async fn delete_log(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ValidUuid(id): ValidUuid,
) -> Result<StatusCode, ApiError> {
    state.store.delete_log(user.id, id).await?;
    tracing::debug!(user_id = %user.id, log_id = %id, "log deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Log routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/logs", get(list_logs).post(create_log))
        .route(
            "/logs/{id}",
            get(get_log)
                .put(replace_log)
                .patch(patch_log)
                .delete(delete_log),
        )
}
