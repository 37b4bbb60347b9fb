//! Habit endpoints
//!
//! Every query is scoped to the authenticated caller; another user's habit
//! answers 404 exactly like a missing one.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::double_option;
use super::logs::LogResponse;
use crate::db::{HabitChanges, HabitWithLogs};
use crate::http::error::ApiError;
use crate::http::extractors::{AuthUser, ValidJson, ValidUuid};
use crate::http::server::AppState;
use crate::models::{normalize_description, HabitTitle, ValidationError};

/// Create habit request.
///
/// Ownership, id, timestamps and logs are server-controlled; any such
/// fields in the body are ignored.
#[derive(Deserialize)]
pub struct CreateHabitRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Update habit request (PUT requires `title`, PATCH requires nothing)
#[derive(Deserialize, Default)]
pub struct UpdateHabitRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
}

impl UpdateHabitRequest {
    fn into_changes(self) -> Result<HabitChanges, ValidationError> {
        let title = self.title.as_deref().map(HabitTitle::new).transpose()?;
        let description = self.description.map(normalize_description);
        Ok(HabitChanges { title, description })
    }
}

/// Habit response with nested logs
#[derive(Serialize)]
pub struct HabitResponse {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub created_at: String,
    pub logs: Vec<LogResponse>,
}

impl From<HabitWithLogs> for HabitResponse {
    fn from(h: HabitWithLogs) -> Self {
        Self {
            id: h.habit.id,
            title: h.habit.title,
            description: h.habit.description,
            created_at: h.habit.created_at.to_rfc3339(),
            logs: h.logs.into_iter().map(LogResponse::from).collect(),
        }
    }
}

/// GET /api/habits - list the caller's habits, newest first
async fn list_habits(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<HabitResponse>>, ApiError> {
    let habits = state.store.list_habits(user.id).await?;
    Ok(Json(habits.into_iter().map(HabitResponse::from).collect()))
}

/// POST /api/habits - create a habit owned by the caller
async fn create_habit(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ValidJson(req): ValidJson<CreateHabitRequest>,
) -> Result<(StatusCode, Json<HabitResponse>), ApiError> {
    let title = HabitTitle::new(&req.title)?;
    let description = normalize_description(req.description);

    let habit = state
        .store
        .create_habit(user.id, title, description)
        .await?;

    tracing::info!(user_id = %user.id, habit_id = %habit.id, "habit created");
    let response = HabitResponse::from(HabitWithLogs {
        habit,
        logs: Vec::new(),
    });
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/habits/{id} - a single habit with its logs
async fn get_habit(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ValidUuid(id): ValidUuid,
) -> Result<Json<HabitResponse>, ApiError> {
    let habit = state.store.get_habit(user.id, id).await?;
    Ok(Json(HabitResponse::from(habit)))
}

/// PUT /api/habits/{id} - full update
async fn replace_habit(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ValidUuid(id): ValidUuid,
    ValidJson(req): ValidJson<UpdateHabitRequest>,
) -> Result<Json<HabitResponse>, ApiError> {
    if req.title.is_none() {
        return Err(ValidationError::Missing { field: "title" }.into());
    }
    let changes = req.into_changes()?;
    let habit = state.store.update_habit(user.id, id, changes).await?;
    Ok(Json(HabitResponse::from(habit)))
}

/// PATCH /api/habits/{id} - partial update
async fn patch_habit(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ValidUuid(id): ValidUuid,
    ValidJson(req): ValidJson<UpdateHabitRequest>,
) -> Result<Json<HabitResponse>, ApiError> {
    let changes = req.into_changes()?;
    let habit = state.store.update_habit(user.id, id, changes).await?;
    Ok(Json(HabitResponse::from(habit)))
}

/// DELETE /api/habits/{id} - delete a habit and its logs
async fn delete_habit(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ValidUuid(id): ValidUuid,
) -> Result<StatusCode, ApiError> {
    state.store.delete_habit(user.id, id).await?;
    tracing::info!(user_id = %user.id, habit_id = %id, "habit deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Habit routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/habits", get(list_habits).post(create_habit))
        .route(
            "/habits/{id}",
            get(get_habit)
                .put(replace_habit)
                .patch(patch_habit)
                .delete(delete_habit),
        )
}
