//! Account endpoints: registration, token issue/refresh, current user

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{hash_password, hash_token, issue_token, verify_credentials, TokenPair};
use crate::db::{NewUser, TokenKind, User};
use crate::http::error::ApiError;
use crate::http::extractors::{AuthUser, ValidJson};
use crate::http::server::AppState;
use crate::models::{Email, Password, Username};

const BAD_CREDENTIALS: &str = "no active account found with the given credentials";

/// Registration request
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Login request
#[derive(Deserialize)]
pub struct TokenRequest {
    pub username: String,
    pub password: String,
}

/// Refresh request
#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

/// Fresh access token
#[derive(Serialize)]
pub struct AccessResponse {
    pub access: String,
}

/// Account response (never includes credentials)
#[derive(Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub date_joined: String,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            date_joined: u.date_joined.to_rfc3339(),
        }
    }
}

/// POST /api/register - create an account
async fn register(
    State(state): State<Arc<AppState>>,
    ValidJson(req): ValidJson<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let username = Username::new(&req.username)?;
    let email = Email::new(&req.email)?;
    let password = Password::new(&req.password)?;

    // Argon2 hashing blocks; run it off the async workers
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ApiError::Internal {
            message: format!("password hashing task failed: {}", e),
        })??;

    let user = state
        .store
        .create_user(NewUser {
            username,
            email,
            password_hash,
        })
        .await?;

    tracing::info!(user_id = %user.id, username = %user.username, "account registered");
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

async fn purge_expired(state: &AppState, now: DateTime<Utc>) -> Result<(), ApiError> {
    let purged = state.store.purge_expired_tokens(now).await?;
    if purged > 0 {
        tracing::debug!(purged, "expired tokens removed");
    }
    Ok(())
}

/// POST /api/token - exchange credentials for an access/refresh pair
async fn obtain_token(
    State(state): State<Arc<AppState>>,
    ValidJson(req): ValidJson<TokenRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    let creds = state.store.find_credentials(&req.username).await?;

    // Unknown usernames still pay for one Argon2 run
    let stored_hash = creds.as_ref().map(|c| c.password_hash.clone());
    let verified = tokio::task::spawn_blocking(move || {
        verify_credentials(&req.password, stored_hash.as_deref())
    })
    .await
    .map_err(|e| ApiError::Internal {
        message: format!("password verification task failed: {}", e),
    })?;

    let creds = match creds {
        Some(creds) if verified => creds,
        _ => {
            tracing::debug!(username = %req.username, "login rejected");
            return Err(ApiError::Unauthorized {
                reason: BAD_CREDENTIALS,
            });
        }
    };

    let now = Utc::now();
    purge_expired(&state, now).await?;

    let store = state.store.as_ref();
    let access = issue_token(store, &state.auth, creds.user.id, TokenKind::Access, now).await?;
    let refresh = issue_token(store, &state.auth, creds.user.id, TokenKind::Refresh, now).await?;

    tracing::info!(user_id = %creds.user.id, "tokens issued");
    Ok(Json(TokenPair { access, refresh }))
}

/// POST /api/token/refresh - exchange a refresh token for a new access token
async fn refresh_token(
    State(state): State<Arc<AppState>>,
    ValidJson(req): ValidJson<RefreshRequest>,
) -> Result<Json<AccessResponse>, ApiError> {
    let now = Utc::now();
    let user = state
        .store
        .user_for_token(&hash_token(req.refresh.trim()), TokenKind::Refresh, now)
        .await?
        .ok_or(ApiError::Unauthorized {
            reason: "token is invalid or expired",
        })?;

    purge_expired(&state, now).await?;

    let access = issue_token(
        state.store.as_ref(),
        &state.auth,
        user.id,
        TokenKind::Access,
        now,
    )
    .await?;

    Ok(Json(AccessResponse { access }))
}

/// GET /api/me - the authenticated account
async fn me(AuthUser(user): AuthUser) -> Json<UserResponse> {
    Json(UserResponse::from(user))
}

/// DELETE /api/me - delete the account and everything it owns
async fn delete_me(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<StatusCode, ApiError> {
    state.store.delete_user(user.id).await?;
    tracing::info!(user_id = %user.id, "account deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Account routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/token", post(obtain_token))
        .route("/token/refresh", post(refresh_token))
        .route("/me", get(me).delete(delete_me))
}
