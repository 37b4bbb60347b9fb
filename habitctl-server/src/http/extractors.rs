//! Custom Axum extractors

use std::sync::Arc;

use axum::extract::{FromRequest, FromRequestParts, Path};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::Utc;
use uuid::Uuid;

use super::error::ApiError;
use super::server::AppState;
use crate::auth::hash_token;
use crate::db::{TokenKind, User};
use crate::models::ValidationError;

/// Authenticated caller, resolved from `Authorization: Bearer <access token>`.
///
/// Rejects with 401 before the handler body runs.
pub struct AuthUser(pub User);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(ApiError::Unauthorized {
                reason: "authentication credentials were not provided",
            })?;

        let token = bearer_token(header.to_str().unwrap_or_default()).ok_or(
            ApiError::Unauthorized {
                reason: "authorization header must use the Bearer scheme",
            },
        )?;
        let token_hash = hash_token(token);

        let user = state
            .store
            .user_for_token(&token_hash, TokenKind::Access, Utc::now())
            .await?
            .ok_or(ApiError::Unauthorized {
                reason: "token is invalid or expired",
            })?;

        tracing::debug!(user_id = %user.id, "authenticated request");
        Ok(Self(user))
    }
}

/// Pull the credential out of a `Bearer <token>` header value.
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// JSON body whose decode failures become 400 `validation_error` responses
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ValidJson<T>(pub T);

/// Extract and validate a UUID from path
pub struct ValidUuid(pub Uuid);

impl<S> FromRequestParts<S> for ValidUuid
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id): Path<String> = Path::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::Validation(ValidationError::Empty { field: "id" }))?;

        let uuid = Uuid::parse_str(&id).map_err(|_| {
            ApiError::Validation(ValidationError::InvalidFormat {
                field: "id",
                reason: "invalid UUID format",
            })
        })?;

        Ok(Self(uuid))
    }
}
