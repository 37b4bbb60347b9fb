//! Opaque bearer tokens

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::db::{DbResult, HabitStore, NewToken, TokenKind};

const TOKEN_BYTES: usize = 32;

/// Token lifetimes
#[derive(Debug, Clone, Copy)]
pub struct AuthSettings {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl AuthSettings {
    pub fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            access_ttl: Duration::minutes(60),
            refresh_ttl: Duration::days(1),
        }
    }
}

/// Access + refresh pair returned on login
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Generate a fresh URL-safe bearer value.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Digest stored in place of the bearer value.
pub fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

/// Mint a token of `kind` for `user_id` and persist its digest.
pub async fn issue_token(
    store: &dyn HabitStore,
    settings: &AuthSettings,
    user_id: Uuid,
    kind: TokenKind,
    now: DateTime<Utc>,
) -> DbResult<String> {
    let token = generate_token();
    store
        .insert_token(NewToken {
            token_hash: hash_token(&token),
            user_id,
            kind,
            expires_at: now + settings.ttl(kind),
        })
        .await?;

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStore, NewUser};
    use crate::models::{Email, Username};

    #[test]
    fn tokens_are_unique_and_url_safe() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn hash_is_stable_hex() {
        let digest = hash_token("abc");
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn issued_token_resolves_until_expiry() {
        let store = MemoryStore::new();
        let user = store
            .create_user(NewUser {
                username: Username::new("alice").unwrap(),
                email: Email::new("alice@example.com").unwrap(),
                password_hash: "hash".into(),
            })
            .await
            .unwrap();
        let settings = AuthSettings::default();
        let now = Utc::now();

        let token = issue_token(&store, &settings, user.id, TokenKind::Access, now)
            .await
            .unwrap();

        let found = store
            .user_for_token(&hash_token(&token), TokenKind::Access, now)
            .await
            .unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));

        let later = now + settings.access_ttl + Duration::seconds(1);
        assert!(store
            .user_for_token(&hash_token(&token), TokenKind::Access, later)
            .await
            .unwrap()
            .is_none());
    }
}
