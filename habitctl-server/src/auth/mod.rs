//! Credentials: password hashing and opaque bearer tokens
//!
//! Passwords are stored as Argon2 PHC strings. Bearer tokens are random
//! 32-byte values handed to the client once; only their SHA-256 digest is
//! persisted.

pub mod password;
pub mod token;

pub use password::{hash_password, verify_credentials, verify_password, AuthError};
pub use token::{generate_token, hash_token, issue_token, AuthSettings, TokenPair};
