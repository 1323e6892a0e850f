use rand::RngCore;
use rusqlite::{params, OptionalExtension};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::domain::SessionIdentity;
use crate::error::AppError;
use crate::repo::SqliteStore;
use crate::store::Authenticator;

fn hash_password(salt_hex: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt_hex.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn new_salt() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Create a local account. Usernames are unique and stored as given (trimmed).
pub fn register_user(store: &SqliteStore, username: &str, password: &str) -> Result<(), AppError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(AppError::missing_field("username"));
    }
    if password.is_empty() {
        return Err(AppError::missing_field("password"));
    }

    let salt = new_salt();
    let digest = hash_password(&salt, password);
    store
        .connection()
        .execute(
            "INSERT INTO users(username, salt, password_sha256) VALUES (?1, ?2, ?3)",
            params![username, salt, digest],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                AppError::new("AUTH_USER_EXISTS", "User already exists")
                    .with_details(format!("username={username}"))
            }
            other => AppError::new("DB_WRITE_FAILED", "Failed to create user")
                .with_details(other.to_string()),
        })?;

    info!(username, "registered local user");
    Ok(())
}

impl Authenticator for SqliteStore {
    fn check_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<SessionIdentity>, AppError> {
        let row: Option<(String, String)> = self
            .connection()
            .query_row(
                "SELECT salt, password_sha256 FROM users WHERE username = ?1",
                [username.trim()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| {
                AppError::new("DB_QUERY_FAILED", "Failed to look up user")
                    .with_details(e.to_string())
            })?;

        match row {
            Some((salt, digest)) if hash_password(&salt, password) == digest => {
                Ok(Some(SessionIdentity {
                    username: username.trim().to_string(),
                }))
            }
            _ => {
                warn!(username, "rejected credentials");
                Ok(None)
            }
        }
    }
}
