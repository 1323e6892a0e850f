use fasternet_core::domain::SessionIdentity;
use fasternet_core::error::AppError;
use fasternet_core::store::Authenticator;
use serde::Deserialize;
use tracing::warn;

use crate::client::{eq, QueryPairs, RestClient};

pub const USERS_TABLE: &str = "users";

pub fn credentials_query(username: &str, password: &str) -> QueryPairs {
    vec![
        ("select", "username".to_string()),
        ("username", eq(username)),
        ("password", eq(password)),
    ]
}

#[derive(Debug, Deserialize)]
struct UserRow {
    username: String,
}

/// Checks credentials against the hosted `users` table. Exactly one matching row is a success.
#[derive(Debug, Clone)]
pub struct RestAuthenticator {
    client: RestClient,
}

impl RestAuthenticator {
    pub fn new(client: RestClient) -> Self {
        Self { client }
    }
}

impl Authenticator for RestAuthenticator {
    fn check_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<SessionIdentity>, AppError> {
        let rows: Vec<UserRow> = self
            .client
            .get(USERS_TABLE, &credentials_query(username.trim(), password))?;
        match rows.as_slice() {
            [row] => Ok(Some(SessionIdentity {
                username: row.username.clone(),
            })),
            _ => {
                warn!(username, matches = rows.len(), "rejected hosted credentials");
                Ok(None)
            }
        }
    }
}
