use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tracing::{debug, info};

use crate::domain::SessionIdentity;
use crate::error::{AppError, AUTH_FAILED, AUTH_REQUIRED};
use crate::normalize::timestamps::wire;
use crate::store::Authenticator;
use crate::theme::Theme;

pub const SESSION_LIFETIME: Duration = Duration::days(7);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub username: String,
    #[serde(with = "wire")]
    pub expires_at: OffsetDateTime,
}

impl Session {
    pub fn start(identity: SessionIdentity, now: OffsetDateTime) -> Self {
        Self {
            username: identity.username,
            expires_at: now + SESSION_LIFETIME,
        }
    }

    pub fn is_live(&self, now: OffsetDateTime) -> bool {
        now < self.expires_at
    }
}

/// Per-user front-end state kept between runs: the login session and the chosen theme.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocalState {
    #[serde(default)]
    pub session: Option<Session>,
    #[serde(default)]
    pub theme: Theme,
}

impl LocalState {
    pub fn with_theme(theme: Theme) -> Self {
        Self {
            session: None,
            theme,
        }
    }

    /// The live session, or `AUTH_REQUIRED`.
    pub fn require_session(&self, now: OffsetDateTime) -> Result<&Session, AppError> {
        match &self.session {
            Some(s) if s.is_live(now) => Ok(s),
            Some(s) => Err(AppError::new(AUTH_REQUIRED, "Session expired; log in again")
                .with_details(format!("username={}", s.username))),
            None => Err(AppError::new(AUTH_REQUIRED, "Not logged in")),
        }
    }

    /// Check credentials with the auth collaborator and start a session on success.
    pub fn login(
        &mut self,
        auth: &dyn Authenticator,
        username: &str,
        password: &str,
        now: OffsetDateTime,
    ) -> Result<&Session, AppError> {
        let identity = auth.check_credentials(username, password)?.ok_or_else(|| {
            AppError::new(AUTH_FAILED, "Incorrect username or password")
                .with_details(format!("username={}", username.trim()))
        })?;
        info!(username = %identity.username, "logged in");
        Ok(&*self.session.insert(Session::start(identity, now)))
    }

    /// Drop the session; the theme stays.
    pub fn logout(&mut self) {
        if let Some(s) = self.session.take() {
            info!(username = %s.username, "logged out");
        }
    }

    pub fn toggle_theme(&mut self) -> Theme {
        self.theme = self.theme.toggled();
        self.theme
    }
}

/// Read state from `path`. A missing file yields fresh state with `default_theme`.
pub fn load_state(path: &Path, default_theme: Theme) -> Result<LocalState, AppError> {
    if !path.exists() {
        debug!(path = %path.display(), "no saved state; starting fresh");
        return Ok(LocalState::with_theme(default_theme));
    }
    let text = fs::read_to_string(path).map_err(|e| {
        AppError::new("SESSION_READ_FAILED", "Failed to read session state")
            .with_details(format!("path={}; err={e}", path.display()))
    })?;
    serde_json::from_str(&text).map_err(|e| {
        AppError::new("SESSION_DECODE_FAILED", "Session state file is malformed")
            .with_details(format!("path={}; err={e}", path.display()))
    })
}

pub fn save_state(path: &Path, state: &LocalState) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            AppError::new("SESSION_WRITE_FAILED", "Failed to create session directory")
                .with_details(format!("path={}; err={e}", parent.display()))
        })?;
    }
    let json = serde_json::to_string_pretty(state).map_err(|e| {
        AppError::new("SESSION_WRITE_FAILED", "Failed to encode session state")
            .with_details(e.to_string())
    })?;
    fs::write(path, json).map_err(|e| {
        AppError::new("SESSION_WRITE_FAILED", "Failed to write session state")
            .with_details(format!("path={}; err={e}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn session_expires_after_seven_days() {
        let now = datetime!(2024-01-01 0:00 UTC);
        let s = Session::start(
            SessionIdentity {
                username: "ana".to_string(),
            },
            now,
        );
        assert!(s.is_live(now + Duration::days(6)));
        assert!(!s.is_live(now + Duration::days(7)));
    }

    #[test]
    fn logout_keeps_theme() {
        let mut state = LocalState::with_theme(Theme::Light);
        state.session = Some(Session {
            username: "ana".to_string(),
            expires_at: datetime!(2024-01-08 0:00 UTC),
        });
        state.logout();
        assert_eq!(state.session, None);
        assert_eq!(state.theme, Theme::Light);
        assert_eq!(
            state
                .require_session(datetime!(2024-01-01 0:00 UTC))
                .unwrap_err()
                .code,
            AUTH_REQUIRED
        );
    }
}
