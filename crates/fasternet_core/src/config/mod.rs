use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::UtcOffset;
use tracing::debug;

use crate::error::AppError;
use crate::lifecycle::DeleteConfirmation;
use crate::normalize::timestamps::parse_utc_offset;
use crate::theme::Theme;

pub const DEFAULT_CONFIG_FILE: &str = "fasternet.json";
pub const DEFAULT_DB_FILE: &str = "fasternet.sqlite";
pub const DEFAULT_STATE_FILE: &str = ".fasternet-state.json";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Hosted store URL, first non-empty wins.
pub const URL_ENV_VARS: [&str; 4] = [
    "FASTERNET_SUPABASE_URL",
    "REACT_APP_SUPABASE_URL",
    "NEXT_PUBLIC_SUPABASE_URL",
    "VITE_SUPABASE_URL",
];

/// Hosted store API key, first non-empty wins.
pub const KEY_ENV_VARS: [&str; 6] = [
    "FASTERNET_SUPABASE_KEY",
    "REACT_APP_SUPABASE_ANON_KEY",
    "REACT_APP_SUPABASE_KEY",
    "NEXT_PUBLIC_SUPABASE_ANON_KEY",
    "NEXT_PUBLIC_SUPABASE_KEY",
    "VITE_SUPABASE_KEY",
];

pub const DB_PATH_ENV_VAR: &str = "FASTERNET_DB_PATH";
pub const UTC_OFFSET_ENV_VAR: &str = "FASTERNET_UTC_OFFSET";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreConfig {
    Local {
        db_path: PathBuf,
    },
    Remote {
        url: String,
        api_key: String,
        #[serde(default = "default_timeout_ms")]
        timeout_ms: u64,
    },
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Local {
            db_path: PathBuf::from(DEFAULT_DB_FILE),
        }
    }
}

/// Everything the front end needs, resolved once at startup and passed down explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
    /// Offset used for form-style timestamps and for display, `+HH:MM`.
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,
    #[serde(default)]
    pub delete_confirmation: DeleteConfirmation,
    /// Theme used until the user picks one.
    #[serde(default)]
    pub default_theme: Theme,
}

fn default_state_path() -> PathBuf {
    PathBuf::from(DEFAULT_STATE_FILE)
}

fn default_utc_offset() -> String {
    "+00:00".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            state_path: default_state_path(),
            utc_offset: default_utc_offset(),
            delete_confirmation: DeleteConfirmation::default(),
            default_theme: Theme::default(),
        }
    }
}

fn first_non_empty(lookup: &dyn Fn(&str) -> Option<String>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| lookup(k))
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

impl AppConfig {
    /// Read a JSON config file. An explicit path must exist; without one, `fasternet.json` in
    /// the working directory is used when present, defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        if !path.exists() {
            if required {
                return Err(AppError::new("CONFIG_NOT_FOUND", "Config file not found")
                    .with_details(path.display().to_string()));
            }
            debug!("no config file; using defaults");
            return Ok(Self::default());
        }

        let text = fs::read_to_string(&path).map_err(|e| {
            AppError::new("CONFIG_READ_FAILED", "Failed to read config file")
                .with_details(format!("path={}; err={e}", path.display()))
        })?;
        let config: AppConfig = serde_json::from_str(&text).map_err(|e| {
            AppError::new("CONFIG_PARSE_FAILED", "Config file is not valid")
                .with_details(format!("path={}; err={e}", path.display()))
        })?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Apply environment overrides through `lookup` (normally `std::env::var`).
    ///
    /// A hosted store URL switches the store to remote; its key comes from the key variables
    /// or, failing that, from an already configured remote store.
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let url = first_non_empty(&lookup, &URL_ENV_VARS);
        let key = first_non_empty(&lookup, &KEY_ENV_VARS);
        match (url, &mut self.store) {
            (Some(url), store) => {
                let (prev_key, timeout_ms) = match store {
                    StoreConfig::Remote {
                        api_key,
                        timeout_ms,
                        ..
                    } => (api_key.clone(), *timeout_ms),
                    StoreConfig::Local { .. } => (String::new(), DEFAULT_TIMEOUT_MS),
                };
                *store = StoreConfig::Remote {
                    url,
                    api_key: key.unwrap_or(prev_key),
                    timeout_ms,
                };
            }
            (None, StoreConfig::Remote { api_key, .. }) => {
                if let Some(key) = key {
                    *api_key = key;
                }
            }
            (None, store @ StoreConfig::Local { .. }) => {
                if let Some(db_path) = first_non_empty(&lookup, &[DB_PATH_ENV_VAR]) {
                    *store = StoreConfig::Local {
                        db_path: PathBuf::from(db_path),
                    };
                }
            }
        }

        if let Some(offset) = first_non_empty(&lookup, &[UTC_OFFSET_ENV_VAR]) {
            self.utc_offset = offset;
        }
        self
    }

    pub fn offset(&self) -> Result<UtcOffset, AppError> {
        parse_utc_offset(&self.utc_offset)
    }

    /// Reject settings that cannot work before any store call is attempted.
    pub fn validate(&self) -> Result<(), AppError> {
        self.offset()?;
        if let StoreConfig::Remote { url, api_key, .. } = &self.store {
            if url.trim().is_empty() {
                return Err(AppError::new("STORE_CONFIG_INVALID", "Hosted store URL is empty"));
            }
            if api_key.trim().is_empty() {
                return Err(AppError::new("STORE_CONFIG_INVALID", "Hosted store key is missing")
                    .with_details(format!("set one of: {}", KEY_ENV_VARS.join(", "))));
            }
        }
        if self.delete_confirmation.token.is_empty() {
            return Err(AppError::new(
                "CONFIG_INVALID",
                "Delete confirmation token must not be empty",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_to_local_store() {
        let config = AppConfig::default().with_env_overrides(env(&[]));
        assert_eq!(config.store, StoreConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn url_env_switches_to_remote_with_fallback_key_names() {
        let config = AppConfig::default().with_env_overrides(env(&[
            ("REACT_APP_SUPABASE_URL", "https://x.supabase.co"),
            ("FASTERNET_SUPABASE_KEY", "  "),
            ("REACT_APP_SUPABASE_KEY", "anon"),
        ]));
        assert_eq!(
            config.store,
            StoreConfig::Remote {
                url: "https://x.supabase.co".to_string(),
                api_key: "anon".to_string(),
                timeout_ms: DEFAULT_TIMEOUT_MS,
            }
        );
    }

    #[test]
    fn remote_without_key_is_invalid() {
        let config = AppConfig::default()
            .with_env_overrides(env(&[("VITE_SUPABASE_URL", "https://x.supabase.co")]));
        assert_eq!(config.validate().unwrap_err().code, "STORE_CONFIG_INVALID");
    }

    #[test]
    fn parses_partial_json() {
        let config: AppConfig = serde_json::from_str(
            r#"{ "utc_offset": "-03:00", "delete_confirmation": { "token": "delete" } }"#,
        )
        .unwrap();
        assert_eq!(config.offset().unwrap(), time::macros::offset!(-3));
        assert!(config.delete_confirmation.case_sensitive);
        assert_eq!(config.store, StoreConfig::default());
    }
}
