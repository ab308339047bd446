//! Configuration management for the Kakari client.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Default identity service base URL (can be overridden at compile time via KAKARI_API_URL env var).
pub const DEFAULT_API_URL: &str = match option_env!("KAKARI_API_URL") {
    Some(url) => url,
    None => "http://localhost:8000/api/v1",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Route unauthenticated users are sent to.
pub const DEFAULT_LOGIN_PATH: &str = "/login";

/// Route authenticated users land on when they open a public-only page.
pub const DEFAULT_LANDING_PATH: &str = "/";

/// How credentials are encoded on the login exchange.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginEncoding {
    /// `application/x-www-form-urlencoded`, as read by OAuth2 password-flow endpoints.
    #[default]
    Form,
    /// `application/json` body.
    Json,
}

/// Main client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Identity service base URL; `/auth/login` and `/user/me` are resolved against it.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Body encoding for the login exchange.
    #[serde(default)]
    pub login_encoding: LoginEncoding,
    /// Redirect target for guarded routes when signed out.
    #[serde(default = "default_login_path")]
    pub login_path: String,
    /// Redirect target for public-only routes when signed in.
    #[serde(default = "default_landing_path")]
    pub landing_path: String,
    /// Overrides the persisted session file location.
    #[serde(default)]
    pub session_file: Option<PathBuf>,
    /// Also write JSONL logs to `~/.kakari/logs/kakari.jsonl`.
    #[serde(default)]
    pub log_to_file: bool,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_login_path() -> String {
    DEFAULT_LOGIN_PATH.to_string()
}

fn default_landing_path() -> String {
    DEFAULT_LANDING_PATH.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            api_url: default_api_url(),
            login_encoding: LoginEncoding::default(),
            login_path: default_login_path(),
            landing_path: default_landing_path(),
            session_file: None,
            log_to_file: false,
        }
    }
}

impl Config {
    /// Load configuration from `~/.kakari/config.json`, falling back to defaults,
    /// then apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.api_url()?;

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Override fields from `KAKARI_*` variables resolved through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| {
            lookup(name)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(log_level) = non_empty("KAKARI_LOG_LEVEL") {
            self.log_level = log_level;
        }
        if let Some(api_url) = non_empty("KAKARI_API_URL") {
            self.api_url = api_url;
        }
        if let Some(session_file) = non_empty("KAKARI_SESSION_FILE") {
            self.session_file = Some(PathBuf::from(session_file));
        }
    }

    /// Get the identity service URL as a parsed URL.
    pub fn api_url(&self) -> CoreResult<Url> {
        let url = Url::parse(&self.api_url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(CoreError::Config(format!(
                "api_url must be http(s), got {}",
                url.scheme()
            )));
        }
        Ok(url)
    }

    /// Resolve where the session tokens are persisted.
    pub fn session_file(&self, paths: &Paths) -> PathBuf {
        self.session_file
            .clone()
            .unwrap_or_else(|| paths.session_file())
    }
}
