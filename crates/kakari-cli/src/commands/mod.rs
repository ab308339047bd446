//! CLI command implementations.

mod auth;

pub use auth::{login, logout, register, status, whoami};

use anyhow::{Context as _, Result};
use kakari_auth::{AuthService, BootstrapOutcome};
use kakari_config::{Config, Paths};
use tracing::debug;

/// Everything a command needs: configuration and the auth service.
pub struct Context {
    pub config: Config,
    pub auth: AuthService,
}

impl Context {
    /// Load configuration, start logging, and open the persisted session.
    pub fn load(api_url: Option<&str>, log_level: Option<&str>) -> Result<Self> {
        let paths = Paths::new()?;
        let mut config = Config::load(&paths).context("Failed to load configuration")?;
        if let Some(api_url) = api_url {
            config.api_url = api_url.to_string();
            config.api_url()?;
        }

        let level = log_level.unwrap_or(&config.log_level).to_string();
        let log_file = config.log_to_file.then(|| paths.log_file());
        kakari_config::init_logging(&level, log_file.as_deref())?;

        let auth = AuthService::from_config(&config, &paths)?;
        Ok(Self { config, auth })
    }

    /// Restore the persisted session before running a command.
    async fn bootstrap(&self) -> BootstrapOutcome {
        let outcome = self.auth.bootstrap().await;
        debug!(outcome = ?outcome, "Session bootstrap finished");
        outcome
    }
}
