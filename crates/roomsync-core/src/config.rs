//! Configuration module for roomsync
//!
//! Settings are merged from built-in defaults, an optional TOML file and
//! `ROOMSYNC_`-prefixed environment variables, in that order. Nested keys
//! use a double underscore in the environment, e.g. `ROOMSYNC_LOGGING__LEVEL`.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use ruma::{OwnedUserId, UserId};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, instrument};

use crate::{Result, RoomsyncError};

/// Client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Matrix user id the client syncs for
    pub user_id: String,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or `EnvFilter` directive
    pub level: String,

    /// Log format: `compact` or `json`
    pub format: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_id: "@roomsync:localhost".to_string(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

impl ClientConfig {
    /// Load configuration, optionally layering a TOML file over the defaults
    #[instrument(level = "debug")]
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(ClientConfig::default()));
        if let Some(path) = path {
            if !path.exists() {
                return Err(RoomsyncError::Config(format!(
                    "Config file does not exist: {}",
                    path.display()
                )));
            }
            debug!("🔧 Reading config file {}", path.display());
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed("ROOMSYNC_").split("__"));

        let config: ClientConfig = figment
            .extract()
            .map_err(|e| RoomsyncError::Config(format!("Failed to load configuration: {}", e)))?;
        config.validate()?;

        info!("✅ Configuration loaded for {}", config.user_id);
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.parsed_user_id()?;
        match self.logging.format.as_str() {
            "compact" | "json" => Ok(()),
            other => Err(RoomsyncError::Config(format!("Unknown log format: {}", other))),
        }
    }

    /// The configured user id as a Matrix identifier
    pub fn parsed_user_id(&self) -> Result<OwnedUserId> {
        UserId::parse(self.user_id.as_str())
            .map_err(|e| RoomsyncError::Config(format!("Invalid user id {}: {}", self.user_id, e)))
    }
}
