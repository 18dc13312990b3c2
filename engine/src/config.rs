use crate::soundcard::Soundcard;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub const LOG_ENV: &str = "RACKWIRE_LOG";
pub const PRETTY_JSON_ENV: &str = "RACKWIRE_PRETTY_JSON";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub log_level: String,
    /// Indent saved projects.
    pub pretty_json: bool,
    pub soundcard: Soundcard,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            pretty_json: false,
            soundcard: Soundcard::default(),
        }
    }
}

pub fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| {
            let s = v.trim().to_ascii_lowercase();
            s == "1" || s == "true" || s == "yes" || s == "on"
        })
        .unwrap_or(false)
}

impl EngineConfig {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Reads `path` when given, then applies the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_toml(&std::fs::read_to_string(path)?)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    pub fn apply_env(&mut self) {
        if env_flag(PRETTY_JSON_ENV) {
            self.pretty_json = true;
        }
        if let Ok(level) = std::env::var(LOG_ENV) {
            let level = level.trim();
            if !level.is_empty() {
                self.log_level = level.to_string();
            }
        }
    }
}
