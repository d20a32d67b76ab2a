//! # Configuration
//!
//! Loads a typed [`Config`] from environment variables, optionally seeded by
//! a `.env` file. A missing `.env` file is not an error — most deployments
//! set these variables directly in the process environment.
//!
//! ## Design Principles
//! 1. **Env-First**: every field has a `getEnv`-style fallback so the server
//!    runs with sane defaults out of the box.
//! 2. **Fail Soft on Parse, Fail Hard on Transport**: a malformed
//!    `JANITOR_INTERVAL` keeps the default and logs a warning; an
//!    unrecognized `SERVER` value is rejected at load time, since the
//!    listener has nothing sensible to bind.

use std::env;
use std::time::Duration;

use crate::duration::parse_duration;

/// Transport the listener binds. Only `tcp` is recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerType {
    Tcp,
}

/// Error returned when configuration cannot be loaded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// `SERVER` named a transport other than `tcp`.
    #[error("unrecognized SERVER transport '{0}'")]
    UnknownTransport(String),
}

/// Fully resolved server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: String,
    pub server_type: ServerType,
    pub janitor_interval: Duration,
    pub aof_path: String,
}

impl Config {
    /// Loads configuration from `.env` (if present) and the process
    /// environment, falling back to documented defaults.
    pub fn load() -> Result<Self, ConfigError> {
        if dotenvy::dotenv().is_err() {
            tracing::debug!("no .env file found, using process environment only");
        }

        let server = get_env("SERVER", "tcp");
        let server_type = match server.as_str() {
            "tcp" => ServerType::Tcp,
            other => return Err(ConfigError::UnknownTransport(other.to_string())),
        };

        Ok(Config {
            host: get_env("HOST", "localhost"),
            port: get_env("PORT", "6379"),
            server_type,
            janitor_interval: get_env_duration("JANITOR_INTERVAL", Duration::from_secs(60)),
            aof_path: get_env("AOF_PATH", "aof"),
        })
    }

    /// Returns the `host:port` string the listener should bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn get_env(key: &str, fallback: &str) -> String {
    env::var(key).unwrap_or_else(|_| fallback.to_string())
}

fn get_env_duration(key: &str, fallback: Duration) -> Duration {
    match env::var(key) {
        Ok(value) => match parse_duration(value.as_bytes()) {
            Ok(duration) => duration,
            Err(_) => {
                tracing::warn!(%key, %value, "invalid duration, keeping default");
                fallback
            }
        },
        Err(_) => fallback,
    }
}
