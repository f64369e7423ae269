//! Application configuration.

use serde::Deserialize;
use std::path::Path;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Redis configuration. When absent, realtime events stay in-process.
    #[serde(default)]
    pub redis: Option<RedisConfig>,
    /// Polling policy.
    #[serde(default)]
    pub polling: PollingConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Redis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL.
    pub url: String,
    /// Key prefix for all Pub/Sub channels.
    #[serde(default = "default_redis_prefix")]
    pub prefix: String,
}

/// What happens when a participant answers a poll they already answered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResubmissionPolicy {
    /// Replace the stored payload with the new one.
    #[default]
    Overwrite,
    /// Keep the first answer and report a conflict.
    Reject,
}

/// Polling policy knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    /// Length of generated session join codes.
    #[serde(default = "default_join_code_length")]
    pub join_code_length: usize,
    /// How many fresh codes to try before giving up on a session insert.
    #[serde(default = "default_join_code_max_attempts")]
    pub join_code_max_attempts: u32,
    /// Whether a session may have more than one published poll at a time.
    #[serde(default = "default_true")]
    pub allow_concurrent_published: bool,
    /// Resubmission handling.
    #[serde(default)]
    pub resubmission: ResubmissionPolicy,
}

/// Bounds for `join_code_length`. The upper bound is the width of the
/// `session.join_code` column.
pub const JOIN_CODE_LENGTH_RANGE: std::ops::RangeInclusive<usize> = 4..=16;

impl PollingConfig {
    /// Reject settings that would make every session insert fail.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if !JOIN_CODE_LENGTH_RANGE.contains(&self.join_code_length) {
            return Err(config::ConfigError::Message(format!(
                "polling.join_code_length must be between {} and {}, got {}",
                JOIN_CODE_LENGTH_RANGE.start(),
                JOIN_CODE_LENGTH_RANGE.end(),
                self.join_code_length
            )));
        }
        if self.join_code_max_attempts == 0 {
            return Err(config::ConfigError::Message(
                "polling.join_code_max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            join_code_length: default_join_code_length(),
            join_code_max_attempts: default_join_code_max_attempts(),
            allow_concurrent_published: true,
            resubmission: ResubmissionPolicy::Overwrite,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON log lines instead of the human-readable format.
    #[serde(default)]
    pub json: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_max_connections() -> u32 {
    20
}

const fn default_min_connections() -> u32 {
    2
}

fn default_redis_prefix() -> String {
    "livepoll".to_string()
}

const fn default_join_code_length() -> usize {
    6
}

const fn default_join_code_max_attempts() -> u32 {
    8
}

const fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `.env` (if present)
    /// 2. `config/default.toml`
    /// 3. `config/{environment}.toml` (based on `LIVEPOLL_ENV`)
    /// 4. Environment variables with `LIVEPOLL__` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let _ = dotenvy::dotenv();
        let env = std::env::var("LIVEPOLL_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("LIVEPOLL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Self::finish(config)
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("LIVEPOLL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Self::finish(config)
    }

    fn finish(source: config::Config) -> Result<Self, config::ConfigError> {
        let config: Self = source.try_deserialize()?;
        config.polling.validate()?;
        Ok(config)
    }
}
