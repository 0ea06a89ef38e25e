//! Studio configuration
//!
//! Loaded from a TOML file, then overridden by `STUDIO_*` environment
//! variables. Every section has working defaults so an empty file is valid.
//!
//! ```toml
//! [sync]
//! debounce_ms = 500
//! error_clear_ms = 3000
//! missing_timestamp = "treat_as_stale"
//!
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//!
//! [rate_limit]
//! max_requests = 120
//! window_secs = 60
//!
//! [auth.tokens]
//! "dev-token" = "01HZX3J6Q5N9V2W8R4T7Y1K0M3"
//! ```

use crate::types::OwnerId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Path that failed
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// File is not valid TOML for this schema
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Environment override could not be parsed
    #[error("invalid value for {key}: {value}")]
    InvalidEnv {
        /// Variable name
        key: String,
        /// Raw value
        value: String,
    },

    /// Value parses but cannot be used
    #[error("invalid setting {key}: {reason}")]
    Invalid {
        /// Setting name
        key: &'static str,
        /// What is wrong with it
        reason: &'static str,
    },
}

/// What to do when a record carries no usable last-modified timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingTimestampPolicy {
    /// A remote snapshot without a timestamp never applies; a local state
    /// without one accepts any timestamped snapshot
    #[default]
    TreatAsStale,
    /// Missing timestamps compare as epoch 0
    TreatAsEpoch,
    /// Any missing timestamp lets the remote snapshot through
    AlwaysApply,
}

/// Auto-save synchronizer settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Quiet period before accumulated edits are written
    pub debounce_ms: u64,
    /// How long the error indicator stays up after a failed write
    pub error_clear_ms: u64,
    /// Missing-timestamp policy for remote reconciliation
    pub missing_timestamp: MissingTimestampPolicy,
}

impl SyncConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With debounce delay
    #[inline]
    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce_ms = u64::try_from(debounce.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With error indicator lifetime
    #[inline]
    #[must_use]
    pub fn with_error_clear(mut self, error_clear: Duration) -> Self {
        self.error_clear_ms = u64::try_from(error_clear.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With missing-timestamp policy
    #[inline]
    #[must_use]
    pub fn with_missing_timestamp(mut self, policy: MissingTimestampPolicy) -> Self {
        self.missing_timestamp = policy;
        self
    }

    /// Debounce delay
    #[inline]
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Error indicator lifetime
    #[inline]
    #[must_use]
    pub fn error_clear(&self) -> Duration {
        Duration::from_millis(self.error_clear_ms)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            error_clear_ms: 3_000,
            missing_timestamp: MissingTimestampPolicy::default(),
        }
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind host
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Maximum accepted request body in bytes
    pub max_body_bytes: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_body_bytes: 64 * 1024,
        }
    }
}

/// Fixed-window rate limit settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests allowed per key per window
    pub max_requests: u32,
    /// Window length in seconds
    pub window_secs: u64,
}

impl RateLimitConfig {
    /// Window length
    #[inline]
    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 120,
            window_secs: 60,
        }
    }
}

/// Profile store settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// How long applied mutation ids are remembered
    pub idempotency_ttl_secs: u64,
    /// Maximum remembered mutation ids
    pub idempotency_capacity: u64,
    /// Buffered change notifications per record
    pub feed_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            idempotency_ttl_secs: 600,
            idempotency_capacity: 10_000,
            feed_capacity: 64,
        }
    }
}

/// Bearer token table
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Token to owner mapping
    pub tokens: HashMap<String, OwnerId>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("tokens", &format_args!("<{} redacted>", self.tokens.len()))
            .finish()
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    /// Synchronizer
    pub sync: SyncConfig,
    /// HTTP listener
    pub server: ServerConfig,
    /// Rate limiting
    pub rate_limit: RateLimitConfig,
    /// Authentication
    pub auth: AuthConfig,
    /// Profile store
    pub store: StoreConfig,
}

impl StudioConfig {
    /// Parse configuration from TOML text
    ///
    /// # Errors
    /// - `ConfigError::Parse` if the text does not match the schema
    /// - `ConfigError::Invalid` if a setting is out of range
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check settings that parse but cannot be used
    ///
    /// # Errors
    /// `ConfigError::Invalid` naming the first unusable setting
    pub fn validate(&self) -> Result<(), ConfigError> {
        let zero = "must be greater than zero";
        if self.sync.debounce_ms == 0 {
            return Err(ConfigError::Invalid { key: "sync.debounce_ms", reason: zero });
        }
        if self.rate_limit.window_secs == 0 {
            return Err(ConfigError::Invalid { key: "rate_limit.window_secs", reason: zero });
        }
        if self.rate_limit.max_requests == 0 {
            return Err(ConfigError::Invalid { key: "rate_limit.max_requests", reason: zero });
        }
        Ok(())
    }

    /// Load configuration from a TOML file
    ///
    /// # Errors
    /// `ConfigError::Io`, `ConfigError::Parse` or `ConfigError::Invalid`
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        info!(path = %path.display(), "loaded configuration file");
        Self::from_toml_str(&text)
    }

    /// Apply `STUDIO_*` overrides from the process environment
    ///
    /// # Errors
    /// `ConfigError::InvalidEnv` if a variable is set but unparsable
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup
    ///
    /// # Errors
    /// - `ConfigError::InvalidEnv` if a variable is set but unparsable
    /// - `ConfigError::Invalid` if an override leaves a setting out of range
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("STUDIO_HOST") {
            self.server.host = host;
        }
        override_parsed(&lookup, "STUDIO_PORT", &mut self.server.port)?;
        override_parsed(&lookup, "STUDIO_DEBOUNCE_MS", &mut self.sync.debounce_ms)?;
        override_parsed(&lookup, "STUDIO_ERROR_CLEAR_MS", &mut self.sync.error_clear_ms)?;
        override_parsed(
            &lookup,
            "STUDIO_RATE_LIMIT_MAX_REQUESTS",
            &mut self.rate_limit.max_requests,
        )?;
        override_parsed(
            &lookup,
            "STUDIO_RATE_LIMIT_WINDOW_SECS",
            &mut self.rate_limit.window_secs,
        )?;
        self.validate()?;
        Ok(self)
    }

    /// Address string for the listener
    #[inline]
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn override_parsed<F, T>(lookup: &F, key: &str, slot: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let Some(raw) = lookup(key) else {
        return Ok(());
    };

    match raw.trim().parse() {
        Ok(value) => {
            info!(key, "applied environment override");
            *slot = value;
            Ok(())
        }
        Err(_) => {
            warn!(key, value = %raw, "invalid environment override");
            Err(ConfigError::InvalidEnv {
                key: key.to_string(),
                value: raw,
            })
        }
    }
}
