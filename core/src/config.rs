//! Client configuration.
//!
//! # Design
//! The environment is read once, by `ClientConfig::from_env`, and the
//! resulting value is handed to the client explicitly. Nothing in the core
//! consults the environment afterwards, so tests can build configurations
//! directly (or through `from_lookup`) without touching process state.

use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://rksv.fiskaly.com/api/v1";

/// FinanzOnline-backed calls can stall while the tax authority is
/// unavailable, so the default deadline is generous.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

pub const ENV_BASE_URL: &str = "FISKALY_SIGN_AT_BASE_URL";
pub const ENV_TIMEOUT_SECS: &str = "FISKALY_SIGN_AT_TIMEOUT_SECS";
pub const ENV_STRICT_METADATA: &str = "FISKALY_SIGN_AT_STRICT_METADATA";

/// Errors raised while resolving configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid base URL {0:?}: must start with http:// or https://")]
    InvalidBaseUrl(String),

    #[error("invalid value {value:?} for {name}: {reason}")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Settings shared read-only by every invocation made through a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    base_url: String,
    timeout: Duration,
    user_agent: String,
    enforce_metadata_limits: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: concat!("sign-at-core/", env!("CARGO_PKG_VERSION")).to_string(),
            enforce_metadata_limits: false,
        }
    }
}

impl ClientConfig {
    /// Configuration pointing at `base_url`, otherwise default.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Self::default().with_base_url(base_url)
    }

    /// Resolve configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(base_url) = lookup(ENV_BASE_URL) {
            config = config.with_base_url(&base_url)?;
        }

        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            let secs: u64 = raw.trim().parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::InvalidValue {
                    name: ENV_TIMEOUT_SECS,
                    value: raw.clone(),
                    reason: e.to_string(),
                }
            })?;
            if secs == 0 {
                return Err(ConfigError::InvalidValue {
                    name: ENV_TIMEOUT_SECS,
                    value: raw,
                    reason: "timeout must be positive".to_string(),
                });
            }
            config.timeout = Duration::from_secs(secs);
        }

        if let Some(raw) = lookup(ENV_STRICT_METADATA) {
            config.enforce_metadata_limits = parse_flag(ENV_STRICT_METADATA, &raw)?;
        }

        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, ConfigError> {
        let trimmed = base_url.trim().trim_end_matches('/');
        let host = trimmed
            .strip_prefix("https://")
            .or_else(|| trimmed.strip_prefix("http://"));
        if host.map_or(true, str::is_empty) {
            return Err(ConfigError::InvalidBaseUrl(base_url.to_string()));
        }
        self.base_url = trimmed.to_string();
        Ok(self)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Reject metadata that exceeds the documented service limits before
    /// sending, instead of leaving it to the service.
    pub fn with_metadata_limits_enforced(mut self, enforce: bool) -> Self {
        self.enforce_metadata_limits = enforce;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn enforce_metadata_limits(&self) -> bool {
        self.enforce_metadata_limits
    }
}

fn parse_flag(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name,
            value: raw.to_string(),
            reason: "expected a boolean flag".to_string(),
        }),
    }
}
