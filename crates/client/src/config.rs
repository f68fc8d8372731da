use std::str::FromStr;
use std::time::Duration;

use slotlock_core::slot_lock::DEFAULT_POLL_INTERVAL_SECS;

/// Seconds a "held by another user" notice stays up by default.
pub const DEFAULT_DENIED_NOTICE_SECS: u64 = 3;

/// Per-request timeout for lock calls by default.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Errors raised while reading client configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be a valid {expected}, got '{value}'")]
    Parse {
        var: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Lock client tunables.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the lock API, including `/api/v1`.
    pub base_url: String,
    /// How often peer lock status is refreshed.
    pub poll_interval: Duration,
    /// How long a denial notice stays visible.
    pub denied_notice: Duration,
    /// Timeout applied to every lock request.
    pub request_timeout: Duration,
    /// Countdown display refresh period.
    pub tick_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api/v1".into(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            denied_notice: Duration::from_secs(DEFAULT_DENIED_NOTICE_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            tick_interval: Duration::from_secs(1),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default                          |
    /// |-----------------------------|----------------------------------|
    /// | `SLOTLOCK_BASE_URL`         | `http://localhost:3000/api/v1`   |
    /// | `LOCK_POLL_INTERVAL_SECS`   | `10`                             |
    /// | `LOCK_DENIED_NOTICE_SECS`   | `3`                              |
    /// | `LOCK_REQUEST_TIMEOUT_SECS` | `10`                             |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let base_url = lookup("SLOTLOCK_BASE_URL").unwrap_or(defaults.base_url);
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                var: "SLOTLOCK_BASE_URL",
                reason: format!("'{base_url}' is not an http(s) URL"),
            });
        }

        let poll_interval = secs_var(&lookup, "LOCK_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?;
        let denied_notice = secs_var(&lookup, "LOCK_DENIED_NOTICE_SECS", DEFAULT_DENIED_NOTICE_SECS)?;
        let request_timeout =
            secs_var(&lookup, "LOCK_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?;

        Ok(Self {
            base_url,
            poll_interval,
            denied_notice,
            request_timeout,
            tick_interval: defaults.tick_interval,
        })
    }
}

fn secs_var(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: u64,
) -> Result<Duration, ConfigError> {
    let secs = match lookup(var) {
        None => default,
        Some(value) => u64::from_str(value.trim()).map_err(|_| ConfigError::Parse {
            var,
            expected: "number of seconds",
            value,
        })?,
    };
    if secs == 0 {
        return Err(ConfigError::Invalid {
            var,
            reason: "must be greater than zero".into(),
        });
    }
    Ok(Duration::from_secs(secs))
}
