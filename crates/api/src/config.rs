use std::str::FromStr;

use slotlock_core::slot_lock::{
    validate_lock_ttl, DEFAULT_LOCK_TTL_SECS, DEFAULT_SWEEP_INTERVAL_SECS,
};

/// Errors raised while reading server configuration.
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

    #[error("{0} must be set")]
    Missing(&'static str),
}

/// Where slot locks are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockBackend {
    /// Process-local map. Locks do not survive a restart and are not shared
    /// between server instances.
    Memory,
    /// The `slot_locks` table in PostgreSQL.
    Postgres { database_url: String },
}

impl LockBackend {
    /// Short name as accepted by `LOCK_BACKEND`.
    pub fn name(&self) -> &'static str {
        match self {
            LockBackend::Memory => "memory",
            LockBackend::Postgres { .. } => "postgres",
        }
    }
}

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Lock time-to-live in seconds (default: `60`).
    pub lock_ttl_secs: u64,
    /// Interval of the expired-lock sweeper in seconds (default: `60`).
    pub sweep_interval_secs: u64,
    /// Lock storage backend (default: in-memory).
    pub lock_backend: LockBackend,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                    |
    /// |----------------------------|----------------------------|
    /// | `HOST`                     | `0.0.0.0`                  |
    /// | `PORT`                     | `3000`                     |
    /// | `CORS_ORIGINS`             | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`     | `30`                       |
    /// | `LOCK_TTL_SECS`            | `60`                       |
    /// | `LOCK_SWEEP_INTERVAL_SECS` | `60`                       |
    /// | `LOCK_BACKEND`             | `memory` (or `postgres`)   |
    /// | `DATABASE_URL`             | required for `postgres`    |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = parse_var(&lookup, "PORT", 3000, "u16")?;

        let cors_origins: Vec<String> = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if let Some(bad) = cors_origins
            .iter()
            .find(|o| axum::http::HeaderValue::from_str(o).is_err())
        {
            return Err(ConfigError::Invalid {
                var: "CORS_ORIGINS",
                reason: format!("'{bad}' is not a valid header value"),
            });
        }

        let request_timeout_secs: u64 = parse_var(&lookup, "REQUEST_TIMEOUT_SECS", 30, "u64")?;

        let lock_ttl_secs: u64 =
            parse_var(&lookup, "LOCK_TTL_SECS", DEFAULT_LOCK_TTL_SECS, "u64")?;
        validate_lock_ttl(lock_ttl_secs).map_err(|reason| ConfigError::Invalid {
            var: "LOCK_TTL_SECS",
            reason,
        })?;

        let sweep_interval_secs: u64 = parse_var(
            &lookup,
            "LOCK_SWEEP_INTERVAL_SECS",
            DEFAULT_SWEEP_INTERVAL_SECS,
            "u64",
        )?;
        if sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "LOCK_SWEEP_INTERVAL_SECS",
                reason: "must be greater than zero".into(),
            });
        }

        let lock_backend = match lookup("LOCK_BACKEND")
            .unwrap_or_else(|| "memory".into())
            .to_ascii_lowercase()
            .as_str()
        {
            "memory" => LockBackend::Memory,
            "postgres" => LockBackend::Postgres {
                database_url: lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
            },
            other => {
                return Err(ConfigError::Invalid {
                    var: "LOCK_BACKEND",
                    reason: format!("expected 'memory' or 'postgres', got '{other}'"),
                })
            }
        };

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            lock_ttl_secs,
            sweep_interval_secs,
            lock_backend,
        })
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
    expected: &'static str,
) -> Result<T, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Parse {
            var,
            expected,
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.cors_origins, vec!["http://localhost:5173"]);
        assert_eq!(config.lock_ttl_secs, 60);
        assert_eq!(config.sweep_interval_secs, 60);
        assert_eq!(config.lock_backend, LockBackend::Memory);
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("PORT", "8080"),
            ("LOCK_TTL_SECS", "90"),
            ("CORS_ORIGINS", "https://a.example, https://b.example,"),
            ("LOCK_BACKEND", "Postgres"),
            ("DATABASE_URL", "postgres://localhost/slots"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.lock_ttl_secs, 90);
        assert_eq!(config.cors_origins.len(), 2);
        assert_matches!(config.lock_backend, LockBackend::Postgres { .. });
    }

    #[test]
    fn test_bad_port_is_rejected() {
        assert_matches!(
            load(&[("PORT", "eighty")]),
            Err(ConfigError::Parse { var: "PORT", .. })
        );
    }

    #[test]
    fn test_ttl_out_of_range_is_rejected() {
        assert_matches!(
            load(&[("LOCK_TTL_SECS", "1")]),
            Err(ConfigError::Invalid { var: "LOCK_TTL_SECS", .. })
        );
    }

    #[test]
    fn test_postgres_requires_database_url() {
        assert_matches!(
            load(&[("LOCK_BACKEND", "postgres")]),
            Err(ConfigError::Missing("DATABASE_URL"))
        );
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        assert_matches!(
            load(&[("LOCK_BACKEND", "redis")]),
            Err(ConfigError::Invalid { var: "LOCK_BACKEND", .. })
        );
    }
}
