use std::str::FromStr;
use std::time::Duration;

use promptline_core::render::DEFAULT_MAX_INCLUDE_DEPTH;

/// A configuration variable that was present but could not be used.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be set")]
    Missing { var: &'static str },

    #[error("{var} has invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Engine configuration loaded from environment variables.
///
/// All fields except the database URL have defaults suitable for local
/// development.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Postgres connection string. Only the binary requires it.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    /// Lifetime of cached active versions. Zero disables the cache.
    pub cache_ttl: Duration,
    /// Upper bound on every store call.
    pub store_timeout: Duration,
    pub max_include_depth: usize,
    /// How many times an activation that lost a race is retried.
    pub activation_max_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            db_max_connections: 20,
            cache_ttl: Duration::from_secs(300),
            store_timeout: Duration::from_secs(10),
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
            activation_max_retries: 3,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default |
    /// |--------------------------|---------|
    /// | `DATABASE_URL`           | none    |
    /// | `DB_MAX_CONNECTIONS`     | `20`    |
    /// | `CACHE_TTL_SECS`         | `300`   |
    /// | `STORE_TIMEOUT_SECS`     | `10`    |
    /// | `MAX_INCLUDE_DEPTH`      | `8`     |
    /// | `ACTIVATION_MAX_RETRIES` | `3`     |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        let db_max_connections =
            parse_or("DB_MAX_CONNECTIONS", &lookup, defaults.db_max_connections)?;
        let cache_ttl_secs = parse_or("CACHE_TTL_SECS", &lookup, defaults.cache_ttl.as_secs())?;
        let store_timeout_secs =
            parse_or("STORE_TIMEOUT_SECS", &lookup, defaults.store_timeout.as_secs())?;
        let max_include_depth =
            parse_or("MAX_INCLUDE_DEPTH", &lookup, defaults.max_include_depth)?;
        let activation_max_retries = parse_or(
            "ACTIVATION_MAX_RETRIES",
            &lookup,
            defaults.activation_max_retries,
        )?;

        if db_max_connections == 0 {
            return Err(ConfigError::Invalid {
                var: "DB_MAX_CONNECTIONS",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }
        if store_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "STORE_TIMEOUT_SECS",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }

        Ok(Self {
            database_url,
            db_max_connections,
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            store_timeout: Duration::from_secs(store_timeout_secs),
            max_include_depth,
            activation_max_retries,
        })
    }

    /// The database URL, or an error naming the missing variable.
    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or(ConfigError::Missing { var: "DATABASE_URL" })
    }
}

fn parse_or<T, F>(var: &'static str, lookup: &F, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
            var,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}
