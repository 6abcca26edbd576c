//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;
use std::str::FromStr;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    /// Lifetime of an issued bearer token
    pub token_ttl_minutes: i64,

    /// How often expired tokens are purged
    pub token_purge_interval_secs: u64,
}

fn parsed_or<T: FromStr>(name: &'static str, default: &str) -> Result<T, ConfigError> {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|_| ConfigError::InvalidValue(name))
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            env::var("DATABASE_URL").map_err(|_| ConfigError::MissingEnv("DATABASE_URL"))?;

        let database_max_connections = parsed_or("DATABASE_MAX_CONNECTIONS", "10")?;

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = parsed_or("PORT", "3000")?;

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let token_ttl_minutes: i64 = parsed_or("TOKEN_TTL_MINUTES", "30")?;
        if token_ttl_minutes <= 0 {
            return Err(ConfigError::InvalidValue("TOKEN_TTL_MINUTES"));
        }

        let token_purge_interval_secs: u64 = parsed_or("TOKEN_PURGE_INTERVAL_SECS", "300")?;
        if token_purge_interval_secs == 0 {
            return Err(ConfigError::InvalidValue("TOKEN_PURGE_INTERVAL_SECS"));
        }

        Ok(Self {
            database_url,
            database_max_connections,
            host,
            port,
            environment,
            token_ttl_minutes,
            token_purge_interval_secs,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.token_ttl_minutes)
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env vars are process-wide; keep everything in one test.
    #[test]
    fn test_from_env() {
        env::remove_var("DATABASE_URL");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::MissingEnv("DATABASE_URL"))
        ));

        env::set_var("DATABASE_URL", "postgres://localhost/library");
        for name in [
            "DATABASE_MAX_CONNECTIONS",
            "HOST",
            "PORT",
            "ENVIRONMENT",
            "TOKEN_TTL_MINUTES",
            "TOKEN_PURGE_INTERVAL_SECS",
        ] {
            env::remove_var(name);
        }

        let config = Config::from_env().unwrap();
        assert_eq!(config.database_max_connections, 10);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 3000);
        assert!(!config.is_production());
        assert_eq!(config.token_ttl(), chrono::Duration::minutes(30));
        assert_eq!(config.token_purge_interval_secs, 300);

        env::set_var("PORT", "not-a-port");
        assert!(matches!(Config::from_env(), Err(ConfigError::InvalidValue("PORT"))));
        env::remove_var("PORT");

        env::set_var("TOKEN_TTL_MINUTES", "0");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::InvalidValue("TOKEN_TTL_MINUTES"))
        ));
        env::remove_var("TOKEN_TTL_MINUTES");
    }
}
