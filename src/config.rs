// config.rs
use std::env;
use std::time::Duration;

use crate::errors::{AppError, Result};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_name: String,
    pub host: String,
    pub port: u16,
    pub cascade: CascadeConfig,
}

/// Retry policy for the background denormalization worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CascadeConfig {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Duration::from_millis(50),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| AppError::configuration("DATABASE_URL must be set"))?;

        let defaults = CascadeConfig::default();
        let cascade = CascadeConfig {
            max_retries: parse_var("CASCADE_MAX_RETRIES", defaults.max_retries)?,
            backoff: Duration::from_millis(parse_var(
                "CASCADE_BACKOFF_MS",
                defaults.backoff.as_millis() as u64,
            )?),
        };

        Ok(AppConfig {
            database_url,
            database_name: env::var("DATABASE_NAME").unwrap_or_else(|_| "courtlog".to_string()),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_var("PORT", 3000)?,
            cascade,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::configuration(format!("{} must be a number, got {:?}", name, raw))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_var_falls_back_to_default_when_unset() {
        let value: u32 = parse_var("COURTLOG_TEST_SURELY_UNSET_VAR", 7).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn parse_var_rejects_garbage() {
        env::set_var("COURTLOG_TEST_BAD_PORT", "eighty");
        let result: Result<u16> = parse_var("COURTLOG_TEST_BAD_PORT", 80);
        assert!(matches!(result, Err(AppError::ConfigurationError(_))));
        env::remove_var("COURTLOG_TEST_BAD_PORT");
    }
}
