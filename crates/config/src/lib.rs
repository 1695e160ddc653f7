//! Configuration module for the hifz backend.

use serde::Deserialize;
use std::env;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection URL
    pub database_url: String,
    /// JWT secret for bearer-token verification
    pub jwt_secret: String,
    /// Address to bind the server to
    pub bind_address: String,
    /// Base URL for the API
    pub base_url: String,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: env_var("DATABASE_URL")?,
            jwt_secret: env_var("JWT_SECRET")?,
            bind_address: env_var_or("BIND_ADDRESS", "0.0.0.0:8080"),
            base_url: env_var_or("BASE_URL", "http://localhost:8080"),
        })
    }
}

fn env_var(name: &str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingVar(name.to_string()))
}

fn env_var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_or_uses_default() {
        let val = env_var_or("NON_EXISTENT_VAR_12345", "default_value");
        assert_eq!(val, "default_value");
    }
}
