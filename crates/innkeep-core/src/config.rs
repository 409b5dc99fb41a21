//! Configuration module
//!
//! Environment-driven configuration for the media dedup tooling: database
//! connection, run behaviour and log output.

use std::env;

use crate::error::AppError;

// Common constants
const MAX_CONNECTIONS: u32 = 5;
const CONNECTION_TIMEOUT_SECS: u64 = 30;

/// Log output format for the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// Read `LOG_FORMAT`; anything other than `json` means text.
    pub fn from_env() -> Self {
        env::var("LOG_FORMAT")
            .map(|v| Self::parse(&v))
            .unwrap_or(LogFormat::Text)
    }

    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

/// Media dedup configuration
#[derive(Clone, Debug)]
pub struct DedupConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub environment: String,
    /// Plan only; no content rows are rewritten and no assets deleted.
    pub dry_run: bool,
    /// Restore already-rewritten rows of a group when any rewrite in it fails.
    pub compensate_on_failure: bool,
    /// Re-scan content for the doomed URLs before deleting a group's duplicates.
    pub verify_before_delete: bool,
    pub log_format: LogFormat,
}

impl DedupConfig {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let config = DedupConfig {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| AppError::Config("DATABASE_URL must be set".to_string()))?,
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            environment,
            dry_run: parse_bool("DEDUP_DRY_RUN", false),
            compensate_on_failure: parse_bool("DEDUP_COMPENSATE_ON_FAILURE", true),
            verify_before_delete: parse_bool("DEDUP_VERIFY_BEFORE_DELETE", true),
            log_format: LogFormat::from_env(),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.database_url.trim().is_empty() {
            return Err(AppError::Config("DATABASE_URL cannot be empty".to_string()));
        }
        if self.db_max_connections == 0 {
            return Err(AppError::Config(
                "DB_MAX_CONNECTIONS must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }
}

fn parse_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().to_lowercase().parse().ok())
        .unwrap_or(default)
}
