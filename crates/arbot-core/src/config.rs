//! Configuration management for the Arbot control plane.

use crate::{Error, Result};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Production,
}

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub worker: WorkerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// Hex-encoded 256-bit master encryption key. Required in production.
    pub master_key_hex: Option<String>,
    /// Fallback file for a locally generated master key (development only).
    pub master_key_file: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    /// Interpreter used to launch the worker.
    pub command: String,
    /// Path to the worker entry point.
    pub script: PathBuf,
    /// Seconds to wait after SIGTERM before force-killing a worker.
    pub grace_period_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") => Environment::Production,
            _ => Environment::Development,
        };

        let master_key_hex = env::var("MASTER_ENCRYPTION_KEY").ok();

        // Losing the master key means losing every wrapped data key, so a
        // production deployment must never fall back to a generated one.
        if environment == Environment::Production && master_key_hex.is_none() {
            return Err(Error::Config {
                message: "MASTER_ENCRYPTION_KEY is required when APP_ENV=production".to_string(),
            });
        }

        Ok(Self {
            environment,
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").map_err(|_| Error::Config {
                    message: "DATABASE_URL environment variable not set".to_string(),
                })?,
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            },
            security: SecurityConfig {
                master_key_hex,
                master_key_file: env::var("MASTER_KEY_FILE")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("./master.key")),
            },
            worker: WorkerConfig {
                command: env::var("WORKER_COMMAND").unwrap_or_else(|_| "python3".to_string()),
                script: env::var("WORKER_SCRIPT")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("./worker/main.py")),
                grace_period_secs: env::var("WORKER_GRACE_PERIOD_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            },
        })
    }

    /// Load configuration for testing (with defaults).
    pub fn test_config() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                url: "postgres://localhost/arbot_test".to_string(),
                max_connections: 2,
            },
            security: SecurityConfig {
                master_key_hex: None,
                master_key_file: PathBuf::from("./master.key"),
            },
            worker: WorkerConfig {
                command: "python3".to_string(),
                script: PathBuf::from("./worker/main.py"),
                grace_period_secs: 10,
            },
        }
    }
}
