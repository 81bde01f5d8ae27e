//! Error types for the Arbot control plane.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("no authenticated identity present")]
    Unauthenticated,

    #[error("tenant is not entitled to run a bot")]
    NotEntitled,

    #[error("no active exchange credentials configured")]
    NoCredentials,

    #[error("failed to launch bot worker: {message}")]
    Launch { message: String },

    // Deliberately carries no detail: encryption and decryption failures must
    // be indistinguishable to callers (oracle hardening).
    #[error("crypto operation failed")]
    Crypto,

    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
