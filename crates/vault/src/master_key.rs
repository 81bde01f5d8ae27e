//! Master key resolution.
//!
//! The master key is used only to wrap and unwrap data keys; it never
//! encrypts tenant data directly. Resolution order: explicit configuration,
//! then a restricted-permission local file, then a freshly generated key
//! persisted best-effort. Production deployments must configure the key
//! explicitly (enforced at startup by `Config::from_env`).

use arbot_core::config::SecurityConfig;
use arbot_core::{Error, Result};
use rand::Rng;
use tracing::{info, warn};

/// Master key length in bytes (256 bits).
pub const MASTER_KEY_LEN: usize = 32;

pub struct MasterKeySource {
    config: SecurityConfig,
}

impl MasterKeySource {
    pub fn new(config: SecurityConfig) -> Self {
        Self { config }
    }

    /// Resolve the master key bytes.
    pub async fn resolve(&self) -> Result<Vec<u8>> {
        if let Some(hex_key) = &self.config.master_key_hex {
            return decode_key(hex_key);
        }

        let path = &self.config.master_key_file;
        if path.exists() {
            let content = tokio::fs::read_to_string(path)
                .await
                .map_err(|e| Error::Config {
                    message: format!("failed to read master key file: {e}"),
                })?;
            return decode_key(content.trim());
        }

        // Fallback mode: generate a key and try to persist it for reuse.
        let mut key = [0u8; MASTER_KEY_LEN];
        rand::thread_rng().fill(&mut key);

        match tokio::fs::write(path, hex::encode(key)).await {
            Ok(()) => {
                restrict_permissions(path).await;
                info!(path = %path.display(), "generated master key persisted");
            }
            Err(e) => {
                // Everything wrapped under this key is lost if the process
                // dies before the key is persisted elsewhere.
                warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to persist generated master key; continuing with in-memory key"
                );
            }
        }

        warn!("using generated fallback master key; not suitable for production");
        Ok(key.to_vec())
    }
}

fn decode_key(hex_key: &str) -> Result<Vec<u8>> {
    let bytes = hex::decode(hex_key).map_err(|_| Error::Config {
        message: "master key must be a hex string".to_string(),
    })?;

    if bytes.len() != MASTER_KEY_LEN {
        return Err(Error::Config {
            message: format!("master key must be {} hex characters", MASTER_KEY_LEN * 2),
        });
    }

    Ok(bytes)
}

#[cfg(unix)]
async fn restrict_permissions(path: &std::path::Path) {
    use std::os::unix::fs::PermissionsExt;

    let perms = std::fs::Permissions::from_mode(0o600);
    if let Err(e) = tokio::fs::set_permissions(path, perms).await {
        warn!(path = %path.display(), error = %e, "failed to restrict master key file permissions");
    }
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &std::path::Path) {}
