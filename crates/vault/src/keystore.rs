//! Data key persistence.
//!
//! The key store holds opaque wrapped key records; it has no cryptographic
//! knowledge of its own. Rotation never deletes records — historical keys
//! stay available so older tokens remain decryptable.

use arbot_core::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A wrapped data key record.
#[derive(Debug, Clone)]
pub struct DataKeyRecord {
    pub key_id: String,
    /// Master-key-wrapped key material, `nonce_hex:ciphertext_hex`.
    pub wrapped_key: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub rotated_at: Option<DateTime<Utc>>,
}

/// Storage backend for data key records.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// The currently active key record, if any.
    async fn active_key(&self) -> Result<Option<DataKeyRecord>>;

    async fn insert(&self, record: &DataKeyRecord) -> Result<()>;

    /// Flip the active record inactive and stamp `rotated_at`.
    async fn deactivate_active(&self, rotated_at: DateTime<Utc>) -> Result<()>;

    /// Inactive key records, newest first.
    async fn historical_keys(&self) -> Result<Vec<DataKeyRecord>>;
}

/// In-memory key store for development and tests.
#[derive(Default, Clone)]
pub struct MemoryKeyStore {
    records: Arc<RwLock<Vec<DataKeyRecord>>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records, in insertion order.
    pub async fn all_records(&self) -> Vec<DataKeyRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    async fn active_key(&self) -> Result<Option<DataKeyRecord>> {
        let records = self.records.read().await;
        // Last writer wins if a creation race ever produced two actives.
        Ok(records.iter().rev().find(|r| r.is_active).cloned())
    }

    async fn insert(&self, record: &DataKeyRecord) -> Result<()> {
        let mut records = self.records.write().await;
        records.push(record.clone());
        Ok(())
    }

    async fn deactivate_active(&self, rotated_at: DateTime<Utc>) -> Result<()> {
        let mut records = self.records.write().await;
        for record in records.iter_mut().filter(|r| r.is_active) {
            record.is_active = false;
            record.rotated_at = Some(rotated_at);
        }
        Ok(())
    }

    async fn historical_keys(&self) -> Result<Vec<DataKeyRecord>> {
        let records = self.records.read().await;
        let mut inactive: Vec<_> = records.iter().filter(|r| !r.is_active).cloned().collect();
        inactive.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(inactive)
    }
}
