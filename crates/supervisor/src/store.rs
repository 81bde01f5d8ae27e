//! In-memory persistence collaborators for development and tests.

use arbot_core::store::{CredentialStore, InstanceStore, TradeStore};
use arbot_core::types::{BotInstanceRecord, CredentialRecord, InstanceStatus, TradeRecord};
use arbot_core::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory instance store.
#[derive(Default, Clone)]
pub struct MemoryInstanceStore {
    instances: Arc<RwLock<HashMap<String, BotInstanceRecord>>>,
}

impl MemoryInstanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, tenant_id: &str) -> Option<BotInstanceRecord> {
        self.instances.read().await.get(tenant_id).cloned()
    }
}

#[async_trait]
impl InstanceStore for MemoryInstanceStore {
    async fn upsert(&self, record: &BotInstanceRecord) -> Result<()> {
        let mut instances = self.instances.write().await;
        instances.insert(record.tenant_id.clone(), record.clone());
        Ok(())
    }

    async fn set_status(
        &self,
        tenant_id: &str,
        status: InstanceStatus,
        stopped_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut instances = self.instances.write().await;
        if let Some(record) = instances.get_mut(tenant_id) {
            record.status = status;
            if stopped_at.is_some() {
                record.stopped_at = stopped_at;
            }
        }
        Ok(())
    }

    async fn touch_heartbeat(&self, tenant_id: &str) -> Result<()> {
        let mut instances = self.instances.write().await;
        if let Some(record) = instances.get_mut(tenant_id) {
            record.last_heartbeat = Some(Utc::now());
        }
        Ok(())
    }
}

/// In-memory trade store.
#[derive(Default, Clone)]
pub struct MemoryTradeStore {
    trades: Arc<RwLock<Vec<TradeRecord>>>,
}

impl MemoryTradeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<TradeRecord> {
        self.trades.read().await.clone()
    }
}

#[async_trait]
impl TradeStore for MemoryTradeStore {
    async fn insert(&self, trade: &TradeRecord) -> Result<()> {
        self.trades.write().await.push(trade.clone());
        Ok(())
    }
}

/// In-memory credential store.
#[derive(Default, Clone)]
pub struct MemoryCredentialStore {
    credentials: Arc<RwLock<Vec<CredentialRecord>>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn insert(&self, record: &CredentialRecord) -> Result<()> {
        self.credentials.write().await.push(record.clone());
        Ok(())
    }

    async fn list_active(&self, tenant_id: &str) -> Result<Vec<CredentialRecord>> {
        let credentials = self.credentials.read().await;
        Ok(credentials
            .iter()
            .filter(|c| c.tenant_id == tenant_id && c.is_active)
            .cloned()
            .collect())
    }
}
