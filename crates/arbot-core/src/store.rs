//! Persistence collaborator contracts.
//!
//! The supervisor and the service facade write through these traits so tests
//! can substitute in-memory stores for Postgres.

use crate::types::{BotInstanceRecord, CredentialRecord, InstanceStatus, TradeRecord};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Storage for encrypted exchange credentials.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn insert(&self, record: &CredentialRecord) -> Result<()>;

    /// Active credentials for a tenant, in insertion order.
    async fn list_active(&self, tenant_id: &str) -> Result<Vec<CredentialRecord>>;
}

/// Storage for bot instance state (status, timestamps, heartbeat).
#[async_trait]
pub trait InstanceStore: Send + Sync {
    /// Create or replace the tenant's instance record.
    async fn upsert(&self, record: &BotInstanceRecord) -> Result<()>;

    /// Set the tenant's instance status, optionally stamping `stopped_at`.
    async fn set_status(
        &self,
        tenant_id: &str,
        status: InstanceStatus,
        stopped_at: Option<DateTime<Utc>>,
    ) -> Result<()>;

    /// Refresh the tenant's heartbeat to now. Idempotent.
    async fn touch_heartbeat(&self, tenant_id: &str) -> Result<()>;
}

/// Storage for completed trades.
#[async_trait]
pub trait TradeStore: Send + Sync {
    async fn insert(&self, trade: &TradeRecord) -> Result<()>;
}
