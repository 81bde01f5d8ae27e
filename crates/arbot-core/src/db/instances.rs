//! Database operations for bot instances.

use crate::store::InstanceStore;
use crate::types::{BotInstanceRecord, InstanceStatus};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// Repository for bot instance state.
pub struct InstanceRepository {
    pool: PgPool,
}

impl InstanceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InstanceStore for InstanceRepository {
    async fn upsert(&self, record: &BotInstanceRecord) -> Result<()> {
        // One instance row per tenant; a new start replaces the previous row.
        sqlx::query(
            r#"
            INSERT INTO bot_instances (
                id, tenant_id, status, settings, started_at,
                stopped_at, last_heartbeat
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (tenant_id) DO UPDATE SET
                id = EXCLUDED.id,
                status = EXCLUDED.status,
                settings = EXCLUDED.settings,
                started_at = EXCLUDED.started_at,
                stopped_at = EXCLUDED.stopped_at,
                last_heartbeat = EXCLUDED.last_heartbeat
            "#,
        )
        .bind(&record.id)
        .bind(&record.tenant_id)
        .bind(record.status.as_str())
        .bind(&record.settings)
        .bind(record.started_at)
        .bind(record.stopped_at)
        .bind(record.last_heartbeat)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_status(
        &self,
        tenant_id: &str,
        status: InstanceStatus,
        stopped_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE bot_instances
            SET status = $2, stopped_at = COALESCE($3, stopped_at)
            WHERE tenant_id = $1
            "#,
        )
        .bind(tenant_id)
        .bind(status.as_str())
        .bind(stopped_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn touch_heartbeat(&self, tenant_id: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE bot_instances
            SET last_heartbeat = NOW()
            WHERE tenant_id = $1
            "#,
        )
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
