//! Database operations for exchange credentials.

use crate::store::CredentialStore;
use crate::types::CredentialRecord;
use crate::Result;
use async_trait::async_trait;
use sqlx::{PgPool, Row};

/// Repository for encrypted exchange credentials.
pub struct CredentialRepository {
    pool: PgPool,
}

impl CredentialRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for CredentialRepository {
    async fn insert(&self, record: &CredentialRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO exchange_credentials (
                id, tenant_id, exchange_id, api_key, api_secret,
                passphrase, sandbox, is_active, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(record.id)
        .bind(&record.tenant_id)
        .bind(&record.exchange_id)
        .bind(&record.api_key)
        .bind(&record.api_secret)
        .bind(&record.passphrase)
        .bind(record.sandbox)
        .bind(record.is_active)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_active(&self, tenant_id: &str) -> Result<Vec<CredentialRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, tenant_id, exchange_id, api_key, api_secret,
                   passphrase, sandbox, is_active, created_at
            FROM exchange_credentials
            WHERE tenant_id = $1 AND is_active = TRUE
            ORDER BY created_at
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        let records = rows
            .into_iter()
            .map(|row| CredentialRecord {
                id: row.get("id"),
                tenant_id: row.get("tenant_id"),
                exchange_id: row.get("exchange_id"),
                api_key: row.get("api_key"),
                api_secret: row.get("api_secret"),
                passphrase: row.get("passphrase"),
                sandbox: row.get("sandbox"),
                is_active: row.get("is_active"),
                created_at: row.get("created_at"),
            })
            .collect();

        Ok(records)
    }
}
