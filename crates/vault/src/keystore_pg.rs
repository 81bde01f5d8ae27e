//! PostgreSQL-backed key store.

use crate::keystore::{DataKeyRecord, KeyStore};
use arbot_core::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

/// Key store backed by the `encryption_keys` table.
pub struct PgKeyStore {
    pool: PgPool,
}

impl PgKeyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn record_from_row(row: &sqlx::postgres::PgRow) -> DataKeyRecord {
    DataKeyRecord {
        key_id: row.get("key_id"),
        wrapped_key: row.get("encrypted_key"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        rotated_at: row.get("rotated_at"),
    }
}

#[async_trait]
impl KeyStore for PgKeyStore {
    async fn active_key(&self) -> Result<Option<DataKeyRecord>> {
        let row = sqlx::query(
            r#"
            SELECT key_id, encrypted_key, is_active, created_at, rotated_at
            FROM encryption_keys
            WHERE is_active = TRUE
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| record_from_row(&r)))
    }

    async fn insert(&self, record: &DataKeyRecord) -> Result<()> {
        // A partial unique index enforces at most one active record; a
        // concurrent creator loses here and the caller re-reads the winner.
        sqlx::query(
            r#"
            INSERT INTO encryption_keys (
                key_id, encrypted_key, is_active, created_at, rotated_at
            )
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&record.key_id)
        .bind(&record.wrapped_key)
        .bind(record.is_active)
        .bind(record.created_at)
        .bind(record.rotated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn deactivate_active(&self, rotated_at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE encryption_keys
            SET is_active = FALSE, rotated_at = $1
            WHERE is_active = TRUE
            "#,
        )
        .bind(rotated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn historical_keys(&self) -> Result<Vec<DataKeyRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT key_id, encrypted_key, is_active, created_at, rotated_at
            FROM encryption_keys
            WHERE is_active = FALSE
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(record_from_row).collect())
    }
}
