//! Database operations for completed trades.

use crate::store::TradeStore;
use crate::types::TradeRecord;
use crate::Result;
use async_trait::async_trait;
use sqlx::PgPool;

/// Repository for trade records.
pub struct TradeRepository {
    pool: PgPool,
}

impl TradeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TradeStore for TradeRepository {
    async fn insert(&self, trade: &TradeRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO trades (
                id, tenant_id, exchange_id, path, initial_amount,
                final_amount, profit_amount, profit_percentage, fees,
                status, execution_time_ms, error_message, raw_payload,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(trade.id)
        .bind(&trade.tenant_id)
        .bind(&trade.exchange_id)
        .bind(&trade.path)
        .bind(trade.initial_amount)
        .bind(trade.final_amount)
        .bind(trade.profit_amount)
        .bind(trade.profit_percentage)
        .bind(trade.fees)
        .bind(&trade.status)
        .bind(trade.execution_time_ms)
        .bind(&trade.error_message)
        .bind(&trade.raw_payload)
        .bind(trade.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
