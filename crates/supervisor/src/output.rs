//! Structured worker output parsing.
//!
//! Workers report completed trades by printing a marker line:
//! `TRADE_COMPLETED: {json payload}`. Everything else on stdout is treated
//! as plain log output (but still refreshes the heartbeat).

use arbot_core::types::TradeRecord;
use arbot_core::Result;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

/// Marker prefix a worker prints when a trade completes.
pub const TRADE_MARKER: &str = "TRADE_COMPLETED: ";

/// Trade payload as emitted by the worker.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradePayload {
    pub exchange: String,
    pub triangle_path: String,
    pub initial_amount: Decimal,
    pub final_amount: Decimal,
    pub profit_amount: Decimal,
    pub profit_percentage: Decimal,
    pub fees: Decimal,
    pub status: String,
    #[serde(default)]
    pub execution_time_ms: Option<i32>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Extract the trade payload portion of an output line, if the line carries
/// the trade-completion marker.
pub fn trade_payload(line: &str) -> Option<&str> {
    line.find(TRADE_MARKER)
        .map(|idx| line[idx + TRADE_MARKER.len()..].trim())
}

/// Parse a trade payload into a persistable record.
pub fn parse_trade(tenant_id: &str, raw: &str) -> Result<TradeRecord> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    let payload: TradePayload = serde_json::from_value(value.clone())?;

    Ok(TradeRecord {
        id: Uuid::new_v4(),
        tenant_id: tenant_id.to_string(),
        exchange_id: payload.exchange,
        path: payload.triangle_path,
        initial_amount: payload.initial_amount,
        final_amount: payload.final_amount,
        profit_amount: payload.profit_amount,
        profit_percentage: payload.profit_percentage,
        fees: payload.fees,
        status: payload.status,
        execution_time_ms: payload.execution_time_ms,
        error_message: payload.error_message,
        raw_payload: value,
        created_at: Utc::now(),
    })
}
