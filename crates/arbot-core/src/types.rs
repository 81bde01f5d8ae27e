//! Shared domain types for the Arbot control plane.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a tenant's bot instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Running,
    Stopped,
    Error,
}

impl InstanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Error => "error",
        }
    }
}

/// Risk limits applied by the worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskManagement {
    pub max_daily_loss: Decimal,
    pub max_concurrent_trades: u32,
    pub stop_loss_percentage: Decimal,
}

impl Default for RiskManagement {
    fn default() -> Self {
        Self {
            max_daily_loss: Decimal::new(100, 0),
            max_concurrent_trades: 3,
            stop_loss_percentage: Decimal::new(5, 0),
        }
    }
}

/// Tenant-supplied bot configuration, serialized into the worker environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotSettings {
    pub min_profit_percentage: Decimal,
    pub max_trade_amount: Decimal,
    pub auto_trading_mode: bool,
    pub selected_exchanges: Vec<String>,
    pub risk_management: RiskManagement,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            min_profit_percentage: Decimal::new(5, 1), // 0.5%
            max_trade_amount: Decimal::new(100, 0),
            auto_trading_mode: false,
            selected_exchanges: Vec::new(),
            risk_management: RiskManagement::default(),
        }
    }
}

/// A decrypted exchange credential handed to the worker at launch.
///
/// Never serialized into logs or durable storage in this form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeCredential {
    pub exchange_id: String,
    pub api_key: String,
    pub api_secret: String,
    pub passphrase: Option<String>,
    pub sandbox: bool,
}

/// A stored exchange credential. `api_secret` and `passphrase` hold envelope
/// encryption tokens, never plaintext.
#[derive(Debug, Clone)]
pub struct CredentialRecord {
    pub id: Uuid,
    pub tenant_id: String,
    pub exchange_id: String,
    pub api_key: String,
    pub api_secret: String,
    pub passphrase: Option<String>,
    pub sandbox: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Durable record of a tenant's bot instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotInstanceRecord {
    pub id: String,
    pub tenant_id: String,
    pub status: InstanceStatus,
    /// Opaque structured settings blob, as launched.
    pub settings: serde_json::Value,
    pub started_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub last_heartbeat: Option<DateTime<Utc>>,
}

/// A completed trade reported by a worker. Immutable once persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: Uuid,
    pub tenant_id: String,
    pub exchange_id: String,
    /// Triangular path traded, e.g. "BTC/USDT -> ETH/BTC -> ETH/USDT".
    pub path: String,
    pub initial_amount: Decimal,
    pub final_amount: Decimal,
    pub profit_amount: Decimal,
    pub profit_percentage: Decimal,
    pub fees: Decimal,
    pub status: String,
    pub execution_time_ms: Option<i32>,
    pub error_message: Option<String>,
    /// Full payload as emitted by the worker, for audit.
    pub raw_payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
