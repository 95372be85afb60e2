use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A wallet the listener subscribes to. Immutable for the process lifetime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WatchedAddress {
    pub label: String,
    pub address: String,
}

/// Classification of one transaction's transfer activity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    NoTransfers,
    NormalTransfer,
    LargeTransfer,
    WhaleActivity,
    TxMissing,
    FetchFailed,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::NoTransfers => "no_transfers",
            Signal::NormalTransfer => "normal_transfer",
            Signal::LargeTransfer => "large_transfer",
            Signal::WhaleActivity => "whale_activity",
            Signal::TxMissing => "tx_missing",
            Signal::FetchFailed => "fetch_failed",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One SPL token transfer pulled out of a parsed transaction.
/// Ephemeral: produced per transaction and consumed by the classifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransferRecord {
    pub mint: String,
    pub source: Option<String>,
    pub destination: Option<String>,
    pub ui_amount: Option<f64>,
}

/// One line of the realtime event log. Created once per push notification,
/// appended, never mutated.
///
/// `err` present means the chain reported the transaction as failed and no
/// enrichment was attempted. The classifier fields are only present on
/// events whose transaction was fetched and contained transfers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChainEvent {
    pub wallet_label: String,
    pub wallet: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub err: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<Signal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_mint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dominance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall-clock time of the log write, not of the chain event itself.
    #[serde(rename = "_ts", default)]
    pub write_ts: f64,
}

impl ChainEvent {
    /// True when the chain itself flagged the transaction as failed.
    pub fn is_chain_error(&self) -> bool {
        self.err.is_some()
    }
}

/// Paper position for one mint. `avg_entry` and `entry_ts` are only
/// meaningful while `units > 0`; a full exit resets both to zero.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub units: f64,
    pub avg_entry: f64,
    pub entry_ts: f64,
}

impl Position {
    pub fn is_open(&self) -> bool {
        self.units > 0.0
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

/// What closed a position.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    TakeProfit,
    StopLoss,
    TimeExit,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::TakeProfit => "take_profit",
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TimeExit => "time_exit",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable trade ledger row. Append-only. Every column is present on
/// every row so the CSV export stays rectangular.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Trade {
    pub id: Uuid,
    pub ts: f64,
    pub signature: String,
    pub side: TradeSide,
    pub mint: String,
    /// BUY rows: the signal that triggered the copy.
    pub signal: Option<Signal>,
    /// SELL rows: the exit trigger.
    pub reason: Option<ExitReason>,
    pub price_usd: f64,
    pub units: f64,
    pub gross_usd: f64,
    pub fees_usd: f64,
    pub slippage_usd: f64,
    /// Total cost for buys, net proceeds for sells.
    pub net_usd: f64,
    pub cash_usd: f64,
    pub pnl_pct_vs_entry: Option<f64>,
}

/// Mark-to-market snapshot taken after every executed event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EquitySnapshot {
    pub ts: f64,
    pub cash_usd: f64,
    pub position_value_usd: f64,
    pub equity_usd: f64,
    pub open_positions: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_serializes_snake_case() {
        let json = serde_json::to_string(&Signal::WhaleActivity).unwrap();
        assert_eq!(json, "\"whale_activity\"");
        assert_eq!(Signal::LargeTransfer.as_str(), "large_transfer");
    }

    #[test]
    fn test_trade_side_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&TradeSide::Buy).unwrap(), "\"BUY\"");
        assert_eq!(serde_json::to_string(&TradeSide::Sell).unwrap(), "\"SELL\"");
    }

    #[test]
    fn test_chain_event_omits_absent_enrichment() {
        let event = ChainEvent {
            wallet_label: "A".to_string(),
            wallet: "addr".to_string(),
            signature: Some("sig".to_string()),
            ..ChainEvent::default()
        };

        let line = serde_json::to_string(&event).unwrap();
        assert!(line.contains("\"signature\":\"sig\""));
        assert!(!line.contains("top_mint"));
        assert!(!line.contains("dominance"));
        assert!(line.contains("\"_ts\":0.0"));
    }

    #[test]
    fn test_chain_event_roundtrip() {
        let event = ChainEvent {
            wallet_label: "B".to_string(),
            wallet: "addr".to_string(),
            signature: Some("sig".to_string()),
            signal: Some(Signal::LargeTransfer),
            transfer_count: Some(2),
            top_mint: Some("MintX".to_string()),
            top_amount: Some(7.0),
            total_amount: Some(10.0),
            dominance: Some(0.7),
            write_ts: 1_700_000_000.5,
            ..ChainEvent::default()
        };

        let line = serde_json::to_string(&event).unwrap();
        let back: ChainEvent = serde_json::from_str(&line).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_chain_error_event() {
        let event = ChainEvent {
            wallet_label: "A".to_string(),
            wallet: "addr".to_string(),
            signature: Some("sig".to_string()),
            err: Some(serde_json::json!({"InstructionError": [0, "Custom"]})),
            ..ChainEvent::default()
        };

        assert!(event.is_chain_error());
        assert!(event.signal.is_none());
    }

    #[test]
    fn test_position_open_flag() {
        let mut position = Position::default();
        assert!(!position.is_open());

        position.units = 0.5;
        position.avg_entry = 2.0;
        assert!(position.is_open());
    }
}
