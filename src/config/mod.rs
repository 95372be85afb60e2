// Runtime configuration: streaming endpoints, the watched wallet set, and
// the paper-engine risk model. Everything resolves from environment
// variables (loaded from .env via dotenvy in the binaries).

use std::collections::HashSet;

use crate::models::{Signal, WatchedAddress};

pub const DEFAULT_SIGNALS_PATH: &str = "artifacts/realtime_signals.jsonl";
pub const DEFAULT_TRADES_PATH: &str = "artifacts/paper_trades.csv";
pub const DEFAULT_EQUITY_PATH: &str = "artifacts/paper_equity_curve.csv";

const WALLET_LABELS: [&str; 3] = ["A", "B", "C"];

/// Streaming and RPC endpoints plus the resolved watch set.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub ws_url: String,
    pub rpc_url: String,
    pub wallets: Vec<WatchedAddress>,
}

impl WatchConfig {
    pub fn from_env() -> crate::Result<Self> {
        Self::resolve(|key| std::env::var(key).ok())
    }

    pub fn resolve<F: Fn(&str) -> Option<String>>(get: F) -> crate::Result<Self> {
        let ws_url = trimmed(&get, "SOLANA_WS").ok_or("SOLANA_WS missing from environment")?;
        let rpc_url = trimmed(&get, "SOLANA_RPC").ok_or("SOLANA_RPC missing from environment")?;

        let configured = load_wallets(&get);
        if configured.is_empty() {
            return Err("No wallets found. Set WALLET_A / WALLET_B / WALLET_C".into());
        }
        let wallets = resolve_watch_set(configured, trimmed(&get, "WATCH_LABEL"));

        Ok(Self {
            ws_url,
            rpc_url,
            wallets,
        })
    }
}

fn load_wallets<F: Fn(&str) -> Option<String>>(get: &F) -> Vec<WatchedAddress> {
    WALLET_LABELS
        .iter()
        .filter_map(|label| {
            trimmed(get, &format!("WALLET_{label}")).map(|address| WatchedAddress {
                label: (*label).to_string(),
                address,
            })
        })
        .collect()
}

/// WATCH_LABEL behavior: unset watches every configured wallet; a configured
/// label selects that wallet only; anything else is treated as a raw address
/// and labelled `X` unless it matches a configured wallet.
fn resolve_watch_set(
    configured: Vec<WatchedAddress>,
    watch_label: Option<String>,
) -> Vec<WatchedAddress> {
    let Some(watch_label) = watch_label else {
        return configured;
    };

    let upper = watch_label.to_uppercase();
    if let Some(wallet) = configured.iter().find(|w| w.label == upper) {
        return vec![wallet.clone()];
    }

    if let Some(wallet) = configured.iter().find(|w| w.address == watch_label) {
        return vec![wallet.clone()];
    }

    vec![WatchedAddress {
        label: "X".to_string(),
        address: watch_label,
    }]
}

/// Named risk tier applied underneath explicit env overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskTier {
    Default,
    LowRisk,
}

impl RiskTier {
    fn parse(value: Option<String>) -> Self {
        match value.as_deref().map(str::to_uppercase).as_deref() {
            Some("LOW_RISK") => RiskTier::LowRisk,
            _ => RiskTier::Default,
        }
    }
}

/// Risk and cost model for the paper-execution engine. Resolved once per
/// run from defaults, an optional tier profile, and an optional relaxed
/// testing overlay; immutable afterwards.
#[derive(Debug, Clone)]
pub struct RiskConfig {
    pub starting_cash: f64,
    pub copy_fraction: f64,
    pub fee_bps: f64,
    pub slippage_bps: f64,
    pub min_signal_amount: f64,
    pub min_dominance: f64,
    pub hold_seconds: u64,
    pub take_profit_pct: f64,
    pub stop_loss_pct: f64,
    pub sell_fraction: f64,
    pub mint_allowlist: Option<HashSet<String>>,
    pub allowed_signals: HashSet<Signal>,
    pub tier: RiskTier,
    pub relaxed: bool,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            starting_cash: 1000.0,
            copy_fraction: 0.10,
            fee_bps: 20.0,
            slippage_bps: 30.0,
            min_signal_amount: 1.0,
            min_dominance: 0.7,
            hold_seconds: 900,
            take_profit_pct: 2.0,
            stop_loss_pct: 1.0,
            sell_fraction: 1.0,
            mint_allowlist: None,
            allowed_signals: HashSet::from([Signal::LargeTransfer, Signal::WhaleActivity]),
            tier: RiskTier::Default,
            relaxed: false,
        }
    }
}

impl RiskConfig {
    pub fn from_env() -> Self {
        Self::resolve(|key| std::env::var(key).ok())
    }

    pub fn resolve<F: Fn(&str) -> Option<String>>(get: F) -> Self {
        let mut cfg = Self::default();

        cfg.starting_cash = env_f64(&get, "PAPER_STARTING_CASH", cfg.starting_cash);
        cfg.copy_fraction = env_f64(&get, "PAPER_COPY_FRACTION", cfg.copy_fraction);
        cfg.fee_bps = env_f64(&get, "PAPER_FEE_BPS", cfg.fee_bps);
        cfg.slippage_bps = env_f64(&get, "PAPER_SLIPPAGE_BPS", cfg.slippage_bps);
        cfg.min_signal_amount = env_f64(&get, "PAPER_MIN_SIGNAL_AMOUNT", cfg.min_signal_amount);
        cfg.min_dominance = env_f64(&get, "PAPER_MIN_DOMINANCE", cfg.min_dominance);
        cfg.hold_seconds = env_u64(&get, "PAPER_HOLD_SECONDS", cfg.hold_seconds);
        cfg.take_profit_pct = env_f64(&get, "PAPER_TAKE_PROFIT_PCT", cfg.take_profit_pct);
        cfg.stop_loss_pct = env_f64(&get, "PAPER_STOP_LOSS_PCT", cfg.stop_loss_pct);
        cfg.sell_fraction = env_f64(&get, "PAPER_SELL_FRACTION", cfg.sell_fraction);
        cfg.mint_allowlist = parse_allowlist(get("PAPER_ALLOW_MINTS"));
        cfg.tier = RiskTier::parse(trimmed(&get, "PAPER_TIER"));

        // Tier values apply only where the operator left the var unset.
        if cfg.tier == RiskTier::LowRisk {
            if !is_set(&get, "PAPER_COPY_FRACTION") {
                cfg.copy_fraction = 0.05;
            }
            if !is_set(&get, "PAPER_MIN_DOMINANCE") {
                cfg.min_dominance = 0.85;
            }
            if !is_set(&get, "PAPER_MIN_SIGNAL_AMOUNT") {
                cfg.min_signal_amount = 1.0;
            }
            if !is_set(&get, "PAPER_TAKE_PROFIT_PCT") {
                cfg.take_profit_pct = 1.0;
            }
            if !is_set(&get, "PAPER_STOP_LOSS_PCT") {
                cfg.stop_loss_pct = 0.5;
            }
            if !is_set(&get, "PAPER_HOLD_SECONDS") {
                cfg.hold_seconds = 600;
            }
        }

        // Relaxed testing overlay: widens the signal set and forces the
        // thresholds down regardless of tier or explicit env values.
        if env_bool(&get, "PAPER_TEMP_LOWER_THRESHOLDS") {
            cfg.relaxed = true;
            cfg.allowed_signals.insert(Signal::NormalTransfer);
            cfg.min_signal_amount = 0.01;
            cfg.min_dominance = 0.30;
            if !is_set(&get, "PAPER_HOLD_SECONDS") {
                cfg.hold_seconds = cfg.hold_seconds.min(180);
            }
        }

        cfg
    }

    /// Allowed signal names, sorted for stable log output.
    pub fn allowed_signal_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> =
            self.allowed_signals.iter().map(Signal::as_str).collect();
        names.sort_unstable();
        names
    }
}

fn trimmed<F: Fn(&str) -> Option<String>>(get: &F, key: &str) -> Option<String> {
    get(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn is_set<F: Fn(&str) -> Option<String>>(get: &F, key: &str) -> bool {
    trimmed(get, key).is_some()
}

fn env_f64<F: Fn(&str) -> Option<String>>(get: &F, key: &str, default: f64) -> f64 {
    trimmed(get, key)
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(default)
}

fn env_u64<F: Fn(&str) -> Option<String>>(get: &F, key: &str, default: u64) -> u64 {
    trimmed(get, key)
        .and_then(|v| v.parse::<f64>().ok())
        .map(|v| v as u64)
        .unwrap_or(default)
}

fn env_bool<F: Fn(&str) -> Option<String>>(get: &F, key: &str) -> bool {
    trimmed(get, key)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "y" | "on"))
        .unwrap_or(false)
}

fn parse_allowlist(raw: Option<String>) -> Option<HashSet<String>> {
    let raw = raw?;
    let mints: HashSet<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect();
    if mints.is_empty() {
        None
    } else {
        Some(mints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let cfg = RiskConfig::resolve(env_of(&[]));

        assert_eq!(cfg.starting_cash, 1000.0);
        assert_eq!(cfg.copy_fraction, 0.10);
        assert_eq!(cfg.fee_bps, 20.0);
        assert_eq!(cfg.slippage_bps, 30.0);
        assert_eq!(cfg.min_signal_amount, 1.0);
        assert_eq!(cfg.min_dominance, 0.7);
        assert_eq!(cfg.hold_seconds, 900);
        assert_eq!(cfg.take_profit_pct, 2.0);
        assert_eq!(cfg.stop_loss_pct, 1.0);
        assert_eq!(cfg.sell_fraction, 1.0);
        assert!(cfg.mint_allowlist.is_none());
        assert_eq!(cfg.tier, RiskTier::Default);
        assert!(!cfg.relaxed);
        assert_eq!(
            cfg.allowed_signal_names(),
            vec!["large_transfer", "whale_activity"]
        );
    }

    #[test]
    fn test_env_overrides_defaults() {
        let cfg = RiskConfig::resolve(env_of(&[
            ("PAPER_STARTING_CASH", "5000"),
            ("PAPER_COPY_FRACTION", "0.25"),
            ("PAPER_HOLD_SECONDS", "120"),
        ]));

        assert_eq!(cfg.starting_cash, 5000.0);
        assert_eq!(cfg.copy_fraction, 0.25);
        assert_eq!(cfg.hold_seconds, 120);
    }

    #[test]
    fn test_unparseable_value_falls_back_to_default() {
        let cfg = RiskConfig::resolve(env_of(&[("PAPER_FEE_BPS", "not-a-number")]));
        assert_eq!(cfg.fee_bps, 20.0);
    }

    #[test]
    fn test_low_risk_tier_defaults() {
        let cfg = RiskConfig::resolve(env_of(&[("PAPER_TIER", "low_risk")]));

        assert_eq!(cfg.tier, RiskTier::LowRisk);
        assert_eq!(cfg.copy_fraction, 0.05);
        assert_eq!(cfg.min_dominance, 0.85);
        assert_eq!(cfg.take_profit_pct, 1.0);
        assert_eq!(cfg.stop_loss_pct, 0.5);
        assert_eq!(cfg.hold_seconds, 600);
    }

    #[test]
    fn test_explicit_env_beats_tier() {
        let cfg = RiskConfig::resolve(env_of(&[
            ("PAPER_TIER", "LOW_RISK"),
            ("PAPER_COPY_FRACTION", "0.2"),
            ("PAPER_HOLD_SECONDS", "1200"),
        ]));

        assert_eq!(cfg.copy_fraction, 0.2);
        assert_eq!(cfg.hold_seconds, 1200);
        // Untouched vars still pick up the tier values.
        assert_eq!(cfg.min_dominance, 0.85);
    }

    #[test]
    fn test_relaxed_overlay_forces_thresholds() {
        let cfg = RiskConfig::resolve(env_of(&[
            ("PAPER_TEMP_LOWER_THRESHOLDS", "true"),
            ("PAPER_MIN_SIGNAL_AMOUNT", "5.0"),
            ("PAPER_MIN_DOMINANCE", "0.9"),
        ]));

        assert!(cfg.relaxed);
        // Forced regardless of explicit env values.
        assert_eq!(cfg.min_signal_amount, 0.01);
        assert_eq!(cfg.min_dominance, 0.30);
        assert!(cfg.allowed_signals.contains(&Signal::NormalTransfer));
        assert_eq!(cfg.hold_seconds, 180);
    }

    #[test]
    fn test_relaxed_overlay_respects_explicit_hold() {
        let cfg = RiskConfig::resolve(env_of(&[
            ("PAPER_TEMP_LOWER_THRESHOLDS", "1"),
            ("PAPER_HOLD_SECONDS", "600"),
        ]));

        assert_eq!(cfg.hold_seconds, 600);
    }

    #[test]
    fn test_allowlist_parsing() {
        let cfg = RiskConfig::resolve(env_of(&[("PAPER_ALLOW_MINTS", " MintA , MintB ,")]));
        let allow = cfg.mint_allowlist.unwrap();

        assert_eq!(allow.len(), 2);
        assert!(allow.contains("MintA"));
        assert!(allow.contains("MintB"));
    }

    #[test]
    fn test_empty_allowlist_is_none() {
        let cfg = RiskConfig::resolve(env_of(&[("PAPER_ALLOW_MINTS", "  ")]));
        assert!(cfg.mint_allowlist.is_none());
    }

    #[test]
    fn test_watch_config_requires_endpoints() {
        let result = WatchConfig::resolve(env_of(&[("WALLET_A", "addr-a")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_watch_set_all_wallets() {
        let cfg = WatchConfig::resolve(env_of(&[
            ("SOLANA_WS", "wss://node.example/ws"),
            ("SOLANA_RPC", "https://node.example"),
            ("WALLET_A", "addr-a"),
            ("WALLET_C", "addr-c"),
        ]))
        .unwrap();

        assert_eq!(cfg.wallets.len(), 2);
        assert_eq!(cfg.wallets[0].label, "A");
        assert_eq!(cfg.wallets[1].label, "C");
    }

    #[test]
    fn test_watch_set_by_label() {
        let cfg = WatchConfig::resolve(env_of(&[
            ("SOLANA_WS", "wss://node.example/ws"),
            ("SOLANA_RPC", "https://node.example"),
            ("WALLET_A", "addr-a"),
            ("WALLET_B", "addr-b"),
            ("WATCH_LABEL", "b"),
        ]))
        .unwrap();

        assert_eq!(cfg.wallets.len(), 1);
        assert_eq!(cfg.wallets[0].label, "B");
        assert_eq!(cfg.wallets[0].address, "addr-b");
    }

    #[test]
    fn test_watch_set_by_known_address_keeps_label() {
        let cfg = WatchConfig::resolve(env_of(&[
            ("SOLANA_WS", "wss://node.example/ws"),
            ("SOLANA_RPC", "https://node.example"),
            ("WALLET_A", "addr-a"),
            ("WATCH_LABEL", "addr-a"),
        ]))
        .unwrap();

        assert_eq!(cfg.wallets.len(), 1);
        assert_eq!(cfg.wallets[0].label, "A");
    }

    #[test]
    fn test_watch_set_by_unknown_address_gets_x_label() {
        let cfg = WatchConfig::resolve(env_of(&[
            ("SOLANA_WS", "wss://node.example/ws"),
            ("SOLANA_RPC", "https://node.example"),
            ("WALLET_A", "addr-a"),
            ("WATCH_LABEL", "some-other-address"),
        ]))
        .unwrap();

        assert_eq!(cfg.wallets.len(), 1);
        assert_eq!(cfg.wallets[0].label, "X");
        assert_eq!(cfg.wallets[0].address, "some-other-address");
    }
}
