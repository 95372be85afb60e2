// Paper-execution engine: consumes chain events in arrival order, applies
// the risk filter chain, manages per-mint positions, executes simulated
// buys and sells under the fee + slippage cost model, and marks equity to
// market. Strictly sequential; one event at a time.
pub mod report;

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use uuid::Uuid;

use crate::api::PriceOracle;
use crate::config::RiskConfig;
use crate::models::{
    ChainEvent, EquitySnapshot, ExitReason, Position, Signal, Trade, TradeSide,
};

// Positions below this many units collapse to exactly zero.
const DUST_EPSILON: f64 = 1e-12;

fn bps_to_mult(bps: f64) -> f64 {
    bps / 10_000.0
}

/// Why an event produced no entry. Every variant is a counted, expected
/// outcome; none of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SkipReason {
    ChainError,
    MissingFields,
    Allowlist,
    SignalType,
    MinAmount,
    MinDominance,
    NoPrice,
    InsufficientCash,
    NoPosition,
}

impl SkipReason {
    pub const ALL: [SkipReason; 9] = [
        SkipReason::ChainError,
        SkipReason::MissingFields,
        SkipReason::Allowlist,
        SkipReason::SignalType,
        SkipReason::MinAmount,
        SkipReason::MinDominance,
        SkipReason::NoPrice,
        SkipReason::InsufficientCash,
        SkipReason::NoPosition,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::ChainError => "skip_err",
            SkipReason::MissingFields => "skip_missing_fields",
            SkipReason::Allowlist => "skip_allowlist",
            SkipReason::SignalType => "skip_signal_type",
            SkipReason::MinAmount => "skip_min_amount",
            SkipReason::MinDominance => "skip_min_dominance",
            SkipReason::NoPrice => "skip_no_price",
            SkipReason::InsufficientCash => "skip_insufficient_cash",
            SkipReason::NoPosition => "skip_no_position",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-reason counters. Every key is always present in the report, zero or
/// not.
#[derive(Debug, Default, Clone)]
pub struct SkipCounters {
    counts: HashMap<SkipReason, u64>,
}

impl SkipCounters {
    fn bump(&mut self, reason: SkipReason) {
        *self.counts.entry(reason).or_insert(0) += 1;
    }

    pub fn get(&self, reason: SkipReason) -> u64 {
        self.counts.get(&reason).copied().unwrap_or(0)
    }

    pub fn as_map(&self) -> BTreeMap<&'static str, u64> {
        SkipReason::ALL
            .iter()
            .map(|reason| (reason.as_str(), self.get(*reason)))
            .collect()
    }
}

/// Outcome of processing one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Passed the filter chain; a buy executed (and possibly an exit sell
    /// beforehand).
    Executed,
    /// Rejected before any entry. The exit leg may still have run when the
    /// rejection was `InsufficientCash`.
    Rejected(SkipReason),
}

// Everything the filter chain has to agree on before the engine acts.
struct Candidate<'a> {
    signature: &'a str,
    mint: &'a str,
    signal: Signal,
    top_amount: f64,
}

/// End-of-run accounting.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub starting_cash: f64,
    pub ending_equity: f64,
    pub return_pct: f64,
}

pub struct PaperEngine<O> {
    cfg: RiskConfig,
    oracle: O,
    cash: f64,
    positions: HashMap<String, Position>,
    trades: Vec<Trade>,
    equity: Vec<EquitySnapshot>,
    skips: SkipCounters,
}

impl<O: PriceOracle> PaperEngine<O> {
    pub fn new(cfg: RiskConfig, oracle: O) -> Self {
        Self {
            cash: cfg.starting_cash,
            cfg,
            oracle,
            positions: HashMap::new(),
            trades: Vec::new(),
            equity: Vec::new(),
            skips: SkipCounters::default(),
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn position(&self, mint: &str) -> Option<&Position> {
        self.positions.get(mint)
    }

    pub fn open_position_count(&self) -> usize {
        self.positions.values().filter(|p| p.is_open()).count()
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn equity_curve(&self) -> &[EquitySnapshot] {
        &self.equity
    }

    pub fn skips(&self) -> &SkipCounters {
        &self.skips
    }

    pub fn config(&self) -> &RiskConfig {
        &self.cfg
    }

    /// Process one chain event in arrival order.
    ///
    /// Rejections leave trading state untouched; only the exit leg may run
    /// before an insufficient-cash rejection of the entry.
    pub async fn process_event(&mut self, event: &ChainEvent) -> EventOutcome {
        let candidate = match self.screen(event) {
            Ok(candidate) => candidate,
            Err(reason) => {
                self.skips.bump(reason);
                return EventOutcome::Rejected(reason);
            }
        };

        let Some(price) = self.oracle.get_price(candidate.mint).await else {
            self.skips.bump(SkipReason::NoPrice);
            return EventOutcome::Rejected(SkipReason::NoPrice);
        };

        let ts = event.write_ts;
        let signature = candidate.signature.to_string();
        let mint = candidate.mint.to_string();
        let signal = candidate.signal;
        let top_amount = candidate.top_amount;

        // Exit evaluation for this mint runs before any new entry, at the
        // freshly resolved price.
        self.maybe_exit(ts, &mint, price, &signature);

        if let Err(reason) = self.enter(ts, &mint, price, &signature, signal, top_amount) {
            self.skips.bump(reason);
            return EventOutcome::Rejected(reason);
        }

        self.mark_equity(ts).await;
        EventOutcome::Executed
    }

    /// The filter chain. The first failing check rejects the event; nothing
    /// mutates on rejection.
    fn screen<'a>(&self, event: &'a ChainEvent) -> Result<Candidate<'a>, SkipReason> {
        if event.err.is_some() {
            return Err(SkipReason::ChainError);
        }

        let signature = event
            .signature
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(SkipReason::MissingFields)?;
        let mint = event
            .top_mint
            .as_deref()
            .filter(|m| !m.is_empty())
            .ok_or(SkipReason::MissingFields)?;

        if let Some(allowlist) = &self.cfg.mint_allowlist {
            if !allowlist.contains(mint) {
                return Err(SkipReason::Allowlist);
            }
        }

        let signal = match event.signal {
            Some(signal) if self.cfg.allowed_signals.contains(&signal) => signal,
            _ => return Err(SkipReason::SignalType),
        };

        let top_amount = event.top_amount.unwrap_or(0.0);
        if top_amount < self.cfg.min_signal_amount {
            return Err(SkipReason::MinAmount);
        }

        if event.dominance.unwrap_or(0.0) < self.cfg.min_dominance {
            return Err(SkipReason::MinDominance);
        }

        Ok(Candidate {
            signature,
            mint,
            signal,
            top_amount,
        })
    }

    // Exit reason priority: take-profit, then stop-loss, then time exit.
    fn maybe_exit(&mut self, ts: f64, mint: &str, price: f64, signature: &str) {
        let position = match self.positions.get(mint) {
            Some(p) if p.units > 0.0 => *p,
            _ => {
                self.skips.bump(SkipReason::NoPosition);
                return;
            }
        };
        if position.avg_entry <= 0.0 {
            return;
        }

        let pnl_pct = (price / position.avg_entry - 1.0) * 100.0;
        let held_secs = ts - position.entry_ts;

        let reason = if pnl_pct >= self.cfg.take_profit_pct {
            Some(ExitReason::TakeProfit)
        } else if pnl_pct <= -self.cfg.stop_loss_pct.abs() {
            Some(ExitReason::StopLoss)
        } else if held_secs >= self.cfg.hold_seconds as f64 {
            Some(ExitReason::TimeExit)
        } else {
            None
        };
        let Some(reason) = reason else {
            return;
        };

        let sell_units = position.units * self.cfg.sell_fraction;
        if sell_units <= 0.0 {
            return;
        }

        let gross = sell_units * price;
        let fees = gross * bps_to_mult(self.cfg.fee_bps);
        let slippage = gross * bps_to_mult(self.cfg.slippage_bps);
        let net = gross - fees - slippage;

        self.cash += net;
        if let Some(position) = self.positions.get_mut(mint) {
            position.units -= sell_units;
            if position.units < DUST_EPSILON {
                *position = Position::default();
            }
        }

        self.trades.push(Trade {
            id: Uuid::new_v4(),
            ts,
            signature: signature.to_string(),
            side: TradeSide::Sell,
            mint: mint.to_string(),
            signal: None,
            reason: Some(reason),
            price_usd: price,
            units: sell_units,
            gross_usd: gross,
            fees_usd: fees,
            slippage_usd: slippage,
            net_usd: net,
            cash_usd: self.cash,
            pnl_pct_vs_entry: Some(pnl_pct),
        });

        tracing::info!(
            mint,
            reason = %reason,
            units = sell_units,
            price_usd = price,
            pnl_pct,
            "paper SELL"
        );
    }

    /// Entry sizing: copy a fraction of the observed transfer at the
    /// current price. A buy that would take cash negative is rejected
    /// whole, never clipped.
    fn enter(
        &mut self,
        ts: f64,
        mint: &str,
        price: f64,
        signature: &str,
        signal: Signal,
        top_amount: f64,
    ) -> Result<(), SkipReason> {
        let trade_units = top_amount * self.cfg.copy_fraction;
        let gross = trade_units * price;
        let fees = gross * bps_to_mult(self.cfg.fee_bps);
        let slippage = gross * bps_to_mult(self.cfg.slippage_bps);
        let total_cost = gross + fees + slippage;

        if total_cost > self.cash {
            return Err(SkipReason::InsufficientCash);
        }

        self.cash -= total_cost;

        let position = self.positions.entry(mint.to_string()).or_default();
        let prev_units = position.units;
        let new_units = prev_units + trade_units;
        if prev_units <= 0.0 {
            position.avg_entry = price;
            position.entry_ts = ts;
        } else {
            // Cost-weighted average across accumulated entries.
            position.avg_entry =
                (prev_units * position.avg_entry + trade_units * price) / new_units;
        }
        position.units = new_units;

        self.trades.push(Trade {
            id: Uuid::new_v4(),
            ts,
            signature: signature.to_string(),
            side: TradeSide::Buy,
            mint: mint.to_string(),
            signal: Some(signal),
            reason: None,
            price_usd: price,
            units: trade_units,
            gross_usd: gross,
            fees_usd: fees,
            slippage_usd: slippage,
            net_usd: total_cost,
            cash_usd: self.cash,
            pnl_pct_vs_entry: None,
        });

        tracing::info!(
            mint,
            signal = signal.as_str(),
            units = trade_units,
            price_usd = price,
            total_cost_usd = total_cost,
            "paper BUY"
        );
        Ok(())
    }

    // Mints with no resolvable price are left out of this snapshot, not
    // valued at zero.
    async fn mark_equity(&mut self, ts: f64) {
        let open: Vec<(String, f64)> = self
            .positions
            .iter()
            .filter(|(_, p)| p.is_open())
            .map(|(mint, p)| (mint.clone(), p.units))
            .collect();

        let mut position_value = 0.0;
        for (mint, units) in &open {
            if let Some(price) = self.oracle.get_price(mint).await {
                position_value += units * price;
            }
        }

        self.equity.push(EquitySnapshot {
            ts,
            cash_usd: self.cash,
            position_value_usd: position_value,
            equity_usd: self.cash + position_value,
            open_positions: open.len(),
        });
    }

    pub fn summary(&self) -> RunSummary {
        let ending_equity = self.equity.last().map_or(self.cash, |s| s.equity_usd);
        RunSummary {
            starting_cash: self.cfg.starting_cash,
            ending_equity,
            return_pct: (ending_equity / self.cfg.starting_cash - 1.0) * 100.0,
        }
    }
}
