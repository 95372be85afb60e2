use std::path::PathBuf;

use clap::Parser;
use copybot::api::JupiterPriceClient;
use copybot::config::{
    RiskConfig, DEFAULT_EQUITY_PATH, DEFAULT_SIGNALS_PATH, DEFAULT_TRADES_PATH,
};
use copybot::engine::report::{write_equity_csv, write_trades_csv};
use copybot::engine::PaperEngine;
use copybot::watcher::read_events;
use copybot::Result;

/// Replay the recorded event log through the paper-execution engine.
#[derive(Parser, Debug)]
#[command(name = "execute", about = "Paper-execute recorded wallet signals")]
struct Args {
    /// Event log produced by the watcher.
    #[arg(long, default_value = DEFAULT_SIGNALS_PATH)]
    signals: PathBuf,

    /// Trade ledger output.
    #[arg(long, default_value = DEFAULT_TRADES_PATH)]
    trades_out: PathBuf,

    /// Equity curve output.
    #[arg(long, default_value = DEFAULT_EQUITY_PATH)]
    equity_out: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let args = Args::parse();
    let cfg = RiskConfig::from_env();

    tracing::info!(
        tier = ?cfg.tier,
        relaxed = cfg.relaxed,
        allowed_signals = ?cfg.allowed_signal_names(),
        min_signal_amount = cfg.min_signal_amount,
        min_dominance = cfg.min_dominance,
        copy_fraction = cfg.copy_fraction,
        hold_seconds = cfg.hold_seconds,
        take_profit_pct = cfg.take_profit_pct,
        stop_loss_pct = cfg.stop_loss_pct,
        "resolved risk config"
    );

    if !args.signals.exists() {
        return Err(format!(
            "Missing {}. Run the watcher first.",
            args.signals.display()
        )
        .into());
    }
    let events = read_events(&args.signals)?;
    tracing::info!("Loaded {} events from {}", events.len(), args.signals.display());

    let mut engine = PaperEngine::new(cfg, JupiterPriceClient::new());
    for event in &events {
        engine.process_event(event).await;
    }

    if engine.trades().is_empty() {
        tracing::warn!("No trades executed. Thresholds too strict or no qualifying signals.");
    } else {
        write_trades_csv(&args.trades_out, engine.trades())?;
        tracing::info!("Saved {}", args.trades_out.display());
    }

    if !engine.equity_curve().is_empty() {
        write_equity_csv(&args.equity_out, engine.equity_curve())?;
        tracing::info!("Saved {}", args.equity_out.display());

        let summary = engine.summary();
        tracing::info!(
            starting_cash = summary.starting_cash,
            ending_equity = summary.ending_equity,
            return_pct = summary.return_pct,
            "run summary"
        );
    }

    tracing::info!("Skipped: {:?}", engine.skips().as_map());
    Ok(())
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter("copybot=info,execute=info")
        .init();
}
