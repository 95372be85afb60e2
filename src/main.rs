use std::sync::Arc;

use copybot::config::{WatchConfig, DEFAULT_SIGNALS_PATH};
use copybot::watcher::{spawn_listeners, EventLog};
use copybot::Result;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let config = WatchConfig::from_env()?;
    let log = Arc::new(EventLog::open(DEFAULT_SIGNALS_PATH)?);

    tracing::info!("🚀 Copybot watcher starting");
    tracing::info!("  WS endpoint: {}", config.ws_url);
    tracing::info!("  RPC endpoint: {}", config.rpc_url);
    tracing::info!("  Event log: {}", log.path().display());
    for wallet in &config.wallets {
        tracing::info!("  Watching {} ({})", wallet.label, wallet.address);
    }

    let cancel = CancellationToken::new();
    let handles = spawn_listeners(
        config.wallets.clone(),
        &config.ws_url,
        &config.rpc_url,
        log,
        &cancel,
    );
    tracing::info!("✅ {} listeners running. Press Ctrl+C to stop...", handles.len());

    tokio::signal::ctrl_c().await?;
    tracing::info!("⚠️  Received Ctrl+C, shutting down listeners...");
    cancel.cancel();
    for handle in handles {
        let _ = handle.await;
    }

    tracing::info!("👋 Copybot watcher stopped");
    Ok(())
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter("copybot=info")
        .init();
}
