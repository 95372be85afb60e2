// Realtime wallet listeners: one websocket subscription per watched
// address, each enriched into chain events and appended to the shared log.
pub mod event_log;

pub use event_log::{read_events, unix_now, EventLog};

use std::sync::Arc;

use anyhow::{anyhow, Context};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Duration, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::api::{extract_spl_transfers, RpcClient};
use crate::classifier::classify_transfers;
use crate::models::{ChainEvent, Signal, WatchedAddress};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const PING_INTERVAL_SECS: u64 = 20;
const IDLE_TIMEOUT_SECS: u64 = 45;
const SUBSCRIBE_ACK_TIMEOUT_SECS: u64 = 20;
const ENRICH_TIMEOUT_SECS: u64 = 45;

pub const BACKOFF_INITIAL_SECS: f64 = 1.0;
pub const BACKOFF_MULTIPLIER: f64 = 1.7;
pub const BACKOFF_CAP_SECS: f64 = 30.0;

/// Reconnect delay schedule: monotonically non-decreasing up to the cap,
/// reset to the initial delay after a successful subscription.
#[derive(Debug, Clone)]
pub struct Backoff {
    delay_secs: f64,
}

impl Backoff {
    pub fn new() -> Self {
        Self {
            delay_secs: BACKOFF_INITIAL_SECS,
        }
    }

    /// Delay to sleep before the next attempt, advancing the schedule.
    pub fn next_delay(&mut self) -> f64 {
        let delay = self.delay_secs;
        self.delay_secs = (self.delay_secs * BACKOFF_MULTIPLIER).min(BACKOFF_CAP_SECS);
        delay
    }

    pub fn reset(&mut self) {
        self.delay_secs = BACKOFF_INITIAL_SECS;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

/// Connection lifecycle of one listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Connecting,
    Subscribed,
    BackingOff,
}

/// Spawn one listener task per watched address.
///
/// Tasks share only the event log; a slow fetch on one wallet delays that
/// wallet's subsequent events, never another wallet's.
pub fn spawn_listeners(
    wallets: Vec<WatchedAddress>,
    ws_url: &str,
    rpc_url: &str,
    log: Arc<EventLog>,
    cancel: &CancellationToken,
) -> Vec<JoinHandle<()>> {
    wallets
        .into_iter()
        .map(|wallet| {
            let ws_url = ws_url.to_string();
            let rpc = RpcClient::new(rpc_url);
            let log = log.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { watch_wallet(wallet, ws_url, rpc, log, cancel).await })
        })
        .collect()
}

/// Run one indefinitely-retrying listener for a single wallet.
/// Returns only once `cancel` fires.
pub async fn watch_wallet(
    wallet: WatchedAddress,
    ws_url: String,
    rpc: RpcClient,
    log: Arc<EventLog>,
    cancel: CancellationToken,
) {
    let mut backoff = Backoff::new();

    loop {
        if cancel.is_cancelled() {
            break;
        }

        tracing::info!(
            wallet = %wallet.label,
            state = ?ListenerState::Connecting,
            url = %ws_url,
            "connecting"
        );

        let session = tokio::select! {
            _ = cancel.cancelled() => break,
            result = run_session(&wallet, &ws_url, &rpc, &log, &mut backoff, &cancel) => result,
        };

        match session {
            // The session only returns cleanly when cancellation fired.
            Ok(()) => break,
            Err(e) => {
                tracing::warn!(wallet = %wallet.label, error = %e, "listener error, will reconnect");
            }
        }

        let delay = backoff.next_delay();
        tracing::debug!(
            wallet = %wallet.label,
            state = ?ListenerState::BackingOff,
            delay_secs = delay,
            "backing off"
        );

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = sleep(Duration::from_secs_f64(delay)) => {}
        }
    }

    tracing::info!(wallet = %wallet.label, "listener stopped");
}

async fn run_session(
    wallet: &WatchedAddress,
    ws_url: &str,
    rpc: &RpcClient,
    log: &EventLog,
    backoff: &mut Backoff,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let mut ws = connect_and_subscribe(wallet, ws_url).await?;
    backoff.reset();
    tracing::info!(wallet = %wallet.label, state = ?ListenerState::Subscribed, "subscribed");

    let mut ping = tokio::time::interval(Duration::from_secs(PING_INTERVAL_SECS));
    ping.tick().await; // the first tick fires immediately
    let mut last_frame = Instant::now();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = ws.close(None).await;
                return Ok(());
            }
            _ = ping.tick() => {
                if last_frame.elapsed() > Duration::from_secs(IDLE_TIMEOUT_SECS) {
                    return Err(anyhow!("idle timeout, link presumed dead"));
                }
                ws.send(Message::Ping(Vec::new()))
                    .await
                    .context("keepalive ping failed")?;
            }
            frame = ws.next() => {
                last_frame = Instant::now();
                match frame {
                    None => return Err(anyhow!("websocket stream ended")),
                    Some(Err(e)) => return Err(anyhow!(e).context("websocket receive failed")),
                    Some(Ok(Message::Text(text))) => {
                        let Some((signature, err)) = parse_notification(&text) else {
                            continue;
                        };

                        let event = tokio::select! {
                            _ = cancel.cancelled() => {
                                let _ = ws.close(None).await;
                                return Ok(());
                            }
                            event = build_event(wallet, rpc, signature, err) => event,
                        };

                        let event = log
                            .append(event)
                            .await
                            .map_err(|e| anyhow!("event log append failed: {e}"))?;
                        tracing::info!(
                            wallet = %wallet.label,
                            signature = event.signature.as_deref().unwrap_or(""),
                            signal = event.signal.map(|s| s.as_str()).unwrap_or(""),
                            "event recorded"
                        );
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        ws.send(Message::Pong(payload))
                            .await
                            .context("keepalive pong failed")?;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        return Err(anyhow!("websocket closed by peer: {frame:?}"));
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}

async fn connect_and_subscribe(
    wallet: &WatchedAddress,
    ws_url: &str,
) -> anyhow::Result<WsStream> {
    let (mut ws, _response) = connect_async(ws_url)
        .await
        .with_context(|| format!("failed connecting to {ws_url}"))?;

    let request = subscribe_request(&wallet.address);
    ws.send(Message::Text(request.to_string()))
        .await
        .context("failed sending logsSubscribe")?;

    // Enter notification mode only after the node acknowledges the request.
    let subscription = timeout(
        Duration::from_secs(SUBSCRIBE_ACK_TIMEOUT_SECS),
        await_subscribe_ack(&mut ws),
    )
    .await
    .map_err(|_| anyhow!("subscribe acknowledgement timed out"))??;

    tracing::debug!(wallet = %wallet.label, subscription, "logsSubscribe acknowledged");
    Ok(ws)
}

fn subscribe_request(address: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "logsSubscribe",
        "params": [
            {"mentions": [address]},
            {"commitment": "finalized"},
        ],
    })
}

async fn await_subscribe_ack(ws: &mut WsStream) -> anyhow::Result<u64> {
    while let Some(frame) = ws.next().await {
        match frame.context("websocket receive during subscribe")? {
            Message::Text(text) => {
                let value: Value =
                    serde_json::from_str(&text).context("invalid subscribe response json")?;
                if let Some(err) = value.get("error") {
                    return Err(anyhow!("subscribe rejected: {err}"));
                }
                if let Some(subscription) = value.get("result").and_then(Value::as_u64) {
                    return Ok(subscription);
                }
            }
            Message::Ping(payload) => {
                ws.send(Message::Pong(payload))
                    .await
                    .context("pong during subscribe failed")?;
            }
            other => tracing::debug!(?other, "ignoring pre-ack frame"),
        }
    }
    Err(anyhow!("websocket closed before subscribe acknowledgement"))
}

/// Extract (signature, chain error) from a logsNotification frame.
/// Anything else, including the subscribe acknowledgement, yields `None`.
fn parse_notification(text: &str) -> Option<(Option<String>, Option<Value>)> {
    let value: Value = serde_json::from_str(text).ok()?;
    if value.get("method").and_then(Value::as_str) != Some("logsNotification") {
        return None;
    }

    let event = value.pointer("/params/result/value")?;
    let signature = event
        .get("signature")
        .and_then(Value::as_str)
        .map(str::to_string);
    let err = event.get("err").filter(|e| !e.is_null()).cloned();

    Some((signature, err))
}

/// Build the chain event for one notification. Chain-level errors pass
/// through without enrichment; everything else goes through fetch, extract
/// and classify, with fetch problems degraded to terminal signals on the
/// event rather than listener failures.
async fn build_event(
    wallet: &WatchedAddress,
    rpc: &RpcClient,
    signature: Option<String>,
    err: Option<Value>,
) -> ChainEvent {
    let mut event = ChainEvent {
        wallet_label: wallet.label.clone(),
        wallet: wallet.address.clone(),
        signature: signature.clone(),
        err,
        ..ChainEvent::default()
    };

    let Some(signature) = signature else {
        return event;
    };
    if event.err.is_some() {
        return event;
    }

    let fetched = timeout(
        Duration::from_secs(ENRICH_TIMEOUT_SECS),
        rpc.get_transaction(&signature),
    )
    .await;

    match fetched {
        Err(_) => {
            event.signal = Some(Signal::FetchFailed);
            event.error = Some("transaction fetch timed out".to_string());
        }
        Ok(Err(e)) => {
            event.signal = Some(Signal::FetchFailed);
            event.error = Some(e.to_string());
        }
        Ok(Ok(None)) => {
            event.signal = Some(Signal::TxMissing);
        }
        Ok(Ok(Some(tx))) => {
            let transfers = extract_spl_transfers(&tx);
            match classify_transfers(&transfers) {
                Some(classification) => classification.stamp(&mut event),
                None => event.signal = Some(Signal::NoTransfers),
            }
        }
    }

    event
}
