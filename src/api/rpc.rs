use reqwest::Client;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::time::{sleep, Duration};

const MAX_RETRIES: u32 = 3;
const RETRY_BACKOFF_MS: u64 = 1200; // linear: attempt * this
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("rpc transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("rpc error: {0}")]
    Node(String),
    #[error("rpc failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

/// JSON-RPC client for transaction detail lookups.
#[derive(Clone)]
pub struct RpcClient {
    client: Client,
    rpc_url: String,
}

impl RpcClient {
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            rpc_url: rpc_url.into(),
        }
    }

    /// Fetch a transaction by signature with `jsonParsed` encoding.
    /// `Ok(None)` means the node does not know the signature.
    pub async fn get_transaction(&self, signature: &str) -> Result<Option<Value>, RpcError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "getTransaction",
            "params": [
                signature,
                {
                    "encoding": "jsonParsed",
                    "maxSupportedTransactionVersion": 0,
                },
            ],
        });

        let data = self.post(payload).await?;
        match data.get("result") {
            Some(Value::Null) | None => Ok(None),
            Some(result) => Ok(Some(result.clone())),
        }
    }

    async fn post(&self, payload: Value) -> Result<Value, RpcError> {
        let mut last_err = String::new();

        for attempt in 1..=MAX_RETRIES {
            match self.post_once(&payload).await {
                Ok(data) => return Ok(data),
                Err(e) => {
                    last_err = e.to_string();
                    tracing::warn!(
                        attempt,
                        max_retries = MAX_RETRIES,
                        error = %last_err,
                        "rpc attempt failed"
                    );
                    if attempt < MAX_RETRIES {
                        sleep(Duration::from_millis(RETRY_BACKOFF_MS * u64::from(attempt))).await;
                    }
                }
            }
        }

        Err(RpcError::RetriesExhausted {
            attempts: MAX_RETRIES,
            last: last_err,
        })
    }

    async fn post_once(&self, payload: &Value) -> Result<Value, RpcError> {
        let data: Value = self
            .client
            .post(&self.rpc_url)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .json(payload)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(err) = data.get("error") {
            return Err(RpcError::Node(err.to_string()));
        }
        Ok(data)
    }
}
