use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tokio::time::{sleep, Duration};

// Stablecoin mint constants (Solana mainnet)
pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
pub const USDT_MINT: &str = "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB";

const JUPITER_PRICE_URL: &str = "https://price.jup.ag/v6/price";
const MAX_RETRIES: u32 = 3;
const RETRY_BACKOFF_MS: u64 = 500; // linear: attempt * this

/// Anything the engine can ask for a current USD price.
///
/// `None` is the soft "unavailable" outcome; oracle failures never surface
/// as errors to the caller.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    async fn get_price(&self, mint: &str) -> Option<f64>;
}

/// Client for the Jupiter price API.
#[derive(Clone)]
pub struct JupiterPriceClient {
    client: Client,
    base_url: String,
}

impl JupiterPriceClient {
    pub fn new() -> Self {
        Self::with_base_url(JUPITER_PRICE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    async fn fetch_once(&self, mint: &str) -> crate::Result<Option<f64>> {
        let data: Value = self
            .client
            .get(&self.base_url)
            .query(&[("ids", mint)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        // Expected shape: { "data": { "<mint>": { "price": <float> } } }
        Ok(data
            .pointer(&format!("/data/{mint}/price"))
            .and_then(Value::as_f64))
    }
}

impl Default for JupiterPriceClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PriceOracle for JupiterPriceClient {
    /// Spot USD price for a mint. Known stablecoins resolve instantly to
    /// 1.0; everything else gets bounded retries with linear backoff before
    /// giving up as unavailable.
    async fn get_price(&self, mint: &str) -> Option<f64> {
        let mint = mint.trim();
        if mint.is_empty() {
            return None;
        }
        if mint == USDC_MINT || mint == USDT_MINT {
            return Some(1.0);
        }

        let mut last_err = String::new();
        for attempt in 1..=MAX_RETRIES {
            match self.fetch_once(mint).await {
                Ok(price) => return price,
                Err(e) => {
                    last_err = e.to_string();
                    tracing::warn!(
                        attempt,
                        max_retries = MAX_RETRIES,
                        error = %last_err,
                        "price fetch attempt failed"
                    );
                    if attempt < MAX_RETRIES {
                        sleep(Duration::from_millis(RETRY_BACKOFF_MS * u64::from(attempt))).await;
                    }
                }
            }
        }

        tracing::error!(mint, error = %last_err, "price fetch failed after retries");
        None
    }
}
