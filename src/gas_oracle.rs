//! Gas Price Oracle.
//!
//! Caches tiered fee data from an external feed, refreshing on its own
//! timer independent of the scan cycle. Quotes are integer wei; EIP-1559
//! fields are present only when the fee market supports them. If every
//! source fails the oracle serves a hardcoded fallback so the validator can
//! still price (conservatively) rather than stall the cycle.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, trace, warn};

use crate::error::PipelineError;

/// Timeout for feed calls.
const FEED_TIMEOUT: Duration = Duration::from_secs(5);

/// Sanity clamp, in wei (0.01 gwei .. 1000 gwei).
const MIN_GAS_WEI: u128 = 10_000_000;
const MAX_GAS_WEI: u128 = 1_000_000_000_000;

/// Fallback when no source answers (20 gwei).
const FALLBACK_GAS_WEI: u128 = 20_000_000_000;

/// Fee tier to quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GasTier {
    Safe,
    Standard,
    Fast,
}

/// Tiered fee snapshot. Read-only once issued.
#[derive(Debug, Clone)]
pub struct GasQuote {
    pub safe_wei: u128,
    pub standard_wei: u128,
    pub fast_wei: u128,
    /// Present when the chain runs an EIP-1559 fee market.
    pub base_fee_wei: Option<u128>,
    pub priority_fee_wei: Option<u128>,
    pub fetched_at: Instant,
}

impl GasQuote {
    pub fn price_for(&self, tier: GasTier) -> u128 {
        match tier {
            GasTier::Safe => self.safe_wei,
            GasTier::Standard => self.standard_wei,
            GasTier::Fast => self.fast_wei,
        }
    }

    pub fn supports_eip1559(&self) -> bool {
        self.base_fee_wei.is_some()
    }

    /// Price a transaction actually pays at a tier.
    pub fn effective_price(&self, tier: GasTier) -> u128 {
        match (self.base_fee_wei, self.priority_fee_wei) {
            (Some(base), Some(priority)) => base + priority,
            _ => self.price_for(tier),
        }
    }

    pub fn is_stale(&self, refresh_interval: Duration) -> bool {
        self.fetched_at.elapsed() > refresh_interval
    }

    fn fallback() -> Self {
        Self {
            safe_wei: FALLBACK_GAS_WEI * 8 / 10,
            standard_wei: FALLBACK_GAS_WEI,
            fast_wei: FALLBACK_GAS_WEI * 12 / 10,
            base_fee_wei: None,
            priority_fee_wei: None,
            fetched_at: Instant::now(),
        }
    }
}

/// External fee source seam.
#[async_trait]
pub trait GasFeed: Send + Sync {
    async fn fetch(&self, chain_id: u64) -> Result<GasQuote, PipelineError>;
}

// ============================================
// HTTP FEED
// ============================================

#[derive(Debug, Deserialize)]
struct FeedResponse {
    result: Option<FeedResult>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FeedResult {
    #[serde(rename = "SafeGasPrice")]
    safe_gas_price: Option<String>,
    #[serde(rename = "ProposeGasPrice")]
    propose_gas_price: Option<String>,
    #[serde(rename = "FastGasPrice")]
    fast_gas_price: Option<String>,
    #[serde(rename = "suggestBaseFee")]
    suggest_base_fee: Option<String>,
}

/// Gas-tracker style HTTP feed (gwei decimal strings in, wei out).
pub struct HttpGasFeed {
    http: Client,
    url: String,
    api_key: Option<String>,
}

impl HttpGasFeed {
    pub fn new(url: String, api_key: Option<String>) -> Self {
        let http = Client::builder()
            .timeout(FEED_TIMEOUT)
            .build()
            .expect("reqwest client");
        Self { http, url, api_key }
    }

    fn gwei_to_wei(text: &str) -> Option<u128> {
        let gwei: f64 = text.trim().parse().ok()?;
        if !gwei.is_finite() || gwei < 0.0 {
            return None;
        }
        Some((gwei * 1e9) as u128)
    }
}

#[async_trait]
impl GasFeed for HttpGasFeed {
    async fn fetch(&self, chain_id: u64) -> Result<GasQuote, PipelineError> {
        let mut url = format!(
            "{}?chainid={}&module=gastracker&action=gasoracle",
            self.url, chain_id
        );
        if let Some(key) = &self.api_key {
            url.push_str("&apikey=");
            url.push_str(key);
        }

        let response: FeedResponse = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| PipelineError::DataUnavailable(format!("gas feed: {e}")))?
            .json()
            .await
            .map_err(|e| PipelineError::DataUnavailable(format!("gas feed decode: {e}")))?;

        let result = response.result.ok_or_else(|| {
            PipelineError::DataUnavailable(format!(
                "gas feed empty result: {}",
                response.message.unwrap_or_default()
            ))
        })?;

        let standard = result
            .propose_gas_price
            .as_deref()
            .and_then(Self::gwei_to_wei)
            .unwrap_or(FALLBACK_GAS_WEI);
        let safe = result
            .safe_gas_price
            .as_deref()
            .and_then(Self::gwei_to_wei)
            .unwrap_or(standard * 8 / 10);
        let fast = result
            .fast_gas_price
            .as_deref()
            .and_then(Self::gwei_to_wei)
            .unwrap_or(standard * 12 / 10);
        let base_fee = result.suggest_base_fee.as_deref().and_then(Self::gwei_to_wei);

        Ok(GasQuote {
            safe_wei: safe.clamp(MIN_GAS_WEI, MAX_GAS_WEI),
            standard_wei: standard.clamp(MIN_GAS_WEI, MAX_GAS_WEI),
            fast_wei: fast.clamp(MIN_GAS_WEI, MAX_GAS_WEI),
            base_fee_wei: base_fee.map(|b| b.clamp(MIN_GAS_WEI, MAX_GAS_WEI)),
            // Tip is the spread between the fast tier and the base fee.
            priority_fee_wei: base_fee.map(|b| fast.saturating_sub(b).max(MIN_GAS_WEI)),
            fetched_at: Instant::now(),
        })
    }
}

// ============================================
// CACHING ORACLE
// ============================================

pub struct GasOracle {
    feed: Arc<dyn GasFeed>,
    chain_id: u64,
    refresh_interval: Duration,
    cache: RwLock<Option<GasQuote>>,
}

impl GasOracle {
    pub fn new(feed: Arc<dyn GasFeed>, chain_id: u64, refresh_interval: Duration) -> Self {
        Self {
            feed,
            chain_id,
            refresh_interval,
            cache: RwLock::new(None),
        }
    }

    /// Current quote, fetching only when the cached one has aged out.
    /// Never fails: a dead feed degrades to the fallback price.
    pub async fn current(&self) -> GasQuote {
        {
            let cache = self.cache.read().await;
            if let Some(quote) = cache.as_ref() {
                if !quote.is_stale(self.refresh_interval) {
                    trace!(standard_wei = quote.standard_wei, "gas quote cache hit");
                    return quote.clone();
                }
            }
        }

        let quote = match self.feed.fetch(self.chain_id).await {
            Ok(quote) => {
                debug!(
                    standard_wei = quote.standard_wei,
                    eip1559 = quote.supports_eip1559(),
                    "gas quote refreshed"
                );
                quote
            }
            Err(e) => {
                warn!(%e, "gas feed unavailable, using fallback price");
                GasQuote::fallback()
            }
        };

        let mut cache = self.cache.write().await;
        *cache = Some(quote.clone());
        quote
    }

    /// Force-refresh regardless of age. The validator calls this when it
    /// finds the cached quote stale mid-validation.
    pub async fn refresh(&self) -> Result<GasQuote, PipelineError> {
        let quote = self.feed.fetch(self.chain_id).await?;
        let mut cache = self.cache.write().await;
        *cache = Some(quote.clone());
        Ok(quote)
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }
}
