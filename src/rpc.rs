//! eth_feeHistory client for the Alchemy gateways.
use async_trait::async_trait;
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::config::{FEE_HISTORY_PERCENTILES, PRIORITY_PERCENTILE_INDEX, WEI_PER_GWEI};
use crate::data::{CHAIN_COUNT, Chain, FeeSample, unix_millis};
use crate::error::GasError;

/// Source of per-chain fee data.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FeeSource: Send + Sync {
    /// Fee of the latest block. No retries; the polling loop owns that.
    async fn fetch_current_fee(&self, chain: Chain) -> Result<FeeSample, GasError>;

    /// Best-effort history, oldest first. Failures yield an empty vector.
    async fn fetch_fee_history(&self, chain: Chain, block_count: u64) -> Vec<FeeSample>;
}

/// Per-chain JSON-RPC endpoints.
#[derive(Debug, Clone)]
pub struct ChainEndpoints {
    urls: [Url; CHAIN_COUNT],
}

impl ChainEndpoints {
    /// Mainnet gateway URLs for the given API key.
    pub fn alchemy(api_key: &str) -> Result<Self, url::ParseError> {
        let url = |chain: Chain| Url::parse(&format!("https://{}/v2/{}", chain.gateway_host(), api_key));
        Ok(Self {
            urls: [
                url(Chain::Ethereum)?,
                url(Chain::Polygon)?,
                url(Chain::Arbitrum)?,
            ],
        })
    }

    pub fn with_override(mut self, chain: Chain, url: Url) -> Self {
        self.urls[chain.index()] = url;
        self
    }

    pub fn get(&self, chain: Chain) -> &Url {
        &self.urls[chain.index()]
    }
}

#[derive(Debug, Serialize)]
struct RpcRequest {
    jsonrpc: &'static str,
    method: &'static str,
    params: (u64, &'static str, [u8; 3]),
    id: u64,
}

impl RpcRequest {
    fn fee_history(block_count: u64) -> Self {
        Self {
            jsonrpc: "2.0",
            method: "eth_feeHistory",
            params: (block_count, "latest", FEE_HISTORY_PERCENTILES),
            id: 1,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    message: String,
}

/// `result` of eth_feeHistory; quantities stay hex until converted.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeHistory {
    pub base_fee_per_gas: Vec<String>,
    #[serde(default)]
    pub reward: Option<Vec<Vec<String>>>,
}

impl FeeHistory {
    fn priority_fee(&self, block: usize) -> Option<&str> {
        self.reward
            .as_ref()?
            .get(block)?
            .get(PRIORITY_PERCENTILE_INDEX)
            .map(String::as_str)
    }

    /// Latest-block sample from a one-block window.
    pub fn current_sample(&self, captured_at_ms: u64) -> Result<FeeSample, GasError> {
        let base = self
            .base_fee_per_gas
            .first()
            .ok_or_else(|| GasError::Parse("empty baseFeePerGas".to_string()))?;
        let priority = self
            .priority_fee(0)
            .ok_or_else(|| GasError::Parse("missing median reward".to_string()))?;
        Ok(FeeSample::new(
            captured_at_ms,
            hex_to_gwei(base)?,
            hex_to_gwei(priority)?,
        ))
    }

    /// Backfill samples. The final base fee entry has no reward row and is
    /// skipped; timestamps walk back from `now_ms` by the chain block time.
    pub fn history_samples(
        &self,
        chain: Chain,
        block_count: u64,
        now_ms: u64,
    ) -> Result<Vec<FeeSample>, GasError> {
        let step = chain.block_interval().as_millis() as u64;
        let paired = self.base_fee_per_gas.len().saturating_sub(1);
        let mut out = Vec::with_capacity(paired);
        for (i, base) in self.base_fee_per_gas.iter().take(paired).enumerate() {
            let priority = match self.priority_fee(i) {
                Some(raw) => hex_to_gwei(raw)?,
                None => 0.0,
            };
            let blocks_back = block_count.saturating_sub(i as u64);
            let captured_at_ms = now_ms.saturating_sub(blocks_back.saturating_mul(step));
            out.push(FeeSample::new(captured_at_ms, hex_to_gwei(base)?, priority));
        }
        Ok(out)
    }
}

/// Convert a `0x`-prefixed wei quantity to Gwei.
pub fn hex_to_gwei(raw: &str) -> Result<f64, GasError> {
    let digits = raw
        .strip_prefix("0x")
        .ok_or_else(|| GasError::Parse(format!("quantity without 0x prefix: {raw}")))?;
    let wei = U256::from_str_radix(digits, 16)
        .map_err(|e| GasError::Parse(format!("invalid quantity {raw}: {e}")))?;
    let wei: u128 = wei
        .try_into()
        .map_err(|_| GasError::Parse(format!("quantity out of range: {raw}")))?;
    Ok(wei as f64 / WEI_PER_GWEI)
}

pub struct AlchemyClient {
    endpoints: ChainEndpoints,
    http: reqwest::Client,
}

impl AlchemyClient {
    pub fn new(endpoints: ChainEndpoints, timeout: Duration) -> Result<Self, GasError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { endpoints, http })
    }

    async fn fee_history(&self, chain: Chain, block_count: u64) -> Result<FeeHistory, GasError> {
        // Endpoint URLs embed the API key; strip it from transport errors.
        let resp = self
            .http
            .post(self.endpoints.get(chain).clone())
            .json(&RpcRequest::fee_history(block_count))
            .send()
            .await
            .map_err(|e| GasError::Network(e.without_url()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| GasError::Network(e.without_url()))?;
        let parsed: RpcResponse<FeeHistory> = match serde_json::from_str(&body) {
            Ok(v) => v,
            Err(_) if !status.is_success() => {
                return Err(GasError::Upstream(format!("HTTP {status}")));
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(err) = parsed.error {
            return Err(GasError::Upstream(err.message));
        }
        parsed
            .result
            .ok_or_else(|| GasError::Parse("response has neither result nor error".to_string()))
    }
}

#[async_trait]
impl FeeSource for AlchemyClient {
    async fn fetch_current_fee(&self, chain: Chain) -> Result<FeeSample, GasError> {
        let history = self.fee_history(chain, 1).await?;
        let sample = history.current_sample(unix_millis())?;
        tracing::debug!(%chain, base = sample.base_fee, priority = sample.priority_fee, "current fee");
        Ok(sample)
    }

    async fn fetch_fee_history(&self, chain: Chain, block_count: u64) -> Vec<FeeSample> {
        let result = self
            .fee_history(chain, block_count)
            .await
            .and_then(|h| h.history_samples(chain, block_count, unix_millis()));
        match result {
            Ok(samples) => samples,
            Err(e) => {
                tracing::warn!(%chain, "fee history unavailable: {}", e);
                Vec::new()
            }
        }
    }
}
