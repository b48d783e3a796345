//! Reference fiat price from a CoinGecko-style `simple/price` index.
use async_trait::async_trait;
use std::time::Duration;
use url::Url;

use crate::error::GasError;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_reference_price(&self) -> Result<f64, GasError>;
}

pub struct CoinGeckoClient {
    base_url: Url,
    asset: String,
    http: reqwest::Client,
}

impl CoinGeckoClient {
    pub fn new(base_url: Url, asset: impl Into<String>, timeout: Duration) -> Result<Self, GasError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url,
            asset: asset.into(),
            http,
        })
    }

    fn request_url(&self) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("ids", &self.asset)
            .append_pair("vs_currencies", "usd");
        url
    }
}

/// Extract `<asset>.usd` from a simple/price response.
pub fn parse_usd_price(body: &serde_json::Value, asset: &str) -> Result<f64, GasError> {
    match body.get(asset).and_then(|a| a.get("usd")).and_then(|p| p.as_f64()) {
        Some(price) if price.is_finite() && price > 0.0 => Ok(price),
        Some(price) => Err(GasError::Parse(format!("unusable {asset} price: {price}"))),
        None => Err(GasError::Parse(format!("no usd price for {asset}"))),
    }
}

#[async_trait]
impl PriceSource for CoinGeckoClient {
    async fn fetch_reference_price(&self) -> Result<f64, GasError> {
        let resp = self.http.get(self.request_url()).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(GasError::Upstream(format!("HTTP {status}")));
        }
        let body = resp.text().await?;
        let json: serde_json::Value = serde_json::from_str(&body)?;
        parse_usd_price(&json, &self.asset)
    }
}
