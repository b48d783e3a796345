//! Configuration parameters for the gas tracker
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::data::Mode;

/// Number of history points kept per chain
pub const MAX_HISTORY: usize = 100;

/// Blocks requested per chain when backfilling history at startup
pub const BACKFILL_BLOCKS: u64 = 50;

/// How often every chain's current fee is polled
pub const FEE_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// How often the reference price is refreshed
pub const PRICE_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Shortest period either polling loop will run at
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// A chain with no successful fetch for this long is shown as stale
pub const STALE_AFTER: Duration = Duration::from_secs(45);

/// Reference fiat price used until the first successful price fetch
pub const DEFAULT_USD_PRICE: f64 = 3500.0;

// ========================= GAS CONFIG =========================
/// Percentiles (0..=100) for eth_feeHistory rewards (tips)
pub const FEE_HISTORY_PERCENTILES: [u8; 3] = [25, 50, 75];
/// Index into FEE_HISTORY_PERCENTILES used as the priority fee (median)
pub const PRIORITY_PERCENTILE_INDEX: usize = 1;
/// Wei per Gwei
pub const WEI_PER_GWEI: f64 = 1_000_000_000.0;
/// Gas used by a plain value transfer
pub const TRANSFER_GAS_LIMIT: u64 = 21_000;
/// Relative change between the last two samples that counts as a trend
pub const TREND_THRESHOLD: f64 = 0.02;

// ========================= PRICE CONFIG =========================
pub const DEFAULT_PRICE_URL: &str = "https://api.coingecko.com/api/v3/simple/price";
pub const DEFAULT_PRICE_ASSET: &str = "ethereum";

/// Timing knobs for the store's polling loops.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollSettings {
    pub fee_interval: Duration,
    pub price_interval: Duration,
    pub backfill_blocks: u64,
    pub initial_usd_price: f64,
}

impl PollSettings {
    /// Raise both polling periods to at least `MIN_POLL_INTERVAL`.
    pub fn normalized(self) -> Self {
        Self {
            fee_interval: self.fee_interval.max(MIN_POLL_INTERVAL),
            price_interval: self.price_interval.max(MIN_POLL_INTERVAL),
            ..self
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            fee_interval: FEE_POLL_INTERVAL,
            price_interval: PRICE_POLL_INTERVAL,
            backfill_blocks: BACKFILL_BLOCKS,
            initial_usd_price: DEFAULT_USD_PRICE,
        }
    }
}

/// Command line / environment configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "gas-tracker", about = "Live EIP-1559 fee dashboard for Ethereum, Polygon and Arbitrum")]
pub struct Cli {
    /// Alchemy API key used to build the per-chain gateway URLs
    #[arg(long, env = "ALCHEMY_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Override the Ethereum JSON-RPC endpoint
    #[arg(long, env = "ETHEREUM_RPC_URL")]
    pub ethereum_url: Option<Url>,

    /// Override the Polygon JSON-RPC endpoint
    #[arg(long, env = "POLYGON_RPC_URL")]
    pub polygon_url: Option<Url>,

    /// Override the Arbitrum JSON-RPC endpoint
    #[arg(long, env = "ARBITRUM_RPC_URL")]
    pub arbitrum_url: Option<Url>,

    /// Price index endpoint (CoinGecko simple/price compatible)
    #[arg(long, env = "PRICE_API_URL", default_value = DEFAULT_PRICE_URL)]
    pub price_url: Url,

    /// Asset id looked up in the price index
    #[arg(long, env = "PRICE_ASSET", default_value = DEFAULT_PRICE_ASSET)]
    pub price_asset: String,

    #[arg(long, env = "FEE_INTERVAL_SECS", default_value_t = FEE_POLL_INTERVAL.as_secs())]
    pub fee_interval_secs: u64,

    #[arg(long, env = "PRICE_INTERVAL_SECS", default_value_t = PRICE_POLL_INTERVAL.as_secs())]
    pub price_interval_secs: u64,

    /// Blocks of fee history loaded per chain at startup
    #[arg(long, env = "BACKFILL_BLOCKS", default_value_t = BACKFILL_BLOCKS)]
    pub backfill_blocks: u64,

    #[arg(long, default_value_t = DEFAULT_USD_PRICE)]
    pub initial_usd_price: f64,

    /// Per-request HTTP timeout
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value_t = 10)]
    pub http_timeout_secs: u64,

    #[arg(long, value_enum, default_value_t = Mode::Live)]
    pub mode: Mode,

    /// Where tracing output goes; the terminal is owned by the dashboard
    #[arg(long, env = "GAS_TRACKER_LOG", default_value = "gas-tracker.log")]
    pub log_file: PathBuf,
}

impl Cli {
    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            fee_interval: Duration::from_secs(self.fee_interval_secs),
            price_interval: Duration::from_secs(self.price_interval_secs),
            backfill_blocks: self.backfill_blocks,
            initial_usd_price: self.initial_usd_price,
        }
        .normalized()
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["gas-tracker", "--api-key", "k"]).unwrap();
        assert_eq!(cli.api_key, "k");
        assert_eq!(cli.poll_settings(), PollSettings::default());
        assert_eq!(cli.mode, Mode::Live);
        assert_eq!(cli.price_asset, "ethereum");
        assert!(cli.ethereum_url.is_none());
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::try_parse_from([
            "gas-tracker",
            "--api-key",
            "k",
            "--polygon-url",
            "http://localhost:8545",
            "--fee-interval-secs",
            "0",
            "--mode",
            "simulation",
        ])
        .unwrap();
        assert_eq!(cli.polygon_url.as_ref().unwrap().as_str(), "http://localhost:8545/");
        assert_eq!(cli.poll_settings().fee_interval, Duration::from_secs(1));
        assert_eq!(cli.mode, Mode::Simulation);
    }

    #[test]
    fn test_normalized_raises_zero_periods() {
        let settings = PollSettings {
            fee_interval: Duration::ZERO,
            price_interval: Duration::from_millis(10),
            ..PollSettings::default()
        }
        .normalized();
        assert_eq!(settings.fee_interval, MIN_POLL_INTERVAL);
        assert_eq!(settings.price_interval, MIN_POLL_INTERVAL);
        assert_eq!(settings.backfill_blocks, BACKFILL_BLOCKS);
        assert_eq!(PollSettings::default().normalized(), PollSettings::default());
    }
}
