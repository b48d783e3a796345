use crate::config::{MAX_HISTORY, TREND_THRESHOLD};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Wall-clock time in unix milliseconds.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Chain {
    Ethereum,
    Polygon,
    Arbitrum,
}

/// Number of supported chains.
pub const CHAIN_COUNT: usize = 3;

impl Chain {
    pub const ALL: [Chain; CHAIN_COUNT] = [Chain::Ethereum, Chain::Polygon, Chain::Arbitrum];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Chain::Ethereum => "ethereum",
            Chain::Polygon => "polygon",
            Chain::Arbitrum => "arbitrum",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Chain::Ethereum => "Ethereum",
            Chain::Polygon => "Polygon",
            Chain::Arbitrum => "Arbitrum",
        }
    }

    /// Native token symbol.
    pub fn symbol(self) -> &'static str {
        match self {
            Chain::Ethereum | Chain::Arbitrum => "ETH",
            Chain::Polygon => "MATIC",
        }
    }

    /// Alchemy gateway host for mainnet.
    pub fn gateway_host(self) -> &'static str {
        match self {
            Chain::Ethereum => "eth-mainnet.g.alchemy.com",
            Chain::Polygon => "polygon-mainnet.g.alchemy.com",
            Chain::Arbitrum => "arb-mainnet.g.alchemy.com",
        }
    }

    /// Nominal block time. eth_feeHistory carries no timestamps, so backfilled
    /// samples are spaced by this interval.
    pub fn block_interval(self) -> Duration {
        match self {
            Chain::Ethereum => Duration::from_millis(12_000),
            Chain::Polygon => Duration::from_millis(2_000),
            Chain::Arbitrum => Duration::from_millis(250),
        }
    }

    /// Total fee (Gwei) above which the chain is considered busy.
    pub fn speed_threshold_gwei(self) -> f64 {
        match self {
            Chain::Ethereum => 20.0,
            Chain::Polygon => 50.0,
            Chain::Arbitrum => 1.0,
        }
    }

    pub fn speed(self, total_fee_gwei: f64) -> Speed {
        let threshold = self.speed_threshold_gwei();
        if total_fee_gwei > threshold * 2.0 {
            Speed::Fast
        } else if total_fee_gwei > threshold {
            Speed::Standard
        } else {
            Speed::Slow
        }
    }

    pub fn next(self) -> Chain {
        Chain::ALL[(self.index() + 1) % CHAIN_COUNT]
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Chain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Chain::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unsupported chain: {s}"))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Mode {
    #[default]
    Live,
    Simulation,
}

impl Mode {
    pub fn toggled(self) -> Mode {
        match self {
            Mode::Live => Mode::Simulation,
            Mode::Simulation => Mode::Live,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Up,
    Down,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speed {
    Slow,
    Standard,
    Fast,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

/// One normalized fee observation, fees in Gwei.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeeSample {
    pub captured_at_ms: u64,
    pub base_fee: f64,
    pub priority_fee: f64,
    pub total_fee: f64,
}

impl FeeSample {
    pub fn new(captured_at_ms: u64, base_fee: f64, priority_fee: f64) -> Self {
        Self {
            captured_at_ms,
            base_fee,
            priority_fee,
            total_fee: base_fee + priority_fee,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryPoint {
    pub time_ms: u64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl HistoryPoint {
    /// A single-sample candle: all four prices equal the total fee.
    pub fn flat(sample: &FeeSample) -> Self {
        Self {
            time_ms: sample.captured_at_ms,
            open: sample.total_fee,
            high: sample.total_fee,
            low: sample.total_fee,
            close: sample.total_fee,
        }
    }
}

/// History point with time in seconds, as consumed by charts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartPoint {
    pub time: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl From<&HistoryPoint> for ChartPoint {
    fn from(p: &HistoryPoint) -> Self {
        Self {
            time: p.time_ms as f64 / 1000.0,
            open: p.open,
            high: p.high,
            low: p.low,
            close: p.close,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChainState {
    pub base_fee: f64,
    pub priority_fee: f64,
    pub captured_at_ms: u64,
    pub history: VecDeque<HistoryPoint>,
    /// Unix ms of the last successful fetch; `None` until one succeeds.
    pub last_updated: Option<u64>,
}

impl ChainState {
    pub fn total_fee(&self) -> f64 {
        self.base_fee + self.priority_fee
    }

    fn set_snapshot(&mut self, sample: &FeeSample) {
        self.base_fee = sample.base_fee;
        self.priority_fee = sample.priority_fee;
        self.captured_at_ms = sample.captured_at_ms;
    }

    fn touch(&mut self, at_ms: u64) {
        self.last_updated = Some(self.last_updated.map_or(at_ms, |cur| cur.max(at_ms)));
    }

    /// Apply a live poll: overwrite the snapshot and append to history.
    pub fn record(&mut self, sample: &FeeSample, at_ms: u64) {
        self.set_snapshot(sample);
        self.touch(at_ms);
        self.history.push_back(HistoryPoint::flat(sample));
        while self.history.len() > MAX_HISTORY {
            self.history.pop_front();
        }
    }

    /// Replace history with a backfilled series (oldest first). The newest
    /// sample becomes the snapshot. Empty input is a no-op.
    pub fn replace_history(&mut self, samples: &[FeeSample], at_ms: u64) {
        let Some(latest) = samples.last() else {
            return;
        };
        let skip = samples.len().saturating_sub(MAX_HISTORY);
        self.history = samples[skip..].iter().map(HistoryPoint::flat).collect();
        self.set_snapshot(latest);
        self.touch(at_ms);
    }

    /// True once fetched at least once and then not refreshed for `stale_after`.
    pub fn is_stale(&self, now_ms: u64, stale_after: Duration) -> bool {
        self.last_updated
            .is_some_and(|ts| now_ms.saturating_sub(ts) > stale_after.as_millis() as u64)
    }

    pub fn trend(&self) -> Trend {
        let n = self.history.len();
        if n < 2 {
            return Trend::Neutral;
        }
        let current = self.history[n - 1].close;
        let previous = self.history[n - 2].close;
        if current > previous * (1.0 + TREND_THRESHOLD) {
            Trend::Up
        } else if current < previous * (1.0 - TREND_THRESHOLD) {
            Trend::Down
        } else {
            Trend::Neutral
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreState {
    chains: [ChainState; CHAIN_COUNT],
    pub mode: Mode,
    pub usd_price: f64,
    pub connected: bool,
}

impl StoreState {
    pub fn new(mode: Mode, usd_price: f64) -> Self {
        Self {
            chains: Default::default(),
            mode,
            usd_price,
            connected: false,
        }
    }

    pub fn chain(&self, chain: Chain) -> &ChainState {
        &self.chains[chain.index()]
    }

    pub fn chain_mut(&mut self, chain: Chain) -> &mut ChainState {
        &mut self.chains[chain.index()]
    }

    pub fn chains(&self) -> impl Iterator<Item = (Chain, &ChainState)> {
        Chain::ALL.into_iter().zip(self.chains.iter())
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        if self.connected {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Disconnected
        }
    }

    pub fn chart_points(&self, chain: Chain) -> Vec<ChartPoint> {
        self.chain(chain).history.iter().map(ChartPoint::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(t: u64, fee: f64) -> FeeSample {
        FeeSample::new(t, fee, 0.0)
    }

    #[test]
    fn test_chain_roundtrip() {
        for chain in Chain::ALL {
            assert_eq!(chain.as_str().parse::<Chain>().unwrap(), chain);
        }
        assert_eq!("Polygon".parse::<Chain>().unwrap(), Chain::Polygon);
        assert!("solana".parse::<Chain>().is_err());
        assert_eq!(Chain::Arbitrum.next(), Chain::Ethereum);
    }

    #[test]
    fn test_record_caps_history_fifo() {
        let mut state = ChainState::default();
        for i in 0..(MAX_HISTORY as u64 + 5) {
            state.record(&sample(i, i as f64), i);
        }
        assert_eq!(state.history.len(), MAX_HISTORY);
        assert_eq!(state.history.front().unwrap().time_ms, 5);
        assert_eq!(state.history.back().unwrap().time_ms, MAX_HISTORY as u64 + 4);

        state.record(&sample(1_000, 1.0), 1_000);
        assert_eq!(state.history.len(), MAX_HISTORY);
        assert_eq!(state.history.front().unwrap().time_ms, 6);
    }

    #[test]
    fn test_last_updated_never_moves_back() {
        let mut state = ChainState::default();
        assert_eq!(state.last_updated, None);
        state.record(&sample(10, 1.0), 500);
        state.record(&sample(11, 1.0), 400);
        assert_eq!(state.last_updated, Some(500));
    }

    #[test]
    fn test_replace_history_keeps_newest() {
        let mut state = ChainState::default();
        let samples: Vec<_> = (0..120).map(|i| sample(i, i as f64)).collect();
        state.replace_history(&samples, 42);
        assert_eq!(state.history.len(), MAX_HISTORY);
        assert_eq!(state.history.front().unwrap().time_ms, 20);
        assert_eq!(state.base_fee, 119.0);
        assert_eq!(state.last_updated, Some(42));

        let before = state.clone();
        state.replace_history(&[], 99);
        assert_eq!(state, before);
    }

    #[test]
    fn test_staleness() {
        let mut state = ChainState::default();
        let after = Duration::from_secs(45);
        assert!(!state.is_stale(1_000_000, after));
        state.record(&sample(1, 1.0), 10_000);
        assert!(!state.is_stale(55_000, after));
        assert!(state.is_stale(55_001, after));
    }

    #[test]
    fn test_trend() {
        let mut state = ChainState::default();
        assert_eq!(state.trend(), Trend::Neutral);
        state.record(&sample(1, 10.0), 1);
        state.record(&sample(2, 10.1), 2);
        assert_eq!(state.trend(), Trend::Neutral);
        state.record(&sample(3, 11.0), 3);
        assert_eq!(state.trend(), Trend::Up);
        state.record(&sample(4, 9.0), 4);
        assert_eq!(state.trend(), Trend::Down);
    }

    #[test]
    fn test_speed_thresholds() {
        assert_eq!(Chain::Ethereum.speed(15.0), Speed::Slow);
        assert_eq!(Chain::Ethereum.speed(30.0), Speed::Standard);
        assert_eq!(Chain::Ethereum.speed(41.0), Speed::Fast);
        assert_eq!(Chain::Arbitrum.speed(1.5), Speed::Standard);
        assert_eq!(Chain::Polygon.speed(50.0), Speed::Slow);
    }

    #[test]
    fn test_chart_points_in_seconds() {
        let mut state = StoreState::new(Mode::Live, 3500.0);
        state
            .chain_mut(Chain::Polygon)
            .record(&FeeSample::new(1_500, 2.0, 0.5), 1_500);
        let points = state.chart_points(Chain::Polygon);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].time, 1.5);
        assert_eq!(points[0].close, 2.5);
        assert!(state.chart_points(Chain::Ethereum).is_empty());
    }
}
