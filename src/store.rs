//! Reactive fee store.
//!
//! `GasStore` owns the per-chain fee state, the reference price and the
//! connectivity flag. State lives in a `watch` channel: every write is a single
//! `send_modify`, so readers only ever see whole updates. `initialize` loads
//! history once and then drives two recurring tasks (fee polling and price
//! polling) until `shutdown` cancels them.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::PollSettings;
use crate::data::{CHAIN_COUNT, Chain, ChartPoint, Mode, StoreState, unix_millis};
use crate::error::StoreError;
use crate::price::PriceSource;
use crate::rpc::FeeSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Initializing,
    Running,
    Stopped,
}

pub struct GasStore {
    fees: Arc<dyn FeeSource>,
    prices: Arc<dyn PriceSource>,
    settings: PollSettings,
    state: watch::Sender<StoreState>,
    lifecycle: Mutex<Lifecycle>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl GasStore {
    pub fn new(
        fees: Arc<dyn FeeSource>,
        prices: Arc<dyn PriceSource>,
        settings: PollSettings,
    ) -> Self {
        let settings = settings.normalized();
        let (state, _) = watch::channel(StoreState::new(Mode::Live, settings.initial_usd_price));
        Self {
            fees,
            prices,
            settings,
            state,
            lifecycle: Mutex::new(Lifecycle::Uninitialized),
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<StoreState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> StoreState {
        self.state.borrow().clone()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *lock(&self.lifecycle)
    }

    pub fn set_mode(&self, mode: Mode) {
        self.state.send_modify(|s| s.mode = mode);
    }

    /// History of one chain with time in seconds.
    pub fn historical_data(&self, chain: Chain) -> Vec<ChartPoint> {
        self.state.borrow().chart_points(chain)
    }

    fn transition(&self, from: Lifecycle, to: Lifecycle) -> Result<(), StoreError> {
        let mut current = lock(&self.lifecycle);
        if *current != from {
            return Err(StoreError::AlreadyInitialized(*current));
        }
        *current = to;
        Ok(())
    }

    /// Load history, run the first fee and price cycles, then keep both
    /// polling in the background. Only the first call does anything.
    pub async fn initialize(self: &Arc<Self>) -> Result<(), StoreError> {
        self.transition(Lifecycle::Uninitialized, Lifecycle::Initializing)?;
        info!("initializing gas tracking");

        self.state.send_modify(|s| s.connected = false);
        let backfilled = self.backfill().await;
        if backfilled > 0 {
            self.state.send_modify(|s| s.connected = true);
        }
        info!("history loaded for {}/{} chains", backfilled, CHAIN_COUNT);

        self.poll_fees().await;
        self.spawn_recurring(self.settings.fee_interval, |store| async move {
            store.poll_fees().await;
        });

        self.poll_price().await;
        self.spawn_recurring(self.settings.price_interval, |store| async move {
            store.poll_price().await;
        });

        // A concurrent shutdown leaves the store Stopped.
        let _ = self.transition(Lifecycle::Initializing, Lifecycle::Running);
        info!("gas tracking running");
        Ok(())
    }

    /// Run `tick` every `period` until cancelled. The handle is registered
    /// right away so `shutdown` can join it even if `initialize` is dropped.
    fn spawn_recurring<F, Fut>(self: &Arc<Self>, period: Duration, tick: F)
    where
        F: Fn(Arc<GasStore>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let store = Arc::clone(self);
        let cancel = self.cancel.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tick(Arc::clone(&store)) => {}
                }
            }
        });
        lock(&self.tasks).push(handle);
    }

    /// Replace each chain's history with fetched fee history, one chain at a
    /// time. Returns how many chains produced data.
    pub async fn backfill(&self) -> usize {
        let mut loaded = 0;
        for chain in Chain::ALL {
            debug!(%chain, "loading fee history");
            let samples = self
                .fees
                .fetch_fee_history(chain, self.settings.backfill_blocks)
                .await;
            if samples.is_empty() {
                warn!(%chain, "no fee history loaded");
                continue;
            }
            let now = unix_millis();
            self.state
                .send_modify(|s| s.chain_mut(chain).replace_history(&samples, now));
            info!(%chain, points = samples.len(), "fee history loaded");
            loaded += 1;
        }
        loaded
    }

    /// One fee-polling cycle. A failing chain is logged and skipped; the
    /// others are still updated. Returns the number of chains updated.
    pub async fn poll_fees(&self) -> usize {
        let mut updated = 0;
        for chain in Chain::ALL {
            match self.fees.fetch_current_fee(chain).await {
                Ok(sample) => {
                    let now = unix_millis();
                    self.state
                        .send_modify(|s| s.chain_mut(chain).record(&sample, now));
                    updated += 1;
                }
                Err(e) => warn!(%chain, "fee poll failed: {}", e),
            }
        }

        let connected = updated > 0;
        let changed = self.state.send_if_modified(|s| {
            let changed = s.connected != connected;
            s.connected = connected;
            changed
        });
        if changed {
            info!(connected, "connectivity changed");
        }
        debug!("fee cycle updated {}/{} chains", updated, CHAIN_COUNT);
        updated
    }

    /// Refresh the reference price; on failure the previous price stays.
    pub async fn poll_price(&self) -> bool {
        match self.prices.fetch_reference_price().await {
            Ok(price) => {
                self.state.send_modify(|s| s.usd_price = price);
                debug!(price, "reference price updated");
                true
            }
            Err(e) => {
                warn!("reference price fetch failed: {}", e);
                false
            }
        }
    }

    /// Stop both recurring tasks and wait for them to exit.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        *lock(&self.lifecycle) = Lifecycle::Stopped;
        let tasks = std::mem::take(&mut *lock(&self.tasks));
        for task in tasks {
            if let Err(e) = task.await {
                warn!("polling task ended abnormally: {}", e);
            }
        }
    }
}
