//! Ledger read aggregator.
//!
//! Fans out the auction reads on a fixed cadence and publishes the result as
//! one [`RawAuctionSnapshot`], replaced wholesale through a `watch` channel.
//! Static parameters are read until they resolve and then kept for the
//! session. The per-address read follows the connected wallet; a result read
//! for an account that has since changed is dropped.

use crate::ledger::AuctionLedger;
use crate::metrics::METRICS;
use alloy::primitives::Address;
use auction_types::{
    AuctionInfo, BaseUnits, PurchaseInfo, RawAuctionSnapshot, Read, StaticParam,
};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{watch, Notify};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Result of one call to [`ReadAggregator::refresh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A new snapshot was published.
    Completed { sequence: u64 },
    /// Another refresh was already running; nothing was read.
    Skipped,
}

/// Outcomes of one fan-out, settled onto the current snapshot together.
struct CycleReads {
    info: Result<AuctionInfo, String>,
    price: Result<BaseUnits, String>,
    paused: Result<bool, String>,
    purchase: Option<Result<PurchaseInfo, String>>,
    statics: Vec<(StaticParam, Result<BaseUnits, String>)>,
}

/// RAII guard: clears the running flag on drop, even if the refresh is
/// cancelled mid-flight.
struct RefreshGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RefreshGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct ReadAggregator<L> {
    ledger: Arc<L>,
    snapshot_tx: watch::Sender<Arc<RawAuctionSnapshot>>,
    /// Connected account. Held while publishing so a wallet change cannot
    /// interleave with a snapshot swap.
    account: Mutex<Option<Address>>,
    account_epoch: AtomicU64,
    refreshing: AtomicBool,
    refresh_requested: Notify,
    poll_interval: Duration,
    read_timeout: Duration,
}

impl<L: AuctionLedger> ReadAggregator<L> {
    pub fn new(ledger: Arc<L>, poll_interval: Duration, read_timeout: Duration) -> Self {
        let (snapshot_tx, _) = watch::channel(Arc::new(RawAuctionSnapshot::default()));
        Self {
            ledger,
            snapshot_tx,
            account: Mutex::new(None),
            account_epoch: AtomicU64::new(0),
            refreshing: AtomicBool::new(false),
            refresh_requested: Notify::new(),
            poll_interval,
            read_timeout,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<RawAuctionSnapshot>> {
        self.snapshot_tx.subscribe()
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Arc<RawAuctionSnapshot> {
        self.snapshot_tx.borrow().clone()
    }

    pub fn account(&self) -> Option<Address> {
        *self.lock_account()
    }

    // --- Wallet ---

    /// Track `address` from now on. Its purchase info starts out unknown and
    /// is read on the next cycle, which is requested right away.
    pub fn connect_wallet(&self, address: Address) {
        {
            let mut account = self.lock_account();
            if *account == Some(address) {
                return;
            }
            *account = Some(address);
            self.account_epoch.fetch_add(1, Ordering::AcqRel);
            self.snapshot_tx
                .send_modify(|s| Arc::make_mut(s).purchase_info = Read::Unset);
        }
        info!(account = %address, "Wallet connected");
        self.request_refresh();
    }

    /// Stop tracking the connected account and clear its purchase info. A
    /// per-address read still in flight is discarded when it lands.
    pub fn disconnect_wallet(&self) {
        let previous = {
            let mut account = self.lock_account();
            let previous = account.take();
            self.account_epoch.fetch_add(1, Ordering::AcqRel);
            self.snapshot_tx
                .send_modify(|s| Arc::make_mut(s).purchase_info = Read::Unset);
            previous
        };
        if let Some(previous) = previous {
            info!(account = %previous, "Wallet disconnected");
        }
    }

    // --- Refresh ---

    /// Ask the run loop for a refresh outside the cadence. Requests made while
    /// a refresh is running collapse into one follow-up refresh.
    pub fn request_refresh(&self) {
        self.refresh_requested.notify_one();
    }

    /// Run one composite refresh and publish the new snapshot.
    ///
    /// Returns [`RefreshOutcome::Skipped`] without reading anything when a
    /// refresh is already running.
    pub async fn refresh(&self) -> RefreshOutcome {
        let Some(_guard) = RefreshGuard::acquire(&self.refreshing) else {
            METRICS.refresh_skipped.fetch_add(1, Ordering::Relaxed);
            debug!("Refresh already running, skipped");
            return RefreshOutcome::Skipped;
        };
        let start = Instant::now();

        let (account, epoch) = {
            let account = self.lock_account();
            (*account, self.account_epoch.load(Ordering::Acquire))
        };
        let missing = self.snapshot().missing_static_params();
        self.mark_first_reads(&missing, account.is_some(), epoch);

        let limit = self.read_timeout;
        let ledger = &self.ledger;
        let (info, price, paused, purchase, statics) = tokio::join!(
            timed("getAuctionInfo", limit, ledger.auction_info()),
            timed("getCurrentPrice", limit, ledger.current_price()),
            timed("paused", limit, ledger.paused()),
            async {
                match account {
                    Some(buyer) => {
                        Some(timed("getPurchaseInfo", limit, ledger.purchase_info(buyer)).await)
                    }
                    None => None,
                }
            },
            self.read_statics(missing),
        );

        let sequence = self.publish(
            CycleReads {
                info,
                price,
                paused,
                purchase,
                statics,
            },
            epoch,
        );
        METRICS.record_refresh_duration(start);
        debug!(sequence, elapsed_ms = start.elapsed().as_millis() as u64, "Snapshot published");
        RefreshOutcome::Completed { sequence }
    }

    /// Refresh every poll interval, and whenever one is requested, until
    /// `cancel` fires. Ticks missed while a refresh runs are skipped.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(poll_ms = self.poll_interval.as_millis() as u64, "Read aggregator started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
                _ = self.refresh_requested.notified() => {
                    debug!("Out-of-cadence refresh requested");
                }
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                outcome = self.refresh() => {
                    if outcome == RefreshOutcome::Skipped {
                        debug!("Cadence tick overlapped a running refresh");
                    }
                }
            }
        }

        info!("Read aggregator stopped");
    }

    async fn read_statics(
        &self,
        params: Vec<StaticParam>,
    ) -> Vec<(StaticParam, Result<BaseUnits, String>)> {
        let mut set = JoinSet::new();
        for param in params {
            let ledger = Arc::clone(&self.ledger);
            let limit = self.read_timeout;
            set.spawn(async move {
                let outcome = timed(param.name(), limit, ledger.static_param(param)).await;
                (param, outcome)
            });
        }

        let mut results = Vec::with_capacity(set.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => warn!(error = %e, "Static read task failed"),
            }
        }
        results
    }

    /// Publish `Pending` for reads that have never been issued, so consumers
    /// can tell "loading" from "never asked". Values already known stay put.
    fn mark_first_reads(&self, statics: &[StaticParam], with_account: bool, epoch: u64) {
        let _account = self.lock_account();
        let same_account = self.account_epoch.load(Ordering::Acquire) == epoch;
        let needed = {
            let current = self.snapshot_tx.borrow();
            current.auction_info.is_unset()
                || current.current_price.is_unset()
                || current.paused.is_unset()
                || statics.iter().any(|p| current.static_param(*p).is_unset())
                || (with_account && same_account && current.purchase_info.is_unset())
        };
        if !needed {
            return;
        }

        self.snapshot_tx.send_modify(|current| {
            let next = Arc::make_mut(current);
            begin_if_unset(&mut next.auction_info);
            begin_if_unset(&mut next.current_price);
            begin_if_unset(&mut next.paused);
            for param in statics {
                begin_if_unset(next.static_param_mut(*param));
            }
            if with_account && same_account {
                begin_if_unset(&mut next.purchase_info);
            }
        });
    }

    /// Settle one cycle's reads onto the current snapshot and swap it in.
    fn publish(&self, reads: CycleReads, epoch: u64) -> u64 {
        let _account = self.lock_account();
        let same_account = self.account_epoch.load(Ordering::Acquire) == epoch;
        if !same_account && reads.purchase.is_some() {
            debug!("Account changed during refresh, dropping purchase info");
        }

        let mut sequence = 0;
        self.snapshot_tx.send_modify(|current| {
            let mut next = RawAuctionSnapshot::clone(current);
            next.sequence += 1;
            settle(&mut next.auction_info, reads.info);
            settle(&mut next.current_price, reads.price);
            settle(&mut next.paused, reads.paused);
            for (param, outcome) in reads.statics {
                settle(next.static_param_mut(param), outcome);
            }
            if let (true, Some(outcome)) = (same_account, reads.purchase) {
                settle(&mut next.purchase_info, outcome);
            }
            sequence = next.sequence;
            *current = Arc::new(next);
        });
        sequence
    }

    fn lock_account(&self) -> std::sync::MutexGuard<'_, Option<Address>> {
        self.account.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn begin_if_unset<T>(read: &mut Read<T>) {
    if read.is_unset() {
        *read = Read::Pending { last: None };
    }
}

fn settle<T>(read: &mut Read<T>, outcome: Result<T, String>) {
    *read = std::mem::take(read).settle(outcome);
}

/// Bound a read by `limit` and count it. Failures are logged and flattened to
/// their message; the snapshot keeps the last value.
async fn timed<T>(
    what: &'static str,
    limit: Duration,
    read: impl Future<Output = Result<T, crate::Error>>,
) -> Result<T, String> {
    let outcome = match tokio::time::timeout(limit, read).await {
        Ok(outcome) => outcome,
        Err(_) => {
            METRICS.read_timeouts.fetch_add(1, Ordering::Relaxed);
            Err(crate::Error::Timeout(format!(
                "{what} after {}ms",
                limit.as_millis()
            )))
        }
    };

    match outcome {
        Ok(value) => {
            METRICS.reads_ok.fetch_add(1, Ordering::Relaxed);
            Ok(value)
        }
        Err(e) => {
            METRICS.read_errors.fetch_add(1, Ordering::Relaxed);
            warn!(read = what, error = %e, "Ledger read failed, keeping last value");
            Err(e.to_string())
        }
    }
}
