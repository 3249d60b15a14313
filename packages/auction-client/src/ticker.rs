//! Countdown ticker: local clock between ledger reads.

use auction_types::{derive_view, AuctionStatus, AuctionView, RawAuctionSnapshot};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Local time counted since auction info was last read successfully.
#[derive(Debug, Clone)]
pub struct Countdown {
    anchor: Option<u64>,
    tick: Duration,
    elapsed: Duration,
}

impl Countdown {
    pub fn new(tick: Duration) -> Self {
        Self {
            anchor: None,
            tick,
            elapsed: Duration::ZERO,
        }
    }

    /// Restart the count if `sequence` is a snapshot not seen before and it
    /// carries a fresh time-remaining read. A stale read keeps counting.
    pub fn observe(&mut self, sequence: u64, fresh: bool) -> bool {
        if self.anchor == Some(sequence) {
            return false;
        }
        self.anchor = Some(sequence);
        if fresh {
            self.elapsed = Duration::ZERO;
        }
        fresh
    }

    pub fn tick(&mut self) {
        self.elapsed = self.elapsed.saturating_add(self.tick);
    }

    /// Whole seconds elapsed since the anchored snapshot.
    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed.as_secs()
    }
}

/// Republish the derived view on every snapshot change and every tick until
/// `cancel` fires or the snapshot channel closes.
pub async fn run_countdown(
    mut snapshots: watch::Receiver<Arc<RawAuctionSnapshot>>,
    views: watch::Sender<Arc<AuctionView>>,
    tick: Duration,
    cancel: CancellationToken,
) {
    let mut countdown = Countdown::new(tick);
    let mut ticker = interval_at(Instant::now() + tick, tick);

    loop {
        let snapshot = snapshots.borrow_and_update().clone();
        if countdown.observe(snapshot.sequence, snapshot.auction_info.is_resolved()) {
            ticker.reset();
        }
        publish(&views, derive_view(&snapshot, countdown.elapsed_secs()));

        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = snapshots.changed() => {
                if changed.is_err() {
                    debug!("Snapshot channel closed");
                    break;
                }
            }
            _ = ticker.tick() => countdown.tick(),
        }
    }

    info!("Countdown ticker stopped");
}

/// Swap in `view` if it differs from the current one, logging status changes
/// and newly seen faults.
fn publish(views: &watch::Sender<Arc<AuctionView>>, view: AuctionView) {
    let (previous_status, previous_faults) = {
        let current = views.borrow();
        if **current == view {
            return;
        }
        (current.status, current.faults.clone())
    };

    if view.status != previous_status && view.status != AuctionStatus::Loading {
        info!(
            sequence = view.sequence,
            from = %previous_status,
            to = %view.status,
            "Auction status changed"
        );
    }
    for fault in view.faults.iter().filter(|f| !previous_faults.contains(f)) {
        warn!(sequence = view.sequence, %fault, "Ledger data inconsistent");
    }
    debug!(
        sequence = view.sequence,
        time_remaining = %view.time_remaining_display(),
        "View updated"
    );

    views.send_replace(Arc::new(view));
}
