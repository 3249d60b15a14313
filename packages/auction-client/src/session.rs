//! Auction session: owns the polling and countdown tasks.

use crate::aggregator::ReadAggregator;
use crate::config::Config;
use crate::ledger::AuctionLedger;
use crate::submitter::{PurchaseReceipt, PurchaseStatus, PurchaseSubmitter};
use crate::ticker::run_countdown;
use alloy::primitives::Address;
use auction_types::{derive_view, validate, AuctionView, PurchaseQuote, RawAuctionSnapshot, Rejection};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Timing knobs for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub poll_interval: Duration,
    pub tick_interval: Duration,
    pub read_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            tick_interval: config.tick_interval(),
            read_timeout: config.read_timeout(),
        }
    }
}

/// A running view of one auction.
///
/// Background tasks are stopped by [`AuctionSession::shutdown`], or aborted
/// when the session is dropped.
pub struct AuctionSession<L> {
    aggregator: Arc<ReadAggregator<L>>,
    submitter: PurchaseSubmitter<L>,
    views: watch::Receiver<Arc<AuctionView>>,
    cancel: CancellationToken,
    tasks: JoinSet<()>,
}

impl<L: AuctionLedger> AuctionSession<L> {
    /// Start polling `ledger`. Must be called inside a Tokio runtime.
    pub fn start(ledger: Arc<L>, settings: SessionSettings) -> Self {
        let aggregator = Arc::new(ReadAggregator::new(
            Arc::clone(&ledger),
            settings.poll_interval,
            settings.read_timeout,
        ));
        let submitter = PurchaseSubmitter::new(ledger, Arc::clone(&aggregator));
        let (view_tx, views) =
            watch::channel(Arc::new(derive_view(&aggregator.snapshot(), 0)));
        let cancel = CancellationToken::new();

        let mut tasks = JoinSet::new();
        {
            let aggregator = Arc::clone(&aggregator);
            let cancel = cancel.clone();
            tasks.spawn(async move { aggregator.run(cancel).await });
        }
        tasks.spawn(run_countdown(
            aggregator.subscribe(),
            view_tx,
            settings.tick_interval,
            cancel.clone(),
        ));

        info!(
            poll_ms = settings.poll_interval.as_millis() as u64,
            tick_ms = settings.tick_interval.as_millis() as u64,
            read_timeout_ms = settings.read_timeout.as_millis() as u64,
            "Auction session started"
        );

        Self {
            aggregator,
            submitter,
            views,
            cancel,
            tasks,
        }
    }

    /// Latest derived view.
    pub fn view(&self) -> Arc<AuctionView> {
        self.views.borrow().clone()
    }

    /// Views as they are republished (snapshot changes and ticks).
    pub fn subscribe(&self) -> watch::Receiver<Arc<AuctionView>> {
        self.views.clone()
    }

    pub fn snapshots(&self) -> watch::Receiver<Arc<RawAuctionSnapshot>> {
        self.aggregator.subscribe()
    }

    pub fn aggregator(&self) -> &Arc<ReadAggregator<L>> {
        &self.aggregator
    }

    pub fn connect_wallet(&self, address: Address) {
        self.aggregator.connect_wallet(address);
    }

    pub fn disconnect_wallet(&self) {
        self.aggregator.disconnect_wallet();
    }

    /// Check `candidate` against the current view without sending anything.
    pub fn quote(&self, candidate: &str) -> Result<PurchaseQuote, Rejection> {
        validate(candidate, &self.view())
    }

    /// Validate and buy. See [`PurchaseSubmitter::submit`].
    pub async fn purchase(
        &self,
        candidate: &str,
        overpay: &str,
    ) -> Result<PurchaseReceipt, crate::Error> {
        self.submitter.submit(candidate, overpay).await
    }

    pub fn purchase_status(&self) -> watch::Receiver<PurchaseStatus> {
        self.submitter.status()
    }

    /// Cancel background tasks and wait for them to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Session task ended abnormally");
            }
        }
        info!("Auction session stopped");
    }
}
