//! Purchase submission.
//!
//! One purchase at a time: `Idle → Submitting → Idle`, with the last outcome
//! kept for display. A failed purchase is reported as-is and never retried.

use crate::aggregator::ReadAggregator;
use crate::ledger::AuctionLedger;
use crate::metrics::METRICS;
use alloy::primitives::TxHash;
use auction_types::{
    derive_view, parse_units, validate, BaseUnits, PurchaseQuote, Rejection, WholeTokens,
};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PurchaseState {
    Idle,
    Submitting {
        quantity: WholeTokens,
        value: BaseUnits,
    },
}

/// A confirmed purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurchaseReceipt {
    pub tx_hash: TxHash,
    pub quote: PurchaseQuote,
    pub overpay: BaseUnits,
    /// Value attached to the transaction: `quote.cost + overpay`.
    pub value: BaseUnits,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PurchaseOutcome {
    Confirmed(PurchaseReceipt),
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurchaseStatus {
    pub state: PurchaseState,
    pub last_outcome: Option<PurchaseOutcome>,
}

impl Default for PurchaseStatus {
    fn default() -> Self {
        Self {
            state: PurchaseState::Idle,
            last_outcome: None,
        }
    }
}

/// RAII guard for the single purchase slot. Dropping it (also when the
/// submitting future is cancelled) frees the slot and returns to `Idle`.
struct SubmitGuard<'a> {
    in_flight: &'a AtomicBool,
    status: &'a watch::Sender<PurchaseStatus>,
}

impl<'a> SubmitGuard<'a> {
    fn acquire(in_flight: &'a AtomicBool, status: &'a watch::Sender<PurchaseStatus>) -> Option<Self> {
        in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { in_flight, status })
    }
}

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        self.status.send_if_modified(|s| {
            let busy = s.state != PurchaseState::Idle;
            s.state = PurchaseState::Idle;
            busy
        });
        self.in_flight.store(false, Ordering::Release);
    }
}

pub struct PurchaseSubmitter<L> {
    ledger: Arc<L>,
    aggregator: Arc<ReadAggregator<L>>,
    in_flight: AtomicBool,
    status: watch::Sender<PurchaseStatus>,
}

impl<L: AuctionLedger> PurchaseSubmitter<L> {
    pub fn new(ledger: Arc<L>, aggregator: Arc<ReadAggregator<L>>) -> Self {
        let (status, _) = watch::channel(PurchaseStatus::default());
        Self {
            ledger,
            aggregator,
            in_flight: AtomicBool::new(false),
            status,
        }
    }

    pub fn status(&self) -> watch::Receiver<PurchaseStatus> {
        self.status.subscribe()
    }

    pub fn is_submitting(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Validate `candidate` against the latest snapshot and buy it, attaching
    /// `overpay` (decimal, empty for none) on top of the exact cost.
    ///
    /// Resolves once the ledger confirms or refuses the purchase. On
    /// confirmation an immediate re-read is requested.
    pub async fn submit(
        &self,
        candidate: &str,
        overpay: &str,
    ) -> Result<PurchaseReceipt, crate::Error> {
        let Some(_guard) = SubmitGuard::acquire(&self.in_flight, &self.status) else {
            return Err(crate::Error::PurchaseInFlight);
        };

        let view = derive_view(&self.aggregator.snapshot(), 0);
        let quote = validate(candidate, &view).inspect_err(|reason| {
            METRICS.rejections.fetch_add(1, Ordering::Relaxed);
            info!(candidate, %reason, "Purchase rejected");
        })?;
        let overpay = parse_overpay(overpay)?;
        let value = quote
            .total_with(overpay)
            .ok_or(crate::Error::Rejected(Rejection::CostOverflow))?;

        self.status.send_modify(|s| {
            s.state = PurchaseState::Submitting {
                quantity: quote.quantity,
                value,
            }
        });
        METRICS.purchases_submitted.fetch_add(1, Ordering::Relaxed);
        info!(
            quantity = %quote.quantity,
            unit_price = %quote.unit_price,
            overpay = %overpay,
            value = %value,
            "Submitting purchase"
        );

        match self.ledger.buy_tokens(quote.quantity, value).await {
            Ok(tx_hash) => {
                let receipt = PurchaseReceipt {
                    tx_hash,
                    quote,
                    overpay,
                    value,
                };
                METRICS.purchases_confirmed.fetch_add(1, Ordering::Relaxed);
                info!(tx = %tx_hash, quantity = %quote.quantity, "Purchase confirmed");
                self.finish(PurchaseOutcome::Confirmed(receipt.clone()));
                self.aggregator.request_refresh();
                Ok(receipt)
            }
            Err(e) => {
                let reason = match e {
                    crate::Error::Submission(reason) => reason,
                    other => other.to_string(),
                };
                METRICS.purchases_failed.fetch_add(1, Ordering::Relaxed);
                warn!(%reason, "Purchase failed");
                self.finish(PurchaseOutcome::Failed {
                    reason: reason.clone(),
                });
                Err(crate::Error::Submission(reason))
            }
        }
    }

    fn finish(&self, outcome: PurchaseOutcome) {
        self.status.send_modify(|s| {
            s.state = PurchaseState::Idle;
            s.last_outcome = Some(outcome);
        });
    }
}

/// Overpay is typed in whole-token decimals; empty means none.
fn parse_overpay(text: &str) -> Result<BaseUnits, crate::Error> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(BaseUnits::ZERO);
    }
    parse_units(text).map_err(crate::Error::InvalidOverpay)
}
