//! Derived auction state.
//!
//! [`derive_view`] is a pure, total function of a snapshot and the number of
//! seconds counted locally since that snapshot was read. Unknown inputs stay
//! unknown (`None`); they are never read as zero.

use crate::snapshot::{AuctionInfo, PurchaseInfo, RawAuctionSnapshot, Read};
use crate::units::{format_duration, BaseUnits, Percentage, WholeTokens};
use serde::Serialize;
use std::fmt;

/// Effective auction status for display and purchase eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AuctionStatus {
    Loading,
    NotStarted,
    Active,
    Paused,
    Ended,
    Cancelled,
}

impl fmt::Display for AuctionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Loading => "Loading",
            Self::NotStarted => "Not Started",
            Self::Active => "Active",
            Self::Paused => "Paused",
            Self::Ended => "Ended",
            Self::Cancelled => "Cancelled",
        };
        f.write_str(label)
    }
}

/// Ledger data that contradicts itself. The view still renders, using the
/// more conservative reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConsistencyFault {
    RemainingExceedsTotal {
        remaining: BaseUnits,
        total: BaseUnits,
    },
    SoldExceedsTotal {
        sold: WholeTokens,
        total: WholeTokens,
    },
    PurchasedExceedsCap {
        purchased: WholeTokens,
        cap: BaseUnits,
    },
    AllowanceMismatch {
        computed: BaseUnits,
        reported: BaseUnits,
    },
}

impl fmt::Display for ConsistencyFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RemainingExceedsTotal { remaining, total } => {
                write!(f, "remaining supply {remaining} exceeds total supply {total}")
            }
            Self::SoldExceedsTotal { sold, total } => {
                write!(f, "sold {sold} tokens out of a total of {total}")
            }
            Self::PurchasedExceedsCap { purchased, cap } => {
                write!(f, "purchased {purchased} tokens above the per-address cap {cap}")
            }
            Self::AllowanceMismatch { computed, reported } => {
                write!(f, "reported allowance {reported} differs from computed {computed}")
            }
        }
    }
}

/// Everything the client shows or checks, derived from one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuctionView {
    pub sequence: u64,
    pub status: AuctionStatus,
    pub current_price: Option<BaseUnits>,
    pub starting_price: Option<BaseUnits>,
    pub reserve_price: Option<BaseUnits>,
    pub min_bid_increment: Option<BaseUnits>,
    pub remaining_tokens: Option<WholeTokens>,
    pub total_tokens: Option<WholeTokens>,
    pub sold_tokens: Option<WholeTokens>,
    pub sold_percentage: Option<Percentage>,
    pub max_tokens_per_address: Option<WholeTokens>,
    pub remaining_allowance: Option<WholeTokens>,
    /// min(per-address cap, remaining allowance, remaining supply).
    pub max_purchasable: Option<WholeTokens>,
    pub time_remaining_secs: Option<u64>,
    pub total_buyers: Option<u64>,
    pub tokens_purchased: Option<WholeTokens>,
    pub total_paid: Option<BaseUnits>,
    pub stale: bool,
    pub faults: Vec<ConsistencyFault>,
}

impl AuctionView {
    /// Suggested purchase sizes: a quarter, a half and all of `max_purchasable`.
    pub fn quick_buy_amounts(&self) -> Vec<WholeTokens> {
        let Some(max) = self.max_purchasable else {
            return Vec::new();
        };
        let mut amounts: Vec<WholeTokens> = [max.fraction(1, 4), max.fraction(1, 2), max]
            .into_iter()
            .filter(|a| !a.is_zero())
            .collect();
        amounts.dedup();
        amounts
    }

    pub fn time_remaining_display(&self) -> String {
        format_duration(self.time_remaining_secs.unwrap_or(0))
    }
}

/// Derive the view. `elapsed_secs` is local time counted since the snapshot's
/// time-remaining value was read.
pub fn derive_view(snapshot: &RawAuctionSnapshot, elapsed_secs: u64) -> AuctionView {
    let mut faults = Vec::new();

    let info = snapshot.auction_info.value();
    let paused = snapshot.paused.value().copied();
    let total_supply = snapshot.total_supply.value().copied();
    let cap = snapshot.max_tokens_per_address.value().copied();

    let status = effective_status(info, paused);

    // Supply used for eligibility: never more than the total.
    let remaining_supply = info.map(|i| match total_supply {
        Some(total) if i.remaining_supply > total => {
            faults.push(ConsistencyFault::RemainingExceedsTotal {
                remaining: i.remaining_supply,
                total,
            });
            total
        }
        _ => i.remaining_supply,
    });

    let total_tokens = total_supply.map(BaseUnits::to_whole_floor);
    let sold_tokens = info.map(|i| i.sold);
    let sold_percentage = match (sold_tokens, total_tokens) {
        (Some(sold), Some(total)) => {
            if sold > total {
                faults.push(ConsistencyFault::SoldExceedsTotal { sold, total });
            }
            Some(Percentage::ratio(sold.raw(), total.raw()))
        }
        _ => None,
    };

    let purchase = match &snapshot.purchase_info {
        Read::Unset => PurchaseRead::Disconnected,
        read => match read.value() {
            Some(p) => PurchaseRead::Known(p),
            None => PurchaseRead::Unknown,
        },
    };
    let remaining_allowance = cap.and_then(|cap| remaining_allowance(cap, purchase, &mut faults));

    let max_purchasable = match (cap, remaining_allowance, remaining_supply) {
        (Some(cap), Some(allowance), Some(supply)) => Some(
            cap.to_whole_floor()
                .min(allowance)
                .min(supply.to_whole_floor()),
        ),
        _ => None,
    };

    let (tokens_purchased, total_paid) = match purchase {
        PurchaseRead::Known(p) => (Some(p.tokens_purchased), Some(p.total_paid)),
        _ => (None, None),
    };

    AuctionView {
        sequence: snapshot.sequence,
        status,
        current_price: snapshot.current_price.value().copied(),
        starting_price: snapshot.starting_price.value().copied(),
        reserve_price: snapshot.reserve_price.value().copied(),
        min_bid_increment: snapshot.min_bid_increment.value().copied(),
        remaining_tokens: remaining_supply.map(BaseUnits::to_whole_floor),
        total_tokens,
        sold_tokens,
        sold_percentage,
        max_tokens_per_address: cap.map(BaseUnits::to_whole_floor),
        remaining_allowance,
        max_purchasable,
        time_remaining_secs: info.map(|i| i.time_remaining_secs.saturating_sub(elapsed_secs)),
        total_buyers: info.map(|i| i.total_buyers),
        tokens_purchased,
        total_paid,
        stale: snapshot.is_stale(),
        faults,
    }
}

/// First match wins: cancelled, paused, not started, active, ended.
pub fn effective_status(info: Option<&AuctionInfo>, paused: Option<bool>) -> AuctionStatus {
    let (Some(info), Some(paused)) = (info, paused) else {
        return AuctionStatus::Loading;
    };
    if info.cancelled {
        AuctionStatus::Cancelled
    } else if paused {
        AuctionStatus::Paused
    } else if !info.started {
        AuctionStatus::NotStarted
    } else if info.active {
        AuctionStatus::Active
    } else {
        AuctionStatus::Ended
    }
}

#[derive(Clone, Copy)]
enum PurchaseRead<'a> {
    Disconnected,
    Unknown,
    Known(&'a PurchaseInfo),
}

/// Cap minus purchases, in whole tokens. The purchased count is scaled up to
/// base units once, subtracted, and the result floored back down once.
fn remaining_allowance(
    cap: BaseUnits,
    purchase: PurchaseRead<'_>,
    faults: &mut Vec<ConsistencyFault>,
) -> Option<WholeTokens> {
    let info = match purchase {
        PurchaseRead::Disconnected => return Some(cap.to_whole_floor()),
        PurchaseRead::Unknown => return None,
        PurchaseRead::Known(info) => info,
    };

    let computed = match info
        .tokens_purchased
        .to_base_units()
        .and_then(|purchased| cap.checked_sub(purchased))
    {
        Some(left) => left,
        None => {
            faults.push(ConsistencyFault::PurchasedExceedsCap {
                purchased: info.tokens_purchased,
                cap,
            });
            BaseUnits::ZERO
        }
    };

    if info.remaining_allowance != computed {
        faults.push(ConsistencyFault::AllowanceMismatch {
            computed,
            reported: info.remaining_allowance,
        });
    }

    Some(computed.to_whole_floor())
}
