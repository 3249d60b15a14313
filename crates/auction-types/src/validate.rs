//! Purchase validation against a derived view.

use crate::units::{BaseUnits, WholeTokens};
use crate::view::{AuctionStatus, AuctionView};
use alloy_primitives::U256;
use serde::Serialize;
use std::fmt;

/// Why a candidate purchase was refused. Checked in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Rejection {
    NotANumber,
    NotWholeNumber,
    NotPositive,
    /// Integer too large to represent at all.
    OutOfRange,
    ExceedsMaximum {
        requested: WholeTokens,
        max: WholeTokens,
    },
    /// Cap, allowance or supply not read yet.
    LimitsUnknown,
    AuctionNotActive {
        status: AuctionStatus,
    },
    PriceUnknown,
    CostOverflow,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotANumber => write!(f, "amount is not a number"),
            Self::NotWholeNumber => write!(f, "only whole tokens can be purchased"),
            Self::NotPositive => write!(f, "amount must be greater than zero"),
            Self::OutOfRange => write!(f, "amount is out of range"),
            Self::ExceedsMaximum { requested, max } => {
                write!(f, "requested {requested} tokens but at most {max} can be purchased")
            }
            Self::LimitsUnknown => write!(f, "purchase limits are still loading"),
            Self::AuctionNotActive { status } => write!(f, "auction is not active ({status})"),
            Self::PriceUnknown => write!(f, "current price is still loading"),
            Self::CostOverflow => write!(f, "cost exceeds 256 bits"),
        }
    }
}

impl std::error::Error for Rejection {}

/// An accepted purchase: `cost == unit_price * quantity`, exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PurchaseQuote {
    pub quantity: WholeTokens,
    pub unit_price: BaseUnits,
    pub cost: BaseUnits,
}

impl PurchaseQuote {
    /// Value to attach when sending `overpay` on top of the cost.
    pub fn total_with(&self, overpay: BaseUnits) -> Option<BaseUnits> {
        self.cost.checked_add(overpay)
    }
}

/// Read a whole-token quantity typed by the user.
///
/// `"3"` and `"3.0"` are accepted; `"2.5"` is rejected rather than rounded.
pub fn parse_quantity(candidate: &str) -> Result<WholeTokens, Rejection> {
    let text = candidate.trim();
    let (negative, body) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    let (int, frac) = body.split_once('.').unwrap_or((body, ""));
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (int.is_empty() && frac.is_empty()) || !all_digits(int) || !all_digits(frac) {
        return Err(Rejection::NotANumber);
    }
    if frac.bytes().any(|b| b != b'0') {
        return Err(Rejection::NotWholeNumber);
    }

    let int = int.trim_start_matches('0');
    if int.is_empty() || negative {
        return Err(Rejection::NotPositive);
    }
    U256::from_str_radix(int, 10)
        .map(WholeTokens::new)
        .map_err(|_| Rejection::OutOfRange)
}

/// Validate `candidate` against `view`. Pure; re-run it on every input change
/// and once more right before submitting.
pub fn validate(candidate: &str, view: &AuctionView) -> Result<PurchaseQuote, Rejection> {
    let quantity = parse_quantity(candidate)?;

    let max = view.max_purchasable.ok_or(Rejection::LimitsUnknown)?;
    if quantity > max {
        return Err(Rejection::ExceedsMaximum {
            requested: quantity,
            max,
        });
    }

    if view.status != AuctionStatus::Active {
        return Err(Rejection::AuctionNotActive {
            status: view.status,
        });
    }

    let unit_price = view.current_price.ok_or(Rejection::PriceUnknown)?;
    let cost = unit_price
        .checked_cost(quantity)
        .ok_or(Rejection::CostOverflow)?;

    Ok(PurchaseQuote {
        quantity,
        unit_price,
        cost,
    })
}
