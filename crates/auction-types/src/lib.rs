//! Unit-tagged amounts and pure logic for the Dutch auction client.
//! No I/O and no async runtime; everything here is deterministic.

mod snapshot;
mod units;
mod validate;
mod view;

pub use snapshot::{AuctionInfo, PurchaseInfo, RawAuctionSnapshot, Read, StaticParam};
pub use units::{
    format_duration, format_units, format_units_fixed, parse_units, BaseUnits, Percentage,
    UnitsError, WholeTokens, DECIMALS, ONE_TOKEN,
};
pub use validate::{parse_quantity, validate, PurchaseQuote, Rejection};
pub use view::{derive_view, effective_status, AuctionStatus, AuctionView, ConsistencyFault};
