//! Error types for the auction client.

use auction_types::{Rejection, UnitsError};
use std::fmt;

/// Auction client error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Configuration error.
    Config(String),
    /// Ledger RPC communication error.
    Rpc(String),
    /// A read did not answer within its window.
    Timeout(String),
    /// Purchase refused before anything was sent.
    Rejected(Rejection),
    /// Overpay amount could not be read.
    InvalidOverpay(UnitsError),
    /// Another purchase is still waiting for its outcome.
    PurchaseInFlight,
    /// Purchase sent but not confirmed (signing refused, reverted, no receipt).
    Submission(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(msg) => write!(f, "config error: {msg}"),
            Error::Rpc(msg) => write!(f, "rpc error: {msg}"),
            Error::Timeout(msg) => write!(f, "timed out: {msg}"),
            Error::Rejected(reason) => write!(f, "purchase rejected: {reason}"),
            Error::InvalidOverpay(e) => write!(f, "invalid overpay amount: {e}"),
            Error::PurchaseInFlight => write!(f, "a purchase is already in flight"),
            Error::Submission(msg) => write!(f, "purchase failed: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<Rejection> for Error {
    fn from(reason: Rejection) -> Self {
        Error::Rejected(reason)
    }
}
