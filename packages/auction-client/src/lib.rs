//! # Dutch Auction Client
//!
//! Keeps a live view of a Dutch auction contract and submits validated
//! purchases against it.
//!
//! ## Quick Start
//! ```bash
//! AUCTION_PRIVATE_KEY=0x... cargo run --bin auction-watch
//! ```
//!
//! ## Pieces
//! - [`ReadAggregator`] - polls the ledger into a wholesale-replaced snapshot
//! - [`ticker`] - local countdown between reads, republishes the derived view
//! - [`PurchaseSubmitter`] - one validated `buyTokens` at a time
//! - [`AuctionSession`] - owns all of the above as cancellable tasks

pub mod abi;
pub mod aggregator;
pub mod config;
mod error;
pub mod ledger;
pub mod metrics;
pub mod rpc;
pub mod session;
pub mod submitter;
pub mod ticker;

pub use aggregator::{ReadAggregator, RefreshOutcome};
pub use config::Config;
pub use error::Error;
pub use ledger::AuctionLedger;
pub use metrics::METRICS;
pub use rpc::RpcLedger;
pub use session::{AuctionSession, SessionSettings};
pub use submitter::{
    PurchaseOutcome, PurchaseReceipt, PurchaseState, PurchaseStatus, PurchaseSubmitter,
};
