//! Client configuration.

use alloy::primitives::Address;
use serde::Deserialize;
use std::time::Duration;

/// Configuration for the auction client.
///
/// Loaded from an optional `auction-watch.toml` plus `AUCTION_*` environment
/// variables. The signing key is never part of it; see
/// [`crate::rpc::RpcLedger::from_config`].
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "defaults::rpc_url")]
    pub rpc_url: String,

    #[serde(default = "defaults::fallback_rpc_url")]
    pub fallback_rpc_url: String,

    #[serde(default = "defaults::auction_address")]
    pub auction_address: String,

    /// Account whose purchase info is tracked. Defaults to the signer.
    #[serde(default)]
    pub wallet_address: Option<String>,

    #[serde(default = "defaults::poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "defaults::tick_interval_ms")]
    pub tick_interval_ms: u64,

    #[serde(default = "defaults::read_timeout_ms")]
    pub read_timeout_ms: u64,

    #[serde(default = "defaults::receipt_timeout_ms")]
    pub receipt_timeout_ms: u64,

    /// Whole tokens to buy once the auction is active (binary only).
    #[serde(default)]
    pub purchase_tokens: Option<String>,

    /// Decimal overpay sent with that purchase, refunded if unused.
    #[serde(default)]
    pub purchase_overpay: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: defaults::rpc_url(),
            fallback_rpc_url: defaults::fallback_rpc_url(),
            auction_address: defaults::auction_address(),
            wallet_address: None,
            poll_interval_ms: defaults::poll_interval_ms(),
            tick_interval_ms: defaults::tick_interval_ms(),
            read_timeout_ms: defaults::read_timeout_ms(),
            receipt_timeout_ms: defaults::receipt_timeout_ms(),
            purchase_tokens: None,
            purchase_overpay: None,
        }
    }
}

impl Config {
    pub fn auction_address(&self) -> Result<Address, crate::Error> {
        parse_address("auction_address", &self.auction_address)
    }

    /// Configured wallet address, if any.
    pub fn wallet(&self) -> Result<Option<Address>, crate::Error> {
        match self.wallet_address.as_deref() {
            None | Some("") => Ok(None),
            Some(raw) => parse_address("wallet_address", raw).map(Some),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

fn parse_address(field: &str, raw: &str) -> Result<Address, crate::Error> {
    raw.trim()
        .parse()
        .map_err(|e| crate::Error::Config(format!("Invalid {field} {raw:?}: {e}")))
}

mod defaults {
    pub fn rpc_url() -> String {
        "https://rpc.socotra-testnet.network/ext/bc/JUNE/rpc".into()
    }

    /// Same public endpoint; set `AUCTION_FALLBACK_RPC_URL` for real failover.
    pub fn fallback_rpc_url() -> String {
        rpc_url()
    }

    pub fn auction_address() -> String {
        "0x5D70abeEc006022617e55D19A227de1c6c99Fa6e".into()
    }

    pub fn poll_interval_ms() -> u64 {
        1_000
    }

    pub fn tick_interval_ms() -> u64 {
        1_000
    }

    pub fn read_timeout_ms() -> u64 {
        5_000
    }

    pub fn receipt_timeout_ms() -> u64 {
        120_000
    }
}
