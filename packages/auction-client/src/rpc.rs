//! JSON-RPC ledger with primary → fallback failover and circuit breaker.

use crate::abi::IDutchAuction::{self, IDutchAuctionInstance};
use crate::config::Config;
use crate::ledger::{decode_auction_info, decode_purchase_info, AuctionLedger};
use crate::metrics::METRICS;
use alloy::network::{EthereumWallet, ReceiptResponse};
use alloy::primitives::{Address, TxHash};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::http::reqwest::Url;
use auction_types::{AuctionInfo, BaseUnits, PurchaseInfo, StaticParam, WholeTokens};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{info, warn};

/// Consecutive failures before the circuit breaker opens.
const CIRCUIT_BREAKER_THRESHOLD: u64 = 5;
/// How long (ms) before a tripped breaker retries the primary.
const CIRCUIT_BREAKER_WINDOW_MS: u64 = 30_000;

type Auction = IDutchAuctionInstance<DynProvider>;

struct CircuitState {
    failures: u64,
    last_failure_ms: u64,
    open: bool,
}

/// Auction contract reached over JSON-RPC.
///
/// Reads fail over to the fallback endpoint. Purchases are sent once, to the
/// active endpoint only.
pub struct RpcLedger {
    primary: Auction,
    fallback: Auction,
    primary_url: String,
    fallback_url: String,
    sender: Option<Address>,
    receipt_timeout: Duration,
    circuit: Mutex<CircuitState>,
    total_failovers: AtomicU64,
}

impl RpcLedger {
    /// Build from config. The signing key is taken from `AUCTION_PRIVATE_KEY`
    /// only; without it the ledger is read-only.
    pub fn from_config(config: &Config) -> Result<Self, crate::Error> {
        let signer = match std::env::var("AUCTION_PRIVATE_KEY") {
            Ok(key) if !key.is_empty() => Some(
                key.parse::<PrivateKeySigner>()
                    .map_err(|e| crate::Error::Config(format!("Invalid private key: {e}")))?,
            ),
            _ => None,
        };
        Self::new(
            &config.rpc_url,
            &config.fallback_rpc_url,
            config.auction_address()?,
            signer,
            Duration::from_millis(config.receipt_timeout_ms),
        )
    }

    pub fn new(
        primary_url: &str,
        fallback_url: &str,
        auction: Address,
        signer: Option<PrivateKeySigner>,
        receipt_timeout: Duration,
    ) -> Result<Self, crate::Error> {
        let sender = signer.as_ref().map(|s| s.address());
        let wallet = signer.map(EthereumWallet::from);

        info!(
            primary = primary_url,
            fallback = fallback_url,
            auction = %auction,
            sender = ?sender,
            "RPC ledger initialized with failover"
        );

        Ok(Self {
            primary: connect(primary_url, auction, wallet.clone())?,
            fallback: connect(fallback_url, auction, wallet)?,
            primary_url: primary_url.to_string(),
            fallback_url: fallback_url.to_string(),
            sender,
            receipt_timeout,
            circuit: Mutex::new(CircuitState {
                failures: 0,
                last_failure_ms: 0,
                open: false,
            }),
            total_failovers: AtomicU64::new(0),
        })
    }

    /// Address purchases are sent from, if a signing key is loaded.
    pub fn sender(&self) -> Option<Address> {
        self.sender
    }

    /// Quick connectivity check. Returns "ok", "degraded", or error.
    pub async fn health_check(&self) -> Result<&'static str, crate::Error> {
        match self.primary.provider().get_block_number().await {
            Ok(_) => Ok("ok"),
            Err(_) => match self.fallback.provider().get_block_number().await {
                Ok(_) => Ok("degraded"),
                Err(e) => Err(crate::Error::Rpc(format!("Both RPCs unreachable: {e}"))),
            },
        }
    }

    /// Run a read on the primary, then once on the fallback. While the
    /// breaker is open only the fallback is tried, and its results leave the
    /// breaker alone.
    async fn read<'a, T, F, Fut>(&'a self, what: &'static str, call: F) -> Result<T, crate::Error>
    where
        F: Fn(&'a Auction) -> Fut,
        Fut: Future<Output = Result<T, alloy::contract::Error>>,
    {
        if self.is_circuit_open() {
            return call(&self.fallback).await.map_err(|e| {
                METRICS.rpc_errors.fetch_add(1, Ordering::Relaxed);
                crate::Error::Rpc(format!("{what} failed on fallback: {e}"))
            });
        }

        match call(&self.primary).await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                self.record_failure();
                warn!(read = what, error = %e, "RPC read failed, trying fallback");
                call(&self.fallback).await.map_err(|e2| {
                    crate::Error::Rpc(format!("{what} failed: primary={e}, fallback={e2}"))
                })
            }
        }
    }

    // --- Failover / circuit breaker ---

    /// Active contract handle (primary unless circuit is open).
    fn active(&self) -> &Auction {
        if self.is_circuit_open() {
            &self.fallback
        } else {
            &self.primary
        }
    }

    fn record_success(&self) {
        let mut circuit = self.circuit.lock().unwrap_or_else(|e| e.into_inner());
        if circuit.failures > 0 {
            info!(primary = %self.primary_url, "Primary RPC recovered");
            circuit.failures = 0;
            circuit.open = false;
        }
    }

    fn record_failure(&self) {
        METRICS.rpc_errors.fetch_add(1, Ordering::Relaxed);
        let mut circuit = self.circuit.lock().unwrap_or_else(|e| e.into_inner());
        circuit.failures += 1;
        circuit.last_failure_ms = now_ms();
        if circuit.failures >= CIRCUIT_BREAKER_THRESHOLD && !circuit.open {
            circuit.open = true;
            self.total_failovers.fetch_add(1, Ordering::Relaxed);
            METRICS.rpc_failovers.fetch_add(1, Ordering::Relaxed);
            warn!(
                failures = circuit.failures,
                fallback = %self.fallback_url,
                "Circuit breaker opened, routing to fallback"
            );
        }
    }

    pub fn is_circuit_open(&self) -> bool {
        let mut circuit = self.circuit.lock().unwrap_or_else(|e| e.into_inner());
        if !circuit.open {
            return false;
        }
        if now_ms().saturating_sub(circuit.last_failure_ms) > CIRCUIT_BREAKER_WINDOW_MS {
            circuit.open = false;
            circuit.failures = 0;
            info!(primary = %self.primary_url, "Circuit breaker half-open, retrying primary");
            return false;
        }
        true
    }

    pub fn failover_count(&self) -> u64 {
        self.total_failovers.load(Ordering::Relaxed)
    }

    /// Currently active RPC URL.
    pub fn active_url(&self) -> &str {
        if self.is_circuit_open() {
            &self.fallback_url
        } else {
            &self.primary_url
        }
    }
}

impl AuctionLedger for RpcLedger {
    async fn auction_info(&self) -> Result<AuctionInfo, crate::Error> {
        self.read("getAuctionInfo", |c| async move { c.getAuctionInfo().call().await })
            .await
            .map(decode_auction_info)
    }

    async fn current_price(&self) -> Result<BaseUnits, crate::Error> {
        self.read("getCurrentPrice", |c| async move { c.getCurrentPrice().call().await })
            .await
            .map(BaseUnits::new)
    }

    async fn paused(&self) -> Result<bool, crate::Error> {
        self.read("paused", |c| async move { c.paused().call().await })
            .await
    }

    async fn purchase_info(&self, buyer: Address) -> Result<PurchaseInfo, crate::Error> {
        self.read("getPurchaseInfo", |c| async move {
            c.getPurchaseInfo(buyer).call().await
        })
        .await
        .map(decode_purchase_info)
    }

    async fn static_param(&self, param: StaticParam) -> Result<BaseUnits, crate::Error> {
        let name = param.name();
        let raw = match param {
            StaticParam::StartingPrice => {
                self.read(name, |c| async move { c.startingPrice().call().await })
                    .await?
            }
            StaticParam::ReservePrice => {
                self.read(name, |c| async move { c.reservePrice().call().await })
                    .await?
            }
            StaticParam::MinBidIncrement => {
                self.read(name, |c| async move { c.minBidIncrement().call().await })
                    .await?
            }
            StaticParam::MaxTokensPerAddress => {
                self.read(name, |c| async move { c.maxTokensPerAddress().call().await })
                    .await?
            }
            StaticParam::TotalTokenAmount => {
                self.read(name, |c| async move { c.totalTokenAmount().call().await })
                    .await?
            }
        };
        Ok(BaseUnits::new(raw))
    }

    async fn buy_tokens(
        &self,
        quantity: WholeTokens,
        value: BaseUnits,
    ) -> Result<TxHash, crate::Error> {
        if self.sender.is_none() {
            return Err(crate::Error::Submission(
                "no signing key configured (set AUCTION_PRIVATE_KEY)".into(),
            ));
        }

        let pending = self
            .active()
            .buyTokens(quantity.raw())
            .value(value.raw())
            .send()
            .await
            .map_err(|e| crate::Error::Submission(e.to_string()))?;
        let tx_hash = *pending.tx_hash();
        info!(tx = %tx_hash, "Purchase transaction broadcast");

        let receipt = pending
            .with_timeout(Some(self.receipt_timeout))
            .get_receipt()
            .await
            .map_err(|e| crate::Error::Submission(format!("no receipt for {tx_hash}: {e}")))?;

        if !receipt.status() {
            return Err(crate::Error::Submission(format!(
                "transaction {tx_hash} reverted"
            )));
        }
        Ok(tx_hash)
    }
}

fn connect(
    url: &str,
    auction: Address,
    wallet: Option<EthereumWallet>,
) -> Result<Auction, crate::Error> {
    let parsed: Url = url
        .parse()
        .map_err(|e| crate::Error::Config(format!("Invalid RPC url {url}: {e}")))?;
    let provider = match wallet {
        Some(wallet) => ProviderBuilder::new()
            .wallet(wallet)
            .connect_http(parsed)
            .erased(),
        None => ProviderBuilder::new().connect_http(parsed).erased(),
    };
    Ok(IDutchAuction::new(auction, provider))
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
