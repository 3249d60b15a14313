use alloy::primitives::{Address, TxHash, U256};
use anyhow::Result;
use auction_client::{AuctionLedger, AuctionSession, Error, SessionSettings};
use auction_types::{
    AuctionInfo, AuctionStatus, AuctionView, BaseUnits, PurchaseInfo, StaticParam, WholeTokens,
    ONE_TOKEN,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;

pub fn tokens(n: u64) -> BaseUnits {
    BaseUnits::new(U256::from(n) * ONE_TOKEN)
}

pub fn buyer() -> Address {
    Address::repeat_byte(0xb0)
}

pub fn settings() -> SessionSettings {
    SessionSettings {
        poll_interval: Duration::from_millis(1000),
        tick_interval: Duration::from_millis(1000),
        read_timeout: Duration::from_millis(5000),
    }
}

/// Contract state the scripted ledger serves.
pub struct AuctionScript {
    pub started: bool,
    pub cancelled: bool,
    pub active: bool,
    pub paused: bool,
    pub remaining: BaseUnits,
    pub sold: WholeTokens,
    pub total_buyers: u64,
    pub time_remaining_secs: u64,
    /// Base units per whole token.
    pub price: BaseUnits,
    pub total_supply: BaseUnits,
    pub max_per_address: BaseUnits,
    pub purchases: HashMap<Address, PurchaseInfo>,
    /// Failures injected per read name (`"getAuctionInfo"`, ...).
    pub failing: HashMap<&'static str, String>,
    pub hold_buys: bool,
    pub revert_reason: Option<String>,
}

impl AuctionScript {
    /// 1000-token auction, half sold, 100 tokens per address.
    pub fn half_sold() -> Self {
        Self {
            started: true,
            cancelled: false,
            active: true,
            paused: false,
            remaining: tokens(500),
            sold: WholeTokens::from_u64(500),
            total_buyers: 4,
            time_remaining_secs: 3_600,
            price: BaseUnits::from_u128(20_000_000_000_000_000),
            total_supply: tokens(1000),
            max_per_address: tokens(100),
            purchases: HashMap::new(),
            failing: HashMap::new(),
            hold_buys: false,
            revert_reason: None,
        }
    }
}

/// In-memory auction contract. Purchases update supply and per-address
/// accounting the way the deployed contract does.
pub struct ScriptedLedger {
    script: Mutex<AuctionScript>,
    buyer: Address,
    pub info_reads: AtomicU32,
    pub release_buy: Notify,
}

impl ScriptedLedger {
    pub fn new(script: AuctionScript) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            buyer: buyer(),
            info_reads: AtomicU32::new(0),
            release_buy: Notify::new(),
        })
    }

    pub fn script(&self) -> MutexGuard<'_, AuctionScript> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn info_reads(&self) -> u32 {
        self.info_reads.load(Ordering::SeqCst)
    }

    fn check(&self, read: &'static str) -> Result<(), Error> {
        match self.script().failing.get(read) {
            Some(reason) => Err(Error::Rpc(reason.clone())),
            None => Ok(()),
        }
    }
}

impl AuctionLedger for ScriptedLedger {
    async fn auction_info(&self) -> Result<AuctionInfo, Error> {
        self.info_reads.fetch_add(1, Ordering::SeqCst);
        self.check("getAuctionInfo")?;
        let s = self.script();
        Ok(AuctionInfo {
            started: s.started,
            cancelled: s.cancelled,
            active: s.active,
            remaining_supply: s.remaining,
            sold: s.sold,
            total_buyers: s.total_buyers,
            time_remaining_secs: s.time_remaining_secs,
        })
    }

    async fn current_price(&self) -> Result<BaseUnits, Error> {
        self.check("getCurrentPrice")?;
        Ok(self.script().price)
    }

    async fn paused(&self) -> Result<bool, Error> {
        self.check("paused")?;
        Ok(self.script().paused)
    }

    async fn purchase_info(&self, buyer: Address) -> Result<PurchaseInfo, Error> {
        self.check("getPurchaseInfo")?;
        let s = self.script();
        Ok(s.purchases.get(&buyer).copied().unwrap_or(PurchaseInfo {
            tokens_purchased: WholeTokens::ZERO,
            total_paid: BaseUnits::ZERO,
            remaining_allowance: s.max_per_address,
        }))
    }

    async fn static_param(&self, param: StaticParam) -> Result<BaseUnits, Error> {
        self.check(param.name())?;
        let s = self.script();
        Ok(match param {
            StaticParam::StartingPrice => tokens(1),
            StaticParam::ReservePrice => BaseUnits::from_u128(1_000_000_000_000_000),
            StaticParam::MinBidIncrement => BaseUnits::from_u128(1_000_000_000_000),
            StaticParam::MaxTokensPerAddress => s.max_per_address,
            StaticParam::TotalTokenAmount => s.total_supply,
        })
    }

    async fn buy_tokens(&self, quantity: WholeTokens, value: BaseUnits) -> Result<TxHash, Error> {
        let hold = self.script().hold_buys;
        if hold {
            self.release_buy.notified().await;
        }

        let mut s = self.script();
        if let Some(reason) = s.revert_reason.clone() {
            return Err(Error::Submission(reason));
        }
        let price = s.price;
        let cost = price
            .checked_cost(quantity)
            .ok_or_else(|| Error::Submission("cost overflow".into()))?;
        if value < cost {
            return Err(Error::Submission("execution reverted: insufficient payment".into()));
        }
        let bought = quantity
            .to_base_units()
            .ok_or_else(|| Error::Submission("quantity overflow".into()))?;

        let cap = s.max_per_address;
        let buyer = self.buyer;
        let entry = s.purchases.entry(buyer).or_insert(PurchaseInfo {
            tokens_purchased: WholeTokens::ZERO,
            total_paid: BaseUnits::ZERO,
            remaining_allowance: cap,
        });
        entry.tokens_purchased = WholeTokens::new(entry.tokens_purchased.raw() + quantity.raw());
        entry.total_paid = entry.total_paid.checked_add(cost).unwrap_or(entry.total_paid);
        entry.remaining_allowance = entry
            .remaining_allowance
            .checked_sub(bought)
            .unwrap_or(BaseUnits::ZERO);

        s.remaining = s.remaining.checked_sub(bought).unwrap_or(BaseUnits::ZERO);
        s.sold = WholeTokens::new(s.sold.raw() + quantity.raw());
        s.total_buyers += 1;
        Ok(TxHash::repeat_byte(0x42))
    }
}

/// Wait until the session publishes a view matching `pred`.
pub async fn wait_for_view<L, F>(session: &AuctionSession<L>, pred: F) -> Result<Arc<AuctionView>>
where
    L: AuctionLedger,
    F: Fn(&AuctionView) -> bool,
{
    let mut views = session.subscribe();
    let view = tokio::time::timeout(Duration::from_secs(30), views.wait_for(|v| pred(v)))
        .await??
        .clone();
    Ok(view)
}

/// Wait until the session reports `status` with every limit loaded.
pub async fn wait_for_status<L: AuctionLedger>(
    session: &AuctionSession<L>,
    status: AuctionStatus,
) -> Result<Arc<AuctionView>> {
    wait_for_view(session, |v| v.status == status && v.max_purchasable.is_some()).await
}
