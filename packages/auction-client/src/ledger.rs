//! Ledger seam: the reads and the single write the client needs.

use crate::abi::IDutchAuction;
use alloy::primitives::{Address, TxHash};
use auction_types::{AuctionInfo, BaseUnits, PurchaseInfo, StaticParam, WholeTokens};
use std::future::Future;

/// Read/write surface of the auction contract.
///
/// [`crate::rpc::RpcLedger`] is the JSON-RPC implementation; tests use
/// in-memory ledgers.
pub trait AuctionLedger: Send + Sync + 'static {
    fn auction_info(&self) -> impl Future<Output = Result<AuctionInfo, crate::Error>> + Send;

    /// Base units per whole token.
    fn current_price(&self) -> impl Future<Output = Result<BaseUnits, crate::Error>> + Send;

    fn paused(&self) -> impl Future<Output = Result<bool, crate::Error>> + Send;

    fn purchase_info(
        &self,
        buyer: Address,
    ) -> impl Future<Output = Result<PurchaseInfo, crate::Error>> + Send;

    fn static_param(
        &self,
        param: StaticParam,
    ) -> impl Future<Output = Result<BaseUnits, crate::Error>> + Send;

    /// Send `buyTokens(quantity)` with `value` attached and wait for the
    /// receipt. `Ok` only for a successful (non-reverted) receipt.
    fn buy_tokens(
        &self,
        quantity: WholeTokens,
        value: BaseUnits,
    ) -> impl Future<Output = Result<TxHash, crate::Error>> + Send;
}

pub(crate) fn decode_auction_info(ret: IDutchAuction::getAuctionInfoReturn) -> AuctionInfo {
    AuctionInfo {
        started: ret.started,
        cancelled: ret.cancelled,
        active: ret.active,
        remaining_supply: BaseUnits::new(ret.remainingTokens),
        sold: WholeTokens::new(ret.soldTokens),
        total_buyers: ret.totalBuyers.saturating_to::<u64>(),
        time_remaining_secs: ret.timeRemaining.saturating_to::<u64>(),
    }
}

pub(crate) fn decode_purchase_info(ret: IDutchAuction::getPurchaseInfoReturn) -> PurchaseInfo {
    PurchaseInfo {
        tokens_purchased: WholeTokens::new(ret.tokensPurchased),
        total_paid: BaseUnits::new(ret.totalPaid),
        remaining_allowance: BaseUnits::new(ret.remainingAllowance),
    }
}
