//! Raw ledger reads and the composite snapshot built from them.

use crate::units::{BaseUnits, WholeTokens};

/// Lifecycle of one independent ledger read.
///
/// An errored read keeps the last value it resolved to, so consumers can show
/// stale data instead of nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Read<T> {
    Unset,
    Pending { last: Option<T> },
    Resolved(T),
    Errored { last: Option<T>, error: String },
}

impl<T> Default for Read<T> {
    fn default() -> Self {
        Self::Unset
    }
}

impl<T> Read<T> {
    /// Latest known value, fresh or stale.
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Unset => None,
            Self::Pending { last } | Self::Errored { last, .. } => last.as_ref(),
            Self::Resolved(value) => Some(value),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    /// Showing a retained value after a failed read.
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Errored { last: Some(_), .. })
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Errored { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Enter `Pending`, carrying over whatever value is known.
    pub fn begin(self) -> Self {
        Self::Pending {
            last: self.into_last(),
        }
    }

    /// Apply the outcome of a read.
    pub fn settle(self, outcome: Result<T, String>) -> Self {
        match outcome {
            Ok(value) => Self::Resolved(value),
            Err(error) => Self::Errored {
                last: self.into_last(),
                error,
            },
        }
    }

    fn into_last(self) -> Option<T> {
        match self {
            Self::Unset => None,
            Self::Pending { last } | Self::Errored { last, .. } => last,
            Self::Resolved(value) => Some(value),
        }
    }
}

/// Decoded `getAuctionInfo()`.
///
/// `remaining_supply` is in base units while `sold` is a whole-token count;
/// that is how the contract reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuctionInfo {
    pub started: bool,
    pub cancelled: bool,
    pub active: bool,
    pub remaining_supply: BaseUnits,
    pub sold: WholeTokens,
    pub total_buyers: u64,
    pub time_remaining_secs: u64,
}

/// Decoded `getPurchaseInfo(address)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurchaseInfo {
    pub tokens_purchased: WholeTokens,
    pub total_paid: BaseUnits,
    pub remaining_allowance: BaseUnits,
}

/// Parameters fixed at deployment, read once per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StaticParam {
    StartingPrice,
    ReservePrice,
    MinBidIncrement,
    MaxTokensPerAddress,
    TotalTokenAmount,
}

impl StaticParam {
    pub const ALL: [StaticParam; 5] = [
        Self::StartingPrice,
        Self::ReservePrice,
        Self::MinBidIncrement,
        Self::MaxTokensPerAddress,
        Self::TotalTokenAmount,
    ];

    /// Contract function name.
    pub fn name(self) -> &'static str {
        match self {
            Self::StartingPrice => "startingPrice",
            Self::ReservePrice => "reservePrice",
            Self::MinBidIncrement => "minBidIncrement",
            Self::MaxTokensPerAddress => "maxTokensPerAddress",
            Self::TotalTokenAmount => "totalTokenAmount",
        }
    }
}

/// Best-effort composite of every read, replaced wholesale on each refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawAuctionSnapshot {
    /// Refresh cycle that produced this snapshot (0 = nothing read yet).
    pub sequence: u64,
    pub auction_info: Read<AuctionInfo>,
    pub current_price: Read<BaseUnits>,
    pub paused: Read<bool>,
    pub starting_price: Read<BaseUnits>,
    pub reserve_price: Read<BaseUnits>,
    pub min_bid_increment: Read<BaseUnits>,
    pub max_tokens_per_address: Read<BaseUnits>,
    pub total_supply: Read<BaseUnits>,
    /// `Unset` while no wallet is connected.
    pub purchase_info: Read<PurchaseInfo>,
}

impl RawAuctionSnapshot {
    pub fn static_param(&self, param: StaticParam) -> &Read<BaseUnits> {
        match param {
            StaticParam::StartingPrice => &self.starting_price,
            StaticParam::ReservePrice => &self.reserve_price,
            StaticParam::MinBidIncrement => &self.min_bid_increment,
            StaticParam::MaxTokensPerAddress => &self.max_tokens_per_address,
            StaticParam::TotalTokenAmount => &self.total_supply,
        }
    }

    pub fn static_param_mut(&mut self, param: StaticParam) -> &mut Read<BaseUnits> {
        match param {
            StaticParam::StartingPrice => &mut self.starting_price,
            StaticParam::ReservePrice => &mut self.reserve_price,
            StaticParam::MinBidIncrement => &mut self.min_bid_increment,
            StaticParam::MaxTokensPerAddress => &mut self.max_tokens_per_address,
            StaticParam::TotalTokenAmount => &mut self.total_supply,
        }
    }

    /// Static parameters not yet resolved. Resolved ones stay cached.
    pub fn missing_static_params(&self) -> Vec<StaticParam> {
        StaticParam::ALL
            .into_iter()
            .filter(|p| !self.static_param(*p).is_resolved())
            .collect()
    }

    /// Any read is currently serving a retained value after an error.
    pub fn is_stale(&self) -> bool {
        self.auction_info.is_stale()
            || self.current_price.is_stale()
            || self.paused.is_stale()
            || self.purchase_info.is_stale()
            || StaticParam::ALL
                .into_iter()
                .any(|p| self.static_param(p).is_stale())
    }
}
