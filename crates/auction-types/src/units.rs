//! Fixed-point token amounts with the unit carried in the type.
//!
//! The auction contract reports some quantities in base units (10^-18 of a
//! token) and others as whole-token counts. [`BaseUnits`] and [`WholeTokens`]
//! keep the two apart: the only ways across are [`BaseUnits::to_whole_floor`]
//! and [`WholeTokens::to_base_units`].

use alloy_primitives::U256;
use serde::{Serialize, Serializer};
use std::fmt;

/// Decimals of the sale token and of the native currency.
pub const DECIMALS: usize = 18;

/// One whole token in base units (10^18).
pub const ONE_TOKEN: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// An amount in base units (wei-scaled, 18 decimals).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct BaseUnits(U256);

impl BaseUnits {
    pub const ZERO: Self = Self(U256::ZERO);

    pub const fn new(raw: U256) -> Self {
        Self(raw)
    }

    pub fn from_u128(raw: u128) -> Self {
        Self(U256::from(raw))
    }

    pub const fn raw(self) -> U256 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// Whole tokens contained in this amount; the fractional remainder is dropped.
    pub fn to_whole_floor(self) -> WholeTokens {
        WholeTokens(self.0 / ONE_TOKEN)
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    /// Cost of `quantity` tokens when `self` is the price of one token.
    pub fn checked_cost(self, quantity: WholeTokens) -> Option<Self> {
        self.0.checked_mul(quantity.0).map(Self)
    }
}

impl fmt::Display for BaseUnits {
    /// Exact decimal with trailing zeros trimmed (`1.5`, `0.000001`, `3`).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_units(self.0, DECIMALS))
    }
}

impl Serialize for BaseUnits {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

/// A count of whole tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct WholeTokens(U256);

impl WholeTokens {
    pub const ZERO: Self = Self(U256::ZERO);

    pub const fn new(count: U256) -> Self {
        Self(count)
    }

    pub fn from_u64(count: u64) -> Self {
        Self(U256::from(count))
    }

    pub const fn raw(self) -> U256 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// Scale up to base units. `None` if the result does not fit in 256 bits.
    pub fn to_base_units(self) -> Option<BaseUnits> {
        self.0.checked_mul(ONE_TOKEN).map(BaseUnits)
    }

    /// `self * numerator / denominator`, rounded down.
    pub fn fraction(self, numerator: u64, denominator: u64) -> Self {
        if denominator == 0 {
            return Self::ZERO;
        }
        let scaled = self.0.saturating_mul(U256::from(numerator));
        Self(scaled / U256::from(denominator))
    }
}

impl fmt::Display for WholeTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for WholeTokens {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

/// A percentage with four fixed decimals, held as millionths (100% = 1_000_000).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Percentage(u32);

const PERCENT_SCALE: u32 = 1_000_000;

impl Percentage {
    pub const ZERO: Self = Self(0);
    pub const FULL: Self = Self(PERCENT_SCALE);

    /// `part / whole` clamped to `[0, 100]`. A zero `whole` yields zero.
    pub fn ratio(part: U256, whole: U256) -> Self {
        if whole.is_zero() {
            return Self::ZERO;
        }
        let Some(scaled) = part.checked_mul(U256::from(PERCENT_SCALE)) else {
            return Self::FULL;
        };
        let millionths = scaled / whole;
        if millionths >= U256::from(PERCENT_SCALE) {
            Self::FULL
        } else {
            Self(millionths.saturating_to::<u32>())
        }
    }

    pub const fn millionths(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:04}", self.0 / 10_000, self.0 % 10_000)
    }
}

impl Serialize for Percentage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Failure to read a decimal amount typed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitsError {
    Empty,
    Negative,
    Invalid(String),
    /// More than 18 significant fractional digits.
    TooPrecise,
    Overflow,
}

impl fmt::Display for UnitsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "amount is empty"),
            Self::Negative => write!(f, "amount is negative"),
            Self::Invalid(text) => write!(f, "not a decimal amount: {text:?}"),
            Self::TooPrecise => write!(f, "more than {DECIMALS} decimal places"),
            Self::Overflow => write!(f, "amount exceeds 256 bits"),
        }
    }
}

impl std::error::Error for UnitsError {}

/// Render `value` scaled down by `decimals`, trimming trailing zeros.
pub fn format_units(value: U256, decimals: usize) -> String {
    let (int, frac) = split_digits(value, decimals);
    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        int
    } else {
        format!("{int}.{frac}")
    }
}

/// Render with exactly `places` decimals, truncating (never rounding up).
pub fn format_units_fixed(amount: BaseUnits, places: usize) -> String {
    let (int, mut frac) = split_digits(amount.0, DECIMALS);
    if places == 0 {
        return int;
    }
    if places <= frac.len() {
        frac.truncate(places);
    } else {
        frac.extend(std::iter::repeat_n('0', places - frac.len()));
    }
    format!("{int}.{frac}")
}

fn split_digits(value: U256, decimals: usize) -> (String, String) {
    let digits = value.to_string();
    if decimals == 0 {
        return (digits, String::new());
    }
    if digits.len() > decimals {
        let (int, frac) = digits.split_at(digits.len() - decimals);
        (int.to_string(), frac.to_string())
    } else {
        ("0".to_string(), format!("{digits:0>decimals$}"))
    }
}

/// Parse a decimal string (`"0.001"`, `"2"`, `".5"`) into exact base units.
pub fn parse_units(text: &str) -> Result<BaseUnits, UnitsError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(UnitsError::Empty);
    }
    if text.starts_with('-') {
        return Err(UnitsError::Negative);
    }

    let (int, frac) = text.split_once('.').unwrap_or((text, ""));
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (int.is_empty() && frac.is_empty()) || !all_digits(int) || !all_digits(frac) {
        return Err(UnitsError::Invalid(text.to_string()));
    }

    let frac = if frac.len() > DECIMALS {
        let (kept, dropped) = frac.split_at(DECIMALS);
        if dropped.bytes().any(|b| b != b'0') {
            return Err(UnitsError::TooPrecise);
        }
        kept
    } else {
        frac
    };

    let mut digits = String::with_capacity(int.len() + DECIMALS);
    digits.push_str(int);
    digits.push_str(frac);
    digits.extend(std::iter::repeat_n('0', DECIMALS - frac.len()));

    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(BaseUnits::ZERO);
    }
    U256::from_str_radix(digits, 10)
        .map(BaseUnits)
        .map_err(|_| UnitsError::Overflow)
}

/// Seconds as `HH:MM:SS`; hours are not capped at 24.
pub fn format_duration(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}
