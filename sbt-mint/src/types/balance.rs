//! Fixed-point ledger balances.
//!
//! Ledger-native balances are integers scaled by `10^decimals`. They are
//! held as arbitrary-precision integers and only turned into decimal text
//! for display; balances routinely exceed 2^53 so floating point is never
//! involved.

use num_bigint::BigUint;
use num_traits::Zero;

/// Decimal exponent of the native token in this deployment.
pub const DEFAULT_DECIMALS: u32 = 12;

/// Placeholder rendered when a balance could not be fetched.
pub const BALANCE_PLACEHOLDER: &str = "-";

/// Scaled integer balance as stored on chain.
#[derive(Clone, Debug, Default, Eq, PartialEq, PartialOrd, Ord)]
pub struct Balance(BigUint);

impl Balance {
    pub fn zero() -> Self {
        Balance(BigUint::zero())
    }

    pub fn from_raw(raw: impl Into<BigUint>) -> Self {
        Balance(raw.into())
    }

    /// Decodes a SCALE `u128` (16 little-endian bytes).
    pub fn from_le_bytes(bytes: &[u8]) -> Self {
        Balance(BigUint::from_bytes_le(bytes))
    }

    /// Parses a raw (unscaled) decimal integer string.
    ///
    /// Returns `None` for empty or non-numeric input.
    pub fn parse_raw(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return None;
        }
        trimmed.parse::<BigUint>().ok().map(Balance)
    }

    pub fn raw(&self) -> &BigUint {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Integer part of the display value, i.e. `raw / 10^decimals`.
    pub fn whole_units(&self, decimals: u32) -> BigUint {
        &self.0 / scale(decimals)
    }

    /// Renders `raw / 10^decimals` exactly, without trailing zeros or
    /// exponent notation (`"1.5"`, `"42"`, `"0.000000000001"`).
    pub fn to_decimal_string(&self, decimals: u32) -> String {
        let scale = scale(decimals);
        let whole = &self.0 / &scale;
        let frac = &self.0 % &scale;
        if frac.is_zero() {
            return whole.to_string();
        }
        let padded = format!("{:0>width$}", frac.to_string(), width = decimals as usize);
        format!("{whole}.{}", padded.trim_end_matches('0'))
    }
}

fn scale(decimals: u32) -> BigUint {
    BigUint::from(10u32).pow(decimals)
}

/// Public and private balances of the connected account.
///
/// Each side is fetched independently; `None` means the fetch failed or
/// returned no usable value.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Balances {
    pub public: Option<Balance>,
    pub private: Option<Balance>,
}

impl Balances {
    pub fn public_display(&self, decimals: u32) -> String {
        display(self.public.as_ref(), decimals)
    }

    pub fn private_display(&self, decimals: u32) -> String {
        display(self.private.as_ref(), decimals)
    }

    /// True when the public balance holds at least one whole token.
    pub fn has_positive_public_units(&self, decimals: u32) -> bool {
        self.public
            .as_ref()
            .is_some_and(|b| !b.whole_units(decimals).is_zero())
    }
}

fn display(balance: Option<&Balance>, decimals: u32) -> String {
    balance
        .map(|b| b.to_decimal_string(decimals))
        .unwrap_or_else(|| BALANCE_PLACEHOLDER.to_string())
}
