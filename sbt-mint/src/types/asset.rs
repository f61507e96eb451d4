//! Asset identifiers reserved for SBT minting.

use std::fmt;
use std::str::FromStr;

use num_bigint::BigUint;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Ledger-native asset identifier.
///
/// On chain this is a `u128`; it is carried as an arbitrary-precision
/// integer so no step of the pipeline ever narrows it.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct AssetId(pub BigUint);

impl AssetId {
    /// Decodes a SCALE `u128` (16 little-endian bytes).
    pub fn from_le_bytes(bytes: &[u8]) -> Self {
        AssetId(BigUint::from_bytes_le(bytes))
    }
}

impl From<u128> for AssetId {
    fn from(value: u128) -> Self {
        AssetId(BigUint::from(value))
    }
}

impl FromStr for AssetId {
    type Err = num_bigint::ParseBigIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<BigUint>().map(AssetId)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Decimal strings on the wire: JSON numbers would lose precision past 2^53
// in the wallet extension.
impl Serialize for AssetId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AssetId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Inclusive range of asset ids reserved for one account by the ledger's
/// reservation registry.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct AssetIdRange {
    pub start: AssetId,
    pub end: AssetId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_full_width_u128() {
        let bytes = u128::MAX.to_le_bytes();
        let id = AssetId::from_le_bytes(&bytes);
        assert_eq!(id.to_string(), u128::MAX.to_string());
    }

    #[test]
    fn serializes_as_decimal_string() {
        let id = AssetId::from(9_007_199_254_740_993u128);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"9007199254740993\"");
        let back: AssetId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
