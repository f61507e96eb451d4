//! Addresses on the privacy ledger (SS58) and the EVM ledger.
//!
//! SS58 addresses are compared by the raw public key they encode, never by
//! their string form: the same key renders differently under different
//! network prefixes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use super::{from_prefixed_hex, to_prefixed_hex};

/// Length in bytes of an sr25519 public key / substrate `AccountId32`.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Length in bytes of an EVM address.
pub const EVM_ADDRESS_LEN: usize = 20;

const CHECKSUM_LEN: usize = 2;
const SS58_CHECKSUM_PREFIX: &[u8] = b"SS58PRE";

/// Errors raised while decoding addresses.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid base58 encoding")]
    Base58,
    #[error("unsupported ss58 address prefix")]
    Prefix,
    #[error("unexpected ss58 payload length {0}")]
    Length(usize),
    #[error("ss58 checksum mismatch")]
    Checksum,
    #[error("invalid hex public key")]
    Hex,
    #[error("invalid EVM address `{0}`")]
    Evm(String),
}

/// Raw 32-byte public key of a privacy-ledger account.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct PublicKey(pub [u8; PUBLIC_KEY_LEN]);

impl PublicKey {
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        to_prefixed_hex(&self.0)
    }

    /// Parses a `0x`-prefixed 32-byte hex public key.
    pub fn from_hex(s: &str) -> Result<Self, AddressError> {
        let bytes = from_prefixed_hex(s).map_err(|_| AddressError::Hex)?;
        let arr: [u8; PUBLIC_KEY_LEN] = bytes.try_into().map_err(|_| AddressError::Hex)?;
        Ok(PublicKey(arr))
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        PublicKey::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

fn ss58_checksum(body: &[u8]) -> [u8; CHECKSUM_LEN] {
    let hash = blake2b_simd::Params::new()
        .hash_length(64)
        .to_state()
        .update(SS58_CHECKSUM_PREFIX)
        .update(body)
        .finalize();
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&hash.as_bytes()[..CHECKSUM_LEN]);
    out
}

/// Decodes an SS58 address into its network format and public key.
///
/// Both the one-byte (formats 0..=63) and two-byte (64..=16383) prefix
/// encodings are supported. The checksum is always verified.
pub fn decode_ss58(address: &str) -> Result<(u16, PublicKey), AddressError> {
    let data = bs58::decode(address)
        .into_vec()
        .map_err(|_| AddressError::Base58)?;

    let (format, prefix_len) = match data.first() {
        Some(&first) if first < 64 => (u16::from(first), 1),
        Some(&first) if first < 128 => {
            let second = *data.get(1).ok_or(AddressError::Length(data.len()))?;
            let lower = (first << 2) | (second >> 6);
            let upper = second & 0b0011_1111;
            (u16::from(lower) | (u16::from(upper) << 8), 2)
        }
        _ => return Err(AddressError::Prefix),
    };

    if data.len() != prefix_len + PUBLIC_KEY_LEN + CHECKSUM_LEN {
        return Err(AddressError::Length(data.len()));
    }

    let body_len = prefix_len + PUBLIC_KEY_LEN;
    if ss58_checksum(&data[..body_len]) != data[body_len..] {
        return Err(AddressError::Checksum);
    }

    let mut key = [0u8; PUBLIC_KEY_LEN];
    key.copy_from_slice(&data[prefix_len..body_len]);
    Ok((format, PublicKey(key)))
}

/// Encodes a public key as an SS58 address under the given network format.
pub fn encode_ss58(key: &PublicKey, format: u16) -> String {
    let mut body = Vec::with_capacity(2 + PUBLIC_KEY_LEN + CHECKSUM_LEN);
    if format < 64 {
        body.push(format as u8);
    } else {
        let first = (((format & 0b1111_1100) >> 2) as u8) | 0b0100_0000;
        let second = ((format >> 8) as u8) | (((format & 0b11) as u8) << 6);
        body.push(first);
        body.push(second);
    }
    body.extend_from_slice(&key.0);
    let checksum = ss58_checksum(&body);
    body.extend_from_slice(&checksum);
    bs58::encode(body).into_string()
}

/// Decodes an account reference into raw key bytes.
///
/// Accepts either an SS58 address (any network format) or a `0x`-prefixed
/// hex public key, which is how pre-authenticated session links carry the
/// expected account.
pub fn decode_account(reference: &str) -> Result<PublicKey, AddressError> {
    let trimmed = reference.trim();
    if trimmed.starts_with("0x") || trimmed.starts_with("0X") {
        PublicKey::from_hex(trimmed)
    } else {
        decode_ss58(trimmed).map(|(_, key)| key)
    }
}

/// 20-byte EVM account address.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct EvmAddress(pub [u8; EVM_ADDRESS_LEN]);

impl EvmAddress {
    pub fn as_bytes(&self) -> &[u8; EVM_ADDRESS_LEN] {
        &self.0
    }
}

impl FromStr for EvmAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = from_prefixed_hex(s.trim()).map_err(|_| AddressError::Evm(s.to_string()))?;
        let arr: [u8; EVM_ADDRESS_LEN] = bytes
            .try_into()
            .map_err(|_| AddressError::Evm(s.to_string()))?;
        Ok(EvmAddress(arr))
    }
}

impl fmt::Display for EvmAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", to_prefixed_hex(&self.0))
    }
}

impl Serialize for EvmAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EvmAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE_SS58: &str = "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY";
    const ALICE_CALAMARI: &str = "dmyjURuBeJwFo4Nvf2GZ8f5E2Asz98JY2d7UcaDykqYm1zpoi";
    const ALICE_HEX: &str = "0xd43593c715fdd31c61141abd04a99fd6822c8558854ccde39a5684e7a56da27d";

    #[test]
    fn decodes_generic_substrate_address() {
        let (format, key) = decode_ss58(ALICE_SS58).expect("alice should decode");
        assert_eq!(format, 42);
        assert_eq!(key.to_hex(), ALICE_HEX);
    }

    #[test]
    fn decodes_two_byte_prefix_address() {
        let (format, key) = decode_ss58(ALICE_CALAMARI).expect("calamari alice should decode");
        assert_eq!(format, 78);
        assert_eq!(key.to_hex(), ALICE_HEX);
    }

    #[test]
    fn encode_matches_known_vectors() {
        let key = PublicKey::from_hex(ALICE_HEX).unwrap();
        assert_eq!(encode_ss58(&key, 42), ALICE_SS58);
        assert_eq!(encode_ss58(&key, 78), ALICE_CALAMARI);
    }

    #[test]
    fn corrupted_checksum_is_rejected() {
        let mut raw = bs58::decode(ALICE_SS58).into_vec().unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let tampered = bs58::encode(raw).into_string();
        assert_eq!(decode_ss58(&tampered), Err(AddressError::Checksum));
    }

    #[test]
    fn decode_account_accepts_hex_and_ss58() {
        let from_hex = decode_account(ALICE_HEX).unwrap();
        let from_ss58 = decode_account(ALICE_SS58).unwrap();
        assert_eq!(from_hex, from_ss58);
        assert!(decode_account("0x1234").is_err());
        assert!(decode_account("not-an-address").is_err());
    }

    #[test]
    fn evm_address_parses_and_displays_lowercase() {
        let addr: EvmAddress = "0x2B09d47D550061f995A3b5C6F0Fd58005215D7c8".parse().unwrap();
        assert_eq!(addr.to_string(), "0x2b09d47d550061f995a3b5c6f0fd58005215d7c8");
        assert!("0x1234".parse::<EvmAddress>().is_err());
    }
}
