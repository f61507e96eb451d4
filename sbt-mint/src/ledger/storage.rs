//! Storage-key derivation and SCALE decoding for the storage items the
//! mint flow reads.
//!
//! Keys follow the substrate layout
//! `twox128(pallet) ++ twox128(item) ++ blake2_128_concat(account_id)`.
//! The `twox128` prefixes are constants of the runtime metadata and are
//! inlined here.
//!
//! Event records cannot be walked without runtime metadata, since event
//! payload sizes vary. [`find_dispatch_failure`] instead looks for the
//! fixed-layout head of the two failure events a batch can emit.

use crate::types::{AssetId, AssetIdRange, Balance, PublicKey};

use super::LedgerError;

/// `twox128("System") ++ twox128("Account")`.
pub const SYSTEM_ACCOUNT_PREFIX: [u8; 32] = [
    0x26, 0xaa, 0x39, 0x4e, 0xea, 0x56, 0x30, 0xe0, 0x7c, 0x48, 0xae, 0x0c, 0x95, 0x58, 0xce, 0xf7,
    0xb9, 0x9d, 0x88, 0x0e, 0xc6, 0x81, 0x79, 0x9c, 0x0c, 0xf3, 0x0e, 0x88, 0x86, 0x37, 0x1d, 0xa9,
];

/// `twox128("MantaSbt") ++ twox128("ReservedIds")`.
pub const RESERVED_IDS_PREFIX: [u8; 32] = [
    0xee, 0x3a, 0x0a, 0xbf, 0xdb, 0x3b, 0xbd, 0x49, 0x14, 0xc7, 0xac, 0x9d, 0x04, 0xe5, 0xf8, 0x43,
    0xd6, 0xdb, 0x17, 0xbf, 0xf0, 0xea, 0x6e, 0x49, 0x35, 0xb5, 0x3d, 0x6f, 0x85, 0x89, 0x92, 0x4e,
];

/// `twox128("System") ++ twox128("Events")`.
pub const SYSTEM_EVENTS_KEY: [u8; 32] = [
    0x26, 0xaa, 0x39, 0x4e, 0xea, 0x56, 0x30, 0xe0, 0x7c, 0x48, 0xae, 0x0c, 0x95, 0x58, 0xce, 0xf7,
    0x80, 0xd4, 0x1e, 0x5e, 0x16, 0x05, 0x67, 0x65, 0xbc, 0x84, 0x61, 0x85, 0x10, 0x72, 0xc9, 0xd7,
];

/// Runtime position of `frame_system`; `ExtrinsicFailed` is its event 1.
const SYSTEM_PALLET_INDEX: u8 = 0;
const EXTRINSIC_FAILED: u8 = 1;
/// Runtime position of `pallet_utility`; `BatchInterrupted` is its event 0.
const UTILITY_PALLET_INDEX: u8 = 40;
const BATCH_INTERRUPTED: u8 = 0;
/// `Phase::ApplyExtrinsic` discriminant.
const PHASE_APPLY_EXTRINSIC: u8 = 0;

/// `AccountInfo { nonce: u32, consumers: u32, providers: u32, sufficients: u32, data: AccountData }`,
/// where `AccountData.free` is the first `u128`.
const FREE_BALANCE_OFFSET: usize = 16;
const U128_LEN: usize = 16;

/// `blake2_128(data) ++ data`.
pub fn blake2_128_concat(data: &[u8]) -> Vec<u8> {
    let hash = blake2b_simd::Params::new().hash_length(16).hash(data);
    let mut out = Vec::with_capacity(16 + data.len());
    out.extend_from_slice(hash.as_bytes());
    out.extend_from_slice(data);
    out
}

/// Full storage key of a map item keyed by account id.
pub fn account_storage_key(prefix: &[u8; 32], account: &PublicKey) -> Vec<u8> {
    let mut key = prefix.to_vec();
    key.extend(blake2_128_concat(account.as_bytes()));
    key
}

/// Free balance from encoded `AccountInfo` bytes.
///
/// Absent storage is an account that has never been endowed, i.e. zero.
/// `None` when the value is too short to carry the field.
pub fn decode_free_balance(bytes: Option<&[u8]>) -> Option<Balance> {
    match bytes {
        None => Some(Balance::zero()),
        Some(b) => b
            .get(FREE_BALANCE_OFFSET..FREE_BALANCE_OFFSET + U128_LEN)
            .map(Balance::from_le_bytes),
    }
}

/// Reserved `(start, end)` asset ids from encoded `(u128, u128)` bytes.
pub fn decode_asset_range(bytes: Option<&[u8]>) -> Result<AssetIdRange, LedgerError> {
    let bytes = bytes.ok_or_else(|| {
        LedgerError::DecodeAbsent("no asset ids are reserved for this account".to_string())
    })?;
    if bytes.len() < 2 * U128_LEN {
        return Err(LedgerError::Decode(format!(
            "reserved id range needs {} bytes, got {}",
            2 * U128_LEN,
            bytes.len()
        )));
    }
    Ok(AssetIdRange {
        start: AssetId::from_le_bytes(&bytes[..U128_LEN]),
        end: AssetId::from_le_bytes(&bytes[U128_LEN..2 * U128_LEN]),
    })
}

/// Looks for a failure event emitted while applying extrinsic
/// `extrinsic_index` in encoded `System.Events` bytes.
///
/// Returns a short description of the failure, or `None` when the
/// extrinsic dispatched cleanly.
pub fn find_dispatch_failure(events: &[u8], extrinsic_index: u32) -> Option<String> {
    let mut head = [0u8; 5];
    head[0] = PHASE_APPLY_EXTRINSIC;
    head[1..].copy_from_slice(&extrinsic_index.to_le_bytes());

    events.windows(head.len() + 2).enumerate().find_map(|(at, window)| {
        if window[..head.len()] != head {
            return None;
        }
        let rest = &events[at + window.len()..];
        match (window[5], window[6]) {
            (SYSTEM_PALLET_INDEX, EXTRINSIC_FAILED) => Some(format!(
                "System.ExtrinsicFailed: {}",
                describe_dispatch_error(rest)
            )),
            (UTILITY_PALLET_INDEX, BATCH_INTERRUPTED) => {
                let item = rest.get(..4).map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))?;
                Some(format!(
                    "Utility.BatchInterrupted at call {item}: {}",
                    describe_dispatch_error(&rest[4..])
                ))
            }
            _ => None,
        }
    })
}

/// Names the leading `DispatchError` variant in `bytes`.
fn describe_dispatch_error(bytes: &[u8]) -> String {
    match bytes {
        [3, pallet, code, ..] => format!("module error {code} in pallet {pallet}"),
        [variant, ..] => match *variant {
            0 => "other".to_string(),
            1 => "cannot lookup".to_string(),
            2 => "bad origin".to_string(),
            4 => "consumer remaining".to_string(),
            5 => "no providers".to_string(),
            6 => "too many consumers".to_string(),
            7 => "token error".to_string(),
            8 => "arithmetic error".to_string(),
            9 => "transactional error".to_string(),
            10 => "resources exhausted".to_string(),
            11 => "state corruption".to_string(),
            12 => "resource unavailable".to_string(),
            13 => "root origin not allowed".to_string(),
            other => format!("dispatch error {other}"),
        },
        [] => "unknown dispatch error".to_string(),
    }
}
