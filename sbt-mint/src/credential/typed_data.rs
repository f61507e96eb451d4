//! EIP-712 typed data for the proof-claim signature.
//!
//! The claim struct and its domain are declared with `alloy-sol-types`; the
//! wallet payload for `eth_signTypedData_v4` is rendered from them.

use alloy_primitives::{B256, Bytes, U256};
use alloy_sol_types::{Eip712Domain, SolStruct, sol};
use serde::ser::Error as _;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value, json};

use crate::types::{BlockHash, ProofBytes, to_prefixed_hex};

/// Domain name shown by the EVM wallet when signing a proof claim.
pub const CLAIM_DOMAIN_NAME: &str = "Claim Free SBT";
pub const CLAIM_DOMAIN_VERSION: &str = "1";

sol! {
    /// Claim over one mint proof.
    #[derive(Debug, PartialEq, Eq)]
    struct Transaction {
        bytes proof;
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TypedDataField {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// `eth_signTypedData_v4` payload for a proof claim.
#[derive(Clone, Debug, PartialEq)]
pub struct TypedData {
    pub domain: Eip712Domain,
    pub claim: Transaction,
}

impl TypedData {
    /// Claim over one proof, salted with the privacy ledger's genesis hash
    /// so a signature cannot be replayed against another network.
    pub fn proof_claim(genesis: &BlockHash, proof: &ProofBytes) -> Self {
        Self {
            domain: Eip712Domain::new(
                Some(CLAIM_DOMAIN_NAME.into()),
                Some(CLAIM_DOMAIN_VERSION.into()),
                Some(U256::ZERO),
                None,
                Some(B256::from(genesis.0)),
            ),
            claim: Transaction {
                proof: Bytes::from(proof.0.clone()),
            },
        }
    }

    /// Digest the wallet signs.
    pub fn signing_hash(&self) -> B256 {
        self.claim.eip712_signing_hash(&self.domain)
    }

    /// Fields of the primary type, from its EIP-712 encoding.
    pub fn fields(&self) -> Vec<TypedDataField> {
        struct_fields(&Transaction::eip712_root_type())
    }

    /// Providers take the payload as a JSON string parameter.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Splits `Name(type1 name1,type2 name2)` into its fields.
fn struct_fields(encoded: &str) -> Vec<TypedDataField> {
    let inner = encoded
        .split_once('(')
        .and_then(|(_, rest)| rest.strip_suffix(')'))
        .unwrap_or_default();
    inner
        .split(',')
        .filter_map(|member| member.trim().split_once(' '))
        .map(|(kind, name)| TypedDataField {
            name: name.to_string(),
            kind: kind.to_string(),
        })
        .collect()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DomainJson<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<&'a str>,
    // Wallets compare a string chain id against the active chain, so this
    // stays numeric.
    #[serde(skip_serializing_if = "Option::is_none")]
    chain_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    salt: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TypedDataJson<'a> {
    domain: DomainJson<'a>,
    types: Map<String, Value>,
    primary_type: &'static str,
    message: Value,
}

/// Serializes as `{domain, types, primaryType, message}`.
impl Serialize for TypedData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let chain_id = self
            .domain
            .chain_id
            .map(u64::try_from)
            .transpose()
            .map_err(|_| S::Error::custom("chain id does not fit in u64"))?;
        let mut types = Map::new();
        types.insert(
            Transaction::NAME.to_string(),
            serde_json::to_value(self.fields()).map_err(S::Error::custom)?,
        );

        TypedDataJson {
            domain: DomainJson {
                name: self.domain.name.as_deref(),
                version: self.domain.version.as_deref(),
                chain_id,
                salt: self.domain.salt.map(|s| to_prefixed_hex(s.as_slice())),
            },
            types,
            primary_type: Transaction::NAME,
            message: json!({ "proof": to_prefixed_hex(&self.claim.proof) }),
        }
        .serialize(serializer)
    }
}
