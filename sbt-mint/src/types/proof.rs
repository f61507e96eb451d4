//! Proof bundles, signature bindings and mint transactions.
//!
//! The private-wallet extension returns proof material as two index-aligned
//! arrays (`transactionDatas` and `posts`). [`ProofBundle`] binds them into a
//! single ordered sequence of [`ProofEntry`] pairs at the boundary so no
//! later step can misalign them.
//!
//! Transfer posts are kept as the exact JSON the extension produced; the
//! proof bytes extracted from them are only hex-encoded when a signing
//! payload is built, so what is signed and what is embedded never drift.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Value, json};
use thiserror::Error;

use super::{AssetId, PublicKey, to_prefixed_hex};
use super::session::{CredentialToken, EvmSignature, Sr25519Signature};

/// Structural problems in proof material returned by the wallet extension.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProofError {
    #[error("proof bundle is empty")]
    Empty,
    #[error("proof bundle misaligned: {transactions} transaction descriptors vs {posts} posts")]
    Misaligned { transactions: usize, posts: usize },
    #[error("proof bundle entry {0} has no transaction descriptor or post")]
    EmptyEntry(usize),
    #[error("transfer post has no readable `proof` field")]
    MissingProof,
    #[error("transaction descriptor has no readable `utxo_commitment_randomness`")]
    MissingCommitment,
}

/// Reads a byte array from the encodings the extension bridge may use:
/// a hex string, an array of numbers, or an index-keyed object (the JSON
/// form of a JavaScript `Uint8Array`).
pub(crate) fn bytes_from_value(value: &Value) -> Option<Vec<u8>> {
    match value {
        Value::String(s) => super::from_prefixed_hex(s).ok(),
        Value::Array(items) => items
            .iter()
            .map(|v| v.as_u64().and_then(|n| u8::try_from(n).ok()))
            .collect(),
        Value::Object(map) => {
            let mut out = vec![0u8; map.len()];
            for (key, v) in map {
                let idx: usize = key.parse().ok()?;
                let byte = v.as_u64().and_then(|n| u8::try_from(n).ok())?;
                *out.get_mut(idx)? = byte;
            }
            Some(out)
        }
        _ => None,
    }
}

/// Raw zero-knowledge proof bytes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProofBytes(pub Vec<u8>);

impl ProofBytes {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        to_prefixed_hex(&self.0)
    }
}

/// A private-transfer post as produced by the extension.
#[derive(Clone, Debug, PartialEq)]
pub struct TransferPost {
    raw: Value,
    proof: ProofBytes,
}

impl TransferPost {
    pub fn from_value(raw: Value) -> Result<Self, ProofError> {
        let proof = raw
            .get("proof")
            .and_then(bytes_from_value)
            .ok_or(ProofError::MissingProof)?;
        Ok(Self {
            raw,
            proof: ProofBytes(proof),
        })
    }

    pub fn proof(&self) -> &ProofBytes {
        &self.proof
    }

    pub fn as_value(&self) -> &Value {
        &self.raw
    }
}

impl Serialize for TransferPost {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}

/// Wire shape of `multiSbtPostBuild` results.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct RawProofBundle {
    #[serde(rename = "transactionDatas")]
    pub transaction_datas: Vec<Vec<Value>>,
    pub posts: Vec<Vec<Value>>,
}

/// One proof paired with the transaction descriptor it was built for.
#[derive(Clone, Debug, PartialEq)]
pub struct ProofEntry {
    pub transaction_data: Value,
    pub post: TransferPost,
}

impl ProofEntry {
    /// Commitment randomness of the entry's `ToPrivate` output, used as the
    /// unique proof identifier.
    pub fn commitment_randomness(&self) -> Result<Vec<u8>, ProofError> {
        self.transaction_data
            .get("ToPrivate")
            .and_then(|to_private| to_private.get(0))
            .and_then(|output| output.get("utxo_commitment_randomness"))
            .and_then(bytes_from_value)
            .ok_or(ProofError::MissingCommitment)
    }
}

/// Ordered, index-aligned proof entries for one mint attempt.
#[derive(Clone, Debug, PartialEq)]
pub struct ProofBundle {
    entries: Vec<ProofEntry>,
}

impl ProofBundle {
    pub fn entries(&self) -> &[ProofEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First entry; a bundle is never empty once constructed.
    pub fn first(&self) -> &ProofEntry {
        &self.entries[0]
    }
}

impl TryFrom<RawProofBundle> for ProofBundle {
    type Error = ProofError;

    fn try_from(raw: RawProofBundle) -> Result<Self, Self::Error> {
        if raw.transaction_datas.len() != raw.posts.len() {
            return Err(ProofError::Misaligned {
                transactions: raw.transaction_datas.len(),
                posts: raw.posts.len(),
            });
        }
        if raw.posts.is_empty() {
            return Err(ProofError::Empty);
        }

        let entries = raw
            .transaction_datas
            .into_iter()
            .zip(raw.posts)
            .enumerate()
            .map(|(i, (mut datas, mut posts))| {
                if datas.is_empty() || posts.is_empty() {
                    return Err(ProofError::EmptyEntry(i));
                }
                Ok(ProofEntry {
                    transaction_data: datas.swap_remove(0),
                    post: TransferPost::from_value(posts.swap_remove(0))?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { entries })
    }
}

/// One `{assetId, amount}` item of a proof-building request.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SbtInfo {
    pub asset_id: AssetId,
    pub amount: String,
}

/// Request passed to `multiSbtPostBuild`.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SbtBuildRequest {
    pub sbt_info_list: Vec<SbtInfo>,
    pub network: String,
}

impl SbtBuildRequest {
    /// Single-unit request for one reserved asset id.
    pub fn single(asset_id: AssetId, network: impl Into<String>) -> Self {
        Self {
            sbt_info_list: vec![SbtInfo {
                asset_id,
                amount: "1".to_string(),
            }],
            network: network.into(),
        }
    }
}

/// Double signature tying the EVM authorization to the privacy-ledger key.
///
/// The EVM typed-data signature is itself the payload signed by the
/// privacy-ledger account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureBinding {
    pub proof: ProofBytes,
    pub evm_signature: EvmSignature,
    pub ledger_signature: Sr25519Signature,
    pub public_key: PublicKey,
}

impl SignatureBinding {
    /// `sig_and_pub_key` argument of the mint call.
    pub fn sig_and_pub_key(&self) -> Value {
        json!({
            "sig": { "sr25519": to_prefixed_hex(&self.ledger_signature.0) },
            "pub_key": { "sr25519": self.public_key.to_hex() },
        })
    }
}

/// `mantaSbt.toPrivate` call for one proof.
#[derive(Clone, Debug)]
pub struct MintTransaction {
    pub binding: SignatureBinding,
    pub post: TransferPost,
    pub credential: CredentialToken,
}

impl MintTransaction {
    pub const PALLET: &'static str = "mantaSbt";
    pub const CALL: &'static str = "toPrivate";

    /// Positional call arguments: `(metadata, signer_info, sig_and_pub_key,
    /// post, chain_id)`. The first two are unused by this flow.
    pub fn call_args(&self) -> Value {
        json!([
            Value::Null,
            Value::Null,
            self.binding.sig_and_pub_key(),
            self.post.as_value(),
            self.credential.as_str(),
        ])
    }
}

impl Serialize for MintTransaction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        json!({
            "pallet": Self::PALLET,
            "call": Self::CALL,
            "args": self.call_args(),
        })
        .serialize(serializer)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn post_with_proof(byte: u8) -> Value {
        json!({ "proof": vec![byte; 4], "asset_id": [0, 0], "sinks": [] })
    }

    pub(crate) fn tx_data_with_randomness(byte: u8) -> Value {
        json!({ "ToPrivate": [{ "utxo_commitment_randomness": vec![byte; 32] }, "1"] })
    }

    #[test]
    fn reads_bytes_in_all_wire_encodings() {
        assert_eq!(bytes_from_value(&json!("0x0102")), Some(vec![1, 2]));
        assert_eq!(bytes_from_value(&json!([1, 2, 3])), Some(vec![1, 2, 3]));
        assert_eq!(
            bytes_from_value(&json!({ "1": 7, "0": 9 })),
            Some(vec![9, 7])
        );
        assert_eq!(bytes_from_value(&json!([1, 256])), None);
        assert_eq!(bytes_from_value(&json!({ "5": 1 })), None);
    }

    #[test]
    fn bundle_pairs_entries_in_order() {
        let raw = RawProofBundle {
            transaction_datas: vec![
                vec![tx_data_with_randomness(1)],
                vec![tx_data_with_randomness(2)],
            ],
            posts: vec![vec![post_with_proof(0xA1)], vec![post_with_proof(0xB2)]],
        };
        let bundle = ProofBundle::try_from(raw).expect("aligned bundle");
        assert_eq!(bundle.len(), 2);
        assert_eq!(bundle.entries()[0].post.proof().as_bytes(), &[0xA1; 4]);
        assert_eq!(bundle.entries()[1].post.proof().as_bytes(), &[0xB2; 4]);
        assert_eq!(
            bundle.entries()[1].commitment_randomness().unwrap(),
            vec![2u8; 32]
        );
    }

    #[test]
    fn misaligned_bundle_is_rejected() {
        let raw = RawProofBundle {
            transaction_datas: vec![vec![tx_data_with_randomness(1)]],
            posts: vec![vec![post_with_proof(1)], vec![post_with_proof(2)]],
        };
        assert_eq!(
            ProofBundle::try_from(raw),
            Err(ProofError::Misaligned {
                transactions: 1,
                posts: 2
            })
        );
        assert_eq!(
            ProofBundle::try_from(RawProofBundle::default()),
            Err(ProofError::Empty)
        );
    }

    #[test]
    fn post_without_proof_is_rejected() {
        let raw = RawProofBundle {
            transaction_datas: vec![vec![tx_data_with_randomness(1)]],
            posts: vec![vec![json!({ "sinks": [] })]],
        };
        assert_eq!(ProofBundle::try_from(raw), Err(ProofError::MissingProof));
    }

    #[test]
    fn build_request_uses_wire_field_names() {
        let req = SbtBuildRequest::single(AssetId::from(5u128), "Calamari");
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json,
            json!({ "sbtInfoList": [{ "assetId": "5", "amount": "1" }], "network": "Calamari" })
        );
    }

    #[test]
    fn mint_transaction_embeds_post_verbatim() {
        let post = TransferPost::from_value(post_with_proof(3)).unwrap();
        let tx = MintTransaction {
            binding: SignatureBinding {
                proof: post.proof().clone(),
                evm_signature: EvmSignature(vec![1; 65]),
                ledger_signature: Sr25519Signature(vec![2; 64]),
                public_key: PublicKey([3; 32]),
            },
            post: post.clone(),
            credential: CredentialToken::new("77"),
        };
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["pallet"], "mantaSbt");
        assert_eq!(json["args"][3], post_with_proof(3));
        assert_eq!(json["args"][4], "77");
        assert_eq!(
            json["args"][2]["pub_key"]["sr25519"],
            PublicKey([3; 32]).to_hex()
        );
    }
}
