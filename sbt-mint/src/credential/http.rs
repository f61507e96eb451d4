//! HTTP JSON-RPC implementations of the credential traits.
//!
//! [`HttpEvmProvider`] forwards provider requests to a JSON-RPC endpoint
//! that fronts the user's EVM wallet (a local signer such as Frame, or a
//! relay to the browser wallet). [`HttpCredentialRegistry`] reads the
//! registry contract with `eth_call`.

use std::time::Duration;

use alloy_primitives::Address;
use alloy_sol_types::{SolCall, sol};
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use super::{CredentialRegistry, EvmProvider, RegistryError};
use crate::jsonrpc::{JsonRpcError, JsonRpcHttpClient};
use crate::types::{CredentialToken, EvmAddress, from_prefixed_hex, to_prefixed_hex};
use crate::wallet::WalletError;

sol! {
    /// Account-bound token registry (BAB on BSC).
    interface ICredentialRegistry {
        function tokenIdOf(address owner) external view returns (uint256);
    }
}

use ICredentialRegistry::tokenIdOfCall;

/// Standard JSON-RPC code for "execution reverted".
const EXECUTION_REVERTED_CODE: i64 = 3;

/// Calldata for `tokenIdOf(owner)`.
fn token_id_of_call(owner: &EvmAddress) -> Vec<u8> {
    tokenIdOfCall {
        owner: Address::new(*owner.as_bytes()),
    }
    .abi_encode()
}

pub struct HttpEvmProvider {
    client: JsonRpcHttpClient,
}

impl HttpEvmProvider {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, WalletError> {
        Ok(Self {
            client: JsonRpcHttpClient::new(url, timeout)?,
        })
    }
}

#[async_trait]
impl EvmProvider for HttpEvmProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, WalletError> {
        match self.client.call_value(method, params).await {
            Ok(v) => Ok(v),
            Err(JsonRpcError::Transport(msg)) => {
                debug!("EVM provider unreachable at {}: {msg}", self.client.url());
                Err(WalletError::NotInstalled)
            }
            Err(e) => Err(e.into()),
        }
    }
}

pub struct HttpCredentialRegistry {
    client: JsonRpcHttpClient,
    contract: EvmAddress,
}

impl HttpCredentialRegistry {
    pub fn new(url: impl Into<String>, contract: EvmAddress, timeout: Duration) -> Result<Self, RegistryError> {
        let client = JsonRpcHttpClient::new(url, timeout)
            .map_err(|e| RegistryError::Unavailable(e.to_string()))?;
        Ok(Self { client, contract })
    }

    pub fn contract(&self) -> &EvmAddress {
        &self.contract
    }
}

fn is_revert(code: i64, message: &str) -> bool {
    code == EXECUTION_REVERTED_CODE || message.to_ascii_lowercase().contains("revert")
}

/// Decodes the `tokenIdOf` return value into a decimal token id. Empty
/// return data (`0x`) means the call produced nothing.
fn decode_token_id(result: &Value) -> Result<Option<CredentialToken>, RegistryError> {
    let text = result
        .as_str()
        .ok_or_else(|| RegistryError::Decode(format!("eth_call returned {result}")))?;
    let bytes = from_prefixed_hex(text).map_err(|e| RegistryError::Decode(e.to_string()))?;
    if bytes.is_empty() {
        return Ok(None);
    }
    let id = tokenIdOfCall::abi_decode_returns(&bytes)
        .map_err(|e| RegistryError::Decode(format!("tokenIdOf return: {e}")))?;
    Ok(Some(CredentialToken::new(id.to_string())))
}

#[async_trait]
impl CredentialRegistry for HttpCredentialRegistry {
    async fn token_id_of(&self, owner: &EvmAddress) -> Result<Option<CredentialToken>, RegistryError> {
        let data = token_id_of_call(owner);
        let call = json!({ "to": self.contract.to_string(), "data": to_prefixed_hex(&data) });

        match self.client.call_value("eth_call", json!([call, "latest"])).await {
            Ok(result) => decode_token_id(&result),
            // The registry reverts for owners without a token.
            Err(JsonRpcError::Rpc { code, message, .. }) if is_revert(code, &message) => {
                debug!(%owner, "registry reverted: {message}");
                Ok(None)
            }
            Err(e) => Err(RegistryError::Unavailable(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_id_of_selector_matches_registry_abi() {
        assert_eq!(tokenIdOfCall::SIGNATURE, "tokenIdOf(address)");
        assert_eq!(hex::encode(tokenIdOfCall::SELECTOR), "773c02d4");
    }

    #[test]
    fn address_argument_is_left_padded() {
        let owner: EvmAddress = "0x2B09d47D550061f995A3b5C6F0Fd58005215D7c8".parse().unwrap();
        let data = token_id_of_call(&owner);
        assert_eq!(
            hex::encode(data),
            "773c02d4\
             0000000000000000000000002b09d47d550061f995a3b5c6f0fd58005215d7c8"
        );
    }

    #[test]
    fn decodes_uint256_token_ids() {
        let word = format!("0x{}{}", "00".repeat(31), "2a");
        assert_eq!(decode_token_id(&json!(word)), Ok(Some(CredentialToken::new("42"))));
        let max = format!("0x{}", "ff".repeat(32));
        assert_eq!(
            decode_token_id(&json!(max)),
            Ok(Some(CredentialToken::new(
                "115792089237316195423570985008687907853269984665640564039457584007913129639935"
            )))
        );
        assert_eq!(decode_token_id(&json!("0x")), Ok(None));
        assert!(decode_token_id(&json!("0x01")).is_err());
        assert!(decode_token_id(&json!(7)).is_err());
    }

    #[test]
    fn recognizes_revert_errors() {
        assert!(is_revert(3, "execution reverted: The wallet has not attested any SBT"));
        assert!(is_revert(-32000, "execution reverted"));
        assert!(!is_revert(-32005, "limit exceeded"));
    }
}
