//! EVM credential wallet adapter.
//!
//! Two collaborators sit behind this module:
//!
//! - an [`EvmProvider`]: the user's EVM wallet, reached through
//!   EIP-1193-style `request(method, params)` calls. It owns account
//!   permissions and typed-data signing.
//! - a [`CredentialRegistry`]: read-only view of the account-bound token
//!   registry contract, queried through a public RPC endpoint.
//!
//! [`CredentialWallet`] combines them into the three operations the
//! orchestrator needs. HTTP implementations of both traits live in
//! [`http`].

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, info};

use crate::types::{CredentialToken, EvmAddress, EvmSignature};
use crate::wallet::WalletError;

pub mod http;
pub mod typed_data;

pub use http::{HttpCredentialRegistry, HttpEvmProvider};
pub use typed_data::{TypedData, TypedDataField};

/// Errors from the credential registry.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("credential registry unavailable: {0}")]
    Unavailable(String),
    #[error("unexpected credential registry response: {0}")]
    Decode(String),
}

/// EIP-1193-style EVM wallet provider.
#[async_trait]
pub trait EvmProvider: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value, WalletError>;
}

/// Account-bound credential registry.
#[async_trait]
pub trait CredentialRegistry: Send + Sync {
    /// Token id bound to `owner`, `None` when the registry has none.
    async fn token_id_of(&self, owner: &EvmAddress) -> Result<Option<CredentialToken>, RegistryError>;
}

pub struct CredentialWallet {
    provider: Arc<dyn EvmProvider>,
    registry: Arc<dyn CredentialRegistry>,
}

impl CredentialWallet {
    pub fn new(provider: Arc<dyn EvmProvider>, registry: Arc<dyn CredentialRegistry>) -> Self {
        Self { provider, registry }
    }

    /// Connects the EVM wallet and returns its first account.
    ///
    /// Permissions are requested first so the user is always prompted to
    /// pick an account instead of silently reusing a cached one. `Ok(None)`
    /// when the wallet exposes no accounts.
    pub async fn connect(&self) -> Result<Option<EvmAddress>, WalletError> {
        self.provider
            .request("wallet_requestPermissions", json!([{ "eth_accounts": {} }]))
            .await?;

        let accounts = self.provider.request("eth_requestAccounts", json!([])).await?;
        let accounts: Vec<String> = serde_json::from_value(accounts)
            .map_err(|e| WalletError::Protocol(format!("eth_requestAccounts: {e}")))?;

        let Some(first) = accounts.first() else {
            debug!("EVM wallet returned no accounts");
            return Ok(None);
        };
        let address: EvmAddress = first
            .parse()
            .map_err(|e| WalletError::Protocol(format!("eth_requestAccounts: {e}")))?;
        info!(%address, "EVM wallet connected");
        Ok(Some(address))
    }

    pub async fn fetch_credential_token(
        &self,
        owner: &EvmAddress,
    ) -> Result<Option<CredentialToken>, RegistryError> {
        let token = self.registry.token_id_of(owner).await?;
        debug!(%owner, token = ?token.as_ref().map(CredentialToken::as_str), "credential lookup");
        Ok(token)
    }

    /// Requests an `eth_signTypedData_v4` signature from `signer`.
    pub async fn sign_typed_data(
        &self,
        signer: &EvmAddress,
        typed_data: &TypedData,
    ) -> Result<EvmSignature, WalletError> {
        let payload = typed_data
            .to_json_string()
            .map_err(|e| WalletError::Protocol(format!("typed data encoding failed: {e}")))?;
        debug!(%signer, digest = %typed_data.signing_hash(), "requesting typed-data signature");

        let signature = self
            .provider
            .request("eth_signTypedData_v4", json!([signer.to_string(), payload]))
            .await?;

        signature
            .as_str()
            .and_then(EvmSignature::from_hex)
            .ok_or_else(|| WalletError::Protocol(format!("unexpected signature {signature}")))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use crate::types::{BlockHash, ProofBytes};

    /// Provider that answers from a method → result table and records calls.
    #[derive(Default)]
    pub(crate) struct ScriptedProvider {
        pub(crate) replies: Mutex<HashMap<String, Result<Value, WalletError>>>,
        pub(crate) calls: Mutex<Vec<(String, Value)>>,
    }

    impl ScriptedProvider {
        pub(crate) fn reply(self, method: &str, result: Result<Value, WalletError>) -> Self {
            self.replies.lock().unwrap().insert(method.to_string(), result);
            self
        }

        pub(crate) fn methods(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|(m, _)| m.clone()).collect()
        }
    }

    #[async_trait]
    impl EvmProvider for ScriptedProvider {
        async fn request(&self, method: &str, params: Value) -> Result<Value, WalletError> {
            self.calls.lock().unwrap().push((method.to_string(), params));
            self.replies
                .lock()
                .unwrap()
                .get(method)
                .cloned()
                .unwrap_or(Ok(Value::Null))
        }
    }

    pub(crate) struct FixedRegistry(pub(crate) Option<CredentialToken>);

    #[async_trait]
    impl CredentialRegistry for FixedRegistry {
        async fn token_id_of(&self, _: &EvmAddress) -> Result<Option<CredentialToken>, RegistryError> {
            Ok(self.0.clone())
        }
    }

    const EVM: &str = "0x1111111111111111111111111111111111111111";

    fn wallet(provider: ScriptedProvider) -> (CredentialWallet, Arc<ScriptedProvider>) {
        let provider = Arc::new(provider);
        let wallet = CredentialWallet::new(provider.clone(), Arc::new(FixedRegistry(None)));
        (wallet, provider)
    }

    #[tokio::test]
    async fn connect_requests_permissions_before_accounts() {
        let (wallet, provider) = wallet(
            ScriptedProvider::default().reply("eth_requestAccounts", Ok(json!([EVM, "0x2222222222222222222222222222222222222222"]))),
        );
        let address = wallet.connect().await.unwrap();
        assert_eq!(address, Some(EVM.parse().unwrap()));
        assert_eq!(provider.methods(), vec!["wallet_requestPermissions", "eth_requestAccounts"]);
    }

    #[tokio::test]
    async fn connect_with_no_accounts_is_none() {
        let (wallet, _) = wallet(ScriptedProvider::default().reply("eth_requestAccounts", Ok(json!([]))));
        assert_eq!(wallet.connect().await.unwrap(), None);
    }

    #[tokio::test]
    async fn rejected_permissions_surface_as_user_rejection() {
        let (wallet, provider) = wallet(
            ScriptedProvider::default().reply("wallet_requestPermissions", Err(WalletError::UserRejected)),
        );
        assert_eq!(wallet.connect().await, Err(WalletError::UserRejected));
        assert_eq!(provider.methods(), vec!["wallet_requestPermissions"]);
    }

    #[tokio::test]
    async fn sign_typed_data_sends_address_and_json_payload() {
        let (wallet, provider) = wallet(
            ScriptedProvider::default().reply("eth_signTypedData_v4", Ok(json!("0xdeadbeef"))),
        );
        let signer: EvmAddress = EVM.parse().unwrap();
        let typed = TypedData::proof_claim(&BlockHash([1; 32]), &ProofBytes(vec![9]));

        let sig = wallet.sign_typed_data(&signer, &typed).await.unwrap();
        assert_eq!(sig, EvmSignature(vec![0xde, 0xad, 0xbe, 0xef]));

        let calls = provider.calls.lock().unwrap();
        let (_, params) = &calls[0];
        assert_eq!(params[0], EVM);
        let payload: Value = serde_json::from_str(params[1].as_str().unwrap()).unwrap();
        assert_eq!(payload["message"]["proof"], "0x09");
    }
}
