//! JSON-RPC bridge to the privacy-ledger wallet extension.
//!
//! The extension itself lives in the user's browser; a small companion
//! bridge relays its API over HTTP JSON-RPC:
//!
//! | method                             | params                              |
//! |------------------------------------|-------------------------------------|
//! | `enable`                           | `[appName]`                         |
//! | `accounts_get`                     | `[]`                                |
//! | `signer_signRaw`                   | `[{address, data, type}]`           |
//! | `signer_signExtrinsic`             | `[{address, nonce, calls}]`         |
//! | `privateWallet_walletSync`         | `[]`                                |
//! | `privateWallet_getZkBalance`       | `[{network, assetId}]`              |
//! | `privateWallet_multiSbtPostBuild`  | `[{sbtInfoList, network}]`          |
//! | `privateWallet_getWalletState`     | `[]`                                |
//!
//! The bridge has no push channel, so wallet-state notifications are
//! produced by polling `privateWallet_getWalletState` and forwarding
//! changes to the subscriber.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use super::{
    BatchSigningRequest, ExtrinsicSigner, InjectedWallet, PrivateWallet, RawPayload, RawSigner,
    Unsubscribe, WalletError, WalletExtension, WalletState, WalletStateListener,
};
use crate::config::WalletConfig;
use crate::jsonrpc::{JsonRpcError, JsonRpcHttpClient};
use crate::types::{
    AssetId, InjectedAccount, RawProofBundle, SbtBuildRequest, Sr25519Signature, from_prefixed_hex,
};

/// [`WalletExtension`] backed by the JSON-RPC bridge.
pub struct BridgeWalletExtension {
    client: Arc<JsonRpcHttpClient>,
    poll_interval: Duration,
}

impl BridgeWalletExtension {
    pub fn new(cfg: &WalletConfig) -> Result<Self, WalletError> {
        let client = JsonRpcHttpClient::new(cfg.bridge_url.clone(), cfg.request_timeout)?;
        Ok(Self {
            client: Arc::new(client),
            poll_interval: cfg.state_poll_interval,
        })
    }
}

#[async_trait]
impl WalletExtension for BridgeWalletExtension {
    async fn enable(&self, app_name: &str) -> Result<Arc<dyn InjectedWallet>, WalletError> {
        match self.client.call_value("enable", json!([app_name])).await {
            Ok(_) => {}
            // An unreachable bridge means there is no extension to talk to.
            Err(JsonRpcError::Transport(msg)) => {
                debug!("wallet bridge unreachable at {}: {msg}", self.client.url());
                return Err(WalletError::NotInstalled);
            }
            Err(e) => return Err(e.into()),
        }
        info!(app = app_name, "wallet extension enabled");

        Ok(Arc::new(BridgeInjectedWallet {
            session: Arc::new(BridgeSession {
                client: self.client.clone(),
                poll_interval: self.poll_interval,
            }),
        }))
    }
}

/// Enabled extension handle.
pub struct BridgeInjectedWallet {
    session: Arc<BridgeSession>,
}

struct BridgeSession {
    client: Arc<JsonRpcHttpClient>,
    poll_interval: Duration,
}

#[derive(Debug, Deserialize)]
struct SignRawResult {
    signature: String,
}

#[async_trait]
impl InjectedWallet for BridgeInjectedWallet {
    async fn accounts(&self) -> Result<Vec<InjectedAccount>, WalletError> {
        Ok(self.session.client.call("accounts_get", json!([])).await?)
    }

    fn raw_signer(&self) -> Arc<dyn RawSigner> {
        self.session.clone()
    }

    fn extrinsic_signer(&self) -> Arc<dyn ExtrinsicSigner> {
        self.session.clone()
    }

    fn private_wallet(&self) -> Arc<dyn PrivateWallet> {
        self.session.clone()
    }
}

#[async_trait]
impl RawSigner for BridgeSession {
    async fn sign_raw(&self, payload: &RawPayload) -> Result<Sr25519Signature, WalletError> {
        let result: SignRawResult = self.client.call("signer_signRaw", json!([payload])).await?;
        Sr25519Signature::from_hex(&result.signature)
            .ok_or_else(|| WalletError::Protocol("signature is not valid hex".to_string()))
    }
}

#[async_trait]
impl ExtrinsicSigner for BridgeSession {
    async fn sign_batch(&self, request: &BatchSigningRequest<'_>) -> Result<Vec<u8>, WalletError> {
        let encoded: String = self
            .client
            .call("signer_signExtrinsic", json!([request]))
            .await?;
        from_prefixed_hex(&encoded)
            .map_err(|e| WalletError::Protocol(format!("signed extrinsic is not valid hex: {e}")))
    }
}

#[async_trait]
impl PrivateWallet for BridgeSession {
    async fn wallet_sync(&self) -> Result<(), WalletError> {
        self.client
            .call_value("privateWallet_walletSync", json!([]))
            .await?;
        Ok(())
    }

    async fn zk_balance(&self, network: &str, asset_id: &AssetId) -> Result<Option<String>, WalletError> {
        let value = self
            .client
            .call_value(
                "privateWallet_getZkBalance",
                json!([{ "network": network, "assetId": asset_id }]),
            )
            .await?;
        Ok(match value {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }

    async fn multi_sbt_post_build(&self, request: &SbtBuildRequest) -> Result<RawProofBundle, WalletError> {
        Ok(self
            .client
            .call("privateWallet_multiSbtPostBuild", json!([request]))
            .await?)
    }

    fn subscribe_wallet_state(&self, listener: WalletStateListener) -> Unsubscribe {
        let client = self.client.clone();
        let interval = self.poll_interval;

        let handle = tokio::spawn(async move {
            let mut last: Option<WalletState> = None;
            loop {
                match client
                    .call::<WalletState>("privateWallet_getWalletState", json!([]))
                    .await
                {
                    Ok(state) if last != Some(state) => {
                        last = Some(state);
                        listener(state);
                    }
                    Ok(_) => {}
                    Err(e) => debug!("wallet state poll failed: {e}"),
                }
                tokio::time::sleep(interval).await;
            }
        });

        Unsubscribe::new(move || handle.abort())
    }
}
