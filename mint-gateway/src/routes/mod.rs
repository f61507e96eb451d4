pub mod health;
pub mod metrics;
pub mod mint;
pub mod record;
pub mod session;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::SharedState;

/// Builds the gateway router over `state`.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/connect", post(session::connect))
        .route("/credential/connect", post(session::connect_credential))
        .route("/balances/refresh", post(session::refresh_balances))
        .route("/mint", post(mint::start_mint))
        .route("/status", get(mint::status))
        .route("/record", get(record::get_record))
        .route("/metrics", get(metrics::metrics))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::{Value, json};

    use sbt_mint::credential::{CredentialRegistry, CredentialWallet, EvmProvider, RegistryError};
    use sbt_mint::ledger::{LedgerClient, LedgerConnector, LedgerError};
    use sbt_mint::publisher::{ProofRecordPublisher, RecordStore, StoreError};
    use sbt_mint::wallet::{ExtrinsicSigner, InjectedWallet, WalletError, WalletExtension};
    use sbt_mint::{
        CredentialToken, EvmAddress, MetricsRegistry, MintConfig, MintContext, MintOrchestrator,
    };

    use crate::state::AppState;

    const ALICE: &str = "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY";
    const BOB: &str = "5FHneW46xGXgs5mUiveU4sbTyGBzmstUspZC92UhjJM694ty";

    struct NoExtension;

    #[async_trait]
    impl WalletExtension for NoExtension {
        async fn enable(&self, _: &str) -> Result<Arc<dyn InjectedWallet>, WalletError> {
            Err(WalletError::NotInstalled)
        }
    }

    struct NoLedger;

    #[async_trait]
    impl LedgerConnector for NoLedger {
        async fn connect(
            &self,
            _: &[String],
            _: Arc<dyn ExtrinsicSigner>,
        ) -> Result<Arc<dyn LedgerClient>, LedgerError> {
            Err(LedgerError::NoEndpoints)
        }
    }

    struct OfflineProvider;

    #[async_trait]
    impl EvmProvider for OfflineProvider {
        async fn request(&self, _: &str, _: Value) -> Result<Value, WalletError> {
            Err(WalletError::Transport("connection refused".to_string()))
        }
    }

    struct EmptyRegistry;

    #[async_trait]
    impl CredentialRegistry for EmptyRegistry {
        async fn token_id_of(&self, _: &EvmAddress) -> Result<Option<CredentialToken>, RegistryError> {
            Ok(None)
        }
    }

    #[derive(Default)]
    struct MemoryStore(Mutex<HashMap<String, Vec<u8>>>);

    #[async_trait]
    impl RecordStore for MemoryStore {
        async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StoreError> {
            self.0.lock().unwrap().insert(key.to_string(), body);
            Ok(())
        }

        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
            Ok(self.0.lock().unwrap().get(key).cloned())
        }
    }

    fn server(store: Arc<MemoryStore>) -> TestServer {
        let cfg = MintConfig::default();
        let metrics = Arc::new(MetricsRegistry::new().unwrap());
        let ctx = MintContext {
            extension: Arc::new(NoExtension),
            ledger: Arc::new(NoLedger),
            credential: Arc::new(CredentialWallet::new(
                Arc::new(OfflineProvider),
                Arc::new(EmptyRegistry),
            )),
            publisher: Arc::new(ProofRecordPublisher::new(store, cfg.records.prefix.clone())),
            metrics: metrics.clone(),
        };
        let state = Arc::new(AppState {
            orchestrator: Arc::new(MintOrchestrator::new(ctx, cfg)),
            metrics,
        });
        TestServer::new(router(state)).unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let server = server(Arc::default());
        let response = server.get("/health").await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>(), json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn initial_status_is_disconnected() {
        let server = server(Arc::default());
        let status = server.get("/status").await.json::<Value>();
        assert_eq!(status["phase"], "disconnected");
        assert_eq!(status["eligible"], false);
        assert_eq!(status["balances"]["public"], "-");
    }

    #[tokio::test]
    async fn mint_without_session_is_conflict() {
        let server = server(Arc::default());
        let response = server.post("/mint").await;
        assert_eq!(response.status_code(), StatusCode::CONFLICT);

        let body = response.json::<Value>();
        assert_eq!(body["kind"], "precondition_unmet");
        assert_eq!(body["precondition"], "not_connected");
        assert_eq!(body["message"], "connect both wallets first");
    }

    #[tokio::test]
    async fn connect_without_extension_reports_precondition() {
        let server = server(Arc::default());
        let response = server
            .post("/connect")
            .add_query_param("address", ALICE)
            .await;
        assert_eq!(response.status_code(), StatusCode::CONFLICT);
        assert_eq!(response.json::<Value>()["precondition"], "no_wallet_extension");

        let status = server.get("/status").await.json::<Value>();
        assert_eq!(status["phase"], "failed");
    }

    #[tokio::test]
    async fn connect_requires_address() {
        let server = server(Arc::default());
        let response = server.post("/connect").await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn offline_evm_wallet_is_bad_gateway() {
        let server = server(Arc::default());
        let response = server.post("/credential/connect").await;
        assert_eq!(response.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(response.json::<Value>()["kind"], "remote_unavailable");
    }

    #[tokio::test]
    async fn record_lookup_serves_stored_record() {
        let store = Arc::new(MemoryStore::default());
        let record = json!({
            "address": "dmyjURuBeJwFo4Nvf2GZ8f5E2Asz98JY2d7UcaDykqYm1zpoi",
            "token_type": "zkBAB",
            "proof_info": [{
                "proof_id": "0x0707",
                "blur_url": "https://example.invalid/front.jpg",
                "asset_id": "5",
                "transaction_data": { "ToPrivate": [] },
            }],
        });
        store
            .0
            .lock()
            .unwrap()
            .insert(format!("kyc/{ALICE}"), serde_json::to_vec(&record).unwrap());
        let server = server(store);

        let found = server.get("/record").add_query_param("address", ALICE).await;
        found.assert_status_ok();
        assert_eq!(found.json::<Value>(), record);

        let missing = server.get("/record").add_query_param("address", BOB).await;
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(missing.json::<Value>()["kind"], "not_found");
    }

    #[tokio::test]
    async fn record_lookup_rejects_non_account_keys() {
        let store = Arc::new(MemoryStore::default());
        store
            .0
            .lock()
            .unwrap()
            .insert("secret".to_string(), b"{}".to_vec());
        let server = server(store);

        for address in ["../secret", "kyc/../../secret", "alice"] {
            let response = server.get("/record").add_query_param("address", address).await;
            assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
            assert_eq!(response.json::<Value>()["kind"], "bad_request");
        }
    }

    #[tokio::test]
    async fn metrics_are_exposed() {
        let server = server(Arc::default());
        server.post("/mint").await;
        let text = server.get("/metrics").await.text();
        assert!(text.contains("sbt_mint_attempts_total 0"));
    }
}
