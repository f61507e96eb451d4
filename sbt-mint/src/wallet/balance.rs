//! Balance aggregator.
//!
//! Fetches the public (ledger) and private (shielded) balances of the
//! connected account concurrently. Each side is independently fallible: a
//! failure on one side leaves it empty without holding up the other.
//! Refreshes only ever run while the private wallet is ready and idle.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{PrivateWallet, WalletState};
use crate::ledger::LedgerClient;
use crate::types::{AssetId, Balance, Balances, PublicKey};

pub struct BalanceAggregator {
    ledger: Arc<dyn LedgerClient>,
    wallet: Arc<dyn PrivateWallet>,
    account: PublicKey,
    network: String,
    asset_id: AssetId,
}

impl BalanceAggregator {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        wallet: Arc<dyn PrivateWallet>,
        account: PublicKey,
        network: impl Into<String>,
        asset_id: AssetId,
    ) -> Self {
        Self {
            ledger,
            wallet,
            account,
            network: network.into(),
            asset_id,
        }
    }

    /// Fetches both balances concurrently.
    pub async fn refresh(&self) -> Balances {
        let (public, private) = tokio::join!(self.fetch_public(), self.fetch_private());
        Balances { public, private }
    }

    /// Refreshes only when `state` is idle; `None` otherwise.
    pub async fn refresh_if_idle(&self, state: WalletState) -> Option<Balances> {
        if !state.is_idle() {
            debug!(
                ready = state.is_wallet_ready,
                busy = state.is_wallet_busy,
                "skipping balance refresh"
            );
            return None;
        }
        Some(self.refresh().await)
    }

    async fn fetch_public(&self) -> Option<Balance> {
        match self.ledger.free_balance(&self.account).await {
            Ok(balance) => balance,
            Err(e) => {
                warn!("public balance query failed: {e}");
                None
            }
        }
    }

    async fn fetch_private(&self) -> Option<Balance> {
        match self.wallet.zk_balance(&self.network, &self.asset_id).await {
            Ok(Some(raw)) => Balance::parse_raw(&raw),
            Ok(None) => None,
            Err(e) => {
                warn!("private balance query failed: {e}");
                None
            }
        }
    }

    /// Spawns a task that refreshes balances each time `states` transitions
    /// into the idle state, handing results to `on_update`.
    ///
    /// The task ends when the state channel closes; callers abort the
    /// returned handle on session teardown.
    pub fn spawn<F>(self, mut states: watch::Receiver<WalletState>, on_update: F) -> JoinHandle<()>
    where
        F: Fn(Balances) + Send + Sync + 'static,
    {
        tokio::spawn(async move {
            let mut was_idle = false;
            loop {
                let state = *states.borrow_and_update();
                let idle = state.is_idle();
                if idle && !was_idle {
                    if let Some(balances) = self.refresh_if_idle(state).await {
                        on_update(balances);
                    }
                }
                was_idle = idle;

                if states.changed().await.is_err() {
                    debug!("wallet state channel closed; stopping balance refresh");
                    break;
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use crate::ledger::{InclusionStream, LedgerError, NonceMode};
    use crate::types::{AssetIdRange, BlockHash, MintTransaction, RawProofBundle, SbtBuildRequest};
    use crate::wallet::{Unsubscribe, WalletError, WalletStateListener};

    struct FixedLedger {
        balance: Result<Option<Balance>, LedgerError>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LedgerClient for FixedLedger {
        async fn free_balance(&self, _: &PublicKey) -> Result<Option<Balance>, LedgerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.balance.clone()
        }

        async fn reserved_asset_range(&self, _: &PublicKey) -> Result<AssetIdRange, LedgerError> {
            Err(LedgerError::DecodeAbsent("unused".to_string()))
        }

        async fn genesis_hash(&self) -> Result<BlockHash, LedgerError> {
            Ok(BlockHash([0; 32]))
        }

        async fn submit_batch(
            &self,
            _: Vec<MintTransaction>,
            _: &str,
            _: NonceMode,
        ) -> Result<InclusionStream, LedgerError> {
            Err(LedgerError::Transport("unused".to_string()))
        }
    }

    struct FixedWallet {
        balance: Result<Option<String>, WalletError>,
    }

    #[async_trait]
    impl PrivateWallet for FixedWallet {
        async fn wallet_sync(&self) -> Result<(), WalletError> {
            Ok(())
        }

        async fn zk_balance(&self, _: &str, _: &AssetId) -> Result<Option<String>, WalletError> {
            self.balance.clone()
        }

        async fn multi_sbt_post_build(&self, _: &SbtBuildRequest) -> Result<RawProofBundle, WalletError> {
            Ok(RawProofBundle::default())
        }

        fn subscribe_wallet_state(&self, _: WalletStateListener) -> Unsubscribe {
            Unsubscribe::noop()
        }
    }

    fn aggregator(
        public: Result<Option<Balance>, LedgerError>,
        private: Result<Option<String>, WalletError>,
    ) -> (BalanceAggregator, Arc<FixedLedger>) {
        let ledger = Arc::new(FixedLedger {
            balance: public,
            calls: AtomicUsize::new(0),
        });
        let wallet = Arc::new(FixedWallet { balance: private });
        let agg = BalanceAggregator::new(
            ledger.clone(),
            wallet,
            PublicKey([1; 32]),
            "Calamari",
            AssetId::from(1u128),
        );
        (agg, ledger)
    }

    const IDLE: WalletState = WalletState {
        is_wallet_ready: true,
        is_wallet_busy: false,
    };

    #[tokio::test]
    async fn one_failing_side_does_not_block_the_other() {
        let (agg, _) = aggregator(
            Err(LedgerError::Transport("node down".to_string())),
            Ok(Some("2500000000000".to_string())),
        );
        let balances = agg.refresh().await;
        assert_eq!(balances.public, None);
        assert_eq!(balances.private_display(12), "2.5");
        assert_eq!(balances.public_display(12), "-");
    }

    #[tokio::test]
    async fn busy_or_unready_wallet_skips_refresh() {
        let (agg, ledger) = aggregator(Ok(Some(Balance::from_raw(1u32))), Ok(None));
        let busy = WalletState {
            is_wallet_ready: true,
            is_wallet_busy: true,
        };
        assert!(agg.refresh_if_idle(busy).await.is_none());
        assert!(agg.refresh_if_idle(WalletState::default()).await.is_none());
        assert_eq!(ledger.calls.load(Ordering::SeqCst), 0);

        assert!(agg.refresh_if_idle(IDLE).await.is_some());
        assert_eq!(ledger.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn background_task_refreshes_on_transition_to_idle() {
        let (agg, ledger) = aggregator(Ok(Some(Balance::from_raw(3_000_000_000_000u64))), Ok(None));
        let (tx, rx) = watch::channel(WalletState::default());
        let (updates_tx, mut updates_rx) = mpsc::unbounded_channel();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();

        let handle = agg.spawn(rx, move |balances| {
            seen_clone.lock().unwrap().push(balances.clone());
            let _ = updates_tx.send(());
        });

        tx.send_replace(IDLE);
        updates_rx.recv().await.expect("refresh after becoming idle");
        assert_eq!(seen.lock().unwrap()[0].public_display(12), "3");

        drop(tx);
        handle.await.expect("task exits when channel closes");
        assert_eq!(ledger.calls.load(Ordering::SeqCst), 1);
    }
}
