//! Private-wallet state monitor.
//!
//! Re-publishes the extension's push notifications through a
//! `tokio::sync::watch` channel: the monitor is the single writer, the
//! orchestrator and the balance aggregator are readers. The extension's
//! unsubscribe handle is released exactly once, on [`WalletStateMonitor::shutdown`]
//! or drop, so subscriptions never leak across reconnects.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use super::{PrivateWallet, Unsubscribe, WalletState, WalletStateListener};

#[derive(Debug)]
pub struct WalletStateMonitor {
    state: watch::Receiver<WalletState>,
    unsubscribe: Unsubscribe,
}

impl WalletStateMonitor {
    /// Subscribes to `wallet` and starts republishing its state.
    pub fn subscribe_to(wallet: &dyn PrivateWallet) -> Self {
        let (tx, rx) = watch::channel(WalletState::default());
        let listener: WalletStateListener = Arc::new(move |state: WalletState| {
            debug!(
                ready = state.is_wallet_ready,
                busy = state.is_wallet_busy,
                "private wallet state changed"
            );
            tx.send_replace(state);
        });
        let unsubscribe = wallet.subscribe_wallet_state(listener);

        Self {
            state: rx,
            unsubscribe,
        }
    }

    /// Latest published snapshot.
    pub fn current(&self) -> WalletState {
        *self.state.borrow()
    }

    /// New reader of the state channel.
    pub fn subscribe(&self) -> watch::Receiver<WalletState> {
        self.state.clone()
    }

    /// Releases the extension subscription.
    pub fn shutdown(&mut self) {
        if self.unsubscribe.is_active() {
            debug!("unsubscribing from private wallet state");
            self.unsubscribe.call();
        }
    }
}

impl Drop for WalletStateMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}
