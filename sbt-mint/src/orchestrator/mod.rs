//! Identity-binding mint orchestrator.
//!
//! Drives one user session through
//!
//! ```text
//! Disconnected → LedgerConnected → CredentialConnected → Ready{eligible}
//!   → Minting{Syncing | RangeQuerying | ProofBuilding | Signing(i/n) | Submitting | AwaitingInclusion}
//!   → Minted | Failed
//! ```
//!
//! Collaborators arrive through [`MintContext`]; nothing is read from
//! ambient globals. Each transition publishes an [`OrchestratorStatus`]
//! on a `watch` channel.
//!
//! Concurrency rules:
//!
//! - at most one mint runs at a time; the flag is set under the state lock,
//! - `connect` / `connect_credential` are rejected while a mint runs,
//! - connect actions are serialized with each other and with mint start.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Instant;

use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::MintConfig;
use crate::credential::{CredentialWallet, TypedData};
use crate::ledger::{InclusionEvent, LedgerClient, LedgerConnector, NonceMode};
use crate::matcher::find_matching_account;
use crate::metrics::MetricsRegistry;
use crate::publisher::ProofRecordPublisher;
use crate::types::{
    AssetIdRange, Balances, BlockHash, CredentialToken, EvmAddress, IdentitySession,
    MintTransaction, ProofBundle, ProofInfo, ProofRecord, SbtBuildRequest, SignatureBinding,
    to_prefixed_hex,
};
use crate::wallet::{
    BalanceAggregator, PrivateWallet, RawPayload, RawSigner, WalletError, WalletExtension,
    WalletStateMonitor,
};

pub mod error;
pub mod state;


pub use error::{
    DECLINED_EVM_CONNECT, DECLINED_LEDGER_CONNECT, DECLINED_SIGNATURE, MintError, Precondition,
};
pub use state::{BalanceView, ErrorView, MintPhase, MintStep, OrchestratorStatus};

/// Collaborators of the orchestrator.
#[derive(Clone)]
pub struct MintContext {
    pub extension: Arc<dyn WalletExtension>,
    pub ledger: Arc<dyn LedgerConnector>,
    pub credential: Arc<CredentialWallet>,
    pub publisher: Arc<ProofRecordPublisher>,
    pub metrics: Arc<MetricsRegistry>,
}

/// Live privacy-wallet session. Dropping it releases the wallet-state
/// subscription and stops the balance refresh task.
struct Session {
    identity: IdentitySession,
    raw_signer: Arc<dyn RawSigner>,
    private_wallet: Arc<dyn PrivateWallet>,
    ledger: Arc<dyn LedgerClient>,
    monitor: WalletStateMonitor,
    balance_task: JoinHandle<()>,
}

impl Drop for Session {
    fn drop(&mut self) {
        debug!(address = %self.identity.address, "tearing down wallet session");
        self.balance_task.abort();
        self.monitor.shutdown();
    }
}

#[derive(Clone, Debug)]
enum Activity {
    Idle,
    Minting(MintStep),
    Minted(BlockHash),
    Failed,
}

struct Inner {
    activity: Activity,
    session: Option<Session>,
    evm_address: Option<EvmAddress>,
    credential: Option<CredentialToken>,
    balances: Balances,
    last_error: Option<MintError>,
    last_record: Option<ProofRecord>,
    /// Bumped on every session teardown; balance results carry the
    /// generation they were fetched under.
    generation: u64,
}

impl Inner {
    fn new() -> Self {
        Self {
            activity: Activity::Idle,
            session: None,
            evm_address: None,
            credential: None,
            balances: Balances::default(),
            last_error: None,
            last_record: None,
            generation: 0,
        }
    }

    /// Stores balances fetched under `generation`, dropping stale results.
    fn apply_balances(&mut self, generation: u64, balances: Balances) -> bool {
        if self.generation != generation || self.session.is_none() {
            return false;
        }
        self.balances = balances;
        true
    }

    fn is_minting(&self) -> bool {
        matches!(self.activity, Activity::Minting(_))
    }

    fn ensure_not_minting(&self) -> Result<(), MintError> {
        if self.is_minting() {
            return Err(Precondition::MintInProgress.into());
        }
        Ok(())
    }

    /// Credential present and a strictly positive whole-unit public balance.
    fn eligible(&self, decimals: u32) -> bool {
        self.credential.is_some() && self.balances.has_positive_public_units(decimals)
    }

    fn phase(&self, decimals: u32) -> MintPhase {
        match &self.activity {
            Activity::Minting(step) => MintPhase::Minting { step: *step },
            Activity::Minted(block) => MintPhase::Minted { block: *block },
            Activity::Failed => match &self.last_error {
                Some(err) => MintPhase::Failed {
                    kind: err.kind().to_string(),
                    message: err.to_string(),
                },
                None => self.idle_phase(decimals),
            },
            Activity::Idle => self.idle_phase(decimals),
        }
    }

    fn idle_phase(&self, decimals: u32) -> MintPhase {
        match (self.session.is_some(), self.evm_address.is_some()) {
            (false, false) => MintPhase::Disconnected,
            (true, false) => MintPhase::LedgerConnected,
            // Eligibility needs the public balance, which only a ledger
            // session provides.
            (true, true) if self.balances.public.is_some() => MintPhase::Ready {
                eligible: self.eligible(decimals),
            },
            _ => MintPhase::CredentialConnected,
        }
    }

    fn fail(&mut self, err: MintError) {
        self.activity = Activity::Failed;
        self.last_error = Some(err);
    }

    fn snapshot(&self, decimals: u32) -> OrchestratorStatus {
        OrchestratorStatus {
            phase: self.phase(decimals),
            session: self.session.as_ref().map(|s| s.identity.clone()),
            evm_address: self.evm_address,
            credential: self.credential.clone(),
            balances: BalanceView {
                public: self.balances.public_display(decimals),
                private: self.balances.private_display(decimals),
            },
            eligible: self.eligible(decimals),
            last_error: self.last_error.as_ref().map(ErrorView::from),
            record: self.last_record.clone(),
        }
    }
}

struct Shared {
    inner: Mutex<Inner>,
    status: watch::Sender<OrchestratorStatus>,
    decimals: u32,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mutates the state and publishes the resulting snapshot.
    fn update<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        let mut inner = self.lock();
        let out = f(&mut inner);
        self.status.send_replace(inner.snapshot(self.decimals));
        out
    }

    fn set_step(&self, step: MintStep) {
        self.update(|inner| inner.activity = Activity::Minting(step));
    }
}

/// Resets a mint that is abandoned before it reports an outcome.
struct MintGuard {
    shared: Arc<Shared>,
    armed: bool,
}

impl MintGuard {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for MintGuard {
    fn drop(&mut self) {
        if self.armed {
            warn!("mint abandoned before completion");
            self.shared.update(|inner| {
                if inner.is_minting() {
                    inner.fail(MintError::RemoteUnavailable("mint was cancelled".to_string()));
                }
            });
        }
    }
}

/// Inputs captured when a mint starts; later session changes do not
/// affect an attempt in flight.
struct MintAttempt {
    identity: IdentitySession,
    raw_signer: Arc<dyn RawSigner>,
    private_wallet: Arc<dyn PrivateWallet>,
    ledger: Arc<dyn LedgerClient>,
    evm_address: EvmAddress,
    credential: CredentialToken,
    started: Instant,
    guard: MintGuard,
}

pub struct MintOrchestrator {
    ctx: MintContext,
    cfg: MintConfig,
    shared: Arc<Shared>,
    actions: tokio::sync::Mutex<()>,
}

impl MintOrchestrator {
    pub fn new(ctx: MintContext, cfg: MintConfig) -> Self {
        let decimals = cfg.ledger.decimals;
        let inner = Inner::new();
        let (status, _) = watch::channel(inner.snapshot(decimals));
        Self {
            ctx,
            cfg,
            shared: Arc::new(Shared {
                inner: Mutex::new(inner),
                status,
                decimals,
            }),
            actions: tokio::sync::Mutex::new(()),
        }
    }

    pub fn config(&self) -> &MintConfig {
        &self.cfg
    }

    /// Latest status snapshot.
    pub fn status(&self) -> OrchestratorStatus {
        self.shared.status.borrow().clone()
    }

    /// Receiver that observes every status transition.
    pub fn watch_status(&self) -> watch::Receiver<OrchestratorStatus> {
        self.shared.status.subscribe()
    }

    pub fn publisher(&self) -> &ProofRecordPublisher {
        &self.ctx.publisher
    }

    // ---------------------------
    // Privacy wallet
    // ---------------------------

    /// Connects the privacy wallet account that matches `expected`.
    ///
    /// Any previous session is torn down first. On failure the state moves
    /// to `Failed` and no session exists.
    pub async fn connect(&self, expected: &str) -> Result<IdentitySession, MintError> {
        let _actions = self.actions.lock().await;

        let (previous, generation) = self.shared.update(|inner| -> Result<_, MintError> {
            inner.ensure_not_minting()?;
            inner.generation += 1;
            inner.activity = Activity::Idle;
            inner.balances = Balances::default();
            inner.last_error = None;
            inner.last_record = None;
            Ok((inner.session.take(), inner.generation))
        })?;
        drop(previous);

        match self.open_session(expected, generation).await {
            Ok(session) => {
                let identity = session.identity.clone();
                info!(
                    address = %identity.address,
                    zk_address = identity.zk_address.as_deref().unwrap_or("-"),
                    "privacy wallet connected"
                );
                self.shared.update(|inner| inner.session = Some(session));
                Ok(identity)
            }
            Err(err) => {
                warn!(expected, "privacy wallet connect failed: {err}");
                self.shared.update(|inner| inner.fail(err.clone()));
                Err(err)
            }
        }
    }

    async fn open_session(&self, expected: &str, generation: u64) -> Result<Session, MintError> {
        let injected = self
            .ctx
            .extension
            .enable(&self.cfg.wallet.app_name)
            .await
            .map_err(|e| MintError::from_wallet(e, DECLINED_LEDGER_CONNECT))?;

        let accounts = injected
            .accounts()
            .await
            .map_err(|e| MintError::from_wallet(e, DECLINED_LEDGER_CONNECT))?;
        if accounts.is_empty() {
            return Err(Precondition::NoAccounts.into());
        }
        let matched =
            find_matching_account(&accounts, expected).ok_or(Precondition::AccountMismatch)?;

        let ledger = self
            .ctx
            .ledger
            .connect(&self.cfg.ledger.rpc_endpoints, injected.extrinsic_signer())
            .await?;

        let identity = IdentitySession {
            address: matched.account.address,
            zk_address: matched.account.zk_address,
            public_key: matched.public_key,
            expected_address: expected.to_string(),
        };

        let private_wallet = injected.private_wallet();
        let monitor = WalletStateMonitor::subscribe_to(private_wallet.as_ref());
        let aggregator = BalanceAggregator::new(
            ledger.clone(),
            private_wallet.clone(),
            identity.public_key,
            self.cfg.ledger.network.clone(),
            self.cfg.ledger.asset_id.clone(),
        );
        let shared: Weak<Shared> = Arc::downgrade(&self.shared);
        let balance_task = aggregator.spawn(monitor.subscribe(), move |balances| {
            if let Some(shared) = shared.upgrade() {
                shared.update(|inner| inner.apply_balances(generation, balances));
            }
        });

        Ok(Session {
            identity,
            raw_signer: injected.raw_signer(),
            private_wallet,
            ledger,
            monitor,
            balance_task,
        })
    }

    /// Refreshes both balances now, if the private wallet is idle.
    ///
    /// Returns `None` when the wallet is busy or not ready, or when the
    /// session was replaced while the balances were being fetched.
    pub async fn refresh_balances(&self) -> Result<Option<Balances>, MintError> {
        let (aggregator, state, generation) = {
            let inner = self.shared.lock();
            let session = inner.session.as_ref().ok_or(Precondition::NotConnected)?;
            let aggregator = BalanceAggregator::new(
                session.ledger.clone(),
                session.private_wallet.clone(),
                session.identity.public_key,
                self.cfg.ledger.network.clone(),
                self.cfg.ledger.asset_id.clone(),
            );
            (aggregator, session.monitor.current(), inner.generation)
        };

        let Some(balances) = aggregator.refresh_if_idle(state).await else {
            return Ok(None);
        };
        if !self
            .shared
            .update(|inner| inner.apply_balances(generation, balances.clone()))
        {
            debug!("session changed during balance refresh; discarding result");
            return Ok(None);
        }
        Ok(Some(balances))
    }

    // ---------------------------
    // Credential wallet
    // ---------------------------

    /// Connects the EVM wallet and looks up its credential token.
    ///
    /// A missing token is a valid outcome. The token is only re-fetched
    /// when the connected EVM address changes.
    pub async fn connect_credential(&self) -> Result<Option<CredentialToken>, MintError> {
        let _actions = self.actions.lock().await;
        self.shared.lock().ensure_not_minting()?;

        match self.resolve_credential().await {
            Ok((address, token)) => {
                info!(%address, token = ?token.as_ref().map(CredentialToken::as_str), "credential wallet connected");
                self.shared.update(|inner| {
                    inner.evm_address = Some(address);
                    inner.credential = token.clone();
                    inner.activity = Activity::Idle;
                    inner.last_error = None;
                });
                Ok(token)
            }
            Err(err) => {
                warn!("credential wallet connect failed: {err}");
                self.shared.update(|inner| inner.fail(err.clone()));
                Err(err)
            }
        }
    }

    async fn resolve_credential(&self) -> Result<(EvmAddress, Option<CredentialToken>), MintError> {
        let address = self
            .ctx
            .credential
            .connect()
            .await
            .map_err(|e| match e {
                WalletError::NotInstalled => MintError::from(Precondition::NoEvmWallet),
                other => MintError::from_wallet(other, DECLINED_EVM_CONNECT),
            })?
            .ok_or(Precondition::NoEvmAccount)?;

        let known = {
            let inner = self.shared.lock();
            (inner.evm_address == Some(address)).then(|| inner.credential.clone())
        };
        let token = match known {
            Some(token) => token,
            None => self.ctx.credential.fetch_credential_token(&address).await?,
        };
        Ok((address, token))
    }

    // ---------------------------
    // Mint
    // ---------------------------

    /// Runs one complete mint attempt and returns the published record.
    pub async fn mint(&self) -> Result<ProofRecord, MintError> {
        let attempt = self.begin_mint().await?;
        self.run_attempt(attempt).await
    }

    /// Checks preconditions and starts the mint on its own task, so the
    /// caller going away never cancels a mint in flight.
    pub async fn start_mint(self: &Arc<Self>) -> Result<JoinHandle<Result<ProofRecord, MintError>>, MintError> {
        let attempt = self.begin_mint().await?;
        let this = self.clone();
        Ok(tokio::spawn(async move { this.run_attempt(attempt).await }))
    }

    async fn begin_mint(&self) -> Result<MintAttempt, MintError> {
        let _actions = self.actions.lock().await;
        let decimals = self.cfg.ledger.decimals;

        let attempt = self.shared.update(|inner| -> Result<MintAttempt, MintError> {
            inner.ensure_not_minting()?;
            let session = inner.session.as_ref().ok_or(Precondition::NotConnected)?;
            let evm_address = inner.evm_address.ok_or(Precondition::NotConnected)?;
            let credential = inner.credential.clone().ok_or(Precondition::NoCredential)?;
            if !inner.balances.has_positive_public_units(decimals) {
                return Err(MintError::from(Precondition::ZeroBalance));
            }

            let attempt = MintAttempt {
                identity: session.identity.clone(),
                raw_signer: session.raw_signer.clone(),
                private_wallet: session.private_wallet.clone(),
                ledger: session.ledger.clone(),
                evm_address,
                credential,
                started: Instant::now(),
                guard: MintGuard {
                    shared: self.shared.clone(),
                    armed: true,
                },
            };
            inner.activity = Activity::Minting(MintStep::Syncing);
            inner.last_error = None;
            inner.last_record = None;
            Ok(attempt)
        })?;

        self.ctx.metrics.mint.attempts.inc();
        info!(address = %attempt.identity.address, "mint started");
        Ok(attempt)
    }

    async fn run_attempt(&self, mut attempt: MintAttempt) -> Result<ProofRecord, MintError> {
        let outcome = self.execute(&attempt).await;
        attempt.guard.disarm();

        match outcome {
            Ok((record, block)) => {
                let elapsed = attempt.started.elapsed().as_secs_f64();
                self.ctx.metrics.mint.completed.inc();
                self.ctx.metrics.mint.mint_seconds.observe(elapsed);
                info!(block = %block.to_hex(), elapsed, "mint included");
                self.shared.update(|inner| {
                    inner.activity = Activity::Minted(block);
                    inner.last_record = Some(record.clone());
                });
                Ok(record)
            }
            Err(err) => {
                self.ctx.metrics.mint.record_failure(err.kind());
                warn!(kind = err.kind(), "mint failed: {err}");
                self.shared.update(|inner| inner.fail(err.clone()));
                Err(err)
            }
        }
    }

    /// Runs `fut` as mint step `step`, recording its duration.
    async fn step<T>(&self, step: MintStep, fut: impl Future<Output = T>) -> T {
        self.shared.set_step(step);
        debug!(%step, "mint step");
        let started = Instant::now();
        let out = fut.await;
        self.ctx
            .metrics
            .mint
            .observe_phase(step.label(), started.elapsed().as_secs_f64());
        out
    }

    async fn execute(&self, attempt: &MintAttempt) -> Result<(ProofRecord, BlockHash), MintError> {
        let network = self.cfg.ledger.network.as_str();

        self.step(MintStep::Syncing, attempt.private_wallet.wallet_sync())
            .await?;

        let range: AssetIdRange = self
            .step(
                MintStep::RangeQuerying,
                attempt.ledger.reserved_asset_range(&attempt.identity.public_key),
            )
            .await?;
        debug!(start = %range.start, end = %range.end, "reserved asset ids");

        let request = SbtBuildRequest::single(range.start.clone(), network);
        let raw = self
            .step(
                MintStep::ProofBuilding,
                attempt.private_wallet.multi_sbt_post_build(&request),
            )
            .await?;
        let bundle = ProofBundle::try_from(raw)?;
        // Validated before submission: the record cannot be built without it.
        let proof_id = to_prefixed_hex(&bundle.first().commitment_randomness()?);

        let transactions = self.sign_bundle(attempt, &bundle).await?;

        let mut events = self
            .step(
                MintStep::Submitting,
                attempt.ledger.submit_batch(
                    transactions,
                    &attempt.identity.address,
                    NonceMode::Auto,
                ),
            )
            .await?;

        let deadline = self.cfg.ledger.inclusion_timeout;
        let inclusion = async {
            while let Some(event) = events.next().await {
                match event? {
                    InclusionEvent::InBlock(block) | InclusionEvent::Finalized(block) => {
                        return Ok(block);
                    }
                    InclusionEvent::DispatchFailed(reason) => {
                        return Err(MintError::DispatchFailed(reason));
                    }
                    InclusionEvent::Dropped(reason) => {
                        return Err(MintError::RemoteUnavailable(format!(
                            "transaction was not included: {reason}"
                        )));
                    }
                    other => debug!(event = %other, "inclusion progress"),
                }
            }
            Err::<BlockHash, _>(MintError::RemoteUnavailable(
                "inclusion stream ended before the batch was included".to_string(),
            ))
        };
        let block = self
            .step(MintStep::AwaitingInclusion, tokio::time::timeout(deadline, inclusion))
            .await
            .map_err(|_| {
                MintError::RemoteUnavailable(format!(
                    "batch was not included within {}s",
                    deadline.as_secs()
                ))
            })??;
        // Later inclusion events for this batch are never observed.
        drop(events);

        let first = bundle.first();
        let record = ProofRecord::new(
            attempt.identity.address.clone(),
            self.cfg.records.token_type.clone(),
            ProofInfo {
                proof_id,
                blur_url: self.cfg.records.image_url.clone(),
                asset_id: range.start.to_string(),
                transaction_data: first.transaction_data.clone(),
            },
        );

        if !self
            .ctx
            .publisher
            .publish(&attempt.identity.expected_address, &record)
            .await
        {
            self.ctx.metrics.mint.publish_failures.inc();
        }

        Ok((record, block))
    }

    /// Collects the double signature for every entry, strictly in order.
    async fn sign_bundle(
        &self,
        attempt: &MintAttempt,
        bundle: &ProofBundle,
    ) -> Result<Vec<MintTransaction>, MintError> {
        let genesis = attempt.ledger.genesis_hash().await?;
        let total = bundle.len();
        let mut transactions = Vec::with_capacity(total);

        for (i, entry) in bundle.entries().iter().enumerate() {
            let step = MintStep::Signing { index: i + 1, total };
            let binding = self
                .step(step, async {
                    let proof = entry.post.proof();
                    let typed = TypedData::proof_claim(&genesis, proof);
                    let evm_signature = self
                        .ctx
                        .credential
                        .sign_typed_data(&attempt.evm_address, &typed)
                        .await
                        .map_err(|e| MintError::from_wallet(e, DECLINED_SIGNATURE))?;

                    let payload = RawPayload::bytes(attempt.identity.address.clone(), &evm_signature.0);
                    let ledger_signature = attempt
                        .raw_signer
                        .sign_raw(&payload)
                        .await
                        .map_err(|e| MintError::from_wallet(e, DECLINED_SIGNATURE))?;

                    Ok::<_, MintError>(SignatureBinding {
                        proof: proof.clone(),
                        evm_signature,
                        ledger_signature,
                        public_key: attempt.identity.public_key,
                    })
                })
                .await?;

            transactions.push(MintTransaction {
                binding,
                post: entry.post.clone(),
                credential: attempt.credential.clone(),
            });
        }

        Ok(transactions)
    }
}
