//! WebSocket JSON-RPC implementation of the ledger adapter.
//!
//! One connection per session. A writer task drains an outbound queue into
//! the socket; a reader task routes every inbound frame either to the
//! pending request with the same `id` or to the subscription named in
//! `params.subscription`. Subscription notifications can overtake the
//! response that announces the subscription id, so notifications for
//! unknown ids are buffered until the subscriber registers.
//!
//! Inclusion is only reported once the block's events show the batch
//! dispatched; a failed dispatch surfaces as
//! [`InclusionEvent::DispatchFailed`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt, stream};
use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::storage::{
    RESERVED_IDS_PREFIX, SYSTEM_ACCOUNT_PREFIX, SYSTEM_EVENTS_KEY, account_storage_key,
    decode_asset_range, decode_free_balance, find_dispatch_failure,
};
use super::{
    EndpointSelector, InclusionEvent, InclusionStream, LedgerClient, LedgerConnector, LedgerError,
    NonceMode, RandomEndpoint,
};
use crate::jsonrpc::RpcErrorObject;
use crate::types::{
    AssetIdRange, Balance, BlockHash, MintTransaction, PublicKey, from_prefixed_hex,
    to_prefixed_hex,
};
use crate::wallet::{BatchSigningRequest, ExtrinsicSigner};

/// Upper bound on subscription ids with buffered, unclaimed notifications.
const MAX_ORPHANED_SUBSCRIPTIONS: usize = 64;
/// Upper bound on buffered notifications per unclaimed subscription id.
const MAX_ORPHANED_NOTIFICATIONS: usize = 32;

type Reply = Result<Value, LedgerError>;

#[derive(Default)]
struct Router {
    pending: HashMap<u64, oneshot::Sender<Reply>>,
    subscriptions: HashMap<String, mpsc::UnboundedSender<Value>>,
    orphans: HashMap<String, Vec<Value>>,
    closed: bool,
}

impl Router {
    fn route(&mut self, text: &str) {
        let frame: Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                warn!("dropping malformed frame from ledger node: {e}");
                return;
            }
        };

        if let Some(id) = frame.get("id").and_then(Value::as_u64) {
            let Some(reply) = self.pending.remove(&id) else {
                debug!(id, "response for unknown or timed-out request");
                return;
            };
            let _ = reply.send(response_result(&frame));
            return;
        }

        let Some(params) = frame.get("params") else {
            return;
        };
        let (Some(sub_id), Some(result)) = (
            params.get("subscription").and_then(subscription_key),
            params.get("result"),
        ) else {
            return;
        };

        if let Some(tx) = self.subscriptions.get(&sub_id) {
            if tx.send(result.clone()).is_err() {
                self.subscriptions.remove(&sub_id);
            }
        } else if let Some(buffered) = self.orphans.get_mut(&sub_id) {
            if buffered.len() < MAX_ORPHANED_NOTIFICATIONS {
                buffered.push(result.clone());
            } else {
                debug!(subscription = %sub_id, "orphan buffer full; dropping notification");
            }
        } else if self.orphans.len() < MAX_ORPHANED_SUBSCRIPTIONS {
            self.orphans.insert(sub_id, vec![result.clone()]);
        }
    }

    fn close(&mut self, reason: &str) {
        self.closed = true;
        for (_, reply) in self.pending.drain() {
            let _ = reply.send(Err(LedgerError::Transport(reason.to_string())));
        }
        self.subscriptions.clear();
        self.orphans.clear();
    }
}

fn response_result(frame: &Value) -> Reply {
    if let Some(err) = frame.get("error") {
        return match serde_json::from_value::<RpcErrorObject>(err.clone()) {
            Ok(obj) => Err(LedgerError::Rpc {
                code: obj.code,
                message: obj.message,
            }),
            Err(e) => Err(LedgerError::Decode(format!("malformed error object: {e}"))),
        };
    }
    Ok(frame.get("result").cloned().unwrap_or(Value::Null))
}

fn subscription_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Maps one `author_extrinsicUpdate` status to an [`InclusionEvent`].
///
/// `Ok(None)` for statuses that carry no progress (`future`, `retracted`).
pub(crate) fn parse_extrinsic_status(status: &Value) -> Result<Option<InclusionEvent>, LedgerError> {
    if let Some(s) = status.as_str() {
        return Ok(match s {
            "ready" => Some(InclusionEvent::Ready),
            "future" => None,
            "dropped" => Some(InclusionEvent::Dropped("dropped from the transaction pool".into())),
            "invalid" => Some(InclusionEvent::Dropped("rejected as invalid".into())),
            other => return Err(LedgerError::Decode(format!("unknown extrinsic status `{other}`"))),
        });
    }

    let Some((kind, detail)) = status.as_object().and_then(|m| m.iter().next()) else {
        return Err(LedgerError::Decode(format!("unexpected extrinsic status {status}")));
    };
    let block = || {
        detail
            .as_str()
            .and_then(BlockHash::from_hex)
            .ok_or_else(|| LedgerError::Decode(format!("bad block hash in `{kind}` status")))
    };

    Ok(match kind.as_str() {
        "broadcast" => Some(InclusionEvent::Broadcast),
        "inBlock" => Some(InclusionEvent::InBlock(block()?)),
        "finalized" => Some(InclusionEvent::Finalized(block()?)),
        "retracted" => None,
        "usurped" => Some(InclusionEvent::Dropped(format!("usurped by {detail}"))),
        "finalityTimeout" => Some(InclusionEvent::Dropped(format!("finality timeout in {detail}"))),
        other => return Err(LedgerError::Decode(format!("unknown extrinsic status `{other}`"))),
    })
}

/// Multiplexed JSON-RPC connection.
struct WsRpc {
    endpoint: String,
    outbound: mpsc::UnboundedSender<Message>,
    router: Arc<Mutex<Router>>,
    next_id: AtomicU64,
    timeout: Duration,
    tasks: Vec<JoinHandle<()>>,
}

impl WsRpc {
    async fn connect(endpoint: &str, timeout: Duration) -> Result<Self, LedgerError> {
        let connect_err = |reason: String| LedgerError::Connect {
            endpoint: endpoint.to_string(),
            reason,
        };
        let (ws, _) = tokio::time::timeout(timeout, connect_async(endpoint))
            .await
            .map_err(|_| connect_err("timed out".to_string()))?
            .map_err(|e| connect_err(e.to_string()))?;
        let (mut sink, mut source) = ws.split();

        let (outbound, mut queue) = mpsc::unbounded_channel::<Message>();
        let writer = tokio::spawn(async move {
            while let Some(msg) = queue.recv().await {
                if let Err(e) = sink.send(msg).await {
                    warn!("ledger websocket write failed: {e}");
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let router = Arc::new(Mutex::new(Router::default()));
        let reader_router = router.clone();
        let pong = outbound.clone();
        let reader = tokio::spawn(async move {
            let reason = loop {
                match source.next().await {
                    Some(Ok(Message::Text(text))) => {
                        lock(&reader_router).route(&text);
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = pong.send(Message::Pong(data));
                    }
                    Some(Ok(Message::Close(_))) | None => break "connection closed".to_string(),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break format!("websocket error: {e}"),
                }
            };
            debug!("ledger connection reader stopped: {reason}");
            lock(&reader_router).close(&reason);
        });

        Ok(Self {
            endpoint: endpoint.to_string(),
            outbound,
            router,
            next_id: AtomicU64::new(1),
            timeout,
            tasks: vec![writer, reader],
        })
    }

    async fn request(&self, method: &str, params: Value) -> Reply {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        {
            let mut router = lock(&self.router);
            if router.closed {
                return Err(LedgerError::Transport(format!(
                    "connection to {} is closed",
                    self.endpoint
                )));
            }
            router.pending.insert(id, tx);
        }

        let body = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });
        if self.outbound.send(Message::Text(body.to_string())).is_err() {
            lock(&self.router).pending.remove(&id);
            return Err(LedgerError::Transport("websocket writer stopped".to_string()));
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => Err(LedgerError::Transport("connection closed".to_string())),
            Err(_) => {
                lock(&self.router).pending.remove(&id);
                Err(LedgerError::Timeout {
                    method: method.to_string(),
                })
            }
        }
    }

    async fn subscribe(&self, method: &str, params: Value) -> Result<mpsc::UnboundedReceiver<Value>, LedgerError> {
        let result = self.request(method, params).await?;
        let sub_id = subscription_key(&result)
            .ok_or_else(|| LedgerError::Decode(format!("{method} returned no subscription id")))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let mut router = lock(&self.router);
        for early in router.orphans.remove(&sub_id).unwrap_or_default() {
            let _ = tx.send(early);
        }
        if !router.closed {
            router.subscriptions.insert(sub_id, tx);
        }
        Ok(rx)
    }
}

impl Drop for WsRpc {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

fn lock(router: &Mutex<Router>) -> MutexGuard<'_, Router> {
    router.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Reads a storage value, at the best block or at `block`.
async fn storage_at(
    rpc: &WsRpc,
    key: &[u8],
    block: Option<&BlockHash>,
) -> Result<Option<Vec<u8>>, LedgerError> {
    let params = match block {
        Some(block) => json!([to_prefixed_hex(key), block.to_hex()]),
        None => json!([to_prefixed_hex(key)]),
    };
    match rpc.request("state_getStorage", params).await? {
        Value::Null => Ok(None),
        Value::String(s) => from_prefixed_hex(&s)
            .map(Some)
            .map_err(|e| LedgerError::Decode(format!("storage value is not hex: {e}"))),
        other => Err(LedgerError::Decode(format!("unexpected storage value {other}"))),
    }
}

/// Checks how `extrinsic` dispatched in `block`.
///
/// `Ok(Some(reason))` when the block's events record a failure for it.
async fn dispatch_failure(
    rpc: &WsRpc,
    block: &BlockHash,
    extrinsic: &str,
) -> Result<Option<String>, LedgerError> {
    let body = rpc.request("chain_getBlock", json!([block.to_hex()])).await?;
    let extrinsics = body
        .pointer("/block/extrinsics")
        .and_then(Value::as_array)
        .ok_or_else(|| LedgerError::Decode(format!("block {} has no extrinsic list", block.to_hex())))?;
    let Some(index) = extrinsics
        .iter()
        .position(|x| x.as_str().is_some_and(|x| x.eq_ignore_ascii_case(extrinsic)))
    else {
        warn!(block = %block.to_hex(), "submitted batch not found in its inclusion block");
        return Ok(None);
    };

    let events = storage_at(rpc, &SYSTEM_EVENTS_KEY, Some(block)).await?;
    let index = u32::try_from(index)
        .map_err(|_| LedgerError::Decode(format!("extrinsic index {index} out of range")))?;
    Ok(events.and_then(|events| find_dispatch_failure(&events, index)))
}

/// Resolves inclusion events against the block's dispatch outcome.
async fn confirm_dispatch(
    rpc: &WsRpc,
    event: InclusionEvent,
    extrinsic: &str,
) -> Result<InclusionEvent, LedgerError> {
    let Some(block) = event.included_in().copied() else {
        return Ok(event);
    };
    match dispatch_failure(rpc, &block, extrinsic).await? {
        Some(reason) => {
            warn!(block = %block.to_hex(), "batch dispatch failed: {reason}");
            Ok(InclusionEvent::DispatchFailed(reason))
        }
        None => Ok(event),
    }
}

/// Ledger session over one WebSocket connection.
pub struct WsLedgerClient {
    rpc: Arc<WsRpc>,
    signer: Arc<dyn ExtrinsicSigner>,
}

impl WsLedgerClient {
    pub fn endpoint(&self) -> &str {
        &self.rpc.endpoint
    }

    async fn storage(&self, key: &[u8]) -> Result<Option<Vec<u8>>, LedgerError> {
        storage_at(&self.rpc, key, None).await
    }

    async fn next_index(&self, account: &str) -> Result<u64, LedgerError> {
        self.rpc
            .request("system_accountNextIndex", json!([account]))
            .await?
            .as_u64()
            .ok_or_else(|| LedgerError::Decode("account nonce is not an integer".to_string()))
    }
}

#[async_trait]
impl LedgerClient for WsLedgerClient {
    async fn free_balance(&self, account: &PublicKey) -> Result<Option<Balance>, LedgerError> {
        let raw = self
            .storage(&account_storage_key(&SYSTEM_ACCOUNT_PREFIX, account))
            .await?;
        Ok(decode_free_balance(raw.as_deref()))
    }

    async fn reserved_asset_range(&self, account: &PublicKey) -> Result<AssetIdRange, LedgerError> {
        let raw = self
            .storage(&account_storage_key(&RESERVED_IDS_PREFIX, account))
            .await?;
        decode_asset_range(raw.as_deref())
    }

    async fn genesis_hash(&self) -> Result<BlockHash, LedgerError> {
        let value = self.rpc.request("chain_getBlockHash", json!([0])).await?;
        value
            .as_str()
            .and_then(BlockHash::from_hex)
            .ok_or_else(|| LedgerError::Decode(format!("unexpected genesis hash {value}")))
    }

    async fn submit_batch(
        &self,
        transactions: Vec<MintTransaction>,
        account: &str,
        nonce: NonceMode,
    ) -> Result<InclusionStream, LedgerError> {
        let nonce = match nonce {
            NonceMode::Explicit(n) => n,
            NonceMode::Auto => self.next_index(account).await?,
        };

        let request = BatchSigningRequest {
            address: account,
            nonce,
            calls: &transactions,
        };
        let extrinsic = self.signer.sign_batch(&request).await?;
        info!(
            calls = transactions.len(),
            nonce,
            bytes = extrinsic.len(),
            "submitting batch extrinsic"
        );

        let extrinsic = to_prefixed_hex(&extrinsic);
        let updates = self
            .rpc
            .subscribe("author_submitAndWatchExtrinsic", json!([extrinsic]))
            .await?;

        let state = (updates, self.rpc.clone(), extrinsic);
        let events = stream::unfold(state, |(mut updates, rpc, extrinsic)| async move {
            loop {
                let status = updates.recv().await?;
                let item = match parse_extrinsic_status(&status) {
                    Ok(Some(event)) => confirm_dispatch(&rpc, event, &extrinsic).await,
                    Ok(None) => continue,
                    Err(e) => Err(e),
                };
                return Some((item, (updates, rpc, extrinsic)));
            }
        });
        Ok(events.boxed())
    }
}

/// Opens [`WsLedgerClient`] sessions against one of several candidate nodes.
pub struct WsLedgerConnector {
    selector: Box<dyn EndpointSelector>,
    request_timeout: Duration,
}

impl WsLedgerConnector {
    pub fn new(request_timeout: Duration) -> Self {
        Self::with_selector(Box::new(RandomEndpoint), request_timeout)
    }

    pub fn with_selector(selector: Box<dyn EndpointSelector>, request_timeout: Duration) -> Self {
        Self {
            selector,
            request_timeout,
        }
    }
}

#[async_trait]
impl LedgerConnector for WsLedgerConnector {
    async fn connect(
        &self,
        candidates: &[String],
        signer: Arc<dyn ExtrinsicSigner>,
    ) -> Result<Arc<dyn LedgerClient>, LedgerError> {
        let endpoint = self
            .selector
            .select(candidates)
            .ok_or(LedgerError::NoEndpoints)?;
        let rpc = WsRpc::connect(endpoint, self.request_timeout).await?;
        info!(endpoint, "connected to privacy ledger");
        Ok(Arc::new(WsLedgerClient {
            rpc: Arc::new(rpc),
            signer,
        }))
    }
}
