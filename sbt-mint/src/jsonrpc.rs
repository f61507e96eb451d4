//! HTTP JSON-RPC 2.0 client.
//!
//! Shared transport for the EVM RPC endpoint, the EVM wallet provider and
//! the private-wallet extension bridge. Requests look like:
//!
//! ```json
//! { "jsonrpc": "2.0", "id": 1, "method": "eth_call", "params": [...] }
//! ```
//!
//! and responses carry either `result` or an `error` object with a numeric
//! `code` (wallet providers use `4001` for "user rejected").

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors returned by [`JsonRpcHttpClient`].
#[derive(Clone, Debug, Error, PartialEq)]
pub enum JsonRpcError {
    /// Transport-level error (connection refused, timeout, ...).
    #[error("HTTP transport error: {0}")]
    Transport(String),
    /// The endpoint answered with a non-success HTTP status.
    #[error("endpoint returned HTTP status {0}")]
    Status(u16),
    /// The endpoint returned a JSON-RPC error object.
    #[error("RPC error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<Value>,
    },
    /// Malformed or unexpected response body.
    #[error("malformed JSON-RPC response: {0}")]
    Protocol(String),
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcErrorObject {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

/// Minimal JSON-RPC 2.0 client over HTTP POST.
///
/// Cheap to share behind an `Arc`; `reqwest::Client` pools connections
/// internally.
pub struct JsonRpcHttpClient {
    url: String,
    client: Client,
    next_id: AtomicU64,
}

impl JsonRpcHttpClient {
    /// Constructs a client for `url` with a per-request `timeout`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, JsonRpcError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| JsonRpcError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            url: url.into(),
            client,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Calls `method` and returns the raw `result` value (`null` when absent).
    pub async fn call_value(&self, method: &str, params: Value) -> Result<Value, JsonRpcError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let resp = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| JsonRpcError::Transport(format!("POST {} ({method}) failed: {e}", self.url)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(JsonRpcError::Status(status.as_u16()));
        }

        let body = resp
            .json::<RpcResponse>()
            .await
            .map_err(|e| JsonRpcError::Protocol(format!("failed to parse response to {method}: {e}")))?;

        decode_response(body)
    }

    /// Calls `method` and deserializes the `result` into `T`.
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, JsonRpcError> {
        let value = self.call_value(method, params).await?;
        serde_json::from_value(value)
            .map_err(|e| JsonRpcError::Protocol(format!("unexpected result for {method}: {e}")))
    }
}

fn decode_response(body: RpcResponse) -> Result<Value, JsonRpcError> {
    if let Some(err) = body.error {
        return Err(JsonRpcError::Rpc {
            code: err.code,
            message: err.message,
            data: err.data,
        });
    }
    Ok(body.result.unwrap_or(Value::Null))
}
