//! JSON-RPC 2.0 over HTTP
//!
//! Shared by the chain client and the keystore transport. Service errors
//! are kept apart from transport errors so each caller can map them onto
//! its own failure category.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use url::Url;

use crate::error::{ErrorCode, SafeKeyspaceError};

/// RPC request structure
#[derive(Debug, Serialize)]
struct RpcRequest<'a, T: Serialize> {
    jsonrpc: &'static str,
    method: &'a str,
    params: T,
    id: u64,
}

/// RPC response structure
#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

/// The `error` member of a JSON-RPC response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

/// Why a call produced no result
#[derive(Debug, Clone)]
pub enum JsonRpcFailure {
    /// Connection, timeout, HTTP status or undecodable body
    Transport(SafeKeyspaceError),
    /// The service answered with an `error` object
    Service(RpcErrorObject),
}

impl From<JsonRpcFailure> for SafeKeyspaceError {
    fn from(failure: JsonRpcFailure) -> Self {
        match failure {
            JsonRpcFailure::Transport(err) => err,
            JsonRpcFailure::Service(obj) => SafeKeyspaceError::rpc(obj.code, obj.message),
        }
    }
}

/// Minimal JSON-RPC client bound to one endpoint
#[derive(Debug)]
pub struct JsonRpcClient {
    http: reqwest::Client,
    url: Url,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, SafeKeyspaceError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .user_agent(concat!("safe-keyspace/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SafeKeyspaceError::network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            url,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Issue `method(params)` and decode the result as `R`.
    ///
    /// A missing `result` decodes from `null`, so `R = Option<T>` covers
    /// methods like `eth_getTransactionReceipt`.
    pub async fn call<P, R>(&self, method: &str, params: P) -> Result<R, JsonRpcFailure>
    where
        P: Serialize + Send,
        R: DeserializeOwned,
    {
        let request = RpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };

        let response = self
            .http
            .post(self.url.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| JsonRpcFailure::Transport(e.into()))?;

        let status = response.status();
        let body: RpcResponse = response.json().await.map_err(|e| {
            if status.is_success() {
                JsonRpcFailure::Transport(SafeKeyspaceError::new(
                    ErrorCode::ParseError,
                    format!("Invalid response to {}: {}", method, e),
                ))
            } else {
                JsonRpcFailure::Transport(SafeKeyspaceError::network(format!(
                    "{} returned HTTP {}",
                    self.url, status
                )))
            }
        })?;

        decode_response(method, body)
    }
}

fn decode_response<R: DeserializeOwned>(method: &str, body: RpcResponse) -> Result<R, JsonRpcFailure> {
    if let Some(error) = body.error {
        return Err(JsonRpcFailure::Service(error));
    }

    let value = body.result.unwrap_or(serde_json::Value::Null);
    serde_json::from_value(value).map_err(|e| {
        JsonRpcFailure::Transport(SafeKeyspaceError::new(
            ErrorCode::ParseError,
            format!("Unexpected result for {}: {}", method, e),
        ))
    })
}
