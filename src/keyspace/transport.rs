//! Keystore transport
//!
//! The keystore exposes two JSON-RPC endpoints: the state service
//! (`mksr_*`) and the recovery prover (`recover_*`). Both are reached
//! through [`KeystoreTransport`] so tests can answer in memory.

use async_trait::async_trait;
use std::time::Duration;
use url::Url;

use crate::config::ClientConfig;
use crate::error::{SafeKeyspaceError, SafeKeyspaceResult};
use crate::rpc::{JsonRpcClient, JsonRpcFailure};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeystoreEndpoint {
    /// Values, config proofs and updates
    State,
    /// Signature-based recovery proofs
    Recovery,
}

#[async_trait]
pub trait KeystoreTransport: Send + Sync {
    /// Send one JSON-RPC request. Service errors surface as
    /// `ProofRejected`, transport errors as `NetworkError`/`Timeout`.
    async fn request(
        &self,
        endpoint: KeystoreEndpoint,
        method: &str,
        params: serde_json::Value,
    ) -> SafeKeyspaceResult<serde_json::Value>;
}

/// HTTP transport, one JSON-RPC client per endpoint, no retries
#[derive(Debug)]
pub struct HttpKeystoreTransport {
    state: JsonRpcClient,
    recovery: JsonRpcClient,
}

impl HttpKeystoreTransport {
    pub fn new(state_url: Url, recovery_url: Url, timeout: Duration) -> SafeKeyspaceResult<Self> {
        Ok(Self {
            state: JsonRpcClient::new(state_url, timeout)?,
            recovery: JsonRpcClient::new(recovery_url, timeout)?,
        })
    }

    pub fn from_config(config: &ClientConfig) -> SafeKeyspaceResult<Self> {
        Self::new(
            Url::parse(&config.keyspace_rpc_url)?,
            Url::parse(&config.keyspace_recovery_rpc_url)?,
            config.keyspace_timeout(),
        )
    }

    fn client(&self, endpoint: KeystoreEndpoint) -> &JsonRpcClient {
        match endpoint {
            KeystoreEndpoint::State => &self.state,
            KeystoreEndpoint::Recovery => &self.recovery,
        }
    }
}

#[async_trait]
impl KeystoreTransport for HttpKeystoreTransport {
    async fn request(
        &self,
        endpoint: KeystoreEndpoint,
        method: &str,
        params: serde_json::Value,
    ) -> SafeKeyspaceResult<serde_json::Value> {
        self.client(endpoint)
            .call(method, params)
            .await
            .map_err(|failure| match failure {
                JsonRpcFailure::Transport(err) => err,
                JsonRpcFailure::Service(obj) => {
                    SafeKeyspaceError::proof_rejected(format!("{} rejected: {}", method, obj.message))
                        .with_details(format!("rpc code {}", obj.code))
                }
            })
    }
}
