//! Client configuration
//!
//! Every recognized setting is a field of [`ClientConfig`] with a default.
//! Build one with `ClientConfig::default()`, `ClientConfig::from_env()` or
//! serde, then call [`ClientConfig::validate`] once before handing it to the
//! components.

pub mod networks;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::error::{SafeKeyspaceError, SafeKeyspaceResult};

pub use networks::KeyspaceNetwork;

pub const DEFAULT_CHAIN_RPC_URL: &str = "http://127.0.0.1:8545";
pub const DEFAULT_KEYSPACE_RPC_URL: &str = "https://sepolia-alpha.key.space";
pub const DEFAULT_KEYSPACE_RECOVERY_RPC_URL: &str = "http://localhost:8555";
pub const DEFAULT_CONFIRMATION_BLOCKS: u64 = 3;
/// Hardhat / anvil chain id; receipts there need no confirmations
pub const LOCAL_CHAIN_ID: u64 = 31337;
pub const DEFAULT_ROUTED_EXECUTION_GAS: u64 = 10_000_000;

/// Order in which owner signatures are concatenated for direct execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureOrder {
    /// Keep the order in which the caller listed the signers
    #[default]
    AsProvided,
    /// Sort by signer address, ascending
    AscendingAddress,
}

/// Configuration shared by every component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Expected chain id, checked against the node on first use
    pub chain_id: Option<u64>,
    pub chain_rpc_url: String,
    /// Confirmations required on non-local chains
    pub confirmation_blocks: u64,
    /// Chain id treated as a local dev chain (zero confirmations)
    pub local_chain_id: u64,
    pub keyspace_rpc_url: String,
    pub keyspace_recovery_rpc_url: String,
    pub keyspace_timeout_secs: u64,
    pub rpc_timeout_secs: u64,
    pub receipt_poll_interval_ms: u64,
    /// Gas limit attached to routed `executeTransaction` calls
    pub routed_execution_gas: u64,
    pub signature_order: SignatureOrder,
    /// Treat the provider's "missing r" submission error as a broadcast
    pub accept_missing_r_quirk: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            chain_id: None,
            chain_rpc_url: DEFAULT_CHAIN_RPC_URL.to_string(),
            confirmation_blocks: DEFAULT_CONFIRMATION_BLOCKS,
            local_chain_id: LOCAL_CHAIN_ID,
            keyspace_rpc_url: DEFAULT_KEYSPACE_RPC_URL.to_string(),
            keyspace_recovery_rpc_url: DEFAULT_KEYSPACE_RECOVERY_RPC_URL.to_string(),
            keyspace_timeout_secs: 120,
            rpc_timeout_secs: 30,
            receipt_poll_interval_ms: 1_000,
            routed_execution_gas: DEFAULT_ROUTED_EXECUTION_GAS,
            signature_order: SignatureOrder::AsProvided,
            accept_missing_r_quirk: true,
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `CHAIN_ID`, `CHAIN_RPC`, `CONFIRMATION_BLOCKS`,
    /// `KEYSPACE_RPC_URL` and `KEYSPACE_RECOVERY_RPC_URL`.
    pub fn from_env() -> SafeKeyspaceResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> SafeKeyspaceResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup("CHAIN_ID") {
            config.chain_id = Some(parse_u64("CHAIN_ID", &raw)?);
        }
        if let Some(url) = lookup("CHAIN_RPC") {
            config.chain_rpc_url = url;
        }
        if let Some(raw) = lookup("CONFIRMATION_BLOCKS") {
            config.confirmation_blocks = parse_u64("CONFIRMATION_BLOCKS", &raw)?;
        }
        if let Some(url) = lookup("KEYSPACE_RPC_URL") {
            config.keyspace_rpc_url = url;
        }
        if let Some(url) = lookup("KEYSPACE_RECOVERY_RPC_URL") {
            config.keyspace_recovery_rpc_url = url;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check every field once; components assume a validated config
    pub fn validate(&self) -> SafeKeyspaceResult<()> {
        validate_url("chain_rpc_url", &self.chain_rpc_url)?;
        validate_url("keyspace_rpc_url", &self.keyspace_rpc_url)?;
        validate_url("keyspace_recovery_rpc_url", &self.keyspace_recovery_rpc_url)?;

        if self.keyspace_timeout_secs == 0 || self.rpc_timeout_secs == 0 {
            return Err(SafeKeyspaceError::config("timeouts must be non-zero"));
        }
        if self.receipt_poll_interval_ms == 0 {
            return Err(SafeKeyspaceError::config("receipt poll interval must be non-zero"));
        }
        if self.routed_execution_gas == 0 {
            return Err(SafeKeyspaceError::config("routed execution gas must be non-zero"));
        }
        if self.chain_id == Some(0) {
            return Err(SafeKeyspaceError::config("chain id must be non-zero"));
        }
        Ok(())
    }

    /// Confirmations to wait for on `chain_id`
    pub fn confirmations_for(&self, chain_id: u64) -> u64 {
        if chain_id == self.local_chain_id {
            0
        } else {
            self.confirmation_blocks
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    pub fn keyspace_timeout(&self) -> Duration {
        Duration::from_secs(self.keyspace_timeout_secs)
    }
}

fn parse_u64(name: &str, raw: &str) -> SafeKeyspaceResult<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| SafeKeyspaceError::config(format!("{} must be an integer, got {:?}", name, raw)))
}

fn validate_url(field: &str, raw: &str) -> SafeKeyspaceResult<Url> {
    let url = Url::parse(raw)
        .map_err(|e| SafeKeyspaceError::config(format!("{}: invalid URL: {}", field, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(SafeKeyspaceError::config(format!(
            "{}: unsupported scheme {}",
            field, other
        ))),
    }
}
