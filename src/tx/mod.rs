//! Transaction Module
//!
//! Authorization flows for an Account:
//! - [`direct`]: owners sign the SafeTx record, `execTransaction` on the Account
//! - [`routed`]: one key holder signs the module digest, the module checks
//!   the keystore proof and executes
//! - [`rotation`]: point the Account's keystore identifier at a new key
//! - [`tracker`]: receipt and confirmation polling
//!
//! Submission and confirmation are shared here so every flow handles the
//! provider quirks and revert reasons the same way.

pub mod direct;
pub mod rotation;
pub mod routed;
pub mod tracker;

pub use direct::{DirectExecutor, SignedTransaction};
pub use rotation::{KeyRotation, KeySource, RecoveryRequest, RotationOutcome};
pub use routed::RoutedExecutor;
pub use tracker::{check_transaction, confirmations_of, wait_for_transaction, TransactionCheck, TxStatus};

use ethers_core::types::H256;
use std::fmt;

use crate::config::ClientConfig;
use crate::error::{ErrorCode, SafeKeyspaceError, SafeKeyspaceResult};
use crate::rpc::{CallRequest, ChainClient, TxReceipt};
use crate::utils::decode_word;
use crate::{log_info, log_warn};

const MODULE: &str = "tx";

/// Where an execution flow currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStage {
    Built,
    HashFetched,
    Signed(usize),
    ProofFetched,
    Submitted,
    Confirmed,
    Reverted,
    /// Stopped before a receipt for any reason other than a revert
    Failed,
}

impl FlowStage {
    /// Terminal stage for a flow that ended in `err`
    pub fn for_error(err: &SafeKeyspaceError) -> Self {
        if err.code == ErrorCode::Reverted {
            FlowStage::Reverted
        } else {
            FlowStage::Failed
        }
    }
}

impl fmt::Display for FlowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowStage::Built => write!(f, "built"),
            FlowStage::HashFetched => write!(f, "hash_fetched"),
            FlowStage::Signed(n) => write!(f, "signed({})", n),
            FlowStage::ProofFetched => write!(f, "proof_fetched"),
            FlowStage::Submitted => write!(f, "submitted"),
            FlowStage::Confirmed => write!(f, "confirmed"),
            FlowStage::Reverted => write!(f, "reverted"),
            FlowStage::Failed => write!(f, "failed"),
        }
    }
}

/// Send `request` and return its hash.
///
/// Some providers answer a successful broadcast with the error `missing r`
/// plus the transaction hash. When `accept_missing_r_quirk` is set that
/// answer counts as a broadcast; the receipt wait that follows decides
/// whether it really landed.
pub async fn submit_transaction(
    chain: &dyn ChainClient,
    config: &ClientConfig,
    request: &CallRequest,
) -> SafeKeyspaceResult<H256> {
    match chain.send_transaction(request).await {
        Ok(hash) => Ok(hash),
        Err(err) if err.code == ErrorCode::AmbiguousBroadcast && config.accept_missing_r_quirk => {
            let hash = err
                .details
                .as_deref()
                .and_then(|raw| decode_word(raw).ok())
                .ok_or_else(|| {
                    SafeKeyspaceError::network("provider reported \"missing r\" without a transaction hash")
                })?;
            log_warn!(MODULE, "Provider returned \"missing r\", treating as broadcast", tx_hash = hash);
            Ok(hash)
        }
        Err(err) if err.code == ErrorCode::AmbiguousBroadcast => Err(SafeKeyspaceError::network(
            "provider reported \"missing r\"; broadcast state unknown",
        )
        .with_details(err.details.unwrap_or_default())),
        Err(err) => Err(err),
    }
}

/// Wait for `hash`. A reverted receipt becomes a `Reverted` error; the
/// reason is recovered by replaying `request` with `eth_call`.
pub async fn confirm_transaction(
    chain: &dyn ChainClient,
    config: &ClientConfig,
    request: &CallRequest,
    hash: H256,
) -> SafeKeyspaceResult<TxReceipt> {
    let receipt = tracker::wait_for_transaction(chain, config, hash).await?;
    if receipt.status {
        return Ok(receipt);
    }

    let reason = match chain.call(request).await {
        Err(err) if err.code == ErrorCode::Reverted => err.message,
        _ => "transaction reverted".to_string(),
    };
    Err(SafeKeyspaceError::reverted(reason).with_details(format!("{:?}", hash)))
}

/// [`submit_transaction`] then [`confirm_transaction`]
pub async fn send_and_confirm(
    chain: &dyn ChainClient,
    config: &ClientConfig,
    request: &CallRequest,
) -> SafeKeyspaceResult<TxReceipt> {
    let hash = submit_transaction(chain, config, request).await?;
    log_info!(MODULE, "Flow stage", stage = FlowStage::Submitted, tx_hash = hash);
    confirm_transaction(chain, config, request, hash).await
}
