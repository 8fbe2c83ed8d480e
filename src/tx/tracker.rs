//! Transaction Tracker
//!
//! Polls the chain for a receipt and counts confirmations. Local dev chains
//! need none; every other chain waits for the configured depth.
//!
//! There is no built-in timeout. Wrap [`wait_for_transaction`] in
//! `tokio::time::timeout` when a bound is needed.

use ethers_core::types::H256;
use serde::{Deserialize, Serialize};

use crate::config::ClientConfig;
use crate::error::SafeKeyspaceResult;
use crate::rpc::{ChainClient, TxReceipt};
use crate::{log_debug, log_error, log_info};

const MODULE: &str = "tracker";

// =============================================================================
// Types
// =============================================================================

/// Transaction status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    /// No receipt yet
    Pending,
    /// Mined but short of the required confirmations
    Confirming,
    /// Mined with enough confirmations
    Confirmed,
    /// Mined and reverted
    Failed,
}

/// Result of checking a transaction once
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionCheck {
    pub hash: H256,
    pub confirmations: u64,
    pub status: TxStatus,
    pub receipt: Option<TxReceipt>,
}

// =============================================================================
// Confirmations
// =============================================================================

/// Blocks on top of (and including) the receipt's block
pub fn confirmations_of(receipt: &TxReceipt, head: u64) -> u64 {
    head.saturating_add(1).saturating_sub(receipt.block_number)
}

/// Check `hash` once against `required` confirmations
pub async fn check_transaction(
    chain: &dyn ChainClient,
    hash: H256,
    required: u64,
) -> SafeKeyspaceResult<TransactionCheck> {
    let receipt = match chain.get_transaction_receipt(hash).await? {
        Some(receipt) => receipt,
        None => {
            return Ok(TransactionCheck {
                hash,
                confirmations: 0,
                status: TxStatus::Pending,
                receipt: None,
            })
        }
    };

    let confirmations = if required == 0 {
        0
    } else {
        confirmations_of(&receipt, chain.block_number().await?)
    };

    let status = if !receipt.status {
        TxStatus::Failed
    } else if confirmations >= required {
        TxStatus::Confirmed
    } else {
        TxStatus::Confirming
    };

    Ok(TransactionCheck {
        hash,
        confirmations,
        status,
        receipt: Some(receipt),
    })
}

/// Wait until `hash` is mined with the confirmations `config` requires on
/// this chain. A reverted receipt is logged and returned, not raised.
pub async fn wait_for_transaction(
    chain: &dyn ChainClient,
    config: &ClientConfig,
    hash: H256,
) -> SafeKeyspaceResult<TxReceipt> {
    let chain_id = chain.chain_id().await?;
    let required = config.confirmations_for(chain_id);
    log_debug!(MODULE, "Waiting for transaction", tx_hash = hash, confirmations = required);

    loop {
        let check = check_transaction(chain, hash, required).await?;
        match (check.status, check.receipt) {
            (TxStatus::Failed, Some(receipt)) => {
                log_error!(
                    MODULE,
                    "Transaction reverted",
                    tx_hash = hash,
                    block = receipt.block_number,
                    gas_used = receipt.gas_used
                );
                return Ok(receipt);
            }
            (TxStatus::Confirmed, Some(receipt)) => {
                log_info!(
                    MODULE,
                    "Transaction confirmed",
                    tx_hash = hash,
                    block = receipt.block_number,
                    confirmations = check.confirmations
                );
                return Ok(receipt);
            }
            (status, _) => {
                log_debug!(MODULE, "Transaction not final", tx_hash = hash, status = status);
            }
        }
        tokio::time::sleep(config.poll_interval()).await;
    }
}
