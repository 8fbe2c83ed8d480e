//! Direct execution
//!
//! `Built → Signed(k) → Submitted → Confirmed | Reverted`
//!
//! The Account nonce is read fresh, the SafeTx record is signed by the
//! supplied owners and `execTransaction` is sent to the Account itself.

use ethers_core::types::{Address, Bytes, H256};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use super::{send_and_confirm, FlowStage};
use crate::config::{ClientConfig, SignatureOrder};
use crate::eip712::SafeTx;
use crate::error::{SafeKeyspaceError, SafeKeyspaceResult};
use crate::rpc::{CallRequest, ChainClient};
use crate::safe::contracts::{exec_transaction_call, read_nonce, read_owners, read_threshold};
use crate::signer::{concat_signatures, recover_address, SigningCapability};
use crate::types::{ExecutionOutcome, NonceModel, PendingTransaction, SafeCall};
use crate::{log_debug, log_info};

const MODULE: &str = "direct";

/// A transaction carrying enough owner signatures to execute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub pending: PendingTransaction,
    pub safe_tx_hash: H256,
    /// Signers in the order their signatures appear
    pub signers: Vec<Address>,
    pub signatures: Bytes,
}

#[derive(Clone)]
pub struct DirectExecutor {
    chain: Arc<dyn ChainClient>,
    config: ClientConfig,
}

impl DirectExecutor {
    pub fn new(chain: Arc<dyn ChainClient>, config: ClientConfig) -> Self {
        Self { chain, config }
    }

    /// Bind `call` to the Account's current nonce
    pub async fn build(&self, account: Address, call: SafeCall) -> SafeKeyspaceResult<PendingTransaction> {
        let nonce = read_nonce(self.chain.as_ref(), account).await?;
        log_info!(MODULE, "Flow stage", stage = FlowStage::Built, account = account, nonce = nonce);
        Ok(PendingTransaction {
            account,
            call,
            nonce: NonceModel::Explicit(nonce),
        })
    }

    /// Collect owner signatures over the SafeTx digest.
    ///
    /// The first `threshold` signers are used. Fewer than `threshold` is an
    /// input error; a signer that is not an owner is an authorization error
    /// naming its address.
    pub async fn sign(
        &self,
        pending: PendingTransaction,
        signers: &[Arc<dyn SigningCapability>],
    ) -> SafeKeyspaceResult<SignedTransaction> {
        let nonce = pending.nonce.explicit().ok_or_else(|| {
            SafeKeyspaceError::invalid_input("direct execution needs an explicit nonce")
        })?;
        let account = pending.account;

        let chain = self.chain.as_ref();
        let (owners, threshold, chain_id) = tokio::try_join!(
            read_owners(chain, account),
            read_threshold(chain, account),
            chain.chain_id(),
        )?;

        let threshold = threshold as usize;
        if signers.len() < threshold {
            return Err(SafeKeyspaceError::invalid_input(format!(
                "{} signer(s) supplied, threshold is {}",
                signers.len(),
                threshold
            )));
        }
        let selected = &signers[..threshold];

        let mut seen = HashSet::with_capacity(selected.len());
        for signer in selected {
            let address = signer.address();
            if !owners.contains(&address) {
                return Err(SafeKeyspaceError::unauthorized(
                    address,
                    format!("signer is not an owner of {:?}", account),
                ));
            }
            if !seen.insert(address) {
                return Err(SafeKeyspaceError::invalid_input(format!(
                    "signer {:?} listed twice",
                    address
                )));
            }
        }

        let safe_tx = SafeTx::from_call(&pending.call, nonce);
        let typed_data = safe_tx.typed_data(chain_id, account);
        let safe_tx_hash = safe_tx.hash(chain_id, account)?;
        log_debug!(MODULE, "SafeTx digest", safe_tx_hash = safe_tx_hash, nonce = nonce);

        let mut signed = Vec::with_capacity(selected.len());
        for signer in selected {
            let signature = signer.sign_typed_data(&typed_data).await?;
            let recovered = recover_address(safe_tx_hash, &signature)?;
            if recovered != signer.address() {
                return Err(SafeKeyspaceError::signing_failed(format!(
                    "signature recovers to {:?}, expected {:?}",
                    recovered,
                    signer.address()
                )));
            }
            signed.push((signer.address(), signature));
            log_info!(MODULE, "Flow stage", stage = FlowStage::Signed(signed.len()), signer = signer.address());
        }

        if self.config.signature_order == SignatureOrder::AscendingAddress {
            signed.sort_by_key(|(address, _)| *address);
        }

        let signatures: Vec<_> = signed.iter().map(|(_, sig)| *sig).collect();
        Ok(SignedTransaction {
            pending,
            safe_tx_hash,
            signers: signed.iter().map(|(address, _)| *address).collect(),
            signatures: Bytes::from(concat_signatures(&signatures)),
        })
    }

    /// Send `execTransaction` and wait for it
    pub async fn submit(&self, signed: &SignedTransaction) -> SafeKeyspaceResult<ExecutionOutcome> {
        let account = signed.pending.account;
        let data = exec_transaction_call(&signed.pending.call, &signed.signatures)?;
        let request = CallRequest::to(account).with_data(data);

        let chain = self.chain.as_ref();
        let receipt = send_and_confirm(chain, &self.config, &request).await.map_err(|err| {
            log_info!(MODULE, "Flow stage", stage = FlowStage::for_error(&err), account = account, error = err.message);
            err
        })?;
        let confirmations = self.config.confirmations_for(chain.chain_id().await?);

        log_info!(
            MODULE,
            "Flow stage",
            stage = FlowStage::Confirmed,
            account = account,
            tx_hash = receipt.transaction_hash
        );
        Ok(ExecutionOutcome {
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            confirmations,
            nonce: signed.pending.nonce,
        })
    }

    /// Build, sign and submit in one go
    pub async fn execute(
        &self,
        account: Address,
        call: SafeCall,
        signers: &[Arc<dyn SigningCapability>],
    ) -> SafeKeyspaceResult<ExecutionOutcome> {
        let pending = self.build(account, call).await?;
        let signed = self.sign(pending, signers).await?;
        self.submit(&signed).await
    }
}
