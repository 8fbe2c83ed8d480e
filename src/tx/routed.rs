//! Keystore-routed execution
//!
//! `HashFetched → Signed → ProofFetched → Submitted → Confirmed | Reverted`
//!
//! The module computes the digest (embedding its own per-Account nonce),
//! the key holder personal-signs it, and the module accepts the call when
//! the keystore proves the signer's key is the one configured for the
//! Account's registered identifier.

use ethers_core::types::{Address, H256};
use std::sync::Arc;

use super::{send_and_confirm, FlowStage};
use crate::config::ClientConfig;
use crate::error::{ErrorCode, SafeKeyspaceError, SafeKeyspaceResult};
use crate::keyspace::{KeyMaterial, KeystoreClient, VK_HASH};
use crate::rpc::{CallRequest, ChainClient};
use crate::safe::contracts::{execute_transaction_call, read_keyspace_key, read_tx_hash};
use crate::signer::{pack_signature, SigningCapability};
use crate::types::{ExecutionOutcome, NonceModel, PendingTransaction, SafeCall};
use crate::{log_debug, log_info, log_warn};

const MODULE: &str = "routed";

#[derive(Clone)]
pub struct RoutedExecutor {
    chain: Arc<dyn ChainClient>,
    keystore: KeystoreClient,
    module: Address,
    config: ClientConfig,
}

impl RoutedExecutor {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        keystore: KeystoreClient,
        module: Address,
        config: ClientConfig,
    ) -> Self {
        Self {
            chain,
            keystore,
            module,
            config,
        }
    }

    pub fn module(&self) -> Address {
        self.module
    }

    /// Module-side digest of `call` on `account`
    pub async fn tx_hash(&self, account: Address, call: &SafeCall) -> SafeKeyspaceResult<H256> {
        read_tx_hash(self.chain.as_ref(), self.module, account, call).await
    }

    /// Execute `call` on `account` authorized by `signer`'s keystore key
    pub async fn execute(
        &self,
        account: Address,
        call: SafeCall,
        signer: &dyn SigningCapability,
    ) -> SafeKeyspaceResult<ExecutionOutcome> {
        let pending = PendingTransaction {
            account,
            call,
            nonce: NonceModel::Opaque,
        };
        let chain = self.chain.as_ref();

        let tx_hash = self.tx_hash(account, &pending.call).await?;
        log_info!(MODULE, "Flow stage", stage = FlowStage::HashFetched, account = account, digest = tx_hash);

        let signature = signer.sign_message(tx_hash.as_bytes()).await?;
        log_info!(MODULE, "Flow stage", stage = FlowStage::Signed(1), signer = signer.address());

        let material = KeyMaterial::derive(signer, VK_HASH).await?;
        let stored_key = read_keyspace_key(chain, self.module, account).await?;
        log_debug!(
            MODULE,
            "Signer key material",
            identifier = material.identifier,
            stored_key = stored_key,
            data_hash = material.data_hash
        );

        let proof = self
            .keystore
            .get_config_proof(&stored_key, VK_HASH, material.data_hash)
            .await
            .map_err(|err| match err.code {
                ErrorCode::ProofRejected => {
                    log_warn!(MODULE, "Keystore rejected signer", signer = signer.address(), reason = err.message);
                    SafeKeyspaceError::unauthorized(
                        signer.address(),
                        format!("signer does not control keystore key {}", stored_key),
                    )
                }
                _ => err,
            })?;
        log_info!(MODULE, "Flow stage", stage = FlowStage::ProofFetched, root = proof.root);

        let data = execute_transaction_call(
            account,
            &pending.call,
            &pack_signature(&signature),
            &material.public_key,
            &proof.proof_bytes()?,
        )?;
        let request = CallRequest::to(self.module)
            .with_data(data)
            .with_gas(self.config.routed_execution_gas);

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
            nonce: pending.nonce,
        })
    }
}
