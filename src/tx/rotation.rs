//! Keystore key rotation
//!
//! The current key holder approves a new key by signing
//! `recovery_digest(new_key)` without a message prefix. The recovery
//! service turns that signature into a proof, and the state service applies
//! it. No on-chain transaction is involved: the Account keeps its
//! registered identifier, which now resolves to the new key.

use ethers_core::types::Address;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{ErrorCode, SafeKeyspaceError, SafeKeyspaceResult};
use crate::keyspace::{recovery_digest, CircuitType, KeyMaterial, KeystoreClient, RecoverProof, VK_HASH};
use crate::rpc::ChainClient;
use crate::safe::contracts::read_keyspace_key;
use crate::signer::{pack_signature, SigningCapability};
use crate::types::KeyspaceKey;
use crate::{log_debug, log_info, log_warn};

const MODULE: &str = "rotation";

/// Where the identifier being rotated comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySource {
    /// Read `keyspaceKeys(account)` from the module
    Module { module: Address, account: Address },
    Explicit(KeyspaceKey),
}

/// A proven request to repoint `key` at `new_key`. Consumed by
/// [`KeyRotation::apply`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryRequest {
    pub key: KeyspaceKey,
    pub new_key: KeyspaceKey,
    pub proof: RecoverProof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationOutcome {
    pub key: KeyspaceKey,
    pub new_key: KeyspaceKey,
}

#[derive(Clone)]
pub struct KeyRotation {
    chain: Arc<dyn ChainClient>,
    keystore: KeystoreClient,
    circuit: CircuitType,
}

impl KeyRotation {
    pub fn new(chain: Arc<dyn ChainClient>, keystore: KeystoreClient) -> Self {
        Self {
            chain,
            keystore,
            circuit: CircuitType::Secp256k1,
        }
    }

    pub async fn resolve_key(&self, source: KeySource) -> SafeKeyspaceResult<KeyspaceKey> {
        match source {
            KeySource::Explicit(key) => Ok(key),
            KeySource::Module { module, account } => {
                read_keyspace_key(self.chain.as_ref(), module, account).await
            }
        }
    }

    /// Have `current_owner` approve `new_key` and obtain the recovery proof.
    /// A signer that does not control `key` is an authorization error
    /// naming its address.
    pub async fn prepare(
        &self,
        key: KeyspaceKey,
        new_key: KeyspaceKey,
        current_owner: &dyn SigningCapability,
    ) -> SafeKeyspaceResult<RecoveryRequest> {
        let digest = recovery_digest(&new_key);
        log_debug!(MODULE, "Signing recovery digest", digest = digest, signer = current_owner.address());

        let signature = current_owner.sign_hash(digest).await?;
        let proof = self
            .keystore
            .get_recover_proof(&key, &new_key, self.circuit, &pack_signature(&signature))
            .await
            .map_err(|err| match err.code {
                ErrorCode::ProofRejected => {
                    log_warn!(MODULE, "Recovery service rejected signer", signer = current_owner.address(), reason = err.message);
                    SafeKeyspaceError::unauthorized(
                        current_owner.address(),
                        format!("signer does not control keystore key {}", key),
                    )
                }
                _ => err,
            })?;

        Ok(RecoveryRequest { key, new_key, proof })
    }

    /// Submit a prepared request to the state service
    pub async fn apply(&self, request: RecoveryRequest) -> SafeKeyspaceResult<RotationOutcome> {
        self.keystore
            .set_config(&request.key, &request.new_key, &request.proof)
            .await?;
        Ok(RotationOutcome {
            key: request.key,
            new_key: request.new_key,
        })
    }

    /// Rotate the identifier named by `source` to `new_owner`'s key
    pub async fn rotate(
        &self,
        source: KeySource,
        current_owner: &dyn SigningCapability,
        new_owner: &dyn SigningCapability,
    ) -> SafeKeyspaceResult<RotationOutcome> {
        let new_material = KeyMaterial::derive(new_owner, VK_HASH).await?;
        self.rotate_to(source, current_owner, new_material.identifier).await
    }

    /// Rotate the identifier named by `source` to an already known `new_key`
    pub async fn rotate_to(
        &self,
        source: KeySource,
        current_owner: &dyn SigningCapability,
        new_key: KeyspaceKey,
    ) -> SafeKeyspaceResult<RotationOutcome> {
        let key = self.resolve_key(source).await?;
        log_info!(MODULE, "Rotating keystore key", key = key, new_key = new_key);

        let request = self.prepare(key, new_key, current_owner).await?;
        self.apply(request).await
    }
}
