//! Signing capability
//!
//! Flows never see private keys. They receive an `Arc<dyn SigningCapability>`
//! and ask it for one of three signature kinds:
//! - `sign_message`: EIP-191 personal message (`\x19Ethereum Signed Message:\n<len>`)
//! - `sign_hash`: a raw 32-byte digest, no prefix
//! - `sign_typed_data`: an EIP-712 record
//!
//! All three return `r ‖ s ‖ v` signatures with `v` in {27, 28}.

pub mod local;
pub mod recover;

pub use local::LocalSigner;
pub use recover::{personal_sign_hash, recover_address, recover_public_key};

use async_trait::async_trait;
use ethers_core::types::{Address, Signature, H256};

use crate::eip712::{hash_typed_data, TypedData};
use crate::error::SafeKeyspaceResult;

#[async_trait]
pub trait SigningCapability: Send + Sync {
    /// Address controlled by this signer
    fn address(&self) -> Address;

    /// EIP-191 personal signature over `message`
    async fn sign_message(&self, message: &[u8]) -> SafeKeyspaceResult<Signature>;

    /// Signature over `hash` exactly as given
    async fn sign_hash(&self, hash: H256) -> SafeKeyspaceResult<Signature>;

    /// Signature over the EIP-712 digest of `typed_data`
    async fn sign_typed_data(&self, typed_data: &TypedData) -> SafeKeyspaceResult<Signature> {
        let digest = hash_typed_data(typed_data)?;
        self.sign_hash(H256(digest)).await
    }
}

/// Packed `r ‖ s ‖ v` encoding used by Safe and the recovery service
pub fn pack_signature(signature: &Signature) -> [u8; 65] {
    <[u8; 65]>::from(signature)
}

/// Concatenate owner signatures in the given order
pub fn concat_signatures(signatures: &[Signature]) -> Vec<u8> {
    let mut out = Vec::with_capacity(65 * signatures.len());
    for signature in signatures {
        out.extend_from_slice(&pack_signature(signature));
    }
    out
}
