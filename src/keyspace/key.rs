//! Key material: public-key recovery, data hash and keystore identifier
//!
//! The keystore identifies a key by `poseidon([vk_hash, data_hash])` where
//! `data_hash` commits to the secp256k1 public key. Nothing here ever sees
//! a private key except [`public_key_from_secret`], which exists for
//! locally held test keys.

use ethers_core::types::{H256, U256};
use secp256k1::{PublicKey, Secp256k1, SecretKey};

use super::poseidon::poseidon_hash;
use crate::error::{ErrorCode, SafeKeyspaceError, SafeKeyspaceResult};
use crate::signer::{personal_sign_hash, recover_public_key, SigningCapability};
use crate::types::{KeyspaceKey, PublicKeyPoints};
use crate::utils::{keccak256, random_bytes32};
use crate::log_debug;

const MODULE: &str = "keyspace";

/// Verification key hash of the secp256k1 ownership circuit.
///
/// Generated from a KZG commitment without a trusted setup.
pub const VK_HASH: H256 = H256([
    0x00, 0xe5, 0x13, 0x40, 0x8e, 0x89, 0x66, 0x18,
    0xfd, 0x2b, 0x48, 0x77, 0xb4, 0x4e, 0xcc, 0x81,
    0xe6, 0x05, 0x56, 0x47, 0xf6, 0xab, 0xb4, 0x8e,
    0x03, 0x56, 0x38, 0x4f, 0xc6, 0x3b, 0x2f, 0x72,
]);

/// Size of the zero-padded buffer the data hash is taken over
const KEY_DATA_LEN: usize = 256;

#[derive(Debug, Clone, thiserror::Error)]
pub enum KeyMaterialError {
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Public key recovery failed: {0}")]
    RecoveryFailed(String),

    #[error("Poseidon hash failed: {0}")]
    Poseidon(String),
}

impl From<KeyMaterialError> for SafeKeyspaceError {
    fn from(e: KeyMaterialError) -> Self {
        SafeKeyspaceError::new(ErrorCode::CryptoError, e.to_string())
    }
}

/// Everything derived from one public key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyMaterial {
    pub public_key: PublicKeyPoints,
    pub data_hash: H256,
    pub identifier: KeyspaceKey,
}

impl KeyMaterial {
    pub fn from_public_key(public_key: PublicKeyPoints, vk_hash: H256) -> SafeKeyspaceResult<Self> {
        let data_hash = compute_data_hash(&public_key);
        let identifier = compute_identifier(&public_key, vk_hash)?;
        Ok(Self {
            public_key,
            data_hash,
            identifier,
        })
    }

    /// Recover the signer's public key and derive its identifier
    pub async fn derive(signer: &dyn SigningCapability, vk_hash: H256) -> SafeKeyspaceResult<Self> {
        let public_key = derive_public_key(signer).await?;
        Self::from_public_key(public_key, vk_hash)
    }
}

/// Recover `signer`'s public key from a personal signature over a random
/// 32-byte challenge.
pub async fn derive_public_key(signer: &dyn SigningCapability) -> SafeKeyspaceResult<PublicKeyPoints> {
    let challenge = random_bytes32();
    let signature = signer.sign_message(&challenge).await?;
    let digest = H256(personal_sign_hash(&challenge));

    let public_key = recover_public_key(digest, &signature)
        .map_err(|e| KeyMaterialError::RecoveryFailed(e.message))?;

    if public_key.address() != signer.address() {
        return Err(KeyMaterialError::RecoveryFailed(format!(
            "recovered {:?}, expected {:?}",
            public_key.address(),
            signer.address()
        ))
        .into());
    }

    log_debug!(MODULE, "Recovered public key", signer = signer.address());
    Ok(public_key)
}

/// Split a 65-byte uncompressed key into its coordinates
pub fn format_public_key(uncompressed: &[u8]) -> Result<PublicKeyPoints, KeyMaterialError> {
    PublicKeyPoints::from_uncompressed(uncompressed)
        .map_err(|e| KeyMaterialError::InvalidPublicKey(e.message))
}

/// Public key of a locally held secret scalar
pub fn public_key_from_secret(secret: &[u8]) -> SafeKeyspaceResult<PublicKeyPoints> {
    let secp = Secp256k1::signing_only();
    let secret_key = SecretKey::from_slice(secret)?;
    let public_key = PublicKey::from_secret_key(&secp, &secret_key);
    Ok(format_public_key(&public_key.serialize_uncompressed())?)
}

/// keccak256 over a 256-byte zero buffer holding `x ‖ y`, truncated to its
/// first 31 bytes so it fits the field. Returned left-padded to 32 bytes.
pub fn compute_data_hash(public_key: &PublicKeyPoints) -> H256 {
    let mut data = [0u8; KEY_DATA_LEN];
    data[..32].copy_from_slice(&public_key.x);
    data[32..64].copy_from_slice(&public_key.y);

    let full = keccak256(&data);
    let mut out = [0u8; 32];
    out[1..].copy_from_slice(&full[..31]);
    H256(out)
}

/// `poseidon([vk_hash, data_hash])`
pub fn compute_identifier(public_key: &PublicKeyPoints, vk_hash: H256) -> SafeKeyspaceResult<KeyspaceKey> {
    let data_hash = compute_data_hash(public_key);
    let identifier = poseidon_hash(&[vk_hash, data_hash])?;
    Ok(KeyspaceKey(identifier))
}

/// Digest the current owner signs to approve rotating to `new_key`:
/// the identifier shifted right by two bits.
pub fn recovery_digest(new_key: &KeyspaceKey) -> H256 {
    let shifted: U256 = new_key.as_u256() >> 2;
    let mut out = [0u8; 32];
    shifted.to_big_endian(&mut out);
    H256(out)
}
