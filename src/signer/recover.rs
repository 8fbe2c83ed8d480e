//! Public key recovery from `r ‖ s ‖ v` signatures

use ethers_core::types::{Address, Signature, H256};
use secp256k1::{
    ecdsa::{RecoverableSignature, RecoveryId},
    Message, Secp256k1,
};

use super::pack_signature;
use crate::error::{SafeKeyspaceError, SafeKeyspaceResult};
use crate::types::PublicKeyPoints;
use crate::utils::keccak256;

/// Ethereum message prefix for personal_sign
const ETH_MESSAGE_PREFIX: &str = "\x19Ethereum Signed Message:\n";

/// keccak256 of `message` under the EIP-191 personal prefix
pub fn personal_sign_hash(message: &[u8]) -> [u8; 32] {
    let prefix = format!("{}{}", ETH_MESSAGE_PREFIX, message.len());
    let mut data = Vec::with_capacity(prefix.len() + message.len());
    data.extend_from_slice(prefix.as_bytes());
    data.extend_from_slice(message);
    keccak256(&data)
}

/// Recover the uncompressed public key that produced `signature` over `digest`
pub fn recover_public_key(digest: H256, signature: &Signature) -> SafeKeyspaceResult<PublicKeyPoints> {
    let packed = pack_signature(signature);

    let v = packed[64];
    let recovery_id = if v >= 27 { v - 27 } else { v };
    if recovery_id > 3 {
        return Err(SafeKeyspaceError::crypto_error(format!(
            "Invalid recovery id: {}",
            recovery_id
        )));
    }

    let secp = Secp256k1::verification_only();
    let msg = Message::from_digest(digest.0);
    let rec_id = RecoveryId::from_i32(recovery_id as i32)?;
    let recoverable_sig = RecoverableSignature::from_compact(&packed[..64], rec_id)?;
    let public_key = secp.recover_ecdsa(&msg, &recoverable_sig)?;

    PublicKeyPoints::from_uncompressed(&public_key.serialize_uncompressed())
}

/// Address that produced `signature` over `digest`
pub fn recover_address(digest: H256, signature: &Signature) -> SafeKeyspaceResult<Address> {
    Ok(recover_public_key(digest, signature)?.address())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_personal_sign_hash_known_vector() {
        // keccak256("\x19Ethereum Signed Message:\n5hello")
        assert_eq!(
            hex::encode(personal_sign_hash(b"hello")),
            "50b2c43fd39106bafbba0da34fc430e1f91e3c96ea2acee2bc34119f92b37750"
        );
    }

    #[test]
    fn test_rejects_bad_recovery_id() {
        let sig = Signature {
            r: 1u64.into(),
            s: 1u64.into(),
            v: 40,
        };
        assert!(recover_public_key(H256::zero(), &sig).is_err());
    }
}
