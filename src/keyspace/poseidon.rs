//! circomlib-compatible Poseidon over the BN254 scalar field

use ark_bn254::Fr;
use ethers_core::types::H256;
use light_poseidon::{Poseidon, PoseidonBytesHasher};

use super::key::KeyMaterialError;

/// BN254 scalar field modulus
const FIELD_MODULUS: H256 = H256([
    0x30, 0x64, 0x4e, 0x72, 0xe1, 0x31, 0xa0, 0x29,
    0xb8, 0x50, 0x45, 0xb6, 0x81, 0x81, 0x58, 0x5d,
    0x28, 0x33, 0xe8, 0x48, 0x79, 0xb9, 0x70, 0x91,
    0x43, 0xe1, 0xf5, 0x93, 0xf0, 0x00, 0x00, 0x01,
]);

/// `poseidon(inputs)` with circomlib round constants.
///
/// Width is `inputs.len() + 1` with a zero capacity element; the result is
/// `state[0]` after the permutation, as a big-endian 32-byte word. Every
/// input must be below the field modulus.
pub fn poseidon_hash(inputs: &[H256]) -> Result<H256, KeyMaterialError> {
    if let Some(input) = inputs.iter().find(|input| **input >= FIELD_MODULUS) {
        return Err(KeyMaterialError::Poseidon(format!(
            "input {:?} is not a field element",
            input
        )));
    }

    let mut hasher = Poseidon::<Fr>::new_circom(inputs.len())
        .map_err(|e| KeyMaterialError::Poseidon(e.to_string()))?;

    let slices: Vec<&[u8]> = inputs.iter().map(|word| word.as_bytes()).collect();
    let out = hasher
        .hash_bytes_be(&slices)
        .map_err(|e| KeyMaterialError::Poseidon(e.to_string()))?;

    Ok(H256(out))
}
