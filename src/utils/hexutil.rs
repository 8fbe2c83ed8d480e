//! Hex, hashing and address helpers
//!
//! The keystore service treats keys as big-endian integers, so every key
//! sent to it goes through [`strip_leading_zeros`] first.

use ethers_core::types::{Address, H256};
use rand::RngCore;
use tiny_keccak::{Hasher, Keccak};

use crate::error::{SafeKeyspaceError, SafeKeyspaceResult};

/// Keccak256 hash
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut out = [0u8; 32];
    hasher.finalize(&mut out);
    out
}

/// Keccak256 over several slices without concatenating them first
pub fn keccak256_concat(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    for part in parts {
        hasher.update(part);
    }
    let mut out = [0u8; 32];
    hasher.finalize(&mut out);
    out
}

/// Convert raw address bytes to checksummed Ethereum address
pub fn to_checksum_address(address: &Address) -> String {
    let lower = hex::encode(address.as_bytes());
    let hash = keccak256(lower.as_bytes());

    let mut result = String::from("0x");
    for (i, ch) in lower.chars().enumerate() {
        let byte = hash[i / 2];
        let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };

        if ch.is_ascii_digit() {
            result.push(ch);
        } else if nibble >= 8 {
            result.push(ch.to_ascii_uppercase());
        } else {
            result.push(ch);
        }
    }

    result
}

/// Encode bytes as a `0x`-prefixed lowercase hex string
pub fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Decode a hex string with or without `0x` prefix. Odd lengths get a
/// leading zero nibble so canonicalized keys decode too.
pub fn decode_hex(s: &str) -> SafeKeyspaceResult<Vec<u8>> {
    let s = s.trim();
    let s = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    if s.len() % 2 == 1 {
        return Ok(hex::decode(format!("0{}", s))?);
    }
    Ok(hex::decode(s)?)
}

/// Decode a hex string into a left-padded 32-byte word
pub fn decode_word(s: &str) -> SafeKeyspaceResult<H256> {
    let bytes = decode_hex(s)?;
    if bytes.len() > 32 {
        return Err(SafeKeyspaceError::parse_error(format!(
            "value does not fit in 32 bytes: {} bytes",
            bytes.len()
        )));
    }
    let mut word = [0u8; 32];
    word[32 - bytes.len()..].copy_from_slice(&bytes);
    Ok(H256(word))
}

/// Strip leading zero nibbles from a hex string, keeping the `0x` prefix.
///
/// `0x000abc` becomes `0xabc`; an all-zero value becomes `0x`.
pub fn strip_leading_zeros(hex_str: &str) -> String {
    match hex_str.strip_prefix("0x") {
        Some(body) => format!("0x{}", body.trim_start_matches('0')),
        None => hex_str.to_string(),
    }
}

/// Parse and validate an Ethereum address string
pub fn parse_address(s: &str) -> SafeKeyspaceResult<Address> {
    let trimmed = s.trim();
    let body = trimmed.strip_prefix("0x").ok_or_else(|| {
        SafeKeyspaceError::invalid_address(format!("address must start with 0x: {}", trimmed))
    })?;
    if body.len() != 40 {
        return Err(SafeKeyspaceError::invalid_address(format!(
            "invalid length: expected 40 hex chars, got {}",
            body.len()
        )));
    }
    let bytes = hex::decode(body)
        .map_err(|e| SafeKeyspaceError::invalid_address(format!("invalid hex: {}", e)))?;
    Ok(Address::from_slice(&bytes))
}

/// Generate 32 cryptographically random bytes
pub fn random_bytes32() -> [u8; 32] {
    let mut out = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut out);
    out
}
