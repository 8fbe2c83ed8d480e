//! EIP-712 Hashing
//!
//! Domain separator, struct hashing and the final `\x19\x01` digest.

use super::encoder::{encode_value, parse_hex, type_hash};
use super::types::*;
use crate::utils::keccak256;
use std::collections::HashMap;

/// Magic prefix for EIP-712 encoding
const EIP712_PREFIX: &[u8] = b"\x19\x01";

/// domainSeparator = hashStruct(eip712Domain)
///
/// The `EIP712Domain` type is derived from the fields that are present,
/// ignoring any definition supplied in `types`.
pub fn domain_separator(domain: &Eip712Domain) -> Result<[u8; 32], Eip712Error> {
    let fields = domain.fields();
    let mut types = HashMap::new();
    types.insert("EIP712Domain".to_string(), fields.clone());

    let mut encoded = Vec::with_capacity(32 * (fields.len() + 1));
    encoded.extend_from_slice(&type_hash("EIP712Domain", &types)?);

    for field in &fields {
        match field.name.as_str() {
            "name" => {
                if let Some(ref name) = domain.name {
                    encoded.extend_from_slice(&keccak256(name.as_bytes()));
                }
            }
            "version" => {
                if let Some(ref version) = domain.version {
                    encoded.extend_from_slice(&keccak256(version.as_bytes()));
                }
            }
            "chainId" => {
                let bytes = domain.chain_id_bytes().ok_or_else(|| Eip712Error::InvalidValue {
                    type_name: "uint256".to_string(),
                    value: format!("{:?}", domain.chain_id),
                })?;
                encoded.extend_from_slice(&bytes);
            }
            "verifyingContract" => {
                if let Some(ref addr) = domain.verifying_contract {
                    let word = encode_value("address", &serde_json::json!(addr), &types)?;
                    encoded.extend(word);
                }
            }
            "salt" => {
                if let Some(ref salt) = domain.salt {
                    let salt_bytes = parse_hex(salt)?;
                    let mut padded = [0u8; 32];
                    let len = salt_bytes.len().min(32);
                    padded[..len].copy_from_slice(&salt_bytes[..len]);
                    encoded.extend_from_slice(&padded);
                }
            }
            _ => {}
        }
    }

    Ok(keccak256(&encoded))
}

/// hashStruct(s) = keccak256(typeHash ‖ encodeData(s))
pub fn hash_struct(
    type_name: &str,
    data: &serde_json::Value,
    types: &HashMap<String, Vec<TypedDataField>>,
) -> Result<[u8; 32], Eip712Error> {
    let encoded = encode_value(type_name, data, types)?;
    Ok(keccak256(&encoded))
}

/// Digest components, exposed for hardware and remote signers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eip712PreImage {
    pub domain_separator: [u8; 32],
    pub struct_hash: [u8; 32],
    pub final_hash: [u8; 32],
}

/// Calculate the pre-image components for EIP-712
pub fn get_pre_image(typed_data: &TypedData) -> Result<Eip712PreImage, Eip712Error> {
    typed_data.validate()?;

    let domain_separator = domain_separator(&typed_data.domain)?;
    let struct_hash = hash_struct(&typed_data.primary_type, &typed_data.message, &typed_data.types)?;

    let mut data = Vec::with_capacity(2 + 32 + 32);
    data.extend_from_slice(EIP712_PREFIX);
    data.extend_from_slice(&domain_separator);
    data.extend_from_slice(&struct_hash);

    Ok(Eip712PreImage {
        domain_separator,
        struct_hash,
        final_hash: keccak256(&data),
    })
}

/// hash = keccak256("\x19\x01" ‖ domainSeparator ‖ hashStruct(message))
pub fn hash_typed_data(typed_data: &TypedData) -> Result<[u8; 32], Eip712Error> {
    Ok(get_pre_image(typed_data)?.final_hash)
}
