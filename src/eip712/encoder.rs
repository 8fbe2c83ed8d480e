//! EIP-712 Type Encoding
//!
//! Implements the `encodeType` / `encodeData` rules for typed data.

use super::types::*;
use crate::utils::keccak256;
use ethers_core::types::U256;
use std::collections::{BTreeSet, HashMap};

/// Encode a type string for a struct type
/// Format: "TypeName(type1 name1,type2 name2,...)" followed by referenced
/// struct types in alphabetical order
pub fn encode_type(
    type_name: &str,
    types: &HashMap<String, Vec<TypedDataField>>,
) -> Result<String, Eip712Error> {
    let fields = types
        .get(type_name)
        .ok_or_else(|| Eip712Error::InvalidType(type_name.to_string()))?;

    let mut result = format_type_string(type_name, fields);

    // BTreeSet iterates in sorted order
    for dep in find_type_dependencies(type_name, types) {
        if dep == type_name {
            continue;
        }
        if let Some(dep_fields) = types.get(&dep) {
            result.push_str(&format_type_string(&dep, dep_fields));
        }
    }

    Ok(result)
}

fn format_type_string(type_name: &str, fields: &[TypedDataField]) -> String {
    let field_strs: Vec<String> = fields
        .iter()
        .map(|f| format!("{} {}", f.type_name, f.name))
        .collect();

    format!("{}({})", type_name, field_strs.join(","))
}

/// Find all struct types reachable from `type_name` (including itself)
pub fn find_type_dependencies(
    type_name: &str,
    types: &HashMap<String, Vec<TypedDataField>>,
) -> BTreeSet<String> {
    let mut dependencies = BTreeSet::new();
    let mut to_visit = vec![type_name.to_string()];

    while let Some(current) = to_visit.pop() {
        if dependencies.contains(&current) {
            continue;
        }

        if let Some(fields) = types.get(&current) {
            dependencies.insert(current.clone());

            for field in fields {
                let base_type = get_base_type(&field.type_name);
                if types.contains_key(base_type) && !dependencies.contains(base_type) {
                    to_visit.push(base_type.to_string());
                }
            }
        }
    }

    dependencies
}

/// Strip array suffixes: "Person[]" -> "Person", "uint256[10]" -> "uint256"
pub fn get_base_type(type_name: &str) -> &str {
    match type_name.find('[') {
        Some(pos) => &type_name[..pos],
        None => type_name,
    }
}

/// typeHash = keccak256(encodeType(typeOf(s)))
pub fn type_hash(
    type_name: &str,
    types: &HashMap<String, Vec<TypedDataField>>,
) -> Result<[u8; 32], Eip712Error> {
    let encoded = encode_type(type_name, types)?;
    Ok(keccak256(encoded.as_bytes()))
}

/// Encode a value according to its type.
///
/// Struct values come back as `typeHash ‖ encodeData`; callers hash them
/// when they appear as members.
pub fn encode_value(
    type_name: &str,
    value: &serde_json::Value,
    types: &HashMap<String, Vec<TypedDataField>>,
) -> Result<Vec<u8>, Eip712Error> {
    if type_name.contains('[') {
        return encode_array(type_name, value, types);
    }

    match type_name {
        "bytes" => return encode_bytes(value),
        "string" => return encode_string(value),
        _ => {}
    }

    if types.contains_key(type_name) {
        return encode_struct(type_name, value, types);
    }

    encode_atomic(type_name, value)
}

/// Reference and dynamic members are hashed, atomic members inlined
fn member_word(
    type_name: &str,
    encoded: Vec<u8>,
    types: &HashMap<String, Vec<TypedDataField>>,
) -> Vec<u8> {
    let hashed = type_name.contains('[')
        || types.contains_key(get_base_type(type_name))
        || is_dynamic_type(type_name);
    if hashed {
        keccak256(&encoded).to_vec()
    } else {
        encoded
    }
}

fn encode_struct(
    type_name: &str,
    value: &serde_json::Value,
    types: &HashMap<String, Vec<TypedDataField>>,
) -> Result<Vec<u8>, Eip712Error> {
    let obj = value.as_object().ok_or_else(|| Eip712Error::InvalidValue {
        type_name: type_name.to_string(),
        value: value.to_string(),
    })?;

    let fields = types
        .get(type_name)
        .ok_or_else(|| Eip712Error::InvalidType(type_name.to_string()))?;

    let mut encoded = Vec::with_capacity(32 * (fields.len() + 1));
    encoded.extend_from_slice(&type_hash(type_name, types)?);

    for field in fields {
        let field_value = obj
            .get(&field.name)
            .ok_or_else(|| Eip712Error::MissingField(format!("{}.{}", type_name, field.name)))?;

        let encoded_field = encode_value(&field.type_name, field_value, types)?;
        encoded.extend(member_word(&field.type_name, encoded_field, types));
    }

    Ok(encoded)
}

fn encode_array(
    type_name: &str,
    value: &serde_json::Value,
    types: &HashMap<String, Vec<TypedDataField>>,
) -> Result<Vec<u8>, Eip712Error> {
    let arr = value.as_array().ok_or_else(|| Eip712Error::InvalidValue {
        type_name: type_name.to_string(),
        value: value.to_string(),
    })?;

    let bracket_pos = type_name
        .rfind('[')
        .ok_or_else(|| Eip712Error::InvalidType(type_name.to_string()))?;
    let element_type = &type_name[..bracket_pos];

    let mut encoded = Vec::with_capacity(32 * arr.len());
    for item in arr {
        let item_encoded = encode_value(element_type, item, types)?;
        encoded.extend(member_word(element_type, item_encoded, types));
    }

    Ok(encoded)
}

/// Encode an atomic (fixed-size) value into one 32-byte word
fn encode_atomic(type_name: &str, value: &serde_json::Value) -> Result<Vec<u8>, Eip712Error> {
    let invalid = || Eip712Error::InvalidValue {
        type_name: type_name.to_string(),
        value: value.to_string(),
    };
    let mut result = [0u8; 32];

    if type_name == "address" {
        let addr = value.as_str().ok_or_else(invalid)?;
        let addr_bytes = parse_address(addr)?;
        result[12..].copy_from_slice(&addr_bytes);
        return Ok(result.to_vec());
    }

    if type_name == "bool" {
        let b = value.as_bool().ok_or_else(invalid)?;
        result[31] = u8::from(b);
        return Ok(result.to_vec());
    }

    if let Some(bits) = type_name.strip_prefix("uint") {
        let bits: usize = bits
            .parse()
            .map_err(|_| Eip712Error::InvalidType(type_name.to_string()))?;
        let n = parse_uint(type_name, value)?;
        if n.bits() > bits {
            return Err(invalid());
        }
        n.to_big_endian(&mut result);
        return Ok(result.to_vec());
    }

    if let Some(size) = type_name.strip_prefix("bytes") {
        let size: usize = size
            .parse()
            .map_err(|_| Eip712Error::InvalidType(type_name.to_string()))?;
        let hex_str = value.as_str().ok_or_else(invalid)?;
        let bytes = parse_hex(hex_str)?;
        if bytes.len() > size {
            return Err(Eip712Error::InvalidValue {
                type_name: type_name.to_string(),
                value: format!("bytes too long: {} > {}", bytes.len(), size),
            });
        }
        // bytesN is right-padded
        result[..bytes.len()].copy_from_slice(&bytes);
        return Ok(result.to_vec());
    }

    Err(Eip712Error::InvalidType(type_name.to_string()))
}

fn encode_bytes(value: &serde_json::Value) -> Result<Vec<u8>, Eip712Error> {
    let hex_str = value.as_str().ok_or_else(|| Eip712Error::InvalidValue {
        type_name: "bytes".to_string(),
        value: value.to_string(),
    })?;

    parse_hex(hex_str)
}

fn encode_string(value: &serde_json::Value) -> Result<Vec<u8>, Eip712Error> {
    let s = value.as_str().ok_or_else(|| Eip712Error::InvalidValue {
        type_name: "string".to_string(),
        value: value.to_string(),
    })?;

    Ok(s.as_bytes().to_vec())
}

fn parse_address(addr: &str) -> Result<[u8; 20], Eip712Error> {
    let addr = addr.strip_prefix("0x").unwrap_or(addr);

    if addr.len() != 40 {
        return Err(Eip712Error::InvalidAddress(format!(
            "invalid length: expected 40 hex chars, got {}",
            addr.len()
        )));
    }

    let bytes = hex::decode(addr)
        .map_err(|e| Eip712Error::InvalidAddress(format!("invalid hex: {}", e)))?;

    let mut result = [0u8; 20];
    result.copy_from_slice(&bytes);
    Ok(result)
}

/// Parse a uint given as a JSON number, decimal string or hex string
fn parse_uint(type_name: &str, value: &serde_json::Value) -> Result<U256, Eip712Error> {
    let invalid = || Eip712Error::InvalidValue {
        type_name: type_name.to_string(),
        value: value.to_string(),
    };

    match value {
        serde_json::Value::Number(n) => match n.as_u64() {
            Some(u) => Ok(U256::from(u)),
            None => U256::from_dec_str(&n.to_string()).map_err(|_| invalid()),
        },
        serde_json::Value::String(s) => {
            if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                if hex.is_empty() {
                    return Ok(U256::zero());
                }
                U256::from_str_radix(hex, 16).map_err(|_| invalid())
            } else {
                U256::from_dec_str(s).map_err(|_| invalid())
            }
        }
        _ => Err(invalid()),
    }
}

pub(crate) fn parse_hex(s: &str) -> Result<Vec<u8>, Eip712Error> {
    let s = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);

    hex::decode(s).map_err(|e| Eip712Error::EncodingError(format!("invalid hex: {}", e)))
}
