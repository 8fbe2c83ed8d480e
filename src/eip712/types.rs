//! EIP-712 Type Definitions
//!
//! Core data structures for EIP-712 typed data.

use ethers_core::types::U256;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{ErrorCode, SafeKeyspaceError};

/// A field in a struct type definition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TypedDataField {
    /// The name of the field
    pub name: String,
    /// The type of the field (e.g., "address", "uint256", "bytes32")
    #[serde(rename = "type")]
    pub type_name: String,
}

impl TypedDataField {
    pub fn new(name: &str, type_name: &str) -> Self {
        Self {
            name: name.to_string(),
            type_name: type_name.to_string(),
        }
    }
}

/// The EIP-712 domain separator data
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Eip712Domain {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// The EIP-155 chain ID (number, decimal string or hex string)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<serde_json::Value>,

    /// The address of the contract that will verify the signature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verifying_contract: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
}

impl Eip712Domain {
    /// Get the chain ID as a 256-bit integer
    pub fn chain_id_u256(&self) -> Option<U256> {
        self.chain_id.as_ref().and_then(|v| {
            if let Some(n) = v.as_u64() {
                Some(U256::from(n))
            } else if let Some(s) = v.as_str() {
                if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                    U256::from_str_radix(hex, 16).ok()
                } else {
                    U256::from_dec_str(s).ok()
                }
            } else {
                None
            }
        })
    }

    /// Get the chain ID as a big-endian 32-byte word
    pub fn chain_id_bytes(&self) -> Option<[u8; 32]> {
        self.chain_id_u256().map(|id| {
            let mut bytes = [0u8; 32];
            id.to_big_endian(&mut bytes);
            bytes
        })
    }

    /// The `EIP712Domain` fields implied by which values are present
    pub fn fields(&self) -> Vec<TypedDataField> {
        let mut fields = Vec::new();
        if self.name.is_some() {
            fields.push(TypedDataField::new("name", "string"));
        }
        if self.version.is_some() {
            fields.push(TypedDataField::new("version", "string"));
        }
        if self.chain_id.is_some() {
            fields.push(TypedDataField::new("chainId", "uint256"));
        }
        if self.verifying_contract.is_some() {
            fields.push(TypedDataField::new("verifyingContract", "address"));
        }
        if self.salt.is_some() {
            fields.push(TypedDataField::new("salt", "bytes32"));
        }
        fields
    }
}

/// Complete EIP-712 typed data structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TypedData {
    /// Type definitions (struct name -> fields)
    pub types: HashMap<String, Vec<TypedDataField>>,

    /// The name of the primary type being signed
    pub primary_type: String,

    pub domain: Eip712Domain,

    /// The message data, keyed by field name
    pub message: serde_json::Value,
}

impl TypedData {
    /// Validate the typed data structure
    pub fn validate(&self) -> Result<(), Eip712Error> {
        if !self.types.contains_key(&self.primary_type) {
            return Err(Eip712Error::InvalidPrimaryType(self.primary_type.clone()));
        }

        for fields in self.types.values() {
            for field in fields {
                self.validate_type(&field.type_name)?;
            }
        }

        Ok(())
    }

    /// Check if a type is either built in or defined in `types`
    fn validate_type(&self, type_name: &str) -> Result<(), Eip712Error> {
        let base_type = match type_name.find('[') {
            Some(pos) if type_name.ends_with(']') => &type_name[..pos],
            Some(_) => return Err(Eip712Error::InvalidType(type_name.to_string())),
            None => type_name,
        };

        if is_atomic_type(base_type) || is_dynamic_type(base_type) {
            return Ok(());
        }

        if self.types.contains_key(base_type) {
            return Ok(());
        }

        Err(Eip712Error::InvalidType(type_name.to_string()))
    }
}

/// Errors that can occur while hashing typed data
#[derive(Debug, Clone, thiserror::Error)]
pub enum Eip712Error {
    #[error("Invalid type: {0}")]
    InvalidType(String),

    #[error("Invalid primary type: {0}")]
    InvalidPrimaryType(String),

    #[error("Missing field: {0}")]
    MissingField(String),

    #[error("Invalid value for type {type_name}: {value}")]
    InvalidValue { type_name: String, value: String },

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}

impl From<Eip712Error> for SafeKeyspaceError {
    fn from(e: Eip712Error) -> Self {
        let code = match e {
            Eip712Error::InvalidAddress(_) => ErrorCode::InvalidAddress,
            _ => ErrorCode::EncodingError,
        };
        SafeKeyspaceError::new(code, e.to_string())
    }
}

/// Check if a type is an atomic (fixed-size) type
pub fn is_atomic_type(type_name: &str) -> bool {
    if type_name == "address" || type_name == "bool" {
        return true;
    }

    if let Some(bits) = type_name.strip_prefix("uint") {
        if let Ok(n) = bits.parse::<u32>() {
            return n > 0 && n <= 256 && n % 8 == 0;
        }
        return false;
    }

    if type_name != "bytes" {
        if let Some(size) = type_name.strip_prefix("bytes") {
            if let Ok(n) = size.parse::<u32>() {
                return n > 0 && n <= 32;
            }
        }
    }

    false
}

/// Check if a type is a dynamic type
pub fn is_dynamic_type(type_name: &str) -> bool {
    type_name == "bytes" || type_name == "string"
}
