//! ABI type definitions for Solidity/EVM contracts

use ethers_core::types::{Address, U256};
use std::fmt;
use thiserror::Error;

/// Solidity types used by the Safe and keyspace contracts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiType {
    /// uintN, N in 8..=256 step 8
    Uint(usize),

    // Address (20 bytes)
    Address,

    // Boolean
    Bool,

    /// bytesN, N in 1..=32
    FixedBytes(usize),

    // Dynamic bytes
    Bytes,

    // Dynamic string
    String,

    // Dynamic array T[]
    Array(Box<AbiType>),

    // Tuple (struct)
    Tuple(Vec<AbiType>),
}

impl AbiType {
    pub const UINT8: AbiType = AbiType::Uint(8);
    pub const UINT256: AbiType = AbiType::Uint(256);
    pub const BYTES32: AbiType = AbiType::FixedBytes(32);

    /// Check if the type is dynamic (requires offset encoding)
    pub fn is_dynamic(&self) -> bool {
        match self {
            AbiType::Bytes | AbiType::String | AbiType::Array(_) => true,
            AbiType::Tuple(components) => components.iter().any(|t| t.is_dynamic()),
            _ => false,
        }
    }

    /// Get the size in bytes this type occupies in the head
    pub fn head_size(&self) -> usize {
        match self {
            AbiType::Tuple(components) if !self.is_dynamic() => {
                components.iter().map(|t| t.head_size()).sum()
            }
            _ => 32,
        }
    }

    /// Parse type from string representation
    pub fn parse(s: &str) -> Result<Self, AbiError> {
        let s = s.trim();

        if let Some(inner) = s.strip_suffix("[]") {
            return Ok(AbiType::Array(Box::new(Self::parse(inner)?)));
        }

        if s.starts_with('(') && s.ends_with(')') {
            let inner = &s[1..s.len() - 1];
            return Ok(AbiType::Tuple(split_top_level(inner)?));
        }

        match s {
            "uint" => Ok(AbiType::Uint(256)),
            "address" => Ok(AbiType::Address),
            "bool" => Ok(AbiType::Bool),
            "bytes" => Ok(AbiType::Bytes),
            "string" => Ok(AbiType::String),

            s if s.starts_with("bytes") => {
                let size: usize = s[5..]
                    .parse()
                    .map_err(|_| AbiError::InvalidType(format!("Invalid bytes size: {}", s)))?;
                if size == 0 || size > 32 {
                    return Err(AbiError::InvalidType(format!("bytes size must be 1-32: {}", size)));
                }
                Ok(AbiType::FixedBytes(size))
            }

            s if s.starts_with("uint") => {
                let bits: usize = s[4..]
                    .parse()
                    .map_err(|_| AbiError::InvalidType(format!("Invalid uint size: {}", s)))?;
                if bits == 0 || bits > 256 || bits % 8 != 0 {
                    return Err(AbiError::InvalidType(format!("Unsupported uint size: {}", bits)));
                }
                Ok(AbiType::Uint(bits))
            }

            _ => Err(AbiError::InvalidType(format!("Unknown type: {}", s))),
        }
    }

    /// Get the canonical type string for signature calculation
    pub fn canonical_type(&self) -> String {
        match self {
            AbiType::Uint(bits) => format!("uint{}", bits),
            AbiType::Address => "address".to_string(),
            AbiType::Bool => "bool".to_string(),
            AbiType::FixedBytes(size) => format!("bytes{}", size),
            AbiType::Bytes => "bytes".to_string(),
            AbiType::String => "string".to_string(),
            AbiType::Array(inner) => format!("{}[]", inner.canonical_type()),
            AbiType::Tuple(components) => {
                let inner = components
                    .iter()
                    .map(|t| t.canonical_type())
                    .collect::<Vec<_>>()
                    .join(",");
                format!("({})", inner)
            }
        }
    }
}

impl fmt::Display for AbiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical_type())
    }
}

/// Split a comma-separated type list, respecting nested tuples
pub(crate) fn split_top_level(s: &str) -> Result<Vec<AbiType>, AbiError> {
    let mut components = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;

    for c in s.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth -= 1;
                current.push(c);
            }
            ',' if depth == 0 => {
                components.push(AbiType::parse(current.trim())?);
                current.clear();
            }
            _ => current.push(c),
        }
    }

    if depth != 0 {
        return Err(AbiError::InvalidType(format!("Unbalanced parentheses: {}", s)));
    }
    if !current.trim().is_empty() {
        components.push(AbiType::parse(current.trim())?);
    }

    Ok(components)
}

/// ABI value - runtime representation of Solidity values
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiValue {
    Uint(U256),
    Address(Address),
    Bool(bool),
    FixedBytes(Vec<u8>),
    Bytes(Vec<u8>),
    String(String),
    Array(Vec<AbiValue>),
    Tuple(Vec<AbiValue>),
}

impl AbiValue {
    pub fn uint(value: impl Into<U256>) -> Self {
        AbiValue::Uint(value.into())
    }

    pub fn address_array(addresses: &[Address]) -> Self {
        AbiValue::Array(addresses.iter().map(|a| AbiValue::Address(*a)).collect())
    }

    pub fn as_uint(&self) -> Result<U256, AbiError> {
        match self {
            AbiValue::Uint(u) => Ok(*u),
            other => Err(other.mismatch("uint256")),
        }
    }

    pub fn as_address(&self) -> Result<Address, AbiError> {
        match self {
            AbiValue::Address(a) => Ok(*a),
            other => Err(other.mismatch("address")),
        }
    }

    pub fn as_bool(&self) -> Result<bool, AbiError> {
        match self {
            AbiValue::Bool(b) => Ok(*b),
            other => Err(other.mismatch("bool")),
        }
    }

    pub fn as_bytes(&self) -> Result<&[u8], AbiError> {
        match self {
            AbiValue::Bytes(b) | AbiValue::FixedBytes(b) => Ok(b),
            other => Err(other.mismatch("bytes")),
        }
    }

    pub fn as_string(&self) -> Result<&str, AbiError> {
        match self {
            AbiValue::String(s) => Ok(s),
            other => Err(other.mismatch("string")),
        }
    }

    pub fn as_array(&self) -> Result<&[AbiValue], AbiError> {
        match self {
            AbiValue::Array(values) | AbiValue::Tuple(values) => Ok(values),
            other => Err(other.mismatch("array")),
        }
    }

    /// Type name used in mismatch errors
    pub fn type_name(&self) -> &'static str {
        match self {
            AbiValue::Uint(_) => "uint",
            AbiValue::Address(_) => "address",
            AbiValue::Bool(_) => "bool",
            AbiValue::FixedBytes(_) => "bytesN",
            AbiValue::Bytes(_) => "bytes",
            AbiValue::String(_) => "string",
            AbiValue::Array(_) => "array",
            AbiValue::Tuple(_) => "tuple",
        }
    }

    fn mismatch(&self, expected: &str) -> AbiError {
        AbiError::TypeMismatch {
            expected: expected.to_string(),
            got: self.type_name().to_string(),
        }
    }
}

/// ABI errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbiError {
    #[error("Invalid type: {0}")]
    InvalidType(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Decoding error: {0}")]
    DecodingError(String),

    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Value does not fit in {0}")]
    Overflow(String),
}

impl From<AbiError> for crate::error::SafeKeyspaceError {
    fn from(e: AbiError) -> Self {
        crate::error::SafeKeyspaceError::encoding(e.to_string())
    }
}
