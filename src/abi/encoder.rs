//! ABI encoder for Solidity/EVM contracts

use ethers_core::types::U256;

use super::selector::AbiSelector;
use super::types::*;

/// ABI encoder
pub struct AbiEncoder;

impl AbiEncoder {
    /// Encode a single value according to its type
    pub fn encode_value(value: &AbiValue, abi_type: &AbiType) -> Result<Vec<u8>, AbiError> {
        match (value, abi_type) {
            (AbiValue::Uint(u), AbiType::Uint(bits)) => {
                check_uint_width(*u, *bits)?;
                Ok(word(*u).to_vec())
            }

            (AbiValue::Address(addr), AbiType::Address) => {
                let mut result = [0u8; 32];
                result[12..].copy_from_slice(addr.as_bytes());
                Ok(result.to_vec())
            }

            (AbiValue::Bool(b), AbiType::Bool) => {
                let mut result = [0u8; 32];
                result[31] = u8::from(*b);
                Ok(result.to_vec())
            }

            // Fixed bytes are right-padded
            (AbiValue::FixedBytes(bytes), AbiType::FixedBytes(size)) => {
                if bytes.len() != *size {
                    return Err(AbiError::TypeMismatch {
                        expected: format!("bytes{}", size),
                        got: format!("{} bytes", bytes.len()),
                    });
                }
                let mut result = [0u8; 32];
                result[..bytes.len()].copy_from_slice(bytes);
                Ok(result.to_vec())
            }

            (AbiValue::Bytes(bytes), AbiType::Bytes) => Ok(Self::encode_dynamic_bytes(bytes)),

            (AbiValue::String(s), AbiType::String) => Ok(Self::encode_dynamic_bytes(s.as_bytes())),

            (AbiValue::Array(values), AbiType::Array(inner_type)) => {
                Self::encode_dynamic_array(values, inner_type)
            }

            (AbiValue::Tuple(values), AbiType::Tuple(types)) => {
                if values.len() != types.len() {
                    return Err(AbiError::TypeMismatch {
                        expected: format!("tuple of {} elements", types.len()),
                        got: format!("tuple of {} elements", values.len()),
                    });
                }
                Self::encode_tuple(values, types)
            }

            _ => Err(AbiError::TypeMismatch {
                expected: abi_type.canonical_type(),
                got: value.type_name().to_string(),
            }),
        }
    }

    /// Encode multiple values (`abi.encode`)
    pub fn encode(values: &[AbiValue], types: &[AbiType]) -> Result<Vec<u8>, AbiError> {
        if values.len() != types.len() {
            return Err(AbiError::EncodingError(format!(
                "Value count {} doesn't match type count {}",
                values.len(),
                types.len()
            )));
        }

        Self::encode_tuple(values, types)
    }

    /// Encode a tuple (also used for function parameters)
    fn encode_tuple(values: &[AbiValue], types: &[AbiType]) -> Result<Vec<u8>, AbiError> {
        let head_size: usize = types.iter().map(|t| t.head_size()).sum();

        let mut head = Vec::with_capacity(head_size);
        let mut tail = Vec::new();

        for (value, abi_type) in values.iter().zip(types.iter()) {
            let encoded = Self::encode_value(value, abi_type)?;
            if abi_type.is_dynamic() {
                // Head holds the offset of the tail entry
                let offset = U256::from(head_size + tail.len());
                head.extend_from_slice(&word(offset));
                tail.extend_from_slice(&encoded);
            } else {
                head.extend_from_slice(&encoded);
            }
        }

        head.extend_from_slice(&tail);
        Ok(head)
    }

    /// Length word followed by the data right-padded to 32 bytes
    fn encode_dynamic_bytes(bytes: &[u8]) -> Vec<u8> {
        let padded_len = bytes.len().div_ceil(32) * 32;
        let mut result = Vec::with_capacity(32 + padded_len);
        result.extend_from_slice(&word(U256::from(bytes.len())));
        result.extend_from_slice(bytes);
        result.resize(32 + padded_len, 0);
        result
    }

    fn encode_dynamic_array(values: &[AbiValue], inner_type: &AbiType) -> Result<Vec<u8>, AbiError> {
        let mut result = Vec::new();
        result.extend_from_slice(&word(U256::from(values.len())));

        let types: Vec<AbiType> = values.iter().map(|_| inner_type.clone()).collect();
        result.extend_from_slice(&Self::encode_tuple(values, &types)?);
        Ok(result)
    }

    /// Encode a function call by signature string
    /// e.g., "enableModule(address)" with values
    pub fn encode_function_call_by_signature(
        signature: &str,
        values: &[AbiValue],
    ) -> Result<Vec<u8>, AbiError> {
        let selector = AbiSelector::selector_from_signature(signature);
        let types = Self::parse_types_from_signature(signature)?;

        if types.len() != values.len() {
            return Err(AbiError::EncodingError(format!(
                "Expected {} values for signature '{}', got {}",
                types.len(),
                signature,
                values.len()
            )));
        }

        let params = Self::encode(values, &types)?;

        let mut result = Vec::with_capacity(4 + params.len());
        result.extend_from_slice(&selector);
        result.extend_from_slice(&params);
        Ok(result)
    }

    /// Parse parameter types from a function signature
    pub fn parse_types_from_signature(signature: &str) -> Result<Vec<AbiType>, AbiError> {
        let start = signature
            .find('(')
            .ok_or_else(|| AbiError::InvalidType("Missing '(' in signature".to_string()))?;
        let end = signature
            .rfind(')')
            .ok_or_else(|| AbiError::InvalidType("Missing ')' in signature".to_string()))?;

        split_top_level(&signature[start + 1..end])
    }
}

/// 32-byte big-endian word
pub(crate) fn word(value: U256) -> [u8; 32] {
    let mut out = [0u8; 32];
    value.to_big_endian(&mut out);
    out
}

fn check_uint_width(value: U256, bits: usize) -> Result<(), AbiError> {
    if bits < 256 && value.bits() > bits {
        return Err(AbiError::Overflow(format!("uint{}", bits)));
    }
    Ok(())
}

#[cfg(test)]
mod encoder_tests {
    use super::*;
    use ethers_core::types::Address;

    #[test]
    fn test_encode_static_values() {
        let encoded = AbiEncoder::encode(
            &[AbiValue::uint(1u64), AbiValue::Bool(true)],
            &[AbiType::UINT256, AbiType::Bool],
        )
        .unwrap();
        assert_eq!(encoded.len(), 64);
        assert_eq!(encoded[31], 1);
        assert_eq!(encoded[63], 1);
    }

    #[test]
    fn test_encode_dynamic_bytes_offsets() {
        let encoded = AbiEncoder::encode(
            &[AbiValue::Bytes(vec![0xaa; 33]), AbiValue::uint(7u64)],
            &[AbiType::Bytes, AbiType::UINT256],
        )
        .unwrap();
        // offset, uint, length, two padded data words
        assert_eq!(encoded.len(), 32 * 5);
        assert_eq!(encoded[31], 0x40);
        assert_eq!(encoded[63], 7);
        assert_eq!(encoded[95], 33);
        assert_eq!(encoded[96], 0xaa);
        assert_eq!(encoded[128], 0xaa);
        assert_eq!(encoded[129], 0);
    }

    #[test]
    fn test_encode_uint8_overflow() {
        let result = AbiEncoder::encode(&[AbiValue::uint(256u64)], &[AbiType::UINT8]);
        assert!(matches!(result, Err(AbiError::Overflow(_))));
    }

    #[test]
    fn test_encode_function_call_arity() {
        let result = AbiEncoder::encode_function_call_by_signature(
            "enableModule(address)",
            &[],
        );
        assert!(result.is_err());
    }
}
