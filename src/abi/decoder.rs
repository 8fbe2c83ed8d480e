//! ABI decoder for Solidity/EVM contracts

use ethers_core::types::{Address, U256};

use super::selector::KnownSelectors;
use super::types::*;

/// ABI decoder
pub struct AbiDecoder;

impl AbiDecoder {
    /// Decode a single value from bytes according to its type
    pub fn decode_value(data: &[u8], abi_type: &AbiType, offset: usize) -> Result<(AbiValue, usize), AbiError> {
        if data.len() < offset + 32 {
            return Err(AbiError::DecodingError("Insufficient data".to_string()));
        }

        match abi_type {
            AbiType::Uint(bits) => {
                let value = U256::from_big_endian(&data[offset..offset + 32]);
                if *bits < 256 && value.bits() > *bits {
                    return Err(AbiError::Overflow(format!("uint{}", bits)));
                }
                Ok((AbiValue::Uint(value), offset + 32))
            }

            AbiType::Address => {
                let addr = Address::from_slice(&data[offset + 12..offset + 32]);
                Ok((AbiValue::Address(addr), offset + 32))
            }

            AbiType::Bool => {
                let value = data[offset + 31] != 0;
                Ok((AbiValue::Bool(value), offset + 32))
            }

            AbiType::FixedBytes(size) => {
                Ok((AbiValue::FixedBytes(data[offset..offset + size].to_vec()), offset + 32))
            }

            AbiType::Bytes => Self::decode_dynamic_bytes(data, offset),

            AbiType::String => {
                let (value, new_offset) = Self::decode_dynamic_bytes(data, offset)?;
                let bytes = value.as_bytes()?.to_vec();
                let s = String::from_utf8(bytes)
                    .map_err(|_| AbiError::DecodingError("Invalid UTF-8 in string".to_string()))?;
                Ok((AbiValue::String(s), new_offset))
            }

            AbiType::Array(inner_type) => Self::decode_dynamic_array(data, offset, inner_type),

            AbiType::Tuple(types) => Self::decode_tuple(data, offset, types),
        }
    }

    /// Decode multiple values (for function return values)
    pub fn decode(data: &[u8], types: &[AbiType]) -> Result<Vec<AbiValue>, AbiError> {
        match Self::decode_tuple(data, 0, types)? {
            (AbiValue::Tuple(values), _) => Ok(values),
            _ => Err(AbiError::DecodingError("Expected tuple".to_string())),
        }
    }

    /// Decode a return value consisting of exactly one value
    pub fn decode_single(data: &[u8], abi_type: &AbiType) -> Result<AbiValue, AbiError> {
        Self::decode(data, std::slice::from_ref(abi_type))?
            .pop()
            .ok_or_else(|| AbiError::DecodingError("Empty return data".to_string()))
    }

    /// Decode a tuple
    fn decode_tuple(data: &[u8], base_offset: usize, types: &[AbiType]) -> Result<(AbiValue, usize), AbiError> {
        let mut values = Vec::with_capacity(types.len());
        let mut head_offset = base_offset;

        for abi_type in types {
            if abi_type.is_dynamic() {
                // Dynamic types store an offset relative to the tuple start
                if data.len() < head_offset + 32 {
                    return Err(AbiError::DecodingError("Insufficient data for offset".to_string()));
                }

                let data_offset = base_offset + read_usize(&data[head_offset..head_offset + 32])?;
                let (value, _) = Self::decode_value(data, abi_type, data_offset)?;
                values.push(value);
                head_offset += 32;
            } else {
                let (value, new_offset) = Self::decode_value(data, abi_type, head_offset)?;
                values.push(value);
                head_offset = new_offset;
            }
        }

        Ok((AbiValue::Tuple(values), head_offset))
    }

    /// Decode dynamic bytes
    fn decode_dynamic_bytes(data: &[u8], offset: usize) -> Result<(AbiValue, usize), AbiError> {
        if data.len() < offset + 32 {
            return Err(AbiError::DecodingError("Insufficient data for length".to_string()));
        }

        let length = read_usize(&data[offset..offset + 32])?;
        if data.len() < offset + 32 + length {
            return Err(AbiError::DecodingError("Insufficient data for bytes".to_string()));
        }

        let bytes = data[offset + 32..offset + 32 + length].to_vec();
        let padded_length = length.div_ceil(32) * 32;

        Ok((AbiValue::Bytes(bytes), offset + 32 + padded_length))
    }

    /// Decode a dynamic array
    fn decode_dynamic_array(data: &[u8], offset: usize, inner_type: &AbiType) -> Result<(AbiValue, usize), AbiError> {
        if data.len() < offset + 32 {
            return Err(AbiError::DecodingError("Insufficient data for array length".to_string()));
        }

        let length = read_usize(&data[offset..offset + 32])?;
        // Every element needs at least one head word
        if length > (data.len() - offset) / 32 {
            return Err(AbiError::DecodingError(format!("Array length {} exceeds data", length)));
        }

        let element_types: Vec<AbiType> = (0..length).map(|_| inner_type.clone()).collect();
        match Self::decode_tuple(data, offset + 32, &element_types)? {
            (AbiValue::Tuple(values), end_offset) => Ok((AbiValue::Array(values), end_offset)),
            _ => Err(AbiError::DecodingError("Expected tuple from array elements".to_string())),
        }
    }
}

/// Extract the reason string from `Error(string)` revert data
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    if data.len() < 4 || data[..4] != KnownSelectors::ERROR_STRING {
        return None;
    }
    AbiDecoder::decode_single(&data[4..], &AbiType::String)
        .ok()
        .and_then(|v| v.as_string().ok().map(str::to_string))
}

fn read_usize(word: &[u8]) -> Result<usize, AbiError> {
    let value = U256::from_big_endian(word);
    if value > U256::from(u32::MAX) {
        return Err(AbiError::DecodingError(format!("Offset or length too large: {}", value)));
    }
    Ok(value.as_usize())
}
