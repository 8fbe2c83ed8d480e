//! MultiSend batch encoding
//!
//! Each entry packs to `uint8 operation ‖ address to ‖ uint256 value ‖
//! uint256 dataLength ‖ data` with no padding between entries. Entries keep
//! the caller's order.

use ethers_core::types::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

use super::contracts::multi_send_call;
use crate::error::{ErrorCode, SafeKeyspaceError, SafeKeyspaceResult};
use crate::types::{OperationKind, SafeCall};

/// Fixed-size prefix of every packed entry
const ENTRY_HEADER_LEN: usize = 1 + 20 + 32 + 32;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MultiSendError {
    #[error("Truncated batch: entry at offset {offset} needs {needed} bytes, {available} left")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Unknown operation {operation} at offset {offset}")]
    InvalidOperation { offset: usize, operation: u8 },

    #[error("Data length {0} does not fit in memory")]
    LengthOverflow(U256),
}

impl From<MultiSendError> for SafeKeyspaceError {
    fn from(e: MultiSendError) -> Self {
        SafeKeyspaceError::new(ErrorCode::EncodingError, e.to_string())
    }
}

/// One sub-call of a batch. Unset fields take the packing defaults:
/// DelegateCall, zero value, empty data.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MultiSendEntry {
    pub to: Address,
    pub value: Option<U256>,
    pub data: Option<Bytes>,
    pub operation: Option<OperationKind>,
}

impl MultiSendEntry {
    pub fn new(to: Address) -> Self {
        Self {
            to,
            ..Default::default()
        }
    }

    /// A plain call (operation 0)
    pub fn call(to: Address, data: impl Into<Bytes>) -> Self {
        Self::new(to)
            .with_data(data)
            .with_operation(OperationKind::Call)
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn with_operation(mut self, operation: OperationKind) -> Self {
        self.operation = Some(operation);
        self
    }

    pub fn operation(&self) -> OperationKind {
        self.operation.unwrap_or(OperationKind::DelegateCall)
    }

    pub fn value(&self) -> U256 {
        self.value.unwrap_or_default()
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_deref().unwrap_or_default()
    }

    fn packed_len(&self) -> usize {
        ENTRY_HEADER_LEN + self.data().len()
    }
}

impl From<SafeCall> for MultiSendEntry {
    fn from(call: SafeCall) -> Self {
        Self {
            to: call.to,
            value: Some(call.value),
            data: Some(call.data),
            operation: Some(call.operation),
        }
    }
}

/// Pack `entries` back to back
pub fn encode(entries: &[MultiSendEntry]) -> Vec<u8> {
    let total = entries.iter().map(MultiSendEntry::packed_len).sum();
    let mut out = Vec::with_capacity(total);

    for entry in entries {
        let data = entry.data();
        let mut word = [0u8; 32];

        out.push(entry.operation().as_u8());
        out.extend_from_slice(entry.to.as_bytes());
        entry.value().to_big_endian(&mut word);
        out.extend_from_slice(&word);
        U256::from(data.len()).to_big_endian(&mut word);
        out.extend_from_slice(&word);
        out.extend_from_slice(data);
    }
    out
}

/// Inverse of [`encode`]. Every decoded entry has all fields set.
pub fn decode(packed: &[u8]) -> Result<Vec<MultiSendEntry>, MultiSendError> {
    let mut entries = Vec::new();
    let mut offset = 0;

    while offset < packed.len() {
        let available = packed.len() - offset;
        if available < ENTRY_HEADER_LEN {
            return Err(MultiSendError::Truncated {
                offset,
                needed: ENTRY_HEADER_LEN,
                available,
            });
        }

        let operation = match packed[offset] {
            0 => OperationKind::Call,
            1 => OperationKind::DelegateCall,
            other => {
                return Err(MultiSendError::InvalidOperation {
                    offset,
                    operation: other,
                })
            }
        };
        let to = Address::from_slice(&packed[offset + 1..offset + 21]);
        let value = U256::from_big_endian(&packed[offset + 21..offset + 53]);
        let raw_len = U256::from_big_endian(&packed[offset + 53..offset + ENTRY_HEADER_LEN]);
        if raw_len > U256::from(usize::MAX as u64) {
            return Err(MultiSendError::LengthOverflow(raw_len));
        }
        let data_len = raw_len.as_usize();

        let needed = ENTRY_HEADER_LEN.saturating_add(data_len);
        if available < needed {
            return Err(MultiSendError::Truncated {
                offset,
                needed,
                available,
            });
        }

        let data_start = offset + ENTRY_HEADER_LEN;
        entries.push(MultiSendEntry {
            to,
            value: Some(value),
            data: Some(Bytes::from(packed[data_start..data_start + data_len].to_vec())),
            operation: Some(operation),
        });
        offset += needed;
    }

    Ok(entries)
}

/// `multiSend(bytes)` call data for `entries`
pub fn encode_call(entries: &[MultiSendEntry]) -> SafeKeyspaceResult<Vec<u8>> {
    multi_send_call(&encode(entries))
}
