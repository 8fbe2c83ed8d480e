//! Shared types for safe-keyspace
//!
//! Data structures that cross module boundaries are defined here
//! for consistent serialization.

use ethers_core::types::{Address, Bytes, H256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{SafeKeyspaceError, SafeKeyspaceResult};
use crate::utils::{keccak256, strip_leading_zeros, to_hex};

// =============================================================================
// Operation / Nonce
// =============================================================================

/// Safe operation kind, encoded as `uint8` on-chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    #[default]
    Call,
    DelegateCall,
}

impl OperationKind {
    pub fn as_u8(&self) -> u8 {
        match self {
            OperationKind::Call => 0,
            OperationKind::DelegateCall => 1,
        }
    }
}

impl TryFrom<u8> for OperationKind {
    type Error = SafeKeyspaceError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(OperationKind::Call),
            1 => Ok(OperationKind::DelegateCall),
            other => Err(SafeKeyspaceError::invalid_input(format!(
                "unknown operation kind: {}",
                other
            ))),
        }
    }
}

/// How a transaction's replay protection is handled.
///
/// Direct execution hashes the Account nonce explicitly. Routed execution
/// lets the module embed its own nonce inside `getTxHash`, so the client
/// never sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "model", content = "value")]
pub enum NonceModel {
    Explicit(u64),
    Opaque,
}

impl NonceModel {
    pub fn explicit(&self) -> Option<u64> {
        match self {
            NonceModel::Explicit(n) => Some(*n),
            NonceModel::Opaque => None,
        }
    }
}

// =============================================================================
// Transactions
// =============================================================================

/// A call to be executed by the Account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafeCall {
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub operation: OperationKind,
}

impl SafeCall {
    pub fn new(to: Address) -> Self {
        Self {
            to,
            value: U256::zero(),
            data: Bytes::new(),
            operation: OperationKind::Call,
        }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn with_data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = data.into();
        self
    }

    pub fn with_operation(mut self, operation: OperationKind) -> Self {
        self.operation = operation;
        self
    }
}

/// A call bound to a nonce model, ready to be hashed and signed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransaction {
    pub account: Address,
    pub call: SafeCall,
    pub nonce: NonceModel,
}

/// Terminal success of an execution flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub tx_hash: H256,
    pub block_number: u64,
    /// Confirmations waited for before reporting
    pub confirmations: u64,
    pub nonce: NonceModel,
}

// =============================================================================
// Keys
// =============================================================================

/// Uncompressed secp256k1 public key split into its affine coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKeyPoints {
    pub x: [u8; 32],
    pub y: [u8; 32],
}

impl PublicKeyPoints {
    /// Split a 65-byte `0x04 ‖ x ‖ y` encoding
    pub fn from_uncompressed(bytes: &[u8]) -> SafeKeyspaceResult<Self> {
        if bytes.len() != 65 {
            return Err(SafeKeyspaceError::crypto_error(format!(
                "Invalid public key length: expected 65, got {}",
                bytes.len()
            )));
        }
        if bytes[0] != 0x04 {
            return Err(SafeKeyspaceError::crypto_error("Invalid public key encoding"));
        }
        let mut x = [0u8; 32];
        let mut y = [0u8; 32];
        x.copy_from_slice(&bytes[1..33]);
        y.copy_from_slice(&bytes[33..65]);
        Ok(Self { x, y })
    }

    pub fn to_uncompressed(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[0] = 0x04;
        out[1..33].copy_from_slice(&self.x);
        out[33..].copy_from_slice(&self.y);
        out
    }

    pub fn x_u256(&self) -> U256 {
        U256::from_big_endian(&self.x)
    }

    pub fn y_u256(&self) -> U256 {
        U256::from_big_endian(&self.y)
    }

    /// Ethereum address controlled by this key
    pub fn address(&self) -> Address {
        let mut xy = [0u8; 64];
        xy[..32].copy_from_slice(&self.x);
        xy[32..].copy_from_slice(&self.y);
        Address::from_slice(&keccak256(&xy)[12..])
    }
}

/// Keystore identifier ("keyspace key"), a 32-byte big-endian field element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyspaceKey(pub H256);

impl KeyspaceKey {
    pub fn from_u256(value: U256) -> Self {
        let mut word = [0u8; 32];
        value.to_big_endian(&mut word);
        Self(H256(word))
    }

    pub fn as_u256(&self) -> U256 {
        U256::from_big_endian(self.0.as_bytes())
    }

    /// Full 32-byte hex form
    pub fn to_hex(&self) -> String {
        to_hex(self.0.as_bytes())
    }

    /// Hex form with leading zero nibbles removed, as the keystore expects
    pub fn canonical_hex(&self) -> String {
        strip_leading_zeros(&self.to_hex())
    }
}

impl fmt::Display for KeyspaceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

// =============================================================================
// Account snapshot
// =============================================================================

/// Keystore-related state of an Account using the routed module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyspaceInfo {
    pub module: Address,
    pub keyspace_key: KeyspaceKey,
    pub module_nonce: U256,
    pub keystore: Address,
    pub keystore_root: U256,
    pub keyspace_value: String,
}

/// Point-in-time view of an Account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafeInfo {
    pub address: Address,
    pub version: String,
    pub owners: Vec<Address>,
    pub threshold: u64,
    pub nonce: u64,
    pub modules: Vec<Address>,
    pub balance: U256,
    pub keyspace: Option<KeyspaceInfo>,
}
