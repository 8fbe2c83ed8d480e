//! Unified error types for safe-keyspace
//!
//! Every flow returns `SafeKeyspaceResult<T>`. Submodules keep their own
//! `thiserror` enums and convert into `SafeKeyspaceError` at the boundary.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Main error type for all safe-keyspace operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafeKeyspaceError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
}

impl SafeKeyspaceError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    // Convenience constructors
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, msg)
    }

    pub fn invalid_address(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidAddress, msg)
    }

    /// Authorization failure; `details` carries the offending address.
    pub fn unauthorized(address: ethers_core::types::Address, msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, msg).with_details(format!("{:?}", address))
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::NetworkError, msg)
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Timeout, msg)
    }

    pub fn rpc(code: i64, msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::RpcError, msg).with_details(format!("rpc code {}", code))
    }

    pub fn reverted(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::Reverted, reason)
    }

    pub fn proof_rejected(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ProofRejected, msg)
    }

    /// A submission failed with the provider's "missing r" error while the
    /// transaction may have been broadcast; `details` carries the hash if known.
    pub fn ambiguous_broadcast(hash: Option<String>) -> Self {
        let err = Self::new(ErrorCode::AmbiguousBroadcast, "missing r");
        match hash {
            Some(hash) => err.with_details(hash),
            None => err,
        }
    }

    pub fn crypto_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::CryptoError, msg)
    }

    pub fn signing_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::SigningFailed, msg)
    }

    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::EncodingError, msg)
    }

    pub fn parse_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ParseError, msg)
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, msg)
    }

    /// Whether the caller may retry the same request unchanged.
    ///
    /// Only transport failures qualify. Reverts, proof rejections and
    /// validation errors need fresh inputs (nonce, hash or proof).
    pub fn is_retryable(&self) -> bool {
        matches!(self.code, ErrorCode::NetworkError | ErrorCode::Timeout)
    }
}

impl fmt::Display for SafeKeyspaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for SafeKeyspaceError {}

/// Error codes for categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Input errors
    InvalidInput,
    InvalidAddress,

    // Authorization errors
    Unauthorized,

    // Network errors
    NetworkError,
    Timeout,
    RpcError,

    // Chain errors
    Reverted,
    AmbiguousBroadcast,

    // Keystore errors
    ProofRejected,

    // Crypto errors
    CryptoError,
    SigningFailed,

    // Encoding errors
    EncodingError,
    ParseError,
    JsonError,
    HexError,

    // Configuration
    ConfigError,
}

/// Result type alias for safe-keyspace operations
pub type SafeKeyspaceResult<T> = Result<T, SafeKeyspaceError>;

// Conversions from common error types

impl From<serde_json::Error> for SafeKeyspaceError {
    fn from(e: serde_json::Error) -> Self {
        SafeKeyspaceError::new(ErrorCode::JsonError, e.to_string())
    }
}

impl From<hex::FromHexError> for SafeKeyspaceError {
    fn from(e: hex::FromHexError) -> Self {
        SafeKeyspaceError::new(ErrorCode::HexError, e.to_string())
    }
}

impl From<reqwest::Error> for SafeKeyspaceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SafeKeyspaceError::new(ErrorCode::Timeout, "Request timed out")
        } else if e.is_connect() {
            SafeKeyspaceError::new(ErrorCode::NetworkError, "Connection failed")
        } else {
            SafeKeyspaceError::new(ErrorCode::NetworkError, e.to_string())
        }
    }
}

impl From<url::ParseError> for SafeKeyspaceError {
    fn from(e: url::ParseError) -> Self {
        SafeKeyspaceError::new(ErrorCode::ConfigError, format!("Invalid URL: {}", e))
    }
}

impl From<secp256k1::Error> for SafeKeyspaceError {
    fn from(e: secp256k1::Error) -> Self {
        SafeKeyspaceError::new(ErrorCode::CryptoError, format!("Secp256k1 error: {}", e))
    }
}

impl From<ethers_signers::WalletError> for SafeKeyspaceError {
    fn from(e: ethers_signers::WalletError) -> Self {
        SafeKeyspaceError::new(ErrorCode::SigningFailed, e.to_string())
    }
}
