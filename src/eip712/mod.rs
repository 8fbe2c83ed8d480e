//! EIP-712 Typed Data
//!
//! Typed structured data hashing, plus the Safe `SafeTx` record that owners
//! sign for direct execution. Signing itself goes through
//! [`crate::signer::SigningCapability`].
//!
//! # Reference
//! - <https://eips.ethereum.org/EIPS/eip-712>
//!
//! # Example
//! ```rust,ignore
//! use safe_keyspace::eip712::safe_tx_hash;
//! use safe_keyspace::types::SafeCall;
//!
//! let call = SafeCall::new(recipient).with_value(amount);
//! let digest = safe_tx_hash(chain_id, account, &call, nonce)?;
//! ```

pub mod types;
pub mod encoder;
pub mod hasher;
pub mod safe_tx;

pub use types::*;
pub use encoder::*;
pub use hasher::*;
pub use safe_tx::*;
