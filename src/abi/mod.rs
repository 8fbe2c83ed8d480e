//! ABI (Application Binary Interface) module for Solidity/EVM contracts
//!
//! Byte-exact encoding of the Safe, proxy factory, MultiSend and keyspace
//! module call data:
//! - Standard head/tail tuple encoding and decoding
//! - Packed (`abi.encodePacked`) encoding
//! - Function selector calculation and well-known Safe selectors
//! - `Error(string)` revert reason decoding

pub mod types;
pub mod encoder;
pub mod decoder;
pub mod selector;


pub use types::*;
pub use encoder::*;
pub use decoder::*;
pub use selector::*;
