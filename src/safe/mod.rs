//! Safe Account plumbing
//!
//! - [`address`]: counterfactual Account addresses (CREATE2)
//! - [`multisend`]: packed MultiSend batches
//! - [`contracts`]: call data builders and view readers
//! - [`info`]: concurrent Account snapshots

pub mod address;
pub mod contracts;
pub mod info;
pub mod multisend;

pub use address::{
    create2_address, derive_account_address, validate_owners, AccountParams, DerivedAccount,
    SetupCallback,
};
pub use info::{read_keyspace_info, read_safe_info, read_snapshot};
pub use multisend::{MultiSendEntry, MultiSendError};
