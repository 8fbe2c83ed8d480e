//! Utilities Module
//!
//! Common helpers used across the crate.

pub mod hexutil;
pub mod logging;

pub use hexutil::*;
