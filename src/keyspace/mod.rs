//! Keyspace keystore integration
//!
//! - [`key`]: public-key recovery, data hash, identifier and recovery digest
//! - [`poseidon`]: the circom Poseidon hash behind identifiers
//! - [`client`]: typed calls to the keystore services
//! - [`transport`]: the JSON-RPC seam under the client

pub mod client;
pub mod key;
pub mod poseidon;
pub mod transport;

pub use client::{canonicalize, CircuitType, ConfigProof, KeystoreClient, KeystoreValue, RecoverProof};
pub use key::{
    compute_data_hash, compute_identifier, derive_public_key, format_public_key,
    public_key_from_secret, recovery_digest, KeyMaterial, KeyMaterialError, VK_HASH,
};
pub use poseidon::poseidon_hash;
pub use transport::{HttpKeystoreTransport, KeystoreEndpoint, KeystoreTransport};
