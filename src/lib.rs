//! Safe Keyspace Client Library
//!
//! Client-side protocol layer for Safe multisig Accounts whose authorization
//! is delegated to a keyspace keystore.
//!
//! # Architecture
//!
//! This crate provides:
//! - **safe**: counterfactual Account addresses, MultiSend batches, call
//!   data builders and view readers
//! - **keyspace**: key material (data hash, Poseidon identifier) and the
//!   keystore JSON-RPC client
//! - **tx**: direct (owner-signed) and routed (keystore-proven) execution,
//!   key rotation, receipt tracking
//! - **deploy**: singleton, module and Account deployment
//! - **eip712**, **abi**: byte-exact hashing and encoding
//! - **rpc**, **signer**: the injectable chain and signing seams
//!
//! # Injection
//!
//! Every component takes an `Arc<dyn ChainClient>` and, where needed, a
//! [`keyspace::KeystoreClient`] built over an `Arc<dyn KeystoreTransport>`.
//! The HTTP implementations are [`rpc::HttpChainClient`] and
//! [`keyspace::HttpKeystoreTransport`]; tests substitute in-memory fakes.
//!
//! # Example
//!
//! ```rust,ignore
//! use safe_keyspace::{ClientConfig, HttpChainClient, RoutedExecutor, SafeCall};
//!
//! let config = ClientConfig::from_env()?;
//! let chain = Arc::new(HttpChainClient::from_config(&config)?.with_relayer(relayer));
//! let keystore = KeystoreClient::new(Arc::new(HttpKeystoreTransport::from_config(&config)?));
//!
//! let executor = RoutedExecutor::new(chain, keystore, module, config);
//! let outcome = executor.execute(account, SafeCall::new(to).with_value(amount), &owner).await?;
//! println!("executed in {:?}", outcome.tx_hash);
//! ```

pub mod abi;
pub mod config;
pub mod deploy;
pub mod eip712;
pub mod error;
pub mod keyspace;
pub mod rpc;
pub mod safe;
pub mod signer;
pub mod tx;
pub mod types;
pub mod utils;

// Re-export key types for convenience
pub use config::{ClientConfig, KeyspaceNetwork, SignatureOrder};
pub use error::{ErrorCode, SafeKeyspaceError, SafeKeyspaceResult};
pub use types::*;

pub use deploy::{BootstrapParams, DeploymentCoordinator, KeyspaceDeployment};
pub use keyspace::{HttpKeystoreTransport, KeyMaterial, KeystoreClient, KeystoreTransport, VK_HASH};
pub use rpc::{CallRequest, ChainClient, HttpChainClient, TxReceipt};
pub use safe::{derive_account_address, AccountParams, DerivedAccount, MultiSendEntry};
pub use signer::{LocalSigner, SigningCapability};
pub use tx::{DirectExecutor, KeyRotation, KeySource, RoutedExecutor};
pub use utils::logging::init_tracing;
