//! Deployment of singletons, the keyspace module and Accounts
//!
//! All steps are idempotent: anything whose code is already on chain is
//! skipped, so a partially completed deployment can simply be re-run.

pub mod coordinator;
pub mod singletons;

pub use coordinator::{BootstrapParams, DeploymentCoordinator, KeyspaceDeployment};
pub use singletons::{SafeArtifacts, SafeDeployment, SingletonFactoryInfo, SINGLETON_FACTORY_FUNDING_WEI};
