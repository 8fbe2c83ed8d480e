//! Safe singletons
//!
//! The singleton factory itself is deployed from a presigned transaction
//! (one per chain) whose signer must be funded first. Everything else is a
//! zero-salt CREATE2 deployment through that factory.

use ethers_core::types::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

use super::coordinator::DeploymentCoordinator;
use crate::error::{SafeKeyspaceError, SafeKeyspaceResult};
use crate::log_info;

const MODULE: &str = "singletons";

/// Funding sent to the presigned deployer: 0.1 ETH
pub const SINGLETON_FACTORY_FUNDING_WEI: u64 = 100_000_000_000_000_000;

/// Presigned deployment of the singleton factory for one chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingletonFactoryInfo {
    /// Where the factory lands
    pub address: Address,
    /// Signer of the presigned transaction
    pub signer_address: Address,
    /// RLP-encoded signed transaction
    pub transaction: Bytes,
    #[serde(default)]
    pub gas_price: Option<u64>,
    #[serde(default)]
    pub gas_limit: Option<u64>,
}

/// Creation bytecode of the standard Safe contract set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafeArtifacts {
    pub safe: Bytes,
    pub proxy_factory: Bytes,
    pub multi_send: Bytes,
    pub multi_send_call_only: Bytes,
    pub fallback_handler: Bytes,
    pub sign_message_lib: Bytes,
    pub create_call: Bytes,
    pub simulate_tx_accessor: Bytes,
}

/// Addresses of the standard Safe contract set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafeDeployment {
    pub safe: Address,
    pub proxy_factory: Address,
    pub multi_send: Address,
    pub multi_send_call_only: Address,
    pub fallback_handler: Address,
    pub sign_message_lib: Address,
    pub create_call: Address,
    pub simulate_tx_accessor: Address,
}

impl DeploymentCoordinator {
    /// Deploy the singleton factory from its presigned transaction unless
    /// it is already there
    pub async fn deploy_singleton_factory(&self, info: &SingletonFactoryInfo) -> SafeKeyspaceResult<Address> {
        if info.address != self.singleton_factory() {
            return Err(SafeKeyspaceError::config(format!(
                "factory info is for {:?}, coordinator uses {:?}",
                info.address,
                self.singleton_factory()
            )));
        }
        if self.is_deployed(info.address).await? {
            log_info!(MODULE, "Singleton factory already deployed", address = info.address);
            return Ok(info.address);
        }

        self.send_value(info.signer_address, U256::from(SINGLETON_FACTORY_FUNDING_WEI))
            .await?;
        let receipt = self.send_raw(info.transaction.clone()).await?;
        if !receipt.status {
            return Err(SafeKeyspaceError::reverted("singleton factory deployment reverted")
                .with_details(format!("{:?}", receipt.transaction_hash)));
        }

        log_info!(MODULE, "Singleton factory deployed", address = info.address);
        Ok(info.address)
    }

    /// Deploy the standard Safe set, skipping what is already deployed
    pub async fn deploy_singletons(&self, artifacts: &SafeArtifacts) -> SafeKeyspaceResult<SafeDeployment> {
        let deployment = SafeDeployment {
            safe: self.deploy_singleton(&artifacts.safe).await?,
            proxy_factory: self.deploy_singleton(&artifacts.proxy_factory).await?,
            multi_send: self.deploy_singleton(&artifacts.multi_send).await?,
            multi_send_call_only: self.deploy_singleton(&artifacts.multi_send_call_only).await?,
            fallback_handler: self.deploy_singleton(&artifacts.fallback_handler).await?,
            sign_message_lib: self.deploy_singleton(&artifacts.sign_message_lib).await?,
            create_call: self.deploy_singleton(&artifacts.create_call).await?,
            simulate_tx_accessor: self.deploy_singleton(&artifacts.simulate_tx_accessor).await?,
        };
        log_info!(
            MODULE,
            "Safe singletons ready",
            safe = deployment.safe,
            proxy_factory = deployment.proxy_factory,
            multi_send = deployment.multi_send
        );
        Ok(deployment)
    }
}
