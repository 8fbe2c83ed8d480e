//! Deployment coordinator
//!
//! Singletons go through a CREATE2 singleton factory with a zero salt, so
//! their addresses are known before deployment and every step is skipped
//! when code is already present. Accounts go through the Safe proxy factory.

use ethers_core::types::{Address, Bytes, H256, U256};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{ClientConfig, KeyspaceNetwork};
use crate::error::{ErrorCode, SafeKeyspaceResult};
use crate::rpc::{CallRequest, ChainClient, TxReceipt};
use crate::safe::contracts::{
    create_proxy_with_nonce_call, enable_module_call, initialize_call, read_proxy_creation_code,
    register_keystore_call,
};
use crate::safe::multisend::{self, MultiSendEntry};
use crate::safe::{create2_address, derive_account_address, AccountParams, DerivedAccount};
use crate::signer::SigningCapability;
use crate::tx::{send_and_confirm, tracker, DirectExecutor};
use crate::types::{ExecutionOutcome, KeyspaceKey, SafeCall};
use crate::{log_info, log_warn};

const MODULE: &str = "deploy";

/// Addresses of a deployed keyspace module and its guard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyspaceDeployment {
    pub module: Address,
    pub guard: Address,
}

/// Inputs of [`DeploymentCoordinator::bootstrap_account`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapParams {
    /// Owners, threshold, factory, singleton and salt of the new Account.
    /// Any callback set here is replaced by the bootstrap batch.
    pub account: AccountParams,
    /// MultiSend singleton that `setup` delegate-calls
    pub multi_send: Address,
    pub module: Address,
    /// Identifier registered for the Account
    pub initial_key: KeyspaceKey,
}

impl BootstrapParams {
    /// The batch `setup` runs: enable the module, then register the key.
    /// The module links its guard while registering.
    ///
    /// MultiSend resolves a zero `to` to the delegating Account, which is
    /// how the batch names an Account whose address hashes this very batch.
    pub fn entries(&self) -> SafeKeyspaceResult<Vec<MultiSendEntry>> {
        Ok(vec![
            MultiSendEntry::call(Address::zero(), enable_module_call(self.module)?),
            MultiSendEntry::call(self.module, register_keystore_call(&self.initial_key)?),
        ])
    }
}

#[derive(Clone)]
pub struct DeploymentCoordinator {
    pub(crate) chain: Arc<dyn ChainClient>,
    pub(crate) config: ClientConfig,
    singleton_factory: Address,
}

impl DeploymentCoordinator {
    pub fn new(chain: Arc<dyn ChainClient>, config: ClientConfig, singleton_factory: Address) -> Self {
        Self {
            chain,
            config,
            singleton_factory,
        }
    }

    pub fn singleton_factory(&self) -> Address {
        self.singleton_factory
    }

    /// Where `bytecode` lands when deployed through the singleton factory
    pub fn singleton_address(&self, bytecode: &[u8]) -> Address {
        create2_address(self.singleton_factory, H256::zero(), bytecode)
    }

    pub async fn is_deployed(&self, address: Address) -> SafeKeyspaceResult<bool> {
        Ok(!self.chain.get_code(address).await?.is_empty())
    }

    pub async fn wait_for_transaction(&self, hash: H256) -> SafeKeyspaceResult<TxReceipt> {
        tracker::wait_for_transaction(self.chain.as_ref(), &self.config, hash).await
    }

    /// Deploy creation code (constructor arguments appended) through the
    /// singleton factory. Returns the address whether or not it was already
    /// there.
    pub async fn deploy_singleton(&self, bytecode: &[u8]) -> SafeKeyspaceResult<Address> {
        let address = self.singleton_address(bytecode);
        if self.is_deployed(address).await? {
            log_info!(MODULE, "Singleton already deployed", address = address);
            return Ok(address);
        }

        let mut data = Vec::with_capacity(32 + bytecode.len());
        data.extend_from_slice(H256::zero().as_bytes());
        data.extend_from_slice(bytecode);

        let request = CallRequest::to(self.singleton_factory).with_data(data);
        let receipt = send_and_confirm(self.chain.as_ref(), &self.config, &request).await?;
        log_info!(MODULE, "Singleton deployed", address = address, tx_hash = receipt.transaction_hash);
        Ok(address)
    }

    /// `params` with the proxy creation code read from its factory
    pub async fn account_params(
        &self,
        owners: Vec<Address>,
        threshold: u64,
        factory: Address,
        singleton: Address,
    ) -> SafeKeyspaceResult<AccountParams> {
        let code = read_proxy_creation_code(self.chain.as_ref(), factory).await?;
        Ok(AccountParams::new(owners, threshold, factory, singleton, code))
    }

    /// [`Self::account_params`] on the canonical Safe v1.4.1 deployment of
    /// `network`
    pub async fn published_account_params(
        &self,
        network: KeyspaceNetwork,
        owners: Vec<Address>,
        threshold: u64,
    ) -> SafeKeyspaceResult<AccountParams> {
        let factory = network.safe_proxy_factory()?;
        let singleton = network.safe_singleton()?;
        self.account_params(owners, threshold, factory, singleton).await
    }

    /// Deploy the Account `params` describes, or find it already deployed
    pub async fn deploy_account(&self, params: &AccountParams) -> SafeKeyspaceResult<DerivedAccount> {
        let derived = derive_account_address(params)?;
        if self.is_deployed(derived.address).await? {
            log_warn!(MODULE, "Account already deployed", account = derived.address);
            return Ok(derived);
        }

        let data = create_proxy_with_nonce_call(params.singleton, &derived.initializer, derived.salt)?;
        let request = CallRequest::to(params.factory).with_data(data);
        let receipt = send_and_confirm(self.chain.as_ref(), &self.config, &request).await?;
        log_info!(
            MODULE,
            "Account deployed",
            account = derived.address,
            salt = derived.salt,
            tx_hash = receipt.transaction_hash
        );
        Ok(derived)
    }

    /// Deploy the module and its guard, then link them with `initialize`.
    ///
    /// `guard_bytecode` is the guard's creation code without arguments;
    /// the module address is appended as its constructor argument. A revert
    /// of `initialize` means it already ran and is only logged.
    pub async fn deploy_keyspace_module(
        &self,
        module_bytecode: &[u8],
        guard_bytecode: &[u8],
        keystore: Address,
        state_verifier: Address,
    ) -> SafeKeyspaceResult<KeyspaceDeployment> {
        let module = self.deploy_singleton(module_bytecode).await?;

        let mut guard_code = guard_bytecode.to_vec();
        guard_code.extend_from_slice(H256::from(module).as_bytes());
        let guard = self.deploy_singleton(&guard_code).await?;

        let request = CallRequest::to(module).with_data(initialize_call(keystore, state_verifier, guard)?);
        match send_and_confirm(self.chain.as_ref(), &self.config, &request).await {
            Ok(_) => log_info!(MODULE, "Module initialized", module = module, guard = guard),
            Err(err) if err.code == ErrorCode::Reverted => {
                log_warn!(MODULE, "Module initialize reverted, assuming already initialized", module = module, reason = err.message)
            }
            Err(err) => return Err(err),
        }

        Ok(KeyspaceDeployment { module, guard })
    }

    /// [`Self::deploy_keyspace_module`] linked to the keystore and state
    /// verifier published for `network`
    pub async fn deploy_keyspace_module_on(
        &self,
        network: KeyspaceNetwork,
        module_bytecode: &[u8],
        guard_bytecode: &[u8],
    ) -> SafeKeyspaceResult<KeyspaceDeployment> {
        let keystore = network.keystore_address()?;
        let state_verifier = network.state_verifier_address()?;
        self.deploy_keyspace_module(module_bytecode, guard_bytecode, keystore, state_verifier)
            .await
    }

    /// Deploy an Account whose `setup` enables the module and registers
    /// `initial_key` in the same transaction
    pub async fn bootstrap_account(&self, params: &BootstrapParams) -> SafeKeyspaceResult<DerivedAccount> {
        let callback = multisend::encode_call(&params.entries()?)?;
        let account = params.account.clone().with_callback(params.multi_send, callback);

        let derived = self.deploy_account(&account).await?;
        log_info!(
            MODULE,
            "Account bootstrapped",
            account = derived.address,
            module = params.module,
            key = params.initial_key
        );
        Ok(derived)
    }

    /// Enable the module on an existing Account and register `initial_key`,
    /// as two owner-signed executions
    pub async fn enable_keyspace(
        &self,
        account: Address,
        module: Address,
        initial_key: KeyspaceKey,
        signers: &[Arc<dyn SigningCapability>],
    ) -> SafeKeyspaceResult<Vec<ExecutionOutcome>> {
        let executor = DirectExecutor::new(self.chain.clone(), self.config.clone());

        let enable = SafeCall::new(account).with_data(enable_module_call(module)?);
        let first = executor.execute(account, enable, signers).await?;

        let register = SafeCall::new(module).with_data(register_keystore_call(&initial_key)?);
        let second = executor.execute(account, register, signers).await?;

        log_info!(MODULE, "Keyspace enabled", account = account, module = module, key = initial_key);
        Ok(vec![first, second])
    }

    /// Plain value transfer from the client's sender
    pub async fn send_value(&self, to: Address, amount: U256) -> SafeKeyspaceResult<TxReceipt> {
        let request = CallRequest::to(to).with_value(amount);
        let receipt = send_and_confirm(self.chain.as_ref(), &self.config, &request).await?;
        log_info!(MODULE, "Value sent", to = to, amount = amount, tx_hash = receipt.transaction_hash);
        Ok(receipt)
    }

    /// Raw pre-signed transaction, waited for
    pub async fn send_raw(&self, raw: Bytes) -> SafeKeyspaceResult<TxReceipt> {
        let hash = self.chain.send_raw_transaction(raw).await?;
        self.wait_for_transaction(hash).await
    }
}
