//! Account snapshot
//!
//! Independent reads are issued concurrently. Nothing is cached; every call
//! reflects the latest block.

use ethers_core::types::Address;

use super::contracts::{
    read_key_store, read_keyspace_key, read_keystore_root, read_module_nonce, read_modules,
    read_nonce, read_owners, read_threshold, read_version,
};
use crate::error::{SafeKeyspaceError, SafeKeyspaceResult};
use crate::keyspace::KeystoreClient;
use crate::log_debug;
use crate::rpc::ChainClient;
use crate::types::{KeyspaceInfo, SafeInfo};

const MODULE: &str = "safe";

/// Version, owners, threshold, nonce, modules and balance of `account`
pub async fn read_safe_info(chain: &dyn ChainClient, account: Address) -> SafeKeyspaceResult<SafeInfo> {
    let code = chain.get_code(account).await?;
    if code.is_empty() {
        return Err(SafeKeyspaceError::invalid_address(format!(
            "no Account deployed at {:?}",
            account
        )));
    }

    let (version, owners, threshold, nonce, modules, balance) = tokio::try_join!(
        read_version(chain, account),
        read_owners(chain, account),
        read_threshold(chain, account),
        read_nonce(chain, account),
        read_modules(chain, account),
        chain.get_balance(account),
    )?;

    log_debug!(MODULE, "Read Account state", account = account, nonce = nonce, threshold = threshold);
    Ok(SafeInfo {
        address: account,
        version,
        owners,
        threshold,
        nonce,
        modules,
        balance,
        keyspace: None,
    })
}

/// Keystore-side state of `account` as seen through `module`
pub async fn read_keyspace_info(
    chain: &dyn ChainClient,
    keystore: &KeystoreClient,
    module: Address,
    account: Address,
) -> SafeKeyspaceResult<KeyspaceInfo> {
    let (keyspace_key, module_nonce, keystore_address) = tokio::try_join!(
        read_keyspace_key(chain, module, account),
        read_module_nonce(chain, module, account),
        read_key_store(chain, module),
    )?;

    let (keystore_root, value) = tokio::try_join!(
        read_keystore_root(chain, keystore_address),
        keystore.get_value(&keyspace_key),
    )?;

    Ok(KeyspaceInfo {
        module,
        keyspace_key,
        module_nonce,
        keystore: keystore_address,
        keystore_root,
        keyspace_value: value.value,
    })
}

/// Full snapshot, including the keystore section when `module` is enabled
pub async fn read_snapshot(
    chain: &dyn ChainClient,
    keystore: &KeystoreClient,
    module: Option<Address>,
    account: Address,
) -> SafeKeyspaceResult<SafeInfo> {
    let mut info = read_safe_info(chain, account).await?;
    if let Some(module) = module.filter(|m| info.modules.contains(m)) {
        info.keyspace = Some(read_keyspace_info(chain, keystore, module, account).await?);
    }
    Ok(info)
}
