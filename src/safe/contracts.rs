//! Call data builders and view readers for the Safe contracts and the
//! keyspace module
//!
//! Builders are pure and return ABI-encoded call data. Readers issue one
//! `eth_call` each and never cache.

use ethers_core::types::{Address, Bytes, H160, H256, U256};

use crate::abi::{AbiDecoder, AbiEncoder, AbiType, AbiValue};
use crate::error::{SafeKeyspaceError, SafeKeyspaceResult};
use crate::rpc::{CallRequest, ChainClient};
use crate::types::{KeyspaceKey, PublicKeyPoints, SafeCall};

/// Head of the Safe's module and owner linked lists
pub const SENTINEL: Address = H160([
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01,
]);

/// `keccak256("guard_manager.guard.address")`
pub const GUARD_STORAGE_SLOT: H256 = H256([
    0x4a, 0x20, 0x4f, 0x62, 0x0c, 0x8c, 0x5c, 0xcd,
    0xca, 0x3f, 0xd5, 0x4d, 0x00, 0x3b, 0xad, 0xd8,
    0x5b, 0xa5, 0x00, 0x43, 0x6a, 0x43, 0x1f, 0x0c,
    0xbd, 0xa4, 0xf5, 0x58, 0xc9, 0x3c, 0x34, 0xc8,
]);

/// Page size used when listing modules
pub const MODULE_PAGE_SIZE: u64 = 10;

pub const SETUP_SIGNATURE: &str =
    "setup(address[],uint256,address,bytes,address,address,uint256,address)";
pub const EXEC_TRANSACTION_SIGNATURE: &str =
    "execTransaction(address,uint256,bytes,uint8,uint256,uint256,uint256,address,address,bytes)";
pub const EXECUTE_TRANSACTION_SIGNATURE: &str =
    "executeTransaction(address,address,uint256,bytes,uint8,bytes,uint256,uint256,bytes)";

fn encode(signature: &str, values: &[AbiValue]) -> SafeKeyspaceResult<Vec<u8>> {
    Ok(AbiEncoder::encode_function_call_by_signature(signature, values)?)
}

// =============================================================================
// Safe
// =============================================================================

/// `setup(...)` with no payment: payment token, payment and receiver are zero
pub fn setup_call(
    owners: &[Address],
    threshold: u64,
    to: Address,
    data: &[u8],
    fallback_handler: Address,
) -> SafeKeyspaceResult<Vec<u8>> {
    encode(
        SETUP_SIGNATURE,
        &[
            AbiValue::address_array(owners),
            AbiValue::uint(threshold),
            AbiValue::Address(to),
            AbiValue::Bytes(data.to_vec()),
            AbiValue::Address(fallback_handler),
            AbiValue::Address(Address::zero()),
            AbiValue::uint(0u64),
            AbiValue::Address(Address::zero()),
        ],
    )
}

/// `execTransaction(...)` with zero gas refund parameters, matching
/// [`crate::eip712::SafeTx::from_call`]
pub fn exec_transaction_call(call: &SafeCall, signatures: &[u8]) -> SafeKeyspaceResult<Vec<u8>> {
    encode(
        EXEC_TRANSACTION_SIGNATURE,
        &[
            AbiValue::Address(call.to),
            AbiValue::Uint(call.value),
            AbiValue::Bytes(call.data.to_vec()),
            AbiValue::uint(call.operation.as_u8()),
            AbiValue::uint(0u64),
            AbiValue::uint(0u64),
            AbiValue::uint(0u64),
            AbiValue::Address(Address::zero()),
            AbiValue::Address(Address::zero()),
            AbiValue::Bytes(signatures.to_vec()),
        ],
    )
}

pub fn enable_module_call(module: Address) -> SafeKeyspaceResult<Vec<u8>> {
    encode("enableModule(address)", &[AbiValue::Address(module)])
}

pub fn set_guard_call(guard: Address) -> SafeKeyspaceResult<Vec<u8>> {
    encode("setGuard(address)", &[AbiValue::Address(guard)])
}

// =============================================================================
// Proxy factory / MultiSend
// =============================================================================

pub fn create_proxy_with_nonce_call(
    singleton: Address,
    initializer: &[u8],
    salt: H256,
) -> SafeKeyspaceResult<Vec<u8>> {
    encode(
        "createProxyWithNonce(address,bytes,uint256)",
        &[
            AbiValue::Address(singleton),
            AbiValue::Bytes(initializer.to_vec()),
            AbiValue::Uint(U256::from_big_endian(salt.as_bytes())),
        ],
    )
}

pub fn multi_send_call(packed: &[u8]) -> SafeKeyspaceResult<Vec<u8>> {
    encode("multiSend(bytes)", &[AbiValue::Bytes(packed.to_vec())])
}

// =============================================================================
// Keyspace module
// =============================================================================

pub fn get_tx_hash_call(account: Address, call: &SafeCall) -> SafeKeyspaceResult<Vec<u8>> {
    encode(
        "getTxHash(address,address,uint256,bytes,uint8)",
        &[
            AbiValue::Address(account),
            AbiValue::Address(call.to),
            AbiValue::Uint(call.value),
            AbiValue::Bytes(call.data.to_vec()),
            AbiValue::uint(call.operation.as_u8()),
        ],
    )
}

pub fn execute_transaction_call(
    account: Address,
    call: &SafeCall,
    signature: &[u8],
    public_key: &PublicKeyPoints,
    proof: &[u8],
) -> SafeKeyspaceResult<Vec<u8>> {
    encode(
        EXECUTE_TRANSACTION_SIGNATURE,
        &[
            AbiValue::Address(account),
            AbiValue::Address(call.to),
            AbiValue::Uint(call.value),
            AbiValue::Bytes(call.data.to_vec()),
            AbiValue::uint(call.operation.as_u8()),
            AbiValue::Bytes(signature.to_vec()),
            AbiValue::Uint(public_key.x_u256()),
            AbiValue::Uint(public_key.y_u256()),
            AbiValue::Bytes(proof.to_vec()),
        ],
    )
}

pub fn register_keystore_call(key: &KeyspaceKey) -> SafeKeyspaceResult<Vec<u8>> {
    encode("registerKeystore(uint256)", &[AbiValue::Uint(key.as_u256())])
}

pub fn initialize_call(
    keystore: Address,
    state_verifier: Address,
    guard: Address,
) -> SafeKeyspaceResult<Vec<u8>> {
    encode(
        "initialize(address,address,address)",
        &[
            AbiValue::Address(keystore),
            AbiValue::Address(state_verifier),
            AbiValue::Address(guard),
        ],
    )
}

// =============================================================================
// Readers
// =============================================================================

async fn view(
    chain: &dyn ChainClient,
    to: Address,
    data: Vec<u8>,
    returns: &AbiType,
) -> SafeKeyspaceResult<AbiValue> {
    let output: Bytes = chain.call(&CallRequest::to(to).with_data(data)).await?;
    if output.is_empty() {
        return Err(SafeKeyspaceError::invalid_address(format!(
            "no contract answered at {:?}",
            to
        )));
    }
    Ok(AbiDecoder::decode_single(&output, returns)?)
}

fn fits_u64(value: U256, what: &str) -> SafeKeyspaceResult<u64> {
    if value > U256::from(u64::MAX) {
        return Err(SafeKeyspaceError::parse_error(format!("{} out of range: {}", what, value)));
    }
    Ok(value.as_u64())
}

pub async fn read_nonce(chain: &dyn ChainClient, account: Address) -> SafeKeyspaceResult<u64> {
    let value = view(chain, account, encode("nonce()", &[])?, &AbiType::UINT256).await?;
    fits_u64(value.as_uint()?, "nonce")
}

pub async fn read_owners(chain: &dyn ChainClient, account: Address) -> SafeKeyspaceResult<Vec<Address>> {
    let value = view(
        chain,
        account,
        encode("getOwners()", &[])?,
        &AbiType::Array(Box::new(AbiType::Address)),
    )
    .await?;
    value
        .as_array()?
        .iter()
        .map(|v| v.as_address().map_err(SafeKeyspaceError::from))
        .collect()
}

pub async fn read_threshold(chain: &dyn ChainClient, account: Address) -> SafeKeyspaceResult<u64> {
    let value = view(chain, account, encode("getThreshold()", &[])?, &AbiType::UINT256).await?;
    fits_u64(value.as_uint()?, "threshold")
}

pub async fn read_version(chain: &dyn ChainClient, account: Address) -> SafeKeyspaceResult<String> {
    let value = view(chain, account, encode("VERSION()", &[])?, &AbiType::String).await?;
    Ok(value.as_string()?.to_string())
}

pub async fn is_module_enabled(
    chain: &dyn ChainClient,
    account: Address,
    module: Address,
) -> SafeKeyspaceResult<bool> {
    let data = encode("isModuleEnabled(address)", &[AbiValue::Address(module)])?;
    let value = view(chain, account, data, &AbiType::Bool).await?;
    Ok(value.as_bool()?)
}

/// All enabled modules, following `getModulesPaginated` until the sentinel
pub async fn read_modules(chain: &dyn ChainClient, account: Address) -> SafeKeyspaceResult<Vec<Address>> {
    let returns = [AbiType::Array(Box::new(AbiType::Address)), AbiType::Address];

    let mut modules = Vec::new();
    let mut start = SENTINEL;
    loop {
        let data = encode(
            "getModulesPaginated(address,uint256)",
            &[AbiValue::Address(start), AbiValue::uint(MODULE_PAGE_SIZE)],
        )?;
        let output = chain.call(&CallRequest::to(account).with_data(data)).await?;
        let decoded = AbiDecoder::decode(&output, &returns)?;
        let (page, next) = match decoded.as_slice() {
            [page, next] => (page.as_array()?, next.as_address()?),
            _ => return Err(SafeKeyspaceError::parse_error("malformed getModulesPaginated result")),
        };

        for module in page {
            modules.push(module.as_address()?);
        }
        if next == SENTINEL || next == Address::zero() || page.is_empty() {
            return Ok(modules);
        }
        start = next;
    }
}

/// The guard recorded in the Safe's guard storage slot, if any
pub async fn read_guard(chain: &dyn ChainClient, account: Address) -> SafeKeyspaceResult<Option<Address>> {
    let data = encode(
        "getStorageAt(uint256,uint256)",
        &[
            AbiValue::Uint(U256::from_big_endian(GUARD_STORAGE_SLOT.as_bytes())),
            AbiValue::uint(1u64),
        ],
    )?;
    let value = view(chain, account, data, &AbiType::Bytes).await?;
    let slot = value.as_bytes()?;
    if slot.len() != 32 {
        return Err(SafeKeyspaceError::parse_error(format!(
            "guard slot is {} bytes",
            slot.len()
        )));
    }
    let guard = Address::from_slice(&slot[12..]);
    Ok((!guard.is_zero()).then_some(guard))
}

pub async fn read_proxy_creation_code(chain: &dyn ChainClient, factory: Address) -> SafeKeyspaceResult<Bytes> {
    let value = view(chain, factory, encode("proxyCreationCode()", &[])?, &AbiType::Bytes).await?;
    Ok(Bytes::from(value.as_bytes()?.to_vec()))
}

/// Module-side digest for `call` on `account`; embeds the module nonce
pub async fn read_tx_hash(
    chain: &dyn ChainClient,
    module: Address,
    account: Address,
    call: &SafeCall,
) -> SafeKeyspaceResult<H256> {
    let value = view(chain, module, get_tx_hash_call(account, call)?, &AbiType::BYTES32).await?;
    Ok(H256::from_slice(value.as_bytes()?))
}

pub async fn read_keyspace_key(
    chain: &dyn ChainClient,
    module: Address,
    account: Address,
) -> SafeKeyspaceResult<KeyspaceKey> {
    let data = encode("keyspaceKeys(address)", &[AbiValue::Address(account)])?;
    let value = view(chain, module, data, &AbiType::UINT256).await?;
    Ok(KeyspaceKey::from_u256(value.as_uint()?))
}

pub async fn read_module_nonce(
    chain: &dyn ChainClient,
    module: Address,
    account: Address,
) -> SafeKeyspaceResult<U256> {
    let data = encode("nonces(address)", &[AbiValue::Address(account)])?;
    let value = view(chain, module, data, &AbiType::UINT256).await?;
    Ok(value.as_uint()?)
}

pub async fn read_key_store(chain: &dyn ChainClient, module: Address) -> SafeKeyspaceResult<Address> {
    let value = view(chain, module, encode("keyStore()", &[])?, &AbiType::Address).await?;
    Ok(value.as_address()?)
}

pub async fn read_keystore_root(chain: &dyn ChainClient, keystore: Address) -> SafeKeyspaceResult<U256> {
    let value = view(chain, keystore, encode("root()", &[])?, &AbiType::UINT256).await?;
    Ok(value.as_uint()?)
}
