//! In-memory chain and keystore shared by the integration tests
//!
//! `FakeChain` recognizes contracts by marker bytecode and dispatches on
//! selectors, so client code runs unchanged against it: singleton factory
//! CREATE2, proxy factory + `setup` with a MultiSend callback, owner
//! signature checks, the keyspace module and its guard. Every transaction
//! mines one block and reverts roll back its state changes.
//!
//! `FakeKeystore` keeps `key → value` where an unset key holds itself and
//! a value is `poseidon(vk_hash, data_hash)` of the controlling key.

#![allow(dead_code)]

use async_trait::async_trait;
use ethers_core::types::{Address, Bytes, Signature, H256, U256};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use safe_keyspace::abi::{AbiDecoder, AbiEncoder, AbiType, AbiValue, KnownSelectors};
use safe_keyspace::deploy::{
    BootstrapParams, DeploymentCoordinator, KeyspaceDeployment, SafeArtifacts, SafeDeployment,
    SingletonFactoryInfo,
};
use safe_keyspace::eip712::safe_tx_hash;
use safe_keyspace::keyspace::{
    compute_data_hash, poseidon_hash, recovery_digest, KeyMaterial, KeystoreClient, KeystoreEndpoint,
    KeystoreTransport, VK_HASH,
};
use safe_keyspace::rpc::{CallRequest, ChainClient, TxReceipt};
use safe_keyspace::safe::contracts::{
    set_guard_call, EXECUTE_TRANSACTION_SIGNATURE, EXEC_TRANSACTION_SIGNATURE, GUARD_STORAGE_SLOT,
    SENTINEL, SETUP_SIGNATURE,
};
use safe_keyspace::safe::{create2_address, multisend, AccountParams};
use safe_keyspace::signer::{personal_sign_hash, recover_address, recover_public_key, SigningCapability};
use safe_keyspace::types::{KeyspaceKey, OperationKind, PublicKeyPoints, SafeCall};
use safe_keyspace::utils::{decode_hex, decode_word, keccak256, keccak256_concat, to_hex};
use safe_keyspace::{ClientConfig, LocalSigner, SafeKeyspaceError, SafeKeyspaceResult};

pub const CHAIN_ID: u64 = 31337;
pub const SAFE_VERSION: &str = "1.4.1";
pub const GUARD_RESTRICTION: &str =
    "This call is restricted, use SafeKeySpaceModule.execTransaction instead.";

pub const SAFE_SINGLETON_CODE: &[u8] = b"fake:safe-singleton";
pub const PROXY_FACTORY_CODE: &[u8] = b"fake:proxy-factory";
pub const MULTI_SEND_CODE: &[u8] = b"fake:multi-send";
pub const MODULE_CODE: &[u8] = b"fake:keyspace-module";
pub const GUARD_CODE: &[u8] = b"fake:keyspace-guard";
pub const PROXY_CREATION_CODE: &[u8] = b"fake:proxy-creation-code";

const PROXY_RUNTIME_CODE: &[u8] = b"fake:proxy";
const KEYSTORE_CODE: &[u8] = b"fake:keystore";
const SINGLETON_FACTORY_CODE: &[u8] = b"fake:singleton-factory";
const PRESIGNED_FACTORY_TX: &[u8] = b"fake:presigned-singleton-factory";

pub const FACTORY_GAS_PRICE: u64 = 100_000_000_000;
pub const FACTORY_GAS_LIMIT: u64 = 100_000;

pub fn sender() -> Address {
    Address::repeat_byte(0xee)
}

pub fn singleton_factory() -> Address {
    Address::repeat_byte(0x5f)
}

pub fn factory_deployer() -> Address {
    Address::repeat_byte(0xde)
}

pub fn keystore_contract() -> Address {
    Address::repeat_byte(0x4b)
}

pub fn state_verifier() -> Address {
    Address::repeat_byte(0x5e)
}

pub fn ether(n: u64) -> U256 {
    U256::exp10(18) * n
}

pub fn factory_info() -> SingletonFactoryInfo {
    SingletonFactoryInfo {
        address: singleton_factory(),
        signer_address: factory_deployer(),
        transaction: Bytes::from(PRESIGNED_FACTORY_TX.to_vec()),
        gas_price: Some(FACTORY_GAS_PRICE),
        gas_limit: Some(FACTORY_GAS_LIMIT),
    }
}

pub fn artifacts() -> SafeArtifacts {
    SafeArtifacts {
        safe: Bytes::from(SAFE_SINGLETON_CODE.to_vec()),
        proxy_factory: Bytes::from(PROXY_FACTORY_CODE.to_vec()),
        multi_send: Bytes::from(MULTI_SEND_CODE.to_vec()),
        multi_send_call_only: Bytes::from(b"fake:multi-send-call-only".to_vec()),
        fallback_handler: Bytes::from(b"fake:fallback-handler".to_vec()),
        sign_message_lib: Bytes::from(b"fake:sign-message-lib".to_vec()),
        create_call: Bytes::from(b"fake:create-call".to_vec()),
        simulate_tx_accessor: Bytes::from(b"fake:simulate-tx-accessor".to_vec()),
    }
}

fn word(value: U256) -> [u8; 32] {
    let mut out = [0u8; 32];
    value.to_big_endian(&mut out);
    out
}

fn reason(err: impl std::fmt::Display) -> String {
    err.to_string()
}

// =============================================================================
// Keystore
// =============================================================================

#[derive(Default)]
struct KeystoreState {
    values: HashMap<U256, U256>,
    root: u64,
    methods: Vec<(KeystoreEndpoint, String)>,
}

#[derive(Default)]
pub struct FakeKeystore {
    state: Mutex<KeystoreState>,
}

fn config_proof(key: U256, data_hash: H256) -> [u8; 32] {
    keccak256_concat(&[&word(key)[..], VK_HASH.as_bytes(), data_hash.as_bytes()])
}

fn recover_proof(key: U256, new_key: U256) -> [u8; 32] {
    keccak256_concat(&[&b"recover"[..], &word(key), &word(new_key)])
}

fn configured(vk_hash: H256, data_hash: H256) -> SafeKeyspaceResult<U256> {
    let value = poseidon_hash(&[vk_hash, data_hash])?;
    Ok(U256::from_big_endian(value.as_bytes()))
}

fn param(params: &[Value], index: usize) -> SafeKeyspaceResult<&str> {
    params
        .get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| SafeKeyspaceError::proof_rejected(format!("missing param {}", index)))
}

/// A key-like param, which must arrive without leading zero nibbles
fn key_param(params: &[Value], index: usize) -> SafeKeyspaceResult<U256> {
    let raw = param(params, index)?;
    if raw.starts_with("0x0") && raw.len() > 3 {
        return Err(SafeKeyspaceError::proof_rejected(format!("non-canonical value {}", raw)));
    }
    Ok(U256::from_big_endian(decode_word(raw)?.as_bytes()))
}

impl FakeKeystore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Value stored under `key`
    pub fn value_of(&self, key: &KeyspaceKey) -> U256 {
        let key = key.as_u256();
        let state = self.state.lock().unwrap();
        state.values.get(&key).copied().unwrap_or(key)
    }

    pub fn root(&self) -> U256 {
        U256::from(self.state.lock().unwrap().root)
    }

    pub fn methods(&self) -> Vec<(KeystoreEndpoint, String)> {
        self.state.lock().unwrap().methods.clone()
    }

    /// What the state verifier checks for the module
    fn verify_proof(&self, key: U256, data_hash: H256, proof: &[u8]) -> bool {
        let state = self.state.lock().unwrap();
        let value = state.values.get(&key).copied().unwrap_or(key);
        match configured(VK_HASH, data_hash) {
            Ok(expected) => expected == value && proof[..] == config_proof(key, data_hash)[..],
            Err(_) => false,
        }
    }

    fn handle(
        state: &mut KeystoreState,
        endpoint: KeystoreEndpoint,
        method: &str,
        params: &[Value],
    ) -> SafeKeyspaceResult<Value> {
        match (endpoint, method) {
            (KeystoreEndpoint::State, "mksr_get") => {
                let key = key_param(params, 0)?;
                let value = state.values.get(&key).copied().unwrap_or(key);
                Ok(json!({ "value": to_hex(&word(value)) }))
            }
            (KeystoreEndpoint::State, "mksr_proof") => {
                let key = key_param(params, 0)?;
                let vk_hash = H256(word(key_param(params, 1)?));
                let data_hash = H256(word(key_param(params, 2)?));
                let value = state.values.get(&key).copied().unwrap_or(key);
                if configured(vk_hash, data_hash)? != value {
                    return Err(SafeKeyspaceError::proof_rejected("key is not configured with this data"));
                }
                Ok(json!({
                    "root": format!("{:#x}", state.root),
                    "proof": to_hex(&config_proof(key, data_hash)),
                }))
            }
            (KeystoreEndpoint::Recovery, "recover_proveSignature") => {
                let key = key_param(params, 0)?;
                let new_key = key_param(params, 1)?;
                if param(params, 3)? != "secp256k1" {
                    return Err(SafeKeyspaceError::proof_rejected("unsupported circuit"));
                }
                let raw = decode_hex(param(params, 2)?)?;
                let signature = Signature::try_from(raw.as_slice())
                    .map_err(|e| SafeKeyspaceError::proof_rejected(e.to_string()))?;
                let digest = recovery_digest(&KeyspaceKey::from_u256(new_key));
                let public_key = recover_public_key(digest, &signature)?;
                let material = KeyMaterial::from_public_key(public_key, VK_HASH)?;

                let value = state.values.get(&key).copied().unwrap_or(key);
                if material.identifier.as_u256() != value {
                    return Err(SafeKeyspaceError::proof_rejected("signature is not from the current key"));
                }
                Ok(json!({
                    "proof": to_hex(&recover_proof(key, new_key)),
                    "currentVk": to_hex(VK_HASH.as_bytes()),
                    "currentData": to_hex(material.data_hash.as_bytes()),
                }))
            }
            (KeystoreEndpoint::State, "mksr_set") => {
                let key = key_param(params, 0)?;
                let new_key = key_param(params, 1)?;
                let vk_hash = decode_word(param(params, 2)?)?;
                let data_hash = decode_word(param(params, 3)?)?;
                let proof = decode_hex(param(params, 4)?)?;

                let value = state.values.get(&key).copied().unwrap_or(key);
                if proof[..] != recover_proof(key, new_key)[..] || configured(vk_hash, data_hash)? != value {
                    return Err(SafeKeyspaceError::proof_rejected("invalid recovery proof"));
                }
                state.values.insert(key, new_key);
                state.root += 1;
                Ok(Value::Null)
            }
            _ => Err(SafeKeyspaceError::proof_rejected(format!("method {} not found", method))),
        }
    }
}

#[async_trait]
impl KeystoreTransport for FakeKeystore {
    async fn request(
        &self,
        endpoint: KeystoreEndpoint,
        method: &str,
        params: Value,
    ) -> SafeKeyspaceResult<Value> {
        let mut state = self.state.lock().unwrap();
        state.methods.push((endpoint, method.to_string()));
        let params = params.as_array().cloned().unwrap_or_default();
        Self::handle(&mut state, endpoint, method, &params)
    }
}

// =============================================================================
// Chain
// =============================================================================

#[derive(Debug, Clone, Default)]
struct SafeState {
    owners: Vec<Address>,
    threshold: u64,
    nonce: u64,
    modules: Vec<Address>,
    guard: Option<Address>,
}

#[derive(Debug, Clone, Default)]
struct ModuleState {
    initialized: bool,
    keystore: Address,
    guard: Address,
    keys: HashMap<Address, U256>,
    nonces: HashMap<Address, U256>,
}

#[derive(Debug, Clone)]
enum Contract {
    SingletonFactory,
    SafeSingleton,
    ProxyFactory,
    MultiSend,
    Safe(SafeState),
    Module(ModuleState),
    Keystore,
    Other,
}

fn classify(code: &[u8]) -> Contract {
    match code {
        SAFE_SINGLETON_CODE => Contract::SafeSingleton,
        PROXY_FACTORY_CODE => Contract::ProxyFactory,
        MULTI_SEND_CODE => Contract::MultiSend,
        MODULE_CODE => Contract::Module(ModuleState::default()),
        _ => Contract::Other,
    }
}

#[derive(Debug, Clone, Default)]
struct World {
    contracts: HashMap<Address, Contract>,
    code: HashMap<Address, Bytes>,
    balances: HashMap<Address, U256>,
}

type Exec = Result<Vec<u8>, String>;

fn selector(data: &[u8]) -> Result<[u8; 4], String> {
    if data.len() < 4 {
        return Err("call data too short".to_string());
    }
    let mut sel = [0u8; 4];
    sel.copy_from_slice(&data[..4]);
    Ok(sel)
}

fn args(signature: &str, data: &[u8]) -> Result<Vec<AbiValue>, String> {
    let types = AbiEncoder::parse_types_from_signature(signature).map_err(reason)?;
    AbiDecoder::decode(&data[4..], &types).map_err(reason)
}

fn ret(values: &[AbiValue], types: &[AbiType]) -> Exec {
    AbiEncoder::encode(values, types).map_err(reason)
}

fn call_from_args(to: &AbiValue, value: &AbiValue, data: &AbiValue, op: &AbiValue) -> Result<SafeCall, String> {
    let operation = OperationKind::try_from(op.as_uint().map_err(reason)?.low_u32() as u8).map_err(reason)?;
    Ok(SafeCall::new(to.as_address().map_err(reason)?)
        .with_value(value.as_uint().map_err(reason)?)
        .with_data(data.as_bytes().map_err(reason)?.to_vec())
        .with_operation(operation))
}

/// Executes calls against a scratch copy of the world
struct Evm<'a> {
    world: &'a mut World,
    keystore: &'a FakeKeystore,
}

impl<'a> Evm<'a> {
    fn call(&mut self, from: Address, to: Address, value: U256, data: &[u8]) -> Exec {
        self.transfer(from, to, value)?;
        let contract = match self.world.contracts.get(&to) {
            Some(contract) => contract.clone(),
            None => return Ok(Vec::new()),
        };
        if data.is_empty() {
            return Ok(Vec::new());
        }
        match contract {
            Contract::SingletonFactory => self.deploy_create2(to, data),
            Contract::ProxyFactory => self.proxy_factory(to, data),
            Contract::Safe(state) => self.safe(from, to, state, data),
            Contract::Module(state) => self.module(from, to, state, data),
            Contract::Keystore => self.keystore_contract(data),
            Contract::MultiSend => Err("MultiSend must be delegate-called".to_string()),
            Contract::SafeSingleton | Contract::Other => Ok(Vec::new()),
        }
    }

    fn transfer(&mut self, from: Address, to: Address, value: U256) -> Result<(), String> {
        if value.is_zero() {
            return Ok(());
        }
        let balance = self.world.balances.get(&from).copied().unwrap_or_default();
        if balance < value {
            return Err("insufficient balance".to_string());
        }
        self.world.balances.insert(from, balance - value);
        *self.world.balances.entry(to).or_default() += value;
        Ok(())
    }

    fn install(&mut self, address: Address, code: &[u8], contract: Contract) -> Result<(), String> {
        if self.world.code.contains_key(&address) {
            return Err(format!("address {:?} already has code", address));
        }
        self.world.code.insert(address, Bytes::from(code.to_vec()));
        self.world.contracts.insert(address, contract);
        Ok(())
    }

    fn deploy_create2(&mut self, factory: Address, data: &[u8]) -> Exec {
        if data.len() < 32 {
            return Err("missing salt".to_string());
        }
        let salt = H256::from_slice(&data[..32]);
        let code = &data[32..];
        let address = create2_address(factory, salt, code);
        self.install(address, code, classify(code))?;
        Ok(address.as_bytes().to_vec())
    }

    fn proxy_factory(&mut self, factory: Address, data: &[u8]) -> Exec {
        match selector(data)? {
            KnownSelectors::PROXY_CREATION_CODE => {
                ret(&[AbiValue::Bytes(PROXY_CREATION_CODE.to_vec())], &[AbiType::Bytes])
            }
            KnownSelectors::CREATE_PROXY_WITH_NONCE => {
                let a = args("createProxyWithNonce(address,bytes,uint256)", data)?;
                let singleton = a[0].as_address().map_err(reason)?;
                let initializer = a[1].as_bytes().map_err(reason)?.to_vec();
                let salt_nonce = a[2].as_uint().map_err(reason)?;
                if !matches!(self.world.contracts.get(&singleton), Some(Contract::SafeSingleton)) {
                    return Err("Singleton contract not deployed".to_string());
                }

                let salt = keccak256_concat(&[&keccak256(&initializer)[..], &word(salt_nonce)]);
                let mut code = PROXY_CREATION_CODE.to_vec();
                code.extend_from_slice(H256::from(singleton).as_bytes());
                let proxy = create2_address(factory, H256(salt), &code);

                self.install(proxy, PROXY_RUNTIME_CODE, Contract::Safe(SafeState::default()))
                    .map_err(|_| "Create2 call failed".to_string())?;
                if !initializer.is_empty() {
                    self.call(factory, proxy, U256::zero(), &initializer)?;
                }
                ret(&[AbiValue::Address(proxy)], &[AbiType::Address])
            }
            _ => Err("unknown proxy factory function".to_string()),
        }
    }

    fn safe_mut(&mut self, safe: Address) -> Result<&mut SafeState, String> {
        match self.world.contracts.get_mut(&safe) {
            Some(Contract::Safe(state)) => Ok(state),
            _ => Err(format!("{:?} is not a Safe", safe)),
        }
    }

    fn safe(&mut self, from: Address, safe: Address, state: SafeState, data: &[u8]) -> Exec {
        match selector(data)? {
            KnownSelectors::SETUP => {
                if state.threshold > 0 {
                    return Err("GS200".to_string());
                }
                let a = args(SETUP_SIGNATURE, data)?;
                let owners = a[0]
                    .as_array()
                    .map_err(reason)?
                    .iter()
                    .map(|owner| owner.as_address().map_err(reason))
                    .collect::<Result<Vec<_>, _>>()?;
                let threshold = a[1].as_uint().map_err(reason)?.low_u64();
                if threshold == 0 || threshold as usize > owners.len() {
                    return Err("GS201".to_string());
                }
                for (i, owner) in owners.iter().enumerate() {
                    if owner.is_zero() || *owner == SENTINEL || owners[..i].contains(owner) {
                        return Err("GS204".to_string());
                    }
                }
                let safe_state = self.safe_mut(safe)?;
                safe_state.owners = owners;
                safe_state.threshold = threshold;

                let to = a[2].as_address().map_err(reason)?;
                let callback = a[3].as_bytes().map_err(reason)?.to_vec();
                if !to.is_zero() {
                    self.delegate(safe, to, &callback).map_err(|_| "GS000".to_string())?;
                }
                Ok(Vec::new())
            }
            KnownSelectors::NONCE => ret(&[AbiValue::uint(state.nonce)], &[AbiType::UINT256]),
            KnownSelectors::GET_OWNERS => ret(
                &[AbiValue::address_array(&state.owners)],
                &[AbiType::Array(Box::new(AbiType::Address))],
            ),
            KnownSelectors::GET_THRESHOLD => ret(&[AbiValue::uint(state.threshold)], &[AbiType::UINT256]),
            KnownSelectors::VERSION => ret(&[AbiValue::String(SAFE_VERSION.to_string())], &[AbiType::String]),
            KnownSelectors::IS_MODULE_ENABLED => {
                let module = args("isModuleEnabled(address)", data)?[0].as_address().map_err(reason)?;
                ret(&[AbiValue::Bool(state.modules.contains(&module))], &[AbiType::Bool])
            }
            KnownSelectors::GET_MODULES_PAGINATED => {
                let a = args("getModulesPaginated(address,uint256)", data)?;
                let start = a[0].as_address().map_err(reason)?;
                let size = a[1].as_uint().map_err(reason)?.low_u64() as usize;
                let first = if start == SENTINEL {
                    0
                } else {
                    match state.modules.iter().position(|m| *m == start) {
                        Some(i) => i + 1,
                        None => return Err("GS105".to_string()),
                    }
                };
                let end = (first + size).min(state.modules.len());
                let page = &state.modules[first.min(end)..end];
                let next = if end < state.modules.len() {
                    page.last().copied().unwrap_or(SENTINEL)
                } else {
                    SENTINEL
                };
                ret(
                    &[AbiValue::address_array(page), AbiValue::Address(next)],
                    &[AbiType::Array(Box::new(AbiType::Address)), AbiType::Address],
                )
            }
            KnownSelectors::GET_STORAGE_AT => {
                let a = args("getStorageAt(uint256,uint256)", data)?;
                let slot = H256(word(a[0].as_uint().map_err(reason)?));
                let length = a[1].as_uint().map_err(reason)?.low_u64() as usize;
                let mut out = vec![0u8; 32 * length];
                if slot == GUARD_STORAGE_SLOT && length > 0 {
                    let guard = state.guard.unwrap_or_else(Address::zero);
                    out[..32].copy_from_slice(H256::from(guard).as_bytes());
                }
                ret(&[AbiValue::Bytes(out)], &[AbiType::Bytes])
            }
            KnownSelectors::ENABLE_MODULE => {
                if from != safe {
                    return Err("GS031".to_string());
                }
                let module = args("enableModule(address)", data)?[0].as_address().map_err(reason)?;
                if module.is_zero() || module == SENTINEL {
                    return Err("GS101".to_string());
                }
                if state.modules.contains(&module) {
                    return Err("GS102".to_string());
                }
                self.safe_mut(safe)?.modules.push(module);
                Ok(Vec::new())
            }
            KnownSelectors::SET_GUARD => {
                if from != safe {
                    return Err("GS031".to_string());
                }
                let guard = args("setGuard(address)", data)?[0].as_address().map_err(reason)?;
                self.safe_mut(safe)?.guard = (!guard.is_zero()).then_some(guard);
                Ok(Vec::new())
            }
            KnownSelectors::EXEC_TRANSACTION => self.exec_transaction(safe, state, data),
            _ => Err("unknown Safe function".to_string()),
        }
    }

    fn exec_transaction(&mut self, safe: Address, state: SafeState, data: &[u8]) -> Exec {
        let a = args(EXEC_TRANSACTION_SIGNATURE, data)?;
        let call = call_from_args(&a[0], &a[1], &a[2], &a[3])?;
        let signatures = a[9].as_bytes().map_err(reason)?;

        let hash = safe_tx_hash(CHAIN_ID, safe, &call, state.nonce).map_err(reason)?;
        let threshold = state.threshold as usize;
        if signatures.len() < 65 * threshold {
            return Err("GS020".to_string());
        }
        let mut last_owner = Address::zero();
        for chunk in signatures.chunks(65).take(threshold) {
            let signature = Signature::try_from(chunk).map_err(reason)?;
            let owner = recover_address(hash, &signature).map_err(reason)?;
            if owner <= last_owner || !state.owners.contains(&owner) {
                return Err("GS026".to_string());
            }
            last_owner = owner;
        }

        if state.guard.is_some() {
            return Err(GUARD_RESTRICTION.to_string());
        }

        self.safe_mut(safe)?.nonce += 1;
        self.execute_as(safe, &call).map_err(|_| "GS013".to_string())?;
        ret(&[AbiValue::Bool(true)], &[AbiType::Bool])
    }

    fn execute_as(&mut self, safe: Address, call: &SafeCall) -> Exec {
        match call.operation {
            OperationKind::Call => self.call(safe, call.to, call.value, &call.data),
            OperationKind::DelegateCall => self.delegate(safe, call.to, &call.data),
        }
    }

    /// Only MultiSend may be delegate-called; it runs in `context`
    fn delegate(&mut self, context: Address, target: Address, data: &[u8]) -> Exec {
        if !matches!(self.world.contracts.get(&target), Some(Contract::MultiSend)) {
            return Err("unsupported delegatecall target".to_string());
        }
        if selector(data)? != KnownSelectors::MULTI_SEND {
            return Err("unknown MultiSend function".to_string());
        }
        let packed = args("multiSend(bytes)", data)?[0].as_bytes().map_err(reason)?.to_vec();
        for entry in multisend::decode(&packed).map_err(reason)? {
            let to = if entry.to.is_zero() { context } else { entry.to };
            match entry.operation() {
                OperationKind::Call => self.call(context, to, entry.value(), entry.data())?,
                OperationKind::DelegateCall => self.delegate(context, to, entry.data())?,
            };
        }
        Ok(Vec::new())
    }

    fn exec_from_module(&mut self, module: Address, safe: Address, call: &SafeCall) -> Exec {
        let enabled = match self.world.contracts.get(&safe) {
            Some(Contract::Safe(state)) => state.modules.contains(&module),
            _ => false,
        };
        if !enabled {
            return Err("GS104".to_string());
        }
        self.execute_as(safe, call)
    }

    fn module_mut(&mut self, module: Address) -> Result<&mut ModuleState, String> {
        match self.world.contracts.get_mut(&module) {
            Some(Contract::Module(state)) => Ok(state),
            _ => Err(format!("{:?} is not a module", module)),
        }
    }

    fn module_tx_hash(state: &ModuleState, account: Address, call: &SafeCall) -> Result<H256, String> {
        let nonce = state.nonces.get(&account).copied().unwrap_or_default();
        let encoded = AbiEncoder::encode(
            &[
                AbiValue::Address(account),
                AbiValue::Address(call.to),
                AbiValue::Uint(call.value),
                AbiValue::FixedBytes(keccak256(&call.data).to_vec()),
                AbiValue::uint(call.operation.as_u8()),
                AbiValue::Uint(nonce),
            ],
            &[
                AbiType::Address,
                AbiType::Address,
                AbiType::UINT256,
                AbiType::BYTES32,
                AbiType::UINT8,
                AbiType::UINT256,
            ],
        )
        .map_err(reason)?;
        Ok(H256(keccak256(&encoded)))
    }

    fn module(&mut self, from: Address, module: Address, state: ModuleState, data: &[u8]) -> Exec {
        match selector(data)? {
            KnownSelectors::INITIALIZE => {
                if state.initialized {
                    return Err("already initialized".to_string());
                }
                let a = args("initialize(address,address,address)", data)?;
                let module_state = self.module_mut(module)?;
                module_state.keystore = a[0].as_address().map_err(reason)?;
                module_state.guard = a[2].as_address().map_err(reason)?;
                module_state.initialized = true;
                Ok(Vec::new())
            }
            KnownSelectors::REGISTER_KEYSTORE => {
                if !state.initialized {
                    return Err("module not initialized".to_string());
                }
                let key = args("registerKeystore(uint256)", data)?[0].as_uint().map_err(reason)?;
                self.module_mut(module)?.keys.insert(from, key);
                let set_guard = SafeCall::new(from).with_data(set_guard_call(state.guard).map_err(reason)?);
                self.exec_from_module(module, from, &set_guard)?;
                Ok(Vec::new())
            }
            KnownSelectors::KEYSPACE_KEYS => {
                let account = args("keyspaceKeys(address)", data)?[0].as_address().map_err(reason)?;
                let key = state.keys.get(&account).copied().unwrap_or_default();
                ret(&[AbiValue::Uint(key)], &[AbiType::UINT256])
            }
            KnownSelectors::NONCES => {
                let account = args("nonces(address)", data)?[0].as_address().map_err(reason)?;
                let nonce = state.nonces.get(&account).copied().unwrap_or_default();
                ret(&[AbiValue::Uint(nonce)], &[AbiType::UINT256])
            }
            KnownSelectors::KEY_STORE => ret(&[AbiValue::Address(state.keystore)], &[AbiType::Address]),
            KnownSelectors::GET_TX_HASH => {
                let a = args("getTxHash(address,address,uint256,bytes,uint8)", data)?;
                let account = a[0].as_address().map_err(reason)?;
                let call = call_from_args(&a[1], &a[2], &a[3], &a[4])?;
                let hash = Self::module_tx_hash(&state, account, &call)?;
                ret(&[AbiValue::FixedBytes(hash.as_bytes().to_vec())], &[AbiType::BYTES32])
            }
            KnownSelectors::EXECUTE_TRANSACTION => {
                let a = args(EXECUTE_TRANSACTION_SIGNATURE, data)?;
                let account = a[0].as_address().map_err(reason)?;
                let call = call_from_args(&a[1], &a[2], &a[3], &a[4])?;
                let signature = Signature::try_from(a[5].as_bytes().map_err(reason)?).map_err(reason)?;
                let public_key = PublicKeyPoints {
                    x: word(a[6].as_uint().map_err(reason)?),
                    y: word(a[7].as_uint().map_err(reason)?),
                };
                let proof = a[8].as_bytes().map_err(reason)?;

                let hash = Self::module_tx_hash(&state, account, &call)?;
                let signer = recover_address(H256(personal_sign_hash(hash.as_bytes())), &signature)
                    .map_err(reason)?;
                if signer != public_key.address() {
                    return Err("signature does not match public key".to_string());
                }
                let key = state.keys.get(&account).copied().unwrap_or_default();
                if key.is_zero() {
                    return Err("account not registered".to_string());
                }
                let data_hash = compute_data_hash(&public_key);
                if !self.keystore.verify_proof(key, data_hash, proof) {
                    return Err("invalid keystore proof".to_string());
                }

                *self.module_mut(module)?.nonces.entry(account).or_default() += U256::one();
                self.exec_from_module(module, account, &call)
                    .map_err(|e| format!("module transaction failed: {}", e))?;
                Ok(Vec::new())
            }
            _ => Err("unknown module function".to_string()),
        }
    }

    fn keystore_contract(&mut self, data: &[u8]) -> Exec {
        match selector(data)? {
            KnownSelectors::ROOT => ret(&[AbiValue::Uint(self.keystore.root())], &[AbiType::UINT256]),
            _ => Err("unknown keystore function".to_string()),
        }
    }
}

/// How the next `send_transaction` misbehaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingR {
    /// Mine the transaction, then report "missing r" with its hash
    WithHash,
    /// Report "missing r" without a hash and drop the transaction
    WithoutHash,
}

struct Ledger {
    world: World,
    block: u64,
    tx_count: u64,
    receipts: HashMap<H256, TxReceipt>,
    requests: Vec<CallRequest>,
    missing_r: Option<MissingR>,
}

pub struct FakeChain {
    keystore: Arc<FakeKeystore>,
    ledger: Mutex<Ledger>,
}

impl FakeChain {
    pub fn new(keystore: Arc<FakeKeystore>) -> Self {
        let mut world = World::default();
        world.balances.insert(sender(), ether(1_000));
        world.code.insert(keystore_contract(), Bytes::from(KEYSTORE_CODE.to_vec()));
        world.contracts.insert(keystore_contract(), Contract::Keystore);
        Self {
            keystore,
            ledger: Mutex::new(Ledger {
                world,
                block: 1,
                tx_count: 0,
                receipts: HashMap::new(),
                requests: Vec::new(),
                missing_r: None,
            }),
        }
    }

    pub fn fund(&self, address: Address, amount: U256) {
        let mut ledger = self.ledger.lock().unwrap();
        *ledger.world.balances.entry(address).or_default() += amount;
    }

    /// Put one of the known contracts at a fixed address
    pub fn install_code(&self, address: Address, code: &[u8]) {
        let mut ledger = self.ledger.lock().unwrap();
        ledger.world.code.insert(address, Bytes::from(code.to_vec()));
        ledger.world.contracts.insert(address, classify(code));
    }

    pub fn balance_of(&self, address: Address) -> U256 {
        let ledger = self.ledger.lock().unwrap();
        ledger.world.balances.get(&address).copied().unwrap_or_default()
    }

    /// Transactions mined so far, reverted ones included
    pub fn transaction_count(&self) -> u64 {
        self.ledger.lock().unwrap().tx_count
    }

    pub fn last_request(&self) -> Option<CallRequest> {
        self.ledger.lock().unwrap().requests.last().cloned()
    }

    pub fn fail_next_with_missing_r(&self, mode: MissingR) {
        self.ledger.lock().unwrap().missing_r = Some(mode);
    }

    fn mine(ledger: &mut Ledger, status: bool) -> H256 {
        ledger.tx_count += 1;
        ledger.block += 1;
        let hash = H256(keccak256(&ledger.tx_count.to_be_bytes()));
        ledger.receipts.insert(
            hash,
            TxReceipt {
                transaction_hash: hash,
                block_number: ledger.block,
                status,
                gas_used: U256::from(21_000u64),
                contract_address: None,
            },
        );
        hash
    }

    fn run(&self, world: &mut World, request: &CallRequest, default_from: Address) -> Exec {
        let to = request
            .to
            .ok_or_else(|| "contract creation is not supported".to_string())?;
        let data = request.data.clone().unwrap_or_default();
        let mut evm = Evm {
            world,
            keystore: self.keystore.as_ref(),
        };
        evm.call(
            request.from.unwrap_or(default_from),
            to,
            request.value.unwrap_or_default(),
            &data,
        )
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    async fn chain_id(&self) -> SafeKeyspaceResult<u64> {
        Ok(CHAIN_ID)
    }

    async fn block_number(&self) -> SafeKeyspaceResult<u64> {
        Ok(self.ledger.lock().unwrap().block)
    }

    async fn get_code(&self, address: Address) -> SafeKeyspaceResult<Bytes> {
        let ledger = self.ledger.lock().unwrap();
        Ok(ledger.world.code.get(&address).cloned().unwrap_or_default())
    }

    async fn get_balance(&self, address: Address) -> SafeKeyspaceResult<U256> {
        Ok(self.balance_of(address))
    }

    async fn call(&self, request: &CallRequest) -> SafeKeyspaceResult<Bytes> {
        let mut world = self.ledger.lock().unwrap().world.clone();
        self.run(&mut world, request, Address::zero())
            .map(Bytes::from)
            .map_err(SafeKeyspaceError::reverted)
    }

    async fn send_transaction(&self, request: &CallRequest) -> SafeKeyspaceResult<H256> {
        let mut ledger = self.ledger.lock().unwrap();
        ledger.requests.push(request.clone());

        let missing_r = ledger.missing_r.take();
        if missing_r == Some(MissingR::WithoutHash) {
            return Err(SafeKeyspaceError::ambiguous_broadcast(None));
        }

        let mut world = ledger.world.clone();
        let status = self.run(&mut world, request, sender()).is_ok();
        if status {
            ledger.world = world;
        }
        let hash = Self::mine(&mut ledger, status);

        match missing_r {
            Some(MissingR::WithHash) => Err(SafeKeyspaceError::ambiguous_broadcast(Some(format!("{:?}", hash)))),
            _ => Ok(hash),
        }
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> SafeKeyspaceResult<H256> {
        if raw.as_ref() != PRESIGNED_FACTORY_TX {
            return Err(SafeKeyspaceError::rpc(-32000, "unknown raw transaction"));
        }
        let mut ledger = self.ledger.lock().unwrap();
        let cost = U256::from(FACTORY_GAS_PRICE) * U256::from(FACTORY_GAS_LIMIT);
        let balance = ledger.world.balances.get(&factory_deployer()).copied().unwrap_or_default();
        let status = balance >= cost && !ledger.world.code.contains_key(&singleton_factory());
        if status {
            ledger.world.balances.insert(factory_deployer(), balance - cost);
            ledger
                .world
                .code
                .insert(singleton_factory(), Bytes::from(SINGLETON_FACTORY_CODE.to_vec()));
            ledger
                .world
                .contracts
                .insert(singleton_factory(), Contract::SingletonFactory);
        }
        Ok(Self::mine(&mut ledger, status))
    }

    async fn get_transaction_receipt(&self, hash: H256) -> SafeKeyspaceResult<Option<TxReceipt>> {
        Ok(self.ledger.lock().unwrap().receipts.get(&hash).cloned())
    }

    fn sender(&self) -> Option<Address> {
        Some(sender())
    }
}

// =============================================================================
// Harness
// =============================================================================

pub fn test_config() -> ClientConfig {
    ClientConfig {
        chain_id: Some(CHAIN_ID),
        receipt_poll_interval_ms: 1,
        ..ClientConfig::default()
    }
}

pub fn signers(list: &[&Arc<LocalSigner>]) -> Vec<Arc<dyn SigningCapability>> {
    list.iter()
        .map(|signer| Arc::clone(signer) as Arc<dyn SigningCapability>)
        .collect()
}

/// A chain with the singleton factory, the Safe set and the keyspace
/// module already deployed
pub struct Harness {
    pub chain: Arc<FakeChain>,
    pub keystore: Arc<FakeKeystore>,
    pub config: ClientConfig,
    pub coordinator: DeploymentCoordinator,
    pub singletons: SafeDeployment,
    pub keyspace: KeyspaceDeployment,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: ClientConfig) -> Self {
        let keystore = FakeKeystore::new();
        let chain = Arc::new(FakeChain::new(keystore.clone()));
        let coordinator = DeploymentCoordinator::new(chain.clone(), config.clone(), singleton_factory());

        coordinator.deploy_singleton_factory(&factory_info()).await.unwrap();
        let singletons = coordinator.deploy_singletons(&artifacts()).await.unwrap();
        let keyspace = coordinator
            .deploy_keyspace_module(MODULE_CODE, GUARD_CODE, keystore_contract(), state_verifier())
            .await
            .unwrap();

        Self {
            chain,
            keystore,
            config,
            coordinator,
            singletons,
            keyspace,
        }
    }

    pub fn keystore_client(&self) -> KeystoreClient {
        KeystoreClient::new(self.keystore.clone())
    }

    pub async fn account_params(&self, owners: Vec<Address>, threshold: u64, salt: u64) -> AccountParams {
        self.coordinator
            .account_params(owners, threshold, self.singletons.proxy_factory, self.singletons.safe)
            .await
            .unwrap()
            .with_salt(H256::from_low_u64_be(salt))
    }

    /// Account owned by `owner` with the module enabled and `owner`'s key
    /// registered, all from `setup`
    pub async fn bootstrap(&self, owner: &LocalSigner, salt: u64) -> (Address, KeyMaterial) {
        let material = KeyMaterial::derive(owner, VK_HASH).await.unwrap();
        let params = BootstrapParams {
            account: self.account_params(vec![owner.address()], 1, salt).await,
            multi_send: self.singletons.multi_send,
            module: self.keyspace.module,
            initial_key: material.identifier,
        };
        let derived = self.coordinator.bootstrap_account(&params).await.unwrap();
        (derived.address, material)
    }

    /// Plain Account without the module
    pub async fn plain_account(&self, owners: Vec<Address>, threshold: u64, salt: u64) -> Address {
        let params = self.account_params(owners, threshold, salt).await;
        self.coordinator.deploy_account(&params).await.unwrap().address
    }
}
