//! Function selector calculation

use crate::utils::keccak256;

/// ABI selector calculator
pub struct AbiSelector;

impl AbiSelector {
    /// Calculate function selector (first 4 bytes of keccak256(signature))
    pub fn selector_from_signature(signature: &str) -> [u8; 4] {
        let hash = keccak256(signature.as_bytes());
        [hash[0], hash[1], hash[2], hash[3]]
    }
}

/// Well-known function selectors of the Safe and keyspace contracts
pub struct KnownSelectors;

impl KnownSelectors {
    // Safe
    pub const SETUP: [u8; 4] = [0xb6, 0x3e, 0x80, 0x0d];                 // setup(address[],uint256,address,bytes,address,address,uint256,address)
    pub const EXEC_TRANSACTION: [u8; 4] = [0x6a, 0x76, 0x12, 0x02];      // execTransaction(...)
    pub const ENABLE_MODULE: [u8; 4] = [0x61, 0x0b, 0x59, 0x25];         // enableModule(address)
    pub const NONCE: [u8; 4] = [0xaf, 0xfe, 0xd0, 0xe0];                 // nonce()
    pub const GET_OWNERS: [u8; 4] = [0xa0, 0xe6, 0x7e, 0x2b];            // getOwners()
    pub const GET_THRESHOLD: [u8; 4] = [0xe7, 0x52, 0x35, 0xb8];         // getThreshold()
    pub const VERSION: [u8; 4] = [0xff, 0xa1, 0xad, 0x74];               // VERSION()
    pub const IS_MODULE_ENABLED: [u8; 4] = [0x2d, 0x9a, 0xd5, 0x3d];     // isModuleEnabled(address)
    pub const GET_MODULES_PAGINATED: [u8; 4] = [0xcc, 0x2f, 0x84, 0x52]; // getModulesPaginated(address,uint256)
    pub const GET_STORAGE_AT: [u8; 4] = [0x56, 0x24, 0xb2, 0x5b];        // getStorageAt(uint256,uint256)
    pub const SET_GUARD: [u8; 4] = [0xe1, 0x9a, 0x9d, 0xd9];             // setGuard(address)

    // Proxy factory / MultiSend
    pub const CREATE_PROXY_WITH_NONCE: [u8; 4] = [0x16, 0x88, 0xf0, 0xb9]; // createProxyWithNonce(address,bytes,uint256)
    pub const PROXY_CREATION_CODE: [u8; 4] = [0x53, 0xe5, 0xd9, 0x35];     // proxyCreationCode()
    pub const MULTI_SEND: [u8; 4] = [0x8d, 0x80, 0xff, 0x0a];              // multiSend(bytes)

    // Keyspace module
    pub const GET_TX_HASH: [u8; 4] = [0xd2, 0x44, 0x3f, 0x9a];          // getTxHash(address,address,uint256,bytes,uint8)
    pub const EXECUTE_TRANSACTION: [u8; 4] = [0x95, 0xcd, 0xd5, 0xdb];  // executeTransaction(...)
    pub const REGISTER_KEYSTORE: [u8; 4] = [0x3e, 0x24, 0x6c, 0x61];    // registerKeystore(uint256)
    pub const KEYSPACE_KEYS: [u8; 4] = [0xc7, 0x6d, 0xa5, 0x85];        // keyspaceKeys(address)
    pub const NONCES: [u8; 4] = [0x7e, 0xce, 0xbe, 0x00];               // nonces(address)
    pub const KEY_STORE: [u8; 4] = [0x8f, 0xbc, 0x98, 0x11];            // keyStore()
    pub const INITIALIZE: [u8; 4] = [0xc0, 0xc5, 0x3b, 0x8b];           // initialize(address,address,address)

    // Keystore
    pub const ROOT: [u8; 4] = [0xeb, 0xf0, 0xc7, 0x17];                 // root()

    // Revert data
    pub const ERROR_STRING: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];         // Error(string)

    /// Identify a function by its selector
    pub fn identify(selector: &[u8; 4]) -> Option<&'static str> {
        match *selector {
            Self::SETUP => Some("setup"),
            Self::EXEC_TRANSACTION => Some("execTransaction"),
            Self::ENABLE_MODULE => Some("enableModule"),
            Self::NONCE => Some("nonce"),
            Self::GET_OWNERS => Some("getOwners"),
            Self::GET_THRESHOLD => Some("getThreshold"),
            Self::VERSION => Some("VERSION"),
            Self::IS_MODULE_ENABLED => Some("isModuleEnabled"),
            Self::GET_MODULES_PAGINATED => Some("getModulesPaginated"),
            Self::GET_STORAGE_AT => Some("getStorageAt"),
            Self::SET_GUARD => Some("setGuard"),
            Self::CREATE_PROXY_WITH_NONCE => Some("createProxyWithNonce"),
            Self::PROXY_CREATION_CODE => Some("proxyCreationCode"),
            Self::MULTI_SEND => Some("multiSend"),
            Self::GET_TX_HASH => Some("getTxHash"),
            Self::EXECUTE_TRANSACTION => Some("executeTransaction"),
            Self::REGISTER_KEYSTORE => Some("registerKeystore"),
            Self::KEYSPACE_KEYS => Some("keyspaceKeys"),
            Self::NONCES => Some("nonces"),
            Self::KEY_STORE => Some("keyStore"),
            Self::INITIALIZE => Some("initialize"),
            Self::ROOT => Some("root"),
            _ => None,
        }
    }
}
