//! Counterfactual Account addresses
//!
//! A Safe proxy deployed through `createProxyWithNonce` lands at
//!
//! ```text
//! keccak256(0xff ‖ factory ‖ keccak256(keccak256(initializer) ‖ salt)
//!           ‖ keccak256(proxyCreationCode ‖ abi.encode(singleton)))[12..]
//! ```
//!
//! where `initializer` is the `setup(...)` call data. Everything here is
//! pure; the proxy creation code is read once by the caller.

use ethers_core::types::{Address, Bytes, H256};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::contracts::{setup_call, SENTINEL};
use crate::error::{SafeKeyspaceError, SafeKeyspaceResult};
use crate::utils::{keccak256, keccak256_concat, random_bytes32};

/// Delegate call executed by `setup` right after the owners are stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupCallback {
    pub to: Address,
    pub data: Bytes,
}

/// Inputs of [`derive_account_address`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountParams {
    pub owners: Vec<Address>,
    pub threshold: u64,
    /// Safe proxy factory
    pub factory: Address,
    /// Safe singleton the proxy delegates to
    pub singleton: Address,
    /// `proxyCreationCode()` of `factory`
    pub proxy_creation_code: Bytes,
    /// Salt nonce; a random one is drawn when absent
    pub salt: Option<H256>,
    pub callback: Option<SetupCallback>,
    pub fallback_handler: Option<Address>,
}

impl AccountParams {
    pub fn new(
        owners: Vec<Address>,
        threshold: u64,
        factory: Address,
        singleton: Address,
        proxy_creation_code: impl Into<Bytes>,
    ) -> Self {
        Self {
            owners,
            threshold,
            factory,
            singleton,
            proxy_creation_code: proxy_creation_code.into(),
            salt: None,
            callback: None,
            fallback_handler: None,
        }
    }

    pub fn with_salt(mut self, salt: H256) -> Self {
        self.salt = Some(salt);
        self
    }

    pub fn with_callback(mut self, to: Address, data: impl Into<Bytes>) -> Self {
        self.callback = Some(SetupCallback { to, data: data.into() });
        self
    }

    pub fn with_fallback_handler(mut self, handler: Address) -> Self {
        self.fallback_handler = Some(handler);
        self
    }
}

/// Result of [`derive_account_address`]. `salt` and `initializer` are the
/// exact values to deploy with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedAccount {
    pub address: Address,
    pub salt: H256,
    pub initializer: Bytes,
}

/// Reject owner sets `setup` would revert on
pub fn validate_owners(owners: &[Address], threshold: u64) -> SafeKeyspaceResult<()> {
    if owners.is_empty() {
        return Err(SafeKeyspaceError::invalid_input("at least one owner is required"));
    }
    if threshold == 0 || threshold > owners.len() as u64 {
        return Err(SafeKeyspaceError::invalid_input(format!(
            "threshold {} out of range 1..={}",
            threshold,
            owners.len()
        )));
    }

    let mut seen = HashSet::with_capacity(owners.len());
    for owner in owners {
        if owner.is_zero() || *owner == SENTINEL {
            return Err(SafeKeyspaceError::invalid_address(format!(
                "invalid owner {:?}",
                owner
            )));
        }
        if !seen.insert(*owner) {
            return Err(SafeKeyspaceError::invalid_input(format!(
                "duplicate owner {:?}",
                owner
            )));
        }
    }
    Ok(())
}

/// `setup(...)` call data for `params`
pub fn initializer(params: &AccountParams) -> SafeKeyspaceResult<Vec<u8>> {
    validate_owners(&params.owners, params.threshold)?;
    let (to, data) = match &params.callback {
        Some(cb) => (cb.to, cb.data.to_vec()),
        None => (Address::zero(), Vec::new()),
    };
    setup_call(
        &params.owners,
        params.threshold,
        to,
        &data,
        params.fallback_handler.unwrap_or_else(Address::zero),
    )
}

/// Plain CREATE2: `keccak256(0xff ‖ deployer ‖ salt ‖ keccak256(init_code))[12..]`
pub fn create2_address(deployer: Address, salt: H256, init_code: &[u8]) -> Address {
    let code_hash = keccak256(init_code);
    let digest = keccak256_concat(&[&[0xffu8], deployer.as_bytes(), salt.as_bytes(), &code_hash]);
    Address::from_slice(&digest[12..])
}

/// Address, salt and initializer of the Account `params` describes
pub fn derive_account_address(params: &AccountParams) -> SafeKeyspaceResult<DerivedAccount> {
    let initializer = initializer(params)?;
    let salt = params.salt.unwrap_or_else(|| H256(random_bytes32()));

    let combined_salt = keccak256_concat(&[&keccak256(&initializer), salt.as_bytes()]);

    let mut deployment_code = Vec::with_capacity(params.proxy_creation_code.len() + 32);
    deployment_code.extend_from_slice(&params.proxy_creation_code);
    deployment_code.extend_from_slice(H256::from(params.singleton).as_bytes());

    let address = create2_address(params.factory, H256(combined_salt), &deployment_code);
    Ok(DerivedAccount {
        address,
        salt,
        initializer: Bytes::from(initializer),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn params() -> AccountParams {
        AccountParams::new(
            vec![Address::repeat_byte(0x11), Address::repeat_byte(0x22)],
            1,
            Address::repeat_byte(0xfa),
            Address::repeat_byte(0x5a),
            vec![0x60, 0x80, 0x60, 0x40],
        )
        .with_salt(H256::from_low_u64_be(7))
    }

    #[test]
    fn test_create2_known_vectors() {
        let addr = create2_address(Address::zero(), H256::zero(), &[0x00]);
        assert_eq!(addr, "0x4D1A2e2bB4F88F0250f26Ffff098B0b30B26BF38".parse::<Address>().unwrap());

        let deployer: Address = "0xdeadbeef00000000000000000000000000000000".parse().unwrap();
        let addr = create2_address(deployer, H256::zero(), &[0x00]);
        assert_eq!(addr, "0xB928f69Bb1D91Cd65274e3c79d8986362984fDA3".parse::<Address>().unwrap());
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let a = derive_account_address(&params()).unwrap();
        let b = derive_account_address(&params()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.salt, H256::from_low_u64_be(7));
    }

    #[test]
    fn test_derivation_matches_manual_create2() {
        let p = params();
        let derived = derive_account_address(&p).unwrap();

        let salt = keccak256_concat(&[&keccak256(&derived.initializer), p.salt.unwrap().as_bytes()]);
        let mut code = p.proxy_creation_code.to_vec();
        code.extend_from_slice(&[0u8; 12]);
        code.extend_from_slice(p.singleton.as_bytes());
        assert_eq!(derived.address, create2_address(p.factory, H256(salt), &code));
    }

    #[test]
    fn test_every_input_moves_the_address() {
        let base = derive_account_address(&params()).unwrap().address;

        let variants = vec![
            params().with_salt(H256::from_low_u64_be(8)),
            params().with_callback(Address::repeat_byte(0x33), vec![1]),
            params().with_fallback_handler(Address::repeat_byte(0x44)),
            AccountParams { threshold: 2, ..params() },
            AccountParams { singleton: Address::repeat_byte(0x5b), ..params() },
            AccountParams { factory: Address::repeat_byte(0xfb), ..params() },
        ];
        for variant in variants {
            assert_ne!(derive_account_address(&variant).unwrap().address, base);
        }
    }

    #[test]
    fn test_random_salt_is_returned() {
        let p = AccountParams { salt: None, ..params() };
        let a = derive_account_address(&p).unwrap();
        let b = derive_account_address(&p).unwrap();
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.address, b.address);

        let replay = derive_account_address(&p.clone().with_salt(a.salt)).unwrap();
        assert_eq!(replay.address, a.address);
    }

    #[test]
    fn test_owner_validation() {
        let owner = Address::repeat_byte(1);
        assert_eq!(validate_owners(&[], 1).unwrap_err().code, ErrorCode::InvalidInput);
        assert_eq!(validate_owners(&[owner], 0).unwrap_err().code, ErrorCode::InvalidInput);
        assert_eq!(validate_owners(&[owner], 2).unwrap_err().code, ErrorCode::InvalidInput);
        assert_eq!(validate_owners(&[owner, owner], 1).unwrap_err().code, ErrorCode::InvalidInput);
        assert_eq!(
            validate_owners(&[owner, Address::zero()], 1).unwrap_err().code,
            ErrorCode::InvalidAddress
        );
        assert!(validate_owners(&[owner], 1).is_ok());

        let bad = AccountParams { owners: vec![], ..params() };
        assert!(derive_account_address(&bad).is_err());
    }
}
