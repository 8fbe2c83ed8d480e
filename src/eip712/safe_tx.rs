//! The Safe `SafeTx` typed-data record
//!
//! Owners sign this record for direct `execTransaction` execution. Gas
//! refund fields are always zero: the relayer pays and nobody is refunded.

use ethers_core::types::{Address, Bytes, H256, U256};
use serde_json::json;
use std::collections::HashMap;

use super::hasher::hash_typed_data;
use super::types::{Eip712Domain, Eip712Error, TypedData, TypedDataField};
use crate::types::{OperationKind, SafeCall};
use crate::utils::{to_checksum_address, to_hex};

pub const SAFE_TX_TYPE: &str = "SafeTx";

/// `keccak256("SafeTx(address to,uint256 value,bytes data,uint8 operation,uint256 safeTxGas,uint256 baseGas,uint256 gasPrice,address gasToken,address refundReceiver,uint256 nonce)")`
pub const SAFE_TX_TYPEHASH: &str =
    "0xbb8310d486368db6bd6f849402fdd73ad53d316b5a4b2644ad6efe0f941286d8";

/// `keccak256("EIP712Domain(uint256 chainId,address verifyingContract)")`
pub const SAFE_DOMAIN_TYPEHASH: &str =
    "0x47e79534a245952e8b16893a336b85a3d9ea9fa8c573f3d803afb92a79469218";

/// A fully specified Safe transaction as covered by owner signatures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeTx {
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub operation: OperationKind,
    pub safe_tx_gas: U256,
    pub base_gas: U256,
    pub gas_price: U256,
    pub gas_token: Address,
    pub refund_receiver: Address,
    pub nonce: U256,
}

impl SafeTx {
    /// Bind a call to an Account nonce with all refund parameters zeroed
    pub fn from_call(call: &SafeCall, nonce: u64) -> Self {
        Self {
            to: call.to,
            value: call.value,
            data: call.data.clone(),
            operation: call.operation,
            safe_tx_gas: U256::zero(),
            base_gas: U256::zero(),
            gas_price: U256::zero(),
            gas_token: Address::zero(),
            refund_receiver: Address::zero(),
            nonce: U256::from(nonce),
        }
    }

    fn type_fields() -> Vec<TypedDataField> {
        vec![
            TypedDataField::new("to", "address"),
            TypedDataField::new("value", "uint256"),
            TypedDataField::new("data", "bytes"),
            TypedDataField::new("operation", "uint8"),
            TypedDataField::new("safeTxGas", "uint256"),
            TypedDataField::new("baseGas", "uint256"),
            TypedDataField::new("gasPrice", "uint256"),
            TypedDataField::new("gasToken", "address"),
            TypedDataField::new("refundReceiver", "address"),
            TypedDataField::new("nonce", "uint256"),
        ]
    }

    /// The record as `eth_signTypedData_v4` payload for `account` on `chain_id`
    pub fn typed_data(&self, chain_id: u64, account: Address) -> TypedData {
        let domain = Eip712Domain {
            chain_id: Some(json!(chain_id)),
            verifying_contract: Some(to_checksum_address(&account)),
            ..Default::default()
        };

        let mut types = HashMap::new();
        types.insert("EIP712Domain".to_string(), domain.fields());
        types.insert(SAFE_TX_TYPE.to_string(), Self::type_fields());

        let message = json!({
            "to": to_checksum_address(&self.to),
            "value": self.value.to_string(),
            "data": to_hex(&self.data),
            "operation": self.operation.as_u8(),
            "safeTxGas": self.safe_tx_gas.to_string(),
            "baseGas": self.base_gas.to_string(),
            "gasPrice": self.gas_price.to_string(),
            "gasToken": to_checksum_address(&self.gas_token),
            "refundReceiver": to_checksum_address(&self.refund_receiver),
            "nonce": self.nonce.to_string(),
        });

        TypedData {
            types,
            primary_type: SAFE_TX_TYPE.to_string(),
            domain,
            message,
        }
    }

    /// The digest owners sign, equal to the Safe's `getTransactionHash`
    pub fn hash(&self, chain_id: u64, account: Address) -> Result<H256, Eip712Error> {
        hash_typed_data(&self.typed_data(chain_id, account)).map(H256)
    }
}

/// Digest of `call` executed by `account` at `nonce`
pub fn safe_tx_hash(
    chain_id: u64,
    account: Address,
    call: &SafeCall,
    nonce: u64,
) -> Result<H256, Eip712Error> {
    SafeTx::from_call(call, nonce).hash(chain_id, account)
}
