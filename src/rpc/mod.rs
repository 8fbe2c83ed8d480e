//! Chain RPC
//!
//! Flows talk to the chain only through [`ChainClient`], so tests can inject
//! an in-memory chain. [`HttpChainClient`] is the JSON-RPC implementation.

pub mod http;
pub mod jsonrpc;

pub use http::HttpChainClient;
pub use jsonrpc::{JsonRpcClient, JsonRpcFailure, RpcErrorObject};

use async_trait::async_trait;
use ethers_core::types::{Address, Bytes, H256, U256};
use serde::{Deserialize, Serialize};

use crate::error::SafeKeyspaceResult;

/// Message call or transaction to send
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Bytes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas: Option<U256>,
}

impl CallRequest {
    pub fn to(to: Address) -> Self {
        Self {
            to: Some(to),
            ..Default::default()
        }
    }

    pub fn with_data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_gas(mut self, gas: u64) -> Self {
        self.gas = Some(U256::from(gas));
        self
    }

}

/// The subset of a transaction receipt the flows use
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub transaction_hash: H256,
    pub block_number: u64,
    /// `true` when the transaction did not revert
    pub status: bool,
    pub gas_used: U256,
    pub contract_address: Option<Address>,
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn chain_id(&self) -> SafeKeyspaceResult<u64>;

    async fn block_number(&self) -> SafeKeyspaceResult<u64>;

    async fn get_code(&self, address: Address) -> SafeKeyspaceResult<Bytes>;

    async fn get_balance(&self, address: Address) -> SafeKeyspaceResult<U256>;

    /// `eth_call` against the latest block
    async fn call(&self, request: &CallRequest) -> SafeKeyspaceResult<Bytes>;

    /// Submit a state-changing transaction from the client's sender
    async fn send_transaction(&self, request: &CallRequest) -> SafeKeyspaceResult<H256>;

    /// Broadcast an already signed transaction
    async fn send_raw_transaction(&self, raw: Bytes) -> SafeKeyspaceResult<H256>;

    async fn get_transaction_receipt(&self, hash: H256) -> SafeKeyspaceResult<Option<TxReceipt>>;

    /// Address that pays for `send_transaction`, when known
    fn sender(&self) -> Option<Address> {
        None
    }
}
