//! JSON-RPC chain client
//!
//! Writes go one of two ways:
//! - with a relayer wallet, transactions are signed locally (legacy EIP-155)
//!   and broadcast with `eth_sendRawTransaction`
//! - without one, `eth_sendTransaction` lets the node sign for an unlocked
//!   account (Hardhat/Anvil dev accounts)

use async_trait::async_trait;
use ethers_core::types::transaction::eip2718::TypedTransaction;
use ethers_core::types::{
    Address, BlockNumber, Bytes, TransactionReceipt, TransactionRequest, H256, U256, U64,
};
use ethers_signers::{LocalWallet, Signer};
use serde_json::json;
use std::time::Duration;
use tokio::sync::OnceCell;
use url::Url;

use super::jsonrpc::{JsonRpcClient, JsonRpcFailure, RpcErrorObject};
use super::{CallRequest, ChainClient, TxReceipt};
use crate::abi::decode_revert_reason;
use crate::config::ClientConfig;
use crate::error::{SafeKeyspaceError, SafeKeyspaceResult};
use crate::utils::decode_hex;
use crate::{log_debug, log_info};

const MODULE: &str = "rpc";

/// Message some providers return after broadcasting when they cannot
/// parse the signed transaction back
const MISSING_R: &str = "missing r";

pub struct HttpChainClient {
    rpc: JsonRpcClient,
    relayer: Option<LocalWallet>,
    from: Option<Address>,
    /// Chain id from configuration, checked against the node on first use
    expected_chain_id: Option<u64>,
    chain_id: OnceCell<u64>,
}

impl HttpChainClient {
    pub fn new(url: Url, timeout: Duration) -> SafeKeyspaceResult<Self> {
        Ok(Self {
            rpc: JsonRpcClient::new(url, timeout)?,
            relayer: None,
            from: None,
            expected_chain_id: None,
            chain_id: OnceCell::new(),
        })
    }

    pub fn from_config(config: &ClientConfig) -> SafeKeyspaceResult<Self> {
        let url = Url::parse(&config.chain_rpc_url)?;
        let mut client = Self::new(url, config.rpc_timeout())?;
        client.expected_chain_id = config.chain_id;
        Ok(client)
    }

    /// Sign transactions locally with `wallet`
    pub fn with_relayer(mut self, wallet: LocalWallet) -> Self {
        self.from = Some(wallet.address());
        self.relayer = Some(wallet);
        self
    }

    /// Let the node sign for an unlocked `from` account
    pub fn with_unlocked_sender(mut self, from: Address) -> Self {
        self.from = Some(from);
        self.relayer = None;
        self
    }

    async fn request<R: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> SafeKeyspaceResult<R> {
        self.rpc.call(method, params).await.map_err(|failure| match failure {
            JsonRpcFailure::Transport(err) => err,
            JsonRpcFailure::Service(obj) => classify_service_error(&obj),
        })
    }

    async fn sender_address(&self) -> SafeKeyspaceResult<Address> {
        if let Some(from) = self.from {
            return Ok(from);
        }
        let accounts: Vec<Address> = self.request("eth_accounts", json!([])).await?;
        accounts
            .into_iter()
            .next()
            .ok_or_else(|| SafeKeyspaceError::config("No sender configured and node exposes no accounts"))
    }

    async fn sign_and_send(&self, wallet: &LocalWallet, request: &CallRequest) -> SafeKeyspaceResult<H256> {
        let chain_id = self.chain_id().await?;
        let from = wallet.address();

        let nonce: U256 = self
            .request("eth_getTransactionCount", json!([from, "pending"]))
            .await?;
        let gas_price: U256 = self.request("eth_gasPrice", json!([])).await?;

        let gas = match request.gas {
            Some(gas) => gas,
            None => {
                let mut estimate_req = request.clone();
                estimate_req.from = Some(from);
                let estimate: U256 = self.request("eth_estimateGas", json!([estimate_req])).await?;
                estimate + estimate / 5
            }
        };

        let mut tx = TransactionRequest::new()
            .from(from)
            .value(request.value.unwrap_or_default())
            .gas(gas)
            .gas_price(gas_price)
            .chain_id(chain_id)
            .nonce(nonce)
            .data(request.data.clone().unwrap_or_default());
        if let Some(to) = request.to {
            tx = tx.to(to);
        }

        let typed_tx: TypedTransaction = tx.into();
        let signature = wallet
            .clone()
            .with_chain_id(chain_id)
            .sign_transaction(&typed_tx)
            .await?;
        let raw = typed_tx.rlp_signed(&signature);

        log_debug!(MODULE, "Broadcasting relayed transaction", from = from, nonce = nonce, gas = gas);
        self.send_raw_transaction(raw).await
    }
}

#[async_trait]
impl ChainClient for HttpChainClient {
    async fn chain_id(&self) -> SafeKeyspaceResult<u64> {
        let id = self
            .chain_id
            .get_or_try_init(|| async {
                let id: U256 = self.request("eth_chainId", json!([])).await?;
                check_chain_id(self.expected_chain_id, id.low_u64())
            })
            .await?;
        Ok(*id)
    }

    async fn block_number(&self) -> SafeKeyspaceResult<u64> {
        let n: U64 = self.request("eth_blockNumber", json!([])).await?;
        Ok(n.as_u64())
    }

    async fn get_code(&self, address: Address) -> SafeKeyspaceResult<Bytes> {
        self.request("eth_getCode", json!([address, BlockNumber::Latest])).await
    }

    async fn get_balance(&self, address: Address) -> SafeKeyspaceResult<U256> {
        self.request("eth_getBalance", json!([address, BlockNumber::Latest])).await
    }

    async fn call(&self, request: &CallRequest) -> SafeKeyspaceResult<Bytes> {
        self.request("eth_call", json!([request, BlockNumber::Latest])).await
    }

    async fn send_transaction(&self, request: &CallRequest) -> SafeKeyspaceResult<H256> {
        if let Some(wallet) = &self.relayer {
            return self.sign_and_send(wallet, request).await;
        }

        let mut request = request.clone();
        if request.from.is_none() {
            request.from = Some(self.sender_address().await?);
        }
        let hash: H256 = self.request("eth_sendTransaction", json!([request])).await?;
        log_info!(MODULE, "Transaction submitted", tx_hash = hash);
        Ok(hash)
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> SafeKeyspaceResult<H256> {
        let hash: H256 = self.request("eth_sendRawTransaction", json!([raw])).await?;
        log_info!(MODULE, "Raw transaction submitted", tx_hash = hash);
        Ok(hash)
    }

    async fn get_transaction_receipt(&self, hash: H256) -> SafeKeyspaceResult<Option<TxReceipt>> {
        let receipt: Option<TransactionReceipt> = self
            .request("eth_getTransactionReceipt", json!([hash]))
            .await?;
        Ok(receipt.and_then(to_tx_receipt))
    }

    fn sender(&self) -> Option<Address> {
        self.from
    }
}

/// The node's chain id, unless it contradicts the configured one
fn check_chain_id(expected: Option<u64>, reported: u64) -> SafeKeyspaceResult<u64> {
    match expected {
        Some(expected) if expected != reported => Err(SafeKeyspaceError::config(format!(
            "configured chain id {} but the node reports {}",
            expected, reported
        ))),
        _ => Ok(reported),
    }
}

/// Pending receipts (no block yet) are treated as absent
fn to_tx_receipt(receipt: TransactionReceipt) -> Option<TxReceipt> {
    let block_number = receipt.block_number?.as_u64();
    Some(TxReceipt {
        transaction_hash: receipt.transaction_hash,
        block_number,
        status: receipt.status.map(|s| s.as_u64() == 1).unwrap_or(false),
        gas_used: receipt.gas_used.unwrap_or_default(),
        contract_address: receipt.contract_address,
    })
}

/// Map a JSON-RPC error object from the node onto the error taxonomy
pub(crate) fn classify_service_error(obj: &RpcErrorObject) -> SafeKeyspaceError {
    if obj.message == MISSING_R {
        return SafeKeyspaceError::ambiguous_broadcast(obj.data.as_ref().and_then(hash_from_data));
    }

    let revert_data = obj
        .data
        .as_ref()
        .and_then(|d| match d {
            serde_json::Value::String(s) => Some(s.as_str()),
            serde_json::Value::Object(map) => map.get("data").and_then(|v| v.as_str()),
            _ => None,
        })
        .and_then(|s| decode_hex(s).ok());

    if let Some(reason) = revert_data.as_deref().and_then(decode_revert_reason) {
        return SafeKeyspaceError::reverted(reason).with_details(obj.message.clone());
    }

    if obj.message.contains("revert") {
        return SafeKeyspaceError::reverted(obj.message.clone());
    }

    SafeKeyspaceError::rpc(obj.code, obj.message.clone())
}

/// The transaction hash carried by a "missing r" error payload
fn hash_from_data(data: &serde_json::Value) -> Option<String> {
    let candidate = match data {
        serde_json::Value::String(s) => Some(s.as_str()),
        serde_json::Value::Object(map) => map
            .get("hash")
            .or_else(|| map.get("value").and_then(|v| v.get("hash")))
            .and_then(|v| v.as_str()),
        _ => None,
    }?;
    let is_hash = candidate.len() == 66 && candidate.starts_with("0x");
    is_hash.then(|| candidate.to_string())
}
