//! Typed client for the keystore's state and recovery services
//!
//! Keys, vk hashes and data hashes are canonicalized (leading zero nibbles
//! stripped) before they are sent, since the service parses them as
//! integers. Signatures, vk/data payloads and proofs go out verbatim.

use ethers_core::types::{Bytes, H256};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::sync::Arc;

use super::transport::{KeystoreEndpoint, KeystoreTransport};
use crate::error::SafeKeyspaceResult;
use crate::types::KeyspaceKey;
use crate::utils::{decode_hex, strip_leading_zeros, to_hex};
use crate::{log_debug, log_info};

const MODULE: &str = "keyspace";

/// Proving circuit the recovery service should use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CircuitType {
    #[default]
    Secp256k1,
    Webauthn,
}

impl CircuitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitType::Secp256k1 => "secp256k1",
            CircuitType::Webauthn => "webauthn",
        }
    }
}

impl fmt::Display for CircuitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `mksr_get` result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeystoreValue {
    pub value: String,
}

/// `mksr_proof` result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigProof {
    pub root: String,
    pub proof: String,
}

impl ConfigProof {
    pub fn proof_bytes(&self) -> SafeKeyspaceResult<Bytes> {
        Ok(Bytes::from(decode_hex(&self.proof)?))
    }
}

/// `recover_proveSignature` result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoverProof {
    pub proof: String,
    pub current_vk: String,
    pub current_data: String,
}

/// Canonical wire form of a key-like value
pub fn canonicalize(hex_value: &str) -> String {
    strip_leading_zeros(hex_value)
}

fn canonical_word(word: &H256) -> String {
    canonicalize(&to_hex(word.as_bytes()))
}

#[derive(Clone)]
pub struct KeystoreClient {
    transport: Arc<dyn KeystoreTransport>,
}

impl KeystoreClient {
    pub fn new(transport: Arc<dyn KeystoreTransport>) -> Self {
        Self { transport }
    }

    /// Current value stored under `key`
    pub async fn get_value(&self, key: &KeyspaceKey) -> SafeKeyspaceResult<KeystoreValue> {
        let result = self
            .transport
            .request(KeystoreEndpoint::State, "mksr_get", json!([key.canonical_hex()]))
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Proof that `key` is configured with `(vk_hash, data_hash)` under the
    /// current root
    pub async fn get_config_proof(
        &self,
        key: &KeyspaceKey,
        vk_hash: H256,
        data_hash: H256,
    ) -> SafeKeyspaceResult<ConfigProof> {
        log_debug!(MODULE, "Requesting config proof", key = key, data_hash = data_hash);
        let result = self
            .transport
            .request(
                KeystoreEndpoint::State,
                "mksr_proof",
                json!([key.canonical_hex(), canonical_word(&vk_hash), canonical_word(&data_hash)]),
            )
            .await?;
        let proof: ConfigProof = serde_json::from_value(result)?;
        log_debug!(MODULE, "Config proof received", root = proof.root, proof = proof.proof);
        Ok(proof)
    }

    /// Ask the recovery prover for a proof that the owner of `key` approved
    /// `new_key` with `signature`
    pub async fn get_recover_proof(
        &self,
        key: &KeyspaceKey,
        new_key: &KeyspaceKey,
        circuit_type: CircuitType,
        signature: &[u8],
    ) -> SafeKeyspaceResult<RecoverProof> {
        log_info!(MODULE, "Requesting recovery proof", key = key, new_key = new_key, circuit = circuit_type);
        let result = self
            .transport
            .request(
                KeystoreEndpoint::Recovery,
                "recover_proveSignature",
                json!([
                    key.canonical_hex(),
                    new_key.canonical_hex(),
                    to_hex(signature),
                    circuit_type.as_str()
                ]),
            )
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Point `key` at `new_key`'s configuration
    pub async fn set_config(
        &self,
        key: &KeyspaceKey,
        new_key: &KeyspaceKey,
        recover_proof: &RecoverProof,
    ) -> SafeKeyspaceResult<()> {
        self.transport
            .request(
                KeystoreEndpoint::State,
                "mksr_set",
                json!([
                    key.canonical_hex(),
                    new_key.canonical_hex(),
                    recover_proof.current_vk,
                    recover_proof.current_data,
                    recover_proof.proof
                ]),
            )
            .await?;
        log_info!(MODULE, "Keystore configuration updated", key = key, new_key = new_key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorCode, SafeKeyspaceError};
    use async_trait::async_trait;
    use ethers_core::types::U256;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        calls: Mutex<Vec<(KeystoreEndpoint, String, serde_json::Value)>>,
        reject: bool,
        proof: Option<String>,
    }

    #[async_trait]
    impl KeystoreTransport for Recording {
        async fn request(
            &self,
            endpoint: KeystoreEndpoint,
            method: &str,
            params: serde_json::Value,
        ) -> SafeKeyspaceResult<serde_json::Value> {
            self.calls
                .lock()
                .unwrap()
                .push((endpoint, method.to_string(), params));
            if self.reject {
                return Err(SafeKeyspaceError::proof_rejected("unknown key"));
            }
            Ok(match method {
                "mksr_get" => json!({"value": "0x01"}),
                "mksr_proof" => {
                    let proof = self.proof.clone().unwrap_or_else(|| "0xabcd".to_string());
                    json!({"root": "0x02", "proof": proof})
                }
                "recover_proveSignature" => {
                    json!({"proof": "0x03", "currentVk": "0x04", "currentData": "0x05"})
                }
                _ => serde_json::Value::Null,
            })
        }
    }

    fn key(n: u64) -> KeyspaceKey {
        KeyspaceKey::from_u256(U256::from(n))
    }

    #[test]
    fn test_canonicalize() {
        assert_eq!(canonicalize("0x000abc"), "0xabc");
        assert_eq!(canonicalize("0xabc"), "0xabc");
        assert_eq!(canonicalize("0x0000"), "0x");
        assert_eq!(canonicalize(&canonicalize("0x00f0")), "0xf0");
    }

    #[tokio::test]
    async fn test_config_proof_params_are_canonical() {
        let transport = Arc::new(Recording::default());
        let client = KeystoreClient::new(transport.clone());

        let proof = client
            .get_config_proof(&key(0xabc), H256::from_low_u64_be(0x10), H256::from_low_u64_be(0x2))
            .await
            .unwrap();
        assert_eq!(proof.proof_bytes().unwrap().to_vec(), vec![0xab, 0xcd]);

        let calls = transport.calls.lock().unwrap();
        assert_eq!(calls[0].0, KeystoreEndpoint::State);
        assert_eq!(calls[0].1, "mksr_proof");
        assert_eq!(calls[0].2, json!(["0xabc", "0x10", "0x2"]));
    }

    #[tokio::test]
    async fn test_recover_proof_goes_to_recovery_endpoint() {
        let transport = Arc::new(Recording::default());
        let client = KeystoreClient::new(transport.clone());

        let proof = client
            .get_recover_proof(&key(1), &key(2), CircuitType::Secp256k1, &[0xaa, 0xbb])
            .await
            .unwrap();
        assert_eq!(proof.current_vk, "0x04");

        client.set_config(&key(1), &key(2), &proof).await.unwrap();

        let calls = transport.calls.lock().unwrap();
        assert_eq!(calls[0].0, KeystoreEndpoint::Recovery);
        assert_eq!(calls[0].2, json!(["0x1", "0x2", "0xaabb", "secp256k1"]));
        assert_eq!(calls[1].1, "mksr_set");
        assert_eq!(calls[1].2, json!(["0x1", "0x2", "0x04", "0x05", "0x03"]));
    }

    #[tokio::test]
    async fn test_rejection_is_not_retryable() {
        let transport = Arc::new(Recording {
            reject: true,
            ..Default::default()
        });
        let client = KeystoreClient::new(transport);
        let err = client.get_value(&key(1)).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ProofRejected);
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_malformed_proof_is_logged_without_panicking() {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let transport = Arc::new(Recording {
            proof: Some(format!("0xaaaaaaa\u{e9}{}", "b".repeat(80))),
            ..Default::default()
        });
        let client = KeystoreClient::new(transport);

        let proof = client
            .get_config_proof(&key(1), H256::from_low_u64_be(0x10), H256::from_low_u64_be(0x2))
            .await
            .unwrap();
        assert!(proof.proof_bytes().is_err());
    }
}
