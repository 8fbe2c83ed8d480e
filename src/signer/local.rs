//! In-process signer backed by an ethers `LocalWallet`

use async_trait::async_trait;
use ethers_core::types::{Address, Signature, H256};
use ethers_signers::{LocalWallet, Signer};
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroizing;

use super::SigningCapability;
use crate::error::{SafeKeyspaceError, SafeKeyspaceResult};

#[derive(Clone)]
pub struct LocalSigner {
    wallet: LocalWallet,
}

impl LocalSigner {
    pub fn new(wallet: LocalWallet) -> Self {
        Self { wallet }
    }

    /// Parse a hex private key (with or without `0x`)
    pub fn from_private_key(private_key_hex: &str) -> SafeKeyspaceResult<Self> {
        let trimmed = private_key_hex.trim();
        let body = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let wallet = LocalWallet::from_str(body)
            .map_err(|e| SafeKeyspaceError::invalid_input(format!("Invalid private key: {}", e)))?;
        Ok(Self { wallet })
    }

    pub fn from_bytes(secret: &[u8]) -> SafeKeyspaceResult<Self> {
        let wallet = LocalWallet::from_bytes(secret)
            .map_err(|e| SafeKeyspaceError::invalid_input(format!("Invalid private key: {}", e)))?;
        Ok(Self { wallet })
    }

    /// Fresh random key
    pub fn random() -> Self {
        Self {
            wallet: LocalWallet::new(&mut rand::thread_rng()),
        }
    }

    /// Raw secret scalar, for deriving the public key without a signature.
    /// Wiped when dropped.
    pub fn secret_bytes(&self) -> Zeroizing<[u8; 32]> {
        let mut out = Zeroizing::new([0u8; 32]);
        out.copy_from_slice(&self.wallet.signer().to_bytes());
        out
    }

    pub fn wallet(&self) -> &LocalWallet {
        &self.wallet
    }
}

impl fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSigner")
            .field("address", &self.wallet.address())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SigningCapability for LocalSigner {
    fn address(&self) -> Address {
        self.wallet.address()
    }

    async fn sign_message(&self, message: &[u8]) -> SafeKeyspaceResult<Signature> {
        Ok(self.wallet.sign_message(message).await?)
    }

    async fn sign_hash(&self, hash: H256) -> SafeKeyspaceResult<Signature> {
        Ok(self.wallet.sign_hash(hash)?)
    }
}
