//! Known deployments per network

use ethers_core::types::Address;
use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, SafeKeyspaceError, SafeKeyspaceResult};
use crate::utils::parse_address;

const SAFE_SINGLETON: &str = "0x41675C099F32341bf84BFc5382aF534df5C7461a";
const SAFE_PROXY_FACTORY: &str = "0x4e1DCf7AD4e460CfD30791CCC4F9c8a4f820ec67";

/// Networks with a published keystore deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyspaceNetwork {
    Sepolia,
    BaseSepolia,
    OpSepolia,
    /// Local hardhat/anvil node; mocks are deployed by the caller
    Local,
}

impl KeyspaceNetwork {
    pub fn chain_id(&self) -> u64 {
        match self {
            Self::Sepolia => 11155111,
            Self::BaseSepolia => 84532,
            Self::OpSepolia => 11155420,
            Self::Local => crate::config::LOCAL_CHAIN_ID,
        }
    }

    pub fn from_chain_id(chain_id: u64) -> Option<Self> {
        match chain_id {
            11155111 => Some(Self::Sepolia),
            84532 => Some(Self::BaseSepolia),
            11155420 => Some(Self::OpSepolia),
            crate::config::LOCAL_CHAIN_ID => Some(Self::Local),
            _ => None,
        }
    }

    /// Keystore contract holding the published root
    pub fn keystore(&self) -> Option<&'static str> {
        match self {
            Self::BaseSepolia | Self::OpSepolia => Some("0x610A7e97C6D2F1E09e6390F013BFCc39B8EE49e2"),
            Self::Sepolia => Some("0x45b924Ee3EE404E4a9E2a3AFD0AD357eFf79fC49"),
            Self::Local => None,
        }
    }

    /// State proof verifier contract
    pub fn state_verifier(&self) -> Option<&'static str> {
        match self {
            Self::BaseSepolia | Self::OpSepolia | Self::Sepolia => {
                Some("0xfF8cc58Ef1B5a5548b474fDf5FAC0a6A8F748604")
            }
            Self::Local => None,
        }
    }

    /// Safe v1.4.1 singleton (same on all chains)
    pub fn safe_singleton(&self) -> SafeKeyspaceResult<Address> {
        parse_address(SAFE_SINGLETON)
    }

    /// Safe v1.4.1 proxy factory (same on all chains)
    pub fn safe_proxy_factory(&self) -> SafeKeyspaceResult<Address> {
        parse_address(SAFE_PROXY_FACTORY)
    }

    pub fn keystore_address(&self) -> SafeKeyspaceResult<Address> {
        let raw = self.keystore().ok_or_else(|| {
            SafeKeyspaceError::config(format!("no published keystore on {:?}", self))
        })?;
        parse_address(raw)
    }

    pub fn state_verifier_address(&self) -> SafeKeyspaceResult<Address> {
        let raw = self.state_verifier().ok_or_else(|| {
            SafeKeyspaceError::config(format!("no published state verifier on {:?}", self))
        })?;
        parse_address(raw)
    }
}

impl std::str::FromStr for KeyspaceNetwork {
    type Err = SafeKeyspaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sepolia" | "11155111" => Ok(Self::Sepolia),
            "base_sepolia" | "base-sepolia" | "84532" => Ok(Self::BaseSepolia),
            "op_sepolia" | "op-sepolia" | "11155420" => Ok(Self::OpSepolia),
            "hardhat" | "localhost" | "local" | "31337" => Ok(Self::Local),
            _ => Err(SafeKeyspaceError::new(
                ErrorCode::InvalidInput,
                format!("Unknown keyspace network: {}", s),
            )),
        }
    }
}
