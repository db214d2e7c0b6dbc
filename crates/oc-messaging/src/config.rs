//! Endpoint configuration.

use crate::domain::{Address, ChainId, MessagingError, MessagingResult, DEFAULT_MAX_MESSAGE_BYTES};
use serde::{Deserialize, Serialize};
use std::env;

/// Default cap on each pathway verifier set.
pub const DEFAULT_MAX_VERIFIERS_PER_SET: usize = 32;

/// Configuration for one messaging endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Chain this endpoint serves.
    pub local_chain_id: ChainId,
    /// Endpoint owner (manages deliverers and libraries).
    #[serde(with = "hex_address")]
    pub owner: Address,
    /// Largest required or optional verifier set a pathway may list.
    pub max_verifiers_per_set: usize,
    /// Message size limit applied when a pathway does not set one.
    pub default_max_message_bytes: u32,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            local_chain_id: 0,
            owner: [0u8; 32],
            max_verifiers_per_set: DEFAULT_MAX_VERIFIERS_PER_SET,
            default_max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
        }
    }
}

impl EndpointConfig {
    /// Config for `local_chain_id` owned by `owner`, other fields default.
    pub fn new(local_chain_id: ChainId, owner: Address) -> Self {
        Self {
            local_chain_id,
            owner,
            ..Default::default()
        }
    }

    /// Read configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `OC_LOCAL_CHAIN_ID`: Local chain id (required)
    /// - `OC_OWNER`: Owner address, 64 hex chars (required)
    /// - `OC_MAX_VERIFIERS`: Verifier set cap (default: 32)
    /// - `OC_MAX_MESSAGE_BYTES`: Default message limit (default: 10000)
    pub fn from_env() -> MessagingResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> MessagingResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        config.local_chain_id = lookup("OC_LOCAL_CHAIN_ID")
            .ok_or_else(|| MessagingError::Config("OC_LOCAL_CHAIN_ID is not set".to_string()))?
            .parse()
            .map_err(|e| MessagingError::Config(format!("OC_LOCAL_CHAIN_ID: {}", e)))?;

        let owner = lookup("OC_OWNER")
            .ok_or_else(|| MessagingError::Config("OC_OWNER is not set".to_string()))?;
        config.owner = parse_address(&owner)?;

        if let Some(max) = lookup("OC_MAX_VERIFIERS") {
            config.max_verifiers_per_set = max
                .parse()
                .map_err(|e| MessagingError::Config(format!("OC_MAX_VERIFIERS: {}", e)))?;
        }
        if let Some(max) = lookup("OC_MAX_MESSAGE_BYTES") {
            config.default_max_message_bytes = max
                .parse()
                .map_err(|e| MessagingError::Config(format!("OC_MAX_MESSAGE_BYTES: {}", e)))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON document.
    pub fn from_json(json: &str) -> MessagingResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| MessagingError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check field ranges.
    pub fn validate(&self) -> MessagingResult<()> {
        if self.local_chain_id == 0 {
            return Err(MessagingError::Config("local chain id must be non-zero".to_string()));
        }
        if self.owner == [0u8; 32] {
            return Err(MessagingError::Config("owner must be set".to_string()));
        }
        if self.max_verifiers_per_set == 0 || self.max_verifiers_per_set > usize::from(u8::MAX) {
            return Err(MessagingError::Config(format!(
                "max verifiers per set must be in 1..=255, got {}",
                self.max_verifiers_per_set
            )));
        }
        if self.default_max_message_bytes == 0 {
            return Err(MessagingError::Config(
                "default max message bytes must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse a 32-byte address from hex, with or without `0x`.
pub fn parse_address(s: &str) -> MessagingResult<Address> {
    let trimmed = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(trimmed).map_err(|e| MessagingError::Config(e.to_string()))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| MessagingError::Config(format!("address must be 32 bytes, got {}", b.len())))
}

mod hex_address {
    use super::{parse_address, Address};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(address: &Address, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(address))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Address, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse_address(&s).map_err(serde::de::Error::custom)
    }
}
