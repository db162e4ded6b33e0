use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::chain;
use crate::error::ConfigError;

/// Runtime configuration for search, resolution and explorer links.
///
/// Every field has a default, so a partial JSON document only overrides what
/// it names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Quiescence window before raw input is acted upon.
    #[serde(rename = "debounceMs")]
    pub debounce_ms: u64,

    /// Chain used by sources that always resolve against one fixed chain.
    #[serde(rename = "referenceChainId")]
    pub reference_chain_id: u64,

    pub ens: ServiceChains,

    pub sid: ServiceChains,

    pub uns: ServiceChains,

    /// Block explorer base URL per chain id.
    pub explorers: HashMap<u64, String>,
}

/// Chain availability rules for one naming service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceChains {
    #[serde(rename = "supportedChains")]
    #[serde(default)]
    pub supported_chains: Vec<u64>,

    /// Chains the service is never queried on, even if listed as supported.
    #[serde(rename = "excludedChains")]
    #[serde(default)]
    pub excluded_chains: Vec<u64>,
}

impl ServiceChains {
    pub fn new(supported: &[u64]) -> Self {
        Self {
            supported_chains: supported.to_vec(),
            excluded_chains: Vec::new(),
        }
    }

    pub fn supports(&self, chain_id: u64) -> bool {
        self.supported_chains.contains(&chain_id) && !self.excluded_chains.contains(&chain_id)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        let explorers = [
            (chain::ETHEREUM, "https://etherscan.io"),
            (chain::GOERLI, "https://goerli.etherscan.io"),
            (chain::BSC, "https://bscscan.com"),
            (chain::BSC_TESTNET, "https://testnet.bscscan.com"),
            (chain::POLYGON, "https://polygonscan.com"),
            (chain::OPBNB, "https://opbnbscan.com"),
            (chain::ZKSYNC, "https://explorer.zksync.io"),
            (chain::BASE, "https://basescan.org"),
            (chain::ARBITRUM_ONE, "https://arbiscan.io"),
            (chain::LINEA, "https://lineascan.build"),
            (chain::SEPOLIA, "https://sepolia.etherscan.io"),
        ]
        .into_iter()
        .map(|(id, url)| (id, url.to_string()))
        .collect();

        Self {
            debounce_ms: 500,
            reference_chain_id: chain::ETHEREUM,
            ens: ServiceChains {
                supported_chains: vec![chain::ETHEREUM, chain::GOERLI, chain::SEPOLIA],
                excluded_chains: vec![chain::BSC, chain::BSC_TESTNET],
            },
            sid: ServiceChains::new(&[chain::BSC, chain::BSC_TESTNET, chain::ARBITRUM_ONE]),
            uns: ServiceChains::new(&[chain::ETHEREUM, chain::POLYGON]),
            explorers,
        }
    }
}

impl SearchConfig {
    /// Parse a configuration from JSON, filling in defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: SearchConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to JSON.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.debounce_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "debounceMs",
                reason: "must be greater than zero".to_string(),
            });
        }
        for (chain_id, url) in &self.explorers {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::Invalid {
                    field: "explorers",
                    reason: format!("chain {chain_id}: {url:?} is not an http(s) url"),
                });
            }
        }
        Ok(())
    }
}
