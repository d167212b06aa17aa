// Supported EVM networks. Adding a chain is a table edit.

use crate::constants::ETHERSCAN_V2_API_URL;
use crate::models::ChainConfig;

static SUPPORTED_CHAINS: &[ChainConfig] = &[
    ChainConfig {
        key: "ethereum",
        id: 1,
        name: "Ethereum",
        native_currency: "ETH",
        explorer_api_url: ETHERSCAN_V2_API_URL,
        supports_node_provider: true,
    },
    ChainConfig {
        key: "base",
        id: 8453,
        name: "Base",
        native_currency: "ETH",
        explorer_api_url: ETHERSCAN_V2_API_URL,
        supports_node_provider: true,
    },
    ChainConfig {
        key: "polygon",
        id: 137,
        name: "Polygon",
        native_currency: "MATIC",
        explorer_api_url: ETHERSCAN_V2_API_URL,
        supports_node_provider: true,
    },
    ChainConfig {
        key: "arbitrum",
        id: 42161,
        name: "Arbitrum",
        native_currency: "ETH",
        explorer_api_url: ETHERSCAN_V2_API_URL,
        supports_node_provider: true,
    },
    ChainConfig {
        key: "optimism",
        id: 10,
        name: "Optimism",
        native_currency: "ETH",
        explorer_api_url: ETHERSCAN_V2_API_URL,
        supports_node_provider: true,
    },
    ChainConfig {
        key: "bsc",
        id: 56,
        name: "BNB Smart Chain",
        native_currency: "BNB",
        explorer_api_url: ETHERSCAN_V2_API_URL,
        supports_node_provider: true,
    },
    ChainConfig {
        key: "avalanche",
        id: 43114,
        name: "Avalanche C-Chain",
        native_currency: "AVAX",
        explorer_api_url: ETHERSCAN_V2_API_URL,
        supports_node_provider: true,
    },
    ChainConfig {
        key: "fantom",
        id: 250,
        name: "Fantom",
        native_currency: "FTM",
        explorer_api_url: ETHERSCAN_V2_API_URL,
        supports_node_provider: true,
    },
    ChainConfig {
        key: "cronos",
        id: 25,
        name: "Cronos",
        native_currency: "CRO",
        explorer_api_url: ETHERSCAN_V2_API_URL,
        supports_node_provider: true,
    },
];

/// Read-only lookup over the supported chain table.
#[derive(Debug, Clone, Copy)]
pub struct ChainRegistry {
    chains: &'static [ChainConfig],
}

impl ChainRegistry {
    pub fn builtin() -> Self {
        Self {
            chains: SUPPORTED_CHAINS,
        }
    }

    #[cfg(test)]
    pub(crate) fn from_entries(entries: Vec<ChainConfig>) -> Self {
        Self {
            chains: Box::leak(entries.into_boxed_slice()),
        }
    }

    /// Case-insensitive lookup by chain key.
    pub fn resolve(&self, name: &str) -> Option<&'static ChainConfig> {
        let wanted = name.trim();
        self.chains
            .iter()
            .find(|chain| chain.key.eq_ignore_ascii_case(wanted))
    }

    /// Chain keys in table order.
    pub fn list_all(&self) -> Vec<&'static str> {
        self.chains.iter().map(|chain| chain.key).collect()
    }
}

impl Default for ChainRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
