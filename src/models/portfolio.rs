use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::constants::UNKNOWN_NATIVE_CURRENCY;

/// One supported EVM network. Instances live in the static registry table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainConfig {
    pub key: &'static str,
    pub id: u64,
    pub name: &'static str,
    pub native_currency: &'static str,
    pub explorer_api_url: &'static str,
    pub supports_node_provider: bool,
}

/// ERC-20 holding with an exact decimal balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenRecord {
    pub address: String,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub balance: String,
    pub balance_raw: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChainPortfolio {
    pub chain_name: String,
    pub chain_id: u64,
    pub native_currency: String,
    pub native_balance: String,
    pub tokens: Vec<TokenRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChainPortfolio {
    /// Zero-balance result for a known chain carrying an error annotation.
    pub fn failed(chain: &ChainConfig, error: impl Into<String>) -> Self {
        Self {
            chain_name: chain.name.to_string(),
            chain_id: chain.id,
            native_currency: chain.native_currency.to_string(),
            native_balance: "0".to_string(),
            tokens: Vec::new(),
            error: Some(error.into()),
        }
    }

    /// Placeholder for a chain the registry does not know.
    pub fn unknown(chain_name: &str, error: impl Into<String>) -> Self {
        Self {
            chain_name: chain_name.to_string(),
            chain_id: 0,
            native_currency: UNKNOWN_NATIVE_CURRENCY.to_string(),
            native_balance: "0".to_string(),
            tokens: Vec::new(),
            error: Some(error.into()),
        }
    }

    pub fn has_assets(&self) -> bool {
        self.native_balance != "0" || !self.tokens.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MultiChainPortfolio {
    pub address: String,
    pub chains: Vec<ChainPortfolio>,
    pub total_chains: usize,
    pub chains_with_assets: usize,
    pub timestamp: DateTime<Utc>,
}

impl MultiChainPortfolio {
    pub fn new(address: String, chains: Vec<ChainPortfolio>) -> Self {
        let chains_with_assets = chains.iter().filter(|chain| chain.has_assets()).count();
        Self {
            address,
            total_chains: chains.len(),
            chains_with_assets,
            chains,
            timestamp: Utc::now(),
        }
    }

    /// Number of distinct assets: one per nonzero native balance plus every token.
    pub fn total_assets(&self) -> usize {
        self.chains
            .iter()
            .map(|chain| usize::from(chain.native_balance != "0") + chain.tokens.len())
            .sum()
    }
}
