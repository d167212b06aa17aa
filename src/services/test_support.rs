// In-memory provider doubles shared by the resolver and aggregator tests.

use async_trait::async_trait;
use num_bigint::BigUint;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::constants::{PROVIDER_ALCHEMY, PROVIDER_ETHERSCAN};
use crate::error::{PortfolioError, Result};
use crate::integrations::alchemy::{
    NodeProviderApi, NodeProviderConnector, RawTokenBalance, TokenMetadata,
};
use crate::integrations::etherscan::{AccessProbe, ExplorerApi};
use crate::models::{ChainConfig, TokenRecord};
use crate::services::balance_codec::{parse_raw_amount, to_decimal};

pub(crate) const ADDRESS: &str = "0x742d35cc6634c0532925a3b844bc9e7595f0beb0";

pub(crate) fn token(address: &str, raw: &str, decimals: u8) -> TokenRecord {
    let value = parse_raw_amount(raw).expect("test amount");
    TokenRecord {
        address: address.to_string(),
        name: format!("Token {}", address),
        symbol: "TKN".to_string(),
        decimals,
        balance: to_decimal(&value, decimals),
        balance_raw: value.to_string(),
    }
}

pub(crate) struct FakeExplorer {
    pub credential: bool,
    pub native_raw: String,
    pub native_by_chain: HashMap<u64, String>,
    pub native_failure: Option<String>,
    pub probe: AccessProbe,
    pub tokens: Vec<TokenRecord>,
    pub slow_chain: Option<(u64, Duration)>,
    pub panic_chain: Option<u64>,
    pub probe_calls: AtomicUsize,
    pub listing_calls: AtomicUsize,
}

impl FakeExplorer {
    pub fn capable() -> Self {
        Self {
            credential: true,
            native_raw: "0".to_string(),
            native_by_chain: HashMap::new(),
            native_failure: None,
            probe: AccessProbe::Capable,
            tokens: Vec::new(),
            slow_chain: None,
            panic_chain: None,
            probe_calls: AtomicUsize::new(0),
            listing_calls: AtomicUsize::new(0),
        }
    }

    pub fn probes(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    pub fn listings(&self) -> usize {
        self.listing_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExplorerApi for FakeExplorer {
    fn has_elevated_credential(&self) -> bool {
        self.credential
    }

    async fn native_balance(&self, _address: &str, chain: &ChainConfig) -> Result<BigUint> {
        if self.panic_chain == Some(chain.id) {
            panic!("explorer exploded on {}", chain.key);
        }
        if let Some((id, delay)) = self.slow_chain {
            if id == chain.id {
                tokio::time::sleep(delay).await;
            }
        }
        if let Some(message) = &self.native_failure {
            return Err(PortfolioError::provider(PROVIDER_ETHERSCAN, message.clone()));
        }
        let raw = self
            .native_by_chain
            .get(&chain.id)
            .unwrap_or(&self.native_raw);
        parse_raw_amount(raw)
    }

    async fn probe_elevated_access(&self, _address: &str, _chain: &ChainConfig) -> AccessProbe {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        self.probe.clone()
    }

    async fn token_balances(&self, _address: &str, _chain: &ChainConfig) -> Result<Vec<TokenRecord>> {
        self.listing_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.tokens.clone())
    }
}

pub(crate) struct FakeNodeProvider {
    pub balances: Vec<RawTokenBalance>,
    pub fail_with: Option<fn() -> PortfolioError>,
    pub calls: AtomicUsize,
}

impl FakeNodeProvider {
    pub fn holding(balances: &[(&str, &str)]) -> Self {
        Self {
            balances: balances
                .iter()
                .map(|(contract, balance)| RawTokenBalance {
                    contract_address: contract.to_string(),
                    token_balance: balance.to_string(),
                })
                .collect(),
            fail_with: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(fail_with: fn() -> PortfolioError) -> Self {
        Self {
            fail_with: Some(fail_with),
            ..Self::holding(&[])
        }
    }
}

#[async_trait]
impl NodeProviderApi for FakeNodeProvider {
    async fn token_balances(&self, _address: &str) -> Result<Vec<RawTokenBalance>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.fail_with {
            Some(make_error) => Err(make_error()),
            None => Ok(self.balances.clone()),
        }
    }

    async fn token_metadata(&self, contract: &str) -> Result<TokenMetadata> {
        if contract.is_empty() {
            return Err(PortfolioError::provider(PROVIDER_ALCHEMY, "empty contract"));
        }
        Ok(TokenMetadata {
            name: Some(format!("Fallback {}", contract)),
            symbol: Some("FBK".to_string()),
            decimals: Some(6),
        })
    }
}

pub(crate) struct FakeConnector {
    pub credential: bool,
    pub provider: Arc<FakeNodeProvider>,
}

impl FakeConnector {
    pub fn with(provider: FakeNodeProvider) -> Self {
        Self {
            credential: true,
            provider: Arc::new(provider),
        }
    }

    pub fn node_calls(&self) -> usize {
        self.provider.calls.load(Ordering::SeqCst)
    }
}

impl NodeProviderConnector for FakeConnector {
    fn has_credential(&self) -> bool {
        self.credential
    }

    fn connect(&self, _chain: &ChainConfig) -> Result<Arc<dyn NodeProviderApi>> {
        let api: Arc<dyn NodeProviderApi> = self.provider.clone();
        Ok(api)
    }
}
