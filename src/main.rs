use ethers::types::Address;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod constants;
mod error;
mod integrations;
mod models;
mod services;

use config::{ChainSelection, Config};
use error::PortfolioError;
use integrations::{alchemy::BatchPolicy, AlchemyConnector, EtherscanClient};
use services::{
    usage_tracker::compact_summary, ChainPortfolioResolver, ChainRegistry, PortfolioAggregator,
    ProviderUsageTracker,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "multichain_portfolio=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    let config = Config::from_env()?;
    config.validate()?;

    // A positional argument overrides EVM_PUBLIC_KEY
    let raw_address = std::env::args()
        .nth(1)
        .or_else(|| config.evm_address.clone())
        .ok_or_else(|| anyhow::anyhow!("EVM_PUBLIC_KEY is not set and no address was given"))?;
    let address = validate_address(&raw_address)?;

    let registry = ChainRegistry::builtin();
    let usage = ProviderUsageTracker::shared();
    let explorer = EtherscanClient::new(
        config.etherscan_api_key.clone(),
        config.providers.clone(),
        usage.clone(),
    )?;
    let node_provider = AlchemyConnector::new(
        config.alchemy_api_key.clone(),
        config.providers.clone(),
        usage.clone(),
    )?;
    let aggregator = PortfolioAggregator::new(ChainPortfolioResolver::new(
        registry,
        Arc::new(explorer),
        Arc::new(node_provider),
        BatchPolicy::from(&config.providers),
    ));

    tracing::info!("Starting multi-chain portfolio scan");
    tracing::info!(
        "Etherscan key: {}, Alchemy key: {}",
        if config.has_etherscan_key() { "set" } else { "missing" },
        if config.alchemy_api_key.is_some() { "set" } else { "missing" }
    );

    // Each scan reports only its own provider traffic
    usage.reset();
    let report = match &config.chains {
        ChainSelection::Default => aggregator.aggregate_default(&address).await,
        ChainSelection::All => aggregator.aggregate(&address, None).await,
        ChainSelection::Explicit(chains) => {
            aggregator.aggregate(&address, Some(chains.as_slice())).await
        }
    };

    println!("{}", serde_json::to_string_pretty(&report)?);

    tracing::info!(
        "Scanned {} chains: {} with assets, {} assets total",
        report.total_chains,
        report.chains_with_assets,
        report.total_assets()
    );
    for chain in report.chains.iter().filter(|chain| chain.error.is_some()) {
        tracing::warn!(
            "{}: {}",
            chain.chain_name,
            chain.error.as_deref().unwrap_or_default()
        );
    }
    if let Some(summary) = compact_summary(&usage.snapshot()) {
        tracing::info!("{}", summary);
    }

    Ok(())
}

// Internal helper that checks the `0x` + 40 hex shape and normalizes case.
fn validate_address(raw: &str) -> Result<String, PortfolioError> {
    let trimmed = raw.trim();
    let well_formed = trimmed.len() == 42
        && trimmed.starts_with("0x")
        && trimmed[2..].chars().all(|ch| ch.is_ascii_hexdigit());
    if !well_formed {
        return Err(PortfolioError::InvalidAddress(trimmed.to_string()));
    }
    let parsed: Address = trimmed
        .parse()
        .map_err(|_| PortfolioError::InvalidAddress(trimmed.to_string()))?;
    Ok(format!("{:#x}", parsed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_checksummed_and_lowercases() {
        let address = validate_address("0x742d35Cc6634C0532925a3b844Bc9e7595f0bEb0")
            .expect("valid address");
        assert_eq!(address, "0x742d35cc6634c0532925a3b844bc9e7595f0beb0");
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(validate_address("742d35cc6634c0532925a3b844bc9e7595f0beb0").is_err());
        assert!(validate_address("0x742d35cc6634c0532925a3b844bc9e7595f0be").is_err());
        assert!(validate_address("0xzz2d35cc6634c0532925a3b844bc9e7595f0beb0").is_err());
        assert!(validate_address("").is_err());
    }
}
