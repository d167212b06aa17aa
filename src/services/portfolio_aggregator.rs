use futures_util::future::join_all;
use std::sync::Arc;
use tokio::task::JoinError;

use crate::{
    constants::DEFAULT_CHAIN,
    models::{ChainPortfolio, MultiChainPortfolio},
    services::chain_portfolio::ChainPortfolioResolver,
};

// ==================== AGGREGATOR ====================

/// Fans one address out to every requested chain and collects the results.
#[derive(Clone)]
pub struct PortfolioAggregator {
    resolver: Arc<ChainPortfolioResolver>,
}

impl PortfolioAggregator {
    pub fn new(resolver: ChainPortfolioResolver) -> Self {
        Self {
            resolver: Arc::new(resolver),
        }
    }

    /// Resolves every chain concurrently. `None` scans the whole registry.
    ///
    /// The report keeps request order; a chain task that dies is replaced by
    /// an error-annotated placeholder instead of failing the report.
    pub async fn aggregate(&self, address: &str, chains: Option<&[String]>) -> MultiChainPortfolio {
        let requested: Vec<String> = match chains {
            Some(chains) => chains.to_vec(),
            None => self
                .resolver
                .registry()
                .list_all()
                .into_iter()
                .map(str::to_string)
                .collect(),
        };
        tracing::info!(
            "Fetching portfolio for {} across {} chains",
            address,
            requested.len()
        );

        let handles = requested.iter().map(|chain_name| {
            let resolver = Arc::clone(&self.resolver);
            let address = address.to_string();
            let chain_name = chain_name.clone();
            tokio::spawn(async move { resolver.resolve(&address, &chain_name).await })
        });
        let settled = join_all(handles).await;

        let chains: Vec<ChainPortfolio> = requested
            .iter()
            .zip(settled)
            .map(|(chain_name, outcome)| match outcome {
                Ok(portfolio) => portfolio,
                Err(err) => self.placeholder(chain_name, err),
            })
            .collect();

        let report = MultiChainPortfolio::new(address.to_string(), chains);
        tracing::info!(
            "Portfolio for {}: {} of {} chains hold assets",
            address,
            report.chains_with_assets,
            report.total_chains
        );
        report
    }

    /// Lightweight single-chain request against the default chain.
    pub async fn aggregate_default(&self, address: &str) -> MultiChainPortfolio {
        let chains = [DEFAULT_CHAIN.to_string()];
        self.aggregate(address, Some(&chains)).await
    }

    // Internal helper that converts a crashed chain task into a report entry.
    fn placeholder(&self, chain_name: &str, err: JoinError) -> ChainPortfolio {
        tracing::warn!("Chain task for {} did not complete: {}", chain_name, err);
        let message = format!("Failed to fetch {} balances: {}", chain_name, err);
        match self.resolver.registry().resolve(chain_name) {
            Some(chain) => ChainPortfolio::failed(chain, message),
            None => ChainPortfolio::unknown(chain_name, message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::alchemy::BatchPolicy;
    use crate::services::chain_registry::ChainRegistry;
    use crate::services::test_support::{
        token, FakeConnector, FakeExplorer, FakeNodeProvider, ADDRESS,
    };
    use std::collections::HashMap;
    use std::time::Duration;

    fn aggregator(explorer: FakeExplorer) -> PortfolioAggregator {
        PortfolioAggregator::new(ChainPortfolioResolver::new(
            ChainRegistry::builtin(),
            Arc::new(explorer),
            Arc::new(FakeConnector::with(FakeNodeProvider::holding(&[]))),
            BatchPolicy {
                batch_size: 5,
                delay: Duration::from_millis(0),
            },
        ))
    }

    fn names(chains: &[&str]) -> Vec<String> {
        chains.iter().map(|c| c.to_string()).collect()
    }

    #[tokio::test]
    async fn keeps_request_order_when_first_chain_is_slowest() {
        let explorer = FakeExplorer {
            slow_chain: Some((1, Duration::from_millis(150))),
            ..FakeExplorer::capable()
        };
        let requested = names(&["ethereum", "base", "polygon"]);
        let report = aggregator(explorer)
            .aggregate(ADDRESS, Some(&requested))
            .await;

        let order: Vec<&str> = report.chains.iter().map(|c| c.chain_name.as_str()).collect();
        assert_eq!(order, vec!["Ethereum", "Base", "Polygon"]);
        assert_eq!(report.total_chains, 3);
    }

    #[tokio::test]
    async fn unknown_chain_does_not_abort_siblings() {
        let explorer = FakeExplorer {
            native_raw: "1000000000000000000".to_string(),
            ..FakeExplorer::capable()
        };
        let requested = names(&["ethereum", "solana", "base"]);
        let report = aggregator(explorer)
            .aggregate(ADDRESS, Some(&requested))
            .await;

        assert_eq!(report.chains.len(), 3);
        assert_eq!(report.chains[0].native_balance, "1");
        assert_eq!(report.chains[1].chain_name, "solana");
        assert_eq!(report.chains[1].chain_id, 0);
        assert!(report.chains[1].error.is_some());
        assert_eq!(report.chains[2].native_balance, "1");
        assert_eq!(report.chains_with_assets, 2);
    }

    #[tokio::test]
    async fn counts_chains_with_native_or_tokens() {
        let mut native_by_chain = HashMap::new();
        native_by_chain.insert(8453, "250000000000000000".to_string());
        let explorer = FakeExplorer {
            native_by_chain,
            ..FakeExplorer::capable()
        };
        let requested = names(&["ethereum", "base", "polygon"]);
        let report = aggregator(explorer)
            .aggregate(ADDRESS, Some(&requested))
            .await;
        assert_eq!(report.chains_with_assets, 1);
        assert_eq!(report.chains[1].native_balance, "0.25");

        let explorer = FakeExplorer {
            tokens: vec![token("0xa1", "7", 0)],
            ..FakeExplorer::capable()
        };
        let report = aggregator(explorer)
            .aggregate(ADDRESS, Some(&requested))
            .await;
        assert_eq!(report.chains_with_assets, 3);
        assert_eq!(report.total_assets(), 3);
    }

    #[tokio::test]
    async fn crashed_chain_task_becomes_placeholder() {
        let explorer = FakeExplorer {
            panic_chain: Some(137),
            native_raw: "1000000000000000000".to_string(),
            ..FakeExplorer::capable()
        };
        let requested = names(&["ethereum", "polygon"]);
        let report = aggregator(explorer)
            .aggregate(ADDRESS, Some(&requested))
            .await;

        let polygon = &report.chains[1];
        assert_eq!(polygon.chain_name, "Polygon");
        assert_eq!(polygon.chain_id, 137);
        assert_eq!(polygon.native_currency, "MATIC");
        assert_eq!(polygon.native_balance, "0");
        assert!(polygon.error.is_some());
        assert_eq!(report.chains[0].native_balance, "1");
    }

    #[tokio::test]
    async fn no_selection_scans_every_registry_chain() {
        let report = aggregator(FakeExplorer::capable())
            .aggregate(ADDRESS, None)
            .await;
        assert_eq!(report.total_chains, 9);
        assert_eq!(report.chains[8].chain_name, "Cronos");
        assert_eq!(report.chains_with_assets, 0);
    }

    #[tokio::test]
    async fn default_request_covers_single_chain() {
        let report = aggregator(FakeExplorer::capable())
            .aggregate_default(ADDRESS)
            .await;
        assert_eq!(report.total_chains, 1);
        assert_eq!(report.chains[0].chain_id, 1);
        assert_eq!(report.address, ADDRESS);
    }
}
