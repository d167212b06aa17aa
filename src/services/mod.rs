// All service modules
pub mod balance_codec;
pub mod chain_portfolio;
pub mod chain_registry;
pub mod portfolio_aggregator;
pub mod usage_tracker;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export for convenience
pub use chain_portfolio::ChainPortfolioResolver;
pub use chain_registry::ChainRegistry;
pub use portfolio_aggregator::PortfolioAggregator;
pub use usage_tracker::ProviderUsageTracker;
