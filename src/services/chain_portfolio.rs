use num_bigint::BigUint;
use std::collections::HashSet;
use std::sync::Arc;

use crate::{
    constants::{NATIVE_DECIMALS, PROVIDER_ALCHEMY, PROVIDER_ETHERSCAN},
    error::{PortfolioError, Result},
    integrations::alchemy::{list_token_records, BatchPolicy},
    integrations::{AccessProbe, ExplorerApi, NodeProviderConnector},
    models::{ChainConfig, ChainPortfolio, TokenRecord},
    services::balance_codec::{compare_amounts, parse_raw_amount, to_decimal},
    services::chain_registry::ChainRegistry,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenSource {
    Explorer,
    NodeProvider,
}

/// Produces one [`ChainPortfolio`] for an (address, chain) pair.
///
/// Never fails: provider problems end up in `ChainPortfolio::error`.
pub struct ChainPortfolioResolver {
    registry: ChainRegistry,
    explorer: Arc<dyn ExplorerApi>,
    node_provider: Arc<dyn NodeProviderConnector>,
    batch_policy: BatchPolicy,
}

impl ChainPortfolioResolver {
    pub fn new(
        registry: ChainRegistry,
        explorer: Arc<dyn ExplorerApi>,
        node_provider: Arc<dyn NodeProviderConnector>,
        batch_policy: BatchPolicy,
    ) -> Self {
        Self {
            registry,
            explorer,
            node_provider,
            batch_policy,
        }
    }

    pub fn registry(&self) -> &ChainRegistry {
        &self.registry
    }

    pub async fn resolve(&self, address: &str, chain_name: &str) -> ChainPortfolio {
        let Some(chain) = self.registry.resolve(chain_name) else {
            tracing::warn!("Skipping unsupported chain {}", chain_name);
            return ChainPortfolio::unknown(
                chain_name,
                format!(
                    "{}. Supported chains: {}",
                    PortfolioError::UnknownChain(chain_name.to_string()),
                    self.registry.list_all().join(", ")
                ),
            );
        };
        tracing::info!("Fetching {} balances on {} ({})", address, chain.name, chain.id);

        let (native_balance, native_error) = match self.explorer.native_balance(address, chain).await
        {
            Ok(raw) => (to_decimal(&raw, NATIVE_DECIMALS), None),
            Err(err) => {
                tracing::warn!("Native balance on {} failed: {}", chain.name, err);
                (
                    "0".to_string(),
                    Some(format!("Native balance unavailable: {}", err)),
                )
            }
        };

        let (tokens, token_error) = match self.fetch_tokens(address, chain).await {
            Ok(tokens) => (order_tokens(tokens), None),
            Err(err) => {
                tracing::warn!("Token list on {} failed: {}", chain.name, err);
                (Vec::new(), Some(token_error_annotation(&err)))
            }
        };

        tracing::info!(
            "{}: native {} {}, {} tokens",
            chain.name,
            native_balance,
            chain.native_currency,
            tokens.len()
        );

        ChainPortfolio {
            chain_name: chain.name.to_string(),
            chain_id: chain.id,
            native_currency: chain.native_currency.to_string(),
            native_balance,
            tokens,
            error: token_error.or(native_error),
        }
    }

    async fn fetch_tokens(&self, address: &str, chain: &ChainConfig) -> Result<Vec<TokenRecord>> {
        if !chain.supports_node_provider {
            return Err(PortfolioError::UnsupportedNetwork {
                provider: PROVIDER_ALCHEMY,
                chain: chain.name.to_string(),
            });
        }
        match self.select_source(address, chain).await {
            TokenSource::Explorer => self.explorer.token_balances(address, chain).await,
            TokenSource::NodeProvider => self.fallback_tokens(address, chain).await,
        }
    }

    // Internal helper that runs the capability probe only when a key exists.
    async fn select_source(&self, address: &str, chain: &ChainConfig) -> TokenSource {
        if !self.explorer.has_elevated_credential() {
            tracing::info!(
                "No {} key, using {} for tokens on {}",
                PROVIDER_ETHERSCAN,
                PROVIDER_ALCHEMY,
                chain.name
            );
            return TokenSource::NodeProvider;
        }
        match self.explorer.probe_elevated_access(address, chain).await {
            AccessProbe::Capable => TokenSource::Explorer,
            AccessProbe::RequiresElevatedTier { message } => {
                tracing::info!(
                    "{} token list requires API Pro on {}, using {}: {}",
                    PROVIDER_ETHERSCAN,
                    chain.name,
                    PROVIDER_ALCHEMY,
                    message
                );
                TokenSource::NodeProvider
            }
            AccessProbe::Unavailable { reason } => {
                tracing::warn!(
                    "{} token list probe failed on {}, using {}: {}",
                    PROVIDER_ETHERSCAN,
                    chain.name,
                    PROVIDER_ALCHEMY,
                    reason
                );
                TokenSource::NodeProvider
            }
        }
    }

    async fn fallback_tokens(&self, address: &str, chain: &ChainConfig) -> Result<Vec<TokenRecord>> {
        if !self.node_provider.has_credential() {
            return Err(PortfolioError::CredentialMissing {
                provider: PROVIDER_ALCHEMY,
            });
        }
        let api = self.node_provider.connect(chain)?;
        list_token_records(api.as_ref(), address, &self.batch_policy).await
    }
}

/// Operator-facing text for a failed token listing.
pub fn token_error_annotation(err: &PortfolioError) -> String {
    match err {
        PortfolioError::NetworkNotEnabled { provider, chain } => format!(
            "{} network {} is not enabled for this API key. Enable the network or upgrade the plan in the {} dashboard.",
            provider, chain, provider
        ),
        PortfolioError::InvalidCredential { provider, message } => format!(
            "{} API key is invalid or expired ({}). Check {}.",
            provider,
            message,
            credential_env_var(provider)
        ),
        PortfolioError::CredentialMissing { provider } => format!(
            "{} API key is missing. Set {} to list ERC-20 tokens.",
            provider,
            credential_env_var(provider)
        ),
        PortfolioError::UnsupportedNetwork { provider, chain } => format!(
            "Token balances are unavailable on {}: {} does not support this network.",
            chain, provider
        ),
        PortfolioError::Timeout(secs) => {
            format!("Token list request timed out after {}s. Try again later.", secs)
        }
        other => format!("Token list unavailable: {}", other),
    }
}

fn credential_env_var(provider: &str) -> &'static str {
    if provider == PROVIDER_ETHERSCAN {
        "ETHERSCAN_API_KEY"
    } else {
        "ALCHEMY_API_KEY"
    }
}

// Internal helper that dedupes by address (first wins) and sorts by balance, descending.
fn order_tokens(tokens: Vec<TokenRecord>) -> Vec<TokenRecord> {
    let mut seen = HashSet::new();
    let mut keyed: Vec<(BigUint, TokenRecord)> = tokens
        .into_iter()
        .map(|mut token| {
            token.address.make_ascii_lowercase();
            token
        })
        .filter(|token| seen.insert(token.address.clone()))
        .map(|token| {
            let raw = parse_raw_amount(&token.balance_raw).unwrap_or_default();
            (raw, token)
        })
        .collect();
    keyed.sort_by(|(a_raw, a), (b_raw, b)| compare_amounts(b_raw, b.decimals, a_raw, a.decimals));
    keyed.into_iter().map(|(_, token)| token).collect()
}
