use std::env;
use std::time::Duration;

use crate::constants::{
    ALCHEMY_DEMO_KEY, ALCHEMY_ENDPOINT_TEMPLATE, ALL_CHAINS_KEYWORD,
    ETHERSCAN_PLACEHOLDER_KEY, EXPLORER_MAX_PAGES, EXPLORER_PAGE_DELAY_MS, EXPLORER_PAGE_SIZE,
    EXPLORER_PROBE_TIMEOUT_SECS, METADATA_BATCH_DELAY_MS, METADATA_BATCH_SIZE,
    PROVIDER_REQUEST_TIMEOUT_SECS,
};

/// Which chains a request should scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainSelection {
    /// Nothing configured: the lightweight single default-chain request.
    Default,
    All,
    Explicit(Vec<String>),
}

impl ChainSelection {
    /// Parses `all` or a comma separated list; empty input selects the default chain.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case(ALL_CHAINS_KEYWORD) {
            return ChainSelection::All;
        }
        let chains: Vec<String> = trimmed
            .split(',')
            .map(|chain| chain.trim().to_ascii_lowercase())
            .filter(|chain| !chain.is_empty())
            .collect();
        if chains.is_empty() {
            ChainSelection::Default
        } else {
            ChainSelection::Explicit(chains)
        }
    }
}

/// Timeouts and self-imposed throttles shared by both provider clients.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub request_timeout: Duration,
    pub probe_timeout: Duration,
    pub page_size: u32,
    pub max_pages: u32,
    pub page_delay: Duration,
    pub metadata_batch_size: usize,
    pub metadata_batch_delay: Duration,
    pub explorer_api_url: Option<String>,
    pub alchemy_endpoint_template: String,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(PROVIDER_REQUEST_TIMEOUT_SECS),
            probe_timeout: Duration::from_secs(EXPLORER_PROBE_TIMEOUT_SECS),
            page_size: EXPLORER_PAGE_SIZE,
            max_pages: EXPLORER_MAX_PAGES,
            page_delay: Duration::from_millis(EXPLORER_PAGE_DELAY_MS),
            metadata_batch_size: METADATA_BATCH_SIZE,
            metadata_batch_delay: Duration::from_millis(METADATA_BATCH_DELAY_MS),
            explorer_api_url: None,
            alchemy_endpoint_template: ALCHEMY_ENDPOINT_TEMPLATE.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub evm_address: Option<String>,
    pub chains: ChainSelection,
    pub etherscan_api_key: Option<String>,
    pub alchemy_api_key: Option<String>,
    pub providers: ProviderSettings,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let defaults = ProviderSettings::default();

        Ok(Config {
            evm_address: non_empty_env("EVM_PUBLIC_KEY"),
            chains: ChainSelection::parse(&env::var("EVM_CHAINS").unwrap_or_default()),
            etherscan_api_key: credential_env("ETHERSCAN_API_KEY", ETHERSCAN_PLACEHOLDER_KEY),
            alchemy_api_key: credential_env("ALCHEMY_API_KEY", ALCHEMY_DEMO_KEY),
            providers: ProviderSettings {
                request_timeout: Duration::from_secs(parse_env(
                    "PROVIDER_REQUEST_TIMEOUT_SECS",
                    PROVIDER_REQUEST_TIMEOUT_SECS,
                )?),
                probe_timeout: Duration::from_secs(parse_env(
                    "EXPLORER_PROBE_TIMEOUT_SECS",
                    EXPLORER_PROBE_TIMEOUT_SECS,
                )?),
                page_size: parse_env("EXPLORER_PAGE_SIZE", EXPLORER_PAGE_SIZE)?,
                max_pages: parse_env("EXPLORER_MAX_PAGES", EXPLORER_MAX_PAGES)?,
                page_delay: Duration::from_millis(parse_env(
                    "EXPLORER_PAGE_DELAY_MS",
                    EXPLORER_PAGE_DELAY_MS,
                )?),
                metadata_batch_size: parse_env("METADATA_BATCH_SIZE", METADATA_BATCH_SIZE)?,
                metadata_batch_delay: Duration::from_millis(parse_env(
                    "METADATA_BATCH_DELAY_MS",
                    METADATA_BATCH_DELAY_MS,
                )?),
                explorer_api_url: non_empty_env("ETHERSCAN_API_URL"),
                alchemy_endpoint_template: non_empty_env("ALCHEMY_ENDPOINT_TEMPLATE")
                    .unwrap_or(defaults.alchemy_endpoint_template),
            },
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.providers.page_size == 0 {
            anyhow::bail!("EXPLORER_PAGE_SIZE must be > 0");
        }
        if self.providers.max_pages == 0 {
            anyhow::bail!("EXPLORER_MAX_PAGES must be > 0");
        }
        if self.providers.metadata_batch_size == 0 {
            anyhow::bail!("METADATA_BATCH_SIZE must be > 0");
        }
        if self.providers.probe_timeout >= self.providers.request_timeout {
            anyhow::bail!("EXPLORER_PROBE_TIMEOUT_SECS must be shorter than PROVIDER_REQUEST_TIMEOUT_SECS");
        }
        if !self.providers.alchemy_endpoint_template.contains("{network}") {
            anyhow::bail!("ALCHEMY_ENDPOINT_TEMPLATE must contain {{network}}");
        }

        if self.etherscan_api_key.is_none() {
            tracing::warn!("ETHERSCAN_API_KEY not set; token lists will use Alchemy");
        }
        if self.alchemy_api_key.is_none() {
            tracing::warn!("ALCHEMY_API_KEY not set or in demo mode; fallback token lists are unavailable");
        }

        Ok(())
    }

    pub fn has_etherscan_key(&self) -> bool {
        self.etherscan_api_key.is_some()
    }
}

// Internal helper that reads a trimmed, non-empty env var.
fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

// Internal helper that treats a known placeholder value as an absent key.
fn credential_env(key: &str, placeholder: &str) -> Option<String> {
    non_empty_env(key).filter(|value| value != placeholder)
}

// Internal helper that parses an optional env var with a default.
fn parse_env<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match non_empty_env(key) {
        Some(value) => value
            .parse()
            .map_err(|e| anyhow::anyhow!("{} is invalid: {}", key, e)),
        None => Ok(default),
    }
}
