use async_trait::async_trait;
use futures_util::future::join_all;
use num_traits::Zero;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::{
    config::ProviderSettings,
    constants::{
        ALCHEMY_TOKEN_UNIVERSE, EXPLORER_DEFAULT_TOKEN_DECIMALS, JSON_RPC_REQUEST_ID,
        METADATA_BATCH_DELAY_MS, METADATA_BATCH_SIZE, PROVIDER_ALCHEMY, UNKNOWN_TOKEN_NAME,
        UNKNOWN_TOKEN_SYMBOL,
    },
    error::{PortfolioError, Result},
    models::{ChainConfig, TokenRecord},
    services::balance_codec::{format_raw_amount, is_zero_hex_word, parse_raw_amount},
    services::usage_tracker::{CallOutcome, SharedUsage},
};

const METHOD_TOKEN_BALANCES: &str = "alchemy_getTokenBalances";
const METHOD_TOKEN_METADATA: &str = "alchemy_getTokenMetadata";

/// Alchemy network slug for a registry chain key.
pub fn network_slug(chain_key: &str) -> Option<&'static str> {
    match chain_key.trim().to_ascii_lowercase().as_str() {
        "ethereum" => Some("eth-mainnet"),
        "base" => Some("base-mainnet"),
        "polygon" => Some("polygon-mainnet"),
        "arbitrum" => Some("arb-mainnet"),
        "optimism" => Some("opt-mainnet"),
        "bsc" => Some("bnb-mainnet"),
        "avalanche" => Some("avax-mainnet"),
        "fantom" => Some("fantom-mainnet"),
        "cronos" => Some("cronos-mainnet"),
        _ => None,
    }
}

/// Unformatted balance as returned by the bulk balance call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTokenBalance {
    pub contract_address: String,
    pub token_balance: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TokenMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub decimals: Option<u8>,
}

/// Node-provider operations bound to one network.
#[async_trait]
pub trait NodeProviderApi: Send + Sync {
    async fn token_balances(&self, address: &str) -> Result<Vec<RawTokenBalance>>;

    async fn token_metadata(&self, contract: &str) -> Result<TokenMetadata>;
}

/// Builds a per-chain [`NodeProviderApi`] on demand.
pub trait NodeProviderConnector: Send + Sync {
    fn has_credential(&self) -> bool;

    fn connect(&self, chain: &ChainConfig) -> Result<Arc<dyn NodeProviderApi>>;
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    #[serde(default)]
    message: String,
}

#[derive(Clone)]
pub struct AlchemyClient {
    client: Client,
    endpoint: String,
    chain_key: String,
    timeout_secs: u64,
    usage: SharedUsage,
}

impl AlchemyClient {
    /// Binds a shared HTTP client to the Alchemy network of `chain_key`.
    ///
    /// Chains without an Alchemy network are rejected here.
    pub fn for_chain(
        client: Client,
        api_key: &str,
        chain_key: &str,
        settings: &ProviderSettings,
        usage: SharedUsage,
    ) -> Result<Self> {
        let network = network_slug(chain_key).ok_or_else(|| PortfolioError::UnsupportedNetwork {
            provider: PROVIDER_ALCHEMY,
            chain: chain_key.to_string(),
        })?;
        let base = settings
            .alchemy_endpoint_template
            .replace("{network}", network);
        Ok(Self {
            client,
            endpoint: format!("{}/{}", base.trim_end_matches('/'), api_key),
            chain_key: chain_key.to_string(),
            timeout_secs: settings.request_timeout.as_secs(),
            usage,
        })
    }

    // Internal helper that performs one JSON-RPC call and records its outcome.
    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let result = self.send(method, params).await;
        let outcome = if result.is_ok() {
            CallOutcome::Success
        } else {
            CallOutcome::Failure
        };
        self.usage.record(PROVIDER_ALCHEMY, method, outcome);
        result
    }

    async fn send(&self, method: &str, params: Value) -> Result<Value> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: JSON_RPC_REQUEST_ID,
            method,
            params,
        };
        tracing::debug!("Calling {} {} on {}", PROVIDER_ALCHEMY, method, self.chain_key);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| PortfolioError::from_transport(e, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.classify(Some(status), &body));
        }

        let payload: RpcResponse = response.json().await.map_err(PortfolioError::from_decode)?;
        if let Some(error) = payload.error {
            return Err(self.classify(None, &error.message));
        }
        payload
            .result
            .ok_or_else(|| PortfolioError::MalformedPayload(format!("{} returned no result", method)))
    }

    // Internal helper that maps provider failures onto the error taxonomy.
    fn classify(&self, status: Option<StatusCode>, message: &str) -> PortfolioError {
        let lower = message.to_ascii_lowercase();
        if lower.contains("not enabled") {
            return PortfolioError::NetworkNotEnabled {
                provider: PROVIDER_ALCHEMY,
                chain: self.chain_key.clone(),
            };
        }
        let auth_status = matches!(
            status,
            Some(StatusCode::UNAUTHORIZED) | Some(StatusCode::FORBIDDEN)
        );
        if auth_status || lower.contains("invalid api key") || lower.contains("must be authenticated")
        {
            return PortfolioError::InvalidCredential {
                provider: PROVIDER_ALCHEMY,
                message: message.trim().to_string(),
            };
        }
        match status {
            Some(status) if message.trim().is_empty() => {
                PortfolioError::provider(PROVIDER_ALCHEMY, format!("HTTP {}", status))
            }
            Some(status) => PortfolioError::provider(
                PROVIDER_ALCHEMY,
                format!("HTTP {}: {}", status, message.trim()),
            ),
            None => PortfolioError::provider(PROVIDER_ALCHEMY, message.trim()),
        }
    }
}

#[async_trait]
impl NodeProviderApi for AlchemyClient {
    async fn token_balances(&self, address: &str) -> Result<Vec<RawTokenBalance>> {
        let result = self
            .call(
                METHOD_TOKEN_BALANCES,
                json!([address, ALCHEMY_TOKEN_UNIVERSE]),
            )
            .await?;
        let entries = result
            .get("tokenBalances")
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                PortfolioError::MalformedPayload("tokenBalances is missing".to_string())
            })?;

        Ok(entries
            .iter()
            .filter_map(|entry| {
                let contract_address = entry.get("contractAddress")?.as_str()?.trim();
                let token_balance = entry.get("tokenBalance")?.as_str()?.trim();
                if contract_address.is_empty() {
                    return None;
                }
                Some(RawTokenBalance {
                    contract_address: contract_address.to_string(),
                    token_balance: token_balance.to_string(),
                })
            })
            .collect())
    }

    async fn token_metadata(&self, contract: &str) -> Result<TokenMetadata> {
        let result = self.call(METHOD_TOKEN_METADATA, json!([contract])).await?;
        serde_json::from_value(result).map_err(|e| PortfolioError::MalformedPayload(e.to_string()))
    }
}

/// Connector that hands out Alchemy clients sharing one HTTP pool.
#[derive(Clone)]
pub struct AlchemyConnector {
    api_key: Option<String>,
    client: Client,
    settings: ProviderSettings,
    usage: SharedUsage,
}

impl AlchemyConnector {
    pub fn new(
        api_key: Option<String>,
        settings: ProviderSettings,
        usage: SharedUsage,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .build()?;
        Ok(Self {
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            client,
            settings,
            usage,
        })
    }
}

impl NodeProviderConnector for AlchemyConnector {
    fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    fn connect(&self, chain: &ChainConfig) -> Result<Arc<dyn NodeProviderApi>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(PortfolioError::CredentialMissing {
                provider: PROVIDER_ALCHEMY,
            })?;
        let client = AlchemyClient::for_chain(
            self.client.clone(),
            api_key,
            chain.key,
            &self.settings,
            self.usage.clone(),
        )?;
        Ok(Arc::new(client))
    }
}

/// Metadata lookup batching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPolicy {
    pub batch_size: usize,
    pub delay: Duration,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            batch_size: METADATA_BATCH_SIZE,
            delay: Duration::from_millis(METADATA_BATCH_DELAY_MS),
        }
    }
}

impl From<&ProviderSettings> for BatchPolicy {
    fn from(settings: &ProviderSettings) -> Self {
        Self {
            batch_size: settings.metadata_batch_size,
            delay: settings.metadata_batch_delay,
        }
    }
}

/// Bulk balances plus batched metadata, merged into token records.
///
/// Zero balances are dropped before any metadata lookup. A failed lookup
/// only drops its own contract.
pub async fn list_token_records(
    api: &dyn NodeProviderApi,
    address: &str,
    policy: &BatchPolicy,
) -> Result<Vec<TokenRecord>> {
    let balances = api.token_balances(address).await?;
    let held: Vec<RawTokenBalance> = balances
        .into_iter()
        .filter(|entry| has_nonzero_balance(&entry.token_balance))
        .collect();
    tracing::info!("Found {} tokens with non-zero balance", held.len());

    let batch_size = policy.batch_size.max(1);
    let batch_count = held.len().div_ceil(batch_size);
    let mut records = Vec::with_capacity(held.len());

    for (index, batch) in held.chunks(batch_size).enumerate() {
        let lookups = batch.iter().map(|entry| async move {
            (entry, api.token_metadata(&entry.contract_address).await)
        });
        for (entry, outcome) in join_all(lookups).await {
            match outcome {
                Ok(metadata) => records.extend(build_record(entry, metadata)),
                Err(err) => tracing::warn!(
                    "Skipping token {}: metadata lookup failed: {}",
                    entry.contract_address,
                    err
                ),
            }
        }
        if index + 1 < batch_count {
            tokio::time::sleep(policy.delay).await;
        }
    }

    Ok(records)
}

// Internal helper that filters the all-zero word and anything parsing to zero.
fn has_nonzero_balance(raw: &str) -> bool {
    if is_zero_hex_word(raw) {
        return false;
    }
    match parse_raw_amount(raw) {
        Ok(value) => !value.is_zero(),
        Err(err) => {
            tracing::warn!("Ignoring unreadable token balance: {}", err);
            false
        }
    }
}

fn build_record(entry: &RawTokenBalance, metadata: TokenMetadata) -> Option<TokenRecord> {
    let decimals = metadata.decimals.unwrap_or(EXPLORER_DEFAULT_TOKEN_DECIMALS);
    let amount = format_raw_amount(&entry.token_balance, decimals);
    if amount.is_zero() {
        return None;
    }
    Some(TokenRecord {
        address: entry.contract_address.to_ascii_lowercase(),
        name: non_blank(metadata.name).unwrap_or_else(|| UNKNOWN_TOKEN_NAME.to_string()),
        symbol: non_blank(metadata.symbol).unwrap_or_else(|| UNKNOWN_TOKEN_SYMBOL.to_string()),
        decimals,
        balance: amount.balance,
        balance_raw: amount.raw.to_string(),
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}
