use async_trait::async_trait;
use num_bigint::BigUint;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use url::Url;

use crate::{
    config::ProviderSettings,
    constants::{
        EXPLORER_DEFAULT_TOKEN_DECIMALS, EXPLORER_PROBE_PAGE_SIZE, PROVIDER_ETHERSCAN,
        UNKNOWN_TOKEN_NAME, UNKNOWN_TOKEN_SYMBOL,
    },
    error::{PortfolioError, Result},
    models::{ChainConfig, TokenRecord},
    services::balance_codec::{format_raw_amount, parse_raw_amount},
    services::usage_tracker::{CallOutcome, SharedUsage},
};

const ACTION_BALANCE: &str = "balance";
const ACTION_TOKEN_BALANCE: &str = "addresstokenbalance";

/// Outcome of the elevated-tier probe against the paginated token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessProbe {
    Capable,
    RequiresElevatedTier { message: String },
    Unavailable { reason: String },
}

/// Block-explorer operations the chain resolver depends on.
#[async_trait]
pub trait ExplorerApi: Send + Sync {
    fn has_elevated_credential(&self) -> bool;

    async fn native_balance(&self, address: &str, chain: &ChainConfig) -> Result<BigUint>;

    async fn probe_elevated_access(&self, address: &str, chain: &ChainConfig) -> AccessProbe;

    async fn token_balances(&self, address: &str, chain: &ChainConfig) -> Result<Vec<TokenRecord>>;
}

#[derive(Debug, Deserialize)]
struct ExplorerEnvelope {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    result: Value,
}

impl ExplorerEnvelope {
    fn is_ok(&self) -> bool {
        self.status == "1"
    }

    fn error_message(&self) -> String {
        match self.result.as_str().map(str::trim) {
            Some(text) if !text.is_empty() => text.to_string(),
            _ if !self.message.trim().is_empty() => self.message.trim().to_string(),
            _ => format!("status {}", self.status),
        }
    }
}

/// Etherscan V2 multichain client.
#[derive(Clone)]
pub struct EtherscanClient {
    api_key: Option<String>,
    client: Client,
    settings: ProviderSettings,
    usage: SharedUsage,
}

impl EtherscanClient {
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

    // Internal helper that picks the configured endpoint override or the chain's own.
    fn endpoint<'a>(&'a self, chain: &'a ChainConfig) -> &'a str {
        self.settings
            .explorer_api_url
            .as_deref()
            .unwrap_or(chain.explorer_api_url)
    }

    // Internal helper that builds an `account` module URL for the chain.
    fn account_url(
        &self,
        chain: &ChainConfig,
        action: &str,
        params: &[(&str, String)],
    ) -> Result<Url> {
        let mut pairs: Vec<(&str, String)> = vec![
            ("chainid", chain.id.to_string()),
            ("module", "account".to_string()),
            ("action", action.to_string()),
        ];
        pairs.extend(params.iter().cloned());
        if let Some(key) = &self.api_key {
            pairs.push(("apikey", key.clone()));
        }
        Url::parse_with_params(self.endpoint(chain), &pairs)
            .map_err(|e| PortfolioError::Config(format!("Invalid explorer URL: {}", e)))
    }

    // Internal helper that issues one GET and decodes the explorer envelope.
    async fn fetch_envelope(
        &self,
        action: &str,
        url: Url,
        timeout: Duration,
    ) -> Result<ExplorerEnvelope> {
        tracing::debug!("Calling {} API: {}", PROVIDER_ETHERSCAN, masked_url(&url));
        let result = self.send(url, timeout).await;
        let outcome = match &result {
            Ok(envelope) if envelope.is_ok() => CallOutcome::Success,
            _ => CallOutcome::Failure,
        };
        self.usage.record(PROVIDER_ETHERSCAN, action, outcome);
        result
    }

    async fn send(&self, url: Url, timeout: Duration) -> Result<ExplorerEnvelope> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| PortfolioError::from_transport(e, timeout.as_secs()))?;
        let status = response.status();
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Err(PortfolioError::InvalidCredential {
                provider: PROVIDER_ETHERSCAN,
                message: format!("HTTP {}", status),
            });
        }
        if !status.is_success() {
            return Err(PortfolioError::provider(
                PROVIDER_ETHERSCAN,
                format!("HTTP {}", status),
            ));
        }
        response
            .json::<ExplorerEnvelope>()
            .await
            .map_err(PortfolioError::from_decode)
    }

    // Internal helper that fetches one page of the token balance listing.
    async fn token_page(
        &self,
        address: &str,
        chain: &ChainConfig,
        page: u32,
        offset: u32,
        timeout: Duration,
    ) -> Result<ExplorerEnvelope> {
        let url = self.account_url(
            chain,
            ACTION_TOKEN_BALANCE,
            &[
                ("address", address.to_string()),
                ("page", page.to_string()),
                ("offset", offset.to_string()),
            ],
        )?;
        self.fetch_envelope(ACTION_TOKEN_BALANCE, url, timeout).await
    }
}

#[async_trait]
impl ExplorerApi for EtherscanClient {
    fn has_elevated_credential(&self) -> bool {
        self.api_key.is_some()
    }

    async fn native_balance(&self, address: &str, chain: &ChainConfig) -> Result<BigUint> {
        let url = self.account_url(
            chain,
            ACTION_BALANCE,
            &[
                ("address", address.to_string()),
                ("tag", "latest".to_string()),
            ],
        )?;
        let envelope = self
            .fetch_envelope(ACTION_BALANCE, url, self.settings.request_timeout)
            .await?;
        if !envelope.is_ok() {
            return Err(classify_status_message(&envelope.error_message(), chain));
        }
        match envelope.result.as_str() {
            Some(raw) => parse_raw_amount(raw),
            None => Err(PortfolioError::MalformedPayload(format!(
                "balance result is not a string: {}",
                envelope.result
            ))),
        }
    }

    async fn probe_elevated_access(&self, address: &str, chain: &ChainConfig) -> AccessProbe {
        if self.api_key.is_none() {
            return AccessProbe::Unavailable {
                reason: format!("{} API key is missing", PROVIDER_ETHERSCAN),
            };
        }
        let probe = self
            .token_page(
                address,
                chain,
                1,
                EXPLORER_PROBE_PAGE_SIZE,
                self.settings.probe_timeout,
            )
            .await;
        match probe {
            Ok(envelope) if envelope.is_ok() => AccessProbe::Capable,
            Ok(envelope) => {
                let message = envelope.error_message();
                if requires_elevated_tier(&message) {
                    AccessProbe::RequiresElevatedTier { message }
                } else {
                    AccessProbe::Unavailable { reason: message }
                }
            }
            Err(err) => AccessProbe::Unavailable {
                reason: err.to_string(),
            },
        }
    }

    async fn token_balances(&self, address: &str, chain: &ChainConfig) -> Result<Vec<TokenRecord>> {
        let page_size = self.settings.page_size.max(1);
        let mut records = Vec::new();
        let mut page = 1;

        while page <= self.settings.max_pages {
            tracing::info!(
                "Fetching {} token list page {} on {}",
                PROVIDER_ETHERSCAN,
                page,
                chain.name
            );
            let fetched = self
                .token_page(address, chain, page, page_size, self.settings.request_timeout)
                .await
                .and_then(|envelope| {
                    if !envelope.is_ok() {
                        return Err(classify_status_message(&envelope.error_message(), chain));
                    }
                    match envelope.result {
                        Value::Array(entries) => Ok(entries),
                        other => Err(PortfolioError::MalformedPayload(format!(
                            "token list result is not an array: {}",
                            other
                        ))),
                    }
                });

            let entries = match fetched {
                Ok(entries) => entries,
                Err(err) if page == 1 => return Err(err),
                Err(err) => {
                    tracing::warn!(
                        "Token list page {} on {} failed, keeping {} tokens: {}",
                        page,
                        chain.name,
                        records.len(),
                        err
                    );
                    break;
                }
            };

            let page_len = entries.len();
            records.extend(entries.iter().filter_map(normalize_token_entry));
            tracing::debug!(
                "Page {} on {}: {} tokens with balance so far",
                page,
                chain.name,
                records.len()
            );

            if page_len < page_size as usize {
                break;
            }
            page += 1;
            if page <= self.settings.max_pages {
                tokio::time::sleep(self.settings.page_delay).await;
            }
        }

        Ok(records)
    }
}

/// Maps one explorer token entry, whatever its field spelling, to a record.
///
/// Returns `None` for empty addresses and zero balances.
pub(crate) fn normalize_token_entry(entry: &Value) -> Option<TokenRecord> {
    let address = first_text(entry, &["TokenAddress", "contractAddress", "address"])?
        .to_ascii_lowercase();
    if address == "0x" {
        return None;
    }
    let name = first_text(entry, &["TokenName", "tokenName", "name"])
        .unwrap_or_else(|| UNKNOWN_TOKEN_NAME.to_string());
    let symbol = first_text(entry, &["TokenSymbol", "tokenSymbol", "symbol"])
        .unwrap_or_else(|| UNKNOWN_TOKEN_SYMBOL.to_string());
    let decimals = first_field(entry, &["TokenDecimal", "tokenDecimal", "decimals"])
        .and_then(json_as_decimals)
        .unwrap_or(EXPLORER_DEFAULT_TOKEN_DECIMALS);
    let quantity = first_field(
        entry,
        &["TokenQuantity", "tokenQuantity", "quantity", "balance"],
    )
    .and_then(json_as_amount_text)
    .unwrap_or_else(|| "0".to_string());

    let amount = format_raw_amount(&quantity, decimals);
    if amount.is_zero() {
        return None;
    }
    Some(TokenRecord {
        address,
        name,
        symbol,
        decimals,
        balance: amount.balance,
        balance_raw: amount.raw.to_string(),
    })
}

// Internal helper that maps a status "0" message onto the error taxonomy.
fn classify_status_message(message: &str, chain: &ChainConfig) -> PortfolioError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("not supported for this chain") || lower.contains("not enabled") {
        return PortfolioError::NetworkNotEnabled {
            provider: PROVIDER_ETHERSCAN,
            chain: chain.name.to_string(),
        };
    }
    if lower.contains("invalid api key") || lower.contains("missing/invalid api key") {
        return PortfolioError::InvalidCredential {
            provider: PROVIDER_ETHERSCAN,
            message: message.to_string(),
        };
    }
    PortfolioError::provider(PROVIDER_ETHERSCAN, message)
}

// Internal helper that detects the "API Pro" entitlement rejection.
fn requires_elevated_tier(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("api pro") || lower.contains("pro endpoint")
}

// Internal helper that returns the first present, non-empty field.
fn first_field<'a>(entry: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().filter_map(|key| entry.get(*key)).find(|value| match value {
        Value::Null => false,
        Value::String(text) => !text.trim().is_empty(),
        _ => true,
    })
}

// Internal helper that returns the first non-empty string field, trimmed.
fn first_text(entry: &Value, keys: &[&str]) -> Option<String> {
    first_field(entry, keys)
        .and_then(|value| value.as_str())
        .map(|text| text.trim().to_string())
}

// Internal helper that accepts decimals as a JSON number or numeric string.
fn json_as_decimals(value: &Value) -> Option<u8> {
    match value {
        Value::Number(number) => number.as_u64().and_then(|v| u8::try_from(v).ok()),
        Value::String(text) => text.trim().parse::<u8>().ok(),
        _ => None,
    }
}

// Internal helper that accepts a raw amount as a JSON string or integer.
fn json_as_amount_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.trim().to_string()),
        Value::Number(number) => number.as_u64().map(|v| v.to_string()),
        _ => None,
    }
}

// Internal helper that hides the API key before a URL reaches the logs.
fn masked_url(url: &Url) -> String {
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(key, value)| {
            let shown = if key == "apikey" {
                "***".to_string()
            } else {
                value.into_owned()
            };
            (key.into_owned(), shown)
        })
        .collect();
    let mut masked = url.clone();
    masked.query_pairs_mut().clear().extend_pairs(pairs);
    masked.to_string()
}
