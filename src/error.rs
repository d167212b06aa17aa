use thiserror::Error;

#[derive(Error, Debug)]
pub enum PortfolioError {
    #[error("Chain {0} is not supported")]
    UnknownChain(String),

    #[error("{provider} does not support network {chain}")]
    UnsupportedNetwork { provider: &'static str, chain: String },

    #[error("{provider} API key is missing")]
    CredentialMissing { provider: &'static str },

    #[error("{provider} API key is invalid or expired: {message}")]
    InvalidCredential {
        provider: &'static str,
        message: String,
    },

    #[error("{provider} network {chain} is not enabled for this API key")]
    NetworkNotEnabled { provider: &'static str, chain: String },

    #[error("{provider} API error: {message}")]
    Provider {
        provider: &'static str,
        message: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request timeout after {0}s")]
    Timeout(u64),

    #[error("Malformed amount: {0}")]
    MalformedAmount(String),

    #[error("Malformed provider payload: {0}")]
    MalformedPayload(String),

    #[error("Invalid EVM address: {0}")]
    InvalidAddress(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PortfolioError {
    pub fn provider(provider: &'static str, message: impl Into<String>) -> Self {
        PortfolioError::Provider {
            provider,
            message: message.into(),
        }
    }

    /// Maps a reqwest failure into the taxonomy, keeping timeouts distinct.
    ///
    /// The request URL is stripped: provider keys travel in the query or path.
    pub fn from_transport(err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            PortfolioError::Timeout(timeout_secs)
        } else {
            PortfolioError::Http(err.without_url())
        }
    }

    /// Body decoding failure, with the request URL stripped.
    pub fn from_decode(err: reqwest::Error) -> Self {
        PortfolioError::MalformedPayload(err.without_url().to_string())
    }
}

pub type Result<T> = std::result::Result<T, PortfolioError>;
