/// Application constants

// Provider names used in logs, usage stats and error annotations
pub const PROVIDER_ETHERSCAN: &str = "Etherscan";
pub const PROVIDER_ALCHEMY: &str = "Alchemy";

// Etherscan V2 multichain endpoint
pub const ETHERSCAN_V2_API_URL: &str = "https://api.etherscan.io/v2/api";
pub const ETHERSCAN_PLACEHOLDER_KEY: &str = "YourApiKeyToken";

// Alchemy endpoint, `{network}` is replaced by the provider network slug
pub const ALCHEMY_ENDPOINT_TEMPLATE: &str = "https://{network}.g.alchemy.com/v2";
pub const ALCHEMY_DEMO_KEY: &str = "demo";
pub const ALCHEMY_TOKEN_UNIVERSE: &str = "DEFAULT_TOKENS";
pub const JSON_RPC_REQUEST_ID: u64 = 42;

// Timeouts
pub const PROVIDER_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const EXPLORER_PROBE_TIMEOUT_SECS: u64 = 5;

// Explorer pagination
pub const EXPLORER_PROBE_PAGE_SIZE: u32 = 10;
pub const EXPLORER_PAGE_SIZE: u32 = 100;
pub const EXPLORER_MAX_PAGES: u32 = 10;
pub const EXPLORER_PAGE_DELAY_MS: u64 = 500;
pub const EXPLORER_DEFAULT_TOKEN_DECIMALS: u8 = 18;

// Node-provider metadata batching
pub const METADATA_BATCH_SIZE: usize = 5;
pub const METADATA_BATCH_DELAY_MS: u64 = 200;

// Token fallbacks when metadata omits a field
pub const UNKNOWN_TOKEN_NAME: &str = "Unknown Token";
pub const UNKNOWN_TOKEN_SYMBOL: &str = "UNKNOWN";
pub const UNKNOWN_NATIVE_CURRENCY: &str = "UNKNOWN";

// Native coins on every supported chain use 18 decimals
pub const NATIVE_DECIMALS: u8 = 18;

// Chain used for lightweight single-chain requests
pub const DEFAULT_CHAIN: &str = "ethereum";
pub const ALL_CHAINS_KEYWORD: &str = "all";
