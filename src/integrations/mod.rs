pub mod alchemy;
pub mod etherscan;

pub use alchemy::{AlchemyConnector, NodeProviderConnector};
pub use etherscan::{AccessProbe, EtherscanClient, ExplorerApi};
