// src/models/mod.rs
pub mod portfolio;

// Re-export so other modules can use `crate::models::X`
pub use portfolio::{ChainConfig, ChainPortfolio, MultiChainPortfolio, TokenRecord};
