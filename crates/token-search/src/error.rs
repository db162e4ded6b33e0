use thiserror::Error;

use crate::chain::chain_name;

/// Unified error type for the token search library.
#[derive(Debug, Error)]
pub enum Error {
    #[error("resolve error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("token lookup error: {0}")]
    Lookup(#[from] LookupError),

    #[error("token store error: {0}")]
    Store(#[from] StoreError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors reported by a naming service.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("{service} is not available on {} (chain_id={chain_id})", chain_label(.chain_id))]
    UnsupportedChain { service: String, chain_id: u64 },

    #[error("request failed: {0}")]
    Request(String),
}

fn chain_label(chain_id: &u64) -> String {
    chain_name(*chain_id)
}

/// Errors during single-token metadata lookup.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("token lookup failed for chain_id={chain_id}, address={address}: {reason}")]
    Failed {
        chain_id: u64,
        address: String,
        reason: String,
    },
}

/// Errors from the user token store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("token not found for chain_id={chain_id}, address={address}")]
    NotFound { chain_id: u64, address: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Errors while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
