use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::LookupError;

/// ERC-20 token as shown in search results and the user token list.
///
/// Identity is `(chain_id, address)`; the other fields are display metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    #[serde(rename = "chainId")]
    pub chain_id: u64,

    pub address: Address,

    pub symbol: String,

    pub decimals: u8,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Token {
    pub fn key(&self) -> TokenLookupKey {
        TokenLookupKey::new(self.chain_id, &self.address)
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.chain_id == other.chain_id && self.address == other.address
    }
}

impl Eq for Token {}

/// Normalized token lookup key (CAIP-19 style: `eip155:{chain_id}/erc20:{address}`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenLookupKey(pub String);

impl TokenLookupKey {
    /// Create a lookup key from chain ID and address.
    pub fn new(chain_id: u64, address: &Address) -> Self {
        Self(format!("eip155:{chain_id}/erc20:{}", address.to_lower_hex()))
    }
}

/// Token metadata lookup by address (on-chain reads, token lists, ...).
#[async_trait]
pub trait TokenLookup: Send + Sync {
    async fn lookup_token(
        &self,
        address: &Address,
        chain_id: u64,
    ) -> Result<Option<Token>, LookupError>;
}

/// In-memory token lookup for testing.
#[derive(Debug, Default)]
pub struct StaticTokenLookup {
    tokens: HashMap<TokenLookupKey, Token>,
}

impl StaticTokenLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, token: Token) {
        self.tokens.insert(token.key(), token);
    }
}

#[async_trait]
impl TokenLookup for StaticTokenLookup {
    async fn lookup_token(
        &self,
        address: &Address,
        chain_id: u64,
    ) -> Result<Option<Token>, LookupError> {
        Ok(self
            .tokens
            .get(&TokenLookupKey::new(chain_id, address))
            .cloned())
    }
}
