pub mod address;
pub mod chain;
pub mod config;
pub mod debounce;
pub mod error;
pub mod explorer;
pub mod resolver;
pub mod search;
pub mod token;
pub mod token_list;

use tracing::warn;

// Re-exports for convenience
pub use address::{is_name_like, is_valid_address, normalize_address, Address};
pub use config::SearchConfig;
pub use error::Error;
pub use explorer::{BlockExplorer, ExplorerLinks, LinkKind};
pub use resolver::{
    pick_first_by_priority, DomainName, NameResolutionAggregator, NameService, NameSource,
    ResolutionResult, ResolveOptions,
};
pub use search::{compute_validity, SearchController, SearchState};
pub use token::{Token, TokenLookup};
pub use token_list::{TokenListController, UserTokenStore};

/// Outcome of a one-shot, non-debounced search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub resolution: ResolutionResult<String>,
    pub token: Option<Token>,
    pub is_valid: bool,
}

/// Resolve `query` and look up the token it points at, without debouncing.
///
/// This is the pipeline a [`SearchController`] runs for each debounced value.
/// A failed token lookup is returned as an error here; the controller logs it
/// and shows no token instead.
pub async fn search_token(
    query: &str,
    chain_id: u64,
    aggregator: &NameResolutionAggregator,
    tokens: &dyn TokenLookup,
) -> Result<SearchOutcome, Error> {
    let resolution = aggregator.resolve(query, chain_id).await;
    let token = match resolution.address() {
        Some(address) => tokens.lookup_token(&address, chain_id).await?,
        None => {
            if resolution.value.is_some() {
                warn!(value = ?resolution.value, "resolved value is not an address");
            }
            None
        }
    };
    let is_valid = compute_validity(query, resolution.value.as_deref());
    Ok(SearchOutcome {
        resolution,
        token,
        is_valid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;

    use crate::config::ServiceChains;
    use crate::error::LookupError;
    use crate::resolver::StaticNameSource;
    use crate::token::StaticTokenLookup;

    const CAKE: &str = "0x0E09FaBB73Bd3Ade0a17ECC321fD13a19e81cE82";

    fn aggregator() -> NameResolutionAggregator {
        let config = SearchConfig::default();
        NameResolutionAggregator::standard(
            Arc::new(
                StaticNameSource::new(NameService::Ens, config.ens.clone())
                    .with_name(1, "pancakeswap.eth", CAKE),
            ),
            Arc::new(
                StaticNameSource::new(NameService::Sid, ServiceChains::new(&[chain::BSC]))
                    .with_name(chain::BSC, "pancake.bnb", CAKE),
            ),
            Arc::new(StaticNameSource::new(NameService::Uns, config.uns.clone())),
            &config,
        )
    }

    fn tokens() -> StaticTokenLookup {
        let mut tokens = StaticTokenLookup::new();
        for chain_id in [chain::ETHEREUM, chain::BSC] {
            tokens.insert(Token {
                chain_id,
                address: CAKE.parse().unwrap(),
                symbol: "Cake".to_string(),
                decimals: 18,
                name: None,
            });
        }
        tokens
    }

    struct BrokenLookup;

    #[async_trait]
    impl TokenLookup for BrokenLookup {
        async fn lookup_token(
            &self,
            address: &Address,
            chain_id: u64,
        ) -> Result<Option<Token>, LookupError> {
            Err(LookupError::Failed {
                chain_id,
                address: address.to_string(),
                reason: "rpc timeout".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_search_by_ens_name() {
        let outcome = search_token("pancakeswap.eth", chain::ETHEREUM, &aggregator(), &tokens())
            .await
            .unwrap();
        assert!(outcome.is_valid);
        assert_eq!(outcome.resolution.value.as_deref(), Some(CAKE));
        assert_eq!(outcome.token.map(|t| t.symbol), Some("Cake".to_string()));
    }

    #[tokio::test]
    async fn test_search_by_sid_name_on_bsc() {
        let outcome = search_token("pancake.bnb", chain::BSC, &aggregator(), &tokens())
            .await
            .unwrap();
        assert_eq!(outcome.resolution.address(), CAKE.parse().ok());
        assert!(outcome.token.is_some());
    }

    #[tokio::test]
    async fn test_search_by_lowercase_literal() {
        let outcome = search_token(&CAKE.to_lowercase(), chain::BSC, &aggregator(), &tokens())
            .await
            .unwrap();
        assert_eq!(outcome.resolution.value.as_deref(), Some(CAKE));
        assert!(outcome.token.is_some());
    }

    #[tokio::test]
    async fn test_search_unresolved_name_stays_valid() {
        let outcome = search_token("nobody.eth", chain::ETHEREUM, &aggregator(), &tokens())
            .await
            .unwrap();
        assert!(outcome.is_valid);
        assert_eq!(outcome.resolution.value, None);
        assert_eq!(outcome.token, None);
    }

    #[tokio::test]
    async fn test_search_lookup_error_propagates() {
        let result = search_token(CAKE, chain::ETHEREUM, &aggregator(), &BrokenLookup).await;
        assert!(matches!(result, Err(Error::Lookup(_))));
    }
}
