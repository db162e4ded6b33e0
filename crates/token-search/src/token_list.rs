use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::address::Address;
use crate::error::StoreError;
use crate::explorer::{ExplorerLinks, LinkKind};
use crate::token::Token;

/// Persisted list of tokens the user imported, per chain.
///
/// The store is the single source of truth: callers re-read it after every
/// mutation instead of patching a local copy.
pub trait UserTokenStore: Send + Sync {
    fn list_user_tokens(&self, chain_id: u64) -> Vec<Token>;

    fn remove_user_token(&self, chain_id: u64, address: &Address) -> Result<(), StoreError>;
}

/// In-memory user token store.
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    tokens: RwLock<HashMap<u64, Vec<Token>>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a token, replacing an existing entry with the same address.
    pub fn add_user_token(&self, token: Token) {
        let mut tokens = self.tokens.write();
        let list = tokens.entry(token.chain_id).or_default();
        match list.iter_mut().find(|t| t.address == token.address) {
            Some(existing) => *existing = token,
            None => list.push(token),
        }
    }
}

impl UserTokenStore for InMemoryTokenStore {
    fn list_user_tokens(&self, chain_id: u64) -> Vec<Token> {
        self.tokens
            .read()
            .get(&chain_id)
            .cloned()
            .unwrap_or_default()
    }

    fn remove_user_token(&self, chain_id: u64, address: &Address) -> Result<(), StoreError> {
        let mut tokens = self.tokens.write();
        let list = tokens.get_mut(&chain_id);
        let position = list
            .as_ref()
            .and_then(|list| list.iter().position(|t| t.address == *address));
        match (list, position) {
            (Some(list), Some(i)) => {
                list.remove(i);
                Ok(())
            }
            _ => Err(StoreError::NotFound {
                chain_id,
                address: address.to_string(),
            }),
        }
    }
}

/// One row of the imported token list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRow {
    pub token: Token,
    pub address_link: Option<String>,
    pub token_link: Option<String>,
}

/// Footer under the token list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListFooter {
    pub count: usize,
    pub label: String,
    /// Whether "clear all" is offered.
    pub can_clear: bool,
}

/// The user-added tokens of one chain, with removal.
pub struct TokenListController {
    store: Arc<dyn UserTokenStore>,
    explorer: Arc<dyn ExplorerLinks>,
    chain_id: u64,
}

impl TokenListController {
    pub fn new(
        store: Arc<dyn UserTokenStore>,
        explorer: Arc<dyn ExplorerLinks>,
        chain_id: u64,
    ) -> Self {
        Self {
            store,
            explorer,
            chain_id,
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Current tokens, read from the store.
    pub fn tokens(&self) -> Vec<Token> {
        self.store.list_user_tokens(self.chain_id)
    }

    pub fn rows(&self) -> Vec<TokenRow> {
        self.tokens()
            .into_iter()
            .map(|token| {
                let address = token.address.to_string();
                TokenRow {
                    address_link: self
                        .explorer
                        .explorer_link(&address, LinkKind::Address, self.chain_id),
                    token_link: self
                        .explorer
                        .explorer_link(&address, LinkKind::Token, self.chain_id),
                    token,
                }
            })
            .collect()
    }

    pub fn footer(&self) -> ListFooter {
        let count = self.tokens().len();
        let label = if count == 1 {
            format!("{count} Imported Token")
        } else {
            format!("{count} Imported Tokens")
        };
        ListFooter {
            count,
            label,
            can_clear: count > 0,
        }
    }

    pub fn remove_one(&self, chain_id: u64, address: &Address) -> Result<(), StoreError> {
        debug!(chain_id, %address, "removing user token");
        self.store.remove_user_token(chain_id, address)
    }

    /// Remove every listed token, in list order.
    ///
    /// Not atomic: a failed removal is logged and the rest still run. Returns
    /// the number of removals attempted.
    pub fn remove_all(&self) -> usize {
        let tokens = self.tokens();
        for token in &tokens {
            if let Err(err) = self.remove_one(self.chain_id, &token.address) {
                warn!(%err, chain_id = self.chain_id, address = %token.address, "failed to remove user token");
            }
        }
        tokens.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::explorer::BlockExplorer;

    fn token(chain_id: u64, byte: u8, symbol: &str) -> Token {
        Token {
            chain_id,
            address: Address::new([byte; 20]),
            symbol: symbol.to_string(),
            decimals: 18,
            name: None,
        }
    }

    fn explorer() -> Arc<dyn ExplorerLinks> {
        Arc::new(BlockExplorer::new(HashMap::from([(
            56,
            "https://bscscan.com".to_string(),
        )])))
    }

    /// Store whose removals fail for one address and are counted.
    struct FlakyStore {
        inner: InMemoryTokenStore,
        broken: Address,
        removals: AtomicUsize,
    }

    impl UserTokenStore for FlakyStore {
        fn list_user_tokens(&self, chain_id: u64) -> Vec<Token> {
            self.inner.list_user_tokens(chain_id)
        }

        fn remove_user_token(&self, chain_id: u64, address: &Address) -> Result<(), StoreError> {
            self.removals.fetch_add(1, Ordering::SeqCst);
            if *address == self.broken {
                return Err(StoreError::Unavailable("disk full".to_string()));
            }
            self.inner.remove_user_token(chain_id, address)
        }
    }

    #[test]
    fn test_list_scoped_by_chain() {
        let store = Arc::new(InMemoryTokenStore::new());
        store.add_user_token(token(56, 1, "AAA"));
        store.add_user_token(token(1, 2, "BBB"));
        store.add_user_token(token(56, 1, "AAA2"));

        let list = TokenListController::new(store, explorer(), 56);
        let tokens = list.tokens();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].symbol, "AAA2");
    }

    #[test]
    fn test_rows_carry_explorer_links() {
        let store = Arc::new(InMemoryTokenStore::new());
        store.add_user_token(token(56, 0xab, "AB"));
        let list = TokenListController::new(store, explorer(), 56);

        let rows = list.rows();
        let addr = Address::new([0xab; 20]).to_string();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].address_link,
            Some(format!("https://bscscan.com/address/{addr}"))
        );
        assert_eq!(
            rows[0].token_link,
            Some(format!("https://bscscan.com/token/{addr}"))
        );
    }

    #[test]
    fn test_remove_one_rereads_store() {
        let store = Arc::new(InMemoryTokenStore::new());
        store.add_user_token(token(56, 1, "AAA"));
        store.add_user_token(token(56, 2, "BBB"));
        let list = TokenListController::new(store, explorer(), 56);

        list.remove_one(56, &Address::new([1; 20])).unwrap();
        let symbols: Vec<_> = list.tokens().into_iter().map(|t| t.symbol).collect();
        assert_eq!(symbols, vec!["BBB".to_string()]);

        assert!(list.remove_one(56, &Address::new([1; 20])).is_err());
    }

    #[test]
    fn test_remove_all_continues_past_failure() {
        let inner = InMemoryTokenStore::new();
        inner.add_user_token(token(56, 1, "AAA"));
        inner.add_user_token(token(56, 2, "BBB"));
        inner.add_user_token(token(56, 3, "CCC"));
        let store = Arc::new(FlakyStore {
            inner,
            broken: Address::new([2; 20]),
            removals: AtomicUsize::new(0),
        });
        let list = TokenListController::new(store.clone(), explorer(), 56);

        assert_eq!(list.remove_all(), 3);
        assert_eq!(store.removals.load(Ordering::SeqCst), 3);

        let left: Vec<_> = list.tokens().into_iter().map(|t| t.symbol).collect();
        assert_eq!(left, vec!["BBB".to_string()]);
    }

    #[test]
    fn test_footer_label() {
        let store = Arc::new(InMemoryTokenStore::new());
        let list = TokenListController::new(store.clone(), explorer(), 56);
        assert_eq!(
            list.footer(),
            ListFooter {
                count: 0,
                label: "0 Imported Tokens".to_string(),
                can_clear: false
            }
        );

        store.add_user_token(token(56, 1, "AAA"));
        assert_eq!(list.footer().label, "1 Imported Token");
        assert!(list.footer().can_clear);

        store.add_user_token(token(56, 2, "BBB"));
        assert_eq!(list.footer().label, "2 Imported Tokens");
    }
}
