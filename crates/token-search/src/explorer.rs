use std::collections::HashMap;

use crate::chain;
use crate::config::SearchConfig;

/// What an explorer link points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Address,
    Token,
    Transaction,
    Block,
}

impl LinkKind {
    fn path(self) -> &'static str {
        match self {
            LinkKind::Address => "address",
            LinkKind::Token => "token",
            LinkKind::Transaction => "tx",
            LinkKind::Block => "block",
        }
    }
}

/// Formats block explorer URLs.
pub trait ExplorerLinks: Send + Sync {
    fn explorer_link(&self, data: &str, kind: LinkKind, chain_id: u64) -> Option<String>;
}

/// Explorer links built from per-chain base URLs.
///
/// Chains without a configured explorer fall back to BscScan.
#[derive(Debug, Clone)]
pub struct BlockExplorer {
    bases: HashMap<u64, String>,
}

impl BlockExplorer {
    pub fn new(bases: HashMap<u64, String>) -> Self {
        let bases = bases
            .into_iter()
            .map(|(id, url)| (id, url.trim_end_matches('/').to_string()))
            .collect();
        Self { bases }
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(config.explorers.clone())
    }
}

impl ExplorerLinks for BlockExplorer {
    fn explorer_link(&self, data: &str, kind: LinkKind, chain_id: u64) -> Option<String> {
        let base = self
            .bases
            .get(&chain_id)
            .or_else(|| self.bases.get(&chain::BSC))?;
        Some(format!("{base}/{}/{data}", kind.path()))
    }
}
