use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, warn};

use crate::address::{is_name_like, is_valid_address};
use crate::config::SearchConfig;
use crate::debounce::Debouncer;
use crate::resolver::{NameResolutionAggregator, ResolutionResult, ResolveOptions};
use crate::token::{Token, TokenLookup};

/// Snapshot of a token search box.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchState {
    /// Text as typed.
    pub query: String,
    /// Text after the debounce window; drives resolution and lookup.
    pub debounced_query: String,
    /// Request generation of `debounced_query`.
    pub generation: u64,
    pub resolution: ResolutionResult<String>,
    /// Resolved address, else the debounced text.
    pub resolved_query: String,
    pub token: Option<Token>,
    pub token_loading: bool,
    pub is_valid: bool,
    pub show_invalid_warning: bool,
}

impl Default for SearchState {
    fn default() -> Self {
        Self {
            query: String::new(),
            debounced_query: String::new(),
            generation: 0,
            resolution: ResolutionResult::empty(),
            resolved_query: String::new(),
            token: None,
            token_loading: false,
            is_valid: true,
            show_invalid_warning: false,
        }
    }
}

impl SearchState {
    pub fn is_loading(&self) -> bool {
        self.resolution.is_loading || self.token_loading
    }

    fn refresh_validity(&mut self) {
        self.is_valid = compute_validity(&self.query, self.resolution.value.as_deref());
        self.show_invalid_warning = !self.is_valid && !self.query.is_empty();
    }
}

/// Whether the search box input is acceptable.
///
/// Name-shaped input counts as valid before, and regardless of, resolution
/// so no error flashes while a lookup is pending.
pub fn compute_validity(query: &str, resolved: Option<&str>) -> bool {
    if query.is_empty() {
        return true;
    }
    if is_valid_address(query) {
        return true;
    }
    if is_name_like(query) {
        return true;
    }
    resolved.is_some()
}

#[derive(Debug)]
struct Commit {
    generation: u64,
    update: Update,
}

#[derive(Debug)]
enum Update {
    Resolution(ResolutionResult<String>),
    TokenLoading,
    Token(Option<Token>),
}

/// Search box controller: raw input, debounced resolution and single-token
/// lookup.
///
/// Each debounced value gets a fresh generation. Results are committed only
/// while their generation is still current, so answers for a superseded
/// query never overwrite newer state.
///
/// Query tasks belong to the driver task, so dropping the controller cancels
/// any resolution still in flight.
///
/// Must be created inside a tokio runtime.
pub struct SearchController {
    debouncer: Debouncer<String>,
    state: Arc<watch::Sender<SearchState>>,
    driver: JoinHandle<()>,
}

impl SearchController {
    pub fn new(
        aggregator: Arc<NameResolutionAggregator>,
        tokens: Arc<dyn TokenLookup>,
        chain_id: u64,
        config: &SearchConfig,
    ) -> Self {
        let debouncer = Debouncer::new(String::new(), config.debounce());
        let (state, _) = watch::channel(SearchState::default());
        let state = Arc::new(state);

        let driver = tokio::spawn(drive(
            debouncer.subscribe(),
            state.clone(),
            aggregator,
            tokens,
            chain_id,
        ));

        Self {
            debouncer,
            state,
            driver,
        }
    }

    /// Record a keystroke. Validity updates at once; resolution waits for the
    /// debounce window.
    pub fn set_query(&self, input: impl Into<String>) {
        let input = input.into();
        self.state.send_modify(|s| {
            s.query = input.clone();
            s.refresh_validity();
        });
        self.debouncer.push(input);
    }

    pub fn state(&self) -> SearchState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.state.subscribe()
    }
}

impl Drop for SearchController {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

async fn drive(
    mut debounced: watch::Receiver<String>,
    state: Arc<watch::Sender<SearchState>>,
    aggregator: Arc<NameResolutionAggregator>,
    tokens: Arc<dyn TokenLookup>,
    chain_id: u64,
) {
    let (commit_tx, mut commit_rx) = mpsc::unbounded_channel::<Commit>();
    let mut generation = 0u64;
    let mut queries = JoinSet::new();

    loop {
        tokio::select! {
            changed = debounced.changed() => {
                if changed.is_err() {
                    break;
                }
                let query = debounced.borrow_and_update().clone();
                generation += 1;
                debug!(generation, %query, "debounced query");

                queries.abort_all();
                state.send_modify(|s| {
                    s.debounced_query = query.clone();
                    s.generation = generation;
                    s.resolution = ResolutionResult::empty();
                    s.resolved_query = query.clone();
                    s.token = None;
                    s.token_loading = false;
                    s.refresh_validity();
                });
                if !query.is_empty() {
                    queries.spawn(run_query(
                        generation,
                        query,
                        chain_id,
                        aggregator.clone(),
                        tokens.clone(),
                        commit_tx.clone(),
                    ));
                }
            }
            Some(commit) = commit_rx.recv() => {
                state.send_if_modified(|s| apply_commit(s, generation, commit));
            }
            Some(joined) = queries.join_next() => {
                if let Err(err) = joined {
                    if err.is_panic() {
                        warn!(%err, "query task panicked");
                    }
                }
            }
        }
    }
}

/// Apply `commit` if it belongs to the `current` generation. Returns whether
/// the state changed.
fn apply_commit(state: &mut SearchState, current: u64, commit: Commit) -> bool {
    if commit.generation != current {
        debug!(stale = commit.generation, current, "dropping stale result");
        return false;
    }
    apply(state, commit.update);
    true
}

fn apply(state: &mut SearchState, update: Update) {
    match update {
        Update::Resolution(resolution) => {
            state.resolved_query = resolution
                .value
                .clone()
                .unwrap_or_else(|| state.debounced_query.clone());
            state.resolution = resolution;
            state.refresh_validity();
        }
        Update::TokenLoading => state.token_loading = true,
        Update::Token(token) => {
            state.token = token;
            state.token_loading = false;
        }
    }
}

async fn run_query(
    generation: u64,
    query: String,
    chain_id: u64,
    aggregator: Arc<NameResolutionAggregator>,
    tokens: Arc<dyn TokenLookup>,
    commits: mpsc::UnboundedSender<Commit>,
) {
    let send = |update: Update| {
        // the driver outlives every query task it spawns
        let _ = commits.send(Commit { generation, update });
    };

    let resolution = aggregator
        .resolve_observed(&query, chain_id, ResolveOptions::default(), |partial| {
            if partial.is_loading {
                send(Update::Resolution(partial.clone()));
            }
        })
        .await;
    let address = resolution.address();
    send(Update::Resolution(resolution));

    let Some(address) = address else {
        return;
    };
    send(Update::TokenLoading);
    let token = match tokens.lookup_token(&address, chain_id).await {
        Ok(token) => token,
        Err(err) => {
            warn!(%err, %address, chain_id, "token lookup failed");
            None
        }
    };
    send(Update::Token(token));
}
