use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::address::{is_name_like, normalize_address, Address};
use crate::config::{SearchConfig, ServiceChains};
use crate::error::ResolveError;

/// Independent naming systems that map names to addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NameService {
    Ens,
    Sid,
    Uns,
}

impl fmt::Display for NameService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NameService::Ens => "ENS",
            NameService::Sid => "SID",
            NameService::Uns => "UNS",
        };
        f.write_str(name)
    }
}

/// Client for one naming service.
#[async_trait]
pub trait NameSource: Send + Sync {
    fn service(&self) -> NameService;

    /// Whether the service can be queried on `chain_id` at all.
    fn supports_chain(&self, chain_id: u64) -> bool;

    /// Resolve `name` to an address string as returned by the service.
    async fn resolve_address(&self, name: &str, chain_id: u64)
        -> Result<Option<String>, ResolveError>;

    /// Reverse lookup: primary name registered for `address`.
    async fn lookup_name(
        &self,
        address: &Address,
        chain_id: u64,
    ) -> Result<Option<String>, ResolveError>;

    /// Avatar URL attached to `name`, if the service has the concept.
    async fn avatar(&self, _name: &str, _chain_id: u64) -> Result<Option<String>, ResolveError> {
        Ok(None)
    }
}

/// Which chain a source is queried on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainScope {
    /// The chain the caller is currently on.
    Active,
    /// Always the given chain, whatever the active chain is.
    Fixed(u64),
}

impl ChainScope {
    fn resolve(self, active_chain_id: u64) -> u64 {
        match self {
            ChainScope::Active => active_chain_id,
            ChainScope::Fixed(chain_id) => chain_id,
        }
    }
}

/// When a source is started relative to the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Started immediately, alongside every other parallel source.
    Parallel,
    /// Started only once the entry directly above it in priority order has
    /// settled without a result.
    AfterPrevious,
}

/// A source placed in the priority list.
#[derive(Clone)]
pub struct SourceEntry {
    pub source: Arc<dyn NameSource>,
    pub chain: ChainScope,
    pub dispatch: Dispatch,
}

impl SourceEntry {
    pub fn new(source: Arc<dyn NameSource>, chain: ChainScope, dispatch: Dispatch) -> Self {
        Self {
            source,
            chain,
            dispatch,
        }
    }
}

impl fmt::Debug for SourceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceEntry")
            .field("service", &self.source.service())
            .field("chain", &self.chain)
            .field("dispatch", &self.dispatch)
            .finish()
    }
}

/// Progress of one source for the current query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceState<T> {
    /// Waiting for the entry above it to settle.
    Waiting,
    Pending,
    Resolved(T),
    /// Answered, but has nothing for this query.
    Empty,
    /// Request errored; counts as no result.
    Failed,
    /// Not available on the chain.
    Unsupported,
    /// Never started: a duplicate query or its gate produced a result.
    Skipped,
}

impl<T> SourceState<T> {
    fn is_unsettled(&self) -> bool {
        matches!(self, SourceState::Waiting | SourceState::Pending)
    }

    fn settled_without_result(&self) -> bool {
        matches!(
            self,
            SourceState::Empty | SourceState::Failed | SourceState::Unsupported | SourceState::Skipped
        )
    }
}

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// The input already was an address; no service was asked.
    Literal,
    Service { service: NameService, chain_id: u64 },
}

/// Per-source state of one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceStatus<T> {
    pub service: NameService,
    pub chain_id: u64,
    pub state: SourceState<T>,
}

/// Combined outcome of a resolution across all sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionResult<T> {
    pub value: Option<T>,
    pub provenance: Option<Provenance>,
    pub is_loading: bool,
    pub sources: Vec<SourceStatus<T>>,
}

impl<T> ResolutionResult<T> {
    pub fn empty() -> Self {
        Self {
            value: None,
            provenance: None,
            is_loading: false,
            sources: Vec::new(),
        }
    }
}

impl ResolutionResult<String> {
    /// The resolved value as an address, when it has the address shape.
    pub fn address(&self) -> Option<Address> {
        self.value.as_deref().and_then(|v| v.parse().ok())
    }
}

/// Reduce per-source states, listed in priority order, to one outcome.
///
/// The first resolved source wins, but only if every source above it has
/// settled: while a higher-priority source is unsettled nothing is surfaced
/// and the outcome is loading.
pub fn pick_first_by_priority<T: Clone>(sources: &[SourceStatus<T>]) -> ResolutionResult<T> {
    let mut result = ResolutionResult {
        value: None,
        provenance: None,
        is_loading: false,
        sources: sources.to_vec(),
    };
    for status in sources {
        match &status.state {
            SourceState::Waiting | SourceState::Pending => {
                result.is_loading = true;
                return result;
            }
            SourceState::Resolved(value) => {
                result.value = Some(value.clone());
                result.provenance = Some(Provenance::Service {
                    service: status.service,
                    chain_id: status.chain_id,
                });
                return result;
            }
            _ => continue,
        }
    }
    result
}

/// Reverse resolution outcome for display next to an address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainName {
    pub domain_name: Option<String>,
    pub ens_name: Option<String>,
    pub avatar: Option<String>,
    pub is_loading: bool,
}

/// Per-call resolution switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    /// When false, nothing is dispatched and the empty outcome is returned.
    pub enabled: bool,
    /// Chain to resolve on instead of the active chain.
    pub chain_id: Option<u64>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            chain_id: None,
        }
    }
}

impl ResolveOptions {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Resolve on `chain_id` whatever the active chain is.
    pub fn on_chain(chain_id: u64) -> Self {
        Self {
            chain_id: Some(chain_id),
            ..Self::default()
        }
    }

    fn chain(&self, active_chain_id: u64) -> u64 {
        self.chain_id.unwrap_or(active_chain_id)
    }
}

type SourceFuture<T> = BoxFuture<'static, Result<Option<T>, ResolveError>>;

/// Resolves names against several naming services in priority order.
#[derive(Debug, Clone)]
pub struct NameResolutionAggregator {
    forward: Vec<SourceEntry>,
    reverse: Vec<SourceEntry>,
}

impl NameResolutionAggregator {
    /// Build from explicit priority lists, highest priority first.
    pub fn new(forward: Vec<SourceEntry>, reverse: Vec<SourceEntry>) -> Self {
        Self { forward, reverse }
    }

    /// The standard wiring of ENS, SID and UNS.
    ///
    /// Forward: ENS on the active chain, then SID on the active chain once ENS
    /// came back empty, then ENS on the reference chain in parallel.
    /// Reverse: ENS on the reference chain, SID in parallel, then UNS once SID
    /// came back empty.
    pub fn standard(
        ens: Arc<dyn NameSource>,
        sid: Arc<dyn NameSource>,
        uns: Arc<dyn NameSource>,
        config: &SearchConfig,
    ) -> Self {
        let reference = ChainScope::Fixed(config.reference_chain_id);
        let forward = vec![
            SourceEntry::new(ens.clone(), ChainScope::Active, Dispatch::Parallel),
            SourceEntry::new(sid.clone(), ChainScope::Active, Dispatch::AfterPrevious),
            SourceEntry::new(ens.clone(), reference, Dispatch::Parallel),
        ];
        let reverse = vec![
            SourceEntry::new(ens, reference, Dispatch::Parallel),
            SourceEntry::new(sid, ChainScope::Active, Dispatch::Parallel),
            SourceEntry::new(uns, ChainScope::Active, Dispatch::AfterPrevious),
        ];
        Self::new(forward, reverse)
    }

    /// Resolve a name or address to at most one address on `chain_id`.
    pub async fn resolve(&self, input: &str, chain_id: u64) -> ResolutionResult<String> {
        self.resolve_observed(input, chain_id, ResolveOptions::default(), |_| {})
            .await
    }

    /// Like [`resolve`](Self::resolve), honoring `options` and reporting every
    /// intermediate outcome.
    ///
    /// A literal address bypasses the services and comes back checksummed.
    /// Input that is neither an address nor name-shaped issues no request.
    pub async fn resolve_observed<F>(
        &self,
        input: &str,
        active_chain_id: u64,
        options: ResolveOptions,
        on_update: F,
    ) -> ResolutionResult<String>
    where
        F: FnMut(&ResolutionResult<String>),
    {
        if !options.enabled || input.is_empty() {
            return ResolutionResult::empty();
        }
        if let Some(checksummed) = normalize_address(input) {
            return ResolutionResult {
                value: Some(checksummed),
                provenance: Some(Provenance::Literal),
                is_loading: false,
                sources: Vec::new(),
            };
        }
        if !is_name_like(input) {
            trace!(input, "not name-shaped, skipping resolution");
            return ResolutionResult::empty();
        }

        let name = input.to_string();
        run_prioritized(
            &self.forward,
            options.chain(active_chain_id),
            move |source: Arc<dyn NameSource>, chain: u64| {
                let name = name.clone();
                async move {
                    let resolved = source.resolve_address(&name, chain).await?;
                    // checksum when possible, otherwise keep what the service returned
                    Ok::<_, ResolveError>(resolved.map(|raw| normalize_address(&raw).unwrap_or(raw)))
                }
                .boxed()
            },
            on_update,
        )
        .await
    }

    /// Find a display name for `address`.
    pub async fn lookup_domain_name(&self, address: &Address, chain_id: u64) -> DomainName {
        self.lookup_domain_name_observed(address, chain_id, ResolveOptions::default(), |_| {})
            .await
    }

    /// Like [`lookup_domain_name`](Self::lookup_domain_name), honoring
    /// `options` and reporting intermediate states.
    ///
    /// Updates stay loading until the avatar of a resolved ENS name has been
    /// fetched too.
    pub async fn lookup_domain_name_observed<F>(
        &self,
        address: &Address,
        active_chain_id: u64,
        options: ResolveOptions,
        mut on_update: F,
    ) -> DomainName
    where
        F: FnMut(&DomainName),
    {
        if !options.enabled {
            return DomainName::default();
        }
        let target = *address;
        let reverse = &self.reverse;
        let outcome = run_prioritized(
            reverse,
            options.chain(active_chain_id),
            move |source: Arc<dyn NameSource>, chain: u64| {
                async move { source.lookup_name(&target, chain).await }.boxed()
            },
            |partial: &ResolutionResult<String>| {
                let ens_name = resolved_ens(&partial.sources, reverse).map(|(name, ..)| name);
                on_update(&DomainName {
                    domain_name: partial.value.clone(),
                    is_loading: partial.is_loading || ens_name.is_some(),
                    ens_name,
                    avatar: None,
                });
            },
        )
        .await;

        let (ens_name, avatar) = match resolved_ens(&outcome.sources, reverse) {
            Some((name, source, chain)) => {
                let avatar = match source.avatar(&name, chain).await {
                    Ok(avatar) => avatar,
                    Err(err) => {
                        warn!(%err, %name, "avatar lookup failed");
                        None
                    }
                };
                (Some(name), avatar)
            }
            None => (None, None),
        };

        let domain = DomainName {
            domain_name: outcome.value,
            ens_name,
            avatar,
            is_loading: false,
        };
        if domain.ens_name.is_some() {
            on_update(&domain);
        }
        domain
    }
}

/// The ENS name among `sources`, with the source and chain that answered it.
fn resolved_ens(
    sources: &[SourceStatus<String>],
    entries: &[SourceEntry],
) -> Option<(String, Arc<dyn NameSource>, u64)> {
    sources
        .iter()
        .zip(entries)
        .find_map(|(status, entry)| match (&status.state, status.service) {
            (SourceState::Resolved(name), NameService::Ens) => {
                Some((name.clone(), entry.source.clone(), status.chain_id))
            }
            _ => None,
        })
}

/// Drive the entries to a final outcome, starting gated sources as their
/// gates settle empty and returning as soon as the outcome can no longer
/// change. Sources still in flight at that point are dropped.
async fn run_prioritized<T, Q, F>(
    entries: &[SourceEntry],
    active_chain_id: u64,
    query: Q,
    mut on_update: F,
) -> ResolutionResult<T>
where
    T: Clone + fmt::Debug + Send + 'static,
    Q: Fn(Arc<dyn NameSource>, u64) -> SourceFuture<T>,
    F: FnMut(&ResolutionResult<T>),
{
    let mut statuses: Vec<SourceStatus<T>> = Vec::with_capacity(entries.len());
    let mut in_flight = FuturesUnordered::new();

    for (i, entry) in entries.iter().enumerate() {
        let service = entry.source.service();
        let chain_id = entry.chain.resolve(active_chain_id);
        let duplicate = statuses
            .iter()
            .any(|s| s.service == service && s.chain_id == chain_id);

        let state = if duplicate {
            SourceState::Skipped
        } else if !entry.source.supports_chain(chain_id) {
            SourceState::Unsupported
        } else if entry.dispatch == Dispatch::AfterPrevious && i > 0 {
            SourceState::Waiting
        } else {
            in_flight.push(start(i, entry, chain_id, &query));
            SourceState::Pending
        };
        statuses.push(SourceStatus {
            service,
            chain_id,
            state,
        });
    }
    release_waiting(entries, &mut statuses, &mut in_flight, &query);

    loop {
        let outcome = pick_first_by_priority(&statuses);
        on_update(&outcome);
        if !outcome.is_loading {
            return outcome;
        }

        let Some((i, result)) = in_flight.next().await else {
            // unreachable while something is pending; keep what we have
            return outcome;
        };
        let status = &mut statuses[i];
        status.state = match result {
            Ok(Some(value)) => {
                debug!(service = %status.service, chain_id = status.chain_id, ?value, "source resolved");
                SourceState::Resolved(value)
            }
            Ok(None) => {
                debug!(service = %status.service, chain_id = status.chain_id, "source empty");
                SourceState::Empty
            }
            Err(err) => {
                warn!(service = %status.service, chain_id = status.chain_id, %err, "source failed");
                SourceState::Failed
            }
        };
        release_waiting(entries, &mut statuses, &mut in_flight, &query);
    }
}

fn start<T, Q>(
    index: usize,
    entry: &SourceEntry,
    chain_id: u64,
    query: &Q,
) -> BoxFuture<'static, (usize, Result<Option<T>, ResolveError>)>
where
    T: Send + 'static,
    Q: Fn(Arc<dyn NameSource>, u64) -> SourceFuture<T>,
{
    trace!(service = %entry.source.service(), chain_id, "dispatching source");
    let fut = query(entry.source.clone(), chain_id);
    async move { (index, fut.await) }.boxed()
}

/// Start or skip every waiting entry whose predecessor has settled.
fn release_waiting<T, Q>(
    entries: &[SourceEntry],
    statuses: &mut [SourceStatus<T>],
    in_flight: &mut FuturesUnordered<BoxFuture<'static, (usize, Result<Option<T>, ResolveError>)>>,
    query: &Q,
) where
    T: Send + 'static,
    Q: Fn(Arc<dyn NameSource>, u64) -> SourceFuture<T>,
{
    // in order, so a chain of gated entries releases in one pass
    for i in 1..statuses.len() {
        if !matches!(statuses[i].state, SourceState::Waiting) {
            continue;
        }
        let previous = &statuses[i - 1].state;
        if previous.settled_without_result() {
            in_flight.push(start(i, &entries[i], statuses[i].chain_id, query));
            statuses[i].state = SourceState::Pending;
        } else if !previous.is_unsettled() {
            statuses[i].state = SourceState::Skipped;
        }
    }
}

/// In-memory naming service for testing, with optional latency and failure.
pub struct StaticNameSource {
    service: NameService,
    chains: ServiceChains,
    names: HashMap<(u64, String), String>,
    reverse: HashMap<(u64, Address), String>,
    avatars: HashMap<String, String>,
    latency: Option<Duration>,
    failing: bool,
    calls: AtomicUsize,
}

impl StaticNameSource {
    pub fn new(service: NameService, chains: ServiceChains) -> Self {
        Self {
            service,
            chains,
            names: HashMap::new(),
            reverse: HashMap::new(),
            avatars: HashMap::new(),
            latency: None,
            failing: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Register `name` → `address` on `chain_id`.
    pub fn with_name(mut self, chain_id: u64, name: &str, address: &str) -> Self {
        self.names
            .insert((chain_id, name.to_lowercase()), address.to_string());
        self
    }

    /// Register the primary name of `address` on `chain_id`.
    pub fn with_reverse(mut self, chain_id: u64, address: Address, name: &str) -> Self {
        self.reverse.insert((chain_id, address), name.to_string());
        self
    }

    pub fn with_avatar(mut self, name: &str, url: &str) -> Self {
        self.avatars.insert(name.to_lowercase(), url.to_string());
        self
    }

    /// Delay every answer by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make every request fail.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    /// Number of requests received so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn answer<V: Clone>(&self, value: Option<&V>) -> Result<Option<V>, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.failing {
            return Err(ResolveError::Request(format!("{} unavailable", self.service)));
        }
        Ok(value.cloned())
    }
}

#[async_trait]
impl NameSource for StaticNameSource {
    fn service(&self) -> NameService {
        self.service
    }

    fn supports_chain(&self, chain_id: u64) -> bool {
        self.chains.supports(chain_id)
    }

    async fn resolve_address(
        &self,
        name: &str,
        chain_id: u64,
    ) -> Result<Option<String>, ResolveError> {
        if !self.supports_chain(chain_id) {
            return Err(ResolveError::UnsupportedChain {
                service: self.service.to_string(),
                chain_id,
            });
        }
        let found = self.names.get(&(chain_id, name.to_lowercase()));
        self.answer(found).await
    }

    async fn lookup_name(
        &self,
        address: &Address,
        chain_id: u64,
    ) -> Result<Option<String>, ResolveError> {
        let found = self.reverse.get(&(chain_id, *address));
        self.answer(found).await
    }

    async fn avatar(&self, name: &str, _chain_id: u64) -> Result<Option<String>, ResolveError> {
        let found = self.avatars.get(&name.to_lowercase());
        self.answer(found).await
    }
}
