//! Query cache and fetcher for paginated lists
//!
//! Entries are keyed by `Fingerprint`. At most one request per fingerprint
//! is in flight at any time; every caller asking for the same fingerprint
//! joins it. Settled requests are announced on a broadcast channel so views
//! can re-derive their state, and a single background worker fetches the
//! page after the one a view is looking at.

#[cfg(test)]
pub(crate) mod mock;

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc};

use crate::api::{FetchError, ListResult};
use crate::config::Config;
use crate::constants::{FETCH_EVENT_CAPACITY, FRESHNESS_WINDOW_SECS, PREFETCH_QUEUE_CAPACITY};
use crate::query::{Fingerprint, QueryState};
use crate::retry::{RetryConfig, with_retry_if};

/// Anything that can produce one page of a list for a query
pub trait ListSource: Send + Sync + 'static {
    type Item: Clone + Send + Sync + 'static;

    fn fetch(
        &self,
        query: &QueryState,
    ) -> impl Future<Output = Result<ListResult<Self::Item>, FetchError>> + Send;
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryStatus<T> {
    Pending,
    Resolved(ListResult<T>),
    Failed(FetchError),
}

/// Snapshot of one cached fingerprint
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub query: QueryState,
    pub status: EntryStatus<T>,
    /// When the entry last settled; `None` while the first request runs
    pub updated_at: Option<Instant>,
    /// A refetch is running behind the value in `status`
    pub refreshing: bool,
}

impl<T> CacheEntry<T> {
    fn pending(query: QueryState) -> Self {
        Self {
            query,
            status: EntryStatus::Pending,
            updated_at: None,
            refreshing: true,
        }
    }

    pub fn result(&self) -> Option<&ListResult<T>> {
        match &self.status {
            EntryStatus::Resolved(result) => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&FetchError> {
        match &self.status {
            EntryStatus::Failed(err) => Some(err),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// How long a resolved page is served without a refetch
    pub freshness: Duration,
    /// Queue the next page after a page a view has looked at
    pub prefetch: bool,
    pub retry: RetryConfig,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            freshness: Duration::from_secs(FRESHNESS_WINDOW_SECS),
            prefetch: true,
            retry: RetryConfig::default(),
        }
    }
}

impl FetchConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            freshness: config.cache.freshness(),
            prefetch: config.cache.prefetch,
            retry: config.retry.to_retry_config(),
        }
    }
}

type SharedRequest<T> = Shared<BoxFuture<'static, CacheEntry<T>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    View,
    Prefetch,
}

struct Settled<T> {
    query: QueryState,
    /// Never `Pending`
    status: EntryStatus<T>,
    at: Instant,
}

struct InFlight<T> {
    query: QueryState,
    request: SharedRequest<T>,
    /// Someone other than the prefetch worker is waiting for this result
    observed: bool,
    origin: Origin,
}

struct Store<T> {
    settled: HashMap<Fingerprint, Settled<T>>,
    in_flight: HashMap<Fingerprint, InFlight<T>>,
}

impl<T: Clone> Store<T> {
    fn entry(&self, fp: &Fingerprint) -> Option<CacheEntry<T>> {
        let flight = self.in_flight.get(fp);
        match self.settled.get(fp) {
            // A failure being retried reads as pending again
            Some(settled)
                if flight.is_none() || matches!(settled.status, EntryStatus::Resolved(_)) =>
            {
                Some(CacheEntry {
                    query: settled.query.clone(),
                    status: settled.status.clone(),
                    updated_at: Some(settled.at),
                    refreshing: flight.is_some(),
                })
            }
            _ => flight.map(|f| CacheEntry::pending(f.query.clone())),
        }
    }
}

enum Kick<T> {
    /// A usable value exists (possibly stale and being refetched)
    Ready(CacheEntry<T>),
    /// No usable value yet; the request to wait for
    Wait(SharedRequest<T>),
}

struct Inner<S: ListSource> {
    source: S,
    config: FetchConfig,
    store: Mutex<Store<S::Item>>,
    events: broadcast::Sender<Fingerprint>,
    prefetch_tx: mpsc::Sender<QueryState>,
}

impl<S: ListSource> Inner<S> {
    fn lock(&self) -> MutexGuard<'_, Store<S::Item>> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_fresh(&self, at: Instant) -> bool {
        at.elapsed() < self.config.freshness
    }

    /// Start a request and register it as in flight.
    ///
    /// The caller holds the store lock and has checked that nothing is in
    /// flight for `fp`.
    fn start(
        self: &Arc<Self>,
        store: &mut Store<S::Item>,
        query: &QueryState,
        fp: Fingerprint,
        origin: Origin,
    ) -> SharedRequest<S::Item> {
        let inner = Arc::clone(self);
        let owned = query.clone();
        let key = fp.clone();
        let request = async move {
            let outcome = with_retry_if(
                &inner.config.retry,
                || inner.source.fetch(&owned),
                FetchError::is_retryable,
            )
            .await;
            inner.settle(&key, owned, outcome)
        }
        .boxed()
        .shared();

        // Drive the request even if every waiter goes away
        tokio::spawn(request.clone());

        store.in_flight.insert(
            fp,
            InFlight {
                query: query.clone(),
                request: request.clone(),
                observed: origin == Origin::View,
                origin,
            },
        );
        request
    }

    /// Record the outcome of a request and announce it.
    fn settle(
        &self,
        fp: &Fingerprint,
        query: QueryState,
        outcome: Result<ListResult<S::Item>, FetchError>,
    ) -> CacheEntry<S::Item> {
        let mut chain = None;
        let mut failure = None;
        let entry = {
            let mut store = self.lock();
            let flight = store.in_flight.remove(fp);
            let observed = flight.as_ref().is_some_and(|f| f.observed);
            let origin = flight.map(|f| f.origin);

            match outcome {
                Ok(result) => {
                    tracing::debug!(
                        "Resolved {} ({} items, {} total)",
                        fp,
                        result.items.len(),
                        result.total_count
                    );
                    if observed {
                        chain = Some(result.total_pages());
                    }
                    store.settled.insert(
                        fp.clone(),
                        Settled {
                            query: query.clone(),
                            status: EntryStatus::Resolved(result),
                            at: Instant::now(),
                        },
                    );
                }
                Err(err) => {
                    let had_result = store
                        .settled
                        .get(fp)
                        .is_some_and(|s| matches!(s.status, EntryStatus::Resolved(_)));
                    if had_result {
                        tracing::warn!("Refetch of {} failed, keeping previous result: {}", fp, err);
                    } else if !observed {
                        tracing::debug!(
                            "Discarding failed {:?} request for {}: {}",
                            origin,
                            fp,
                            err
                        );
                        store.settled.remove(fp);
                    } else {
                        tracing::warn!("Request for {} failed: {}", fp, err);
                        store.settled.insert(
                            fp.clone(),
                            Settled {
                                query: query.clone(),
                                status: EntryStatus::Failed(err.clone()),
                                at: Instant::now(),
                            },
                        );
                    }
                    failure = Some(err);
                }
            }

            // Discarded failures still answer whoever holds the request
            store.entry(fp).unwrap_or_else(|| CacheEntry {
                query: query.clone(),
                status: failure.map_or(EntryStatus::Pending, EntryStatus::Failed),
                updated_at: Some(Instant::now()),
                refreshing: false,
            })
        };

        if let Some(total_pages) = chain {
            self.queue_prefetch(&query, total_pages);
        }
        // No subscribers is fine
        let _ = self.events.send(fp.clone());
        entry
    }

    /// Queue the page after `query` for the prefetch worker, unless it is
    /// already cached or on its way.
    fn queue_prefetch(&self, query: &QueryState, total_pages: u32) {
        if !self.config.prefetch || query.page >= total_pages {
            return;
        }
        let next = query.with_page(query.page + 1);
        let fp = next.fingerprint();
        {
            let store = self.lock();
            if store.in_flight.contains_key(&fp)
                || store.settled.get(&fp).is_some_and(|s| self.is_fresh(s.at))
            {
                return;
            }
        }

        match self.prefetch_tx.try_send(next) {
            Ok(()) => tracing::debug!("Queued prefetch of {}", fp),
            Err(TrySendError::Full(_)) => {
                tracing::debug!("Prefetch queue full, skipping {}", fp);
            }
            Err(TrySendError::Closed(_)) => {
                tracing::warn!("Prefetch worker stopped, skipping {}", fp);
            }
        }
    }

    /// Start a prefetch if the page is still missing by the time the worker
    /// gets to it.
    fn begin_prefetch(self: &Arc<Self>, query: &QueryState) -> Option<SharedRequest<S::Item>> {
        let fp = query.fingerprint();
        let mut store = self.lock();
        if store.in_flight.contains_key(&fp) {
            return None;
        }
        if let Some(settled) = store.settled.get(&fp)
            && (self.is_fresh(settled.at) || matches!(settled.status, EntryStatus::Failed(_)))
        {
            return None;
        }
        tracing::debug!("Prefetching {}", fp);
        Some(self.start(&mut store, query, fp, Origin::Prefetch))
    }

    /// Make sure a request for `query` runs when it should, marking any
    /// request in flight as observed.
    fn kick(self: &Arc<Self>, query: &QueryState) -> Kick<S::Item> {
        let fp = query.fingerprint();
        let mut store = self.lock();

        if let Some(flight) = store.in_flight.get_mut(&fp) {
            flight.observed = true;
            let request = flight.request.clone();
            return match store.entry(&fp) {
                Some(entry) if entry.result().is_some() => Kick::Ready(entry),
                _ => Kick::Wait(request),
            };
        }

        let resolved = store.settled.get(&fp).and_then(|s| match &s.status {
            EntryStatus::Resolved(result) => Some((result.total_pages(), self.is_fresh(s.at))),
            _ => None,
        });

        match resolved {
            Some((total_pages, fresh)) => {
                if !fresh {
                    tracing::debug!("Serving stale {} while refetching", fp);
                    let _refetch = self.start(&mut store, query, fp.clone(), Origin::View);
                }
                let entry = store.entry(&fp);
                drop(store);
                self.queue_prefetch(query, total_pages);
                match entry {
                    Some(entry) => Kick::Ready(entry),
                    None => Kick::Ready(CacheEntry::pending(query.clone())),
                }
            }
            None => {
                tracing::debug!("Fetching {}", fp);
                Kick::Wait(self.start(&mut store, query, fp, Origin::View))
            }
        }
    }
}

/// Handle to a shared list cache. Clones share the cache.
pub struct ListFetcher<S: ListSource> {
    inner: Arc<Inner<S>>,
}

impl<S: ListSource> Clone for ListFetcher<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: ListSource> ListFetcher<S> {
    /// Create a fetcher and spawn its prefetch worker. Must be called from
    /// within a tokio runtime.
    pub fn new(source: S, config: FetchConfig) -> Self {
        let (events, _) = broadcast::channel(FETCH_EVENT_CAPACITY);
        let (prefetch_tx, prefetch_rx) = mpsc::channel(PREFETCH_QUEUE_CAPACITY);
        let inner = Arc::new(Inner {
            source,
            config,
            store: Mutex::new(Store {
                settled: HashMap::new(),
                in_flight: HashMap::new(),
            }),
            events,
            prefetch_tx,
        });
        tokio::spawn(prefetch_worker(Arc::downgrade(&inner), prefetch_rx));
        Self { inner }
    }

    /// Current cache entry for `query`, without starting any work
    pub fn resolve(&self, query: &QueryState) -> Option<CacheEntry<S::Item>> {
        self.inner.lock().entry(&query.fingerprint())
    }

    /// Start whatever network work `query` needs and return immediately
    pub fn prime(&self, query: &QueryState) {
        let _ = self.inner.kick(query);
    }

    /// Wait for a usable entry for `query`.
    ///
    /// Fresh values are returned without a request. Stale values are
    /// returned immediately while a refetch runs in the background.
    pub async fn ensure(&self, query: &QueryState) -> CacheEntry<S::Item> {
        match self.inner.kick(query) {
            Kick::Ready(entry) => entry,
            Kick::Wait(request) => request.await,
        }
    }

    /// Receive the fingerprint of every request as it settles
    pub fn subscribe(&self) -> broadcast::Receiver<Fingerprint> {
        self.inner.events.subscribe()
    }
}

/// Runs prefetches one at a time, behind anything a view asked for.
async fn prefetch_worker<S: ListSource>(
    inner: Weak<Inner<S>>,
    mut rx: mpsc::Receiver<QueryState>,
) {
    while let Some(query) = rx.recv().await {
        let Some(fetcher) = inner.upgrade() else {
            break;
        };
        let request = fetcher.begin_prefetch(&query);
        drop(fetcher);
        if let Some(request) = request {
            request.await;
        }
    }
    tracing::debug!("Prefetch worker stopped");
}
