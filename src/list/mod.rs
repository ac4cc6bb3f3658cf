//! List view controller: query state, address bar and load state in one place
//!
//! The visible state is always derived from the cache entry of the active
//! fingerprint. Responses for any other fingerprint are cached by the
//! fetcher but never touch what the view shows.

use std::time::Instant;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

use crate::api::{FetchError, ListResult};
use crate::config::PaginationConfig;
use crate::fetch::{CacheEntry, EntryStatus, ListFetcher, ListSource};
use crate::pagination::{PageToken, Viewport, window};
use crate::query::{Fingerprint, Intent, QueryState};
use crate::url::{Navigation, Navigator, UrlSync};

/// What the list area shows
#[derive(Debug, Clone, PartialEq)]
pub enum LoadState<T> {
    Loading,
    Success(ListResult<T>),
    Empty,
    Error { reason: String },
}

impl<T> LoadState<T> {
    fn from_entry(entry: Option<CacheEntry<T>>) -> Self {
        let Some(entry) = entry else {
            return Self::Loading;
        };
        match entry.status {
            EntryStatus::Pending => Self::Loading,
            EntryStatus::Resolved(result) if result.is_empty() => Self::Empty,
            EntryStatus::Resolved(result) => Self::Success(result),
            EntryStatus::Failed(err) => Self::Error {
                reason: describe(&err),
            },
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

/// User-facing text for a failed request
fn describe(err: &FetchError) -> String {
    if let Some(reason) = err.reason() {
        return reason.to_string();
    }
    match err {
        FetchError::Application { status, .. } => {
            format!("The archive refused the request ({status})")
        }
        FetchError::Transport(_) => "Could not reach the archive".to_string(),
        FetchError::Malformed(_) => "The archive sent an unexpected response".to_string(),
    }
}

/// Recovery offered next to a load state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListAction {
    Retry,
    ClearSearch,
}

impl ListAction {
    pub fn label(self) -> &'static str {
        match self {
            Self::Retry => "Retry",
            Self::ClearSearch => "Clear search",
        }
    }
}

pub struct ListView<S: ListSource, N: Navigator> {
    fetcher: ListFetcher<S>,
    nav: N,
    sync: UrlSync,
    state: LoadState<S::Item>,
    events: broadcast::Receiver<Fingerprint>,
    pagination: PaginationConfig,
    /// Page count last seen for the current filters
    known_pages: Option<u32>,
}

impl<S: ListSource, N: Navigator> ListView<S, N> {
    /// Cold load from the address bar and start fetching
    pub fn mount(fetcher: ListFetcher<S>, nav: N) -> Self {
        let events = fetcher.subscribe();
        let sync = UrlSync::cold_load(&nav);
        let mut view = Self {
            fetcher,
            nav,
            sync,
            state: LoadState::Loading,
            events,
            pagination: PaginationConfig::default(),
            known_pages: None,
        };
        view.fetcher.prime(view.sync.state());
        view.refresh();
        view
    }

    pub fn with_pagination(mut self, pagination: PaginationConfig) -> Self {
        self.pagination = pagination;
        self
    }

    pub fn query(&self) -> &QueryState {
        self.sync.state()
    }

    pub fn state(&self) -> &LoadState<S::Item> {
        &self.state
    }

    /// Current address bar contents
    pub fn url(&self) -> String {
        self.sync.url()
    }

    pub fn navigator(&self) -> &N {
        &self.nav
    }

    pub fn navigator_mut(&mut self) -> &mut N {
        &mut self.nav
    }

    #[cfg(test)]
    pub fn fetcher(&self) -> &ListFetcher<S> {
        &self.fetcher
    }

    /// A refetch is running behind the result on screen
    pub fn is_refreshing(&self) -> bool {
        self.fetcher
            .resolve(self.sync.state())
            .is_some_and(|entry| entry.refreshing && entry.result().is_some())
    }

    /// When the result on screen arrived
    pub fn updated_at(&self) -> Option<Instant> {
        match self.state {
            LoadState::Success(_) | LoadState::Empty => self
                .fetcher
                .resolve(self.sync.state())
                .and_then(|entry| entry.updated_at),
            _ => None,
        }
    }

    /// Apply a user intent. Returns the navigation it caused, if any.
    pub fn dispatch(&mut self, intent: Intent) -> Option<Navigation> {
        let navigation = self.transition(intent)?;
        self.refresh();
        Some(navigation)
    }

    fn transition(&mut self, intent: Intent) -> Option<Navigation> {
        let current = self.sync.state().clone();
        let next = match current.apply(intent, self.known_pages) {
            Ok(next) => next,
            Err(rejected) => {
                tracing::debug!("Ignoring intent: {}", rejected);
                return None;
            }
        };
        let navigation = self.sync.commit(&mut self.nav, next)?;
        self.activate(&current);
        Some(navigation)
    }

    /// Switch to the state now held by the synchronizer
    fn activate(&mut self, previous: &QueryState) {
        let state = self.sync.state();
        if state.with_page(1) != previous.with_page(1) {
            self.known_pages = None;
        }
        self.fetcher.prime(state);
    }

    /// Move to `page` in place of the current history entry
    fn correct_page(&mut self, page: u32) -> bool {
        let current = self.sync.state().clone();
        let next = current.with_page(page);
        if self.sync.replace(&mut self.nav, next).is_none() {
            return false;
        }
        self.activate(&current);
        true
    }

    /// Wait until the active query has a settled value, following any page
    /// corrections it causes.
    pub async fn load(&mut self) {
        while self.state.is_loading() {
            let query = self.sync.state().clone();
            self.fetcher.ensure(&query).await;
            self.refresh();
            if self.sync.state() == &query {
                break;
            }
        }
    }

    /// The address bar was changed from outside (back/forward)
    pub fn on_history_change(&mut self) -> bool {
        let previous = self.sync.state().clone();
        if self.sync.sync_external(&self.nav).is_none() {
            return false;
        }
        self.activate(&previous);
        self.refresh();
        true
    }

    /// Wait for the active query's request to settle and re-derive.
    ///
    /// Returns false once the fetcher is gone.
    pub async fn next_update(&mut self) -> bool {
        loop {
            match self.events.recv().await {
                Ok(fp) if fp == self.sync.state().fingerprint() => {
                    self.refresh();
                    return true;
                }
                Ok(fp) => tracing::debug!("Ignoring response for inactive query {}", fp),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!("Missed {} fetch announcements", skipped);
                    self.refresh();
                    return true;
                }
                Err(RecvError::Closed) => return false,
            }
        }
    }

    /// Apply every announcement already received. Returns true if the view
    /// changed.
    pub fn drain_updates(&mut self) -> bool {
        let active = self.sync.state().fingerprint();
        let mut relevant = false;
        loop {
            match self.events.try_recv() {
                Ok(fp) => relevant |= fp == active,
                Err(TryRecvError::Lagged(_)) => relevant = true,
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
        if relevant {
            self.refresh();
        }
        relevant
    }

    /// Re-derive the load state from the active entry, clamping the page
    /// when the result says it is out of range.
    fn refresh(&mut self) {
        loop {
            let query = self.sync.state().clone();
            let entry = self.fetcher.resolve(&query);

            if let Some(result) = entry.as_ref().and_then(CacheEntry::result) {
                self.known_pages = Some(result.total_pages());
            }

            if let Some(entry) = &entry
                && let Some(page) = clamp_target(entry)
                && self.correct_page(page)
            {
                tracing::debug!("Clamped page {} to {}", entry.query.page, page);
                continue;
            }

            self.state = LoadState::from_entry(entry);
            return;
        }
    }

    /// The recovery action the current state offers
    pub fn available_action(&self) -> Option<ListAction> {
        match self.state {
            LoadState::Error { .. } => Some(ListAction::Retry),
            LoadState::Empty if self.query().has_search() => Some(ListAction::ClearSearch),
            _ => None,
        }
    }

    pub fn run_action(&mut self, action: ListAction) {
        match action {
            ListAction::Retry => self.retry(),
            ListAction::ClearSearch => self.clear_search(),
        }
    }

    /// Request the active query again after a failure
    pub fn retry(&mut self) {
        if !matches!(self.state, LoadState::Error { .. }) {
            return;
        }
        tracing::debug!("Retrying {}", self.sync.state().fingerprint());
        self.fetcher.prime(self.sync.state());
        self.refresh();
    }

    pub fn clear_search(&mut self) {
        self.dispatch(Intent::Reset);
    }

    /// Page controls for the current result
    pub fn page_tokens(&self, viewport: Viewport) -> Vec<PageToken> {
        let total = match &self.state {
            LoadState::Success(result) => result.total_pages(),
            _ => self.known_pages.unwrap_or(0),
        };
        window(
            self.query().page,
            total,
            self.pagination.max_visible(viewport),
        )
    }

    pub fn has_next(&self) -> bool {
        matches!(&self.state, LoadState::Success(r) if r.has_next)
    }

    pub fn has_previous(&self) -> bool {
        self.query().page > 1
    }
}

/// Page to move to when `entry` shows its page does not exist
fn clamp_target<T>(entry: &CacheEntry<T>) -> Option<u32> {
    let page = entry.query.page;
    if let Some(result) = entry.result() {
        let last = result.total_pages();
        return (last >= 1 && page > last).then_some(last);
    }
    // The archive answers pages past the end with 404
    let not_found = entry.error().and_then(FetchError::status) == Some(404);
    (not_found && page > 1).then_some(1)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::fetch::FetchConfig;
    use crate::fetch::mock::MockSource;
    use crate::retry::RetryConfig;
    use crate::url::MemoryHistory;

    fn fetcher(source: &MockSource) -> ListFetcher<MockSource> {
        fetcher_with(source, Duration::from_secs(300))
    }

    fn fetcher_with(source: &MockSource, freshness: Duration) -> ListFetcher<MockSource> {
        ListFetcher::new(
            source.clone(),
            FetchConfig {
                freshness,
                prefetch: false,
                retry: RetryConfig::new(2, Duration::from_millis(1), Duration::from_millis(2)),
            },
        )
    }

    fn mount(source: &MockSource, location: &str) -> ListView<MockSource, MemoryHistory> {
        ListView::mount(fetcher(source), MemoryHistory::new(location))
    }

    async fn settle(view: &mut ListView<MockSource, MemoryHistory>) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while view.state().is_loading() {
                if !view.next_update().await {
                    break;
                }
            }
        })
        .await
        .unwrap();
    }

    fn items(view: &ListView<MockSource, MemoryHistory>) -> Vec<String> {
        match view.state() {
            LoadState::Success(result) => result.items.clone(),
            other => panic!("expected a result, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_mount_loads_first_page() {
        let source = MockSource::new(25);
        let mut view = mount(&source, "");
        assert!(view.state().is_loading());

        settle(&mut view).await;
        assert_eq!(items(&view).len(), 10);
        assert_eq!(items(&view)[0], "item-0");
        assert!(view.has_next());
        assert!(!view.has_previous());
    }

    #[tokio::test]
    async fn test_search_resets_page_and_url() {
        let source = MockSource::new(100);
        let mut view = mount(&source, "?page=4");
        settle(&mut view).await;
        assert_eq!(view.query().page, 4);

        let nav = view.dispatch(Intent::SetSearch("jane".into())).unwrap();
        assert_eq!(
            view.query(),
            &QueryState {
                search: "jane".into(),
                ..Default::default()
            }
        );
        assert_eq!(nav.url, "?search=jane");
        assert_eq!(view.navigator().location(), "?search=jane");
    }

    #[tokio::test]
    async fn test_empty_result_offers_clear_search() {
        let source = MockSource::new(0);
        let mut view = mount(&source, "?search=nobody");
        settle(&mut view).await;

        assert_eq!(view.state(), &LoadState::Empty);
        assert_eq!(view.available_action(), Some(ListAction::ClearSearch));

        view.run_action(ListAction::ClearSearch);
        assert_eq!(view.query(), &QueryState::default());
        assert_eq!(view.url(), "");
        assert_eq!(view.navigator().location(), "");
    }

    #[tokio::test]
    async fn test_empty_without_search_offers_nothing() {
        let source = MockSource::new(0);
        let mut view = mount(&source, "");
        settle(&mut view).await;
        assert_eq!(view.state(), &LoadState::Empty);
        assert_eq!(view.available_action(), None);
    }

    #[tokio::test]
    async fn test_repeated_timeouts_end_in_error() {
        let source = MockSource::new(30);
        source.fail_page(1, FetchError::Transport("request timed out".into()));
        let mut view = mount(&source, "");
        settle(&mut view).await;

        assert_eq!(
            view.state(),
            &LoadState::Error {
                reason: "Could not reach the archive".into()
            }
        );
        assert_eq!(view.available_action(), Some(ListAction::Retry));
        assert_eq!(source.calls("", 1), 3);
    }

    #[tokio::test]
    async fn test_retry_recovers() {
        let source = MockSource::new(30);
        source.fail_next(FetchError::Application {
            status: 500,
            reason: Some("Database unavailable".into()),
        });
        let mut view = mount(&source, "");
        settle(&mut view).await;
        assert_eq!(
            view.state(),
            &LoadState::Error {
                reason: "Database unavailable".into()
            }
        );

        view.run_action(ListAction::Retry);
        assert!(view.state().is_loading());
        settle(&mut view).await;
        assert_eq!(items(&view).len(), 10);
        assert_eq!(source.calls("", 1), 2);
    }

    #[tokio::test]
    async fn test_only_latest_search_is_rendered() {
        let source = MockSource::new(5);
        for search in ["j", "ja", "jane"] {
            source.hold(search);
        }
        let mut view = mount(&source, "");
        settle(&mut view).await;

        view.dispatch(Intent::SetSearch("j".into()));
        view.dispatch(Intent::SetSearch("ja".into()));
        view.dispatch(Intent::SetSearch("jane".into()));
        assert!(view.state().is_loading());

        source.release("jane");
        settle(&mut view).await;
        assert_eq!(items(&view)[0], "jane-0");

        // Older responses arrive late
        source.release("ja");
        source.release("j");
        let fetcher = view.fetcher().clone();
        for search in ["ja", "j"] {
            let query = QueryState {
                search: search.into(),
                ..Default::default()
            };
            fetcher.ensure(&query).await;
        }
        view.drain_updates();
        assert_eq!(view.query().search, "jane");
        assert!(items(&view).iter().all(|item| item.starts_with("jane-")));
    }

    #[tokio::test]
    async fn test_cached_page_shows_without_loading() {
        let source = MockSource::new(30);
        let mut view = mount(&source, "");
        settle(&mut view).await;

        view.dispatch(Intent::SetPage(2));
        settle(&mut view).await;
        assert_eq!(items(&view)[0], "item-10");

        view.dispatch(Intent::SetPage(1));
        assert_eq!(items(&view)[0], "item-0");
        assert_eq!(source.calls("", 1), 1);
    }

    #[tokio::test]
    async fn test_page_past_the_end_is_clamped() {
        let source = MockSource::new(30);
        let mut view = mount(&source, "?page=7");
        settle(&mut view).await;

        assert_eq!(view.query().page, 3);
        assert_eq!(view.navigator().location(), "?page=3");
        assert_eq!(items(&view)[0], "item-20");
    }

    #[tokio::test]
    async fn test_clamp_replaces_history_entry() {
        let source = MockSource::new(30);
        let mut view = mount(&source, "?page=7");
        settle(&mut view).await;
        assert_eq!(view.navigator().len(), 1);

        view.dispatch(Intent::SetPage(1));
        settle(&mut view).await;
        assert_eq!(view.navigator().len(), 2);

        assert!(view.navigator_mut().back());
        assert!(view.on_history_change());
        assert_eq!(view.query().page, 3);
        assert_eq!(view.navigator().len(), 2);

        assert!(view.navigator_mut().forward());
        assert!(view.on_history_change());
        assert_eq!(view.query().page, 1);
    }

    #[tokio::test]
    async fn test_back_onto_out_of_range_page_keeps_forward_history() {
        let source = MockSource::new(30);
        let mut history = MemoryHistory::new("");
        history.push("?page=7");
        history.push("?page=2");
        let mut view = ListView::mount(fetcher(&source), history);
        settle(&mut view).await;
        assert_eq!(view.query().page, 2);

        assert!(view.navigator_mut().back());
        assert!(view.on_history_change());
        settle(&mut view).await;
        assert_eq!(view.query().page, 3);
        assert_eq!(view.navigator().location(), "?page=3");
        assert_eq!(view.navigator().len(), 3);

        assert!(view.navigator_mut().forward());
        assert!(view.on_history_change());
        assert_eq!(view.query().page, 2);
        assert_eq!(items(&view)[0], "item-10");
    }

    #[tokio::test]
    async fn test_load_follows_corrections() {
        let source = MockSource::new(30);
        let mut view = mount(&source, "?page=7");
        view.load().await;
        assert_eq!(view.query().page, 3);
        assert_eq!(items(&view)[0], "item-20");
        assert!(view.updated_at().is_some());
    }

    #[tokio::test]
    async fn test_stale_page_reports_refresh() {
        let source = MockSource::new(30);
        let fetcher = fetcher_with(&source, Duration::ZERO);
        let mut view = ListView::mount(fetcher, MemoryHistory::new(""));
        settle(&mut view).await;
        assert!(!view.is_refreshing());
        view.dispatch(Intent::SetPage(2));
        settle(&mut view).await;

        source.hold("");
        view.dispatch(Intent::SetPage(1));
        assert_eq!(items(&view)[0], "item-0");
        assert!(view.is_refreshing());

        source.release("");
        assert!(view.next_update().await);
        assert!(!view.is_refreshing());
        assert_eq!(source.calls("", 1), 2);
    }

    #[tokio::test]
    async fn test_not_found_page_returns_to_first() {
        let source = MockSource::new(30);
        source.fail_page(9, FetchError::Application {
            status: 404,
            reason: Some("Invalid page.".into()),
        });
        let mut view = mount(&source, "?page=9&search=jane");
        settle(&mut view).await;

        assert_eq!(view.query().page, 1);
        assert_eq!(view.query().search, "jane");
        assert_eq!(view.navigator().location(), "?search=jane");
    }

    #[tokio::test]
    async fn test_page_beyond_known_total_is_ignored() {
        let source = MockSource::new(30);
        let mut view = mount(&source, "");
        settle(&mut view).await;

        assert_eq!(view.dispatch(Intent::SetPage(4)), None);
        assert_eq!(view.dispatch(Intent::SetPage(0)), None);
        assert_eq!(view.query().page, 1);
        assert_eq!(view.navigator().len(), 1);
    }

    #[tokio::test]
    async fn test_back_and_forward_follow_history() {
        let source = MockSource::new(30);
        let mut view = mount(&source, "");
        settle(&mut view).await;
        view.dispatch(Intent::SetPage(2));
        settle(&mut view).await;
        assert_eq!(view.navigator().len(), 2);

        assert!(view.navigator_mut().back());
        assert!(view.on_history_change());
        assert_eq!(view.query().page, 1);
        assert_eq!(items(&view)[0], "item-0");

        // Nothing changed since the last sync
        assert!(!view.on_history_change());

        assert!(view.navigator_mut().forward());
        assert!(view.on_history_change());
        assert_eq!(view.query().page, 2);
        assert_eq!(view.navigator().len(), 2);
    }

    #[tokio::test]
    async fn test_page_tokens_follow_result() {
        let source = MockSource::new(200);
        let mut view = mount(&source, "?page=10");
        settle(&mut view).await;

        use crate::pagination::PageToken::{Ellipsis as E, Page as P};
        assert_eq!(
            view.page_tokens(Viewport::Wide),
            vec![P(1), E, P(9), P(10), P(11), E, P(20)]
        );
        assert_eq!(view.page_tokens(Viewport::Narrow), vec![P(1), E, P(10), E, P(20)]);
    }
}
