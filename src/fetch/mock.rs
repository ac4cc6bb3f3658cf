//! Scriptable in-memory list source

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use super::ListSource;
use crate::api::{FetchError, ListResult};
use crate::query::QueryState;

const MOCK_PAGE_SIZE: u32 = 10;

#[derive(Default)]
struct MockState {
    total: Mutex<u64>,
    calls: Mutex<HashMap<(String, u32), u32>>,
    /// Failures returned by every request for a page
    page_failures: Mutex<HashMap<u32, FetchError>>,
    /// One-shot failures, consumed in order by the next requests
    queued_failures: Mutex<VecDeque<FetchError>>,
    /// Requests for a search wait here until released
    gates: Mutex<HashMap<String, Arc<Notify>>>,
}

/// Items are named `<search or "item">-<index>` so tests can tell which
/// request produced a page.
#[derive(Clone, Default)]
pub(crate) struct MockSource {
    state: Arc<MockState>,
}

impl MockSource {
    pub(crate) fn new(total: u64) -> Self {
        let source = Self::default();
        source.set_total(total);
        source
    }

    pub(crate) fn set_total(&self, total: u64) {
        *self.state.total.lock().unwrap() = total;
    }

    pub(crate) fn calls(&self, search: &str, page: u32) -> u32 {
        self.state
            .calls
            .lock()
            .unwrap()
            .get(&(search.to_string(), page))
            .copied()
            .unwrap_or(0)
    }

    pub(crate) fn fail_page(&self, page: u32, err: FetchError) {
        self.state.page_failures.lock().unwrap().insert(page, err);
    }

    pub(crate) fn fail_next(&self, err: FetchError) {
        self.state.queued_failures.lock().unwrap().push_back(err);
    }

    /// Hold requests for `search` until `release` is called
    pub(crate) fn hold(&self, search: &str) {
        self.state
            .gates
            .lock()
            .unwrap()
            .insert(search.to_string(), Arc::new(Notify::new()));
    }

    /// Let the held request for `search` through; later ones are not held
    pub(crate) fn release(&self, search: &str) {
        if let Some(gate) = self.state.gates.lock().unwrap().remove(search) {
            gate.notify_one();
        }
    }

    fn page(&self, query: &QueryState) -> ListResult<String> {
        let total = *self.state.total.lock().unwrap();
        let size = u64::from(MOCK_PAGE_SIZE);
        let start = u64::from(query.page.saturating_sub(1)) * size;
        let end = (start + size).min(total);
        let prefix = if query.has_search() {
            query.search.as_str()
        } else {
            "item"
        };
        ListResult {
            items: (start..end).map(|i| format!("{prefix}-{i}")).collect(),
            total_count: total,
            page_size: MOCK_PAGE_SIZE,
            has_next: end < total,
            has_previous: query.page > 1,
        }
    }
}

impl ListSource for MockSource {
    type Item = String;

    async fn fetch(&self, query: &QueryState) -> Result<ListResult<String>, FetchError> {
        *self
            .state
            .calls
            .lock()
            .unwrap()
            .entry((query.search.clone(), query.page))
            .or_default() += 1;

        let gate = self.state.gates.lock().unwrap().get(&query.search).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let queued = self.state.queued_failures.lock().unwrap().pop_front();
        if let Some(err) = queued {
            return Err(err);
        }
        let failure = self
            .state
            .page_failures
            .lock()
            .unwrap()
            .get(&query.page)
            .cloned();
        if let Some(err) = failure {
            return Err(err);
        }
        Ok(self.page(query))
    }
}
