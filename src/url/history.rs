//! Browser-style history and the synchronizer that keeps it in step with
//! the query state

use crate::query::QueryState;

use super::{Location, from_url};

/// The address bar, as an externally observed and mutated store
pub trait Navigator {
    /// Current query string (may be empty)
    fn location(&self) -> String;
    /// Push a new history entry
    fn push(&mut self, url: &str);
    /// Overwrite the current entry without adding one
    fn replace(&mut self, url: &str);
    /// Scroll the list viewport back to the top
    fn scroll_to_top(&mut self);
}

/// In-memory history with back/forward stacks
#[derive(Debug, Clone)]
pub struct MemoryHistory {
    entries: Vec<String>,
    cursor: usize,
    scroll_resets: usize,
}

impl MemoryHistory {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            entries: vec![initial.into()],
            cursor: 0,
            scroll_resets: 0,
        }
    }

    /// Step back one entry. Returns false at the start of history.
    pub fn back(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        true
    }

    /// Step forward one entry. Returns false at the end of history.
    pub fn forward(&mut self) -> bool {
        if self.cursor + 1 >= self.entries.len() {
            return false;
        }
        self.cursor += 1;
        true
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn scroll_resets(&self) -> usize {
        self.scroll_resets
    }
}

impl Navigator for MemoryHistory {
    fn location(&self) -> String {
        self.entries[self.cursor].clone()
    }

    fn push(&mut self, url: &str) {
        self.entries.truncate(self.cursor + 1);
        self.entries.push(url.to_string());
        self.cursor = self.entries.len() - 1;
    }

    fn replace(&mut self, url: &str) {
        self.entries[self.cursor] = url.to_string();
    }

    fn scroll_to_top(&mut self) {
        self.scroll_resets += 1;
    }
}

/// How a new state reaches the address bar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Commit {
    Push,
    /// Correct the current entry, leaving back/forward untouched
    Replace,
}

/// Side effects of committing a new query state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    /// The written query string
    pub url: String,
    /// Whether the viewport was scrolled to the top
    pub scrolled: bool,
}

/// Keeps the address bar a projection of the query state.
///
/// The address bar is read once at cold load; afterwards every user state
/// change pushes exactly one entry, and corrections (an out-of-range page)
/// replace the current one. Back/forward re-seed the state from the address
/// bar, and are recognized by comparing state shapes: when the parsed state
/// already equals the current one there is nothing to do.
#[derive(Debug, Clone)]
pub struct UrlSync {
    current: Location,
}

impl UrlSync {
    pub fn cold_load(nav: &impl Navigator) -> Self {
        let current = from_url(&nav.location());
        tracing::debug!("Cold load from address bar: {:?}", current.state);
        Self { current }
    }

    pub fn state(&self) -> &QueryState {
        &self.current.state
    }

    pub fn url(&self) -> String {
        self.current.to_url()
    }

    /// Project `next` onto the address bar as a new entry.
    ///
    /// Returns `None` when `next` equals the current state (no navigation).
    pub fn commit(&mut self, nav: &mut impl Navigator, next: QueryState) -> Option<Navigation> {
        self.write(nav, next, Commit::Push)
    }

    /// Project `next` onto the current address-bar entry
    pub fn replace(&mut self, nav: &mut impl Navigator, next: QueryState) -> Option<Navigation> {
        self.write(nav, next, Commit::Replace)
    }

    fn write(
        &mut self,
        nav: &mut impl Navigator,
        next: QueryState,
        mode: Commit,
    ) -> Option<Navigation> {
        if next == self.current.state {
            return None;
        }

        let prev = std::mem::replace(&mut self.current.state, next);
        let next = &self.current.state;
        let scrolled = prev.page != next.page
            || prev.search != next.search
            || prev.date_from != next.date_from
            || prev.date_to != next.date_to
            || prev.owner != next.owner;

        let url = self.current.to_url();
        match mode {
            Commit::Push => nav.push(&url),
            Commit::Replace => nav.replace(&url),
        }
        if scrolled {
            nav.scroll_to_top();
        }
        tracing::debug!("{:?} '{}' (scrolled: {})", mode, url, scrolled);

        Some(Navigation { url, scrolled })
    }

    /// React to an address-bar change made outside the synchronizer
    /// (back/forward). Returns the re-seeded state, or `None` if the address
    /// bar already matches the current state. Never pushes.
    pub fn sync_external(&mut self, nav: &impl Navigator) -> Option<QueryState> {
        let parsed = from_url(&nav.location());
        if parsed.state == self.current.state {
            self.current.passthrough = parsed.passthrough;
            return None;
        }
        tracing::debug!("Address bar changed externally: {:?}", parsed.state);
        self.current = parsed;
        Some(self.current.state.clone())
    }
}
