//! Query state model: what a list view is currently showing
//!
//! `QueryState` is the single source of truth for a list view. The address
//! bar is a projection of it (see `crate::url`) and the fetch cache is keyed
//! by its `Fingerprint` (see `crate::fetch`).

mod ordering;

use std::fmt;

use chrono::NaiveDate;
use url::form_urlencoded;

pub use ordering::Ordering;

/// Date format shared by the address bar and the remote API
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryState {
    /// 1-based page number
    pub page: u32,
    /// Free-text search, empty when inactive
    pub search: String,
    pub ordering: Ordering,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    /// Restrict the list to a single owner (stories only)
    pub owner: Option<String>,
}

impl Default for QueryState {
    fn default() -> Self {
        Self {
            page: 1,
            search: String::new(),
            ordering: Ordering::default(),
            date_from: None,
            date_to: None,
            owner: None,
        }
    }
}

/// A user-originated change to the query state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    SetSearch(String),
    SetOrdering(Ordering),
    SetPage(u32),
    SetDateRange(Option<NaiveDate>, Option<NaiveDate>),
    SetOwner(Option<String>),
    Reset,
}

/// Why the reducer refused an intent. Never shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectedIntent {
    #[error("page {0} is below 1")]
    PageBelowOne(u32),
    #[error("page {page} exceeds last page {last}")]
    PageOutOfRange { page: u32, last: u32 },
    #[error("date range starts after it ends ({from} > {to})")]
    InvertedDateRange { from: NaiveDate, to: NaiveDate },
}

impl QueryState {
    /// Apply an intent, producing the next state.
    ///
    /// `known_pages` is the last known page count for the current
    /// fingerprint, when a result for it has been seen.
    pub fn apply(&self, intent: Intent, known_pages: Option<u32>) -> Result<Self, RejectedIntent> {
        let next = match intent {
            Intent::SetSearch(text) => Self {
                search: text.trim().to_string(),
                page: 1,
                ..self.clone()
            },
            Intent::SetOrdering(ordering) => Self {
                ordering,
                page: 1,
                ..self.clone()
            },
            Intent::SetPage(page) => {
                if page < 1 {
                    return Err(RejectedIntent::PageBelowOne(page));
                }
                if let Some(last) = known_pages
                    && page > last.max(1)
                {
                    return Err(RejectedIntent::PageOutOfRange { page, last });
                }
                Self {
                    page,
                    ..self.clone()
                }
            }
            Intent::SetDateRange(from, to) => {
                if let (Some(from), Some(to)) = (from, to)
                    && from > to
                {
                    return Err(RejectedIntent::InvertedDateRange { from, to });
                }
                Self {
                    date_from: from,
                    date_to: to,
                    page: 1,
                    ..self.clone()
                }
            }
            Intent::SetOwner(owner) => Self {
                owner: owner
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty()),
                page: 1,
                ..self.clone()
            },
            Intent::Reset => Self::default(),
        };
        Ok(next)
    }

    pub fn has_search(&self) -> bool {
        !self.search.is_empty()
    }

    pub fn has_filters(&self) -> bool {
        self.has_search() || self.date_from.is_some() || self.date_to.is_some() || self.owner.is_some()
    }

    /// Same query, different page
    pub fn with_page(&self, page: u32) -> Self {
        Self {
            page: page.max(1),
            ..self.clone()
        }
    }

    pub fn fingerprint(&self) -> Fingerprint {
        let fmt_date = |d: Option<NaiveDate>| {
            d.map(|d| d.format(DATE_FORMAT).to_string())
                .unwrap_or_default()
        };
        let key = form_urlencoded::Serializer::new(String::new())
            .append_pair("page", &self.page.to_string())
            .append_pair("search", &self.search)
            .append_pair("ordering", self.ordering.slug())
            .append_pair("date_from", &fmt_date(self.date_from))
            .append_pair("date_to", &fmt_date(self.date_to))
            .append_pair("owner", self.owner.as_deref().unwrap_or_default())
            .finish();
        Fingerprint(key)
    }
}

/// Canonical serialization of a `QueryState`, used as cache and request key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
