//! Remote archive API: resources, records and the HTTP client
//!
//! The archive is a read-only REST service. This module owns the mapping
//! from `QueryState` to request parameters and from response envelopes to
//! `ListResult`; nothing else in the crate builds API URLs.

mod client;
mod detail;
mod error;
mod types;

use crate::query::{DATE_FORMAT, Ordering, QueryState};

pub use client::{ArchiveClient, Endpoint};
pub use detail::DetailCache;
pub use error::FetchError;
pub use types::{DetailRef, HistoryRecord, ListItem, ListResult, Page, Story, StoryOwner, User};

/// A paginated list exposed by the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    Users,
    Stories,
    /// Change history of one profile
    UserHistory { uuid: String },
}

impl Resource {
    pub fn path(&self) -> String {
        match self {
            Self::Users => "/instagram/users/".to_string(),
            Self::Stories => "/instagram/stories/".to_string(),
            Self::UserHistory { uuid } => format!("/instagram/users/{uuid}/history/"),
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::Users => "profiles".to_string(),
            Self::Stories => "stories".to_string(),
            Self::UserHistory { uuid } => format!("history of {uuid}"),
        }
    }

    /// API value for `ordering`, or `None` when the resource cannot be sorted
    pub fn ordering_value(&self, ordering: Ordering) -> Option<&'static str> {
        match self {
            Self::Users => Some(match ordering {
                Ordering::NewestFirst => "-created_at",
                Ordering::OldestFirst => "created_at",
                Ordering::UploadNewest => "-updated_at",
                Ordering::UploadOldest => "updated_at",
            }),
            Self::Stories => Some(match ordering {
                Ordering::NewestFirst => "-story_created_at",
                Ordering::OldestFirst => "story_created_at",
                Ordering::UploadNewest => "-created_at",
                Ordering::UploadOldest => "created_at",
            }),
            Self::UserHistory { .. } => None,
        }
    }

    /// Whether the resource honours search, date range and owner filters
    pub fn supports_filters(&self) -> bool {
        !matches!(self, Self::UserHistory { .. })
    }

    /// Request parameters for one page of this resource
    pub fn query_params(&self, query: &QueryState, page_size: u32) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("page", query.page.to_string()),
            ("count", page_size.to_string()),
            ("format", "json".to_string()),
        ];

        if let Some(ordering) = self.ordering_value(query.ordering) {
            params.push(("ordering", ordering.to_string()));
        }

        match self {
            Self::Users => {
                if query.has_search() {
                    params.push(("search", query.search.clone()));
                }
            }
            Self::Stories => {
                if query.has_search() {
                    params.push(("user__username", query.search.clone()));
                }
                if let Some(owner) = &query.owner {
                    params.push(("user", owner.clone()));
                }
                if let Some(from) = query.date_from {
                    params.push(("story_created_at__gte", from.format(DATE_FORMAT).to_string()));
                }
                if let Some(to) = query.date_to {
                    params.push(("story_created_at__lte", to.format(DATE_FORMAT).to_string()));
                }
            }
            Self::UserHistory { .. } => {}
        }

        params
    }
}
