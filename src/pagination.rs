//! Page link window for the pagination control
//!
//! Produces a bounded, ellipsis-compressed sequence of page tokens for an
//! arbitrarily large page count.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A renderable unit in the pagination control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageToken {
    Page(u32),
    Ellipsis,
}

impl fmt::Display for PageToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Page(n) => write!(f, "{n}"),
            Self::Ellipsis => f.write_str("…"),
        }
    }
}

/// Viewport class, decided by whoever renders
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Viewport {
    Narrow,
    #[default]
    Wide,
}

/// Compute the page tokens to show around `current`.
///
/// Page 1 and page `total` are always present. Between them sits a span of
/// `max_visible - 2` pages (at least one) centered on `current` and shifted
/// at the edges so the number of visible pages stays constant.
pub fn window(current: u32, total: u32, max_visible: u32) -> Vec<PageToken> {
    if total == 0 {
        return Vec::new();
    }
    if total <= max_visible.max(1) {
        return (1..=total).map(PageToken::Page).collect();
    }
    // total > max_visible >= 1 here, so total >= 2

    let current = current.clamp(1, total);
    let interior = max_visible.saturating_sub(2).max(1);

    let mut start = current.saturating_sub((interior - 1) / 2).max(2);
    let mut end = start + interior - 1;
    if end > total - 1 {
        end = total - 1;
        start = end.saturating_sub(interior - 1).max(2);
    }

    let mut tokens = Vec::with_capacity(interior as usize + 4);
    tokens.push(PageToken::Page(1));
    if start > 2 {
        tokens.push(PageToken::Ellipsis);
    }
    tokens.extend((start..=end).map(PageToken::Page));
    if end < total - 1 {
        tokens.push(PageToken::Ellipsis);
    }
    tokens.push(PageToken::Page(total));
    tokens
}

/// Number of pages needed for `total_count` items
pub fn total_pages(total_count: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 0;
    }
    let pages = total_count.div_ceil(u64::from(page_size));
    u32::try_from(pages).unwrap_or(u32::MAX)
}
