//! Application-wide constants for tuning and configuration
//!
//! Centralizes magic numbers to make them discoverable and configurable.

/// Archive API used when nothing else is configured.
pub const DEFAULT_API_BASE_URL: &str = "https://api.animemoe.us";

/// Environment variable overriding the configured API base URL.
pub const API_BASE_URL_ENV: &str = "ARKIV_API_BASE_URL";

/// HTTP request timeout in seconds.
pub const HTTP_TIMEOUT_SECS: u64 = 20;

/// How long a fetched list page is served without a refetch (5 minutes).
pub const FRESHNESS_WINDOW_SECS: u64 = 300;

/// Detail records are immutable enough to keep for the same window.
pub const DETAIL_CACHE_TTL_SECS: u64 = 300;

/// Max detail records kept per kind.
pub const DETAIL_CACHE_CAPACITY: u64 = 200;

/// Items per page for the profile list.
pub const USERS_PAGE_SIZE: u32 = 12;

/// Items per page for the story list.
pub const STORIES_PAGE_SIZE: u32 = 12;

/// Items per page for a profile's change history.
pub const HISTORY_PAGE_SIZE: u32 = 10;

/// Page links shown on narrow viewports.
pub const NARROW_VISIBLE_PAGES: u32 = 3;

/// Page links shown on wide viewports.
pub const WIDE_VISIBLE_PAGES: u32 = 5;

/// Retries after the first attempt for transport-class failures.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Delay before the first retry in milliseconds.
pub const RETRY_INITIAL_DELAY_MS: u64 = 500;

/// Cap on the retry delay in milliseconds.
pub const RETRY_MAX_DELAY_MS: u64 = 5_000;

/// Capacity of the fetch announcement channel.
/// A lagging listener re-reads the active entry, so nothing is lost.
pub const FETCH_EVENT_CAPACITY: usize = 64;

/// Queued prefetch requests beyond which new ones are dropped.
pub const PREFETCH_QUEUE_CAPACITY: usize = 8;

/// Preference key for the story view mode.
pub const VIEW_MODE_KEY: &str = "view-mode";
