//! Address-bar projection of the query state
//!
//! The address bar is never the source of truth except at cold load; see
//! [`UrlSync`] for the history semantics.

mod history;

use chrono::NaiveDate;
use url::form_urlencoded;

use crate::query::{DATE_FORMAT, QueryState};

pub use history::{MemoryHistory, Navigation, Navigator, UrlSync};

const PARAM_SEARCH: &str = "search";
const PARAM_ORDERING: &str = "ordering";
const PARAM_PAGE: &str = "page";
const PARAM_DATE_FROM: &str = "date_from";
const PARAM_DATE_TO: &str = "date_to";
const PARAM_OWNER: &str = "user";

const GOVERNED: [&str; 6] = [
    PARAM_SEARCH,
    PARAM_ORDERING,
    PARAM_PAGE,
    PARAM_DATE_FROM,
    PARAM_DATE_TO,
    PARAM_OWNER,
];

/// A parsed address-bar query string
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    pub state: QueryState,
    /// Parameters this crate does not govern, kept verbatim and in order
    pub passthrough: Vec<(String, String)>,
}

impl Location {
    pub fn new(state: QueryState) -> Self {
        Self {
            state,
            passthrough: Vec::new(),
        }
    }

    /// Serialize back to a query string. Fields at their default value are
    /// omitted; the all-default location serializes to `""`.
    pub fn to_url(&self) -> String {
        let state = &self.state;
        let mut out = form_urlencoded::Serializer::new(String::new());

        if state.has_search() {
            out.append_pair(PARAM_SEARCH, &state.search);
        }
        if !state.ordering.is_default() {
            out.append_pair(PARAM_ORDERING, state.ordering.slug());
        }
        if state.page > 1 {
            out.append_pair(PARAM_PAGE, &state.page.to_string());
        }
        if let Some(from) = state.date_from {
            out.append_pair(PARAM_DATE_FROM, &from.format(DATE_FORMAT).to_string());
        }
        if let Some(to) = state.date_to {
            out.append_pair(PARAM_DATE_TO, &to.format(DATE_FORMAT).to_string());
        }
        if let Some(owner) = state.owner.as_deref().filter(|o| !o.is_empty()) {
            out.append_pair(PARAM_OWNER, owner);
        }
        for (key, value) in &self.passthrough {
            out.append_pair(key, value);
        }

        let query = out.finish();
        if query.is_empty() {
            query
        } else {
            format!("?{query}")
        }
    }
}

/// Query string for `state` alone
pub fn to_url(state: &QueryState) -> String {
    Location::new(state.clone()).to_url()
}

/// Parse a query string (with or without the leading `?`).
///
/// Absent or unparseable values mean "default" for that field; they are
/// never an error.
pub fn from_url(query: &str) -> Location {
    let query = query.strip_prefix('?').unwrap_or(query);
    let mut location = Location::default();
    let mut seen: Vec<&str> = Vec::new();

    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        let Some(&name) = GOVERNED.iter().find(|name| **name == key) else {
            location
                .passthrough
                .push((key.into_owned(), value.into_owned()));
            continue;
        };
        // First occurrence wins, like URLSearchParams.get
        if seen.contains(&name) {
            continue;
        }
        seen.push(name);

        let state = &mut location.state;
        match name {
            PARAM_SEARCH => state.search = value.into_owned(),
            PARAM_ORDERING => state.ordering = value.parse().unwrap_or_default(),
            PARAM_PAGE => state.page = parse_page(&value),
            PARAM_DATE_FROM => state.date_from = parse_date(&value),
            PARAM_DATE_TO => state.date_to = parse_date(&value),
            PARAM_OWNER => state.owner = Some(value.into_owned()).filter(|o| !o.is_empty()),
            _ => {}
        }
    }

    if let (Some(from), Some(to)) = (location.state.date_from, location.state.date_to)
        && from > to
    {
        tracing::debug!("Ignoring inverted date range in address bar: {} > {}", from, to);
        location.state.date_from = None;
        location.state.date_to = None;
    }

    location
}

fn parse_page(value: &str) -> u32 {
    value.trim().parse::<u32>().ok().filter(|p| *p >= 1).unwrap_or(1)
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Intent, Ordering};
    use proptest::prelude::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    #[test]
    fn test_default_is_bare() {
        assert_eq!(to_url(&QueryState::default()), "");
        assert_eq!(from_url("").state, QueryState::default());
        assert_eq!(from_url("?").state, QueryState::default());
    }

    #[test]
    fn test_search_scenario() {
        let start = QueryState {
            page: 4,
            ..Default::default()
        };
        let next = start.apply(Intent::SetSearch("jane".into()), None).unwrap();
        assert_eq!(to_url(&next), "?search=jane");
    }

    #[test]
    fn test_non_default_fields() {
        let state = QueryState {
            page: 3,
            search: "jane doe".into(),
            ordering: Ordering::UploadOldest,
            date_from: Some(date("2024-01-01")),
            date_to: Some(date("2024-02-01")),
            owner: Some("42".into()),
        };
        assert_eq!(
            to_url(&state),
            "?search=jane+doe&ordering=upload-oldest&page=3&date_from=2024-01-01&date_to=2024-02-01&user=42"
        );
    }

    #[test]
    fn test_garbage_values_fall_back_to_defaults() {
        let location = from_url("page=abc&ordering=sideways&date_from=yesterday");
        assert_eq!(location.state, QueryState::default());
        assert_eq!(from_url("page=0").state.page, 1);
        assert_eq!(from_url("page=-3").state.page, 1);
    }

    #[test]
    fn test_unknown_params_pass_through() {
        let location = from_url("?utm_source=mail&page=2&tab=stories");
        assert_eq!(location.state.page, 2);
        assert_eq!(
            location.passthrough,
            vec![
                ("utm_source".to_string(), "mail".to_string()),
                ("tab".to_string(), "stories".to_string()),
            ]
        );
        assert_eq!(location.to_url(), "?page=2&utm_source=mail&tab=stories");
    }

    #[test]
    fn test_first_occurrence_wins() {
        assert_eq!(from_url("page=2&page=5").state.page, 2);
    }

    #[test]
    fn test_inverted_dates_dropped() {
        let state = from_url("date_from=2024-03-01&date_to=2024-01-01").state;
        assert_eq!(state.date_from, None);
        assert_eq!(state.date_to, None);
    }

    fn arb_state() -> impl Strategy<Value = QueryState> {
        (
            1u32..10_000,
            "[a-zA-Z0-9 &=?%+]{0,12}",
            prop::sample::select(Ordering::ALL.to_vec()),
            prop::option::of(0i64..20_000),
            prop::option::of(0i64..20_000),
            prop::option::of("[a-z0-9-]{1,8}"),
        )
            .prop_map(|(page, search, ordering, from, to, owner)| {
                let epoch = date("2000-01-01");
                let mut from = from.map(|d| epoch + chrono::Days::new(d as u64));
                let mut to = to.map(|d| epoch + chrono::Days::new(d as u64));
                if let (Some(f), Some(t)) = (from, to)
                    && f > t
                {
                    std::mem::swap(&mut from, &mut to);
                }
                QueryState {
                    page,
                    search,
                    ordering,
                    date_from: from,
                    date_to: to,
                    owner,
                }
            })
    }

    proptest! {
        #[test]
        fn prop_round_trip(state in arb_state()) {
            prop_assert_eq!(from_url(&to_url(&state)).state, state);
        }

        #[test]
        fn prop_round_trip_with_passthrough(state in arb_state(), extra in "[a-z]{1,6}", value in "[a-z0-9 ]{0,6}") {
            prop_assume!(!GOVERNED.contains(&extra.as_str()));
            let location = Location {
                state,
                passthrough: vec![(extra, value)],
            };
            prop_assert_eq!(from_url(&location.to_url()), location);
        }
    }
}
