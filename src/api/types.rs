//! Archive records and the paginated envelope they arrive in

use serde::{Deserialize, Deserializer, Serialize};

use crate::pagination::total_pages;

/// Paginated list envelope returned by every list endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// One page of a list, as the rest of the crate sees it
#[derive(Debug, Clone, PartialEq)]
pub struct ListResult<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    pub page_size: u32,
    pub has_next: bool,
    pub has_previous: bool,
}

impl<T> ListResult<T> {
    pub fn from_page(page: Page<T>, page_size: u32) -> Self {
        Self {
            items: page.results,
            total_count: page.count,
            page_size,
            has_next: page.next.is_some(),
            has_previous: page.previous.is_some(),
        }
    }

    pub fn total_pages(&self) -> u32 {
        total_pages(self.total_count, self.page_size)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Record a list item links to for a detail preview
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailRef {
    User(String),
    Story(String),
}

/// Line-oriented presentation of a record
pub trait ListItem {
    fn title(&self) -> String;
    fn subtitle(&self) -> Option<String> {
        None
    }
    fn detail_ref(&self) -> Option<DetailRef> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub uuid: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub instagram_id: String,
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub biography: Option<String>,
    #[serde(default)]
    pub follower_count: u64,
    #[serde(default)]
    pub following_count: u64,
    #[serde(default)]
    pub media_count: u64,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub has_stories: bool,
    #[serde(default)]
    pub has_history: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl ListItem for User {
    fn title(&self) -> String {
        match self.full_name.as_deref().filter(|n| !n.is_empty()) {
            Some(name) => format!("@{} ({})", self.username, name),
            None => format!("@{}", self.username),
        }
    }

    fn subtitle(&self) -> Option<String> {
        let mut badges = Vec::new();
        if self.is_verified {
            badges.push("verified");
        }
        if self.is_private {
            badges.push("private");
        }
        if self.has_stories {
            badges.push("stories");
        }
        let counts = format!(
            "{} followers · {} following · {} posts",
            compact_count(self.follower_count),
            compact_count(self.following_count),
            compact_count(self.media_count)
        );
        if badges.is_empty() {
            Some(counts)
        } else {
            Some(format!("{counts} [{}]", badges.join(", ")))
        }
    }

    fn detail_ref(&self) -> Option<DetailRef> {
        Some(DetailRef::User(self.uuid.clone()))
    }
}

/// Owner of a story: either an embedded profile summary or a bare id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoryOwner {
    Profile { uuid: String, username: String },
    Id(String),
}

impl StoryOwner {
    pub fn username(&self) -> Option<&str> {
        match self {
            Self::Profile { username, .. } => Some(username),
            Self::Id(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    #[serde(deserialize_with = "string_or_number")]
    pub story_id: String,
    #[serde(default)]
    pub user: Option<StoryOwner>,
    pub media: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub story_created_at: Option<String>,
}

impl Story {
    pub fn is_video(&self) -> bool {
        let path = self.media.split(['?', '#']).next().unwrap_or_default();
        [".mp4", ".mov", ".webm"]
            .iter()
            .any(|ext| path.to_ascii_lowercase().ends_with(ext))
    }
}

impl ListItem for Story {
    fn title(&self) -> String {
        let owner = self
            .user
            .as_ref()
            .and_then(StoryOwner::username)
            .map(|u| format!("@{u}"))
            .unwrap_or_else(|| "unknown owner".to_string());
        let kind = if self.is_video() { "video" } else { "image" };
        format!("{owner} · {kind} story {}", self.story_id)
    }

    fn subtitle(&self) -> Option<String> {
        self.story_created_at
            .as_deref()
            .or(self.created_at.as_deref())
            .map(|at| format!("posted {at}"))
    }

    fn detail_ref(&self) -> Option<DetailRef> {
        Some(DetailRef::Story(self.story_id.clone()))
    }
}

/// Snapshot of a profile at one point in its change history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub history_id: u64,
    pub history_date: String,
    #[serde(flatten)]
    pub user: User,
}

impl ListItem for HistoryRecord {
    fn title(&self) -> String {
        format!("{} · {}", self.history_date, self.user.title())
    }

    fn subtitle(&self) -> Option<String> {
        self.user.subtitle()
    }

    fn detail_ref(&self) -> Option<DetailRef> {
        self.user.detail_ref()
    }
}

/// 1234 -> "1.2K", 2_500_000 -> "2.5M"
fn compact_count(n: u64) -> String {
    match n {
        0..1_000 => n.to_string(),
        1_000..1_000_000 => format!("{:.1}K", n as f64 / 1_000.0),
        _ => format!("{:.1}M", n as f64 / 1_000_000.0),
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}
