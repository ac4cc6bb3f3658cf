//! Sort ordering for archive lists

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Sort order of a list. Exactly one variant is the default; the default is
/// never written to the address bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Ordering {
    /// Most recently posted first
    #[default]
    NewestFirst,
    /// Oldest posted first
    OldestFirst,
    /// Most recently archived first
    UploadNewest,
    /// Oldest archived first
    UploadOldest,
}

impl Ordering {
    pub const ALL: [Ordering; 4] = [
        Ordering::NewestFirst,
        Ordering::OldestFirst,
        Ordering::UploadNewest,
        Ordering::UploadOldest,
    ];

    /// Address-bar representation
    pub fn slug(self) -> &'static str {
        match self {
            Self::NewestFirst => "newest",
            Self::OldestFirst => "oldest",
            Self::UploadNewest => "upload-newest",
            Self::UploadOldest => "upload-oldest",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::NewestFirst => "Newest first",
            Self::OldestFirst => "Oldest first",
            Self::UploadNewest => "Recently archived",
            Self::UploadOldest => "First archived",
        }
    }

    pub fn is_default(self) -> bool {
        self == Self::default()
    }
}

impl fmt::Display for Ordering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown ordering: {0}")]
pub struct UnknownOrdering(pub String);

impl FromStr for Ordering {
    type Err = UnknownOrdering;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|o| o.slug() == s)
            .ok_or_else(|| UnknownOrdering(s.to_string()))
    }
}
