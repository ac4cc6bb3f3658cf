//! Persisted view-mode preference
//!
//! Preferences live behind `PreferenceStore` so nothing else touches the
//! filesystem for them. Reading never fails from the caller's point of
//! view: anything missing or unreadable is the default.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::constants::VIEW_MODE_KEY;

/// How story lists are laid out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Grid,
    Compact,
    List,
}

impl ViewMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Grid => "grid",
            Self::Compact => "compact",
            Self::List => "list",
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown view mode '{0}' (expected grid, compact or list)")]
pub struct UnknownViewMode(pub String);

impl FromStr for ViewMode {
    type Err = UnknownViewMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "grid" => Ok(Self::Grid),
            "compact" => Ok(Self::Compact),
            "list" => Ok(Self::List),
            other => Err(UnknownViewMode(other.to_string())),
        }
    }
}

/// Key-value storage for small preferences
pub trait PreferenceStore {
    fn read(&self, key: &str) -> Result<Option<String>>;
    fn write(&mut self, key: &str, value: &str) -> Result<()>;
}

/// One file per key under a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl PreferenceStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.path(key);
        if !path.exists() {
            return Ok(None);
        }
        let value = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read preference: {}", path.display()))?;
        Ok(Some(value))
    }

    fn write(&mut self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir).with_context(|| {
            format!("Failed to create preference directory: {}", self.dir.display())
        })?;
        let path = self.path(key);
        fs::write(&path, value)
            .with_context(|| format!("Failed to write preference: {}", path.display()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl PreferenceStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Stored view mode, or the default when missing or unreadable
pub fn load_preference(store: &impl PreferenceStore) -> ViewMode {
    match store.read(VIEW_MODE_KEY) {
        Ok(Some(value)) => value.parse().unwrap_or_else(|e| {
            tracing::debug!("Ignoring stored view mode: {}", e);
            ViewMode::default()
        }),
        Ok(None) => ViewMode::default(),
        Err(e) => {
            tracing::warn!("Failed to load view mode: {:#}", e);
            ViewMode::default()
        }
    }
}

/// Store the view mode; failures are logged and otherwise ignored
pub fn save_preference(store: &mut impl PreferenceStore, mode: ViewMode) {
    if let Err(e) = store.write(VIEW_MODE_KEY, mode.as_str()) {
        tracing::warn!("Failed to save view mode: {:#}", e);
    }
}
