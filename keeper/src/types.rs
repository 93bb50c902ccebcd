//! Record types shared by the store, the engine and the command surface.
//!
//! All records serialize to camelCase JSON. Timestamps travel as Unix epoch
//! milliseconds so stored documents and command responses stay readable by
//! the presentation layer without conversion.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix for generated watch identifiers.
const WATCH_ID_PREFIX: &str = "w-";

/// Opaque, immutable identifier of a watch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WatchId(String);

impl WatchId {
    /// Wraps an existing identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh identifier of the form `w-<epoch millis>`.
    ///
    /// Two calls in the same millisecond collide; callers adding watches in a
    /// tight loop should supply their own identifiers.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("{WATCH_ID_PREFIX}{}", Utc::now().timestamp_millis()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WatchId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for WatchId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identifier of a browser tab as reported by the tab-control facility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub i64);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of a single refresh attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    /// A reload or a reopen was performed.
    Refreshed,
    /// The tab was focused, nothing was done.
    Skipped,
    /// Reserved for a concurrent-refresh guard. Never produced.
    Locked,
}

impl AttemptStatus {
    /// Returns the lowercase wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Refreshed => "refreshed",
            Self::Skipped => "skipped",
            Self::Locked => "locked",
        }
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The most recent attempt for a watch. Overwritten every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    pub status: AttemptStatus,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl Attempt {
    /// Creates an attempt stamped with the current time.
    #[must_use]
    pub fn now(status: AttemptStatus) -> Self {
        Self {
            status,
            timestamp: Utc::now(),
        }
    }
}

/// Payload of an `addWatch` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWatch {
    pub id: WatchId,
    pub url: String,
    #[serde(default)]
    pub tab_id: Option<TabId>,
    #[serde(default)]
    pub title: Option<String>,
    pub interval_minutes: u32,
}

/// A monitored tab or URL with its refresh schedule and counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Watch {
    pub id: WatchId,

    /// Immutable once created.
    pub url: String,

    /// Weak reference to the live tab; rebound whenever resolution moves it.
    #[serde(default)]
    pub tab_id: Option<TabId>,

    /// Last known display title, possibly stale.
    #[serde(default)]
    pub title: Option<String>,

    /// User override set only through rename.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_name: Option<String>,

    pub interval_minutes: u32,

    #[serde(default)]
    pub refresh_count: u64,

    #[serde(default)]
    pub last_attempt: Option<Attempt>,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub added_at: DateTime<Utc>,
}

impl Watch {
    /// Builds a fresh watch from an add payload, with zeroed counters.
    #[must_use]
    pub fn from_new(new: NewWatch, added_at: DateTime<Utc>) -> Self {
        Self {
            id: new.id,
            url: new.url,
            tab_id: new.tab_id,
            title: new.title,
            custom_name: None,
            interval_minutes: new.interval_minutes,
            refresh_count: 0,
            last_attempt: None,
            added_at,
        }
    }

    /// Name shown to the user: custom name, then title, then the URL.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name_or(&self.url)
    }

    /// Custom name, then title, then `fallback`.
    #[must_use]
    pub fn name_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        [self.custom_name.as_deref(), self.title.as_deref()]
            .into_iter()
            .flatten()
            .find(|s| !s.is_empty())
            .unwrap_or(fallback)
    }
}

/// Immutable record of one completed refresh or reopen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub watch_id: WatchId,
    pub url: String,
    pub title: String,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,

    pub status: AttemptStatus,
}

/// A tab as reported by the tab-control facility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    pub id: TabId,

    /// Whether the tab is the focused tab of its window.
    #[serde(default)]
    pub active: bool,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub url: Option<String>,
}
