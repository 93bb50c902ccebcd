//! The command surface.
//!
//! Requests are JSON objects tagged by `action`:
//!
//! ```json
//! {"action": "addWatch", "watch": {"id": "w-1", "url": "https://example.com", "tabId": 42, "title": "Example", "intervalMinutes": 5}}
//! {"action": "removeWatch", "id": "w-1"}
//! {"action": "getWatches"}
//! {"action": "renameWatch", "id": "w-1", "name": "Dashboard"}
//! {"action": "getHistory"}
//! {"action": "clearHistory"}
//! ```
//!
//! Mutating commands answer `{"success": true}`, `getWatches` answers the
//! id→watch mapping and `getHistory` the entries oldest first. Commands on
//! unknown ids are silent no-ops that still report success.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{HistoryEntry, NewWatch, Watch, WatchId};

/// Smallest accepted refresh interval, in minutes.
pub const MIN_INTERVAL_MINUTES: u32 = 1;

/// Largest accepted refresh interval, in minutes (one day).
pub const MAX_INTERVAL_MINUTES: u32 = 1440;

/// A request to the keeper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Command {
    AddWatch { watch: NewWatch },
    RemoveWatch { id: WatchId },
    GetWatches,
    RenameWatch { id: WatchId, name: String },
    GetHistory,
    ClearHistory,
}

impl Command {
    /// Wire name of the command, for logging.
    #[must_use]
    pub fn action(&self) -> &'static str {
        match self {
            Self::AddWatch { .. } => "addWatch",
            Self::RemoveWatch { .. } => "removeWatch",
            Self::GetWatches => "getWatches",
            Self::RenameWatch { .. } => "renameWatch",
            Self::GetHistory => "getHistory",
            Self::ClearHistory => "clearHistory",
        }
    }

    /// Checks payload values that the type system cannot.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::AddWatch { watch } => {
                require_id(&watch.id)?;
                if watch.url.trim().is_empty() {
                    return Err(ValidationError::EmptyUrl);
                }
                if !(MIN_INTERVAL_MINUTES..=MAX_INTERVAL_MINUTES)
                    .contains(&watch.interval_minutes)
                {
                    return Err(ValidationError::IntervalOutOfRange(watch.interval_minutes));
                }
                Ok(())
            }
            Self::RemoveWatch { id } => require_id(id),
            Self::RenameWatch { id, name } => {
                require_id(id)?;
                if name.trim().is_empty() {
                    return Err(ValidationError::EmptyName);
                }
                Ok(())
            }
            Self::GetWatches | Self::GetHistory | Self::ClearHistory => Ok(()),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.action())
    }
}

fn require_id(id: &WatchId) -> Result<(), ValidationError> {
    if id.as_str().trim().is_empty() {
        return Err(ValidationError::EmptyId);
    }
    Ok(())
}

/// Reply to a [`Command`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Ack { success: bool },
    Watches(BTreeMap<WatchId, Watch>),
    History(Vec<HistoryEntry>),
}

impl Response {
    #[must_use]
    pub fn ok() -> Self {
        Self::Ack { success: true }
    }
}

/// Malformed command payloads.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("watch id must not be empty")]
    EmptyId,

    #[error("watch url must not be empty")]
    EmptyUrl,

    #[error("intervalMinutes must be between 1 and 1440, got {0}")]
    IntervalOutOfRange(u32),

    #[error("name must not be empty")]
    EmptyName,
}

impl ValidationError {
    /// Machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyId => "empty_id",
            Self::EmptyUrl => "empty_url",
            Self::IntervalOutOfRange(_) => "invalid_interval",
            Self::EmptyName => "empty_name",
        }
    }
}
