//! Persisting the result of a refresh cycle.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::store::{Document, HistoryLog, StoreError, WatchStore};
use crate::types::{Attempt, AttemptStatus, HistoryEntry, Tab, Watch, WatchId};

/// What a cycle actually did, with the tab the watch is bound to afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A background tab was reloaded in place.
    Refreshed { tab: Tab },
    /// The tab was gone and a new one was opened at the watch URL.
    Reopened { tab: Tab },
    /// The tab was focused and left alone.
    Skipped { tab: Tab },
}

impl Outcome {
    #[must_use]
    pub fn tab(&self) -> &Tab {
        match self {
            Self::Refreshed { tab } | Self::Reopened { tab } | Self::Skipped { tab } => tab,
        }
    }

    #[must_use]
    pub fn status(&self) -> AttemptStatus {
        match self {
            Self::Refreshed { .. } | Self::Reopened { .. } => AttemptStatus::Refreshed,
            Self::Skipped { .. } => AttemptStatus::Skipped,
        }
    }

    /// Whether the outcome counts toward `refreshCount` and is logged to history.
    #[must_use]
    pub fn is_action(&self) -> bool {
        !matches!(self, Self::Skipped { .. })
    }
}

/// Applies cycle outcomes to the watch store and history log.
#[derive(Debug, Clone)]
pub struct ReconciliationWriter {
    watches: WatchStore,
    history: HistoryLog,
}

impl ReconciliationWriter {
    #[must_use]
    pub fn new(watches: WatchStore, history: HistoryLog) -> Self {
        Self { watches, history }
    }

    /// Records `outcome` for watch `id` at time `at`.
    ///
    /// The watch is re-read right before writing. If it was removed while the
    /// cycle was in flight the outcome is dropped and `None` is returned: no
    /// field is written and no history entry is appended.
    ///
    /// The watch update and the history append land in one store write, so
    /// a counted refresh always has its history entry.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the store cannot be read or written. On a
    /// failed write neither the watch nor the history changes.
    pub async fn apply(
        &self,
        id: &WatchId,
        outcome: &Outcome,
        at: DateTime<Utc>,
    ) -> Result<Option<Watch>, StoreError> {
        let tab = outcome.tab();
        let status = outcome.status();
        let mut batch = Document::new();

        let updated = self
            .watches
            .stage_update(id, &mut batch, |watch| {
                watch.tab_id = Some(tab.id);
                watch.last_attempt = Some(Attempt {
                    status,
                    timestamp: at,
                });
                if outcome.is_action() {
                    watch.refresh_count += 1;
                }
            })
            .await?;

        let Some(watch) = updated else {
            debug!(watch_id = %id, status = %status, "Watch removed mid-cycle, dropping outcome");
            return Ok(None);
        };

        if outcome.is_action() {
            let entry = HistoryEntry {
                watch_id: watch.id.clone(),
                url: watch.url.clone(),
                title: history_title(outcome, &watch),
                timestamp: at,
                status,
            };
            let evicted = self.history.stage_append(entry, &mut batch).await?;
            if evicted > 0 {
                debug!(evicted, "History ring full, evicted oldest entries");
            }
        }

        self.watches.commit(batch).await?;
        Ok(Some(watch))
    }
}

/// Title recorded in history.
///
/// A refreshed tab reports its live title. A reopened tab was just created
/// and still carries a placeholder, so only the watch title and URL count.
fn history_title(outcome: &Outcome, watch: &Watch) -> String {
    let live = match outcome {
        Outcome::Refreshed { tab } | Outcome::Skipped { tab } => tab.title.as_deref(),
        Outcome::Reopened { .. } => None,
    };
    [live, watch.title.as_deref(), Some(watch.url.as_str())]
        .into_iter()
        .flatten()
        .find(|s| !s.is_empty())
        .unwrap_or_default()
        .to_string()
}
