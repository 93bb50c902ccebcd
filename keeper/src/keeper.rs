//! The refresh engine.
//!
//! [`Keeper`] owns the store views, the timer table and the tab collaborator,
//! and implements both the command surface and the per-watch refresh cycle:
//!
//! ```text
//! timer fire -> resolve tab -> decide -> act on tab -> persist outcome
//! ```
//!
//! Every method takes `&mut self` or `&self` on a single owner; the
//! [`service`](crate::service) dispatcher is that owner and runs operations
//! one at a time.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::commands::{Command, Response};
use crate::decision::{decide, Decision};
use crate::error::Result;
use crate::reconcile::{Outcome, ReconciliationWriter};
use crate::resolver::TabResolver;
use crate::store::{HistoryLog, KvStore, WatchField, WatchStore};
use crate::tabs::TabControl;
use crate::timers::TimerBinding;
use crate::types::{HistoryEntry, NewWatch, Watch, WatchId};

/// Result of one completed refresh cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub outcome: Outcome,
    /// The watch as persisted after the cycle.
    pub watch: Watch,
}

/// Owner of all refresh state.
pub struct Keeper {
    watches: WatchStore,
    history: HistoryLog,
    timers: TimerBinding,
    resolver: TabResolver,
    tabs: Arc<dyn TabControl>,
    writer: ReconciliationWriter,
}

impl std::fmt::Debug for Keeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keeper")
            .field("watches", &self.watches)
            .field("history", &self.history)
            .field("timers", &self.timers)
            .finish_non_exhaustive()
    }
}

impl Keeper {
    /// Builds a keeper over an installed store.
    #[must_use]
    pub fn new(
        store: Arc<dyn KvStore>,
        tabs: Arc<dyn TabControl>,
        timers: TimerBinding,
        history_capacity: usize,
    ) -> Self {
        let watches = WatchStore::new(store.clone());
        let history = HistoryLog::with_capacity(store, history_capacity);
        let writer = ReconciliationWriter::new(watches.clone(), history.clone());

        Self {
            watches,
            history,
            timers,
            resolver: TabResolver::new(tabs.clone()),
            tabs,
            writer,
        }
    }

    /// Timer table, for inspection.
    #[must_use]
    pub fn timers(&self) -> &TimerBinding {
        &self.timers
    }

    /// Schedules a timer for every persisted watch. Returns how many.
    ///
    /// Timers live in-process, so this runs once on startup.
    ///
    /// # Errors
    ///
    /// Returns an error if the watch mapping cannot be read.
    pub async fn restore_timers(&mut self) -> Result<usize> {
        let watches = self.watches.get_all().await?;
        for watch in watches.values() {
            self.timers.schedule(&watch.id, watch.interval_minutes);
        }
        info!(count = watches.len(), "Restored watch timers");
        Ok(watches.len())
    }

    /// Dispatches a command.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or written.
    pub async fn handle(&mut self, command: Command) -> Result<Response> {
        match command {
            Command::AddWatch { watch } => {
                self.add_watch(watch).await?;
                Ok(Response::ok())
            }
            Command::RemoveWatch { id } => {
                self.remove_watch(&id).await?;
                Ok(Response::ok())
            }
            Command::GetWatches => Ok(Response::Watches(self.get_watches().await?)),
            Command::RenameWatch { id, name } => {
                self.rename_watch(&id, name).await?;
                Ok(Response::ok())
            }
            Command::GetHistory => Ok(Response::History(self.get_history().await?)),
            Command::ClearHistory => {
                self.clear_history().await?;
                Ok(Response::ok())
            }
        }
    }

    /// Stores a fresh watch and starts its timer.
    ///
    /// Adding an id that already exists replaces it, resetting its counters
    /// and rescheduling its timer.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written. No timer is
    /// scheduled in that case.
    pub async fn add_watch(&mut self, new: NewWatch) -> Result<()> {
        let watch = Watch::from_new(new, Utc::now());
        let id = watch.id.clone();
        let interval = watch.interval_minutes;

        self.watches.upsert(watch).await?;
        self.timers.schedule(&id, interval);

        info!(watch_id = %id, interval_minutes = interval, "Watch added");
        Ok(())
    }

    /// Deletes the watch and cancels its timer. Unknown ids are a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written. The watch and its
    /// timer are both kept in that case.
    pub async fn remove_watch(&mut self, id: &WatchId) -> Result<()> {
        let existed = self.watches.remove(id).await?;
        self.timers.cancel(id);
        if existed {
            info!(watch_id = %id, "Watch removed");
        } else {
            debug!(watch_id = %id, "Remove for unknown watch");
        }
        Ok(())
    }

    /// Returns every watch keyed by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn get_watches(&self) -> Result<BTreeMap<WatchId, Watch>> {
        Ok(self.watches.get_all().await?)
    }

    /// Sets the custom display name of a watch. Unknown ids are a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub async fn rename_watch(&self, id: &WatchId, name: String) -> Result<()> {
        let found = self
            .watches
            .set_field(id, WatchField::CustomName(Some(name)))
            .await?;
        if found {
            info!(watch_id = %id, "Watch renamed");
        } else {
            debug!(watch_id = %id, "Rename for unknown watch");
        }
        Ok(())
    }

    /// Returns the refresh history, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn get_history(&self) -> Result<Vec<HistoryEntry>> {
        Ok(self.history.get_all().await?)
    }

    /// Empties the history. Watches are untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub async fn clear_history(&self) -> Result<()> {
        self.history.clear().await?;
        info!("History cleared");
        Ok(())
    }

    /// Runs one refresh cycle for `id`.
    ///
    /// Returns `None` if the watch no longer exists, either before the cycle
    /// starts or by the time its outcome is persisted.
    ///
    /// # Errors
    ///
    /// Returns an error if the tab-control facility fails with anything but
    /// "not found", or if the store fails. Nothing is persisted on a tab
    /// error; the next fire retries.
    pub async fn run_cycle(&self, id: &WatchId) -> Result<Option<CycleReport>> {
        let Some(watch) = self.watches.get(id).await? else {
            debug!(watch_id = %id, "Fire for unknown watch, ignoring");
            return Ok(None);
        };

        let resolution = self.resolver.resolve(&watch).await?;
        let decision = decide(resolution);
        debug!(watch_id = %id, status = %decision.status(), decision = ?decision, "Cycle decided");

        let outcome = match decision {
            Decision::Skip { tab } => Outcome::Skipped { tab },
            Decision::Refresh { tab } => match self.tabs.reload(tab.id).await {
                Ok(()) => Outcome::Refreshed { tab },
                Err(e) if e.is_not_found() => {
                    debug!(watch_id = %id, tab_id = %tab.id, "Tab closed before reload, reopening");
                    self.reopen(&watch).await?
                }
                Err(e) => return Err(e.into()),
            },
            Decision::Reopen => self.reopen(&watch).await?,
        };

        let Some(watch) = self.writer.apply(id, &outcome, Utc::now()).await? else {
            return Ok(None);
        };

        info!(
            watch_id = %id,
            tab_id = %outcome.tab().id,
            status = %outcome.status(),
            refresh_count = watch.refresh_count,
            "Cycle completed"
        );
        Ok(Some(CycleReport { outcome, watch }))
    }

    async fn reopen(&self, watch: &Watch) -> Result<Outcome> {
        let tab = self.tabs.create(&watch.url).await?;
        debug!(watch_id = %watch.id, tab_id = %tab.id, "Opened replacement tab");
        Ok(Outcome::Reopened { tab })
    }

    /// Cancels every timer.
    pub fn shutdown(&mut self) {
        let count = self.timers.scheduled_count();
        self.timers.cancel_all();
        info!(count, "Watch timers cancelled");
    }
}
