//! Mapping a watch to the live tab it refers to.
//!
//! A watch's `tabId` is only a hint: the tab may have been closed since the
//! last cycle, or never captured at all when the watch was added from a bare
//! URL. Resolution therefore has two paths:
//!
//! 1. With a cached id, ask for that tab. "Not found" means absent; there is
//!    no fallback to URL lookup on this path.
//! 2. Without one, look the URL up among open tabs and take the first match.
//!    The caller persists the rebinding together with the cycle's outcome.

use std::sync::Arc;

use tracing::debug;

use crate::tabs::{TabControl, TabError};
use crate::types::{Tab, TabId, Watch};

/// Where a watch's target tab currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The tab exists. `rebound` is set when it was found by URL rather than
    /// by the cached id.
    Live { tab: Tab, rebound: bool },
    /// No tab could be found.
    Absent,
}

impl Resolution {
    /// Id of the resolved tab, if live.
    #[must_use]
    pub fn tab_id(&self) -> Option<TabId> {
        match self {
            Self::Live { tab, .. } => Some(tab.id),
            Self::Absent => None,
        }
    }
}

/// Resolves watches against a tab-control facility.
#[derive(Clone)]
pub struct TabResolver {
    tabs: Arc<dyn TabControl>,
}

impl std::fmt::Debug for TabResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TabResolver").finish_non_exhaustive()
    }
}

impl TabResolver {
    #[must_use]
    pub fn new(tabs: Arc<dyn TabControl>) -> Self {
        Self { tabs }
    }

    /// Resolves `watch` to a live tab or [`Resolution::Absent`].
    ///
    /// # Errors
    ///
    /// Returns the facility's error for anything other than a definitive
    /// "not found"; the cycle should be abandoned without side effects.
    pub async fn resolve(&self, watch: &Watch) -> Result<Resolution, TabError> {
        if let Some(tab_id) = watch.tab_id {
            return match self.tabs.get(tab_id).await {
                Ok(tab) => Ok(Resolution::Live {
                    tab,
                    rebound: false,
                }),
                Err(e) if e.is_not_found() => {
                    debug!(watch_id = %watch.id, tab_id = %tab_id, "Cached tab is gone");
                    Ok(Resolution::Absent)
                }
                Err(e) => Err(e),
            };
        }

        let mut matches = self.tabs.query(&watch.url).await?;
        if matches.is_empty() {
            debug!(watch_id = %watch.id, url = %watch.url, "No open tab matches URL");
            return Ok(Resolution::Absent);
        }

        let tab = matches.swap_remove(0);
        debug!(watch_id = %watch.id, tab_id = %tab.id, "Rebound watch by URL");
        Ok(Resolution::Live { tab, rebound: true })
    }
}
