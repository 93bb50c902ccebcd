//! Per-cycle refresh decision.
//!
//! | resolution | tab focused | decision | status | counts |
//! |------------|-------------|----------|--------|--------|
//! | absent | - | reopen | refreshed | yes |
//! | live | yes | skip | skipped | no |
//! | live | no | refresh | refreshed | yes |
//!
//! Focus is read from the tab returned by this cycle's resolution, never
//! from anything cached on the watch.

use crate::resolver::Resolution;
use crate::types::{AttemptStatus, Tab};

/// What a cycle should do to the watched tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Open a new tab at the watch URL and bind it.
    Reopen,
    /// Leave the focused tab alone.
    Skip { tab: Tab },
    /// Reload the background tab in place.
    Refresh { tab: Tab },
}

impl Decision {
    /// Status recorded as the watch's last attempt.
    #[must_use]
    pub fn status(&self) -> AttemptStatus {
        match self {
            Self::Reopen | Self::Refresh { .. } => AttemptStatus::Refreshed,
            Self::Skip { .. } => AttemptStatus::Skipped,
        }
    }
}

/// Decides what to do with a resolved watch.
#[must_use]
pub fn decide(resolution: Resolution) -> Decision {
    match resolution {
        Resolution::Absent => Decision::Reopen,
        Resolution::Live { tab, .. } if tab.active => Decision::Skip { tab },
        Resolution::Live { tab, .. } => Decision::Refresh { tab },
    }
}
