//! Tab/window control facility.
//!
//! The engine never talks to a browser directly. It calls through
//! [`TabControl`], which has two implementations:
//!
//! - [`HttpTabBridge`]: JSON over HTTP to a browser-side bridge
//! - [`MemoryTabs`]: an in-process simulated browser

mod bridge;
mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{Tab, TabId};

pub use bridge::HttpTabBridge;
pub use memory::MemoryTabs;

/// Errors reported by a tab-control facility.
#[derive(Error, Debug)]
pub enum TabError {
    /// The tab does not exist (closed or never opened).
    #[error("tab {0} not found")]
    NotFound(TabId),

    /// The request to the bridge could not be completed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The bridge answered with an unexpected status.
    #[error("bridge error: {status} - {message}")]
    Status { status: u16, message: String },
}

impl TabError {
    /// Whether this is a definitive "tab does not exist" answer.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Narrow contract of the tab-control facility.
#[async_trait]
pub trait TabControl: Send + Sync {
    /// Returns the current state of a tab.
    async fn get(&self, id: TabId) -> Result<Tab, TabError>;

    /// Returns all open tabs whose URL equals `url` exactly.
    async fn query(&self, url: &str) -> Result<Vec<Tab>, TabError>;

    /// Reloads a tab in place.
    async fn reload(&self, id: TabId) -> Result<(), TabError>;

    /// Opens a new tab at `url`.
    async fn create(&self, url: &str) -> Result<Tab, TabError>;
}
