//! Error types for tabkeeper.
//!
//! Each layer has its own `thiserror` enum ([`StoreError`], [`TabError`],
//! [`ConfigError`]); [`KeeperError`] wraps them for callers that drive the
//! whole engine.

use thiserror::Error;

use crate::config::ConfigError;
use crate::store::StoreError;
use crate::tabs::TabError;

/// Errors that can occur while running the keeper.
///
/// # Examples
///
/// ```ignore
/// use tabkeeper::error::Result;
///
/// async fn count(keeper: &tabkeeper::Keeper) -> Result<usize> {
///     Ok(keeper.get_watches().await?.len())
/// }
/// ```
#[derive(Error, Debug)]
pub enum KeeperError {
    /// Configuration-related error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Durable store could not be read or written.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Tab-control facility failed for a reason other than "not found".
    #[error("tab control error: {0}")]
    Tab(#[from] TabError),

    /// The dispatcher task has stopped and no longer accepts commands.
    #[error("keeper is shut down")]
    Shutdown,
}

/// Result type alias using [`KeeperError`].
pub type Result<T> = std::result::Result<T, KeeperError>;
