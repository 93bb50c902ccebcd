//! Durable key/value storage and the typed views built on top of it.
//!
//! The [`KvStore`] trait is the narrow contract of the underlying persistence
//! facility: `get` a set of top-level keys, and `set` a partial document that
//! is merged into the stored one at the top level. Nothing above this layer
//! touches the raw document; all mutation goes through [`WatchStore`] and
//! [`HistoryLog`], each of which performs a full read-modify-write per call.
//!
//! # Layout
//!
//! ```text
//! {
//!   "watches": { "<id>": Watch, ... },
//!   "history": [ HistoryEntry, ... ]   // oldest first
//! }
//! ```

mod file;
mod history;
mod watches;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

pub use file::{FileStore, STORE_FILE_NAME};
pub use history::{HistoryLog, MAX_HISTORY};
pub use watches::{WatchField, WatchStore};

/// Top-level key holding the id→watch mapping.
pub const WATCHES_KEY: &str = "watches";

/// Top-level key holding the history ring.
pub const HISTORY_KEY: &str = "history";

/// A JSON object keyed by top-level store key.
pub type Document = Map<String, Value>;

/// Errors raised by the persistence layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored value could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The stored document is not a JSON object.
    #[error("corrupt store document: {0}")]
    Corrupt(String),
}

/// Key/value persistence facility with top-level merge semantics.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Returns the values stored under `keys`. Missing keys are omitted.
    async fn get(&self, keys: &[&str]) -> Result<Document, StoreError>;

    /// Merges `partial` into the stored document, replacing each given key.
    async fn set(&self, partial: Document) -> Result<(), StoreError>;
}

/// Seeds `{watches: {}, history: []}` for any key the store does not have yet.
///
/// Existing data is left untouched, so calling this on every start is safe.
///
/// # Errors
///
/// Propagates any [`StoreError`] from the underlying store.
pub async fn install(store: &dyn KvStore) -> Result<(), StoreError> {
    let existing = store.get(&[WATCHES_KEY, HISTORY_KEY]).await?;

    let mut seed = Document::new();
    if !existing.contains_key(WATCHES_KEY) {
        seed.insert(WATCHES_KEY.to_string(), Value::Object(Map::new()));
    }
    if !existing.contains_key(HISTORY_KEY) {
        seed.insert(HISTORY_KEY.to_string(), Value::Array(Vec::new()));
    }

    if seed.is_empty() {
        debug!("Store already initialized");
        return Ok(());
    }

    info!(keys = ?seed.keys().collect::<Vec<_>>(), "Seeding store");
    store.set(seed).await
}

/// In-memory [`KvStore`], used by tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    document: RwLock<Document>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the whole stored document.
    pub async fn snapshot(&self) -> Document {
        self.document.read().await.clone()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, keys: &[&str]) -> Result<Document, StoreError> {
        let document = self.document.read().await;
        Ok(select_keys(&document, keys))
    }

    async fn set(&self, partial: Document) -> Result<(), StoreError> {
        let mut document = self.document.write().await;
        document.extend(partial);
        Ok(())
    }
}

/// Copies the requested keys out of `document`.
pub(crate) fn select_keys(document: &Document, keys: &[&str]) -> Document {
    keys.iter()
        .filter_map(|key| {
            document
                .get(*key)
                .map(|value| ((*key).to_string(), value.clone()))
        })
        .collect()
}
