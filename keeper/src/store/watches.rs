//! Typed view over the `watches` mapping.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, trace};

use super::{Document, KvStore, StoreError, WATCHES_KEY};
use crate::types::{Attempt, TabId, Watch, WatchId};

/// Mutable fields of a [`Watch`], each carrying its new value.
///
/// Identity fields (`id`, `url`, `intervalMinutes`, `addedAt`) are not
/// represented: changing them means removing and re-adding the watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchField {
    TabId(Option<TabId>),
    Title(Option<String>),
    CustomName(Option<String>),
    LastAttempt(Option<Attempt>),
    RefreshCount(u64),
}

impl WatchField {
    fn apply(self, watch: &mut Watch) {
        match self {
            Self::TabId(tab_id) => watch.tab_id = tab_id,
            Self::Title(title) => watch.title = title,
            Self::CustomName(name) => watch.custom_name = name,
            Self::LastAttempt(attempt) => watch.last_attempt = attempt,
            Self::RefreshCount(count) => watch.refresh_count = count,
        }
    }
}

/// Durable id→[`Watch`] mapping. Every call re-reads and rewrites the full
/// mapping; last write wins.
#[derive(Clone)]
pub struct WatchStore {
    store: Arc<dyn KvStore>,
}

impl std::fmt::Debug for WatchStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchStore").finish_non_exhaustive()
    }
}

impl WatchStore {
    #[must_use]
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Returns the watch with `id`, if any.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the store cannot be read or decoded.
    pub async fn get(&self, id: &WatchId) -> Result<Option<Watch>, StoreError> {
        let mut watches = self.load().await?;
        Ok(watches.remove(id))
    }

    /// Returns every watch keyed by id.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the store cannot be read or decoded.
    pub async fn get_all(&self) -> Result<BTreeMap<WatchId, Watch>, StoreError> {
        self.load().await
    }

    /// Inserts or replaces a watch.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the store cannot be read or written.
    pub async fn upsert(&self, watch: Watch) -> Result<(), StoreError> {
        let mut watches = self.load().await?;
        trace!(watch_id = %watch.id, "Upserting watch");
        watches.insert(watch.id.clone(), watch);
        self.save(&watches).await
    }

    /// Deletes a watch. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the store cannot be read or written.
    pub async fn remove(&self, id: &WatchId) -> Result<bool, StoreError> {
        let mut watches = self.load().await?;
        if watches.remove(id).is_none() {
            debug!(watch_id = %id, "Remove of unknown watch ignored");
            return Ok(false);
        }
        self.save(&watches).await?;
        Ok(true)
    }

    /// Sets a single field. Returns `false` without writing if the watch is gone.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the store cannot be read or written.
    pub async fn set_field(&self, id: &WatchId, field: WatchField) -> Result<bool, StoreError> {
        Ok(self.update(id, |watch| field.apply(watch)).await?.is_some())
    }

    /// Applies `f` to the stored watch and persists the result.
    ///
    /// Returns the updated watch, or `None` without writing anything if no
    /// watch with `id` exists. This is the only path that never resurrects a
    /// removed watch.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the store cannot be read or written.
    pub async fn update<F>(&self, id: &WatchId, f: F) -> Result<Option<Watch>, StoreError>
    where
        F: FnOnce(&mut Watch),
    {
        let mut batch = Document::new();
        let updated = self.stage_update(id, &mut batch, f).await?;
        if updated.is_some() {
            self.commit(batch).await?;
        }
        Ok(updated)
    }

    /// Like [`update`](Self::update), but places the rewritten mapping in
    /// `batch` instead of writing it. Nothing is staged if the watch is gone.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the store cannot be read or the mapping
    /// cannot be encoded.
    pub async fn stage_update<F>(
        &self,
        id: &WatchId,
        batch: &mut Document,
        f: F,
    ) -> Result<Option<Watch>, StoreError>
    where
        F: FnOnce(&mut Watch),
    {
        let mut watches = self.load().await?;
        let Some(watch) = watches.get_mut(id) else {
            return Ok(None);
        };
        f(watch);
        let updated = watch.clone();
        batch.insert(WATCHES_KEY.to_string(), serde_json::to_value(&watches)?);
        Ok(Some(updated))
    }

    /// Persists a staged batch in a single store write.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the store cannot be written.
    pub async fn commit(&self, batch: Document) -> Result<(), StoreError> {
        self.store.set(batch).await
    }

    async fn load(&self) -> Result<BTreeMap<WatchId, Watch>, StoreError> {
        let mut values = self.store.get(&[WATCHES_KEY]).await?;
        match values.remove(WATCHES_KEY) {
            Some(Value::Null) | None => Ok(BTreeMap::new()),
            Some(value) => Ok(serde_json::from_value(value)?),
        }
    }

    async fn save(&self, watches: &BTreeMap<WatchId, Watch>) -> Result<(), StoreError> {
        let mut partial = Document::new();
        partial.insert(WATCHES_KEY.to_string(), serde_json::to_value(watches)?);
        self.store.set(partial).await
    }
}
