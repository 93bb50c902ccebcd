//! Bounded ring of refresh records.

use std::sync::Arc;

use serde_json::Value;
use tracing::trace;

use super::{Document, KvStore, StoreError, HISTORY_KEY};
use crate::types::HistoryEntry;

/// Default number of entries retained.
pub const MAX_HISTORY: usize = 300;

/// Append-only history with drop-oldest truncation.
#[derive(Clone)]
pub struct HistoryLog {
    store: Arc<dyn KvStore>,
    capacity: usize,
}

impl std::fmt::Debug for HistoryLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryLog")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl HistoryLog {
    /// Creates a log holding at most [`MAX_HISTORY`] entries.
    #[must_use]
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self::with_capacity(store, MAX_HISTORY)
    }

    /// Creates a log with a custom capacity. A capacity of zero is raised to one.
    #[must_use]
    pub fn with_capacity(store: Arc<dyn KvStore>, capacity: usize) -> Self {
        Self {
            store,
            capacity: capacity.max(1),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends `entry` and evicts the oldest entries beyond capacity.
    ///
    /// Returns the number of entries evicted.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the store cannot be read or written.
    pub async fn append(&self, entry: HistoryEntry) -> Result<usize, StoreError> {
        let mut batch = Document::new();
        let evicted = self.stage_append(entry, &mut batch).await?;
        self.store.set(batch).await?;
        Ok(evicted)
    }

    /// Like [`append`](Self::append), but places the truncated ring in
    /// `batch` instead of writing it.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the store cannot be read or the ring
    /// cannot be encoded.
    pub async fn stage_append(
        &self,
        entry: HistoryEntry,
        batch: &mut Document,
    ) -> Result<usize, StoreError> {
        let mut history = self.load().await?;
        history.push(entry);

        let evicted = history.len().saturating_sub(self.capacity);
        if evicted > 0 {
            history.drain(..evicted);
            trace!(evicted, "History ring truncated");
        }

        batch.insert(HISTORY_KEY.to_string(), serde_json::to_value(&history)?);
        Ok(evicted)
    }

    /// Returns all entries, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the store cannot be read or decoded.
    pub async fn get_all(&self) -> Result<Vec<HistoryEntry>, StoreError> {
        self.load().await
    }

    /// Removes every entry.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the store cannot be written.
    pub async fn clear(&self) -> Result<(), StoreError> {
        self.save(&[]).await
    }

    async fn load(&self) -> Result<Vec<HistoryEntry>, StoreError> {
        let mut values = self.store.get(&[HISTORY_KEY]).await?;
        match values.remove(HISTORY_KEY) {
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(value) => Ok(serde_json::from_value(value)?),
        }
    }

    async fn save(&self, history: &[HistoryEntry]) -> Result<(), StoreError> {
        let mut partial = Document::new();
        partial.insert(HISTORY_KEY.to_string(), serde_json::to_value(history)?);
        self.store.set(partial).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::{AttemptStatus, WatchId};
    use chrono::Utc;

    fn entry(n: usize) -> HistoryEntry {
        HistoryEntry {
            watch_id: WatchId::from("w-1"),
            url: format!("https://example.com/{n}"),
            title: format!("page {n}"),
            timestamp: Utc::now(),
            status: AttemptStatus::Refreshed,
        }
    }

    #[tokio::test]
    async fn empty_log_returns_no_entries() {
        let log = HistoryLog::new(Arc::new(MemoryStore::new()));
        assert!(log.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn append_preserves_order() {
        let log = HistoryLog::new(Arc::new(MemoryStore::new()));
        for n in 0..3 {
            log.append(entry(n)).await.unwrap();
        }

        let titles: Vec<_> = log
            .get_all()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.title)
            .collect();
        assert_eq!(titles, vec!["page 0", "page 1", "page 2"]);
    }

    #[tokio::test]
    async fn overflow_evicts_oldest_first() {
        let log = HistoryLog::new(Arc::new(MemoryStore::new()));
        for n in 0..MAX_HISTORY {
            assert_eq!(log.append(entry(n)).await.unwrap(), 0);
        }

        let evicted = log.append(entry(MAX_HISTORY)).await.unwrap();
        assert_eq!(evicted, 1);

        let all = log.get_all().await.unwrap();
        assert_eq!(all.len(), MAX_HISTORY);
        let expected: Vec<String> = (1..=MAX_HISTORY).map(|n| format!("page {n}")).collect();
        let titles: Vec<String> = all.into_iter().map(|e| e.title).collect();
        assert_eq!(titles, expected);
    }

    #[tokio::test]
    async fn custom_capacity_is_honoured() {
        let log = HistoryLog::with_capacity(Arc::new(MemoryStore::new()), 2);
        for n in 0..5 {
            log.append(entry(n)).await.unwrap();
        }

        let titles: Vec<_> = log
            .get_all()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.title)
            .collect();
        assert_eq!(titles, vec!["page 3", "page 4"]);
    }

    #[tokio::test]
    async fn clear_empties_log() {
        let log = HistoryLog::new(Arc::new(MemoryStore::new()));
        log.append(entry(0)).await.unwrap();
        log.clear().await.unwrap();
        assert!(log.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stage_append_writes_nothing_until_committed() {
        let store = Arc::new(MemoryStore::new());
        let log = HistoryLog::with_capacity(store.clone(), 2);
        log.append(entry(0)).await.unwrap();
        log.append(entry(1)).await.unwrap();

        let mut batch = Document::new();
        let evicted = log.stage_append(entry(2), &mut batch).await.unwrap();
        assert_eq!(evicted, 1);
        assert_eq!(log.get_all().await.unwrap().len(), 2);
        assert_eq!(log.get_all().await.unwrap()[0].title, "page 0");

        store.set(batch).await.unwrap();
        let titles: Vec<_> = log
            .get_all()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.title)
            .collect();
        assert_eq!(titles, vec!["page 1", "page 2"]);
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let log = HistoryLog::with_capacity(Arc::new(MemoryStore::new()), 0);
        assert_eq!(log.capacity(), 1);
    }
}
