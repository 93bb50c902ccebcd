//! JSON-file backed [`KvStore`].
//!
//! The whole document lives in a single file. Writes go to a sibling
//! temporary file which is then renamed over the original, so a crash
//! mid-write leaves either the old or the new document on disk, never a
//! truncated one.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use super::{select_keys, Document, KvStore, StoreError};

/// File name used inside the data directory.
pub const STORE_FILE_NAME: &str = "store.json";

/// Durable store persisting one JSON document to disk.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    /// Serializes read-merge-write sequences within this process.
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Opens (or prepares to create) the store at `path`.
    ///
    /// The parent directory is created if it does not exist. The file itself
    /// is only created on the first write.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the parent directory cannot be created.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        debug!(path = %path.display(), "Opened file store");
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    /// Opens `store.json` inside `dir`.
    ///
    /// # Errors
    ///
    /// See [`FileStore::open`].
    pub async fn in_dir(dir: &Path) -> Result<Self, StoreError> {
        Self::open(dir.join(STORE_FILE_NAME)).await
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_document(&self) -> Result<Document, StoreError> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Document::new()),
            Err(e) => return Err(e.into()),
        };

        if contents.trim().is_empty() {
            return Ok(Document::new());
        }

        match serde_json::from_str::<Value>(&contents)? {
            Value::Object(document) => Ok(document),
            other => Err(StoreError::Corrupt(format!(
                "expected a JSON object at top level, found {}",
                json_kind(&other)
            ))),
        }
    }

    async fn write_document(&self, document: &Document) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(document)?;
        let tmp = self.path.with_extension("json.tmp");

        fs::write(&tmp, &json).await?;
        fs::rename(&tmp, &self.path).await?;

        trace!(path = %self.path.display(), bytes = json.len(), "Store written");
        Ok(())
    }
}

#[async_trait]
impl KvStore for FileStore {
    async fn get(&self, keys: &[&str]) -> Result<Document, StoreError> {
        let document = self.read_document().await?;
        Ok(select_keys(&document, keys))
    }

    async fn set(&self, partial: Document) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.read_document().await?;
        document.extend(partial);
        self.write_document(&document).await
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{install, HISTORY_KEY, WATCHES_KEY};
    use serde_json::json;
    use tempfile::TempDir;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::in_dir(dir.path()).await.unwrap();

        let values = store.get(&[WATCHES_KEY]).await.unwrap();
        assert!(values.is_empty());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn set_persists_across_instances() {
        let dir = TempDir::new().unwrap();
        {
            let store = FileStore::in_dir(dir.path()).await.unwrap();
            install(&store).await.unwrap();
            store
                .set(doc(json!({"history": [{"n": 1}]})))
                .await
                .unwrap();
        }

        let reopened = FileStore::in_dir(dir.path()).await.unwrap();
        let values = reopened.get(&[WATCHES_KEY, HISTORY_KEY]).await.unwrap();
        assert_eq!(values[WATCHES_KEY], json!({}));
        assert_eq!(values[HISTORY_KEY], json!([{"n": 1}]));
    }

    #[tokio::test]
    async fn open_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b").join("store.json");

        let store = FileStore::open(&nested).await.unwrap();
        store.set(doc(json!({"watches": {}}))).await.unwrap();

        assert!(nested.exists());
        assert!(!nested.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn non_object_document_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::in_dir(dir.path()).await.unwrap();
        std::fs::write(store.path(), "[1, 2, 3]").unwrap();

        let err = store.get(&[WATCHES_KEY]).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(ref msg) if msg.contains("array")));
    }

    #[tokio::test]
    async fn invalid_json_is_reported() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::in_dir(dir.path()).await.unwrap();
        std::fs::write(store.path(), "{ not json").unwrap();

        let err = store.get(&[WATCHES_KEY]).await.unwrap_err();
        assert!(matches!(err, StoreError::Json(_)));
    }
}
