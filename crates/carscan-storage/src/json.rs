//! Generic JSON document collection.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::path::PathBuf;
use tokio::sync::Mutex;

use crate::error::{StorageError, StorageResult};

/// One on-disk collection: a JSON object mapping record id to record.
///
/// All mutation happens under an internal lock as load-modify-write, which
/// is sufficient because every record has exactly one concurrent writer
/// (last-writer-wins by design).
pub struct JsonCollection<T> {
    path: PathBuf,
    lock: Mutex<()>,
    _marker: PhantomData<T>,
}

impl<T> JsonCollection<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    /// Open (and bootstrap, if missing) a collection file.
    pub async fn open(path: PathBuf) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        if tokio::fs::metadata(&path).await.is_err() {
            tokio::fs::write(&path, b"{}").await?;
        }

        Ok(Self {
            path,
            lock: Mutex::new(()),
            _marker: PhantomData,
        })
    }

    async fn read_map(&self) -> StorageResult<HashMap<String, T>> {
        let bytes = tokio::fs::read(&self.path).await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| StorageError::corrupt(format!("{}: {e}", self.path.display())))
    }

    async fn write_map(&self, map: &HashMap<String, T>) -> StorageResult<()> {
        let bytes = serde_json::to_vec_pretty(map)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Insert or overwrite a record.
    pub async fn put(&self, id: &str, value: &T) -> StorageResult<()> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_map().await?;
        map.insert(id.to_string(), value.clone());
        self.write_map(&map).await
    }

    /// Overwrite an existing record; fails `NotFound` when absent.
    pub async fn replace(&self, id: &str, value: &T) -> StorageResult<()> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_map().await?;
        if !map.contains_key(id) {
            return Err(StorageError::not_found(id));
        }
        map.insert(id.to_string(), value.clone());
        self.write_map(&map).await
    }

    /// Fetch one record by id.
    pub async fn get(&self, id: &str) -> StorageResult<Option<T>> {
        let _guard = self.lock.lock().await;
        let map = self.read_map().await?;
        Ok(map.get(id).cloned())
    }

    /// All records, in unspecified order.
    pub async fn all(&self) -> StorageResult<Vec<T>> {
        let _guard = self.lock.lock().await;
        let map = self.read_map().await?;
        Ok(map.into_values().collect())
    }
}
