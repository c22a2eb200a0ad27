//! Key-value contract and the in-memory backend.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::StoreError;

/// Default per-record ceiling, matching typical edge KV limits.
pub const DEFAULT_MAX_RECORD_BYTES: usize = 64 * 1024;

/// Blob storage with a hard per-record size ceiling.
///
/// `put` and `compare_and_put` reject blobs larger than
/// [`KvStore::max_record_bytes`] with [`StoreError::RecordTooLarge`].
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    async fn put(&self, key: &str, blob: &[u8]) -> Result<(), StoreError>;

    /// Keys starting with `prefix`, in ascending order.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Write `blob` only if the current value equals `expected` (`None`
    /// meaning the key must not exist). Returns `false` when the
    /// precondition failed and nothing was written.
    async fn compare_and_put(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        blob: &[u8],
    ) -> Result<bool, StoreError>;

    fn max_record_bytes(&self) -> usize;
}

pub(crate) fn check_size(key: &str, blob: &[u8], limit: usize) -> Result<(), StoreError> {
    if blob.len() > limit {
        return Err(StoreError::RecordTooLarge {
            key: key.to_string(),
            size: blob.len(),
            limit,
        });
    }
    Ok(())
}

/// Process-local store, used by tests and dry runs.
#[derive(Debug)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<String, Vec<u8>>>,
    max_record_bytes: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RECORD_BYTES)
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new(max_record_bytes: usize) -> Self {
        Self {
            records: Mutex::new(BTreeMap::new()),
            max_record_bytes,
        }
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.records.lock().await.get(key).cloned())
    }

    async fn put(&self, key: &str, blob: &[u8]) -> Result<(), StoreError> {
        check_size(key, blob, self.max_record_bytes)?;
        self.records
            .lock()
            .await
            .insert(key.to_string(), blob.to_vec());
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .records
            .lock()
            .await
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.records.lock().await.remove(key);
        Ok(())
    }

    async fn compare_and_put(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        blob: &[u8],
    ) -> Result<bool, StoreError> {
        check_size(key, blob, self.max_record_bytes)?;
        let mut records = self.records.lock().await;
        if records.get(key).map(Vec::as_slice) != expected {
            return Ok(false);
        }
        records.insert(key.to_string(), blob.to_vec());
        Ok(true)
    }

    fn max_record_bytes(&self) -> usize {
        self.max_record_bytes
    }
}
