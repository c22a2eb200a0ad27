//! Postgres-backed [`KvStore`] over the `kv_records` table.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::kv::{check_size, KvStore, DEFAULT_MAX_RECORD_BYTES};
use crate::StoreError;

#[derive(Debug, Clone)]
pub struct PgKvStore {
    pool: PgPool,
    max_record_bytes: usize,
}

impl PgKvStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self::with_max_record_bytes(pool, DEFAULT_MAX_RECORD_BYTES)
    }

    /// The ceiling is enforced client-side; the table itself accepts any
    /// size.
    #[must_use]
    pub fn with_max_record_bytes(pool: PgPool, max_record_bytes: usize) -> Self {
        Self {
            pool,
            max_record_bytes,
        }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl KvStore for PgKvStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let value = sqlx::query_scalar::<_, Vec<u8>>("SELECT value FROM kv_records WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn put(&self, key: &str, blob: &[u8]) -> Result<(), StoreError> {
        check_size(key, blob, self.max_record_bytes)?;
        sqlx::query(
            "INSERT INTO kv_records (key, value) VALUES ($1, $2) \
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()",
        )
        .bind(key)
        .bind(blob)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let keys = sqlx::query_scalar::<_, String>(
            "SELECT key FROM kv_records WHERE starts_with(key, $1) ORDER BY key COLLATE \"C\"",
        )
        .bind(prefix)
        .fetch_all(&self.pool)
        .await?;
        Ok(keys)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM kv_records WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn compare_and_put(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        blob: &[u8],
    ) -> Result<bool, StoreError> {
        check_size(key, blob, self.max_record_bytes)?;
        let result = match expected {
            None => {
                sqlx::query(
                    "INSERT INTO kv_records (key, value) VALUES ($1, $2) \
                     ON CONFLICT (key) DO NOTHING",
                )
                .bind(key)
                .bind(blob)
                .execute(&self.pool)
                .await?
            }
            Some(current) => {
                sqlx::query(
                    "UPDATE kv_records SET value = $2, updated_at = NOW() \
                     WHERE key = $1 AND value = $3",
                )
                .bind(key)
                .bind(blob)
                .bind(current)
                .execute(&self.pool)
                .await?
            }
        };
        Ok(result.rows_affected() == 1)
    }

    fn max_record_bytes(&self) -> usize {
        self.max_record_bytes
    }
}
