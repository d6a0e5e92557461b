use async_trait::async_trait;
use common::{FallbackQueueEntry, StoreError};
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Aggregate counters surfaced by `get_fallback_queue_stats`.
#[derive(Debug, Clone, Default)]
pub struct FallbackQueueStats {
    pub pending_count: u64,
    pub poisoned_count: u64,
    pub oldest_pending_age: Option<chrono::Duration>,
}

#[async_trait]
pub trait FallbackQueueStore: Send + Sync {
    async fn insert(&self, entry: FallbackQueueEntry) -> Result<(), StoreError>;
    /// Claims up to `batch_size` unprocessed, non-poisoned rows for retry,
    /// using `FOR UPDATE SKIP LOCKED` so multiple replay workers can run
    /// concurrently without double-processing an entry.
    async fn claim_batch(&self, batch_size: i64) -> Result<Vec<FallbackQueueEntry>, StoreError>;
    async fn mark_processed(&self, id: Uuid, at: chrono::DateTime<chrono::Utc>) -> Result<(), StoreError>;
    async fn record_failure(&self, id: Uuid, error: String, at: chrono::DateTime<chrono::Utc>) -> Result<(), StoreError>;
    async fn delete_processed_before(&self, cutoff: chrono::DateTime<chrono::Utc>) -> Result<u64, StoreError>;
    async fn stats(&self) -> Result<FallbackQueueStats, StoreError>;
}

pub struct PgFallbackQueueStore {
    pool: PgPool,
}

impl PgFallbackQueueStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct FallbackRow {
    id: Uuid,
    event_data: serde_json::Value,
    topic: String,
    target_user_id: String,
    processed: bool,
    processed_at: Option<chrono::DateTime<chrono::Utc>>,
    retry_count: i32,
    last_retry_at: Option<chrono::DateTime<chrono::Utc>>,
    last_error: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<FallbackRow> for FallbackQueueEntry {
    fn from(row: FallbackRow) -> Self {
        FallbackQueueEntry {
            id: row.id,
            event_data: row.event_data,
            topic: row.topic,
            target_user_id: row.target_user_id,
            processed: row.processed,
            processed_at: row.processed_at,
            retry_count: row.retry_count as u32,
            last_retry_at: row.last_retry_at,
            last_error: row.last_error,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl FallbackQueueStore for PgFallbackQueueStore {
    async fn insert(&self, entry: FallbackQueueEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO fallback_queue
                (id, event_data, topic, target_user_id, processed, processed_at,
                 retry_count, last_retry_at, last_error, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(entry.id)
        .bind(&entry.event_data)
        .bind(&entry.topic)
        .bind(&entry.target_user_id)
        .bind(entry.processed)
        .bind(entry.processed_at)
        .bind(entry.retry_count as i32)
        .bind(entry.last_retry_at)
        .bind(&entry.last_error)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(())
    }

    /// Claims and marks a batch in one statement: the `SELECT ... FOR
    /// UPDATE SKIP LOCKED` and the `last_retry_at` bump run inside the same
    /// implicit transaction, so the lock is never released between
    /// "select the row" and "record that it was claimed" — two concurrent
    /// callers can't both walk away with the same row.
    async fn claim_batch(&self, batch_size: i64) -> Result<Vec<FallbackQueueEntry>, StoreError> {
        let rows = sqlx::query_as::<_, FallbackRow>(
            r#"
            WITH claimed AS (
                SELECT id FROM fallback_queue
                WHERE processed = false AND retry_count < $2
                ORDER BY created_at ASC
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE fallback_queue
            SET last_retry_at = now()
            WHERE id IN (SELECT id FROM claimed)
            RETURNING *
            "#,
        )
        .bind(batch_size)
        .bind(common::FallbackQueueEntry::MAX_RETRIES as i32)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn mark_processed(&self, id: Uuid, at: chrono::DateTime<chrono::Utc>) -> Result<(), StoreError> {
        sqlx::query("UPDATE fallback_queue SET processed = true, processed_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(())
    }

    async fn record_failure(&self, id: Uuid, error: String, at: chrono::DateTime<chrono::Utc>) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE fallback_queue SET retry_count = retry_count + 1, last_retry_at = $2, last_error = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(at)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(())
    }

    async fn delete_processed_before(&self, cutoff: chrono::DateTime<chrono::Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM fallback_queue WHERE processed = true AND processed_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(result.rows_affected())
    }

    async fn stats(&self) -> Result<FallbackQueueStats, StoreError> {
        let pending_count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM fallback_queue WHERE processed = false")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        let poisoned_count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM fallback_queue WHERE processed = false AND retry_count >= $1",
        )
        .bind(common::FallbackQueueEntry::MAX_RETRIES as i32)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        let oldest: Option<(chrono::DateTime<chrono::Utc>,)> =
            sqlx::query_as("SELECT created_at FROM fallback_queue WHERE processed = false ORDER BY created_at ASC LIMIT 1")
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(FallbackQueueStats {
            pending_count: pending_count.0 as u64,
            poisoned_count: poisoned_count.0 as u64,
            oldest_pending_age: oldest.map(|(created_at,)| chrono::Utc::now().signed_duration_since(created_at)),
        })
    }
}

/// In-memory fake used in unit tests for the replay worker and janitor.
#[derive(Clone, Default)]
pub struct InMemoryFallbackQueueStore {
    data: Arc<RwLock<Vec<FallbackQueueEntry>>>,
}

impl InMemoryFallbackQueueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FallbackQueueStore for InMemoryFallbackQueueStore {
    async fn insert(&self, entry: FallbackQueueEntry) -> Result<(), StoreError> {
        self.data.write().await.push(entry);
        Ok(())
    }

    async fn claim_batch(&self, batch_size: i64) -> Result<Vec<FallbackQueueEntry>, StoreError> {
        let data = self.data.read().await;
        Ok(data
            .iter()
            .filter(|e| !e.processed && !e.is_poisoned())
            .take(batch_size as usize)
            .cloned()
            .collect())
    }

    async fn mark_processed(&self, id: Uuid, at: chrono::DateTime<chrono::Utc>) -> Result<(), StoreError> {
        let mut data = self.data.write().await;
        let entry = data.iter_mut().find(|e| e.id == id).ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        entry.mark_processed(at);
        Ok(())
    }

    async fn record_failure(&self, id: Uuid, error: String, at: chrono::DateTime<chrono::Utc>) -> Result<(), StoreError> {
        let mut data = self.data.write().await;
        let entry = data.iter_mut().find(|e| e.id == id).ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        entry.record_failure(error, at);
        Ok(())
    }

    async fn delete_processed_before(&self, cutoff: chrono::DateTime<chrono::Utc>) -> Result<u64, StoreError> {
        let mut data = self.data.write().await;
        let before = data.len();
        data.retain(|e| !(e.processed && e.processed_at.map(|p| p < cutoff).unwrap_or(false)));
        Ok((before - data.len()) as u64)
    }

    async fn stats(&self) -> Result<FallbackQueueStats, StoreError> {
        let data = self.data.read().await;
        let pending: Vec<_> = data.iter().filter(|e| !e.processed).collect();
        Ok(FallbackQueueStats {
            pending_count: pending.len() as u64,
            poisoned_count: pending.iter().filter(|e| e.is_poisoned()).count() as u64,
            oldest_pending_age: pending.iter().map(|e| e.created_at).min().map(|t| chrono::Utc::now().signed_duration_since(t)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn claim_batch_excludes_poisoned_entries() {
        let store = InMemoryFallbackQueueStore::new();
        let mut poisoned = FallbackQueueEntry::new(serde_json::json!({}), "notifications.normal", "user-1");
        for _ in 0..FallbackQueueEntry::MAX_RETRIES {
            poisoned.record_failure("boom", chrono::Utc::now());
        }
        let healthy = FallbackQueueEntry::new(serde_json::json!({}), "notifications.normal", "user-2");

        store.insert(poisoned).await.unwrap();
        store.insert(healthy.clone()).await.unwrap();

        let claimed = store.claim_batch(10).await.unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].id, healthy.id);
    }

    #[tokio::test]
    async fn janitor_deletes_old_processed_entries_only() {
        let store = InMemoryFallbackQueueStore::new();
        let mut entry = FallbackQueueEntry::new(serde_json::json!({}), "notifications.normal", "user-1");
        entry.mark_processed(chrono::Utc::now() - chrono::Duration::days(8));
        store.insert(entry).await.unwrap();

        let deleted = store.delete_processed_before(chrono::Utc::now() - chrono::Duration::days(7)).await.unwrap();
        assert_eq!(deleted, 1);
    }
}
