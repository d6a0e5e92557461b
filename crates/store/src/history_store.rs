use async_trait::async_trait;
use common::{DeliveryStatus, NotificationHistory, StoreError};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[async_trait]
pub trait NotificationHistoryStore: Send + Sync {
    async fn insert(&self, history: &NotificationHistory) -> Result<(), StoreError>;
    async fn get(&self, id: Uuid) -> Result<NotificationHistory, StoreError>;
    async fn update(&self, history: &NotificationHistory) -> Result<(), StoreError>;
    async fn list_for_user(&self, user_id: &str, limit: i64, offset: i64) -> Result<Vec<NotificationHistory>, StoreError>;
    async fn mark_read(&self, id: Uuid, at: chrono::DateTime<chrono::Utc>) -> Result<(), StoreError>;
    /// Unread rows newer than `since`, used by the aggregator to rebuild
    /// in-memory bucket state after a restart.
    async fn list_unread_since(&self, since: chrono::DateTime<chrono::Utc>) -> Result<Vec<NotificationHistory>, StoreError>;
}

pub struct PgNotificationHistoryStore {
    pool: PgPool,
}

impl PgNotificationHistoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct HistoryRow {
    id: Uuid,
    user_id: String,
    event_type: String,
    priority: String,
    target_ref: serde_json::Value,
    is_aggregated: bool,
    aggregated_count: i32,
    actor_ids: serde_json::Value,
    title: String,
    message: String,
    is_read: bool,
    read_at: Option<chrono::DateTime<chrono::Utc>>,
    delivery_status: String,
    channels_attempted: serde_json::Value,
    channels_delivered: serde_json::Value,
    metadata: serde_json::Value,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl HistoryRow {
    fn into_history(self) -> Result<NotificationHistory, StoreError> {
        Ok(NotificationHistory {
            id: self.id,
            user_id: self.user_id,
            event_type: serde_json::from_str(&format!("\"{}\"", self.event_type)).map_err(|e| StoreError::Query(e.to_string()))?,
            priority: serde_json::from_str(&format!("\"{}\"", self.priority)).map_err(|e| StoreError::Query(e.to_string()))?,
            target_ref: serde_json::from_value(self.target_ref).map_err(|e| StoreError::Query(e.to_string()))?,
            is_aggregated: self.is_aggregated,
            aggregated_count: self.aggregated_count as u32,
            actor_ids: serde_json::from_value(self.actor_ids).unwrap_or_default(),
            title: self.title,
            message: self.message,
            is_read: self.is_read,
            read_at: self.read_at,
            delivery_status: serde_json::from_str(&format!("\"{}\"", self.delivery_status)).unwrap_or(DeliveryStatus::Pending),
            channels_attempted: serde_json::from_value(self.channels_attempted).unwrap_or_default(),
            channels_delivered: serde_json::from_value(self.channels_delivered).unwrap_or_default(),
            metadata: self.metadata,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn enum_str<T: serde::Serialize>(value: &T) -> Result<String, StoreError> {
    let json = serde_json::to_string(value).map_err(|e| StoreError::Query(e.to_string()))?;
    Ok(json.trim_matches('"').to_string())
}

#[async_trait]
impl NotificationHistoryStore for PgNotificationHistoryStore {
    /// Upserts on `id` rather than a plain insert: a flushed bucket that
    /// was restored from history on startup (`rebuild_from_history`) keeps
    /// its original `notification_id`, so a second flush of that same
    /// bucket must update the existing row instead of conflicting with it.
    async fn insert(&self, history: &NotificationHistory) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO notification_history
                (id, user_id, event_type, priority, target_ref, is_aggregated, aggregated_count,
                 actor_ids, title, message, is_read, read_at, delivery_status,
                 channels_attempted, channels_delivered, metadata, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            ON CONFLICT (id) DO UPDATE SET
                is_aggregated = EXCLUDED.is_aggregated,
                aggregated_count = EXCLUDED.aggregated_count,
                actor_ids = EXCLUDED.actor_ids,
                title = EXCLUDED.title,
                message = EXCLUDED.message,
                is_read = EXCLUDED.is_read,
                read_at = EXCLUDED.read_at,
                delivery_status = EXCLUDED.delivery_status,
                channels_attempted = EXCLUDED.channels_attempted,
                channels_delivered = EXCLUDED.channels_delivered,
                metadata = EXCLUDED.metadata,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(history.id)
        .bind(&history.user_id)
        .bind(enum_str(&history.event_type)?)
        .bind(enum_str(&history.priority)?)
        .bind(serde_json::to_value(&history.target_ref).map_err(|e| StoreError::Query(e.to_string()))?)
        .bind(history.is_aggregated)
        .bind(history.aggregated_count as i32)
        .bind(serde_json::to_value(&history.actor_ids).map_err(|e| StoreError::Query(e.to_string()))?)
        .bind(&history.title)
        .bind(&history.message)
        .bind(history.is_read)
        .bind(history.read_at)
        .bind(enum_str(&history.delivery_status)?)
        .bind(serde_json::to_value(&history.channels_attempted).map_err(|e| StoreError::Query(e.to_string()))?)
        .bind(serde_json::to_value(&history.channels_delivered).map_err(|e| StoreError::Query(e.to_string()))?)
        .bind(&history.metadata)
        .bind(history.created_at)
        .bind(history.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<NotificationHistory, StoreError> {
        let row = sqlx::query_as::<_, HistoryRow>("SELECT * FROM notification_history WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        row.into_history()
    }

    async fn update(&self, history: &NotificationHistory) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE notification_history SET
                is_aggregated = $2, aggregated_count = $3, actor_ids = $4, title = $5, message = $6,
                is_read = $7, read_at = $8, delivery_status = $9, channels_attempted = $10,
                channels_delivered = $11, metadata = $12, updated_at = $13
            WHERE id = $1
            "#,
        )
        .bind(history.id)
        .bind(history.is_aggregated)
        .bind(history.aggregated_count as i32)
        .bind(serde_json::to_value(&history.actor_ids).map_err(|e| StoreError::Query(e.to_string()))?)
        .bind(&history.title)
        .bind(&history.message)
        .bind(history.is_read)
        .bind(history.read_at)
        .bind(enum_str(&history.delivery_status)?)
        .bind(serde_json::to_value(&history.channels_attempted).map_err(|e| StoreError::Query(e.to_string()))?)
        .bind(serde_json::to_value(&history.channels_delivered).map_err(|e| StoreError::Query(e.to_string()))?)
        .bind(&history.metadata)
        .bind(history.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(())
    }

    async fn list_for_user(&self, user_id: &str, limit: i64, offset: i64) -> Result<Vec<NotificationHistory>, StoreError> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            "SELECT * FROM notification_history WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;
        rows.into_iter().map(HistoryRow::into_history).collect()
    }

    async fn mark_read(&self, id: Uuid, at: chrono::DateTime<chrono::Utc>) -> Result<(), StoreError> {
        sqlx::query("UPDATE notification_history SET is_read = true, read_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(())
    }

    async fn list_unread_since(&self, since: chrono::DateTime<chrono::Utc>) -> Result<Vec<NotificationHistory>, StoreError> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            "SELECT * FROM notification_history WHERE is_read = false AND created_at >= $1 ORDER BY created_at ASC",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;
        rows.into_iter().map(HistoryRow::into_history).collect()
    }
}

/// In-memory fake used in unit tests and by the aggregator's own tests.
#[derive(Clone, Default)]
pub struct InMemoryNotificationHistoryStore {
    data: Arc<RwLock<HashMap<Uuid, NotificationHistory>>>,
}

impl InMemoryNotificationHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationHistoryStore for InMemoryNotificationHistoryStore {
    async fn insert(&self, history: &NotificationHistory) -> Result<(), StoreError> {
        self.data.write().await.insert(history.id, history.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<NotificationHistory, StoreError> {
        self.data.read().await.get(&id).cloned().ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn update(&self, history: &NotificationHistory) -> Result<(), StoreError> {
        self.data.write().await.insert(history.id, history.clone());
        Ok(())
    }

    async fn list_for_user(&self, user_id: &str, limit: i64, offset: i64) -> Result<Vec<NotificationHistory>, StoreError> {
        let data = self.data.read().await;
        let mut matches: Vec<_> = data.values().filter(|h| h.user_id == user_id).cloned().collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matches.into_iter().skip(offset as usize).take(limit as usize).collect())
    }

    async fn mark_read(&self, id: Uuid, at: chrono::DateTime<chrono::Utc>) -> Result<(), StoreError> {
        let mut data = self.data.write().await;
        let history = data.get_mut(&id).ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        history.mark_read(at);
        Ok(())
    }

    async fn list_unread_since(&self, since: chrono::DateTime<chrono::Utc>) -> Result<Vec<NotificationHistory>, StoreError> {
        let data = self.data.read().await;
        Ok(data.values().filter(|h| !h.is_read && h.created_at >= since).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{EventType, Priority, TargetKind, TargetRef};

    fn sample(id: Uuid, user_id: &str) -> NotificationHistory {
        NotificationHistory {
            id,
            user_id: user_id.to_string(),
            event_type: EventType::Like,
            priority: Priority::Normal,
            target_ref: TargetRef::new(TargetKind::Post, "post-1"),
            is_aggregated: false,
            aggregated_count: 1,
            actor_ids: vec!["actor-1".to_string()],
            title: "New like".to_string(),
            message: "actor-1 liked your post".to_string(),
            is_read: false,
            read_at: None,
            delivery_status: DeliveryStatus::Pending,
            channels_attempted: vec![],
            channels_delivered: vec![],
            metadata: serde_json::json!({}),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn insert_then_get_round_trips() {
        let store = InMemoryNotificationHistoryStore::new();
        let id = Uuid::new_v4();
        store.insert(&sample(id, "user-1")).await.unwrap();
        let fetched = store.get(id).await.unwrap();
        assert_eq!(fetched.user_id, "user-1");
    }

    #[tokio::test]
    async fn mark_read_is_reflected_in_unread_listing() {
        let store = InMemoryNotificationHistoryStore::new();
        let id = Uuid::new_v4();
        store.insert(&sample(id, "user-1")).await.unwrap();
        let since = chrono::Utc::now() - chrono::Duration::hours(1);
        assert_eq!(store.list_unread_since(since).await.unwrap().len(), 1);

        store.mark_read(id, chrono::Utc::now()).await.unwrap();
        assert_eq!(store.list_unread_since(since).await.unwrap().len(), 0);
    }
}
