use async_trait::async_trait;
use common::{NotificationPreference, StoreError};
use sqlx::PgPool;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<NotificationPreference, StoreError>;
    async fn upsert(&self, preference: NotificationPreference) -> Result<(), StoreError>;
}

/// Postgres-backed preference store. `muted_types` is stored as a JSON
/// array column since it has no natural flat SQL representation.
pub struct PgPreferenceStore {
    pool: PgPool,
}

impl PgPreferenceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct PreferenceRow {
    user_id: String,
    push_enabled: bool,
    email_enabled: bool,
    sms_enabled: bool,
    muted_types: serde_json::Value,
    dnd_enabled: bool,
    dnd_start: Option<String>,
    dnd_end: Option<String>,
    timezone: Option<String>,
    email_address: Option<String>,
    phone_number: Option<String>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl PreferenceRow {
    fn into_preference(self) -> NotificationPreference {
        let muted_types: HashSet<_> = serde_json::from_value(self.muted_types).unwrap_or_default();
        NotificationPreference {
            user_id: self.user_id,
            push_enabled: self.push_enabled,
            email_enabled: self.email_enabled,
            sms_enabled: self.sms_enabled,
            muted_types,
            dnd_enabled: self.dnd_enabled,
            dnd_start: self.dnd_start,
            dnd_end: self.dnd_end,
            timezone: self.timezone,
            email_address: self.email_address,
            phone_number: self.phone_number,
            updated_at: self.updated_at,
        }
    }
}

#[async_trait]
impl PreferenceStore for PgPreferenceStore {
    async fn get(&self, user_id: &str) -> Result<NotificationPreference, StoreError> {
        let row = sqlx::query_as::<_, PreferenceRow>(
            r#"
            SELECT user_id, push_enabled, email_enabled, sms_enabled, muted_types,
                   dnd_enabled, dnd_start, dnd_end, timezone, email_address, phone_number, updated_at
            FROM notification_preferences
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        match row {
            Some(row) => Ok(row.into_preference()),
            None => Ok(NotificationPreference::default_for(user_id)),
        }
    }

    async fn upsert(&self, preference: NotificationPreference) -> Result<(), StoreError> {
        let muted_types = serde_json::to_value(&preference.muted_types).map_err(|e| StoreError::Query(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO notification_preferences
                (user_id, push_enabled, email_enabled, sms_enabled, muted_types,
                 dnd_enabled, dnd_start, dnd_end, timezone, email_address, phone_number, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (user_id) DO UPDATE SET
                push_enabled = EXCLUDED.push_enabled,
                email_enabled = EXCLUDED.email_enabled,
                sms_enabled = EXCLUDED.sms_enabled,
                muted_types = EXCLUDED.muted_types,
                dnd_enabled = EXCLUDED.dnd_enabled,
                dnd_start = EXCLUDED.dnd_start,
                dnd_end = EXCLUDED.dnd_end,
                timezone = EXCLUDED.timezone,
                email_address = EXCLUDED.email_address,
                phone_number = EXCLUDED.phone_number,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&preference.user_id)
        .bind(preference.push_enabled)
        .bind(preference.email_enabled)
        .bind(preference.sms_enabled)
        .bind(muted_types)
        .bind(preference.dnd_enabled)
        .bind(&preference.dnd_start)
        .bind(&preference.dnd_end)
        .bind(&preference.timezone)
        .bind(&preference.email_address)
        .bind(&preference.phone_number)
        .bind(preference.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(())
    }
}

/// In-memory fake for unit tests and dry runs without a database.
#[derive(Clone, Default)]
pub struct InMemoryPreferenceStore {
    data: Arc<RwLock<HashMap<String, NotificationPreference>>>,
}

impl InMemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PreferenceStore for InMemoryPreferenceStore {
    async fn get(&self, user_id: &str) -> Result<NotificationPreference, StoreError> {
        let data = self.data.read().await;
        Ok(data.get(user_id).cloned().unwrap_or_else(|| NotificationPreference::default_for(user_id)))
    }

    async fn upsert(&self, preference: NotificationPreference) -> Result<(), StoreError> {
        self.data.write().await.insert(preference.user_id.clone(), preference);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_user_gets_default_preference() {
        let store = InMemoryPreferenceStore::new();
        let pref = store.get("user-1").await.unwrap();
        assert!(pref.push_enabled);
    }

    #[tokio::test]
    async fn upsert_then_get_round_trips() {
        let store = InMemoryPreferenceStore::new();
        let mut pref = NotificationPreference::default_for("user-1");
        pref.sms_enabled = true;
        store.upsert(pref).await.unwrap();

        let fetched = store.get("user-1").await.unwrap();
        assert!(fetched.sms_enabled);
    }
}
