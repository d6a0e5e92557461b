use std::sync::Arc;
use std::time::Duration;
use store::FallbackQueueStore;
use tracing::{error, info};

/// How long a processed fallback queue row is retained before the janitor
/// deletes it.
pub const RETENTION: chrono::Duration = chrono::Duration::days(7);
const SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

/// Periodically deletes processed fallback queue rows older than
/// [`RETENTION`].
pub struct FallbackQueueJanitor {
    store: Arc<dyn FallbackQueueStore>,
}

impl FallbackQueueJanitor {
    pub fn new(store: Arc<dyn FallbackQueueStore>) -> Self {
        Self { store }
    }

    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let cutoff = chrono::Utc::now() - RETENTION;
                match self.store.delete_processed_before(cutoff).await {
                    Ok(deleted) if deleted > 0 => info!("janitor deleted {} stale fallback queue rows", deleted),
                    Ok(_) => {}
                    Err(e) => error!("janitor sweep failed: {}", e),
                }
                tokio::time::sleep(SWEEP_INTERVAL).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::FallbackQueueEntry;
    use store::InMemoryFallbackQueueStore;

    #[tokio::test]
    async fn janitor_sweeps_old_processed_rows() {
        let store: Arc<dyn FallbackQueueStore> = Arc::new(InMemoryFallbackQueueStore::new());
        let mut entry = FallbackQueueEntry::new(serde_json::json!({}), "notifications.normal", "user-1");
        entry.mark_processed(chrono::Utc::now() - chrono::Duration::days(10));
        store.insert(entry).await.unwrap();

        let cutoff = chrono::Utc::now() - RETENTION;
        let deleted = store.delete_processed_before(cutoff).await.unwrap();
        assert_eq!(deleted, 1);
    }
}
