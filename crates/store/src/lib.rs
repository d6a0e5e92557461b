pub mod config;
pub mod fallback_store;
pub mod history_store;
pub mod preference_store;

pub use config::StoreConfig;
pub use fallback_store::{FallbackQueueStats, FallbackQueueStore, InMemoryFallbackQueueStore, PgFallbackQueueStore};
pub use history_store::{InMemoryNotificationHistoryStore, NotificationHistoryStore, PgNotificationHistoryStore};
pub use preference_store::{InMemoryPreferenceStore, PgPreferenceStore, PreferenceStore};
