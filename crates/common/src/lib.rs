pub mod aggregation;
pub mod channel;
pub mod dnd;
pub mod errors;
pub mod events;
pub mod fallback;
pub mod history;
pub mod preferences;
pub mod retry;

pub use aggregation::{AggregationBucket, AggregationKey};
pub use channel::{Channel, ChannelEnvelope, ChannelKind, ChannelSendResult};
pub use errors::{AggregationError, ChannelError, EventBusError, OrchestratorError, StoreError};
pub use events::{Event, EventEnvelope, EventPayload, EventType, Priority, TargetKind, TargetRef};
pub use fallback::FallbackQueueEntry;
pub use history::{DeliveryStatus, NotificationHistory};
pub use preferences::NotificationPreference;
pub use retry::{calculate_backoff, retry, retry_if_retryable, RetryConfig, RetryableError};
