use thiserror::Error;

/// Transport-level failures on the event bus (publish/subscribe/health).
#[derive(Debug, Error)]
pub enum EventBusError {
    #[error("serialization error: {0}")]
    SerializationError(String),
    #[error("producer error: {0}")]
    ProducerError(String),
    #[error("consumer error: {0}")]
    ConsumerError(String),
    #[error("timeout waiting for broker response")]
    TimeoutError,
    #[error("invalid message: {0}")]
    InvalidMessage(String),
    #[error("config error: {0}")]
    ConfigError(String),
}

/// Persistence-layer failures shared by preference, history, and fallback
/// queue stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("query error: {0}")]
    Query(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

/// Aggregation/dedup engine failures — these are almost always bugs, not
/// expected runtime conditions, so they're kept narrow.
#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("bucket state poisoned for key {0}")]
    PoisonedBucket(String),
}

/// Channel provider failures, classified into transient vs permanent so
/// the retry coordinator knows what to do with them.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("transient provider error: {0}")]
    Transient(String),
    #[error("permanent provider error: {0}")]
    Permanent(String),
    #[error("rate limited, retry after {0:?}")]
    RateLimited(std::time::Duration),
}

impl ChannelError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ChannelError::Transient(_) | ChannelError::RateLimited(_))
    }
}

/// Top-level orchestrator failures: everything upstream (bus, store,
/// aggregator, channel) rolls up into this for the engine binary to log
/// and decide whether to fall back.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("bus error: {0}")]
    Bus(#[from] EventBusError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("aggregation error: {0}")]
    Aggregation(#[from] AggregationError),
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),
    #[error("fatal error: {0}")]
    Fatal(String),
}
