use common::{EventBusError, EventEnvelope};
use std::error::Error;

/// Outcome a consumer handler reports back for a single envelope. The bus
/// only commits the offset on `Success`/`PermanentError` — `RetryableError`
/// is left for the caller to escalate through the fallback queue; the bus
/// itself does not retry.
#[derive(Debug, Clone)]
pub enum ProcessingResult {
    Success,
    RetryableError(String),
    PermanentError(String),
}

#[allow(async_fn_in_trait)]
pub trait NotificationEventBus: Send + Sync {
    type Error;

    async fn publish(&self, envelope: EventEnvelope) -> Result<(), Self::Error>;

    async fn subscribe<F>(&self, topic: &str, group_suffix: &str, handler: F) -> Result<(), Self::Error>
    where
        F: Fn(EventEnvelope) -> Result<ProcessingResult, Box<dyn Error + Send + Sync>> + Send + Sync + 'static;

    async fn health_check(&self) -> Result<(), Self::Error>;

    async fn shutdown(&self) -> Result<(), Self::Error>;
}

pub type BusResult<T> = Result<T, EventBusError>;
