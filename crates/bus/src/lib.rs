pub mod config;
pub mod kafka;
pub mod memory;
pub mod trait_def;

pub use config::BusConfig;
pub use kafka::KafkaEventBus;
pub use memory::InMemoryEventBus;
pub use trait_def::{BusResult, NotificationEventBus, ProcessingResult};
