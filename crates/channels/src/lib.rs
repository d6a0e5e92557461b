pub mod config;
pub mod email;
pub mod provider;
pub mod push;
pub mod sms;
pub mod worker_pool;

pub use config::{ChannelProviderConfig, WorkerPoolConfig};
pub use email::EmailChannel;
pub use provider::HttpChannelProvider;
pub use push::PushChannel;
pub use sms::SmsChannel;
pub use worker_pool::ChannelWorkerPool;
