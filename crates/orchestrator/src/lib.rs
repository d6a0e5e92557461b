pub mod delivery;
pub mod janitor;
pub mod replay;

pub use delivery::{eligible_channels, render_title_and_message, DeliveryOrchestrator};
pub use janitor::FallbackQueueJanitor;
pub use replay::FallbackReplayWorker;
