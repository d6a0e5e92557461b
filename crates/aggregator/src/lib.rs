pub mod engine;
pub mod rebuild;
pub mod shard;
pub mod sink;

pub use engine::{AggregationEngine, DEBOUNCE_DELAY};
pub use rebuild::rebuild_from_history;
pub use shard::ShardedBucketStore;
pub use sink::FlushSink;
