use common::{AggregationBucket, AggregationKey};
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tokio::sync::Mutex;

/// Sharded keyed-mutex bucket state. Contention on one aggregation key
/// only blocks the shard it hashes into, not the whole bucket table.
pub struct ShardedBucketStore {
    shards: Vec<Mutex<HashMap<AggregationKey, AggregationBucket>>>,
}

impl ShardedBucketStore {
    pub const DEFAULT_SHARDS: usize = 256;

    pub fn new(shard_count: usize) -> Self {
        let mut shards = Vec::with_capacity(shard_count);
        for _ in 0..shard_count {
            shards.push(Mutex::new(HashMap::new()));
        }
        Self { shards }
    }

    fn shard_index(&self, key: &AggregationKey) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % self.shards.len()
    }

    /// Inserts a fresh bucket via `default` if `key` is absent, otherwise
    /// runs `absorb` against the existing one. Returns `true` if a new
    /// bucket was created (the caller should schedule its flush timer).
    pub async fn insert_or_absorb(
        &self,
        key: &AggregationKey,
        default: impl FnOnce() -> AggregationBucket,
        absorb: impl FnOnce(&mut AggregationBucket),
    ) -> bool {
        let mut shard = self.shards[self.shard_index(key)].lock().await;
        match shard.get_mut(key) {
            Some(bucket) => {
                absorb(bucket);
                false
            }
            None => {
                shard.insert(key.clone(), default());
                true
            }
        }
    }

    /// Removes and returns the bucket for `key`, if present. Used when a
    /// debounce timer fires and the bucket's current cycle is flushed.
    pub async fn take(&self, key: &AggregationKey) -> Option<AggregationBucket> {
        let mut shard = self.shards[self.shard_index(key)].lock().await;
        shard.remove(key)
    }

    pub async fn contains(&self, key: &AggregationKey) -> bool {
        let shard = self.shards[self.shard_index(key)].lock().await;
        shard.contains_key(key)
    }

    /// Runs `check` against the bucket for `key` if present, else returns
    /// `false`. Used by the flush timer to test quiescence without racing
    /// a concurrent `insert_or_absorb`.
    pub async fn inspect(&self, key: &AggregationKey, check: impl FnOnce(&AggregationBucket) -> bool) -> bool {
        let shard = self.shards[self.shard_index(key)].lock().await;
        shard.get(key).map(check).unwrap_or(false)
    }
}

impl Default for ShardedBucketStore {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SHARDS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{EventType, TargetKind, TargetRef};

    fn key(n: u32) -> AggregationKey {
        AggregationKey::new(format!("user-{n}"), EventType::Like, TargetRef::new(TargetKind::Post, format!("post-{n}")))
    }

    #[tokio::test]
    async fn insert_or_absorb_creates_then_absorbs() {
        let store = ShardedBucketStore::new(4);
        let now = chrono::Utc::now();
        let k = key(1);

        let created_first = store.insert_or_absorb(&k, || AggregationBucket::new(k.clone(), "actor-1".to_string(), now), |b| b.absorb("actor-2".to_string(), now)).await;
        assert!(created_first);

        let created_second = store.insert_or_absorb(&k, || AggregationBucket::new(k.clone(), "actor-1".to_string(), now), |b| b.absorb("actor-2".to_string(), now)).await;
        assert!(!created_second);

        let taken = store.take(&k).await.unwrap();
        assert_eq!(taken.count, 2);
    }

    #[tokio::test]
    async fn take_removes_bucket() {
        let store = ShardedBucketStore::new(4);
        let now = chrono::Utc::now();
        let k = key(2);
        store.insert_or_absorb(&k, || AggregationBucket::new(k.clone(), "actor-1".to_string(), now), |_| {}).await;
        assert!(store.contains(&k).await);
        store.take(&k).await;
        assert!(!store.contains(&k).await);
    }
}
