/// Top-level engine configuration: the operator HTTP surface plus the
/// shard count handed to the aggregation engine. Bus and store settings
/// are read by their own crates' `from_env`.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub aggregation_shards: usize,
}

impl AppConfig {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self {
            host: std::env::var("ENGINE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("ENGINE_PORT").unwrap_or_else(|_| "8000".to_string()).parse().expect("ENGINE_PORT must be a valid number"),
            aggregation_shards: std::env::var("AGGREGATION_SHARD_COUNT")
                .unwrap_or_else(|_| aggregator::ShardedBucketStore::DEFAULT_SHARDS.to_string())
                .parse()
                .expect("AGGREGATION_SHARD_COUNT must be a valid number"),
        }
    }

    pub fn listen_address(&self) -> std::net::SocketAddr {
        format!("{}:{}", self.host, self.port).parse().expect("invalid host or port")
    }
}
