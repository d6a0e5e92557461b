use common::EventBusError;

/// Connection settings for the Kafka-backed event bus.
#[derive(Debug, Clone)]
pub struct BusConfig {
    pub bootstrap_servers: String,
    pub timeout_ms: u64,
    pub consumer_group_id: String,
    pub security_protocol: String,
}

impl BusConfig {
    /// Expected environment variables:
    /// - `KAFKA_BOOTSTRAP_SERVERS` (required)
    /// - `KAFKA_CONSUMER_GROUP_ID` (required)
    /// - `KAFKA_TIMEOUT_MS` (optional, default 5000)
    /// - `KAFKA_SECURITY_PROTOCOL` (optional, default PLAINTEXT)
    pub fn from_env() -> Result<Self, EventBusError> {
        dotenv::dotenv().ok();

        let bootstrap_servers = std::env::var("KAFKA_BOOTSTRAP_SERVERS")
            .map_err(|_| EventBusError::ConfigError("KAFKA_BOOTSTRAP_SERVERS must be set".to_string()))?;

        let consumer_group_id = std::env::var("KAFKA_CONSUMER_GROUP_ID")
            .map_err(|_| EventBusError::ConfigError("KAFKA_CONSUMER_GROUP_ID must be set".to_string()))?;

        let timeout_ms = std::env::var("KAFKA_TIMEOUT_MS")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .map_err(|_| EventBusError::ConfigError("KAFKA_TIMEOUT_MS must be a valid number".to_string()))?;

        let security_protocol = std::env::var("KAFKA_SECURITY_PROTOCOL").unwrap_or_else(|_| "PLAINTEXT".to_string());

        Ok(Self { bootstrap_servers, timeout_ms, consumer_group_id, security_protocol })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_env_reads_required_and_optional_vars() {
        unsafe {
            std::env::set_var("KAFKA_BOOTSTRAP_SERVERS", "localhost:9092");
            std::env::set_var("KAFKA_CONSUMER_GROUP_ID", "notifications");
            std::env::remove_var("KAFKA_TIMEOUT_MS");
        }
        let config = BusConfig::from_env().expect("config from env");
        assert_eq!(config.bootstrap_servers, "localhost:9092");
        assert_eq!(config.timeout_ms, 5000);
        assert_eq!(config.security_protocol, "PLAINTEXT");
    }
}
