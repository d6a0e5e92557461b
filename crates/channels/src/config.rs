use common::ChannelKind;

/// Provider connection settings for one channel, read from env vars
/// prefixed by the channel name (`PUSH_`, `EMAIL_`, `SMS_`).
#[derive(Debug, Clone)]
pub struct ChannelProviderConfig {
    pub base_url: String,
    pub api_key: String,
    pub request_timeout_seconds: u64,
    pub rate_limit_per_minute: u32,
    pub rate_limit_burst: u32,
    pub max_retry_attempts: u32,
    pub initial_retry_delay_ms: u64,
    pub max_retry_delay_ms: u64,
}

impl ChannelProviderConfig {
    pub fn from_env(kind: ChannelKind) -> Result<Self, common::ChannelError> {
        dotenv::dotenv().ok();
        let prefix = match kind {
            ChannelKind::Push => "PUSH",
            ChannelKind::Email => "EMAIL",
            ChannelKind::Sms => "SMS",
        };

        let var = |name: &str| std::env::var(format!("{prefix}_{name}"));

        let base_url = var("BASE_URL").map_err(|_| common::ChannelError::Permanent(format!("{prefix}_BASE_URL must be set")))?;
        let api_key = var("API_KEY").map_err(|_| common::ChannelError::Permanent(format!("{prefix}_API_KEY must be set")))?;

        let request_timeout_seconds = var("REQUEST_TIMEOUT_SECONDS").unwrap_or_else(|_| "10".to_string()).parse().unwrap_or(10);
        let rate_limit_per_minute = var("RATE_LIMIT_PER_MINUTE").unwrap_or_else(|_| "600".to_string()).parse().unwrap_or(600);
        let rate_limit_burst = var("RATE_LIMIT_BURST").unwrap_or_else(|_| "30".to_string()).parse().unwrap_or(30);
        let max_retry_attempts = var("MAX_RETRY_ATTEMPTS").unwrap_or_else(|_| "3".to_string()).parse().unwrap_or(3);
        let initial_retry_delay_ms = var("INITIAL_RETRY_DELAY_MS").unwrap_or_else(|_| "500".to_string()).parse().unwrap_or(500);
        let max_retry_delay_ms = var("MAX_RETRY_DELAY_MS").unwrap_or_else(|_| "30000".to_string()).parse().unwrap_or(30000);

        Ok(Self {
            base_url,
            api_key,
            request_timeout_seconds,
            rate_limit_per_minute,
            rate_limit_burst,
            max_retry_attempts,
            initial_retry_delay_ms,
            max_retry_delay_ms,
        })
    }
}

/// Worker pool sizing shared across all three channels.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPoolConfig {
    pub workers: usize,
    pub queue_capacity: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self { workers: 32, queue_capacity: 1024 }
    }
}
