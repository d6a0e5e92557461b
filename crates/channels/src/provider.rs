use crate::config::ChannelProviderConfig;
use common::ChannelError;
use governor::{clock::DefaultClock, state::{InMemoryState, NotKeyed}, Quota, RateLimiter};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Rate-limited HTTP client shared by the push/email/sms channel
/// implementations: a token-bucket rate limiter plus a retry-with-backoff
/// loop over an arbitrary JSON body.
pub struct HttpChannelProvider {
    http_client: Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    config: ChannelProviderConfig,
}

impl HttpChannelProvider {
    pub fn new(config: ChannelProviderConfig) -> Result<Self, ChannelError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .user_agent("notification-pipeline/1.0")
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| ChannelError::Permanent(format!("failed to build http client: {e}")))?;

        let per_minute = std::num::NonZeroU32::new(config.rate_limit_per_minute)
            .ok_or_else(|| ChannelError::Permanent("rate_limit_per_minute must be > 0".to_string()))?;
        let burst = std::num::NonZeroU32::new(config.rate_limit_burst)
            .ok_or_else(|| ChannelError::Permanent("rate_limit_burst must be > 0".to_string()))?;
        let rate_limiter = RateLimiter::direct(Quota::per_minute(per_minute).allow_burst(burst));

        info!("channel provider initialized against {}, rate limit {}/min", config.base_url, config.rate_limit_per_minute);

        Ok(Self { http_client, rate_limiter, config })
    }

    /// POSTs `body` to `self.config.base_url`, retrying transient
    /// failures with exponential backoff.
    pub async fn send_with_retry<T: Serialize>(&self, body: &T) -> Result<(), ChannelError> {
        for attempt in 1..=self.config.max_retry_attempts {
            self.rate_limiter.until_ready().await;
            debug!("channel send attempt {} of {}", attempt, self.config.max_retry_attempts);

            match self.send_once(body).await {
                Ok(()) => return Ok(()),
                Err(error) if !error.is_retryable() => {
                    warn!("non-retryable channel error, giving up: {}", error);
                    return Err(error);
                }
                Err(error) => {
                    error!("channel send attempt {} failed: {}", attempt, error);
                    if attempt < self.config.max_retry_attempts {
                        let delay = self.retry_delay(attempt);
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(ChannelError::Transient(format!("exhausted {} retry attempts", self.config.max_retry_attempts)))
    }

    async fn send_once<T: Serialize>(&self, body: &T) -> Result<(), ChannelError> {
        let response = self
            .http_client
            .post(&self.config.base_url)
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ChannelError::Transient(format!("request error: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        if status.as_u16() == 429 {
            return Err(ChannelError::RateLimited(Duration::from_secs(1)));
        }
        if status.is_server_error() {
            return Err(ChannelError::Transient(format!("http {status}: {text}")));
        }
        Err(ChannelError::Permanent(format!("http {status}: {text}")))
    }

    fn retry_delay(&self, attempt: u32) -> Duration {
        let delay_ms = self.config.initial_retry_delay_ms.saturating_mul(2_u64.saturating_pow(attempt - 1));
        Duration::from_millis(delay_ms.min(self.config.max_retry_delay_ms))
    }
}
