use rand::Rng;
use std::time::Duration;

/// Exponential backoff with full jitter.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub max_retries: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            max_retries: 3,
        }
    }
}

pub fn calculate_backoff(attempt: u32, config: &RetryConfig) -> Duration {
    let base = config.initial_delay.as_millis() as f64 * config.multiplier.powi(attempt as i32);
    let capped = base.min(config.max_delay.as_millis() as f64);
    let jittered = rand::thread_rng().gen_range(0.0..=capped);
    Duration::from_millis(jittered as u64)
}

/// A failure a caller can mark as worth retrying or not; channel and bus
/// errors implement this so `retry_if_retryable` can stop early on
/// permanent failures instead of burning through the full attempt budget.
pub trait RetryableError {
    fn is_retryable(&self) -> bool;
}

/// Retries `op` up to `config.max_retries` times regardless of error
/// kind, sleeping with jittered backoff between attempts.
pub async fn retry<T, E, F, Fut>(config: &RetryConfig, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < config.max_retries => {
                tokio::time::sleep(calculate_backoff(attempt, config)).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Like [`retry`], but stops immediately on an error that reports itself
/// as non-retryable, instead of waiting out the remaining attempt budget.
pub async fn retry_if_retryable<T, E, F, Fut>(config: &RetryConfig, mut op: F) -> Result<T, E>
where
    E: RetryableError,
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < config.max_retries && err.is_retryable() => {
                tokio::time::sleep(calculate_backoff(attempt, config)).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn backoff_never_exceeds_max_delay() {
        let config = RetryConfig::default();
        for attempt in 0..10 {
            let delay = calculate_backoff(attempt, &config);
            assert!(delay <= config.max_delay);
        }
    }

    #[derive(Debug)]
    struct Flaky;

    impl RetryableError for Flaky {
        fn is_retryable(&self) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn retry_if_retryable_stops_on_permanent_error() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig { max_retries: 5, ..RetryConfig::default() };
        let result: Result<(), Flaky> = retry_if_retryable(&config, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Flaky) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retry_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            ..RetryConfig::default()
        };
        let result: Result<u32, &str> = retry(&config, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { if n < 2 { Err("not yet") } else { Ok(42) } }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
    }
}
