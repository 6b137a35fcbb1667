use std::fmt::Display;

use tokio::time::{sleep, Duration};
use tracing::{error, warn};

use crate::config::settings::RetryConfig;

#[derive(Debug, Clone)]
pub struct RetrySettings {
    pub attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl From<Option<&RetryConfig>> for RetrySettings {
    fn from(retry: Option<&RetryConfig>) -> Self {
        Self {
            attempts: retry.and_then(|r| r.attempts).unwrap_or(3).max(1),
            base_delay_ms: retry.and_then(|r| r.base_delay_ms).unwrap_or(200),
            max_delay_ms: retry.and_then(|r| r.max_delay_ms).unwrap_or(1000),
        }
    }
}

impl RetrySettings {
    /// Run `operation` until it succeeds, attempts run out, or `is_retryable` says stop.
    pub async fn run_with_retry<F, Fut, T, E>(
        &self,
        mut operation: F,
        is_retryable: impl Fn(&E) -> bool,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut delay = self.base_delay_ms;
        let attempts = self.attempts.max(1);

        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < attempts && is_retryable(&e) => {
                    warn!("Attempt {attempt}/{attempts} failed: {e}");
                    sleep(Duration::from_millis(delay)).await;
                    delay = (delay * 2).min(self.max_delay_ms);
                    attempt += 1;
                }
                Err(e) => {
                    error!("giving up after {attempt} attempts: {e}");
                    return Err(e);
                }
            }
        }
    }
}
