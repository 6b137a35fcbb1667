use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use crate::cache::token_cache::TokenCache;
use crate::error::AuthError;
use crate::resilience::retry::RetrySettings;
use crate::sinks::TokenStore;
use crate::sources::ExchangeToken;

const MIN_SLEEP: Duration = Duration::from_secs(1);
/// Ceiling for failed cycles, and the pause after a failure retrying cannot fix.
const MAX_FAILURE_SLEEP: Duration = Duration::from_secs(300);

impl<E: ExchangeToken, S: TokenStore> TokenCache<E, S> {
    /// Keep the token warm: refresh through the cache gate, then sleep until it is due again.
    pub async fn loop_refresh_token(&self, retry: &RetrySettings) {
        let mut failures: u32 = 0;
        loop {
            info!("refresh token cycle start");
            let result = retry
                .run_with_retry(|| self.get_valid_token(), AuthError::is_retryable)
                .await;

            let sleep_for = match result {
                Ok(_) => {
                    failures = 0;
                    match self.refresh_due_at().await {
                        Some(due_at) => until(due_at, self.now()),
                        None => MIN_SLEEP,
                    }
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    error!(error = %e, failures, retryable = e.is_retryable(), "IAM token refresh cycle failed");
                    failure_pause(retry, failures, e.is_retryable())
                }
            };

            debug!("sleep interval {} seconds", sleep_for.as_secs());
            tokio::time::sleep(sleep_for).await;
        }
    }
}

fn until(due_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (due_at - now)
        .to_std()
        .map(|d| d.max(MIN_SLEEP))
        .unwrap_or(MIN_SLEEP)
}

/// Pause after the `failures`-th failed cycle in a row: doubles from `max_delay_ms`.
fn failure_pause(retry: &RetrySettings, failures: u32, retryable: bool) -> Duration {
    if !retryable {
        return MAX_FAILURE_SLEEP;
    }
    let first = Duration::from_millis(retry.max_delay_ms).max(MIN_SLEEP);
    first
        .saturating_mul(2u32.saturating_pow(failures.saturating_sub(1)))
        .min(MAX_FAILURE_SLEEP)
}
