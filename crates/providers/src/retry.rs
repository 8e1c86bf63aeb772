//! Retry wrapper with exponential backoff.
//!
//! Only failures that happen before a stream starts are retried, and only
//! when the error is transient (HTTP 429 and 5xx). The delay before retry
//! `n` (0-based index of the failed attempt) is `base_delay * 2^n`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use codeclaw_core::error::ProviderError;
use codeclaw_core::provider::*;
use tracing::warn;

/// Retry settings.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay to wait after attempt `attempt` (0-based) failed.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1_000),
        }
    }
}

/// A provider that repeats transient failures of an inner provider.
pub struct RetryProvider {
    inner: Arc<dyn codeclaw_core::Provider>,
    policy: RetryPolicy,
}

impl RetryProvider {
    pub fn new(inner: Arc<dyn codeclaw_core::Provider>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl codeclaw_core::Provider for RetryProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            match self.inner.stream(request.clone()).await {
                Ok(rx) => return Ok(rx),
                Err(e) if e.is_retryable() && attempt + 1 < max_attempts => {
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        provider = %self.inner.name(),
                        attempt = attempt + 1,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient provider error, retrying"
                    );
                    // Dropping the run future cancels this sleep.
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
