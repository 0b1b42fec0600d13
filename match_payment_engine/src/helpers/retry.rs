use std::{fmt::Display, future::Future, time::Duration};

use log::*;

/// Bounded exponential backoff for transient store failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 5, base_delay: Duration::from_millis(50) }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self { max_attempts: max_attempts.max(1), base_delay }
    }

    /// The delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`, plus up to 50% random jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(10);
        let delay = self.base_delay * factor;
        let jitter_ms = (delay.as_millis() as u64 / 2).max(1);
        delay + Duration::from_millis(rand::random::<u64>() % jitter_ms)
    }

    /// Runs `op` until it succeeds, fails with an error that `is_retryable` rejects, or attempts run out.
    pub async fn run<T, E, F, Fut, R>(&self, label: &str, is_retryable: R, mut op: F) -> Result<T, E>
    where
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: Fn(&E) -> bool,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if attempt < self.max_attempts && is_retryable(&e) => {
                    let delay = self.delay_for(attempt);
                    debug!("🔄️ {label} failed on attempt {attempt} ({e}). Retrying in {}ms", delay.as_millis());
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                },
                Err(e) => return Err(e),
            }
        }
    }
}
