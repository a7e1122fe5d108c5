//! Retry with exponential backoff for fallible async operations.
//!
//! [`retry_with_backoff`] re-runs an operation until it succeeds, fails with an error that is not transient, or
//! runs out of attempts. The delay before retry `n` (counting from zero) is `base_delay * multiplier^n`.
use std::{fmt::Display, future::Future, time::Duration};

use backon::{ExponentialBuilder, Retryable};
use log::*;

use crate::traits::PaymentProviderError;

/// Classifies errors into those worth retrying and those that will fail again.
pub trait TransientError {
    fn is_transient(&self) -> bool;
}

impl TransientError for PaymentProviderError {
    fn is_transient(&self) -> bool {
        PaymentProviderError::is_transient(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first. Values below 1 are treated as 1.
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub multiplier: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay: Duration::from_millis(200), multiplier: 2.0 }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, base_delay: Duration, multiplier: f32) -> Self {
        Self { max_attempts, base_delay, multiplier }
    }

    /// A policy that makes exactly one attempt.
    pub fn no_retries() -> Self {
        Self { max_attempts: 1, ..Default::default() }
    }

    /// The delay before the final retry, which is the longest one.
    fn max_delay(&self) -> Duration {
        let retries = self.max_attempts.saturating_sub(1).min(i32::MAX as usize) as i32;
        self.base_delay.mul_f64(f64::from(self.multiplier.max(1.0)).powi((retries - 1).max(0)))
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.base_delay)
            .with_max_delay(self.max_delay())
            .with_factor(self.multiplier.max(1.0))
            .with_max_times(self.max_attempts.saturating_sub(1))
    }
}

/// Runs `op` under the given retry policy.
///
/// Only errors for which [`TransientError::is_transient`] returns true are retried. Any other error, or the last
/// transient one once the attempts are used up, is returned as is.
pub async fn retry_with_backoff<T, E, F, Fut>(policy: &RetryPolicy, op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: TransientError + Display,
{
    op.retry(policy.backoff())
        .when(|e: &E| e.is_transient())
        .notify(|e: &E, delay: Duration| {
            warn!("🔁️ Transient failure: {e}. Retrying in {}ms", delay.as_millis());
        })
        .await
}
