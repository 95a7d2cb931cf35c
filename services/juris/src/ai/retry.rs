//! services/juris/src/ai/retry.rs
//!
//! Retry with linear backoff, independent of any transport.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// How many times to try and how long to wait in between.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Never less than 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn linear(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay after the given failed attempt (1-based): `base * attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::linear(3, Duration::from_secs(2))
    }
}

/// Why `with_retry` gave up.
#[derive(Debug, thiserror::Error)]
pub enum RetryFailure<E> {
    /// Every attempt failed with a retryable error.
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },
    /// An error the classifier refused to retry.
    #[error("failed on attempt {attempt}: {error}")]
    Fatal { attempt: u32, error: E },
}

impl<E> RetryFailure<E> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryFailure::Exhausted { attempts, .. } => *attempts,
            RetryFailure::Fatal { attempt, .. } => *attempt,
        }
    }

    pub fn into_inner(self) -> E {
        match self {
            RetryFailure::Exhausted { last, .. } => last,
            RetryFailure::Fatal { error, .. } => error,
        }
    }
}

/// Runs `operation` (given the 1-based attempt number) until it succeeds,
/// fails with an error `is_retryable` rejects, or `max_attempts` is reached.
/// Between attempts it sleeps `backoff(attempt)`.
pub async fn with_retry<T, E, Op, Fut, C, B>(
    mut operation: Op,
    is_retryable: C,
    max_attempts: u32,
    backoff: B,
) -> Result<T, RetryFailure<E>>
where
    Op: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> bool,
    B: Fn(u32) -> Duration,
    E: Display,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) if !is_retryable(&error) => {
                return Err(RetryFailure::Fatal { attempt, error })
            }
            Err(last) if attempt >= max_attempts => {
                return Err(RetryFailure::Exhausted {
                    attempts: attempt,
                    last,
                })
            }
            Err(error) => {
                let delay = backoff(attempt);
                warn!(attempt, max_attempts, ?delay, "Retryable failure: {}", error);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
