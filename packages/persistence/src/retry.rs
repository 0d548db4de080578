//! Retry classification and backoff for remote saves.

use crate::transport::TransportError;
use prototyper_editor::SaveType;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// How a failure should be treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Transient; worth another attempt
    Retriable,
    /// The request itself is wrong; repeating it cannot help
    Permanent,
    /// Credentials are missing or expired
    Auth,
}

impl ErrorClass {
    pub fn is_retriable(self) -> bool {
        self == ErrorClass::Retriable
    }
}

pub fn classify(error: &TransportError) -> ErrorClass {
    match error {
        TransportError::Network(_)
        | TransportError::Server { .. }
        | TransportError::RateLimited
        | TransportError::Offline => ErrorClass::Retriable,
        TransportError::Unauthorized(_) => ErrorClass::Auth,
        TransportError::NotFound
        | TransportError::Client { .. }
        | TransportError::InvalidResponse(_) => ErrorClass::Permanent,
    }
}

/// Attempt budget and backoff bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts for a manual save
    pub manual_attempts: u32,
    /// Total attempts for an autosave
    pub autosave_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            manual_attempts: 3,
            autosave_attempts: 2,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn attempts_for(&self, save_type: SaveType) -> u32 {
        match save_type {
            SaveType::Manual => self.manual_attempts,
            SaveType::Autosave => self.autosave_attempts,
        }
    }

    /// No waiting between attempts
    pub fn immediate(self) -> Self {
        Self {
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            ..self
        }
    }
}

/// Exponential delay, doubling up to a cap
#[derive(Debug)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(policy: &RetryPolicy) -> Self {
        Self {
            base: policy.base_delay,
            max: policy.max_delay,
            current: policy.base_delay.min(policy.max_delay),
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        let next = self.current.checked_mul(2).unwrap_or(self.max);
        self.current = std::cmp::min(next, self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.base.min(self.max);
    }
}

/// Final failure after retries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryFailure {
    pub error: TransportError,
    pub class: ErrorClass,
    pub attempts: u32,
}

/// Run `operation` until it succeeds, fails non-retriably, or the budget
/// for `save_type` is spent. Losing connectivity ends the loop at once so
/// the caller can queue the save instead of backing off.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    save_type: SaveType,
    mut operation: F,
) -> Result<T, RetryFailure>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let budget = policy.attempts_for(save_type).max(1);
    let mut backoff = Backoff::new(policy);
    let mut attempt = 1;

    loop {
        let error = match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        let class = classify(&error);
        let offline = matches!(error, TransportError::Offline);
        if !class.is_retriable() || offline || attempt >= budget {
            tracing::debug!(%error, ?class, attempt, %save_type, "giving up on save");
            return Err(RetryFailure {
                error,
                class,
                attempts: attempt,
            });
        }

        let delay = backoff.next_delay();
        tracing::debug!(%error, attempt, ?delay, %save_type, "retrying save");
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_classification() {
        assert_eq!(classify(&TransportError::Network("reset".into())), ErrorClass::Retriable);
        assert_eq!(classify(&TransportError::from_status(500, "")), ErrorClass::Retriable);
        assert_eq!(classify(&TransportError::RateLimited), ErrorClass::Retriable);
        assert_eq!(classify(&TransportError::NotFound), ErrorClass::Permanent);
        assert_eq!(classify(&TransportError::from_status(400, "")), ErrorClass::Permanent);
        assert_eq!(classify(&TransportError::from_status(401, "")), ErrorClass::Auth);
    }

    #[test]
    fn test_backoff_exponentially_grows() {
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(40),
            ..RetryPolicy::default()
        };
        let mut backoff = Backoff::new(&policy);
        assert_eq!(backoff.next_delay(), Duration::from_millis(10));
        assert_eq!(backoff.next_delay(), Duration::from_millis(20));
        assert_eq!(backoff.next_delay(), Duration::from_millis(40));
        assert_eq!(backoff.next_delay(), Duration::from_millis(40));
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(10));
    }

    #[test]
    fn test_manual_gets_more_attempts() {
        let policy = RetryPolicy::default();
        assert!(policy.attempts_for(SaveType::Manual) > policy.attempts_for(SaveType::Autosave));
    }

    async fn run(error: TransportError, save_type: SaveType) -> (u32, Result<(), RetryFailure>) {
        let calls = AtomicU32::new(0);
        let result = with_retry(&RetryPolicy::default(), save_type, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            let error = error.clone();
            async move { Err::<(), _>(error) }
        })
        .await;
        (calls.load(Ordering::SeqCst), result)
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_errors_are_not_retried() {
        let (calls, result) = run(TransportError::NotFound, SaveType::Manual).await;
        assert_eq!(calls, 1);
        assert_eq!(result.unwrap_err().class, ErrorClass::Permanent);

        let (calls, _) = run(TransportError::from_status(400, "bad"), SaveType::Manual).await;
        assert_eq!(calls, 1);

        let (calls, result) = run(TransportError::from_status(401, ""), SaveType::Manual).await;
        assert_eq!(calls, 1);
        assert_eq!(result.unwrap_err().class, ErrorClass::Auth);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_use_type_budget() {
        let (calls, result) = run(TransportError::from_status(500, ""), SaveType::Manual).await;
        assert_eq!(calls, 3);
        assert_eq!(result.unwrap_err().attempts, 3);

        let (calls, _) = run(TransportError::Network("timeout".into()), SaveType::Autosave).await;
        assert_eq!(calls, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_offline_is_not_retried() {
        let started = tokio::time::Instant::now();
        let (calls, result) = run(TransportError::Offline, SaveType::Manual).await;
        assert_eq!(calls, 1);
        assert_eq!(started.elapsed(), Duration::ZERO);

        let failure = result.unwrap_err();
        assert_eq!(failure.error, TransportError::Offline);
        assert_eq!(failure.attempts, 1);
        // Still transient, so queued replays keep the entry
        assert_eq!(failure.class, ErrorClass::Retriable);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failure() {
        let result = with_retry(&RetryPolicy::default(), SaveType::Autosave, |attempt| async move {
            if attempt == 1 {
                Err(TransportError::from_status(502, "bad gateway"))
            } else {
                Ok(attempt)
            }
        })
        .await;
        assert_eq!(result, Ok(2));
    }
}
