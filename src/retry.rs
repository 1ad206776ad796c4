// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bounded retry with attempt-scaled delay.
//!
//! Network reads and relay submissions retry transient failures a bounded
//! number of times. The policy is deliberately small: callers choose the
//! attempt budget and base delay, and classify which errors are worth
//! retrying via the predicate.

use std::future::Future;
use std::time::Duration;

/// Retry configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Base delay between attempts; attempt `n` waits `delay_ms * n`.
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 500,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            delay_ms: 0,
        }
    }
}

/// Invoke `operation` up to `policy.max_attempts` times.
///
/// If `should_retry` returns false for an error, that error is propagated
/// immediately without consuming remaining attempts. On exhaustion the
/// final error is propagated.
pub async fn with_retry_if<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    should_retry: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let attempts = policy.max_attempts.max(1);

    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if !should_retry(&e) {
                    return Err(e);
                }
                if attempt >= attempts {
                    return Err(e);
                }
                tracing::debug!(
                    attempt,
                    max_attempts = attempts,
                    error = %e,
                    "Retrying after transient failure"
                );
                tokio::time::sleep(Duration::from_millis(
                    policy.delay_ms.saturating_mul(attempt as u64),
                ))
                .await;
                attempt += 1;
            }
        }
    }
}

/// [`with_retry_if`] retrying every error kind.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    with_retry_if(policy, |_| true, operation).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, thiserror::Error)]
    #[error("{0}")]
    struct TestError(String);

    #[tokio::test]
    async fn returns_first_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 5,
            delay_ms: 0,
        };

        let result: Result<u32, TestError> = with_retry(&policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(42) }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_attempts_and_propagates_final_error() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 3,
            delay_ms: 0,
        };

        let result: Result<u32, TestError> = with_retry(&policy, || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Err(TestError(format!("attempt {}", n))) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.unwrap_err().0, "attempt 3");
    }

    #[tokio::test]
    async fn recovers_midway() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 5,
            delay_ms: 0,
        };

        let result: Result<u32, TestError> = with_retry(&policy, || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err(TestError("not yet".to_string()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_immediately_when_not_retryable() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 5,
            delay_ms: 0,
        };

        let result: Result<u32, TestError> = with_retry_if(
            &policy,
            |e: &TestError| !e.0.contains("fatal"),
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError("fatal: rejected".to_string())) }
            },
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
