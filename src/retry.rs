// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::events::{Event, SharedReporter};

/// Bounded retries with a fixed delay between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts are `max_retries + 1`
    pub max_retries: u32,
    /// Pause between a failed attempt and the next one
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// The error that ended a retried operation
#[derive(Debug)]
pub struct RetryError<E> {
    pub attempts: u32,
    pub last_error: E,
    /// False when the error was not retryable and attempts were left
    pub exhausted: bool,
}

/// Run `operation` until it succeeds or the policy is exhausted.
///
/// Errors for which `retryable` returns false end the loop at once. The delay
/// is awaited on the calling task only. The operation receives the zero-based
/// attempt number.
pub async fn run_with_retry<T, E, R, F, Fut>(
    policy: &RetryPolicy,
    reporter: &SharedReporter,
    retryable: R,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    E: Display,
    R: Fn(&E) -> bool,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;

    loop {
        match operation(attempt).await {
            Ok(value) => {
                if attempt > 0 {
                    reporter.report(Event::info("Retry succeeded."));
                }
                return Ok(value);
            }
            Err(e) if !retryable(&e) => {
                reporter.report(Event::warning(format!("Attempt failed: {}. Not retrying.", e)));
                return Err(RetryError {
                    attempts: attempt + 1,
                    last_error: e,
                    exhausted: false,
                });
            }
            Err(e) if attempt < policy.max_retries => {
                reporter.report(Event::warning(format!(
                    "Attempt failed: {}. Retry {}/{} in {} seconds...",
                    e,
                    attempt + 1,
                    policy.max_retries,
                    policy.delay.as_secs_f64()
                )));
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
            Err(e) => {
                if policy.max_retries > 0 {
                    reporter.report(Event::warning("All retries failed."));
                }
                return Err(RetryError {
                    attempts: attempt + 1,
                    last_error: e,
                    exhausted: true,
                });
            }
        }
    }
}
