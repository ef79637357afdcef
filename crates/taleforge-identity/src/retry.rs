//! Bounded retry around a fallible async operation.
//!
//! Inserts keyed by generated identifiers can collide. Rather than
//! repeating a retry loop at every insert site, each site hands its
//! attempt to [`with_retry`] together with a predicate naming which
//! failures are worth another try.

use std::fmt::Display;
use std::future::Future;

use serde::{Deserialize, Serialize};

/// How many times an operation may run in total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Values below 1 behave as 1.
    pub max_attempts: u32,
}

impl RetryPolicy {
    /// A policy allowing `max_attempts` runs in total.
    pub const fn attempts(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    /// Run once, never retry.
    pub const NEVER: Self = Self::attempts(1);

    fn effective(self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are used up.
///
/// `op` receives the zero-based attempt number so later attempts can do
/// extra cleanup first. The last error is returned unchanged once attempts
/// run out.
pub async fn with_retry<T, E, F, Fut, P>(
    policy: RetryPolicy,
    retryable: P,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let attempts = policy.effective();
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Err(err) if attempt + 1 < attempts && retryable(&err) => {
                tracing::warn!(attempt, error = %err, "retryable failure, trying again");
                attempt += 1;
            }
            outcome => return outcome,
        }
    }
}
