use std::thread::sleep;
use std::time::{Duration, Instant};

use tracing::debug;

/// Deadline and fixed backoff for one remote operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub deadline: Duration,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub const fn new(deadline: Duration, backoff: Duration) -> Self {
        Self { deadline, backoff }
    }
}

/// Per-operation retry policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub lookup: RetryPolicy,
    pub read: RetryPolicy,
    pub update: RetryPolicy,
    pub delete: RetryPolicy,
}

pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(2);

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            lookup: RetryPolicy::new(Duration::from_secs(10), DEFAULT_BACKOFF),
            read: RetryPolicy::new(Duration::from_secs(30), DEFAULT_BACKOFF),
            update: RetryPolicy::new(Duration::from_secs(120), DEFAULT_BACKOFF),
            delete: RetryPolicy::new(Duration::from_secs(120), DEFAULT_BACKOFF),
        }
    }
}

impl Timeouts {
    /// Same deadlines for every operation, no sleeping between attempts.
    pub const fn immediate(deadline: Duration) -> Self {
        let policy = RetryPolicy::new(deadline, Duration::ZERO);
        Self {
            lookup: policy,
            read: policy,
            update: policy,
            delete: policy,
        }
    }
}

/// Outcome of a single attempt.
#[derive(Debug)]
pub enum Attempt<T, E> {
    Done(T),
    Retry(E),
    Fail(E),
}

/// Run `op` until it is done, fails permanently, or the deadline passes.
///
/// The last retryable error is returned once the deadline has elapsed. At
/// least one attempt is always made.
pub fn retry<T, E, F>(label: &str, policy: RetryPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Attempt<T, E>,
    E: std::fmt::Display,
{
    let started = Instant::now();
    let mut attempt = 0usize;

    loop {
        attempt += 1;
        match op() {
            Attempt::Done(value) => return Ok(value),
            Attempt::Fail(err) => return Err(err),
            Attempt::Retry(err) => {
                if started.elapsed() + policy.backoff >= policy.deadline {
                    debug!(label, attempt, error = %err, "retry deadline reached");
                    return Err(err);
                }
                debug!(label, attempt, error = %err, "retrying after failure");
                sleep(policy.backoff);
            }
        }
    }
}

/// Retry a fallible call while `retryable` accepts its error.
pub fn retry_if<T, E, F, P>(label: &str, policy: RetryPolicy, mut op: F, retryable: P) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    retry(label, policy, || match op() {
        Ok(value) => Attempt::Done(value),
        Err(err) if retryable(&err) => Attempt::Retry(err),
        Err(err) => Attempt::Fail(err),
    })
}
