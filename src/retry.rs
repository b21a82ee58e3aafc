// Copyright (c) 2025 - Cowboy AI, Inc.
//! Retry on Conflict
//!
//! Multi-step mutations against the shared resource pool are retried as a
//! whole when the commit loses an optimistic-concurrency race.
//!
//! ```text
//! attempt 1 ─► conflict ─► attempt 2 ─► conflict ─► ... ─► NoRetriesLeft
//!          └─► other error ─► Fatal (never retried)
//! ```
//!
//! Callers pass the whole unit of work as a closure, so every attempt
//! starts again from a fresh snapshot.

use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Bounded retry budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one
    pub retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32) -> Self {
        Self {
            retries,
            backoff: Duration::ZERO,
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.retries + 1
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RetryError<E: fmt::Display> {
    #[error("{0}")]
    Fatal(E),

    #[error("no retries left after {attempts} attempts, last conflict: {last}")]
    NoRetriesLeft { attempts: u32, last: E },
}

impl<E: fmt::Display> RetryError<E> {
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Fatal(e) | RetryError::NoRetriesLeft { last: e, .. } => e,
        }
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// budget is spent
///
/// Backoff sleeps the calling thread; async callers use
/// [`retry_on_conflict_async`].
pub fn retry_on_conflict<T, E, P, F>(policy: RetryPolicy, is_retryable: P, mut op: F) -> Result<T, RetryError<E>>
where
    E: fmt::Display,
    P: Fn(&E) -> bool,
    F: FnMut(u32) -> Result<T, E>,
{
    let mut attempt = 1;
    loop {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(e) => {
                if let Some(err) = give_up(&policy, &is_retryable, attempt, e) {
                    return Err(err);
                }
                if !policy.backoff.is_zero() {
                    std::thread::sleep(policy.backoff);
                }
                attempt += 1;
            }
        }
    }
}

/// [`retry_on_conflict`] with the backoff awaited on the tokio timer
pub async fn retry_on_conflict_async<T, E, P, F>(
    policy: RetryPolicy,
    is_retryable: P,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    E: fmt::Display,
    P: Fn(&E) -> bool,
    F: FnMut(u32) -> Result<T, E>,
{
    let mut attempt = 1;
    loop {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(e) => {
                if let Some(err) = give_up(&policy, &is_retryable, attempt, e) {
                    return Err(err);
                }
                if !policy.backoff.is_zero() {
                    tokio::time::sleep(policy.backoff).await;
                }
                attempt += 1;
            }
        }
    }
}

/// The terminal error for a failed attempt, or `None` to go again
fn give_up<E, P>(policy: &RetryPolicy, is_retryable: &P, attempt: u32, e: E) -> Option<RetryError<E>>
where
    E: fmt::Display,
    P: Fn(&E) -> bool,
{
    if !is_retryable(&e) {
        return Some(RetryError::Fatal(e));
    }
    if attempt >= policy.max_attempts() {
        warn!(attempts = attempt, error = %e, "Retry budget exhausted");
        return Some(RetryError::NoRetriesLeft {
            attempts: attempt,
            last: e,
        });
    }
    debug!(attempt, error = %e, "Conflict, retrying");
    None
}
