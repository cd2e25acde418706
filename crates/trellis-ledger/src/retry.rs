//! Bounded whole-operation retry.
//!
//! A retryable failure ([`Error::is_retryable`]) re-runs the entire closure,
//! which begins a fresh transaction; nothing from a failed attempt survives.
//! Other errors return immediately.

use crate::error::{Error, Result};

/// Run `op` up to `attempts` times while it fails with a retryable error.
pub fn with_retries<T, F>(what: &str, attempts: u32, mut op: F) -> Result<T>
where
    F: FnMut(u32) -> Result<T>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt) {
            Err(e) if e.is_retryable() && attempt < attempts => {
                tracing::warn!("{} attempt {}/{} failed: {}", what, attempt, attempts, e);
                attempt += 1;
            }
            Err(e) if e.is_retryable() => {
                tracing::error!("{} gave up after {} attempts: {}", what, attempts, e);
                return Err(e);
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retries_until_success() {
        let result = with_retries("op", 5, |attempt| {
            if attempt < 3 {
                Err(Error::ConcurrentConflict("busy".into()))
            } else {
                Ok(attempt)
            }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn surfaces_conflict_after_limit() {
        let mut calls = 0;
        let result: Result<()> = with_retries("op", 3, |_| {
            calls += 1;
            Err(Error::ConcurrentConflict("busy".into()))
        });
        assert!(matches!(result, Err(Error::ConcurrentConflict(_))));
        assert_eq!(calls, 3);
    }

    #[test]
    fn fatal_errors_are_not_retried() {
        let mut calls = 0;
        let result: Result<()> = with_retries("op", 5, |_| {
            calls += 1;
            Err(Error::RootMissing)
        });
        assert!(matches!(result, Err(Error::RootMissing)));
        assert_eq!(calls, 1);
    }
}
