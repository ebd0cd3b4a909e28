//! Single-retry policy for transactional operations.
//!
//! # Responsibility
//! - Replay an aborted transaction exactly once.
//! - Leave non-transient failures untouched.
//!
//! # Invariants
//! - The wrapped operation must be idempotent; every core write path is.
//! - At most two attempts are made per call.

use log::warn;

/// Error types that can tell a lock/abort failure from a semantic one.
pub trait TransientError {
    /// Returns `true` when replaying the whole operation may succeed.
    fn is_transient(&self) -> bool;
}

/// Runs `op`, and runs it a second time if the first attempt failed with a
/// transient error. The second failure is returned as-is.
pub fn retry_transient<T, E, F>(operation: &'static str, mut op: F) -> Result<T, E>
where
    E: TransientError + std::fmt::Display,
    F: FnMut() -> Result<T, E>,
{
    match op() {
        Err(err) if err.is_transient() => {
            warn!(
                "event=tx_retry module=db status=retry operation={} error={}",
                operation, err
            );
            op()
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::{retry_transient, TransientError};
    use std::cell::Cell;
    use std::fmt::{Display, Formatter};

    #[derive(Debug, PartialEq, Eq)]
    enum FakeError {
        Busy,
        Fatal,
    }

    impl Display for FakeError {
        fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
            write!(f, "{self:?}")
        }
    }

    impl TransientError for FakeError {
        fn is_transient(&self) -> bool {
            matches!(self, Self::Busy)
        }
    }

    #[test]
    fn transient_failure_is_retried_once() {
        let attempts = Cell::new(0);
        let result: Result<u32, FakeError> = retry_transient("test", || {
            attempts.set(attempts.get() + 1);
            if attempts.get() == 1 {
                Err(FakeError::Busy)
            } else {
                Ok(7)
            }
        });
        assert_eq!(result, Ok(7));
        assert_eq!(attempts.get(), 2);
    }

    #[test]
    fn second_transient_failure_is_surfaced() {
        let attempts = Cell::new(0);
        let result: Result<u32, FakeError> = retry_transient("test", || {
            attempts.set(attempts.get() + 1);
            Err(FakeError::Busy)
        });
        assert_eq!(result, Err(FakeError::Busy));
        assert_eq!(attempts.get(), 2);
    }

    #[test]
    fn fatal_failure_is_not_retried() {
        let attempts = Cell::new(0);
        let result: Result<u32, FakeError> = retry_transient("test", || {
            attempts.set(attempts.get() + 1);
            Err(FakeError::Fatal)
        });
        assert_eq!(result, Err(FakeError::Fatal));
        assert_eq!(attempts.get(), 1);
    }
}
