//! Retry accounting for interrupted wait calls
//!
//! An `EINTR` from `waitpid(2)` means a signal arrived before any child
//! changed state. The supervisor always retries it; this type counts the
//! attempts and enforces the optional bound from
//! [`SupervisorConfig`](crate::config::SupervisorConfig).

use crate::error::WaitError;
use tracing::{trace, warn};

/// Interrupted waits between two warnings in an unbounded streak
const WARN_EVERY: u32 = 64;

/// Attempt counter for one logical wait
#[derive(Debug, Clone)]
pub struct InterruptRetry {
    limit: Option<u32>,
    attempts: u32,
}

impl InterruptRetry {
    /// Start counting; `limit` is the number of interruptions tolerated
    pub fn new(limit: Option<u32>) -> Self {
        Self { limit, attempts: 0 }
    }

    /// Record one interruption.
    ///
    /// Returns an error once more than `limit` interruptions were recorded.
    pub fn record(&mut self) -> Result<(), WaitError> {
        self.attempts = self.attempts.saturating_add(1);

        if let Some(limit) = self.limit {
            if self.attempts > limit {
                warn!(
                    "Giving up after {} interrupted waits (limit {})",
                    self.attempts, limit
                );
                return Err(WaitError::Interrupted {
                    attempts: self.attempts,
                });
            }
        }

        if self.attempts % WARN_EVERY == 0 {
            warn!("Wait interrupted {} times in a row", self.attempts);
        } else {
            trace!("Wait interrupted, retrying (attempt {})", self.attempts);
        }
        Ok(())
    }

    /// Interruptions recorded so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}
