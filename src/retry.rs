//! Retry combinator for transient I/O failures
//!
//! Bounded exponential backoff with random jitter, plus an optional
//! per-operation deadline. Logical errors (path syntax, element not found,
//! write conflicts, validation) are never retried.

use rand::Rng;
use std::time::{Duration, Instant};

use crate::error::{CodeHemError, Result};

/// Backoff configuration for retriable operations
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Overall deadline; exceeding it raises `TimeoutError`
    pub deadline: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(500),
            deadline: None,
        }
    }
}

impl RetryPolicy {
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Run `operation`, retrying transient failures with backoff.
    ///
    /// Delay before attempt `n` is `base * 2^(n-1)` capped at `max_delay`,
    /// scaled by a random jitter factor in `[0.5, 1.0]`.
    pub fn run<T, F>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let started = Instant::now();
        let mut attempts = 0;

        loop {
            match operation() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempts + 1 < self.max_attempts => {
                    attempts += 1;
                    let exp = self
                        .base_delay
                        .saturating_mul(1 << (attempts - 1).min(16) as u32)
                        .min(self.max_delay);
                    let jitter = rand::rng().random_range(0.5..=1.0);
                    let delay = exp.mul_f64(jitter);

                    if let Some(deadline) = self.deadline {
                        if started.elapsed() + delay > deadline {
                            return Err(CodeHemError::Timeout { attempts });
                        }
                    }
                    std::thread::sleep(delay);
                }
                Err(err) => return Err(err),
            }
        }
    }
}
