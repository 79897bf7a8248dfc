//! # Fibonacci Backoff
//!
//! Reconnect delays that grow more slowly than exponential backoff.
//! Sequence with the client defaults: 1s, 1s, 2s, 3s, 5s, 5s (max).

use std::time::Duration;

/// Fibonacci backoff calculator
///
/// Each backoff is the sum of the previous two, capped at the maximum.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    min_secs: u64,
    prev_secs: u64,
    current_secs: u64,
    max_secs: u64,
}

impl FibonacciBackoff {
    /// Create a new backoff with minimum and maximum values in seconds
    #[must_use]
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            min_secs,
            prev_secs: 0,
            current_secs: min_secs,
            max_secs,
        }
    }

    /// Get the next backoff duration and advance the sequence
    pub fn next_backoff(&mut self) -> Duration {
        let result = self.current_secs;

        let next = self.prev_secs + self.current_secs;
        self.prev_secs = self.current_secs;
        self.current_secs = std::cmp::min(next, self.max_secs);

        Duration::from_secs(result)
    }

    /// Reset the backoff to the initial state
    pub fn reset(&mut self) {
        self.prev_secs = 0;
        self.current_secs = self.min_secs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fibonacci_sequence() {
        let mut backoff = FibonacciBackoff::new(1, 5);

        let secs: Vec<u64> = (0..7).map(|_| backoff.next_backoff().as_secs()).collect();
        assert_eq!(secs, vec![1, 1, 2, 3, 5, 5, 5]);
    }

    #[test]
    fn test_reset() {
        let mut backoff = FibonacciBackoff::new(1, 5);
        backoff.next_backoff();
        backoff.next_backoff();
        backoff.next_backoff();

        backoff.reset();
        assert_eq!(backoff.next_backoff(), Duration::from_secs(1));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(1));
    }
}
