//! Timeout handlers polled while waiting for a response.

use std::time::{Duration, Instant};

/// Decides what happens when a response takes too long.
pub trait TimeoutHandler: Send {
    /// Returns true once the current wait has lasted too long.
    fn is_timed_out(&self) -> bool;

    /// Called after `is_timed_out` returned true. Returns true to keep
    /// waiting, false to fail the operation.
    fn handle_timeout(&mut self) -> bool;

    /// Restarts the clock. Called whenever data arrives.
    fn reset_timeout(&mut self);
}

/// Gives up once no data has arrived for a fixed duration.
#[derive(Debug, Clone)]
pub struct DefaultTimeoutHandler {
    timeout: Duration,
    started: Instant,
}

impl DefaultTimeoutHandler {
    /// Creates a handler that fails after `timeout` of silence.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            started: Instant::now(),
        }
    }

    /// Returns the configured timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl TimeoutHandler for DefaultTimeoutHandler {
    fn is_timed_out(&self) -> bool {
        self.started.elapsed() >= self.timeout
    }

    fn handle_timeout(&mut self) -> bool {
        tracing::debug!(timeout = ?self.timeout, "giving up waiting for response");
        false
    }

    fn reset_timeout(&mut self) {
        self.started = Instant::now();
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_timeout_expires() {
        let mut handler = DefaultTimeoutHandler::new(Duration::ZERO);
        assert!(handler.is_timed_out());
        assert!(!handler.handle_timeout());
    }

    #[test]
    fn test_reset_restarts_clock() {
        let mut handler = DefaultTimeoutHandler::new(Duration::from_secs(3600));
        handler.reset_timeout();
        assert!(!handler.is_timed_out());
        assert_eq!(handler.timeout(), Duration::from_secs(3600));
    }
}
