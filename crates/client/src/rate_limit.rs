//! Minimum-interval rate limiting shared by the metadata clients.

use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Rate limiter to enforce request intervals.
///
/// Holding the lock across the sleep serializes callers, so concurrent
/// tasks sharing one client queue up rather than burst.
#[derive(Debug)]
pub(crate) struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    pub(crate) fn new(min_interval: Duration) -> Self {
        Self { last_request: Mutex::new(None), min_interval }
    }

    /// Acquire permission to make a request, waiting if necessary.
    pub(crate) async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_request_is_immediate() {
        let limiter = RateLimiter::new(Duration::from_secs(5));
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_second_request_waits() {
        let limiter = RateLimiter::new(Duration::from_millis(150));
        limiter.acquire().await;
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(140));
    }
}
