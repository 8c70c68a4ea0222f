// SPDX-License-Identifier: GPL-3.0-or-later

use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration, Instant};

/// Rate limiter for AcoustID API calls.
///
/// AcoustID allows 3 requests per second per client. This limiter keeps the
/// grant times of the last `max_requests` calls and makes callers wait until
/// the oldest of them has left the rolling window. Waiters queue on a fair
/// mutex, so they are served in arrival order.
///
/// Clones share state: hand the same limiter to every client that talks to
/// the same service.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    granted: Arc<Mutex<VecDeque<Instant>>>,
}

impl RateLimiter {
    /// Allow at most `max_requests` calls in any rolling `window`.
    ///
    /// A zero window disables limiting; `max_requests` is at least 1.
    pub fn new(max_requests: usize, window: Duration) -> Self {
        let max_requests = max_requests.max(1);
        Self {
            max_requests,
            window,
            granted: Arc::new(Mutex::new(VecDeque::with_capacity(max_requests))),
        }
    }

    /// Create a rate limiter with AcoustID defaults (3 requests per second).
    pub fn acoustid_default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }

    /// A limiter that never waits.
    pub fn unlimited() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Wait until a request can be made according to the rate limit.
    pub async fn acquire(&self) {
        if self.window.is_zero() {
            return;
        }

        // The lock is held while sleeping so later callers queue behind us.
        let mut granted = self.granted.lock().await;

        loop {
            let now = Instant::now();
            while let Some(&oldest) = granted.front() {
                if now.duration_since(oldest) >= self.window {
                    granted.pop_front();
                } else {
                    break;
                }
            }

            if granted.len() < self.max_requests {
                granted.push_back(now);
                return;
            }

            if let Some(&oldest) = granted.front() {
                let wait_time = self.window - now.duration_since(oldest);
                tracing::trace!(
                    target: "acoustid",
                    "rate limiting: waiting {:?}",
                    wait_time
                );
                sleep(wait_time).await;
            }
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::acoustid_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_allows_burst_up_to_limit() {
        let limiter = RateLimiter::new(3, Duration::from_secs(1));
        let start = Instant::now();

        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);

        // Fourth request must wait for the first to leave the window
        limiter.acquire().await;
        assert!(
            start.elapsed() >= Duration::from_secs(1),
            "expected >= 1s, got {:?}",
            start.elapsed()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_multiple_windows() {
        let limiter = RateLimiter::new(3, Duration::from_millis(100));
        let start = Instant::now();

        for _ in 0..9 {
            limiter.acquire().await;
        }

        // 9 requests at 3 per window need at least two full windows
        assert!(
            start.elapsed() >= Duration::from_millis(200),
            "expected >= 200ms, got {:?}",
            start.elapsed()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_concurrent_callers_respect_window() {
        let limiter = RateLimiter::acoustid_default();
        let grants = Arc::new(std::sync::Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for _ in 0..12 {
            let limiter = limiter.clone();
            let grants = Arc::clone(&grants);
            handles.push(tokio::spawn(async move {
                for _ in 0..2 {
                    limiter.acquire().await;
                    grants.lock().unwrap().push(Instant::now());
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let mut grants = grants.lock().unwrap().clone();
        grants.sort();
        assert_eq!(grants.len(), 24);

        // Any 4 consecutive grants must span at least one full window
        for window in grants.windows(4) {
            assert!(
                window[3].duration_since(window[0]) >= Duration::from_secs(1),
                "4 grants within {:?}",
                window[3].duration_since(window[0])
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_shared_between_clones() {
        let limiter = RateLimiter::new(1, Duration::from_millis(500));
        let clone = limiter.clone();
        let start = Instant::now();

        limiter.acquire().await;
        clone.acquire().await;

        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unlimited_never_waits() {
        let limiter = RateLimiter::unlimited();
        let start = Instant::now();

        for _ in 0..100 {
            limiter.acquire().await;
        }

        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_zero_max_requests_is_clamped() {
        let limiter = RateLimiter::new(0, Duration::from_secs(1));
        assert_eq!(limiter.max_requests(), 1);
    }
}
