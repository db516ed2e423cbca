//! Per-source token bucket.
//!
//! Each source owns a bucket of `permits` tokens that is refilled in full at
//! every period boundary. A request takes one token or waits for the next
//! boundary; nothing is ever dropped. Buckets are keyed by source id inside
//! one shared limiter, so concurrent callers of the same source are
//! serialized on its bucket while other sources are left alone.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::RateLimit;

#[derive(Debug)]
struct Bucket {
    available: u32,
    window_start: Instant,
}

impl Bucket {
    fn refill(&mut self, now: Instant, limit: RateLimit) {
        let period = limit.period();
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed >= period {
            let periods = (elapsed.as_nanos() / period.as_nanos().max(1)) as u32;
            self.window_start += period * periods;
            self.available = limit.permits;
        }
    }
}

/// Rate limiter shared by every source of a registry.
///
/// The lock is only held while a bucket is inspected, never across an
/// await, so dropping a waiting future gives up nothing.
#[derive(Debug, Default)]
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until `source_id` may issue one more request.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hondana::config::RateLimit;
    /// use hondana::net::RateLimiter;
    ///
    /// # async fn example() {
    /// let limiter = RateLimiter::new();
    /// let limit = RateLimit::new(2, 1);
    ///
    /// limiter.acquire("madara", limit).await; // immediate
    /// limiter.acquire("madara", limit).await; // immediate
    /// limiter.acquire("madara", limit).await; // waits for the next second
    /// # }
    /// ```
    pub async fn acquire(&self, source_id: &str, limit: RateLimit) {
        loop {
            let wait = {
                let now = Instant::now();
                let mut buckets = self.buckets.lock();
                let bucket = buckets.entry(source_id.to_string()).or_insert_with(|| Bucket {
                    available: limit.permits,
                    window_start: now,
                });
                bucket.refill(now, limit);

                if bucket.available > 0 {
                    bucket.available -= 1;
                    return;
                }
                (bucket.window_start + limit.period()).saturating_duration_since(now)
            };

            tracing::debug!(source = source_id, wait_ms = wait.as_millis() as u64, "rate limited");
            tokio::time::sleep(wait.max(Duration::from_millis(1))).await;
        }
    }

    /// Tokens left in the current window, without waiting.
    pub fn available(&self, source_id: &str, limit: RateLimit) -> u32 {
        let now = Instant::now();
        let mut buckets = self.buckets.lock();
        match buckets.get_mut(source_id) {
            Some(bucket) => {
                bucket.refill(now, limit);
                bucket.available
            }
            None => limit.permits,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn delays_past_the_period_boundary() {
        let limiter = RateLimiter::new();
        let limit = RateLimit::new(2, 1);
        let start = Instant::now();

        limiter.acquire("a", limit).await;
        limiter.acquire("a", limit).await;
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(limiter.available("a", limit), 0);

        // Another source keeps its own bucket.
        limiter.acquire("b", limit).await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        limiter.acquire("a", limit).await;
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_the_bucket() {
        let limiter = Arc::new(RateLimiter::new());
        let limit = RateLimit::new(1, 2);
        let start = Instant::now();

        let tasks: Vec<_> = (0..3)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                tokio::spawn(async move {
                    limiter.acquire("shared", limit).await;
                    start.elapsed()
                })
            })
            .collect();

        let mut elapsed = Vec::new();
        for task in tasks {
            elapsed.push(task.await.unwrap());
        }
        elapsed.sort();

        assert_eq!(elapsed[0], Duration::ZERO);
        assert!(elapsed[1] >= Duration::from_secs(2));
        assert!(elapsed[2] >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_waiter_takes_no_token() {
        let limiter = RateLimiter::new();
        let limit = RateLimit::new(1, 1);
        limiter.acquire("c", limit).await;

        let waited = tokio::time::timeout(Duration::from_millis(100), limiter.acquire("c", limit)).await;
        assert!(waited.is_err());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(limiter.available("c", limit), 1);
    }
}
