//! Token bucket rate limiter owned by each indexer.

use serde::Serialize;
use std::time::{Duration, Instant};

/// Rate limit status for an indexer.
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitStatus {
    pub requests: u32,
    pub interval_secs: u64,
    pub tokens_available: f32,
    pub next_available_in_ms: Option<u64>,
}

/// Token bucket allowing `requests` per `interval`.
///
/// Tokens are added at a constant rate and consumed when requests are made.
/// The bucket starts full.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f32,
    tokens: f32,
    /// Tokens added per second.
    refill_rate: f32,
    interval: Duration,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(requests: u32, interval: Duration) -> Self {
        let capacity = requests as f32;
        let secs = interval.as_secs_f32().max(f32::EPSILON);
        Self {
            capacity,
            tokens: capacity,
            refill_rate: capacity / secs,
            interval,
            last_refill: Instant::now(),
        }
    }

    /// Try to acquire a token.
    ///
    /// Returns `Err(wait_duration)` if rate limited.
    pub fn try_acquire(&mut self) -> Result<(), Duration> {
        self.refill();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            Err(self.wait_for_token())
        }
    }

    pub fn status(&mut self) -> RateLimitStatus {
        self.refill();
        RateLimitStatus {
            requests: self.capacity as u32,
            interval_secs: self.interval.as_secs(),
            tokens_available: self.tokens,
            next_available_in_ms: if self.tokens >= 1.0 {
                None
            } else {
                Some(self.wait_for_token().as_millis() as u64)
            },
        }
    }

    fn wait_for_token(&self) -> Duration {
        if self.refill_rate <= 0.0 {
            return self.interval;
        }
        Duration::from_secs_f32((1.0 - self.tokens) / self.refill_rate)
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f32();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[test]
    fn test_token_bucket_new() {
        let bucket = TokenBucket::new(10, Duration::from_secs(60));
        assert_eq!(bucket.capacity, 10.0);
        assert_eq!(bucket.tokens, 10.0);
        assert!((bucket.refill_rate - 10.0 / 60.0).abs() < 0.001);
    }

    #[test]
    fn test_token_bucket_acquire_until_empty() {
        let mut bucket = TokenBucket::new(3, Duration::from_secs(60));
        for _ in 0..3 {
            assert!(bucket.try_acquire().is_ok());
        }
        assert!(bucket.try_acquire().is_err());
    }

    #[test]
    fn test_token_bucket_returns_wait_time() {
        let mut bucket = TokenBucket::new(10, Duration::from_secs(60));
        for _ in 0..10 {
            bucket.try_acquire().unwrap();
        }

        let wait = bucket.try_acquire().unwrap_err();
        // 10 per minute refills one token every 6 seconds
        assert!(wait.as_secs() <= 6);
        assert!(wait.as_millis() > 0);
    }

    #[test]
    fn test_token_bucket_status() {
        let mut bucket = TokenBucket::new(2, Duration::from_secs(10));
        let status = bucket.status();
        assert_eq!(status.requests, 2);
        assert_eq!(status.interval_secs, 10);
        assert!(status.next_available_in_ms.is_none());

        bucket.try_acquire().unwrap();
        bucket.try_acquire().unwrap();
        let status = bucket.status();
        assert!(status.tokens_available < 1.0);
        assert!(status.next_available_in_ms.is_some());
    }

    #[tokio::test]
    async fn test_token_bucket_refill() {
        let mut bucket = TokenBucket::new(10, Duration::from_secs(1));
        for _ in 0..10 {
            bucket.try_acquire().unwrap();
        }

        sleep(Duration::from_millis(150)).await;
        assert!(bucket.try_acquire().is_ok());
    }
}
