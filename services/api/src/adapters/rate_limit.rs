//! services/api/src/adapters/rate_limit.rs
//!
//! In-memory fixed-window rate limiting. Implements the `RateLimitStore`
//! port from the `core` crate so the store can be swapped for a
//! distributed one without touching the web layer.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use coffee_analysis_core::ports::{RateLimitDecision, RateLimitStore};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Requests allowed per identifier per window.
pub const MAX_REQUESTS_PER_WINDOW: u32 = 20;

/// Fixed window length.
pub const WINDOW_SECS: u64 = 60;

/// Once the table tracks more identifiers than this, expired entries are
/// swept on the next check. Keeps the table bounded without a background
/// task.
const EVICTION_THRESHOLD: usize = 10_000;

/// Per-client counter for the current window.
#[derive(Debug, Clone, Copy)]
struct RateLimitEntry {
    count: u32,
    window_expires_at: DateTime<Utc>,
}

/// A coarse fixed-window limiter (not sliding or token-bucket). Bursts at
/// window boundaries are possible but bounded; accepted trade-off.
pub struct InMemoryRateLimiter {
    entries: Mutex<HashMap<String, RateLimitEntry>>,
}

impl InMemoryRateLimiter {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// The read-modify-write of an entry happens under one lock, so racing
    /// requests from the same identifier converge to a monotonically
    /// increasing count bounded by the cap.
    pub async fn check_at(&self, client_id: &str, now: DateTime<Utc>) -> RateLimitDecision {
        let mut entries = self.entries.lock().await;

        if entries.len() > EVICTION_THRESHOLD {
            entries.retain(|_, entry| entry.window_expires_at > now);
        }

        let entry = entries
            .entry(client_id.to_string())
            .or_insert(RateLimitEntry {
                count: 0,
                window_expires_at: now + Duration::seconds(WINDOW_SECS as i64),
            });

        if now > entry.window_expires_at {
            entry.count = 1;
            entry.window_expires_at = now + Duration::seconds(WINDOW_SECS as i64);
            return RateLimitDecision::Allowed;
        }

        if entry.count >= MAX_REQUESTS_PER_WINDOW {
            return RateLimitDecision::Limited {
                retry_after_secs: WINDOW_SECS,
            };
        }

        entry.count += 1;
        RateLimitDecision::Allowed
    }

    /// Number of identifiers currently tracked.
    pub async fn tracked_identifiers(&self) -> usize {
        self.entries.lock().await.len()
    }
}

impl Default for InMemoryRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimiter {
    async fn check(&self, client_id: &str) -> RateLimitDecision {
        self.check_at(client_id, Utc::now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allows_up_to_the_cap_then_limits() {
        let limiter = InMemoryRateLimiter::new();
        let now = Utc::now();

        for _ in 0..MAX_REQUESTS_PER_WINDOW {
            assert_eq!(
                limiter.check_at("1.2.3.4", now).await,
                RateLimitDecision::Allowed
            );
        }
        assert_eq!(
            limiter.check_at("1.2.3.4", now).await,
            RateLimitDecision::Limited {
                retry_after_secs: WINDOW_SECS
            }
        );
    }

    #[tokio::test]
    async fn window_expiry_resets_the_count_to_one() {
        let limiter = InMemoryRateLimiter::new();
        let start = Utc::now();

        for _ in 0..=MAX_REQUESTS_PER_WINDOW {
            limiter.check_at("1.2.3.4", start).await;
        }

        let later = start + Duration::seconds(WINDOW_SECS as i64 + 1);
        assert_eq!(
            limiter.check_at("1.2.3.4", later).await,
            RateLimitDecision::Allowed
        );
        // The fresh window still has its full budget minus the one above.
        for _ in 1..MAX_REQUESTS_PER_WINDOW {
            assert_eq!(
                limiter.check_at("1.2.3.4", later).await,
                RateLimitDecision::Allowed
            );
        }
        assert!(matches!(
            limiter.check_at("1.2.3.4", later).await,
            RateLimitDecision::Limited { .. }
        ));
    }

    #[tokio::test]
    async fn identifiers_are_limited_independently() {
        let limiter = InMemoryRateLimiter::new();
        let now = Utc::now();

        for _ in 0..MAX_REQUESTS_PER_WINDOW {
            limiter.check_at("1.2.3.4", now).await;
        }
        assert_eq!(
            limiter.check_at("5.6.7.8", now).await,
            RateLimitDecision::Allowed
        );
    }

    #[tokio::test]
    async fn concurrent_checks_never_undercount() {
        use std::sync::Arc;

        let limiter = Arc::new(InMemoryRateLimiter::new());
        let now = Utc::now();

        let mut handles = Vec::new();
        for _ in 0..(MAX_REQUESTS_PER_WINDOW + 10) {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(
                async move { limiter.check_at("racer", now).await },
            ));
        }

        let mut allowed = 0;
        for handle in handles {
            if handle.await.unwrap() == RateLimitDecision::Allowed {
                allowed += 1;
            }
        }
        assert_eq!(allowed, MAX_REQUESTS_PER_WINDOW);
    }

    #[tokio::test]
    async fn expired_identifiers_are_swept_past_the_threshold() {
        let limiter = InMemoryRateLimiter::new();
        let start = Utc::now();

        for i in 0..=super::EVICTION_THRESHOLD {
            limiter.check_at(&format!("client-{i}"), start).await;
        }
        assert!(limiter.tracked_identifiers().await > super::EVICTION_THRESHOLD);

        let later = start + Duration::seconds(WINDOW_SECS as i64 * 2);
        limiter.check_at("fresh", later).await;
        assert_eq!(limiter.tracked_identifiers().await, 1);
    }
}
