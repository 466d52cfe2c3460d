//! Sliding-window limiter for login attempts
//!
//! Two independent windows are kept:
//! - failed logins per username (5 per 15 minutes)
//! - login requests per client IP (10 per minute)

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use std::net::IpAddr;
use tokio::sync::RwLock;

/// How many events are allowed within a trailing window
#[derive(Debug, Clone, Copy)]
pub struct WindowLimit {
    pub max_events: usize,
    pub window: Duration,
}

impl WindowLimit {
    pub const USERNAME: WindowLimit = WindowLimit {
        max_events: 5,
        window: Duration::minutes(15),
    };

    pub const IP: WindowLimit = WindowLimit {
        max_events: 10,
        window: Duration::minutes(1),
    };
}

/// Event timestamps per key, pruned lazily on access
struct Window<K> {
    limit: WindowLimit,
    events: RwLock<HashMap<K, Vec<DateTime<Utc>>>>,
}

impl<K: Eq + Hash> Window<K> {
    fn new(limit: WindowLimit) -> Self {
        Self {
            limit,
            events: RwLock::new(HashMap::new()),
        }
    }

    async fn is_limited(&self, key: K) -> bool {
        let cutoff = Utc::now() - self.limit.window;
        let mut events = self.events.write().await;
        match events.get_mut(&key) {
            Some(times) => {
                times.retain(|t| *t > cutoff);
                times.len() >= self.limit.max_events
            }
            None => false,
        }
    }

    async fn record(&self, key: K) {
        self.events.write().await.entry(key).or_default().push(Utc::now());
    }

    async fn clear(&self, key: &K) {
        self.events.write().await.remove(key);
    }

    async fn prune(&self) -> usize {
        let cutoff = Utc::now() - self.limit.window;
        let mut events = self.events.write().await;
        events.retain(|_, times| {
            times.retain(|t| *t > cutoff);
            !times.is_empty()
        });
        events.len()
    }
}

/// Login rate limiter shared by the auth handlers
pub struct LoginRateLimiter {
    usernames: Window<String>,
    ips: Window<IpAddr>,
}

impl LoginRateLimiter {
    pub fn new() -> Self {
        Self::with_limits(WindowLimit::USERNAME, WindowLimit::IP)
    }

    pub fn with_limits(username: WindowLimit, ip: WindowLimit) -> Self {
        Self {
            usernames: Window::new(username),
            ips: Window::new(ip),
        }
    }

    /// Usernames are compared case-insensitively.
    pub async fn is_username_limited(&self, username: &str) -> bool {
        self.usernames.is_limited(username.to_lowercase()).await
    }

    pub async fn record_failed_attempt(&self, username: &str) {
        self.usernames.record(username.to_lowercase()).await;
    }

    /// Forget failures after a successful login
    pub async fn clear_username_attempts(&self, username: &str) {
        self.usernames.clear(&username.to_lowercase()).await;
    }

    pub async fn is_ip_limited(&self, ip: IpAddr) -> bool {
        self.ips.is_limited(ip).await
    }

    pub async fn record_ip_request(&self, ip: IpAddr) {
        self.ips.record(ip).await;
    }

    /// Drop expired entries; returns the number of keys still tracked.
    pub async fn cleanup(&self) -> usize {
        self.usernames.prune().await + self.ips.prune().await
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[tokio::test]
    async fn test_username_limit_after_five_failures() {
        let limiter = LoginRateLimiter::new();

        for _ in 0..4 {
            assert!(!limiter.is_username_limited("alice").await);
            limiter.record_failed_attempt("alice").await;
        }
        limiter.record_failed_attempt("alice").await;
        assert!(limiter.is_username_limited("alice").await);

        limiter.clear_username_attempts("alice").await;
        assert!(!limiter.is_username_limited("alice").await);
    }

    #[tokio::test]
    async fn test_ip_limit_after_ten_requests() {
        let limiter = LoginRateLimiter::new();
        let ip = IpAddr::from_str("127.0.0.1").unwrap();
        let other = IpAddr::from_str("10.0.0.1").unwrap();

        for _ in 0..9 {
            assert!(!limiter.is_ip_limited(ip).await);
            limiter.record_ip_request(ip).await;
        }
        limiter.record_ip_request(ip).await;

        assert!(limiter.is_ip_limited(ip).await);
        assert!(!limiter.is_ip_limited(other).await);
    }

    #[tokio::test]
    async fn test_username_is_case_insensitive() {
        let limiter = LoginRateLimiter::new();

        limiter.record_failed_attempt("Alice").await;
        limiter.record_failed_attempt("alice").await;
        limiter.record_failed_attempt("ALICE").await;
        assert!(!limiter.is_username_limited("alice").await);

        limiter.record_failed_attempt("alice").await;
        limiter.record_failed_attempt("aLiCe").await;
        assert!(limiter.is_username_limited("Alice").await);
    }

    #[tokio::test]
    async fn test_expired_events_are_ignored_and_pruned() {
        let short = WindowLimit {
            max_events: 1,
            window: Duration::milliseconds(20),
        };
        let limiter = LoginRateLimiter::with_limits(short, short);
        let ip = IpAddr::from_str("192.168.0.2").unwrap();

        limiter.record_failed_attempt("bob").await;
        limiter.record_ip_request(ip).await;
        assert!(limiter.is_username_limited("bob").await);
        assert!(limiter.is_ip_limited(ip).await);

        tokio::time::sleep(std::time::Duration::from_millis(60)).await;

        assert!(!limiter.is_username_limited("bob").await);
        assert_eq!(limiter.cleanup().await, 0);
    }
}
