//! Rate limiting primitives for login and registration.

use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
    time::{Duration, Instant},
};

// Expired windows are only swept once this many keys are tracked.
const MAX_TRACKED_KEYS: usize = 10_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RateLimitAction {
    Register,
    Login,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited,
}

pub trait RateLimiter: Send + Sync {
    fn check_ip(&self, ip: Option<&str>, action: RateLimitAction) -> RateLimitDecision;
    fn check_username(&self, username: &str, action: RateLimitAction) -> RateLimitDecision;
}

#[derive(Clone, Debug)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn check_ip(&self, _ip: Option<&str>, _action: RateLimitAction) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }

    fn check_username(&self, _username: &str, _action: RateLimitAction) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }
}

#[derive(Clone, Copy, Debug)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum Key {
    Ip(String),
    Username(String),
}

/// In-process fixed-window limiter: at most `limit` attempts per key and
/// action within each `window`. Every attempt counts, successful or not.
#[derive(Debug)]
pub struct WindowRateLimiter {
    limit: u32,
    window: Duration,
    hits: Mutex<HashMap<(RateLimitAction, Key), Window>>,
}

impl WindowRateLimiter {
    #[must_use]
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            hits: Mutex::new(HashMap::new()),
        }
    }

    fn hit(&self, action: RateLimitAction, key: Key, now: Instant) -> RateLimitDecision {
        let mut hits = self.hits.lock().unwrap_or_else(PoisonError::into_inner);

        if hits.len() >= MAX_TRACKED_KEYS {
            let window = self.window;
            hits.retain(|_, entry| now.duration_since(entry.started) < window);
        }

        let entry = hits.entry((action, key)).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.duration_since(entry.started) >= self.window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }

        if entry.count >= self.limit {
            return RateLimitDecision::Limited;
        }

        entry.count += 1;
        RateLimitDecision::Allowed
    }
}

impl RateLimiter for WindowRateLimiter {
    fn check_ip(&self, ip: Option<&str>, action: RateLimitAction) -> RateLimitDecision {
        // Requests without any address share one bucket.
        let ip = ip.unwrap_or("unknown").to_string();
        self.hit(action, Key::Ip(ip), Instant::now())
    }

    fn check_username(&self, username: &str, action: RateLimitAction) -> RateLimitDecision {
        let username = username.trim().to_lowercase();
        self.hit(action, Key::Username(username), Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    #[test]
    fn noop_rate_limiter_allows() {
        let limiter = NoopRateLimiter;
        assert_eq!(
            limiter.check_ip(None, RateLimitAction::Register),
            RateLimitDecision::Allowed
        );
        assert_eq!(
            limiter.check_username("ada", RateLimitAction::Login),
            RateLimitDecision::Allowed
        );
    }

    #[test]
    fn limits_after_the_configured_attempts() {
        let limiter = WindowRateLimiter::new(2, DAY);
        let ip = Some("10.0.0.1");
        assert_eq!(
            limiter.check_ip(ip, RateLimitAction::Login),
            RateLimitDecision::Allowed
        );
        assert_eq!(
            limiter.check_ip(ip, RateLimitAction::Login),
            RateLimitDecision::Allowed
        );
        assert_eq!(
            limiter.check_ip(ip, RateLimitAction::Login),
            RateLimitDecision::Limited
        );
    }

    #[test]
    fn keys_and_actions_are_counted_separately() {
        let limiter = WindowRateLimiter::new(1, DAY);
        let ip = Some("10.0.0.1");
        assert_eq!(
            limiter.check_ip(ip, RateLimitAction::Login),
            RateLimitDecision::Allowed
        );
        assert_eq!(
            limiter.check_ip(ip, RateLimitAction::Register),
            RateLimitDecision::Allowed
        );
        assert_eq!(
            limiter.check_ip(Some("10.0.0.2"), RateLimitAction::Login),
            RateLimitDecision::Allowed
        );
        // An IP and a username with the same text do not share a bucket.
        assert_eq!(
            limiter.check_username("10.0.0.1", RateLimitAction::Login),
            RateLimitDecision::Allowed
        );
        assert_eq!(
            limiter.check_ip(ip, RateLimitAction::Login),
            RateLimitDecision::Limited
        );
    }

    #[test]
    fn usernames_are_normalized() {
        let limiter = WindowRateLimiter::new(1, DAY);
        assert_eq!(
            limiter.check_username("Ada", RateLimitAction::Login),
            RateLimitDecision::Allowed
        );
        assert_eq!(
            limiter.check_username(" ada ", RateLimitAction::Login),
            RateLimitDecision::Limited
        );
    }

    #[test]
    fn window_resets_after_it_elapses() {
        let limiter = WindowRateLimiter::new(1, Duration::from_secs(60));
        let start = Instant::now();
        let key = || Key::Ip("10.0.0.1".to_string());

        assert_eq!(
            limiter.hit(RateLimitAction::Login, key(), start),
            RateLimitDecision::Allowed
        );
        assert_eq!(
            limiter.hit(RateLimitAction::Login, key(), start + Duration::from_secs(59)),
            RateLimitDecision::Limited
        );
        assert_eq!(
            limiter.hit(RateLimitAction::Login, key(), start + Duration::from_secs(60)),
            RateLimitDecision::Allowed
        );
    }

    #[test]
    fn expired_windows_are_swept() {
        let limiter = WindowRateLimiter::new(1, Duration::from_secs(60));
        let start = Instant::now();
        for n in 0..MAX_TRACKED_KEYS {
            let _ = limiter.hit(RateLimitAction::Login, Key::Ip(n.to_string()), start);
        }

        let later = start + Duration::from_secs(61);
        let _ = limiter.hit(RateLimitAction::Login, Key::Ip("fresh".to_string()), later);

        let tracked = limiter
            .hits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        assert_eq!(tracked, 1);
    }
}
