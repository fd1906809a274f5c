use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct WindowSlot {
    started: Instant,
    count: u32,
}

/// Fixed-window request counter keyed by caller (IP + endpoint class). State
/// is process-local and resets when the window rolls over; in a multi-instance
/// deployment this is an approximation, not a guarantee.
pub struct RateLimiter {
    window: Duration,
    slots: Mutex<HashMap<String, WindowSlot>>,
}

impl RateLimiter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_default_window() -> Self {
        Self::new(Duration::from_secs(60))
    }

    /// Returns true if the caller is admitted under `limit` requests per
    /// window. Counts the request either way.
    pub fn check(&self, key: &str, limit: u32) -> bool {
        let now = Instant::now();
        let mut slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        // Opportunistic pruning keeps the map from accumulating dead IPs.
        if slots.len() > 1024 {
            let window = self.window;
            slots.retain(|_, slot| now.duration_since(slot.started) < window);
        }

        let slot = slots.entry(key.to_string()).or_insert(WindowSlot {
            started: now,
            count: 0,
        });

        if now.duration_since(slot.started) >= self.window {
            slot.started = now;
            slot.count = 0;
        }

        slot.count += 1;
        slot.count <= limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sixth_request_in_window_is_rejected() {
        let limiter = RateLimiter::new(Duration::from_secs(60));
        for _ in 0..5 {
            assert!(limiter.check("203.0.113.7:payment", 5));
        }
        assert!(!limiter.check("203.0.113.7:payment", 5));
    }

    #[test]
    fn window_rollover_admits_again() {
        let limiter = RateLimiter::new(Duration::from_millis(50));
        for _ in 0..5 {
            assert!(limiter.check("203.0.113.7:payment", 5));
        }
        assert!(!limiter.check("203.0.113.7:payment", 5));

        std::thread::sleep(Duration::from_millis(60));
        assert!(limiter.check("203.0.113.7:payment", 5));
    }

    #[test]
    fn keys_are_independent() {
        let limiter = RateLimiter::new(Duration::from_secs(60));
        for _ in 0..5 {
            assert!(limiter.check("203.0.113.7:payment", 5));
        }
        assert!(!limiter.check("203.0.113.7:payment", 5));
        assert!(limiter.check("198.51.100.9:payment", 5));
    }
}
