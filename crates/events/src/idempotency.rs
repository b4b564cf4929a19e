//! Time-bounded record of already dispatched events.
//!
//! The dispatcher consults [`IdempotencyGuard`] before fanning out an event.
//! Keys are remembered for a fixed window and the set never grows past its
//! capacity: expired keys are dropped first, then the oldest live ones.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// Bounded, time-windowed set of dispatch keys.
#[derive(Debug)]
pub struct IdempotencyGuard {
    /// Key -> instant it was first seen.
    seen: HashMap<String, Instant>,
    /// Insertion order, oldest at the front.
    order: VecDeque<(String, Instant)>,
    window: Duration,
    capacity: usize,
}

impl IdempotencyGuard {
    pub fn new(window: Duration, capacity: usize) -> Self {
        Self {
            seen: HashMap::new(),
            order: VecDeque::new(),
            window,
            capacity: capacity.max(1),
        }
    }

    /// Record `key` and return `true` if it was not already remembered.
    pub fn check_and_insert(&mut self, key: &str) -> bool {
        self.check_and_insert_at(key, Instant::now())
    }

    /// [`check_and_insert`](Self::check_and_insert) against an explicit clock.
    pub fn check_and_insert_at(&mut self, key: &str, now: Instant) -> bool {
        self.expire(now);

        if self.seen.contains_key(key) {
            return false;
        }

        while self.seen.len() >= self.capacity {
            if !self.evict_oldest() {
                break;
            }
        }

        self.seen.insert(key.to_string(), now);
        self.order.push_back((key.to_string(), now));
        true
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.seen.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Drop every key older than the window.
    fn expire(&mut self, now: Instant) {
        while let Some((_, first_seen)) = self.order.front() {
            if now.saturating_duration_since(*first_seen) < self.window {
                break;
            }
            self.evict_oldest();
        }
    }

    fn evict_oldest(&mut self) -> bool {
        match self.order.pop_front() {
            Some((key, inserted)) => {
                if self.seen.get(&key) == Some(&inserted) {
                    self.seen.remove(&key);
                }
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_sighting_is_a_duplicate() {
        let mut guard = IdempotencyGuard::new(Duration::from_secs(60), 10);
        assert!(guard.check_and_insert("e1"));
        assert!(!guard.check_and_insert("e1"));
        assert!(guard.check_and_insert("e2"));
        assert_eq!(guard.len(), 2);
    }

    #[test]
    fn keys_expire_after_the_window() {
        let mut guard = IdempotencyGuard::new(Duration::from_secs(60), 10);
        let t0 = Instant::now();

        assert!(guard.check_and_insert_at("e1", t0));
        assert!(!guard.check_and_insert_at("e1", t0 + Duration::from_secs(59)));
        assert!(guard.check_and_insert_at("e1", t0 + Duration::from_secs(60)));
        assert_eq!(guard.len(), 1);
    }

    #[test]
    fn capacity_evicts_oldest_first() {
        let mut guard = IdempotencyGuard::new(Duration::from_secs(60), 2);
        let t0 = Instant::now();

        guard.check_and_insert_at("a", t0);
        guard.check_and_insert_at("b", t0 + Duration::from_secs(1));
        guard.check_and_insert_at("c", t0 + Duration::from_secs(2));

        assert_eq!(guard.len(), 2);
        assert!(!guard.contains("a"));
        assert!(guard.contains("b"));
        assert!(guard.contains("c"));
    }

    #[test]
    fn zero_capacity_still_remembers_the_latest_key() {
        let mut guard = IdempotencyGuard::new(Duration::from_secs(60), 0);
        assert!(guard.check_and_insert("a"));
        assert!(!guard.check_and_insert("a"));
        assert!(guard.check_and_insert("b"));
        assert!(!guard.contains("a"));
    }
}
