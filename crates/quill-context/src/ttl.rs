//! TTL tracking for cached repository contexts.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Tracks insertion times for TTL-based expiration.
///
/// Repository contexts are written once per key and read many times, so the
/// clock starts at insertion and reads do not extend it.
#[derive(Debug)]
pub struct TtlTracker {
    inserted_at: HashMap<String, Instant>,
    /// None means entries never expire.
    ttl: Option<Duration>,
}

impl TtlTracker {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            inserted_at: HashMap::new(),
            ttl,
        }
    }

    /// Start (or restart) the clock for a key.
    pub fn record(&mut self, key: &str) {
        self.inserted_at.insert(key.to_string(), Instant::now());
    }

    /// Check if a key has expired. Untracked keys count as expired only
    /// when a TTL is configured.
    pub fn is_expired(&self, key: &str) -> bool {
        match self.ttl {
            None => false,
            Some(ttl) => match self.inserted_at.get(key) {
                None => true,
                Some(at) => at.elapsed() > ttl,
            },
        }
    }

    pub fn remove(&mut self, key: &str) {
        self.inserted_at.remove(key);
    }

    /// Remove all expired entries and return their keys.
    pub fn drain_expired(&mut self) -> Vec<String> {
        let Some(ttl) = self.ttl else {
            return Vec::new();
        };
        let now = Instant::now();
        let expired: Vec<String> = self
            .inserted_at
            .iter()
            .filter(|(_, at)| now.duration_since(**at) > ttl)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.inserted_at.remove(key);
        }
        expired
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.inserted_at.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inserted_at.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_ttl_never_expires() {
        let mut tracker = TtlTracker::new(None);
        tracker.record("acme/widgets");
        assert!(!tracker.is_expired("acme/widgets"));
        assert!(!tracker.is_expired("never/seen"));
        assert!(tracker.drain_expired().is_empty());
    }

    #[test]
    fn test_expiry() {
        let mut tracker = TtlTracker::new(Some(Duration::from_millis(10)));
        tracker.record("a/b");
        assert!(!tracker.is_expired("a/b"));
        assert!(tracker.is_expired("c/d"));

        std::thread::sleep(Duration::from_millis(25));
        assert!(tracker.is_expired("a/b"));
        assert_eq!(tracker.drain_expired(), vec!["a/b".to_string()]);
        assert!(tracker.is_empty());
    }
}
