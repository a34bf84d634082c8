//! Short-lived cache of account existence answers.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

/// Cache of `username -> exists` answers.
pub trait ExistenceCache: Send + Sync {
    /// Cached answer, if present and not expired.
    fn get(&self, key: &str) -> Option<bool>;

    fn put(&self, key: &str, exists: bool);

    fn invalidate(&self, key: &str);
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    exists: bool,
    /// `None` when the TTL reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_fresh(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

/// In-memory cache whose entries expire after a fixed TTL.
#[derive(Debug)]
pub struct TtlCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, Entry>>,
}

impl TtlCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl ExistenceCache for TtlCache {
    fn get(&self, key: &str) -> Option<bool> {
        let entries = self.entries.read();
        let now = Instant::now();
        entries
            .get(key)
            .filter(|entry| entry.is_fresh(now))
            .map(|entry| entry.exists)
    }

    fn put(&self, key: &str, exists: bool) {
        let mut entries = self.entries.write();
        let now = Instant::now();
        entries.retain(|_, entry| entry.is_fresh(now));
        entries.insert(
            key.to_string(),
            Entry {
                exists,
                expires_at: now.checked_add(self.ttl),
            },
        );
    }

    fn invalidate(&self, key: &str) {
        self.entries.write().remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_and_get() {
        let cache = TtlCache::new(Duration::from_secs(60));
        assert_eq!(cache.get("alice"), None);

        cache.put("alice", true);
        cache.put("ghost", false);
        assert_eq!(cache.get("alice"), Some(true));
        assert_eq!(cache.get("ghost"), Some(false));
    }

    #[test]
    fn test_zero_ttl_never_hits() {
        let cache = TtlCache::new(Duration::ZERO);
        cache.put("alice", true);
        assert_eq!(cache.get("alice"), None);
    }

    #[test]
    fn test_huge_ttl_does_not_overflow() {
        let cache = TtlCache::new(Duration::from_secs(u64::MAX));
        cache.put("alice", true);
        cache.put("bob", false);
        assert_eq!(cache.get("alice"), Some(true));
        assert_eq!(cache.get("bob"), Some(false));
    }

    #[test]
    fn test_invalidate() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.put("alice", true);
        cache.invalidate("alice");
        assert_eq!(cache.get("alice"), None);
    }
}
