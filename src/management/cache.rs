use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

pub const MINUTE: Duration = Duration::from_secs(60);
pub const HOUR: Duration = Duration::from_secs(60 * 60);
pub const DAY: Duration = Duration::from_secs(24 * 60 * 60);

struct Entry {
    value: Value,
    expires_at: Instant,
}

/// In-process key/value cache with a per-entry time to live.
///
/// Values are stored as JSON so one cache can hold every response shape.
/// Expired entries are dropped lazily on read and in bulk by
/// [`TtlCache::purge_expired`].
#[derive(Default)]
pub struct TtlCache {
    entries: DashMap<String, Entry>,
}

impl TtlCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached value, or `None` when the key is missing, expired
    /// or holds a different shape.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let now = Instant::now();
        let value = {
            let entry = self.entries.get(key)?;
            if entry.expires_at > now {
                Some(entry.value.clone())
            } else {
                None
            }
        };

        match value {
            Some(value) => serde_json::from_value(value).ok(),
            None => {
                self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
                None
            }
        }
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(value)?;
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    /// Time left before `key` expires, or `None` when it is missing or
    /// already expired.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let entry = self.entries.get(key)?;
        entry.expires_at.checked_duration_since(Instant::now())
    }

    pub fn delete(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_and_reads_back() {
        let cache = TtlCache::new();
        cache.set("k", &vec![1, 2, 3], MINUTE).unwrap();
        assert_eq!(cache.get::<Vec<u32>>("k"), Some(vec![1, 2, 3]));
        assert_eq!(cache.get::<String>("k"), None);
    }

    #[test]
    fn cached_none_is_distinguishable_from_missing() {
        let cache = TtlCache::new();
        cache.set("miss", &Option::<String>::None, MINUTE).unwrap();
        assert_eq!(cache.get::<Option<String>>("miss"), Some(None));
        assert_eq!(cache.get::<Option<String>>("absent"), None);
    }

    #[test]
    fn expired_entries_disappear() {
        let cache = TtlCache::new();
        cache.set("short", &1, Duration::ZERO).unwrap();
        cache.set("long", &2, HOUR).unwrap();

        assert_eq!(cache.get::<u32>("short"), None);
        cache.set("short-again", &3, Duration::ZERO).unwrap();
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn reports_time_left() {
        let cache = TtlCache::new();
        cache.set("k", &1, HOUR).unwrap();
        let left = cache.ttl("k").unwrap();
        assert!(left <= HOUR && left > HOUR - MINUTE);
        assert_eq!(cache.ttl("absent"), None);
    }

    #[test]
    fn delete_and_clear() {
        let cache = TtlCache::new();
        cache.set("a", &"x", DAY).unwrap();
        cache.set("b", &"y", DAY).unwrap();
        assert!(cache.delete("a"));
        assert!(!cache.delete("a"));
        cache.clear();
        assert!(cache.is_empty());
    }
}
