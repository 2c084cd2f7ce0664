use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Process-wide key/value store with per-entry time-to-live, backing the
/// cache namespace of the translation engine. Keys are full field paths,
/// values opaque to the cache. Entries expire lazily on access; readers
/// after expiry observe not-found. Per-key operations are atomic, so many
/// translation contexts may hit the same key concurrently.
#[derive(Debug)]
pub struct TtlCache<V> {
    entries: DashMap<String, CacheItem<V>>,
    default_ttl: Option<Duration>,
}

#[derive(Debug)]
struct CacheItem<V> {
    value: V,
    expires_at: Option<Instant>,
}

impl<V> CacheItem<V> {
    fn live(&self) -> bool {
        self.expires_at.map_or(true, |at| at > Instant::now())
    }
}

impl<V: Clone> TtlCache<V> {
    /// Cache whose entries never expire unless given an explicit TTL
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            default_ttl: None,
        }
    }

    /// Cache applying a default TTL to every entry
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            default_ttl: Some(ttl),
        }
    }

    /// Fetch a live value; an expired entry is evicted and reads as absent
    pub fn get(&self, key: &str) -> Option<V> {
        let hit = self.entries.get(key).map(|item| {
            if item.live() {
                Some(item.value.clone())
            } else {
                None
            }
        });
        match hit {
            Some(Some(value)) => Some(value),
            Some(None) => {
                // evict outside the read guard
                self.entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store a value under the default TTL
    pub fn set(&self, key: &str, value: V) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Store a value under an explicit TTL; `None` never expires
    pub fn set_with_ttl(&self, key: &str, value: V, ttl: Option<Duration>) {
        self.entries.insert(
            key.to_string(),
            CacheItem {
                value,
                expires_at: ttl.map(|d| Instant::now() + d),
            },
        );
    }

    /// Atomic per-key read-modify-write; the closure sees the live value,
    /// if any, and returns the replacement. The TTL restarts on update.
    pub fn update(&self, key: &str, f: impl FnOnce(Option<&V>) -> V) {
        let expires_at = self.default_ttl.map(|d| Instant::now() + d);
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occ) => {
                let current = if occ.get().live() {
                    Some(&occ.get().value)
                } else {
                    None
                };
                let value = f(current);
                occ.insert(CacheItem { value, expires_at });
            }
            Entry::Vacant(vac) => {
                let value = f(None);
                vac.insert(CacheItem { value, expires_at });
            }
        }
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        self.entries.remove(key).map(|(_, item)| item.value)
    }

    /// Drop every key beginning with the prefix
    pub fn remove_prefix(&self, prefix: &str) {
        self.entries.retain(|key, _| !key.starts_with(prefix));
    }

    /// Drop every expired entry; complements the lazy eviction on read
    pub fn purge_expired(&self) {
        self.entries.retain(|_, item| item.live());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_set_and_get() {
        let cache: TtlCache<String> = TtlCache::new();
        cache.set("Tenant", "telco.example.org".to_string());
        assert_eq!(cache.get("Tenant"), Some("telco.example.org".to_string()));
        assert_eq!(cache.get("Unexist"), None);
    }

    #[test]
    fn test_ttl_expiry() {
        let cache: TtlCache<String> = TtlCache::with_ttl(Duration::from_millis(30));
        cache.set("Account", "1001".to_string());
        assert_eq!(cache.get("Account"), Some("1001".to_string()));

        thread::sleep(Duration::from_millis(60));
        assert_eq!(cache.get("Account"), None);
        // lazy eviction removed the entry
        assert!(cache.is_empty());
    }

    #[test]
    fn test_explicit_ttl_overrides_default() {
        let cache: TtlCache<u32> = TtlCache::with_ttl(Duration::from_millis(10));
        cache.set_with_ttl("keep", 1, None);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(cache.get("keep"), Some(1));
    }

    #[test]
    fn test_update_appends_atomically() {
        let cache: TtlCache<Vec<u32>> = TtlCache::new();
        cache.update("seq", |cur| {
            let mut v = cur.cloned().unwrap_or_default();
            v.push(1);
            v
        });
        cache.update("seq", |cur| {
            let mut v = cur.cloned().unwrap_or_default();
            v.push(2);
            v
        });
        assert_eq!(cache.get("seq"), Some(vec![1, 2]));
    }

    #[test]
    fn test_update_after_expiry_starts_fresh() {
        let cache: TtlCache<Vec<u32>> = TtlCache::with_ttl(Duration::from_millis(20));
        cache.update("seq", |_| vec![1]);
        thread::sleep(Duration::from_millis(50));
        cache.update("seq", |cur| {
            assert!(cur.is_none());
            vec![2]
        });
        assert_eq!(cache.get("seq"), Some(vec![2]));
    }

    #[test]
    fn test_remove_prefix_keeps_siblings() {
        let cache: TtlCache<u32> = TtlCache::new();
        cache.set("A.X", 1);
        cache.set("A.Y", 2);
        cache.set("B.X", 3);
        cache.remove_prefix("A.");
        assert_eq!(cache.get("A.X"), None);
        assert_eq!(cache.get("A.Y"), None);
        assert_eq!(cache.get("B.X"), Some(3));
    }

    #[test]
    fn test_purge_expired() {
        let cache: TtlCache<u32> = TtlCache::new();
        cache.set_with_ttl("old", 1, Some(Duration::from_millis(10)));
        cache.set("new", 2);
        thread::sleep(Duration::from_millis(30));
        cache.purge_expired();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("new"), Some(2));
    }
}
