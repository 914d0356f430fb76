use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

#[derive(Debug, Clone)]
struct Entry {
    permissions: Arc<HashSet<String>>,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Memoizes resolved permission sets keyed by the sorted tuple of role ids.
/// Many request handlers may read concurrently while entries expire or the
/// caller invalidates on role data changes; `DashMap` keeps reads from
/// serializing behind a global lock.
#[derive(Debug)]
pub struct ResolutionCache {
    entries: DashMap<String, Entry>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

#[derive(Debug, Default, Clone)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        if self.hits + self.misses == 0 {
            0.0
        } else {
            self.hits as f64 / (self.hits + self.misses) as f64
        }
    }
}

impl ResolutionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Sorted, deduplicated role-id tuple, so `[a, b]` and `[b, a]` share
    /// an entry. Joined with a unit separator to avoid collisions between
    /// ids that concatenate equally.
    fn key(role_ids: &[String]) -> String {
        let mut ids = role_ids.to_vec();
        ids.sort();
        ids.dedup();
        ids.join("\u{1f}")
    }

    pub fn get(&self, role_ids: &[String]) -> Option<Arc<HashSet<String>>> {
        let key = Self::key(role_ids);
        if let Some(entry) = self.entries.get(&key) {
            if !entry.is_expired() {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(%key, "resolution cache hit");
                return Some(Arc::clone(&entry.permissions));
            }
        }
        // drop expired entries on the read path
        self.entries.remove_if(&key, |_, entry| entry.is_expired());
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub fn insert(
        &self,
        role_ids: &[String],
        permissions: HashSet<String>,
    ) -> Arc<HashSet<String>> {
        let permissions = Arc::new(permissions);
        self.entries.insert(
            Self::key(role_ids),
            Entry {
                permissions: Arc::clone(&permissions),
                expires_at: Instant::now() + self.ttl,
            },
        );
        permissions
    }

    /// Drop every entry. Callers invoke this when role or permission data
    /// changes underneath the store.
    pub fn invalidate_all(&self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn perms(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_insert_and_get() {
        let cache = ResolutionCache::new(Duration::from_secs(60));
        cache.insert(&ids(&["editor"]), perms(&["post.edit"]));
        let hit = cache.get(&ids(&["editor"])).unwrap();
        assert!(hit.contains("post.edit"));
    }

    #[test]
    fn test_key_is_order_insensitive() {
        let cache = ResolutionCache::new(Duration::from_secs(60));
        cache.insert(&ids(&["editor", "viewer"]), perms(&["post.edit"]));
        assert!(cache.get(&ids(&["viewer", "editor"])).is_some());
    }

    #[test]
    fn test_key_separator_prevents_collisions() {
        let cache = ResolutionCache::new(Duration::from_secs(60));
        cache.insert(&ids(&["ab", "c"]), perms(&["x"]));
        assert!(cache.get(&ids(&["a", "bc"])).is_none());
    }

    #[test]
    fn test_expired_entry_misses() {
        let cache = ResolutionCache::new(Duration::ZERO);
        cache.insert(&ids(&["editor"]), perms(&["post.edit"]));
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get(&ids(&["editor"])).is_none());
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_invalidate_all() {
        let cache = ResolutionCache::new(Duration::from_secs(60));
        cache.insert(&ids(&["editor"]), perms(&["post.edit"]));
        cache.insert(&ids(&["viewer"]), perms(&["post.view"]));
        cache.invalidate_all();
        assert!(cache.get(&ids(&["editor"])).is_none());
        assert!(cache.get(&ids(&["viewer"])).is_none());
    }

    #[test]
    fn test_stats_counts_hits_and_misses() {
        let cache = ResolutionCache::new(Duration::from_secs(60));
        assert!(cache.get(&ids(&["editor"])).is_none());
        cache.insert(&ids(&["editor"]), perms(&["post.edit"]));
        assert!(cache.get(&ids(&["editor"])).is_some());
        assert!(cache.get(&ids(&["editor"])).is_some());

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_ratio() - 2.0 / 3.0).abs() < 1e-9);
    }
}
