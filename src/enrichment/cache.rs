use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use super::matcher::normalize_name;

/// Thread-safe LRU layer in front of the persisted explanation store,
/// keyed by `(language, normalized name)`. The store stays the source of
/// truth; this only short-circuits repeat lookups within a process.
#[derive(Clone)]
pub struct ExplanationCache {
    cache: Arc<Mutex<LruCache<String, String>>>,
}

impl ExplanationCache {
    /// # Panics
    /// Panics if capacity is 0.
    pub fn new(capacity: usize) -> Self {
        let cache = LruCache::new(NonZeroUsize::new(capacity).expect("Capacity must be non-zero"));
        Self {
            cache: Arc::new(Mutex::new(cache)),
        }
    }

    pub fn get(&self, name: &str, language: &str) -> Option<String> {
        let mut cache = self.cache.lock().unwrap();
        cache.get(&Self::key(name, language)).cloned()
    }

    pub fn put(&self, name: &str, language: &str, explanation: String) {
        let mut cache = self.cache.lock().unwrap();
        cache.put(Self::key(name, language), explanation);
    }

    fn key(name: &str, language: &str) -> String {
        format!("{language}:{}", normalize_name(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_after_put() {
        let cache = ExplanationCache::new(10);
        cache.put("Pad Thai", "en", "Stir-fried noodles.".to_string());
        assert_eq!(
            cache.get("pad thai!", "en"),
            Some("Stir-fried noodles.".to_string())
        );
    }

    #[test]
    fn languages_do_not_collide() {
        let cache = ExplanationCache::new(10);
        cache.put("Pad Thai", "en", "english".to_string());
        assert_eq!(cache.get("Pad Thai", "fr"), None);
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let cache = ExplanationCache::new(2);
        cache.put("a", "en", "1".to_string());
        cache.put("b", "en", "2".to_string());
        cache.put("c", "en", "3".to_string());
        assert_eq!(cache.get("a", "en"), None);
        assert_eq!(cache.get("b", "en"), Some("2".to_string()));
        assert_eq!(cache.get("c", "en"), Some("3".to_string()));
    }
}
