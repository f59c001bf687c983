//! Bounded per-domain cache of learned layout profiles.

use indexmap::IndexMap;
use std::sync::RwLock;

use crate::types::config::LayoutCacheConfig;
use crate::types::layout::LayoutProfile;

/// Domain → profile, evicting the oldest insertion when full.
///
/// Owned by the caller and shared across jobs via `Arc`; never global.
#[derive(Debug)]
pub struct LayoutCache {
    capacity: usize,
    profiles: RwLock<IndexMap<String, LayoutProfile>>,
}

impl Default for LayoutCache {
    fn default() -> Self {
        Self::new(LayoutCacheConfig::default().capacity)
    }
}

impl LayoutCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            profiles: RwLock::new(IndexMap::new()),
        }
    }

    pub fn from_config(config: &LayoutCacheConfig) -> Self {
        Self::new(config.capacity)
    }

    pub fn get(&self, domain: &str) -> Option<LayoutProfile> {
        self.profiles.read().unwrap().get(&domain.to_lowercase()).cloned()
    }

    /// Insert or replace the profile for its domain. A replaced entry
    /// moves to the newest position.
    pub fn insert(&self, profile: LayoutProfile) {
        let domain = profile.domain.to_lowercase();
        let mut profiles = self.profiles.write().unwrap();

        profiles.shift_remove(&domain);
        while profiles.len() >= self.capacity {
            profiles.shift_remove_index(0);
        }
        profiles.insert(domain, profile);
    }

    /// Drop a domain's profile (e.g. after the site changed structure).
    pub fn evict(&self, domain: &str) -> Option<LayoutProfile> {
        self.profiles.write().unwrap().shift_remove(&domain.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.profiles.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.profiles.write().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(domain: &str) -> LayoutProfile {
        LayoutProfile::generic(domain)
    }

    #[test]
    fn test_evicts_oldest_when_full() {
        let cache = LayoutCache::new(2);
        cache.insert(profile("a.com"));
        cache.insert(profile("b.com"));
        cache.insert(profile("c.com"));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a.com").is_none());
        assert!(cache.get("b.com").is_some());
        assert!(cache.get("c.com").is_some());
    }

    #[test]
    fn test_reinsert_refreshes_position() {
        let cache = LayoutCache::new(2);
        cache.insert(profile("a.com"));
        cache.insert(profile("b.com"));
        cache.insert(profile("a.com"));
        cache.insert(profile("c.com"));

        assert!(cache.get("a.com").is_some());
        assert!(cache.get("b.com").is_none());
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let cache = LayoutCache::default();
        cache.insert(profile("Dumyah.com"));
        assert!(cache.get("dumyah.com").is_some());
        assert!(cache.evict("DUMYAH.COM").is_some());
        assert!(cache.is_empty());
    }
}
