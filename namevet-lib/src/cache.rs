//! Short-lived verdict cache shared by concurrent checks.
//!
//! The cache only exists to collapse duplicate outbound calls within one
//! burst of checks. Entries expire after seconds to low minutes because
//! availability changes; nothing is persisted.

use crate::types::{CheckTarget, Verdict};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A cached verdict and the moment it stops being served.
#[derive(Debug, Clone)]
struct CacheEntry {
    verdict: Verdict,
    expires_at: Instant,
}

/// Entry count that triggers a sweep of expired entries on insert.
pub const DEFAULT_SWEEP_THRESHOLD: usize = 1024;

#[derive(Debug)]
struct Entries {
    map: HashMap<CheckTarget, CacheEntry>,
    /// Size at which the next insert sweeps expired entries
    sweep_at: usize,
}

/// Verdicts keyed by target, last writer wins.
///
/// Inserts sweep expired entries once the map grows past a threshold, so a
/// long-lived engine checking ever new names stays bounded by what is live.
#[derive(Debug)]
pub struct VerdictCache {
    entries: Mutex<Entries>,
    sweep_threshold: usize,
}

impl Default for VerdictCache {
    fn default() -> Self {
        Self::with_sweep_threshold(DEFAULT_SWEEP_THRESHOLD)
    }
}

impl VerdictCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cache that sweeps expired entries once it holds `threshold` of them.
    pub fn with_sweep_threshold(threshold: usize) -> Self {
        let threshold = threshold.max(1);
        Self {
            entries: Mutex::new(Entries {
                map: HashMap::new(),
                sweep_at: threshold,
            }),
            sweep_threshold: threshold,
        }
    }

    /// Return the cached verdict for `target` if it has not expired.
    ///
    /// Expired entries are evicted on the way out.
    pub fn get(&self, target: &CheckTarget) -> Option<Verdict> {
        let mut entries = self.entries.lock().ok()?;
        match entries.map.get(target) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.verdict.clone()),
            Some(_) => {
                entries.map.remove(target);
                None
            }
            None => None,
        }
    }

    /// Store a verdict for `ttl`, replacing whatever was there.
    pub fn insert(&self, verdict: Verdict, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        let now = Instant::now();
        let Some(expires_at) = now.checked_add(ttl) else {
            return;
        };
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        if entries.map.len() >= entries.sweep_at {
            let before = entries.map.len();
            entries.map.retain(|_, entry| entry.expires_at > now);
            // Mostly live entries: back off so inserts stay amortised O(1)
            entries.sweep_at = self.sweep_threshold.max(entries.map.len() * 2);
            tracing::trace!(
                removed = before - entries.map.len(),
                remaining = entries.map.len(),
                "swept expired verdicts"
            );
        }
        entries.map.insert(
            verdict.target.clone(),
            CacheEntry {
                verdict,
                expires_at,
            },
        );
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let Ok(mut entries) = self.entries.lock() else {
            return 0;
        };
        let now = Instant::now();
        let before = entries.map.len();
        entries.map.retain(|_, entry| entry.expires_at > now);
        before - entries.map.len()
    }

    /// Number of entries, expired or not.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove all entries.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.map.clear();
            entries.sweep_at = self.sweep_threshold;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VerdictSource;

    fn taken(name: &str) -> Verdict {
        Verdict::taken(CheckTarget::domain(name, "com"), VerdictSource::Rdap, None)
    }

    #[test]
    fn test_insert_and_get() {
        let cache = VerdictCache::new();
        cache.insert(taken("acme"), Duration::from_secs(60));

        let hit = cache.get(&CheckTarget::domain("acme", "com")).unwrap();
        assert_eq!(hit.source, VerdictSource::Rdap);
        assert!(cache.get(&CheckTarget::domain("acme", "io")).is_none());
    }

    #[test]
    fn test_expired_entries_are_evicted() {
        let cache = VerdictCache::new();
        cache.insert(taken("acme"), Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(cache.len(), 1);
        assert!(cache.get(&CheckTarget::domain("acme", "com")).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_purge_expired() {
        let cache = VerdictCache::new();
        cache.insert(taken("old"), Duration::from_millis(1));
        cache.insert(taken("fresh"), Duration::from_secs(60));
        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_insert_sweeps_expired_entries_past_threshold() {
        let cache = VerdictCache::with_sweep_threshold(4);
        for name in ["a", "b", "c", "d"] {
            cache.insert(taken(name), Duration::from_millis(1));
        }
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.len(), 4);

        // Never read back, yet the next insert clears them out
        cache.insert(taken("e"), Duration::from_secs(60));
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&CheckTarget::domain("e", "com")).is_some());
    }

    #[test]
    fn test_live_entries_survive_sweeps() {
        let cache = VerdictCache::with_sweep_threshold(2);
        for name in ["a", "b", "c", "d", "e"] {
            cache.insert(taken(name), Duration::from_secs(60));
        }
        assert_eq!(cache.len(), 5);
    }

    #[test]
    fn test_last_writer_wins() {
        let cache = VerdictCache::new();
        let target = CheckTarget::domain("acme", "com");
        cache.insert(taken("acme"), Duration::from_secs(60));
        cache.insert(
            Verdict::available(target.clone(), VerdictSource::Whois, None),
            Duration::from_secs(60),
        );

        assert_eq!(cache.get(&target).unwrap().source, VerdictSource::Whois);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_zero_ttl_is_not_stored() {
        let cache = VerdictCache::new();
        cache.insert(taken("acme"), Duration::ZERO);
        assert!(cache.is_empty());
    }
}
