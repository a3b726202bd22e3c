//! Time-bounded lookup cache.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;

use super::{LookupReport, LookupRequest};

/// Default freshness window.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Hash of the fields that identify a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey(u64);

impl CacheKey {
    /// Derives the key from `(kind, query, locale, mode, sub_key)`.
    ///
    /// The query is trimmed and lower-cased so trivially different inputs
    /// share an entry.
    #[must_use]
    pub fn for_request(request: &LookupRequest) -> Self {
        let mut hasher = DefaultHasher::new();
        request.kind.hash(&mut hasher);
        request.query.trim().to_lowercase().hash(&mut hasher);
        request.locale.hash(&mut hasher);
        request.mode.hash(&mut hasher);
        request.sub_key.hash(&mut hasher);
        Self(hasher.finish())
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    report: LookupReport,
    stored_at: DateTime<Utc>,
}

/// Concurrent cache with a fixed time-to-live.
#[derive(Debug)]
pub struct LookupCache {
    entries: DashMap<CacheKey, CacheEntry>,
    ttl: chrono::Duration,
}

impl LookupCache {
    /// Creates a cache whose entries expire after `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
        }
    }

    /// Returns the fresh entry for `key` at `now`, evicting it if stale.
    #[must_use]
    pub fn get(&self, key: CacheKey, now: DateTime<Utc>) -> Option<LookupReport> {
        let entry = self.entries.get(&key)?;
        if now.signed_duration_since(entry.stored_at) < self.ttl {
            return Some(entry.report.clone());
        }
        drop(entry);
        debug!(?key, "lookup cache entry expired");
        self.entries.remove(&key);
        None
    }

    /// Stores `report` under `key` as of `now`.
    pub fn insert(&self, key: CacheKey, report: LookupReport, now: DateTime<Utc>) {
        self.entries.insert(
            key,
            CacheEntry {
                report,
                stored_at: now,
            },
        );
    }

    /// Drops every entry that is stale at `now`; returns how many were removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, e| now.signed_duration_since(e.stored_at) < self.ttl);
        before - self.entries.len()
    }

    /// Number of stored entries (fresh or not).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for LookupCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::DemoMode;
    use crate::lookup::LookupKind;

    fn request(query: &str, locale: &str) -> LookupRequest {
        LookupRequest {
            kind: LookupKind::Market,
            query: query.to_string(),
            locale: locale.to_string(),
            mode: DemoMode::Zero,
            sub_key: None,
        }
    }

    fn report(summary: &str) -> LookupReport {
        LookupReport {
            summary: summary.to_string(),
            ..LookupReport::default()
        }
    }

    #[test]
    fn test_key_normalizes_query() {
        assert_eq!(
            CacheKey::for_request(&request("Cleaning Berlin", "en")),
            CacheKey::for_request(&request("  cleaning berlin ", "en"))
        );
        assert_ne!(
            CacheKey::for_request(&request("cleaning berlin", "en")),
            CacheKey::for_request(&request("cleaning berlin", "de"))
        );
    }

    #[test]
    fn test_key_includes_sub_key_and_mode() {
        let base = request("cleaning berlin", "en");
        let mut with_sub = base.clone();
        with_sub.sub_key = Some("DE".to_string());
        let mut digitize = base.clone();
        digitize.mode = DemoMode::Digitize;
        let key = CacheKey::for_request(&base);
        assert_ne!(key, CacheKey::for_request(&with_sub));
        assert_ne!(key, CacheKey::for_request(&digitize));
    }

    #[test]
    fn test_entry_expires_after_ttl() {
        let cache = LookupCache::default();
        let key = CacheKey::for_request(&request("bakery munich", "en"));
        let t0 = Utc::now();
        cache.insert(key, report("busy"), t0);

        let fresh = t0 + chrono::Duration::hours(23);
        assert_eq!(cache.get(key, fresh).unwrap().summary, "busy");

        let stale = t0 + chrono::Duration::hours(24);
        assert!(cache.get(key, stale).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_purge_expired() {
        let cache = LookupCache::new(Duration::from_secs(60));
        let t0 = Utc::now();
        cache.insert(CacheKey(1), report("old"), t0);
        cache.insert(CacheKey(2), report("new"), t0 + chrono::Duration::seconds(50));
        let removed = cache.purge_expired(t0 + chrono::Duration::seconds(70));
        assert_eq!(removed, 1);
        assert_eq!(cache.len(), 1);
    }
}
