//! Quota- and cache-aware reality check.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::LookupError;
use crate::inflight::InFlight;
use crate::observability::metrics;

use super::cache::{CacheKey, LookupCache};
use super::provider::LookupProvider;
use super::quota::UsageQuota;
use super::{LookupReport, LookupRequest};

/// Result of a reality check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckOutcome {
    /// Answered by the provider.
    Fresh {
        /// The answer
        report: LookupReport,
        /// Checks left afterwards
        remaining: u32,
    },
    /// Answered from the cache.
    Cached {
        /// The answer
        report: LookupReport,
        /// Checks left afterwards
        remaining: u32,
    },
    /// No checks left this session.
    Exhausted {
        /// Always 0
        remaining: u32,
    },
}

impl CheckOutcome {
    /// Checks left after this one.
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        match self {
            Self::Fresh { remaining, .. }
            | Self::Cached { remaining, .. }
            | Self::Exhausted { remaining } => *remaining,
        }
    }

    /// The report, unless the quota was exhausted.
    #[must_use]
    pub const fn report(&self) -> Option<&LookupReport> {
        match self {
            Self::Fresh { report, .. } | Self::Cached { report, .. } => Some(report),
            Self::Exhausted { .. } => None,
        }
    }
}

/// Reality-check service.
///
/// Each session id gets its own quota, so a session that starts over comes
/// back with the full allowance. The answer cache is shared by all
/// sessions. Every successful check, cache hits included, takes one unit of
/// the session's quota. Failed provider calls do not.
pub struct RealityCheck {
    provider: Arc<dyn LookupProvider>,
    cache: LookupCache,
    limit: u32,
    quotas: DashMap<Uuid, UsageQuota>,
    in_flight: InFlight,
}

impl std::fmt::Debug for RealityCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealityCheck")
            .field("limit", &self.limit)
            .field("sessions", &self.quotas.len())
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl RealityCheck {
    /// Creates a service with the given per-session limit and cache TTL.
    #[must_use]
    pub fn new(provider: Arc<dyn LookupProvider>, limit: u32, ttl: Duration) -> Self {
        Self {
            provider,
            cache: LookupCache::new(ttl),
            limit,
            quotas: DashMap::new(),
            in_flight: InFlight::new(),
        }
    }

    /// Checks left for `session`.
    #[must_use]
    pub fn remaining(&self, session: Uuid) -> u32 {
        self.quotas
            .get(&session)
            .map_or(self.limit, |quota| quota.remaining())
    }

    /// Drops the quota of a session that will not come back.
    pub fn forget(&self, session: Uuid) {
        self.quotas.remove(&session);
    }

    /// Runs a check for `session` now.
    ///
    /// # Errors
    ///
    /// Returns `LookupError::Busy` while another check is running, or the
    /// provider's error.
    pub async fn check(
        &self,
        session: Uuid,
        request: &LookupRequest,
    ) -> Result<CheckOutcome, LookupError> {
        self.check_at(session, request, Utc::now()).await
    }

    /// Runs a check as of `now`.
    ///
    /// # Errors
    ///
    /// See [`check`](Self::check).
    pub async fn check_at(
        &self,
        session: Uuid,
        request: &LookupRequest,
        now: DateTime<Utc>,
    ) -> Result<CheckOutcome, LookupError> {
        if self.remaining(session) == 0 {
            debug!(kind = %request.kind, "reality check quota exhausted");
            metrics::record_lookup("exhausted");
            return Ok(CheckOutcome::Exhausted { remaining: 0 });
        }
        let Some(_guard) = self.in_flight.try_begin() else {
            return Err(LookupError::Busy);
        };

        let key = CacheKey::for_request(request);
        if let Some(report) = self.cache.get(key, now) {
            return Ok(self.consume(session, report, true));
        }

        let report = self
            .provider
            .lookup(request)
            .await
            .inspect_err(|_| metrics::record_lookup("error"))?;
        self.cache.insert(key, report.clone(), now);
        info!(kind = %request.kind, "reality check answered");
        Ok(self.consume(session, report, false))
    }

    fn consume(&self, session: Uuid, report: LookupReport, cached: bool) -> CheckOutcome {
        // Only the in-flight holder consumes, so the pre-check above holds.
        let consumed = self
            .quotas
            .entry(session)
            .or_insert_with(|| UsageQuota::new(self.limit))
            .try_consume();
        let Some(remaining) = consumed else {
            return CheckOutcome::Exhausted { remaining: 0 };
        };
        if cached {
            metrics::record_lookup("hit");
            CheckOutcome::Cached { report, remaining }
        } else {
            metrics::record_lookup("miss");
            CheckOutcome::Fresh { report, remaining }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::artifacts::DemoMode;
    use crate::lookup::LookupKind;
    use crate::lookup::cache::DEFAULT_TTL;

    #[derive(Default)]
    struct CountingProvider {
        calls: AtomicU32,
        fail: bool,
    }

    #[async_trait]
    impl LookupProvider for CountingProvider {
        async fn lookup(&self, request: &LookupRequest) -> Result<LookupReport, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(LookupError::Timeout);
            }
            Ok(LookupReport {
                summary: format!("report for {}", request.query),
                ..LookupReport::default()
            })
        }
    }

    fn request(query: &str) -> LookupRequest {
        LookupRequest {
            kind: LookupKind::Market,
            query: query.to_string(),
            locale: "en".to_string(),
            mode: DemoMode::Zero,
            sub_key: None,
        }
    }

    #[tokio::test]
    async fn test_cache_hit_still_consumes_quota() {
        let provider = Arc::new(CountingProvider::default());
        let service = RealityCheck::new(provider.clone(), 2, DEFAULT_TTL);
        let session = Uuid::new_v4();
        let now = Utc::now();

        let first = service
            .check_at(session, &request("cleaning"), now)
            .await
            .unwrap();
        assert!(matches!(first, CheckOutcome::Fresh { remaining: 1, .. }));

        let second = service
            .check_at(session, &request("cleaning"), now)
            .await
            .unwrap();
        assert!(matches!(second, CheckOutcome::Cached { remaining: 0, .. }));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        let third = service
            .check_at(session, &request("bakery"), now)
            .await
            .unwrap();
        assert_eq!(third, CheckOutcome::Exhausted { remaining: 0 });
        assert!(third.report().is_none());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_calls_provider_again() {
        let provider = Arc::new(CountingProvider::default());
        let service = RealityCheck::new(provider.clone(), 5, DEFAULT_TTL);
        let session = Uuid::new_v4();
        let t0 = Utc::now();
        service
            .check_at(session, &request("cleaning"), t0)
            .await
            .unwrap();
        let later = t0 + chrono::Duration::hours(25);
        let outcome = service
            .check_at(session, &request("cleaning"), later)
            .await
            .unwrap();
        assert!(matches!(outcome, CheckOutcome::Fresh { .. }));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_does_not_consume_quota() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicU32::new(0),
            fail: true,
        });
        let service = RealityCheck::new(provider, 2, DEFAULT_TTL);
        let session = Uuid::new_v4();
        let err = service
            .check(session, &request("cleaning"))
            .await
            .unwrap_err();
        assert_eq!(err, LookupError::Timeout);
        assert_eq!(service.remaining(session), 2);
    }

    #[tokio::test]
    async fn test_new_session_gets_fresh_quota_and_shared_cache() {
        let provider = Arc::new(CountingProvider::default());
        let service = RealityCheck::new(provider.clone(), 1, DEFAULT_TTL);
        let first = Uuid::new_v4();
        service.check(first, &request("cleaning")).await.unwrap();
        assert_eq!(service.remaining(first), 0);

        let next = Uuid::new_v4();
        assert_eq!(service.remaining(next), 1);
        let outcome = service.check(next, &request("cleaning")).await.unwrap();
        assert!(matches!(outcome, CheckOutcome::Cached { remaining: 0, .. }));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(service.remaining(first), 0);
    }

    #[tokio::test]
    async fn test_forget_releases_session_quota() {
        let service = RealityCheck::new(Arc::new(CountingProvider::default()), 1, DEFAULT_TTL);
        let session = Uuid::new_v4();
        service.check(session, &request("cleaning")).await.unwrap();
        service.forget(session);
        assert_eq!(service.remaining(session), 1);
    }
}
