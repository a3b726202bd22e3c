//! Per-session lookup allowance.

use std::sync::atomic::{AtomicU32, Ordering};

/// Default number of reality checks per session.
pub const DEFAULT_LIMIT: u32 = 2;

/// Counts checks against a fixed limit.
#[derive(Debug)]
pub struct UsageQuota {
    limit: u32,
    used: AtomicU32,
}

impl UsageQuota {
    /// Creates a quota allowing `limit` checks.
    #[must_use]
    pub const fn new(limit: u32) -> Self {
        Self {
            limit,
            used: AtomicU32::new(0),
        }
    }

    /// Configured limit.
    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.limit
    }

    /// Checks left.
    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.used.load(Ordering::SeqCst))
    }

    /// Whether no checks are left.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Takes one check; returns the remaining count, or `None` if exhausted.
    pub fn try_consume(&self) -> Option<u32> {
        self.used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                (used < self.limit).then_some(used + 1)
            })
            .ok()
            .map(|previous| self.limit - previous - 1)
    }
}

impl Default for UsageQuota {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consumes_down_to_zero() {
        let quota = UsageQuota::default();
        assert_eq!(quota.try_consume(), Some(1));
        assert_eq!(quota.try_consume(), Some(0));
        assert!(quota.is_exhausted());
        assert_eq!(quota.try_consume(), None);
        assert_eq!(quota.remaining(), 0);
    }

    #[test]
    fn test_zero_limit_is_always_exhausted() {
        let quota = UsageQuota::new(0);
        assert!(quota.is_exhausted());
        assert_eq!(quota.try_consume(), None);
    }
}
