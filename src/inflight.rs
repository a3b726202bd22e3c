//! Single-flight guard for collaborator calls.

use std::sync::atomic::{AtomicBool, Ordering};

/// Flag marking a call as outstanding.
#[derive(Debug, Default)]
pub struct InFlight(AtomicBool);

impl InFlight {
    /// Creates an idle flag.
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Claims the flag, or returns `None` when a call is already running.
    ///
    /// The flag is released when the returned guard drops.
    #[must_use]
    pub fn try_begin(&self) -> Option<InFlightGuard<'_>> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard(&self.0))
    }

    /// Whether a call is outstanding.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Releases the [`InFlight`] flag on drop.
#[derive(Debug)]
pub struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_claim_fails_until_release() {
        let flag = InFlight::new();
        let guard = flag.try_begin();
        assert!(guard.is_some());
        assert!(flag.is_busy());
        assert!(flag.try_begin().is_none());
        drop(guard);
        assert!(!flag.is_busy());
        assert!(flag.try_begin().is_some());
    }
}
