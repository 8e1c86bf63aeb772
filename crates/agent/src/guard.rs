//! Single-active-run guard.

use std::sync::atomic::{AtomicBool, Ordering};

/// Admits at most one run (or plan) at a time.
#[derive(Debug, Default)]
pub struct RunGuard {
    active: AtomicBool,
}

impl RunGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the guard; `None` if a run is already active.
    pub fn try_acquire(&self) -> Option<RunPermit<'_>> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunPermit { guard: self })
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Releases the guard on drop, including on early return or cancellation.
#[derive(Debug)]
pub struct RunPermit<'a> {
    guard: &'a RunGuard,
}

impl Drop for RunPermit<'_> {
    fn drop(&mut self) {
        self.guard.active.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_until_release() {
        let guard = RunGuard::new();
        let permit = guard.try_acquire().unwrap();
        assert!(guard.is_active());
        assert!(guard.try_acquire().is_none());

        drop(permit);
        assert!(!guard.is_active());
        assert!(guard.try_acquire().is_some());
    }
}
