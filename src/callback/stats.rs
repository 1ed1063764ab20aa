/*!
 * Callback Statistics
 * Lock-free counters updated from invoke and unregister
 */

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of a bus's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackStats {
    pub registrations: u64,
    pub unregistrations: u64,
    pub invocations: u64,
    /// Calls skipped because the registration was being unregistered
    pub skipped: u64,
    /// Unregistrations that had to wait for in-flight calls
    pub drain_waits: u64,
}

/// Cache-line aligned so invoking threads do not false-share with the list
#[repr(C, align(64))]
#[derive(Default)]
pub(crate) struct AtomicCallbackStats {
    registrations: AtomicU64,
    unregistrations: AtomicU64,
    invocations: AtomicU64,
    skipped: AtomicU64,
    drain_waits: AtomicU64,
}

impl AtomicCallbackStats {
    #[inline]
    pub fn inc_registrations(&self) {
        self.registrations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_unregistrations(&self) {
        self.unregistrations.fetch_add(1, Ordering::Relaxed);
    }

    /// Hot path: once per call of a registered function
    #[inline(always)]
    pub fn inc_invocations(&self) {
        self.invocations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_drain_waits(&self) {
        self.drain_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CallbackStats {
        CallbackStats {
            registrations: self.registrations.load(Ordering::Relaxed),
            unregistrations: self.unregistrations.load(Ordering::Relaxed),
            invocations: self.invocations.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            drain_waits: self.drain_waits.load(Ordering::Relaxed),
        }
    }
}
