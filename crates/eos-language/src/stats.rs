//! Lock-free counters of registry activity.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct RegistryStats {
    adds: AtomicU64,
    deletes: AtomicU64,
    grows: AtomicU64,
    stale_lookups: AtomicU64,
    stale_releases: AtomicU64,
}

/// Point-in-time copy of [`RegistryStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub adds: u64,
    pub deletes: u64,
    pub grows: u64,
    pub stale_lookups: u64,
    pub stale_releases: u64,
}

impl RegistryStats {
    pub const fn new() -> Self {
        Self {
            adds: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
            grows: AtomicU64::new(0),
            stale_lookups: AtomicU64::new(0),
            stale_releases: AtomicU64::new(0),
        }
    }

    pub(crate) fn record_add(&self) {
        self.adds.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_grow(&self) {
        self.grows.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_stale_lookup(&self) {
        self.stale_lookups.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_stale_release(&self) {
        self.stale_releases.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            adds: self.adds.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            grows: self.grows.load(Ordering::Relaxed),
            stale_lookups: self.stale_lookups.load(Ordering::Relaxed),
            stale_releases: self.stale_releases.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.adds.store(0, Ordering::Relaxed);
        self.deletes.store(0, Ordering::Relaxed);
        self.grows.store(0, Ordering::Relaxed);
        self.stale_lookups.store(0, Ordering::Relaxed);
        self.stale_releases.store(0, Ordering::Relaxed);
    }

    /// Emit the counters as one `info` event.
    pub fn log_summary(&self) {
        let s = self.snapshot();
        tracing::info!(
            adds = s.adds,
            deletes = s.deletes,
            grows = s.grows,
            stale_lookups = s.stale_lookups,
            stale_releases = s.stale_releases,
            net_live = s.net_live(),
            "registry activity"
        );
    }
}

impl StatsSnapshot {
    /// Objects added and not yet deleted over the counted period.
    pub fn net_live(&self) -> i64 {
        self.adds as i64 - self.deletes as i64
    }
}
