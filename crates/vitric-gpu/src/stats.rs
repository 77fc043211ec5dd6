//! Telemetry counters for the submission core.
//!
//! Cheap to update from the recording threads, safe to read from anywhere.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct DeviceStats {
    frames_begun: AtomicU64,
    frames_completed: AtomicU64,
    deferred_replays: AtomicU64,
    direct_updates: AtomicU64,
    mapped_updates: AtomicU64,
    presents: AtomicU64,
    surface_resizes: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStatsSnapshot {
    pub frames_begun: u64,
    pub frames_completed: u64,
    pub deferred_replays: u64,
    pub direct_updates: u64,
    pub mapped_updates: u64,
    pub presents: u64,
    pub surface_resizes: u64,
}

impl DeviceStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> DeviceStatsSnapshot {
        DeviceStatsSnapshot {
            frames_begun: self.frames_begun.load(Ordering::Relaxed),
            frames_completed: self.frames_completed.load(Ordering::Relaxed),
            deferred_replays: self.deferred_replays.load(Ordering::Relaxed),
            direct_updates: self.direct_updates.load(Ordering::Relaxed),
            mapped_updates: self.mapped_updates.load(Ordering::Relaxed),
            presents: self.presents.load(Ordering::Relaxed),
            surface_resizes: self.surface_resizes.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn inc_frames_begun(&self) {
        self.frames_begun.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_frames_completed(&self) {
        self.frames_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_deferred_replays(&self, n: u64) {
        self.deferred_replays.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn inc_direct_updates(&self) {
        self.direct_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_mapped_updates(&self) {
        self.mapped_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_presents(&self) {
        self.presents.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_surface_resizes(&self) {
        self.surface_resizes.fetch_add(1, Ordering::Relaxed);
    }
}
