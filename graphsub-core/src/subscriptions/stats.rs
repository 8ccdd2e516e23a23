use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Running counters for one engine
#[derive(Debug, Default)]
pub struct EngineStats {
    events: AtomicU64,
    delivered: AtomicU64,
    filtered: AtomicU64,
    suppressed: AtomicU64,
    overflowed: AtomicU64,
    closed: AtomicU64,
}

/// Point-in-time copy of [`EngineStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Typed events taken off the dispatch queue
    pub events: u64,
    /// Payloads accepted by a transport
    pub delivered: u64,
    /// Candidate deliveries rejected by a filter
    pub filtered: u64,
    /// Candidate deliveries dropped because a payload could not be narrowed
    pub suppressed: u64,
    /// Payloads dropped on a full subscription queue
    pub overflowed: u64,
    pub closed: u64,
}

impl EngineStats {
    pub(crate) fn record_event(&self) {
        self.events.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_filtered(&self) {
        self.filtered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_suppressed(&self) {
        self.suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_overflow(&self) {
        self.overflowed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_closed(&self) {
        self.closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            events: self.events.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            overflowed: self.overflowed.load(Ordering::Relaxed),
            closed: self.closed.load(Ordering::Relaxed),
        }
    }
}
