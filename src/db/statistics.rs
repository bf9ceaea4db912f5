//! Database counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Counters shared by the [Database](super::Database) and the
/// [DatabaseSweeper](super::DatabaseSweeper).
#[derive(Debug, Default)]
pub struct DatabaseStatistics {
    stored: AtomicU64,
    rejected: AtomicU64,
    removed: AtomicU64,
    expired: AtomicU64,
}

/// A point in time copy of [DatabaseStatistics], sent in stats responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    pub stored: u64,
    pub rejected: u64,
    pub removed: u64,
    pub expired: u64,
    pub keys: u64,
    pub values: u64,
}

impl DatabaseStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_stored(&self) {
        self.stored.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_removed(&self) {
        self.removed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_expired(&self, count: u64) {
        self.expired.fetch_add(count, Ordering::Relaxed);
    }

    /// Records accepted into the database.
    pub fn stored(&self) -> u64 {
        self.stored.load(Ordering::Relaxed)
    }

    /// Records the database refused to store.
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Records removed explicitly.
    pub fn removed(&self) -> u64 {
        self.removed.load(Ordering::Relaxed)
    }

    /// Records evicted by the sweeper.
    pub fn expired(&self) -> u64 {
        self.expired.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self, keys: usize, values: usize) -> StatisticsSnapshot {
        StatisticsSnapshot {
            stored: self.stored(),
            rejected: self.rejected(),
            removed: self.removed(),
            expired: self.expired(),
            keys: keys as u64,
            values: values as u64,
        }
    }
}

impl StatisticsSnapshot {
    pub fn to_bytes(&self) -> crate::Result<Vec<u8>> {
        Ok(serde_bencode::to_bytes(self)?)
    }

    pub fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> crate::Result<Self> {
        Ok(serde_bencode::from_bytes(bytes.as_ref())?)
    }
}
