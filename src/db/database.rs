//! The value store: primary key -> [ValueBag].
use std::{collections::HashMap, net::IpAddr, sync::Arc};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::common::KeyId;
use crate::config::DatabaseSettings;
use crate::db::{DatabaseStatistics, ValueBag, ValueRecord};
use crate::{Error, Result};

/// A [Database] behind the single lock that guards every mutation and scan.
pub type SharedDatabase = Arc<Mutex<Database>>;

#[derive(Debug)]
/// In memory store of [ValueRecord]s grouped by primary key.
///
/// Empty bags are never retained. The database itself is not synchronized;
/// share it as a [SharedDatabase].
pub struct Database {
    settings: DatabaseSettings,
    bags: HashMap<KeyId, ValueBag>,
    /// Number of remote records per creator IP.
    records_per_address: HashMap<IpAddr, usize>,
    statistics: Arc<DatabaseStatistics>,
}

impl Database {
    pub fn new(settings: DatabaseSettings) -> Self {
        Self {
            settings,
            bags: HashMap::new(),
            records_per_address: HashMap::new(),
            statistics: Arc::new(DatabaseStatistics::new()),
        }
    }

    /// Share the statistics counters with other components.
    pub fn with_statistics(mut self, statistics: Arc<DatabaseStatistics>) -> Self {
        self.statistics = statistics;
        self
    }

    pub fn into_shared(self) -> SharedDatabase {
        Arc::new(Mutex::new(self))
    }

    pub fn settings(&self) -> &DatabaseSettings {
        &self.settings
    }

    pub fn statistics(&self) -> &Arc<DatabaseStatistics> {
        &self.statistics
    }

    // === Public Methods ===

    /// Store a record received from the network or created locally.
    ///
    /// A record with an empty value removes the record it names instead.
    /// Returns `true` if the database changed.
    pub fn store(&mut self, record: ValueRecord) -> Result<bool> {
        if record.value().is_empty() {
            return Ok(self.remote_remove(&record));
        }

        self.add(record)
    }

    /// Add a record with a non empty value.
    ///
    /// Returns `Ok(false)` if capacity limits or replacement rules refuse it.
    pub fn add(&mut self, record: ValueRecord) -> Result<bool> {
        if record.value().is_empty() {
            return Err(Error::InvalidArgument(
                "empty values are removals, use Database::store".to_string(),
            ));
        }

        if !self.can_add(&record) {
            self.statistics.record_rejected();
            return Ok(false);
        }

        let primary_key = *record.primary_key();
        let secondary_key = *record.secondary_key();
        let address = (!record.is_local()).then(|| record.creator().address().ip());

        let settings = &self.settings;
        let bag = self
            .bags
            .entry(primary_key)
            .or_insert_with(|| ValueBag::new(primary_key, settings));

        let previous = bag
            .get(&secondary_key)
            .filter(|current| !current.is_local())
            .map(|current| current.creator().address().ip());

        let added = match bag.add(record) {
            Ok(added) => added,
            Err(error) => {
                self.remove_if_empty(&primary_key);
                return Err(error);
            }
        };

        if !added {
            self.remove_if_empty(&primary_key);
            self.statistics.record_rejected();
            trace!(?primary_key, ?secondary_key, "Record may not replace current one");
            return Ok(false);
        }

        if let Some(previous) = previous {
            self.forget_address(previous);
        }
        if let Some(address) = address {
            *self.records_per_address.entry(address).or_default() += 1;
        }

        self.statistics.record_stored();
        Ok(true)
    }

    /// Remove the record under `(primary_key, secondary_key)`.
    pub fn remove(&mut self, primary_key: &KeyId, secondary_key: &KeyId) -> Option<ValueRecord> {
        let removed = self.bags.get_mut(primary_key)?.remove(secondary_key)?;

        self.removed(&removed);
        Some(removed)
    }

    pub fn get(&self, primary_key: &KeyId) -> Option<&ValueBag> {
        self.bags.get(primary_key)
    }

    pub fn get_record(&self, primary_key: &KeyId, secondary_key: &KeyId) -> Option<&ValueRecord> {
        self.bags.get(primary_key)?.get(secondary_key)
    }

    pub fn contains(&self, primary_key: &KeyId, secondary_key: &KeyId) -> bool {
        self.get_record(primary_key, secondary_key).is_some()
    }

    /// Every stored record.
    pub fn values(&self) -> impl Iterator<Item = &ValueRecord> {
        self.bags.values().flat_map(|bag| bag.values())
    }

    pub fn keys(&self) -> impl Iterator<Item = &KeyId> {
        self.bags.keys()
    }

    /// Number of primary keys.
    pub fn key_count(&self) -> usize {
        self.bags.len()
    }

    /// Number of records.
    pub fn value_count(&self) -> usize {
        self.bags.values().map(|bag| bag.len()).sum()
    }

    pub fn clear(&mut self) {
        self.bags.clear();
        self.records_per_address.clear();
    }

    /// Current request load of a key, `0.0` for unknown keys.
    pub fn request_load(&self, primary_key: &KeyId) -> f32 {
        self.bags
            .get(primary_key)
            .map(|bag| bag.request_load())
            .unwrap_or(0.0)
    }

    /// Account for a lookup of `primary_key`, returns the updated load.
    pub fn increment_request_load(&mut self, primary_key: &KeyId) -> f32 {
        self.bags
            .get_mut(primary_key)
            .map(|bag| bag.increment_request_load())
            .unwrap_or(0.0)
    }

    // === Private Methods ===

    fn can_add(&self, record: &ValueRecord) -> bool {
        if record.is_local() {
            return true;
        }

        let primary_key = record.primary_key();
        let secondary_key = record.secondary_key();
        let exists = self.contains(primary_key, secondary_key);

        if let Some(limit) = self.settings.max_values_per_address {
            let address = record.creator().address().ip();
            let count = self
                .records_per_address
                .get(&address)
                .copied()
                .unwrap_or(0);

            if !exists && count >= limit {
                debug!(?address, count, "Creator address owns too many records");
                return false;
            }
        }

        match self.bags.get(primary_key) {
            None => self
                .settings
                .max_database_size
                .map_or(true, |max| self.bags.len() < max),
            Some(bag) => {
                let has_room = self
                    .settings
                    .max_values_per_key
                    .map_or(true, |max| bag.len() < max);

                has_room || (exists && record.is_direct())
            }
        }
    }

    fn remote_remove(&mut self, marker: &ValueRecord) -> bool {
        let removed = match self.bags.get_mut(marker.primary_key()) {
            Some(bag) => bag.remote_remove(marker),
            None => None,
        };

        match removed {
            Some(removed) => {
                self.removed(&removed);
                true
            }
            None => false,
        }
    }

    /// Bookkeeping after a record left its bag.
    fn removed(&mut self, record: &ValueRecord) {
        if !record.is_local() {
            self.forget_address(record.creator().address().ip());
        }

        self.remove_if_empty(record.primary_key());
        self.statistics.record_removed();
    }

    fn remove_if_empty(&mut self, primary_key: &KeyId) {
        if self.bags.get(primary_key).is_some_and(|bag| bag.is_empty()) {
            self.bags.remove(primary_key);
        }
    }

    fn forget_address(&mut self, address: IpAddr) {
        if let Some(count) = self.records_per_address.get_mut(&address) {
            *count = count.saturating_sub(1);

            if *count == 0 {
                self.records_per_address.remove(&address);
            }
        }
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new(DatabaseSettings::default())
    }
}
