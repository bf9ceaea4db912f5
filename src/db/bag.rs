//! All records sharing one primary key, plus the key's request load.
use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use crate::common::KeyId;
use crate::config::DatabaseSettings;
use crate::db::ValueRecord;
use crate::{Error, Result};

/// Shortest delay between two requests the load estimate accounts for, in seconds.
const MIN_REQUEST_DELAY: f32 = 0.01;

#[derive(Debug, Clone)]
/// Records under one primary key, keyed by secondary key.
pub struct ValueBag {
    primary_key: KeyId,
    records: HashMap<KeyId, ValueRecord>,

    /// Exponential moving average of requests per second.
    request_load: f32,
    last_request_time: Option<Instant>,

    smoothing_factor: f32,
    nulling_delay: Duration,
}

impl ValueBag {
    pub fn new(primary_key: KeyId, settings: &DatabaseSettings) -> Self {
        Self {
            primary_key,
            records: HashMap::new(),
            request_load: 0.0,
            last_request_time: None,
            smoothing_factor: settings.request_load_smoothing_factor,
            nulling_delay: settings.request_load_nulling_delay,
        }
    }

    pub fn primary_key(&self) -> &KeyId {
        &self.primary_key
    }

    // === Public Methods ===

    /// Insert or replace the record under its secondary key.
    ///
    /// Returns `Ok(false)` if the record may not replace the current one:
    /// a remote record never replaces a local one, and a forwarded record
    /// never replaces a directly stored one.
    pub fn add(&mut self, record: ValueRecord) -> Result<bool> {
        if record.primary_key() != &self.primary_key {
            return Err(Error::InvalidArgument(format!(
                "record primary key {} does not belong in bag {}",
                record.primary_key(),
                self.primary_key
            )));
        }

        if let Some(current) = self.records.get(record.secondary_key()) {
            let allowed = if record.is_direct() {
                !current.is_local() || record.is_local()
            } else {
                !current.is_direct()
            };

            if !allowed {
                return Ok(false);
            }
        }

        self.records.insert(*record.secondary_key(), record);
        Ok(true)
    }

    pub fn get(&self, secondary_key: &KeyId) -> Option<&ValueRecord> {
        self.records.get(secondary_key)
    }

    pub fn contains(&self, secondary_key: &KeyId) -> bool {
        self.records.contains_key(secondary_key)
    }

    pub fn remove(&mut self, secondary_key: &KeyId) -> Option<ValueRecord> {
        self.records.remove(secondary_key)
    }

    /// Remove on behalf of a removal marker received from the network.
    ///
    /// Only the creator may remove its record, directly, and local records
    /// only go away through local removes.
    pub fn remote_remove(&mut self, marker: &ValueRecord) -> Option<ValueRecord> {
        if !(marker.is_direct() || marker.is_local()) {
            return None;
        }

        let current = self.records.get(marker.secondary_key())?;

        if current.is_local() && !marker.is_local() {
            return None;
        }

        self.records.remove(marker.secondary_key())
    }

    pub fn values(&self) -> impl Iterator<Item = &ValueRecord> {
        self.records.values()
    }

    pub fn secondary_keys(&self) -> impl Iterator<Item = &KeyId> {
        self.records.keys()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Requests per second for this key.
    pub fn request_load(&self) -> f32 {
        self.request_load
    }

    /// Account for a lookup of this key happening now.
    pub fn increment_request_load(&mut self) -> f32 {
        self.increment_request_load_at(Instant::now())
    }

    /// Account for a lookup of this key happening at `now`.
    pub fn increment_request_load_at(&mut self, now: Instant) -> f32 {
        match self.last_request_time {
            Some(last) => {
                let elapsed = now.saturating_duration_since(last);
                let delay = elapsed.as_secs_f32().max(MIN_REQUEST_DELAY);

                if elapsed > self.nulling_delay {
                    // Too old to tell anything about the current load.
                    self.request_load = 0.0;
                } else {
                    self.request_load +=
                        self.smoothing_factor * (1.0 / delay - self.request_load);
                }
            }
            None => self.request_load = 0.0,
        }

        self.last_request_time = Some(now);
        self.request_load
    }
}
