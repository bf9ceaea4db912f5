//! Per value type expiry policies.
use std::{collections::HashMap, fmt::Debug, sync::Arc, time::Duration};

use crate::common::ValueType;
use crate::config::DatabaseSettings;
use crate::db::ValueRecord;
use crate::routing::{RouteTable, DEFAULT_K};

/// Decides whether a record should be dropped by the next sweep.
pub trait Evictor: Send + Sync + Debug {
    fn is_expired(&self, route_table: &dyn RouteTable, record: &ValueRecord) -> bool;
}

#[derive(Debug, Clone)]
/// Expiry policy for value types without a registered [Evictor].
///
/// Local records never expire. A remote record lives for `value_expiration`
/// while the local node is one of the `k` closest nodes to its key, and for
/// `far_value_expiration` once it is not, since it is then only a cached copy.
pub struct DefaultEvictor {
    value_expiration: Duration,
    far_value_expiration: Duration,
    k: usize,
}

impl DefaultEvictor {
    pub fn new(value_expiration: Duration, far_value_expiration: Duration, k: usize) -> Self {
        Self {
            value_expiration,
            far_value_expiration,
            k,
        }
    }

    pub fn from_settings(settings: &DatabaseSettings, k: usize) -> Self {
        Self::new(settings.value_expiration, settings.far_value_expiration, k)
    }
}

impl Default for DefaultEvictor {
    fn default() -> Self {
        Self::from_settings(&DatabaseSettings::default(), DEFAULT_K)
    }
}

impl Evictor for DefaultEvictor {
    fn is_expired(&self, route_table: &dyn RouteTable, record: &ValueRecord) -> bool {
        if record.is_local() {
            return false;
        }

        let age = record.age();

        if age >= self.value_expiration {
            return true;
        }

        age >= self.far_value_expiration
            && !route_table.is_among_closest(record.primary_key(), self.k)
    }
}

#[derive(Debug, Clone)]
/// Maps value types to their [Evictor], falling back to a default one.
pub struct EvictorRegistry {
    evictors: HashMap<ValueType, Arc<dyn Evictor>>,
    default: Arc<dyn Evictor>,
}

impl EvictorRegistry {
    pub fn new(default: Arc<dyn Evictor>) -> Self {
        Self {
            evictors: HashMap::new(),
            default,
        }
    }

    /// Registers `evictor` for `value_type`, returning the one it replaced.
    pub fn add_evictor(
        &mut self,
        value_type: ValueType,
        evictor: Arc<dyn Evictor>,
    ) -> Option<Arc<dyn Evictor>> {
        self.evictors.insert(value_type, evictor)
    }

    pub fn remove_evictor(&mut self, value_type: ValueType) -> Option<Arc<dyn Evictor>> {
        self.evictors.remove(&value_type)
    }

    /// The evictor for `value_type`, or the default one.
    pub fn evictor(&self, value_type: ValueType) -> &Arc<dyn Evictor> {
        self.evictors.get(&value_type).unwrap_or(&self.default)
    }

    pub fn default_evictor(&self) -> &Arc<dyn Evictor> {
        &self.default
    }
}

impl Default for EvictorRegistry {
    fn default() -> Self {
        Self::new(Arc::new(DefaultEvictor::default()))
    }
}
