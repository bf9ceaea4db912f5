use std::time::Duration;

use crate::common::{Vendor, Version};
use crate::routing::DEFAULT_K;
use crate::security::DEFAULT_TOKEN_LENGTH;

/// Default delay between two database sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
/// Default number of records returned by a single find value response.
pub const DEFAULT_MAX_VALUES_PER_RESPONSE: usize = 10;

#[derive(Debug, Clone)]
/// Node configurations
pub struct Config {
    /// Vendor advertised by the local contact.
    ///
    /// Defaults to [Vendor::UNKNOWN]
    pub vendor: Vendor,
    /// Protocol version advertised by the local contact.
    ///
    /// Defaults to [Version::ZERO]
    pub version: Version,
    /// Length of generated security tokens, between 4 and 16 bytes.
    ///
    /// Defaults to [DEFAULT_TOKEN_LENGTH]
    pub token_length: usize,
    /// Fixed delay between two runs of the [crate::db::DatabaseSweeper].
    ///
    /// Defaults to [DEFAULT_SWEEP_INTERVAL]
    pub sweep_interval: Duration,
    /// Replication parameter: how many of the closest nodes hold a value,
    /// and how many contacts a find node response returns.
    ///
    /// Defaults to [DEFAULT_K]
    pub k: usize,
    /// Maximum number of records returned in a find value response, the
    /// secondary keys of the remaining ones are listed instead.
    ///
    /// Defaults to [DEFAULT_MAX_VALUES_PER_RESPONSE]
    pub max_values_per_response: usize,
    /// Database limits and request load tuning.
    pub database: DatabaseSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vendor: Vendor::UNKNOWN,
            version: Version::ZERO,
            token_length: DEFAULT_TOKEN_LENGTH,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            k: DEFAULT_K,
            max_values_per_response: DEFAULT_MAX_VALUES_PER_RESPONSE,
            database: DatabaseSettings::default(),
        }
    }
}

#[derive(Debug, Clone)]
/// Settings for the [crate::db::Database].
pub struct DatabaseSettings {
    /// The maximum number of primary keys, `None` for no limit.
    ///
    /// Defaults to `None`
    pub max_database_size: Option<usize>,
    /// The maximum number of records under one primary key, `None` for no limit.
    ///
    /// Defaults to `None`
    pub max_values_per_key: Option<usize>,
    /// The maximum number of records created by a single IP address,
    /// `None` for no limit.
    ///
    /// Defaults to `Some(5)`
    pub max_values_per_address: Option<usize>,
    /// Weight of the newest sample in the request load moving average.
    ///
    /// Defaults to `0.25`
    pub request_load_smoothing_factor: f32,
    /// A request arriving after this much silence resets the request load.
    ///
    /// Defaults to 500 seconds
    pub request_load_nulling_delay: Duration,
    /// Age at which [crate::db::DefaultEvictor] expires a remote record
    /// while the local node is one of the k closest to its key.
    ///
    /// Defaults to 60 minutes
    pub value_expiration: Duration,
    /// Age at which [crate::db::DefaultEvictor] expires a remote record
    /// once the local node is no longer one of the k closest to its key.
    ///
    /// Defaults to 30 minutes
    pub far_value_expiration: Duration,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            max_database_size: None,
            max_values_per_key: None,
            max_values_per_address: Some(5),
            request_load_smoothing_factor: 0.25,
            request_load_nulling_delay: Duration::from_secs(500),
            value_expiration: Duration::from_secs(60 * 60),
            far_value_expiration: Duration::from_secs(30 * 60),
        }
    }
}
