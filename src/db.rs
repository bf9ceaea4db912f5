//! The value store, its expiry policies and the background sweeper.

mod bag;
mod database;
mod evictor;
mod record;
mod statistics;
mod sweeper;

pub use bag::ValueBag;
pub use database::{Database, SharedDatabase};
pub use evictor::{DefaultEvictor, Evictor, EvictorRegistry};
pub use record::ValueRecord;
pub use statistics::{DatabaseStatistics, StatisticsSnapshot};
pub use sweeper::DatabaseSweeper;
