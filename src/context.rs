//! State shared by every component of a node.
use std::{
    fmt::{self, Debug, Formatter},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use parking_lot::RwLock;

use crate::common::{Contact, KeyId, Value, ValueTypeRegistry};
use crate::config::Config;
use crate::db::{
    Database, DatabaseSweeper, DefaultEvictor, EvictorRegistry, SharedDatabase, ValueRecord,
};
use crate::messages::{DefaultMessageFactory, MessageFactory, MessageHelper};
use crate::routing::RouteTable;
use crate::security::{MessageIdFactory, SecurityTokenProvider};
use crate::Result;

/// The local node: identity, secret material, store and registries.
///
/// Built once at startup and shared, usually behind an [Arc].
pub struct Context {
    config: Config,
    local: Contact,
    tokens: Arc<SecurityTokenProvider>,
    message_ids: MessageIdFactory,
    message_factory: Box<dyn MessageFactory>,
    value_types: ValueTypeRegistry,
    database: SharedDatabase,
    evictors: Arc<RwLock<EvictorRegistry>>,
    route_table: Arc<dyn RouteTable>,
    /// 0 until set by the routing layer.
    estimated_size: AtomicU64,
}

impl Debug for Context {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("local", &self.local)
            .field("config", &self.config)
            .field("route_table", &self.route_table)
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Create the context of the node `route_table` reports as local.
    ///
    /// The local contact keeps the id and address from `route_table` and
    /// advertises `config.vendor` and `config.version`.
    ///
    /// Fails if `config.token_length` is out of range.
    pub fn new(config: Config, route_table: Arc<dyn RouteTable>) -> Result<Self> {
        let node = route_table.local_node();
        let local = Contact::new(*node.node_id(), node.address(), config.vendor, config.version)?
            .with_firewalled(node.is_firewalled());

        let tokens =
            Arc::new(SecurityTokenProvider::new().with_token_length(config.token_length)?);
        let evictors = EvictorRegistry::new(Arc::new(DefaultEvictor::from_settings(
            &config.database,
            config.k,
        )));

        Ok(Self {
            local,
            message_ids: MessageIdFactory::new(tokens.clone()),
            tokens,
            message_factory: Box::new(DefaultMessageFactory),
            value_types: ValueTypeRegistry::default(),
            database: Database::new(config.database.clone()).into_shared(),
            evictors: Arc::new(RwLock::new(evictors)),
            route_table,
            estimated_size: AtomicU64::new(0),
            config,
        })
    }

    /// Use fixed secret material, e.g. to keep tokens valid across restarts.
    pub fn with_tokens(mut self, tokens: SecurityTokenProvider) -> Self {
        self.tokens = Arc::new(tokens);
        self.message_ids = MessageIdFactory::new(self.tokens.clone());
        self
    }

    pub fn with_message_factory(mut self, message_factory: Box<dyn MessageFactory>) -> Self {
        self.message_factory = message_factory;
        self
    }

    pub fn with_value_types(mut self, value_types: ValueTypeRegistry) -> Self {
        self.value_types = value_types;
        self
    }

    // === Getters ===

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn local_contact(&self) -> &Contact {
        &self.local
    }

    pub fn tokens(&self) -> &SecurityTokenProvider {
        &self.tokens
    }

    pub fn message_ids(&self) -> &MessageIdFactory {
        &self.message_ids
    }

    pub fn message_factory(&self) -> &dyn MessageFactory {
        self.message_factory.as_ref()
    }

    pub fn value_types(&self) -> &ValueTypeRegistry {
        &self.value_types
    }

    pub fn database(&self) -> &SharedDatabase {
        &self.database
    }

    pub fn evictors(&self) -> &Arc<RwLock<EvictorRegistry>> {
        &self.evictors
    }

    pub fn route_table(&self) -> &Arc<dyn RouteTable> {
        &self.route_table
    }

    /// Estimated number of nodes in the network, at least the size of the route table.
    pub fn estimated_size(&self) -> u64 {
        self.estimated_size
            .load(Ordering::Relaxed)
            .max(self.route_table.size() as u64)
    }

    pub fn set_estimated_size(&self, estimated_size: u64) {
        self.estimated_size.store(estimated_size, Ordering::Relaxed);
    }

    // === Public Methods ===

    pub fn message_helper(&self) -> MessageHelper<'_> {
        MessageHelper::new(self)
    }

    /// A record of `value` under `primary_key`, created by the local node.
    pub fn create_local_record(&self, primary_key: KeyId, value: Value) -> Result<ValueRecord> {
        ValueRecord::local(&self.local, primary_key, value)
    }

    /// Store or, for an empty `value`, remove the local node's record under `primary_key`.
    pub fn store_local(&self, primary_key: KeyId, value: Value) -> Result<bool> {
        let record = self.create_local_record(primary_key, value)?;

        self.database.lock().store(record)
    }

    /// A sweeper over this context's database, not started yet.
    pub fn sweeper(&self) -> DatabaseSweeper {
        DatabaseSweeper::new(
            self.database.clone(),
            self.evictors.clone(),
            self.route_table.clone(),
            self.config.sweep_interval,
        )
    }
}
