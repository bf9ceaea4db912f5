//! One stored row: a value under a (content key, creator) pair.
use std::{
    fmt::{self, Display, Formatter},
    hash::{Hash, Hasher},
    time::{Duration, Instant},
};

use crate::common::{Contact, KeyId, KeyKind, Value};
use crate::Result;

#[derive(Debug, Clone)]
/// A [Value] stored under `primary_key` by `creator`.
///
/// Two records are equal if they share primary and secondary keys, whatever
/// their values, so storing a new value under the same keys replaces the old one.
pub struct ValueRecord {
    creator: Contact,
    sender: Contact,
    primary_key: KeyId,
    secondary_key: KeyId,
    value: Value,
    creation_time: Instant,
    local: bool,
}

impl ValueRecord {
    /// A record created by the local node.
    pub fn local(local_node: &Contact, primary_key: KeyId, value: Value) -> Result<Self> {
        Self::new(local_node.clone(), local_node.clone(), primary_key, value, true)
    }

    /// A record received from `sender` on behalf of `creator`.
    pub fn remote(
        creator: Contact,
        sender: Contact,
        primary_key: KeyId,
        value: Value,
    ) -> Result<Self> {
        Self::new(creator, sender, primary_key, value, false)
    }

    fn new(
        creator: Contact,
        sender: Contact,
        primary_key: KeyId,
        value: Value,
        local: bool,
    ) -> Result<Self> {
        primary_key.assert_kind(KeyKind::Value)?;

        Ok(Self {
            secondary_key: *creator.node_id(),
            creator,
            sender,
            primary_key,
            value,
            creation_time: Instant::now(),
            local,
        })
    }

    /// Override the creation time, e.g. when restoring a record.
    pub fn with_creation_time(mut self, creation_time: Instant) -> Self {
        self.creation_time = creation_time;
        self
    }

    // === Getters ===

    pub fn creator(&self) -> &Contact {
        &self.creator
    }

    pub fn sender(&self) -> &Contact {
        &self.sender
    }

    pub fn primary_key(&self) -> &KeyId {
        &self.primary_key
    }

    /// The creator's node id.
    pub fn secondary_key(&self) -> &KeyId {
        &self.secondary_key
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn creation_time(&self) -> Instant {
        self.creation_time
    }

    pub fn age(&self) -> Duration {
        self.creation_time.elapsed()
    }

    pub fn is_local(&self) -> bool {
        self.local
    }

    /// Returns `true` if the creator stored this record itself, `false` if
    /// it was forwarded by another node.
    pub fn is_direct(&self) -> bool {
        self.creator.node_id() == self.sender.node_id()
    }
}

impl PartialEq for ValueRecord {
    fn eq(&self, other: &Self) -> bool {
        self.primary_key == other.primary_key && self.secondary_key == other.secondary_key
    }
}

impl Eq for ValueRecord {}

impl Hash for ValueRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.primary_key.hash(state);
        self.secondary_key.hash(state);
    }
}

impl Display for ValueRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} {} v{} {} bytes{}{}",
            self.primary_key,
            self.secondary_key,
            self.value.value_type(),
            self.value.version(),
            self.value.len(),
            if self.local { " local" } else { "" },
            if self.is_direct() { "" } else { " indirect" },
        )
    }
}
