//! The routing table as seen by the value store.
//!
//! Bucket management and liveness tracking live outside this crate; the store
//! only needs to ask who is close to a key.

use std::fmt::Debug;

use crate::common::{Contact, KeyId};

/// K = the default replication parameter.
pub const DEFAULT_K: usize = 20;

/// Proximity queries the store and evictors rely on.
pub trait RouteTable: Send + Sync + Debug {
    /// The local node.
    fn local_node(&self) -> Contact;

    /// Up to `count` live contacts ordered by XOR distance to `target`,
    /// closest first. May include the local node.
    fn select(&self, target: &KeyId, count: usize) -> Vec<Contact>;

    /// Number of contacts in the table.
    fn size(&self) -> usize;

    /// Returns `true` if the local node is one of the `k` closest known nodes
    /// to `key`, or if fewer than `k` nodes are known at all.
    fn is_among_closest(&self, key: &KeyId, k: usize) -> bool {
        let closest = self.select(key, k);

        if closest.len() < k {
            return true;
        }

        let local = self.local_node();
        closest
            .iter()
            .any(|contact| contact.node_id() == local.node_id())
    }
}

/// A route table over a fixed set of contacts.
///
/// Useful when the real routing layer is not running, e.g. for a node that
/// only serves a known group of peers.
#[derive(Debug, Clone)]
pub struct StaticRouteTable {
    local: Contact,
    contacts: Vec<Contact>,
}

impl StaticRouteTable {
    pub fn new(local: Contact) -> Self {
        Self {
            local,
            contacts: Vec::new(),
        }
    }

    pub fn with_contacts(mut self, contacts: Vec<Contact>) -> Self {
        for contact in contacts {
            self.add(contact);
        }
        self
    }

    /// Adds a contact, returns `false` if its node id is already known.
    pub fn add(&mut self, contact: Contact) -> bool {
        if contact.node_id() == self.local.node_id()
            || self
                .contacts
                .iter()
                .any(|c| c.node_id() == contact.node_id())
        {
            return false;
        }

        self.contacts.push(contact);
        true
    }
}

impl RouteTable for StaticRouteTable {
    fn local_node(&self) -> Contact {
        self.local.clone()
    }

    fn select(&self, target: &KeyId, count: usize) -> Vec<Contact> {
        let mut all: Vec<&Contact> = self.contacts.iter().collect();
        all.push(&self.local);

        all.sort_by_key(|contact| target.distance(contact.node_id()));

        all.into_iter().take(count).cloned().collect()
    }

    fn size(&self) -> usize {
        self.contacts.len() + 1
    }
}
