use std::net::SocketAddr;

use bytes::Bytes;
use tracing::{debug, trace};

use super::{Message, StatsType, StoreStatusEntry};
use crate::common::{Contact, KeyId, ValueType};
use crate::context::Context;
use crate::db::ValueRecord;
use crate::security::SecurityToken;

/// Builds messages on behalf of the local node.
///
/// Requests get a fresh [MessageId](crate::security::MessageId) bound to
/// their destination, responses reuse the id of the request they answer.
#[derive(Debug, Clone, Copy)]
pub struct MessageHelper<'a> {
    context: &'a Context,
}

impl<'a> MessageHelper<'a> {
    pub fn new(context: &'a Context) -> Self {
        Self { context }
    }

    // === Requests ===

    pub fn ping_request(&self, destination: SocketAddr) -> Message {
        trace!(?destination, "Creating ping request");

        self.context.message_factory().create_ping_request(
            self.context.local_contact().clone(),
            self.context.message_ids().create(destination),
        )
    }

    pub fn find_node_request(&self, destination: SocketAddr, target: KeyId) -> Message {
        trace!(?destination, ?target, "Creating find node request");

        self.context.message_factory().create_find_node_request(
            self.context.local_contact().clone(),
            self.context.message_ids().create(destination),
            target,
        )
    }

    pub fn find_value_request(
        &self,
        destination: SocketAddr,
        target: KeyId,
        secondary_keys: Vec<KeyId>,
        value_type: ValueType,
    ) -> Message {
        trace!(?destination, ?target, "Creating find value request");

        self.context.message_factory().create_find_value_request(
            self.context.local_contact().clone(),
            self.context.message_ids().create(destination),
            target,
            secondary_keys,
            value_type,
        )
    }

    /// `security_token` must come from a find node response of `destination`.
    pub fn store_request(
        &self,
        destination: SocketAddr,
        security_token: SecurityToken,
        records: Vec<ValueRecord>,
    ) -> Message {
        trace!(?destination, records = records.len(), "Creating store request");

        self.context.message_factory().create_store_request(
            self.context.local_contact().clone(),
            self.context.message_ids().create(destination),
            security_token,
            records,
        )
    }

    pub fn stats_request(&self, destination: SocketAddr, stats_type: StatsType) -> Message {
        self.context.message_factory().create_stats_request(
            self.context.local_contact().clone(),
            self.context.message_ids().create(destination),
            stats_type,
        )
    }

    // === Responses ===

    /// `external_address` is where the request came from.
    pub fn ping_response(&self, request: &Message, external_address: SocketAddr) -> Message {
        self.context.message_factory().create_ping_response(
            self.context.local_contact().clone(),
            request.message_id,
            external_address,
            self.context.estimated_size(),
        )
    }

    /// Answers with `contacts` and a security token for the requester.
    pub fn find_node_response(&self, request: &Message, contacts: Vec<Contact>) -> Message {
        let requester = request.contact.address();

        let security_token = match self.context.tokens().token_for(requester) {
            Ok(token) => Some(token),
            Err(error) => {
                debug!(?requester, ?error, "Answering find node without a token");
                None
            }
        };

        self.context.message_factory().create_find_node_response(
            self.context.local_contact().clone(),
            request.message_id,
            security_token,
            contacts,
        )
    }

    pub fn find_value_response(
        &self,
        request: &Message,
        request_load: f32,
        records: Vec<ValueRecord>,
        secondary_keys: Vec<KeyId>,
    ) -> Message {
        self.context.message_factory().create_find_value_response(
            self.context.local_contact().clone(),
            request.message_id,
            request_load,
            records,
            secondary_keys,
        )
    }

    pub fn store_response(&self, request: &Message, statuses: Vec<StoreStatusEntry>) -> Message {
        self.context.message_factory().create_store_response(
            self.context.local_contact().clone(),
            request.message_id,
            statuses,
        )
    }

    pub fn stats_response(&self, request: &Message, payload: Bytes) -> Message {
        self.context.message_factory().create_stats_response(
            self.context.local_contact().clone(),
            request.message_id,
            payload,
        )
    }
}
