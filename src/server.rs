//! Handling of incoming requests and responses.

use std::{
    fmt::{Debug, Write},
    net::SocketAddr,
    sync::Arc,
};

use bytes::Bytes;
use tracing::{debug, warn};

use crate::common::{Contact, KeyId, ValueType};
use crate::context::Context;
use crate::db::ValueRecord;
use crate::messages::{
    FindNodeRequestArguments, FindValueRequestArguments, Message, MessageType, RequestSpecific,
    StatsRequestArguments, StatsType, StoreRequestArguments, StoreStatus, StoreStatusEntry,
};

/// Dht server that answers incoming rpc requests.
pub trait Server: Debug + Send + Sync {
    /// Handle an incoming request received from `from`.
    ///
    /// Returns the response to send back, or `None` if the request is
    /// dropped without an answer (bad token, unknown value type, or not a
    /// request at all).
    fn handle_request(&self, from: SocketAddr, request: &Message) -> Option<Message>;

    /// Returns `true` if `response` answers a request this node sent to the
    /// address the response claims to come from.
    ///
    /// Unauthenticated responses are logged and must be ignored.
    fn accept_response(&self, response: &Message) -> bool;
}

#[derive(Debug, Clone)]
/// Default implementation of [Server] over a [Context].
///
/// It doesn't implement any rate limiting beyond the database limits.
pub struct DefaultServer {
    context: Arc<Context>,
}

impl DefaultServer {
    pub fn new(context: Arc<Context>) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    /// Closest contacts to `target`, the requester excluded.
    fn closest(&self, request: &Message, target: &KeyId) -> Vec<Contact> {
        let k = self.context.config().k;

        self.context
            .route_table()
            .select(target, k + 1)
            .into_iter()
            .filter(|contact| contact.node_id() != request.contact.node_id())
            .take(k)
            .collect()
    }

    fn handle_find_value(
        &self,
        request: &Message,
        arguments: &FindValueRequestArguments,
    ) -> Option<Message> {
        let FindValueRequestArguments {
            target,
            secondary_keys,
            value_type,
        } = arguments;

        if *value_type != ValueType::ANY && !self.context.value_types().contains(*value_type) {
            debug!(?target, ?value_type, requester = %request.contact, "Unknown value type");
            return None;
        }

        let helper = self.context.message_helper();
        let mut database = self.context.database().lock();

        if database.get(target).is_none() {
            drop(database);
            return Some(helper.find_node_response(request, self.closest(request, target)));
        }

        let request_load = database.increment_request_load(target);

        let mut matching = database
            .get(target)
            .into_iter()
            .flat_map(|bag| bag.values())
            .filter(|record| {
                secondary_keys.is_empty() || secondary_keys.contains(record.secondary_key())
            })
            .filter(|record| {
                *value_type == ValueType::ANY || record.value().value_type() == *value_type
            });

        let max = self.context.config().max_values_per_response;
        let records: Vec<ValueRecord> = matching.by_ref().take(max).cloned().collect();
        let remaining: Vec<KeyId> = matching.map(|record| *record.secondary_key()).collect();

        drop(database);

        Some(helper.find_value_response(request, request_load, records, remaining))
    }

    fn handle_store(
        &self,
        from: SocketAddr,
        request: &Message,
        arguments: &StoreRequestArguments,
    ) -> Option<Message> {
        let StoreRequestArguments {
            security_token,
            records,
        } = arguments;

        let claimed = request.contact.address();

        if !self.context.tokens().is_for(security_token.as_bytes(), claimed) {
            debug!(
                ?from,
                ?claimed,
                ?security_token,
                requester = %request.contact,
                request_type = "store",
                "Invalid token"
            );
            return None;
        }

        if let Some(unknown) = records
            .iter()
            .map(|record| record.value().value_type())
            .find(|value_type| !self.context.value_types().contains(*value_type))
        {
            debug!(?from, value_type = ?unknown, "Unknown value type, rejecting store");
            return None;
        }

        let mut statuses = Vec::with_capacity(records.len());
        let mut database = self.context.database().lock();

        for record in records {
            // The sender is whoever presented the token, never what the record claims.
            let status = match ValueRecord::remote(
                record.creator().clone(),
                request.contact.clone(),
                *record.primary_key(),
                record.value().clone(),
            )
            .and_then(|record| database.store(record))
            {
                Ok(true) => StoreStatus::Succeeded,
                Ok(false) => StoreStatus::Failed,
                Err(error) => {
                    debug!(?from, ?error, "Failed to store record");
                    StoreStatus::Failed
                }
            };

            statuses.push(StoreStatusEntry {
                primary_key: *record.primary_key(),
                secondary_key: *record.secondary_key(),
                status,
            });
        }

        drop(database);

        Some(self.context.message_helper().store_response(request, statuses))
    }

    fn handle_stats(&self, request: &Message, stats_type: StatsType) -> Option<Message> {
        let payload = match stats_type {
            StatsType::Statistics => {
                let database = self.context.database().lock();
                let snapshot = database
                    .statistics()
                    .snapshot(database.key_count(), database.value_count());
                drop(database);

                match snapshot.to_bytes() {
                    Ok(bytes) => Bytes::from(bytes),
                    Err(error) => {
                        debug!(?error, "Failed to encode statistics");
                        return None;
                    }
                }
            }
            StatsType::Database => {
                let mut listing = String::new();
                for record in self.context.database().lock().values() {
                    let _ = writeln!(listing, "{}", record);
                }
                Bytes::from(listing)
            }
            StatsType::RouteTable => {
                let route_table = self.context.route_table();
                let local = self.context.local_contact();

                let mut listing = String::new();
                for contact in route_table.select(local.node_id(), route_table.size()) {
                    let _ = writeln!(listing, "{}", contact);
                }
                Bytes::from(listing)
            }
        };

        Some(self.context.message_helper().stats_response(request, payload))
    }
}

impl Server for DefaultServer {
    fn handle_request(&self, from: SocketAddr, request: &Message) -> Option<Message> {
        let request_type = match &request.message_type {
            MessageType::Request(request_type) => request_type,
            MessageType::Response(_) => {
                debug!(?from, "Expected a request, got a response");
                return None;
            }
        };

        let helper = self.context.message_helper();

        match request_type {
            RequestSpecific::Ping => Some(helper.ping_response(request, from)),
            RequestSpecific::FindNode(FindNodeRequestArguments { target }) => {
                Some(helper.find_node_response(request, self.closest(request, target)))
            }
            RequestSpecific::FindValue(arguments) => self.handle_find_value(request, arguments),
            RequestSpecific::Store(arguments) => self.handle_store(from, request, arguments),
            RequestSpecific::Stats(StatsRequestArguments { stats_type }) => {
                self.handle_stats(request, *stats_type)
            }
        }
    }

    fn accept_response(&self, response: &Message) -> bool {
        if response.is_request() {
            return false;
        }

        let claimed = response.contact.address();

        match self
            .context
            .message_ids()
            .verify_security_token(&response.message_id, claimed)
        {
            Ok(()) => true,
            Err(error) => {
                warn!(
                    contact = %response.contact,
                    message_id = %response.message_id,
                    ?error,
                    "Contact sent us an unrequested response"
                );
                false
            }
        }
    }
}
