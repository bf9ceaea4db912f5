use std::{fmt::Debug, net::SocketAddr};

use bytes::Bytes;

use super::{
    FindNodeRequestArguments, FindNodeResponseArguments, FindValueRequestArguments,
    FindValueResponseArguments, Message, MessageType, PingResponseArguments, RequestSpecific,
    ResponseSpecific, StatsRequestArguments, StatsResponseArguments, StatsType,
    StoreRequestArguments, StoreResponseArguments, StoreStatusEntry,
};
use crate::common::{Contact, KeyId, ValueType};
use crate::db::ValueRecord;
use crate::security::{MessageId, SecurityToken};

/// Builds message objects from already validated parts.
///
/// No I/O and no verification happens here. Every method has a default
/// implementation, override the ones that need a different message shape.
pub trait MessageFactory: Send + Sync + Debug {
    fn create_ping_request(&self, contact: Contact, message_id: MessageId) -> Message {
        request(contact, message_id, RequestSpecific::Ping)
    }

    fn create_ping_response(
        &self,
        contact: Contact,
        message_id: MessageId,
        external_address: SocketAddr,
        estimated_size: u64,
    ) -> Message {
        response(
            contact,
            message_id,
            ResponseSpecific::Ping(PingResponseArguments {
                external_address,
                estimated_size,
            }),
        )
    }

    fn create_find_node_request(
        &self,
        contact: Contact,
        message_id: MessageId,
        target: KeyId,
    ) -> Message {
        request(
            contact,
            message_id,
            RequestSpecific::FindNode(FindNodeRequestArguments { target }),
        )
    }

    fn create_find_node_response(
        &self,
        contact: Contact,
        message_id: MessageId,
        security_token: Option<SecurityToken>,
        contacts: Vec<Contact>,
    ) -> Message {
        response(
            contact,
            message_id,
            ResponseSpecific::FindNode(FindNodeResponseArguments {
                security_token,
                contacts,
            }),
        )
    }

    fn create_find_value_request(
        &self,
        contact: Contact,
        message_id: MessageId,
        target: KeyId,
        secondary_keys: Vec<KeyId>,
        value_type: ValueType,
    ) -> Message {
        request(
            contact,
            message_id,
            RequestSpecific::FindValue(FindValueRequestArguments {
                target,
                secondary_keys,
                value_type,
            }),
        )
    }

    fn create_find_value_response(
        &self,
        contact: Contact,
        message_id: MessageId,
        request_load: f32,
        records: Vec<ValueRecord>,
        secondary_keys: Vec<KeyId>,
    ) -> Message {
        response(
            contact,
            message_id,
            ResponseSpecific::FindValue(FindValueResponseArguments {
                request_load,
                records,
                secondary_keys,
            }),
        )
    }

    fn create_store_request(
        &self,
        contact: Contact,
        message_id: MessageId,
        security_token: SecurityToken,
        records: Vec<ValueRecord>,
    ) -> Message {
        request(
            contact,
            message_id,
            RequestSpecific::Store(StoreRequestArguments {
                security_token,
                records,
            }),
        )
    }

    fn create_store_response(
        &self,
        contact: Contact,
        message_id: MessageId,
        statuses: Vec<StoreStatusEntry>,
    ) -> Message {
        response(
            contact,
            message_id,
            ResponseSpecific::Store(StoreResponseArguments { statuses }),
        )
    }

    fn create_stats_request(
        &self,
        contact: Contact,
        message_id: MessageId,
        stats_type: StatsType,
    ) -> Message {
        request(
            contact,
            message_id,
            RequestSpecific::Stats(StatsRequestArguments { stats_type }),
        )
    }

    fn create_stats_response(
        &self,
        contact: Contact,
        message_id: MessageId,
        payload: Bytes,
    ) -> Message {
        response(
            contact,
            message_id,
            ResponseSpecific::Stats(StatsResponseArguments { payload }),
        )
    }
}

#[derive(Debug, Clone, Copy, Default)]
/// [MessageFactory] with the default message shapes.
pub struct DefaultMessageFactory;

impl MessageFactory for DefaultMessageFactory {}

fn request(contact: Contact, message_id: MessageId, request: RequestSpecific) -> Message {
    Message {
        message_id,
        contact,
        message_type: MessageType::Request(request),
    }
}

fn response(contact: Contact, message_id: MessageId, response: ResponseSpecific) -> Message {
    Message {
        message_id,
        contact,
        message_type: MessageType::Response(response),
    }
}
