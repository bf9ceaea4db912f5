//! Typed RPC messages exchanged between nodes.
//!
//! Only fields and semantics are defined here, encoding to bytes belongs to
//! the wire codec.

mod factory;
mod helper;

use std::net::SocketAddr;

use bytes::Bytes;

use crate::common::{Contact, KeyId, ValueType};
use crate::db::ValueRecord;
use crate::security::{MessageId, SecurityToken};
use crate::{Error, Result};

pub use factory::{DefaultMessageFactory, MessageFactory};
pub use helper::MessageHelper;

#[derive(Debug, Clone)]
pub struct Message {
    /// Chosen by the requester, echoed verbatim by the response.
    pub message_id: MessageId,

    /// The node that sent this message.
    pub contact: Contact,

    pub message_type: MessageType,
}

#[derive(Debug, Clone)]
pub enum MessageType {
    Request(RequestSpecific),

    Response(ResponseSpecific),
}

#[derive(Debug, Clone)]
pub enum RequestSpecific {
    Ping,
    FindNode(FindNodeRequestArguments),
    FindValue(FindValueRequestArguments),
    Store(StoreRequestArguments),
    Stats(StatsRequestArguments),
}

#[derive(Debug, Clone)]
pub enum ResponseSpecific {
    Ping(PingResponseArguments),
    FindNode(FindNodeResponseArguments),
    FindValue(FindValueResponseArguments),
    Store(StoreResponseArguments),
    Stats(StatsResponseArguments),
}

// === PING ===

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingResponseArguments {
    /// The requester's address as seen by the responder.
    pub external_address: SocketAddr,
    /// The responder's estimate of the network size.
    pub estimated_size: u64,
}

// === FIND_NODE ===

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindNodeRequestArguments {
    pub target: KeyId,
}

#[derive(Debug, Clone)]
pub struct FindNodeResponseArguments {
    /// Token for the responder, to be presented in a later store request.
    ///
    /// `None` if the responder could not issue one for the requester.
    pub security_token: Option<SecurityToken>,
    /// The responder's closest known contacts to the target.
    pub contacts: Vec<Contact>,
}

// === FIND_VALUE ===

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindValueRequestArguments {
    pub target: KeyId,
    /// Only return records under these secondary keys, all of them if empty.
    pub secondary_keys: Vec<KeyId>,
    /// Only return values of this type, [ValueType::ANY] for all types.
    pub value_type: ValueType,
}

#[derive(Debug, Clone)]
pub struct FindValueResponseArguments {
    /// Request load of the bag after accounting for this request.
    pub request_load: f32,
    pub records: Vec<ValueRecord>,
    /// Matching records that did not fit in this response.
    pub secondary_keys: Vec<KeyId>,
}

// === STORE ===

#[derive(Debug, Clone)]
pub struct StoreRequestArguments {
    /// Token obtained from a find node response of the destination.
    pub security_token: SecurityToken,
    pub records: Vec<ValueRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreResponseArguments {
    pub statuses: Vec<StoreStatusEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStatusEntry {
    pub primary_key: KeyId,
    pub secondary_key: KeyId,
    pub status: StoreStatus,
}

// === STATS ===

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsRequestArguments {
    pub stats_type: StatsType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsResponseArguments {
    pub payload: Bytes,
}

// === Codes ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Wire code of every message kind.
pub enum OpCode {
    PingRequest,
    PingResponse,
    StoreRequest,
    StoreResponse,
    FindNodeRequest,
    FindNodeResponse,
    FindValueRequest,
    FindValueResponse,
    StatsRequest,
    StatsResponse,
}

impl OpCode {
    pub fn code(&self) -> u8 {
        match self {
            OpCode::PingRequest => 0x01,
            OpCode::PingResponse => 0x02,
            OpCode::StoreRequest => 0x03,
            OpCode::StoreResponse => 0x04,
            OpCode::FindNodeRequest => 0x05,
            OpCode::FindNodeResponse => 0x06,
            OpCode::FindValueRequest => 0x07,
            OpCode::FindValueResponse => 0x08,
            OpCode::StatsRequest => 0x09,
            OpCode::StatsResponse => 0x0A,
        }
    }

    pub fn from_code(code: u8) -> Result<OpCode> {
        Ok(match code {
            0x01 => OpCode::PingRequest,
            0x02 => OpCode::PingResponse,
            0x03 => OpCode::StoreRequest,
            0x04 => OpCode::StoreResponse,
            0x05 => OpCode::FindNodeRequest,
            0x06 => OpCode::FindNodeResponse,
            0x07 => OpCode::FindValueRequest,
            0x08 => OpCode::FindValueResponse,
            0x09 => OpCode::StatsRequest,
            0x0A => OpCode::StatsResponse,
            _ => return Err(Error::UnknownMessageType(code)),
        })
    }

    pub fn is_request(&self) -> bool {
        self.code() % 2 == 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Outcome of storing one record.
pub enum StoreStatus {
    Succeeded,
    Failed,
}

impl StoreStatus {
    pub fn code(&self) -> u8 {
        match self {
            StoreStatus::Succeeded => 0x01,
            StoreStatus::Failed => 0x02,
        }
    }

    pub fn from_code(code: u8) -> Result<StoreStatus> {
        match code {
            0x01 => Ok(StoreStatus::Succeeded),
            0x02 => Ok(StoreStatus::Failed),
            _ => Err(Error::UnknownMessageType(code)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// What a stats request asks for.
pub enum StatsType {
    /// Database counters, as a bencoded [StatisticsSnapshot](crate::db::StatisticsSnapshot).
    Statistics,
    /// One line per stored record.
    Database,
    /// One line per known contact.
    RouteTable,
}

impl StatsType {
    pub fn code(&self) -> u8 {
        match self {
            StatsType::Statistics => 0x01,
            StatsType::Database => 0x02,
            StatsType::RouteTable => 0x03,
        }
    }

    pub fn from_code(code: u8) -> Result<StatsType> {
        match code {
            0x01 => Ok(StatsType::Statistics),
            0x02 => Ok(StatsType::Database),
            0x03 => Ok(StatsType::RouteTable),
            _ => Err(Error::UnknownMessageType(code)),
        }
    }
}

impl Message {
    pub fn op_code(&self) -> OpCode {
        match &self.message_type {
            MessageType::Request(request) => match request {
                RequestSpecific::Ping => OpCode::PingRequest,
                RequestSpecific::FindNode(_) => OpCode::FindNodeRequest,
                RequestSpecific::FindValue(_) => OpCode::FindValueRequest,
                RequestSpecific::Store(_) => OpCode::StoreRequest,
                RequestSpecific::Stats(_) => OpCode::StatsRequest,
            },
            MessageType::Response(response) => match response {
                ResponseSpecific::Ping(_) => OpCode::PingResponse,
                ResponseSpecific::FindNode(_) => OpCode::FindNodeResponse,
                ResponseSpecific::FindValue(_) => OpCode::FindValueResponse,
                ResponseSpecific::Store(_) => OpCode::StoreResponse,
                ResponseSpecific::Stats(_) => OpCode::StatsResponse,
            },
        }
    }

    pub fn is_request(&self) -> bool {
        matches!(self.message_type, MessageType::Request(_))
    }

    pub fn request(&self) -> Option<&RequestSpecific> {
        match &self.message_type {
            MessageType::Request(request) => Some(request),
            MessageType::Response(_) => None,
        }
    }

    pub fn response(&self) -> Option<&ResponseSpecific> {
        match &self.message_type {
            MessageType::Response(response) => Some(response),
            MessageType::Request(_) => None,
        }
    }

    /// The security token carried by a find node response, if any.
    pub fn security_token(&self) -> Option<&SecurityToken> {
        match &self.message_type {
            MessageType::Response(ResponseSpecific::FindNode(arguments)) => {
                arguments.security_token.as_ref()
            }
            MessageType::Request(RequestSpecific::Store(arguments)) => {
                Some(&arguments.security_token)
            }
            _ => None,
        }
    }
}
