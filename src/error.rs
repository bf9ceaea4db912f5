//! Main Crate Error

use std::net::SocketAddr;

use crate::common::KeyKind;

#[derive(thiserror::Error, Debug)]
/// Mojito core error enum.
pub enum Error {
    /// A [KeyId](crate::common::KeyId) was used in a role it was not created for.
    #[error("Expected a {expected:?} KeyId, got a {actual:?} KeyId")]
    InvalidKeyKind { expected: KeyKind, actual: KeyKind },

    /// Indicates that the id is not of the expected size.
    #[error("Invalid Id size, expected {expected} bytes, got {actual}")]
    InvalidIdSize { expected: usize, actual: usize },

    /// A caller violated an invariant of the store.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Every rotation of the cipher block collided with a reserved byte.
    #[error("Could not derive a framing safe SecurityToken for {address}")]
    TokenUnobtainable { address: SocketAddr },

    /// Tokens must be between 4 and 16 bytes long.
    #[error("Invalid SecurityToken length: {0}")]
    InvalidTokenLength(usize),

    /// A response could not be bound to a request sent to its source.
    #[error("SecurityToken does not match {address}")]
    SecurityTokenMismatch { address: SocketAddr },

    #[error("Unknown value type: {0:#010x}")]
    UnknownValueType(u32),

    #[error("Unknown message type: {0:#04x}")]
    UnknownMessageType(u8),

    /// [DatabaseSweeper::close](crate::db::DatabaseSweeper::close) was already called.
    #[error("DatabaseSweeper is closed")]
    SweeperClosed,

    #[error("Failed to encode payload: {0}")]
    Encoding(#[from] serde_bencode::Error),

    #[error(transparent)]
    /// Transparent [std::io::Error]
    IO(#[from] std::io::Error),
}

/// Alias for `Result<T, Error>`.
pub type Result<T, E = Error> = std::result::Result<T, E>;
