//! Message ids that carry an obfuscated security token for their destination.
//!
//! A response is accepted only if the token recovered from its message id is
//! valid for the address the response came from, which binds responses to the
//! destination of the original request without keeping a table of requests.

use rand::{rngs::OsRng, Rng, RngCore};
use std::{
    fmt::{self, Debug, Display, Formatter},
    net::SocketAddr,
    sync::Arc,
};

use tracing::debug;

use super::{SecurityTokenProvider, MIN_TOKEN_LENGTH};
use crate::{Error, Result};

/// The size of a [MessageId] in bytes.
pub const MESSAGE_ID_SIZE: usize = 16;

const TAG_SIZE: usize = MIN_TOKEN_LENGTH;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// A 16 byte request identifier, echoed verbatim by responses.
pub struct MessageId([u8; MESSAGE_ID_SIZE]);

impl MessageId {
    /// A fully random id, not bound to any destination.
    pub fn random() -> MessageId {
        let mut rng = rand::thread_rng();
        MessageId(rng.gen())
    }

    pub fn new(bytes: [u8; MESSAGE_ID_SIZE]) -> MessageId {
        MessageId(bytes)
    }

    /// Create a new MessageId from some bytes. Returns Err if `bytes` is not of length
    /// [MESSAGE_ID_SIZE].
    pub fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<MessageId> {
        let bytes = bytes.as_ref();
        if bytes.len() != MESSAGE_ID_SIZE {
            return Err(Error::InvalidIdSize {
                expected: MESSAGE_ID_SIZE,
                actual: bytes.len(),
            });
        }

        let mut tmp = [0_u8; MESSAGE_ID_SIZE];
        tmp.copy_from_slice(bytes);

        Ok(MessageId(tmp))
    }

    pub fn as_bytes(&self) -> &[u8; MESSAGE_ID_SIZE] {
        &self.0
    }
}

impl Display for MessageId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }

        Ok(())
    }
}

impl Debug for MessageId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "MessageId({})", self)
    }
}

/// Returns `true` if a security token can be bound to this address.
pub fn is_routable(address: &SocketAddr) -> bool {
    address.port() != 0 && !address.ip().is_unspecified()
}

/// Creates and verifies [MessageId]s.
///
/// Holds a process wide pad, generated once, that hides the embedded token.
#[derive(Clone)]
pub struct MessageIdFactory {
    tokens: Arc<SecurityTokenProvider>,
    pad: [u8; TAG_SIZE],
}

impl Debug for MessageIdFactory {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "MessageIdFactory (_)")
    }
}

impl MessageIdFactory {
    pub fn new(tokens: Arc<SecurityTokenProvider>) -> Self {
        let mut pad = [0_u8; TAG_SIZE];
        OsRng.fill_bytes(&mut pad);

        Self::with_pad(tokens, pad)
    }

    pub fn with_pad(tokens: Arc<SecurityTokenProvider>, pad: [u8; TAG_SIZE]) -> Self {
        Self { tokens, pad }
    }

    pub fn tokens(&self) -> &SecurityTokenProvider {
        &self.tokens
    }

    // === Public Methods ===

    /// Create the id of a request sent to `destination`.
    ///
    /// For routable destinations the first 4 bytes are the destination's
    /// token XORed with the pad; otherwise the id is fully random.
    pub fn create(&self, destination: SocketAddr) -> MessageId {
        let mut id = MessageId::random();

        if !is_routable(&destination) {
            return id;
        }

        match self.tokens.token_for(destination) {
            Ok(token) => {
                let tag = &token.as_bytes()[..TAG_SIZE];

                for (i, byte) in id.0[..TAG_SIZE].iter_mut().enumerate() {
                    *byte = tag[i] ^ self.pad[i];
                }
            }
            Err(error) => {
                debug!(?destination, ?error, "Sending an untagged MessageId");
            }
        }

        id
    }

    /// Check that `id` was created by [Self::create] for `source`.
    pub fn verify_security_token(&self, id: &MessageId, source: SocketAddr) -> Result<()> {
        let mut candidate = [0_u8; TAG_SIZE];

        for (i, byte) in candidate.iter_mut().enumerate() {
            *byte = id.0[i] ^ self.pad[i];
        }

        if self.tokens.is_for(&candidate, source) {
            Ok(())
        } else {
            Err(Error::SecurityTokenMismatch { address: source })
        }
    }
}
