//! Kademlia identifiers: node ids, content keys, and message ids.
use rand::Rng;
use sha1_smol::Sha1;
use std::{
    cmp::Ordering,
    fmt::{self, Debug, Display, Formatter},
    hash::{Hash, Hasher},
};

use crate::{Error, Result};

/// The size of a [KeyId] in bytes.
pub const ID_SIZE: usize = 20;
/// The size of a [KeyId] in bits.
pub const ID_BITS: usize = ID_SIZE * 8;

/// The role a [KeyId] was created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    /// Identifies a node in the keyspace.
    Node,
    /// Identifies stored content (a primary key).
    Value,
    /// Identifies a lookup or request.
    Message,
}

#[derive(Clone, Copy)]
/// A 160-bit element of the DHT keyspace.
///
/// The [KeyKind] is a tag recorded at construction. It takes no part in
/// equality, ordering, or hashing; use [KeyId::assert_kind] to reject an id
/// used in the wrong role.
pub struct KeyId {
    bytes: [u8; ID_SIZE],
    kind: KeyKind,
}

impl KeyId {
    pub fn new(kind: KeyKind, bytes: [u8; ID_SIZE]) -> KeyId {
        KeyId { bytes, kind }
    }

    pub fn node(bytes: [u8; ID_SIZE]) -> KeyId {
        KeyId::new(KeyKind::Node, bytes)
    }

    pub fn value(bytes: [u8; ID_SIZE]) -> KeyId {
        KeyId::new(KeyKind::Value, bytes)
    }

    pub fn random(kind: KeyKind) -> KeyId {
        let mut rng = rand::thread_rng();
        let random_bytes: [u8; ID_SIZE] = rng.gen();

        KeyId::new(kind, random_bytes)
    }

    /// Create a new KeyId from some bytes. Returns Err if `bytes` is not of length
    /// [ID_SIZE].
    pub fn from_bytes<T: AsRef<[u8]>>(kind: KeyKind, bytes: T) -> Result<KeyId> {
        let bytes = bytes.as_ref();
        if bytes.len() != ID_SIZE {
            return Err(Error::InvalidIdSize {
                expected: ID_SIZE,
                actual: bytes.len(),
            });
        }

        let mut tmp: [u8; ID_SIZE] = [0; ID_SIZE];
        tmp.copy_from_slice(bytes);

        Ok(KeyId::new(kind, tmp))
    }

    /// Content key of a payload: the SHA-1 hash of its bytes.
    pub fn from_content(content: &[u8]) -> KeyId {
        let mut hasher = Sha1::new();
        hasher.update(content);

        KeyId::value(hasher.digest().bytes())
    }

    pub fn kind(&self) -> KeyKind {
        self.kind
    }

    pub fn as_bytes(&self) -> &[u8; ID_SIZE] {
        &self.bytes
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.bytes.to_vec()
    }

    /// Returns an error if this id was not created as `expected`.
    pub fn assert_kind(&self, expected: KeyKind) -> Result<()> {
        if self.kind != expected {
            return Err(Error::InvalidKeyKind {
                expected,
                actual: self.kind,
            });
        }

        Ok(())
    }

    /// XOR distance between this id and `other`.
    ///
    /// The result carries the kind of `self`. Distances compare as unsigned
    /// big-endian integers through [Ord].
    pub fn distance(&self, other: &KeyId) -> KeyId {
        let mut bytes = [0_u8; ID_SIZE];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = self.bytes[i] ^ other.bytes[i];
        }

        KeyId::new(self.kind, bytes)
    }

    /// Number of leading bits shared with `other`, 160 for equal ids.
    pub fn common_prefix_len(&self, other: &KeyId) -> usize {
        for i in 0..ID_SIZE {
            let xor = self.bytes[i] ^ other.bytes[i];

            if xor != 0 {
                return i * 8 + xor.leading_zeros() as usize;
            }
        }

        ID_BITS
    }

    /// Returns `true` if `a` is strictly closer to this id than `b`.
    pub fn is_closer(&self, a: &KeyId, b: &KeyId) -> bool {
        self.distance(a) < self.distance(b)
    }
}

impl PartialEq for KeyId {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for KeyId {}

impl Hash for KeyId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bytes.hash(state)
    }
}

impl PartialOrd for KeyId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KeyId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bytes.cmp(&other.bytes)
    }
}

impl Display for KeyId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for byte in self.bytes {
            write!(f, "{:02x}", byte)?;
        }

        Ok(())
    }
}

impl Debug for KeyId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "KeyId({:?}, {})", self.kind, self)
    }
}
