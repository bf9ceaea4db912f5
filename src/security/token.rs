//! Stateless security tokens for remote addresses.
//!
//! A token proves that its holder recently heard from us at a given address.
//! It is recomputed from immutable secret material on every check, so no
//! per-address state is kept.

use aes::{
    cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit},
    Aes128,
};
use rand::{rngs::OsRng, RngCore};
use std::{
    fmt::{self, Debug, Formatter},
    net::{IpAddr, SocketAddr},
};

use tracing::trace;

use crate::{Error, Result};

const KEY_SIZE: usize = 16;
const PAD_SIZE: usize = 4;
const BLOCK_SIZE: usize = 16;

/// Shortest token accepted on the wire.
pub const MIN_TOKEN_LENGTH: usize = 4;
/// Longest token accepted on the wire.
pub const MAX_TOKEN_LENGTH: usize = 16;
/// Number of leading token bytes that are derived from the cipher.
pub const SIGNIFICANT_TOKEN_LENGTH: usize = 8;
pub const DEFAULT_TOKEN_LENGTH: usize = 8;

/// Bytes that a token must not contain because the envelope it travels in
/// uses them as delimiters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramingSafeByteFilter {
    reserved: Vec<u8>,
}

impl FramingSafeByteFilter {
    /// The legacy binary envelope reserves NUL and the file separator (0x1C).
    pub fn legacy() -> Self {
        Self::new(&[0x00, 0x1c])
    }

    /// Accept every byte.
    pub fn none() -> Self {
        Self::new(&[])
    }

    pub fn new(reserved: &[u8]) -> Self {
        Self {
            reserved: reserved.to_vec(),
        }
    }

    pub fn reserved(&self) -> &[u8] {
        &self.reserved
    }

    pub fn is_safe(&self, bytes: &[u8]) -> bool {
        !bytes.iter().any(|b| self.reserved.contains(b))
    }

    /// Deterministically map a byte to the next safe one.
    pub fn sanitize(&self, byte: u8) -> u8 {
        let mut candidate = byte;

        for _ in 0..=u8::MAX {
            if !self.reserved.contains(&candidate) {
                return candidate;
            }
            candidate = candidate.wrapping_add(1);
        }

        byte
    }
}

impl Default for FramingSafeByteFilter {
    fn default() -> Self {
        Self::legacy()
    }
}

/// An opaque, address bound capability token.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SecurityToken(Box<[u8]>);

impl SecurityToken {
    /// Wrap bytes received from the network, checking only the length.
    pub fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<SecurityToken> {
        let bytes = bytes.as_ref();

        if !(MIN_TOKEN_LENGTH..=MAX_TOKEN_LENGTH).contains(&bytes.len()) {
            return Err(Error::InvalidTokenLength(bytes.len()));
        }

        Ok(SecurityToken(bytes.into()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for SecurityToken {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Debug for SecurityToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "SecurityToken({:02x?})", &self.0)
    }
}

/// Security tokens generator.
///
/// The secret key and pad are generated once and never change, which makes
/// [SecurityTokenProvider::token_for] deterministic for a given address.
#[derive(Clone)]
pub struct SecurityTokenProvider {
    cipher: Aes128,
    pad: [u8; PAD_SIZE],
    token_length: usize,
    filter: FramingSafeByteFilter,
}

impl Debug for SecurityTokenProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SecurityTokenProvider (_, token_length: {})",
            self.token_length
        )
    }
}

impl SecurityTokenProvider {
    /// Create a provider with fresh secrets from the operating system's CSPRNG.
    pub fn new() -> Self {
        let mut key = [0_u8; KEY_SIZE];
        let mut pad = [0_u8; PAD_SIZE];

        OsRng.fill_bytes(&mut key);
        OsRng.fill_bytes(&mut pad);

        Self::with_secrets(key, pad)
    }

    /// Create a provider from known secrets.
    pub fn with_secrets(key: [u8; KEY_SIZE], pad: [u8; PAD_SIZE]) -> Self {
        Self {
            cipher: Aes128::new(GenericArray::from_slice(&key)),
            pad,
            token_length: DEFAULT_TOKEN_LENGTH,
            filter: FramingSafeByteFilter::default(),
        }
    }

    /// Set the length of generated tokens, between 4 and 16 bytes.
    pub fn with_token_length(mut self, token_length: usize) -> Result<Self> {
        if !(MIN_TOKEN_LENGTH..=MAX_TOKEN_LENGTH).contains(&token_length) {
            return Err(Error::InvalidTokenLength(token_length));
        }

        self.token_length = token_length;
        Ok(self)
    }

    pub fn with_filter(mut self, filter: FramingSafeByteFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn token_length(&self) -> usize {
        self.token_length
    }

    // === Public Methods ===

    /// Generates the token for a remote address.
    pub fn token_for(&self, address: SocketAddr) -> Result<SecurityToken> {
        let (block, rotation) = self.significant(address)?;

        let token: Box<[u8]> = (0..self.token_length)
            .map(|i| {
                let byte = block[(rotation + i) % BLOCK_SIZE];

                if i < SIGNIFICANT_TOKEN_LENGTH {
                    byte
                } else {
                    self.filter.sanitize(byte)
                }
            })
            .collect();

        Ok(SecurityToken(token))
    }

    /// Returns `true` if `token` was generated for `address` by this provider.
    ///
    /// Only the significant prefix is compared, so truncated copies of at
    /// least 4 bytes verify as well.
    pub fn is_for(&self, token: &[u8], address: SocketAddr) -> bool {
        if !(MIN_TOKEN_LENGTH..=MAX_TOKEN_LENGTH).contains(&token.len()) {
            return false;
        }

        let (block, rotation) = match self.significant(address) {
            Ok(significant) => significant,
            Err(_) => return false,
        };

        let compared = token.len().min(SIGNIFICANT_TOKEN_LENGTH);

        token[..compared]
            .iter()
            .enumerate()
            .all(|(i, byte)| *byte == block[(rotation + i) % BLOCK_SIZE])
    }

    // === Private Methods ===

    /// Encrypts the address and finds the first rotation of the cipher block
    /// whose significant window passes the filter.
    fn significant(&self, address: SocketAddr) -> Result<([u8; BLOCK_SIZE], usize)> {
        let block = self.encrypt(address);

        let mut window = [0_u8; SIGNIFICANT_TOKEN_LENGTH];

        for rotation in 0..BLOCK_SIZE {
            for (i, byte) in window.iter_mut().enumerate() {
                *byte = block[(rotation + i) % BLOCK_SIZE];
            }

            if self.filter.is_safe(&window) {
                return Ok((block, rotation));
            }

            trace!(?address, rotation, "Token window holds a reserved byte");
        }

        Err(Error::TokenUnobtainable { address })
    }

    fn encrypt(&self, address: SocketAddr) -> [u8; BLOCK_SIZE] {
        let mut plain = match address.ip() {
            IpAddr::V4(ip) => ip.to_ipv6_mapped().octets(),
            IpAddr::V6(ip) => ip.octets(),
        };

        for (byte, pad) in plain.iter_mut().zip(self.pad.iter()) {
            *byte ^= pad;
        }

        let port = address.port().to_be_bytes();
        plain[PAD_SIZE] ^= port[0];
        plain[PAD_SIZE + 1] ^= port[1];

        let mut block = GenericArray::clone_from_slice(&plain);
        self.cipher.encrypt_block(&mut block);

        let mut encrypted = [0_u8; BLOCK_SIZE];
        encrypted.copy_from_slice(block.as_slice());

        encrypted
    }
}

impl Default for SecurityTokenProvider {
    fn default() -> Self {
        Self::new()
    }
}
