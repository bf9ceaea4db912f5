//! Identity and address of a DHT participant.
use std::{
    fmt::{self, Debug, Display, Formatter},
    net::SocketAddr,
};

use serde::{Deserialize, Serialize};

use crate::common::{KeyId, KeyKind};
use crate::Result;

/// A four character vendor code, e.g. `LIME`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vendor(u32);

impl Vendor {
    pub const UNKNOWN: Vendor = Vendor(0);

    pub const fn new(code: u32) -> Vendor {
        Vendor(code)
    }

    pub const fn from_fourcc(code: [u8; 4]) -> Vendor {
        Vendor(u32::from_be_bytes(code))
    }

    pub fn code(&self) -> u32 {
        self.0
    }
}

impl Display for Vendor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write_fourcc(f, self.0)
    }
}

impl Debug for Vendor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Vendor({})", self)
    }
}

/// A `major.minor` version packed into 16 bits.
///
/// Used both for protocol versions of a [Contact] and for the version of
/// a stored [Value](crate::common::Value).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(u16);

impl Version {
    pub const ZERO: Version = Version(0);

    pub const fn new(major: u8, minor: u8) -> Version {
        Version(((major as u16) << 8) | minor as u16)
    }

    pub const fn from_u16(version: u16) -> Version {
        Version(version)
    }

    pub fn major(&self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub fn minor(&self) -> u8 {
        self.0 as u8
    }

    pub fn to_u16(&self) -> u16 {
        self.0
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major(), self.minor())
    }
}

impl Debug for Version {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Version({})", self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// A node as known to the routing layer.
pub struct Contact {
    node_id: KeyId,
    address: SocketAddr,
    vendor: Vendor,
    version: Version,
    firewalled: bool,
}

impl Contact {
    /// Creates a new Contact, `node_id` must be a [KeyKind::Node] id.
    pub fn new(
        node_id: KeyId,
        address: SocketAddr,
        vendor: Vendor,
        version: Version,
    ) -> Result<Contact> {
        node_id.assert_kind(KeyKind::Node)?;

        Ok(Contact {
            node_id,
            address,
            vendor,
            version,
            firewalled: false,
        })
    }

    pub fn with_firewalled(mut self, firewalled: bool) -> Self {
        self.firewalled = firewalled;
        self
    }

    // === Getters ===

    pub fn node_id(&self) -> &KeyId {
        &self.node_id
    }

    /// The address this node claims to be reachable at.
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn vendor(&self) -> Vendor {
        self.vendor
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn is_firewalled(&self) -> bool {
        self.firewalled
    }
}

impl Display for Contact {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, {} {})",
            self.node_id, self.address, self.vendor, self.version
        )
    }
}

pub(crate) fn write_fourcc(f: &mut Formatter<'_>, code: u32) -> fmt::Result {
    for byte in code.to_be_bytes() {
        if byte.is_ascii_graphic() || byte == b' ' {
            write!(f, "{}", byte as char)?;
        } else {
            write!(f, "\\x{:02x}", byte)?;
        }
    }

    Ok(())
}
