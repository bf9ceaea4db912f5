//! The stored unit: a typed, versioned byte payload.
use std::{
    collections::HashMap,
    fmt::{self, Debug, Display, Formatter},
};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::common::{contact::write_fourcc, Version};
use crate::{Error, Result};

/// Four character type tag of a [Value].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValueType(u32);

impl ValueType {
    pub const BINARY: ValueType = ValueType::from_fourcc(*b"BINA");
    pub const TEXT: ValueType = ValueType::from_fourcc(*b"TEXT");
    pub const TEST: ValueType = ValueType::from_fourcc(*b"TEST");
    /// Wildcard used by lookups that accept every type.
    pub const ANY: ValueType = ValueType::from_fourcc(*b"****");

    pub const fn from_fourcc(code: [u8; 4]) -> ValueType {
        ValueType(u32::from_be_bytes(code))
    }

    pub fn code(&self) -> u32 {
        self.0
    }
}

impl Display for ValueType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write_fourcc(f, self.0)
    }
}

impl Debug for ValueType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "ValueType({})", self)
    }
}

/// Known value types, keyed by their wire code.
///
/// Build one at startup and share it; incoming codes that were never
/// registered are rejected.
#[derive(Debug, Clone)]
pub struct ValueTypeRegistry {
    types: HashMap<u32, String>,
}

impl ValueTypeRegistry {
    /// A registry with no types at all.
    pub fn empty() -> Self {
        Self {
            types: HashMap::new(),
        }
    }

    /// Register a type under a human readable name, returns `false` if it
    /// was already known.
    ///
    /// [ValueType::ANY] only exists in lookups and is never registered.
    pub fn register(&mut self, value_type: ValueType, name: &str) -> bool {
        if value_type == ValueType::ANY {
            return false;
        }

        self.types
            .insert(value_type.code(), name.to_string())
            .is_none()
    }

    pub fn unregister(&mut self, value_type: ValueType) -> bool {
        self.types.remove(&value_type.code()).is_some()
    }

    /// Map an incoming code to a registered [ValueType].
    pub fn resolve(&self, code: u32) -> Result<ValueType> {
        if self.types.contains_key(&code) {
            Ok(ValueType(code))
        } else {
            Err(Error::UnknownValueType(code))
        }
    }

    pub fn contains(&self, value_type: ValueType) -> bool {
        self.types.contains_key(&value_type.code())
    }

    pub fn name(&self, value_type: ValueType) -> Option<&str> {
        self.types.get(&value_type.code()).map(|s| s.as_str())
    }
}

impl Default for ValueTypeRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();

        registry.register(ValueType::BINARY, "binary");
        registry.register(ValueType::TEXT, "text");
        registry.register(ValueType::TEST, "test");

        registry
    }
}

#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// An immutable `(type, version, bytes)` payload.
///
/// A value without bytes is the removal marker.
pub struct Value {
    value_type: ValueType,
    version: Version,
    data: Bytes,
}

impl Value {
    pub fn new<T: Into<Bytes>>(value_type: ValueType, version: Version, data: T) -> Self {
        Self {
            value_type,
            version,
            data: data.into(),
        }
    }

    /// The removal marker for `value_type`.
    pub fn empty(value_type: ValueType, version: Version) -> Self {
        Self::new(value_type, version, Bytes::new())
    }

    // === Getters ===

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if this is a removal marker.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Value")
            .field("type", &self.value_type)
            .field("version", &self.version)
            .field("len", &self.data.len())
            .finish()
    }
}
