//! Native document identifier
//!
//! A 12-byte identifier rendered on the wire in Extended JSON form
//! (`{ "$oid": "<24 lowercase hex chars>" }`).

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};

use crate::error::QueryError;

/// Wire key of an identifier literal
pub const OID_KEY: &str = "$oid";

/// 12-byte native identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    /// Create an identifier from raw bytes
    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    /// True if `s` is exactly 24 hexadecimal characters (either case)
    pub fn is_valid(s: &str) -> bool {
        s.len() == 24 && s.bytes().all(|b| b.is_ascii_hexdigit())
    }

    /// Parse a 24-character hexadecimal string
    pub fn parse_str(s: &str) -> Option<Self> {
        if !Self::is_valid(s) {
            return None;
        }

        let mut bytes = [0u8; 12];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).ok()?;
        }
        Some(Self(bytes))
    }

    /// Raw bytes
    pub fn bytes(&self) -> [u8; 12] {
        self.0
    }

    /// Lowercase hexadecimal form
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Extended JSON wire form
    pub fn to_wire(&self) -> Value {
        let mut map = Map::new();
        map.insert(OID_KEY.to_string(), Value::String(self.to_hex()));
        Value::Object(map)
    }

    /// Read an identifier from its wire form
    pub fn from_wire(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        if map.len() != 1 {
            return None;
        }
        map.get(OID_KEY)?.as_str().and_then(Self::parse_str)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_str(s)
            .ok_or_else(|| QueryError::malformed(format!("'{}' is not a valid object id", s)))
    }
}
