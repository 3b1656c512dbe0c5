// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! OPC UA built-in type ids, status codes and small structured types.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Built-in type id (OPC UA Part 6, 5.1.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum BuiltInType {
    #[default]
    Null = 0,
    Boolean = 1,
    SByte = 2,
    Byte = 3,
    Int16 = 4,
    UInt16 = 5,
    Int32 = 6,
    UInt32 = 7,
    Int64 = 8,
    UInt64 = 9,
    Float = 10,
    Double = 11,
    String = 12,
    DateTime = 13,
    Guid = 14,
    ByteString = 15,
    XmlElement = 16,
    NodeId = 17,
    ExpandedNodeId = 18,
    StatusCode = 19,
    QualifiedName = 20,
    LocalizedText = 21,
    ExtensionObject = 22,
    DataValue = 23,
    Variant = 24,
    DiagnosticInfo = 25,
    Enumeration = 29,
}

impl BuiltInType {
    pub fn from_u8(id: u8) -> Option<Self> {
        use BuiltInType::*;
        Some(match id {
            0 => Null,
            1 => Boolean,
            2 => SByte,
            3 => Byte,
            4 => Int16,
            5 => UInt16,
            6 => Int32,
            7 => UInt32,
            8 => Int64,
            9 => UInt64,
            10 => Float,
            11 => Double,
            12 => String,
            13 => DateTime,
            14 => Guid,
            15 => ByteString,
            16 => XmlElement,
            17 => NodeId,
            18 => ExpandedNodeId,
            19 => StatusCode,
            20 => QualifiedName,
            21 => LocalizedText,
            22 => ExtensionObject,
            23 => DataValue,
            24 => Variant,
            25 => DiagnosticInfo,
            29 => Enumeration,
            _ => return None,
        })
    }

    /// Types this codec can carry inside a [`crate::types::Variant`].
    pub fn is_supported_scalar(self) -> bool {
        use BuiltInType::*;
        matches!(
            self,
            Boolean
                | SByte
                | Byte
                | Int16
                | UInt16
                | Int32
                | UInt32
                | Int64
                | UInt64
                | Float
                | Double
                | String
                | DateTime
                | Guid
                | ByteString
                | NodeId
                | StatusCode
                | Enumeration
        )
    }

    /// Enumerations travel as Int32.
    pub fn wire_type(self) -> Self {
        match self {
            BuiltInType::Enumeration => BuiltInType::Int32,
            other => other,
        }
    }
}

impl From<BuiltInType> for u8 {
    fn from(t: BuiltInType) -> u8 {
        t as u8
    }
}

impl TryFrom<u8> for BuiltInType {
    type Error = String;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        BuiltInType::from_u8(id).ok_or_else(|| format!("unknown built-in type {}", id))
    }
}

// ============================================================================
// StatusCode
// ============================================================================

/// OPC UA status code.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(pub u32);

impl StatusCode {
    pub const GOOD: StatusCode = StatusCode(0);
    pub const UNCERTAIN: StatusCode = StatusCode(0x4000_0000);
    pub const BAD: StatusCode = StatusCode(0x8000_0000);
    pub const BAD_DECODING_ERROR: StatusCode = StatusCode(0x8007_0000);
    pub const BAD_NOT_SUPPORTED: StatusCode = StatusCode(0x803D_0000);
    pub const BAD_NO_DATA: StatusCode = StatusCode(0x809B_0000);
    pub const BAD_OUT_OF_RANGE: StatusCode = StatusCode(0x803C_0000);
    pub const UNCERTAIN_LAST_USABLE_VALUE: StatusCode = StatusCode(0x4090_0000);

    const SYMBOLS: &'static [(u32, &'static str)] = &[
        (0, "Good"),
        (0x4000_0000, "Uncertain"),
        (0x8000_0000, "Bad"),
        (0x8007_0000, "BadDecodingError"),
        (0x803C_0000, "BadOutOfRange"),
        (0x803D_0000, "BadNotSupported"),
        (0x809B_0000, "BadNoData"),
        (0x4090_0000, "UncertainLastUsableValue"),
    ];

    pub const fn code(&self) -> u32 {
        self.0
    }

    pub const fn is_good(&self) -> bool {
        self.0 & 0xC000_0000 == 0
    }

    pub const fn is_uncertain(&self) -> bool {
        self.0 & 0xC000_0000 == 0x4000_0000
    }

    pub const fn is_bad(&self) -> bool {
        self.0 & 0x8000_0000 != 0
    }

    /// Symbolic name of a well-known code.
    pub fn symbol(&self) -> Option<&'static str> {
        Self::SYMBOLS
            .iter()
            .find(|(code, _)| *code == self.0)
            .map(|(_, name)| *name)
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Self::SYMBOLS
            .iter()
            .find(|(_, name)| *name == symbol)
            .map(|(code, _)| StatusCode(*code))
    }
}

impl fmt::Debug for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.symbol() {
            Some(symbol) => write!(f, "{}", symbol),
            None => write!(f, "StatusCode(0x{:08X})", self.0),
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ============================================================================
// NodeId / LocalizedText
// ============================================================================

/// Numeric node id; the only form dataset metadata needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NodeId {
    pub namespace: u16,
    pub identifier: u32,
}

impl NodeId {
    pub const fn new(namespace: u16, identifier: u32) -> Self {
        Self {
            namespace,
            identifier,
        }
    }

    /// Node id of a built-in data type (namespace 0, id = type id).
    pub const fn for_built_in(t: BuiltInType) -> Self {
        Self::new(0, t as u32)
    }

    pub const fn is_null(&self) -> bool {
        self.namespace == 0 && self.identifier == 0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace == 0 {
            write!(f, "i={}", self.identifier)
        } else {
            write!(f, "ns={};i={}", self.namespace, self.identifier)
        }
    }
}

impl FromStr for NodeId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, rest) = match s.strip_prefix("ns=") {
            Some(rest) => {
                let (ns, id) = rest
                    .split_once(';')
                    .ok_or_else(|| format!("invalid node id: {}", s))?;
                let ns = ns
                    .parse::<u16>()
                    .map_err(|_| format!("invalid namespace in node id: {}", s))?;
                (ns, id)
            }
            None => (0, s),
        };
        let id = rest
            .strip_prefix("i=")
            .ok_or_else(|| format!("only numeric node ids are supported: {}", s))?;
        let identifier = id
            .parse::<u32>()
            .map_err(|_| format!("invalid numeric identifier: {}", s))?;
        Ok(NodeId::new(namespace, identifier))
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Localized text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LocalizedText {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl LocalizedText {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            locale: None,
            text: Some(text.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.locale.is_none() && self.text.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_built_in_type_ids() {
        for id in 0..=25u8 {
            let t = BuiltInType::from_u8(id).unwrap();
            assert_eq!(u8::from(t), id);
        }
        assert_eq!(BuiltInType::from_u8(29), Some(BuiltInType::Enumeration));
        assert_eq!(BuiltInType::from_u8(26), None);
        assert_eq!(BuiltInType::Enumeration.wire_type(), BuiltInType::Int32);
    }

    #[test]
    fn test_status_code_severity() {
        assert!(StatusCode::GOOD.is_good());
        assert!(StatusCode::UNCERTAIN.is_uncertain());
        assert!(!StatusCode::UNCERTAIN.is_good());
        assert!(StatusCode::BAD_NOT_SUPPORTED.is_bad());
        assert_eq!(StatusCode::BAD_NOT_SUPPORTED.symbol(), Some("BadNotSupported"));
        assert_eq!(StatusCode(0x1234).symbol(), None);
        assert_eq!(StatusCode::from_symbol("Uncertain"), Some(StatusCode::UNCERTAIN));
    }

    #[test]
    fn test_node_id_text_form() {
        assert_eq!(NodeId::new(0, 11).to_string(), "i=11");
        assert_eq!(NodeId::new(2, 5001).to_string(), "ns=2;i=5001");
        assert_eq!("ns=2;i=5001".parse::<NodeId>().unwrap(), NodeId::new(2, 5001));
        assert_eq!("i=6".parse::<NodeId>().unwrap(), NodeId::for_built_in(BuiltInType::Int32));
        assert!("s=Demo".parse::<NodeId>().is_err());
    }

    #[test]
    fn test_built_in_type_serde_as_number() {
        let json = serde_json::to_string(&BuiltInType::Double).unwrap();
        assert_eq!(json, "11");
        let t: BuiltInType = serde_json::from_str("12").unwrap();
        assert_eq!(t, BuiltInType::String);
        assert!(serde_json::from_str::<BuiltInType>("99").is_err());
    }
}
