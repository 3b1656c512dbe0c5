// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::{BuiltInType, NodeId, StatusCode};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A typed scalar or one-dimensional array value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Variant {
    #[default]
    Null,
    Boolean(bool),
    SByte(i8),
    Byte(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
    String(String),
    DateTime(DateTime<Utc>),
    Guid(Uuid),
    ByteString(Vec<u8>),
    NodeId(NodeId),
    StatusCode(StatusCode),
    /// Element type plus elements; elements are scalars of that type.
    Array(BuiltInType, Vec<Variant>),
}

impl Variant {
    /// Built-in type of the value (element type for arrays).
    pub fn built_in_type(&self) -> BuiltInType {
        match self {
            Variant::Null => BuiltInType::Null,
            Variant::Boolean(_) => BuiltInType::Boolean,
            Variant::SByte(_) => BuiltInType::SByte,
            Variant::Byte(_) => BuiltInType::Byte,
            Variant::Int16(_) => BuiltInType::Int16,
            Variant::UInt16(_) => BuiltInType::UInt16,
            Variant::Int32(_) => BuiltInType::Int32,
            Variant::UInt32(_) => BuiltInType::UInt32,
            Variant::Int64(_) => BuiltInType::Int64,
            Variant::UInt64(_) => BuiltInType::UInt64,
            Variant::Float(_) => BuiltInType::Float,
            Variant::Double(_) => BuiltInType::Double,
            Variant::String(_) => BuiltInType::String,
            Variant::DateTime(_) => BuiltInType::DateTime,
            Variant::Guid(_) => BuiltInType::Guid,
            Variant::ByteString(_) => BuiltInType::ByteString,
            Variant::NodeId(_) => BuiltInType::NodeId,
            Variant::StatusCode(_) => BuiltInType::StatusCode,
            Variant::Array(t, _) => *t,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Variant::Null)
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Variant::Array(..))
    }

    /// Zero value of a scalar type, `Null` for unsupported types.
    pub fn default_for(t: BuiltInType) -> Variant {
        match t.wire_type() {
            BuiltInType::Boolean => Variant::Boolean(false),
            BuiltInType::SByte => Variant::SByte(0),
            BuiltInType::Byte => Variant::Byte(0),
            BuiltInType::Int16 => Variant::Int16(0),
            BuiltInType::UInt16 => Variant::UInt16(0),
            BuiltInType::Int32 => Variant::Int32(0),
            BuiltInType::UInt32 => Variant::UInt32(0),
            BuiltInType::Int64 => Variant::Int64(0),
            BuiltInType::UInt64 => Variant::UInt64(0),
            BuiltInType::Float => Variant::Float(0.0),
            BuiltInType::Double => Variant::Double(0.0),
            BuiltInType::String => Variant::String(String::new()),
            BuiltInType::DateTime => Variant::DateTime(DateTime::<Utc>::default()),
            BuiltInType::Guid => Variant::Guid(Uuid::nil()),
            BuiltInType::ByteString => Variant::ByteString(Vec::new()),
            BuiltInType::NodeId => Variant::NodeId(NodeId::default()),
            BuiltInType::StatusCode => Variant::StatusCode(StatusCode::GOOD),
            _ => Variant::Null,
        }
    }

    /// Integer view used by the JSON and Avro value mappers.
    pub fn as_i64(&self) -> Option<i64> {
        Some(match self {
            Variant::SByte(v) => *v as i64,
            Variant::Byte(v) => *v as i64,
            Variant::Int16(v) => *v as i64,
            Variant::UInt16(v) => *v as i64,
            Variant::Int32(v) => *v as i64,
            Variant::UInt32(v) => *v as i64,
            Variant::Int64(v) => *v,
            Variant::StatusCode(v) => v.0 as i64,
            _ => return None,
        })
    }
}

macro_rules! impl_variant_from {
    ($($type:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$type> for Variant {
                fn from(v: $type) -> Self {
                    Variant::$variant(v)
                }
            }
        )*
    };
}

impl_variant_from!(
    bool => Boolean,
    i8 => SByte,
    u8 => Byte,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f32 => Float,
    f64 => Double,
    String => String,
    DateTime<Utc> => DateTime,
    Uuid => Guid,
    Vec<u8> => ByteString,
    NodeId => NodeId,
    StatusCode => StatusCode,
);

impl From<&str> for Variant {
    fn from(v: &str) -> Self {
        Variant::String(v.to_string())
    }
}
