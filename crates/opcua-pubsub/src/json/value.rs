// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! JSON mapping of variants and data values (OPC UA Part 6, 5.4).
//!
//! Two forms exist for a variant:
//!
//! - reversible: `{"Type": <built-in type id>, "Body": <value>}`
//! - non-reversible: the bare value; the type is inferred on decode
//!
//! Int64 and UInt64 travel as strings in both forms, ByteString as base64.

use crate::config::{field, CodecContext};
use crate::error::{DecodeError, DecodeResult, EncodeError, EncodeResult};
use crate::flags::DataSetFieldContentFlags;
use crate::types::{BuiltInType, DataValue, NodeId, StatusCode, Variant};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Number, Value};
use uuid::Uuid;

/// Value writer options.
#[derive(Debug, Clone, Copy)]
pub struct ValueOptions<'a> {
    pub ctx: &'a CodecContext,
    /// Status codes as bare numbers and variants as `{Type, Body}`.
    pub reversible: bool,
    /// Node ids with namespace URIs (`nsu=`) instead of indices.
    pub advanced: bool,
}

// ============================================================================
// Lookup helpers
// ============================================================================

/// Field lookup: exact match first, then ASCII case-insensitive.
pub fn get_ci<'a>(map: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    map.get(name).or_else(|| {
        map.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    })
}

fn invalid(what: &str, value: &Value) -> DecodeError {
    DecodeError::InvalidValue(format!("{}: unexpected JSON {}", what, value))
}

pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

pub fn parse_datetime(value: &Value) -> DecodeResult<DateTime<Utc>> {
    let s = value.as_str().ok_or_else(|| invalid("date time", value))?;
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DecodeError::InvalidValue(format!("date time {:?}: {}", s, e)))
}

pub fn parse_guid(value: &Value) -> DecodeResult<Uuid> {
    let s = value.as_str().ok_or_else(|| invalid("guid", value))?;
    Uuid::parse_str(s).map_err(|e| DecodeError::InvalidValue(format!("guid {:?}: {}", s, e)))
}

/// `nsu=<uri>;i=<id>` when `advanced` and the namespace is known.
pub fn format_node_id(id: &NodeId, advanced: bool, ctx: &CodecContext) -> String {
    match ctx.namespace_uri(id.namespace) {
        Some(uri) if advanced && id.namespace != 0 => format!("nsu={};i={}", uri, id.identifier),
        _ => id.to_string(),
    }
}

/// Accepts `i=`, `ns=` and `nsu=` forms; `nsu=` URIs must be in the table.
pub fn parse_node_id(s: &str, ctx: &CodecContext) -> DecodeResult<NodeId> {
    if let Some(rest) = s.strip_prefix("nsu=") {
        let (uri, id) = rest
            .rsplit_once(';')
            .ok_or_else(|| DecodeError::InvalidValue(format!("node id {:?}", s)))?;
        let namespace = ctx
            .namespace_uris
            .iter()
            .position(|u| u == uri)
            .and_then(|pos| u16::try_from(pos).ok())
            .ok_or_else(|| DecodeError::InvalidValue(format!("unknown namespace {:?}", uri)))?;
        let local: NodeId = id.parse().map_err(DecodeError::InvalidValue)?;
        return Ok(NodeId::new(namespace, local.identifier));
    }
    s.parse().map_err(DecodeError::InvalidValue)
}

// ============================================================================
// Encode
// ============================================================================

fn float_value(v: f64) -> Value {
    match Number::from_f64(v) {
        Some(n) => Value::Number(n),
        None if v.is_nan() => json!("NaN"),
        None if v > 0.0 => json!("Infinity"),
        None => json!("-Infinity"),
    }
}

pub fn status_to_json(status: StatusCode, reversible: bool) -> Value {
    if reversible {
        return json!(status.code());
    }
    let mut obj = Map::new();
    obj.insert(field::CODE.into(), json!(status.code()));
    if let Some(symbol) = status.symbol() {
        obj.insert(field::SYMBOL.into(), json!(symbol));
    }
    Value::Object(obj)
}

fn scalar_body(value: &Variant, opts: &ValueOptions<'_>) -> EncodeResult<Value> {
    Ok(match value {
        Variant::Null => Value::Null,
        Variant::Boolean(v) => json!(v),
        Variant::SByte(v) => json!(v),
        Variant::Byte(v) => json!(v),
        Variant::Int16(v) => json!(v),
        Variant::UInt16(v) => json!(v),
        Variant::Int32(v) => json!(v),
        Variant::UInt32(v) => json!(v),
        Variant::Int64(v) => json!(v.to_string()),
        Variant::UInt64(v) => json!(v.to_string()),
        Variant::Float(v) => float_value(f64::from(*v)),
        Variant::Double(v) => float_value(*v),
        Variant::String(v) => json!(v),
        Variant::DateTime(v) => json!(format_datetime(v)),
        Variant::Guid(v) => json!(v.to_string()),
        Variant::ByteString(v) => json!(STANDARD.encode(v)),
        Variant::NodeId(v) => json!(format_node_id(v, opts.advanced, opts.ctx)),
        Variant::StatusCode(v) => status_to_json(*v, opts.reversible),
        Variant::Array(..) => {
            return Err(EncodeError::TypeMismatch(
                "nested arrays are not supported".into(),
            ))
        }
    })
}

fn body(value: &Variant, opts: &ValueOptions<'_>) -> EncodeResult<Value> {
    match value {
        Variant::Array(_, items) => items
            .iter()
            .map(|item| scalar_body(item, opts))
            .collect::<EncodeResult<Vec<_>>>()
            .map(Value::Array),
        scalar => scalar_body(scalar, opts),
    }
}

/// Variant in the form selected by `opts.reversible`.
pub fn variant_to_json(value: &Variant, opts: &ValueOptions<'_>) -> EncodeResult<Value> {
    if !opts.reversible || value.is_null() {
        return body(value, opts);
    }
    Ok(json!({
        field::TYPE: value.built_in_type().wire_type() as u8,
        field::BODY: body(value, opts)?,
    }))
}

/// DataValue object restricted to `mask`. Defaults are omitted.
pub fn data_value_to_json(
    dv: &DataValue,
    mask: DataSetFieldContentFlags,
    opts: &ValueOptions<'_>,
) -> EncodeResult<Value> {
    type F = DataSetFieldContentFlags;
    let mut obj = Map::new();
    if !dv.value.is_null() {
        obj.insert(field::VALUE.into(), variant_to_json(&dv.value, opts)?);
    }
    if mask.contains(F::STATUS_CODE) && !dv.status.is_good() {
        obj.insert(field::STATUS_CODE.into(), status_to_json(dv.status, opts.reversible));
    }
    if let (true, Some(ts)) = (mask.contains(F::SOURCE_TIMESTAMP), &dv.source_timestamp) {
        obj.insert(field::SOURCE_TIMESTAMP.into(), json!(format_datetime(ts)));
    }
    if mask.contains(F::SOURCE_PICOSECONDS) && dv.source_picoseconds != 0 {
        obj.insert(field::SOURCE_PICOSECONDS.into(), json!(dv.source_picoseconds));
    }
    if let (true, Some(ts)) = (mask.contains(F::SERVER_TIMESTAMP), &dv.server_timestamp) {
        obj.insert(field::SERVER_TIMESTAMP.into(), json!(format_datetime(ts)));
    }
    if mask.contains(F::SERVER_PICOSECONDS) && dv.server_picoseconds != 0 {
        obj.insert(field::SERVER_PICOSECONDS.into(), json!(dv.server_picoseconds));
    }
    Ok(Value::Object(obj))
}

/// One payload field shaped by the dataset field mask.
pub fn field_to_json(
    dv: Option<&DataValue>,
    mask: DataSetFieldContentFlags,
    opts: &ValueOptions<'_>,
) -> EncodeResult<Value> {
    let Some(dv) = dv else {
        return Ok(Value::Null);
    };
    if mask.contains(DataSetFieldContentFlags::RAW_DATA) {
        let bare = ValueOptions {
            reversible: false,
            ..*opts
        };
        return variant_to_json(&dv.value, &bare);
    }
    if mask.is_empty() {
        let typed = ValueOptions {
            reversible: true,
            ..*opts
        };
        return variant_to_json(&dv.value, &typed);
    }
    data_value_to_json(dv, mask, opts)
}

// ============================================================================
// Decode
// ============================================================================

fn int_from<T: TryFrom<i64>>(value: &Value, what: &str) -> DecodeResult<T> {
    let n = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse::<i64>().ok(),
        _ => None,
    };
    n.and_then(|n| T::try_from(n).ok())
        .ok_or_else(|| invalid(what, value))
}

fn float_from(value: &Value) -> DecodeResult<f64> {
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| invalid("double", value)),
        Value::String(s) => match s.as_str() {
            "NaN" => Ok(f64::NAN),
            "Infinity" => Ok(f64::INFINITY),
            "-Infinity" => Ok(f64::NEG_INFINITY),
            other => other.parse().map_err(|_| invalid("double", value)),
        },
        _ => Err(invalid("double", value)),
    }
}

pub fn status_from_json(value: &Value) -> DecodeResult<StatusCode> {
    match value {
        Value::Number(_) => Ok(StatusCode(int_from(value, "status code")?)),
        Value::Object(map) => {
            if let Some(code) = get_ci(map, field::CODE) {
                return Ok(StatusCode(int_from(code, "status code")?));
            }
            get_ci(map, field::SYMBOL)
                .and_then(Value::as_str)
                .and_then(StatusCode::from_symbol)
                .ok_or_else(|| invalid("status code", value))
        }
        _ => Err(invalid("status code", value)),
    }
}

/// Decode a value of a known type.
fn typed_scalar(t: BuiltInType, value: &Value, ctx: &CodecContext) -> DecodeResult<Variant> {
    if value.is_null() {
        return Ok(Variant::Null);
    }
    Ok(match t.wire_type() {
        BuiltInType::Boolean => Variant::Boolean(value.as_bool().ok_or_else(|| invalid("boolean", value))?),
        BuiltInType::SByte => Variant::SByte(int_from(value, "sbyte")?),
        BuiltInType::Byte => Variant::Byte(int_from(value, "byte")?),
        BuiltInType::Int16 => Variant::Int16(int_from(value, "int16")?),
        BuiltInType::UInt16 => Variant::UInt16(int_from(value, "uint16")?),
        BuiltInType::Int32 => Variant::Int32(int_from(value, "int32")?),
        BuiltInType::UInt32 => Variant::UInt32(int_from(value, "uint32")?),
        BuiltInType::Int64 => Variant::Int64(int_from(value, "int64")?),
        BuiltInType::UInt64 => {
            let n = match value {
                Value::Number(n) => n.as_u64(),
                Value::String(s) => s.parse().ok(),
                _ => None,
            };
            Variant::UInt64(n.ok_or_else(|| invalid("uint64", value))?)
        }
        BuiltInType::Float => Variant::Float(float_from(value)? as f32),
        BuiltInType::Double => Variant::Double(float_from(value)?),
        BuiltInType::String => Variant::String(
            value
                .as_str()
                .ok_or_else(|| invalid("string", value))?
                .to_string(),
        ),
        BuiltInType::DateTime => Variant::DateTime(parse_datetime(value)?),
        BuiltInType::Guid => Variant::Guid(parse_guid(value)?),
        BuiltInType::ByteString => {
            let s = value.as_str().ok_or_else(|| invalid("byte string", value))?;
            Variant::ByteString(
                STANDARD
                    .decode(s)
                    .map_err(|e| DecodeError::InvalidValue(format!("base64: {}", e)))?,
            )
        }
        BuiltInType::NodeId => {
            let s = value.as_str().ok_or_else(|| invalid("node id", value))?;
            Variant::NodeId(parse_node_id(s, ctx)?)
        }
        BuiltInType::StatusCode => Variant::StatusCode(status_from_json(value)?),
        other => return Err(DecodeError::UnsupportedBuiltInType(other as u8)),
    })
}

fn is_reversible_variant(map: &Map<String, Value>) -> bool {
    get_ci(map, field::TYPE).is_some_and(Value::is_u64)
        && (map.len() == 1 || get_ci(map, field::BODY).is_some())
}

/// `{"Type": id, "Body": value}`; a missing body is the type's default.
fn reversible_variant(map: &Map<String, Value>, ctx: &CodecContext) -> DecodeResult<Variant> {
    let id = get_ci(map, field::TYPE)
        .and_then(Value::as_u64)
        .and_then(|id| u8::try_from(id).ok())
        .ok_or_else(|| DecodeError::InvalidValue("variant type id".into()))?;
    let t = BuiltInType::from_u8(id)
        .filter(|t| t.is_supported_scalar())
        .ok_or(DecodeError::UnsupportedBuiltInType(id))?;
    match get_ci(map, field::BODY) {
        None => Ok(Variant::default_for(t)),
        Some(Value::Array(items)) => {
            if items.len() > ctx.max_array_length {
                return Err(DecodeError::LimitExceeded("array length"));
            }
            items
                .iter()
                .map(|item| typed_scalar(t, item, ctx))
                .collect::<DecodeResult<Vec<_>>>()
                .map(|items| Variant::Array(t.wire_type(), items))
        }
        Some(body) => typed_scalar(t, body, ctx),
    }
}

/// Decode a bare value, inferring the narrowest matching type.
pub fn infer_variant(value: &Value, ctx: &CodecContext) -> DecodeResult<Variant> {
    Ok(match value {
        Value::Null => Variant::Null,
        Value::Bool(b) => Variant::Boolean(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i32::try_from(i).map_or(Variant::Int64(i), Variant::Int32)
            } else if let Some(u) = n.as_u64() {
                Variant::UInt64(u)
            } else {
                Variant::Double(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => Variant::String(s.clone()),
        Value::Array(items) => {
            if items.len() > ctx.max_array_length {
                return Err(DecodeError::LimitExceeded("array length"));
            }
            let items = items
                .iter()
                .map(|item| infer_variant(item, ctx))
                .collect::<DecodeResult<Vec<_>>>()?;
            if items.iter().any(Variant::is_array) {
                return Err(DecodeError::InvalidValue("nested arrays are not supported".into()));
            }
            let t = match items.first() {
                Some(first) if items.iter().all(|i| i.built_in_type() == first.built_in_type()) => {
                    first.built_in_type()
                }
                _ => BuiltInType::Variant,
            };
            Variant::Array(t, items)
        }
        Value::Object(map) if is_reversible_variant(map) => reversible_variant(map, ctx)?,
        Value::Object(map) if get_ci(map, field::CODE).is_some() => {
            Variant::StatusCode(status_from_json(value)?)
        }
        Value::Object(_) => return Err(invalid("variant", value)),
    })
}

/// What a decoded payload field reveals about the writer's masks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldShape {
    /// DataValue sub-fields present on the wire.
    pub mask: DataSetFieldContentFlags,
    /// A bare value that could have been written as RawData.
    pub bare: bool,
    /// Evidence of reversible field encoding.
    pub reversible: bool,
}

const DATA_VALUE_KEYS: [&str; 6] = [
    field::VALUE,
    field::STATUS_CODE,
    field::SOURCE_TIMESTAMP,
    field::SOURCE_PICOSECONDS,
    field::SERVER_TIMESTAMP,
    field::SERVER_PICOSECONDS,
];

fn data_value_from_json(
    map: &Map<String, Value>,
    ctx: &CodecContext,
) -> DecodeResult<(DataValue, FieldShape)> {
    type F = DataSetFieldContentFlags;
    let mut dv = DataValue::default();
    let mut shape = FieldShape::default();

    match get_ci(map, field::VALUE) {
        Some(Value::Object(inner)) if is_reversible_variant(inner) => {
            dv.value = reversible_variant(inner, ctx)?;
            shape.reversible = true;
        }
        Some(value) => dv.value = infer_variant(value, ctx)?,
        None => {}
    }
    if let Some(status) = get_ci(map, field::STATUS_CODE) {
        dv.status = status_from_json(status)?;
        shape.mask.insert(F::STATUS_CODE);
        shape.reversible |= status.is_number();
    }
    if let Some(ts) = get_ci(map, field::SOURCE_TIMESTAMP) {
        dv.source_timestamp = Some(parse_datetime(ts)?);
        shape.mask.insert(F::SOURCE_TIMESTAMP);
    }
    if let Some(ps) = get_ci(map, field::SOURCE_PICOSECONDS) {
        dv.source_picoseconds = int_from(ps, "picoseconds")?;
        shape.mask.insert(F::SOURCE_PICOSECONDS);
    }
    if let Some(ts) = get_ci(map, field::SERVER_TIMESTAMP) {
        dv.server_timestamp = Some(parse_datetime(ts)?);
        shape.mask.insert(F::SERVER_TIMESTAMP);
    }
    if let Some(ps) = get_ci(map, field::SERVER_PICOSECONDS) {
        dv.server_picoseconds = int_from(ps, "picoseconds")?;
        shape.mask.insert(F::SERVER_PICOSECONDS);
    }
    Ok((dv, shape))
}

/// Decode one payload field in whichever shape it was written.
pub fn field_from_json(
    value: &Value,
    ctx: &CodecContext,
) -> DecodeResult<(Option<DataValue>, FieldShape)> {
    match value {
        Value::Null => Ok((None, FieldShape::default())),
        Value::Object(map) if is_reversible_variant(map) => {
            Ok((Some(DataValue::new(reversible_variant(map, ctx)?)), FieldShape::default()))
        }
        Value::Object(map) if DATA_VALUE_KEYS.iter().any(|k| get_ci(map, k).is_some()) => {
            let (dv, shape) = data_value_from_json(map, ctx)?;
            Ok((Some(dv), shape))
        }
        other => {
            let shape = FieldShape {
                bare: true,
                ..FieldShape::default()
            };
            Ok((Some(DataValue::new(infer_variant(other, ctx)?)), shape))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn opts(ctx: &CodecContext, reversible: bool) -> ValueOptions<'_> {
        ValueOptions {
            ctx,
            reversible,
            advanced: false,
        }
    }

    #[test]
    fn test_non_reversible_scalars() {
        let ctx = CodecContext::default();
        let o = opts(&ctx, false);
        assert_eq!(variant_to_json(&Variant::Int32(25), &o).unwrap(), json!(25));
        assert_eq!(variant_to_json(&Variant::Int64(-5), &o).unwrap(), json!("-5"));
        assert_eq!(variant_to_json(&Variant::Double(f64::NAN), &o).unwrap(), json!("NaN"));
        assert_eq!(
            variant_to_json(&Variant::ByteString(vec![1, 2, 3]), &o).unwrap(),
            json!("AQID")
        );
        let ts = Utc.with_ymd_and_hms(2021, 9, 27, 18, 45, 19).unwrap()
            + chrono::Duration::milliseconds(555);
        assert_eq!(
            variant_to_json(&Variant::DateTime(ts), &o).unwrap(),
            json!("2021-09-27T18:45:19.555Z")
        );
        assert_eq!(
            variant_to_json(&Variant::StatusCode(StatusCode::UNCERTAIN), &o).unwrap(),
            json!({"Code": 1073741824u32, "Symbol": "Uncertain"})
        );
    }

    #[test]
    fn test_reversible_variant_round_trip() {
        let ctx = CodecContext::default();
        let o = opts(&ctx, true);
        let values = [
            Variant::Int32(25),
            Variant::UInt64(u64::MAX),
            Variant::Float(0.1),
            Variant::DateTime(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()),
            Variant::Guid(Uuid::new_v4()),
            Variant::NodeId(NodeId::new(2, 5001)),
            Variant::Array(BuiltInType::Int16, vec![Variant::Int16(1), Variant::Int16(-2)]),
        ];
        for value in values {
            let encoded = variant_to_json(&value, &o).unwrap();
            assert_eq!(infer_variant(&encoded, &ctx).unwrap(), value, "{}", encoded);
        }
        assert_eq!(
            variant_to_json(&Variant::Int32(25), &o).unwrap(),
            json!({"Type": 6, "Body": 25})
        );
    }

    #[test]
    fn test_inference_of_bare_values() {
        let ctx = CodecContext::default();
        assert_eq!(infer_variant(&json!(true), &ctx).unwrap(), Variant::Boolean(true));
        assert_eq!(infer_variant(&json!(7), &ctx).unwrap(), Variant::Int32(7));
        assert_eq!(
            infer_variant(&json!(5_000_000_000i64), &ctx).unwrap(),
            Variant::Int64(5_000_000_000)
        );
        assert_eq!(infer_variant(&json!(2.5), &ctx).unwrap(), Variant::Double(2.5));
        assert_eq!(
            infer_variant(&json!([1, 2]), &ctx).unwrap(),
            Variant::Array(BuiltInType::Int32, vec![Variant::Int32(1), Variant::Int32(2)])
        );
        assert_eq!(
            infer_variant(&json!([]), &ctx).unwrap(),
            Variant::Array(BuiltInType::Variant, vec![])
        );
        assert!(infer_variant(&json!({"a": 1}), &ctx).is_err());
    }

    #[test]
    fn test_data_value_shapes() {
        type F = DataSetFieldContentFlags;
        let ctx = CodecContext::default();
        let ts = Utc.with_ymd_and_hms(2021, 9, 27, 18, 45, 19).unwrap();
        let dv = DataValue::new(25i32)
            .with_status(StatusCode::UNCERTAIN)
            .with_source_timestamp(ts, 0);
        let mask = F::STATUS_CODE | F::SOURCE_TIMESTAMP;

        let plain = field_to_json(Some(&dv), mask, &opts(&ctx, false)).unwrap();
        assert_eq!(
            plain,
            json!({
                "Value": 25,
                "StatusCode": {"Code": 1073741824u32, "Symbol": "Uncertain"},
                "SourceTimestamp": "2021-09-27T18:45:19Z"
            })
        );
        let (decoded, shape) = field_from_json(&plain, &ctx).unwrap();
        assert_eq!(decoded, Some(dv.clone()));
        assert_eq!(shape.mask, mask);
        assert!(!shape.reversible);

        let typed = field_to_json(Some(&dv), mask, &opts(&ctx, true)).unwrap();
        assert_eq!(typed["Value"], json!({"Type": 6, "Body": 25}));
        assert_eq!(typed["StatusCode"], json!(1073741824u32));
        let (_, shape) = field_from_json(&typed, &ctx).unwrap();
        assert!(shape.reversible);
    }

    #[test]
    fn test_field_shape_by_mask() {
        let ctx = CodecContext::default();
        let dv = DataValue::new(25i32);
        let o = opts(&ctx, false);
        assert_eq!(
            field_to_json(Some(&dv), DataSetFieldContentFlags::RAW_DATA, &o).unwrap(),
            json!(25)
        );
        assert_eq!(
            field_to_json(Some(&dv), DataSetFieldContentFlags::NONE, &o).unwrap(),
            json!({"Type": 6, "Body": 25})
        );
        assert_eq!(field_to_json(None, DataSetFieldContentFlags::NONE, &o).unwrap(), Value::Null);

        let (_, shape) = field_from_json(&json!(25), &ctx).unwrap();
        assert!(shape.bare);
        let (value, shape) = field_from_json(&json!({"Type": 6, "Body": 25}), &ctx).unwrap();
        assert_eq!(value, Some(dv));
        assert_eq!(shape, FieldShape::default());
    }

    #[test]
    fn test_node_id_namespace_forms() {
        let mut ctx = CodecContext::default();
        let ns = ctx.namespace_index("urn:plant");
        let id = NodeId::new(ns, 42);
        assert_eq!(format_node_id(&id, false, &ctx), "ns=1;i=42");
        assert_eq!(format_node_id(&id, true, &ctx), "nsu=urn:plant;i=42");
        assert_eq!(parse_node_id("nsu=urn:plant;i=42", &ctx).unwrap(), id);
        assert_eq!(parse_node_id("ns=1;i=42", &ctx).unwrap(), id);
        assert!(parse_node_id("nsu=urn:other;i=1", &ctx).is_err());
    }

    #[test]
    fn test_get_ci_prefers_exact_match() {
        let map = json!({"messageid": "a", "MessageId": "b"});
        let map = map.as_object().unwrap();
        assert_eq!(get_ci(map, "MessageId"), Some(&json!("b")));
        assert_eq!(get_ci(map, "MESSAGEID"), Some(&json!("a")));
    }
}
