// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! OPC UA binary encodings (Part 6, 5.2) for the types the PubSub codec needs.

use super::{BinaryReader, BinaryWriter};
use crate::config::{CodecContext, UNIX_EPOCH_TICKS};
use crate::error::{DecodeError, DecodeResult, EncodeError, EncodeResult};
use crate::flags::DataSetFieldContentFlags;
use crate::types::{
    BuiltInType, ConfigurationVersion, DataSetMetaData, DataValue, FieldMetaData, LocalizedText,
    NodeId, StatusCode, Variant, VALUE_RANK_ONE_DIMENSION, VALUE_RANK_SCALAR,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

const TICKS_PER_SECOND: i64 = 10_000_000;

const VARIANT_ARRAY_BIT: u8 = 0x80;
const VARIANT_DIMENSIONS_BIT: u8 = 0x40;
const VARIANT_TYPE_MASK: u8 = 0x3F;

// DataValue encoding mask
const DV_VALUE: u8 = 0x01;
const DV_STATUS: u8 = 0x02;
const DV_SOURCE_TIMESTAMP: u8 = 0x04;
const DV_SERVER_TIMESTAMP: u8 = 0x08;
const DV_SOURCE_PICOSECONDS: u8 = 0x10;
const DV_SERVER_PICOSECONDS: u8 = 0x20;

// ============================================================================
// DateTime
// ============================================================================

/// 100 ns ticks since 1601-01-01, clamped at 0.
pub fn datetime_to_ticks(dt: &DateTime<Utc>) -> i64 {
    let unix = dt
        .timestamp()
        .saturating_mul(TICKS_PER_SECOND)
        .saturating_add(i64::from(dt.timestamp_subsec_nanos() / 100));
    unix.saturating_add(UNIX_EPOCH_TICKS).max(0)
}

pub fn ticks_to_datetime(ticks: i64) -> DateTime<Utc> {
    let unix = ticks.saturating_sub(UNIX_EPOCH_TICKS);
    let secs = unix.div_euclid(TICKS_PER_SECOND);
    let nanos = (unix.rem_euclid(TICKS_PER_SECOND) * 100) as u32;
    DateTime::from_timestamp(secs, nanos).unwrap_or_default()
}

pub fn write_datetime(w: &mut BinaryWriter, dt: &DateTime<Utc>) {
    w.write_i64(datetime_to_ticks(dt));
}

pub fn read_datetime(r: &mut BinaryReader<'_>) -> DecodeResult<DateTime<Utc>> {
    Ok(ticks_to_datetime(r.read_i64()?))
}

// ============================================================================
// Strings, byte strings, GUIDs
// ============================================================================

fn write_length(w: &mut BinaryWriter, len: usize) -> EncodeResult<()> {
    let len = i32::try_from(len).map_err(|_| EncodeError::ValueTooLarge("length exceeds i32"))?;
    w.write_i32(len);
    Ok(())
}

/// Length prefix; `None` for the null (-1) encoding.
fn read_length(r: &mut BinaryReader<'_>, limit: usize, what: &'static str) -> DecodeResult<Option<usize>> {
    let len = r.read_i32()?;
    if len < 0 {
        return Ok(None);
    }
    let len = len as usize;
    if len > limit {
        return Err(DecodeError::LimitExceeded(what));
    }
    Ok(Some(len))
}

pub fn write_string(w: &mut BinaryWriter, s: Option<&str>) -> EncodeResult<()> {
    match s {
        Some(s) => {
            write_length(w, s.len())?;
            w.write_bytes(s.as_bytes());
        }
        None => w.write_i32(-1),
    }
    Ok(())
}

pub fn read_string(r: &mut BinaryReader<'_>, ctx: &CodecContext) -> DecodeResult<Option<String>> {
    match read_length(r, ctx.max_string_length, "string length")? {
        Some(len) => {
            let bytes = r.read_bytes(len)?;
            let s = std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)?;
            Ok(Some(s.to_string()))
        }
        None => Ok(None),
    }
}

pub fn write_byte_string(w: &mut BinaryWriter, b: Option<&[u8]>) -> EncodeResult<()> {
    match b {
        Some(b) => {
            write_length(w, b.len())?;
            w.write_bytes(b);
        }
        None => w.write_i32(-1),
    }
    Ok(())
}

pub fn read_byte_string(r: &mut BinaryReader<'_>, ctx: &CodecContext) -> DecodeResult<Option<Vec<u8>>> {
    match read_length(r, ctx.max_byte_string_length, "byte string length")? {
        Some(len) => Ok(Some(r.read_bytes(len)?.to_vec())),
        None => Ok(None),
    }
}

pub fn write_guid(w: &mut BinaryWriter, guid: &Uuid) {
    let (d1, d2, d3, d4) = guid.as_fields();
    w.write_u32(d1);
    w.write_u16(d2);
    w.write_u16(d3);
    w.write_bytes(d4);
}

pub fn read_guid(r: &mut BinaryReader<'_>) -> DecodeResult<Uuid> {
    let d1 = r.read_u32()?;
    let d2 = r.read_u16()?;
    let d3 = r.read_u16()?;
    let mut d4 = [0u8; 8];
    d4.copy_from_slice(r.read_bytes(8)?);
    Ok(Uuid::from_fields(d1, d2, d3, &d4))
}

// ============================================================================
// NodeId, LocalizedText
// ============================================================================

pub fn write_node_id(w: &mut BinaryWriter, id: &NodeId) {
    if id.namespace == 0 && id.identifier <= 0xFF {
        w.write_u8(0x00);
        w.write_u8(id.identifier as u8);
    } else if id.namespace <= 0xFF && id.identifier <= 0xFFFF {
        w.write_u8(0x01);
        w.write_u8(id.namespace as u8);
        w.write_u16(id.identifier as u16);
    } else {
        w.write_u8(0x02);
        w.write_u16(id.namespace);
        w.write_u32(id.identifier);
    }
}

pub fn read_node_id(r: &mut BinaryReader<'_>) -> DecodeResult<NodeId> {
    match r.read_u8()? {
        0x00 => Ok(NodeId::new(0, u32::from(r.read_u8()?))),
        0x01 => {
            let ns = r.read_u8()?;
            Ok(NodeId::new(u16::from(ns), u32::from(r.read_u16()?)))
        }
        0x02 => {
            let ns = r.read_u16()?;
            Ok(NodeId::new(ns, r.read_u32()?))
        }
        other => Err(DecodeError::InvalidValue(format!(
            "unsupported node id encoding 0x{:02x}",
            other
        ))),
    }
}

pub fn write_localized_text(w: &mut BinaryWriter, text: &LocalizedText) -> EncodeResult<()> {
    let mut mask = 0u8;
    if text.locale.is_some() {
        mask |= 0x01;
    }
    if text.text.is_some() {
        mask |= 0x02;
    }
    w.write_u8(mask);
    if let Some(locale) = &text.locale {
        write_string(w, Some(locale))?;
    }
    if let Some(t) = &text.text {
        write_string(w, Some(t))?;
    }
    Ok(())
}

pub fn read_localized_text(r: &mut BinaryReader<'_>, ctx: &CodecContext) -> DecodeResult<LocalizedText> {
    let mask = r.read_u8()?;
    let locale = if mask & 0x01 != 0 { read_string(r, ctx)? } else { None };
    let text = if mask & 0x02 != 0 { read_string(r, ctx)? } else { None };
    Ok(LocalizedText { locale, text })
}

// ============================================================================
// Variant
// ============================================================================

/// Write the body of a scalar (no encoding byte).
pub fn write_scalar(w: &mut BinaryWriter, value: &Variant) -> EncodeResult<()> {
    match value {
        Variant::Null => {}
        Variant::Boolean(v) => w.write_bool(*v),
        Variant::SByte(v) => w.write_i8(*v),
        Variant::Byte(v) => w.write_u8(*v),
        Variant::Int16(v) => w.write_i16(*v),
        Variant::UInt16(v) => w.write_u16(*v),
        Variant::Int32(v) => w.write_i32(*v),
        Variant::UInt32(v) => w.write_u32(*v),
        Variant::Int64(v) => w.write_i64(*v),
        Variant::UInt64(v) => w.write_u64(*v),
        Variant::Float(v) => w.write_f32(*v),
        Variant::Double(v) => w.write_f64(*v),
        Variant::String(v) => write_string(w, Some(v))?,
        Variant::DateTime(v) => write_datetime(w, v),
        Variant::Guid(v) => write_guid(w, v),
        Variant::ByteString(v) => write_byte_string(w, Some(v))?,
        Variant::NodeId(v) => write_node_id(w, v),
        Variant::StatusCode(v) => w.write_u32(v.code()),
        Variant::Array(..) => {
            return Err(EncodeError::TypeMismatch(
                "nested arrays are not supported".into(),
            ))
        }
    }
    Ok(())
}

/// Read the body of a scalar of type `t`.
pub fn read_scalar(r: &mut BinaryReader<'_>, ctx: &CodecContext, t: BuiltInType) -> DecodeResult<Variant> {
    Ok(match t.wire_type() {
        BuiltInType::Null => Variant::Null,
        BuiltInType::Boolean => Variant::Boolean(r.read_bool()?),
        BuiltInType::SByte => Variant::SByte(r.read_i8()?),
        BuiltInType::Byte => Variant::Byte(r.read_u8()?),
        BuiltInType::Int16 => Variant::Int16(r.read_i16()?),
        BuiltInType::UInt16 => Variant::UInt16(r.read_u16()?),
        BuiltInType::Int32 => Variant::Int32(r.read_i32()?),
        BuiltInType::UInt32 => Variant::UInt32(r.read_u32()?),
        BuiltInType::Int64 => Variant::Int64(r.read_i64()?),
        BuiltInType::UInt64 => Variant::UInt64(r.read_u64()?),
        BuiltInType::Float => Variant::Float(r.read_f32()?),
        BuiltInType::Double => Variant::Double(r.read_f64()?),
        BuiltInType::String => Variant::String(read_string(r, ctx)?.unwrap_or_default()),
        BuiltInType::DateTime => Variant::DateTime(read_datetime(r)?),
        BuiltInType::Guid => Variant::Guid(read_guid(r)?),
        BuiltInType::ByteString => Variant::ByteString(read_byte_string(r, ctx)?.unwrap_or_default()),
        BuiltInType::NodeId => Variant::NodeId(read_node_id(r)?),
        BuiltInType::StatusCode => Variant::StatusCode(StatusCode(r.read_u32()?)),
        other => return Err(DecodeError::UnsupportedBuiltInType(other as u8)),
    })
}

fn write_array_body(w: &mut BinaryWriter, t: BuiltInType, items: &[Variant]) -> EncodeResult<()> {
    write_length(w, items.len())?;
    for item in items {
        if item.is_array() || item.built_in_type().wire_type() != t.wire_type() {
            return Err(EncodeError::TypeMismatch(format!(
                "array of {:?} contains {:?}",
                t,
                item.built_in_type()
            )));
        }
        write_scalar(w, item)?;
    }
    Ok(())
}

fn read_array_body(r: &mut BinaryReader<'_>, ctx: &CodecContext, t: BuiltInType) -> DecodeResult<Variant> {
    let Some(count) = read_length(r, ctx.max_array_length, "array length")? else {
        return Ok(Variant::Null);
    };
    let mut items = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        items.push(read_scalar(r, ctx, t)?);
    }
    Ok(Variant::Array(t, items))
}

pub fn write_variant(w: &mut BinaryWriter, value: &Variant) -> EncodeResult<()> {
    let type_id = value.built_in_type().wire_type() as u8;
    match value {
        Variant::Array(t, items) => {
            w.write_u8(type_id | VARIANT_ARRAY_BIT);
            write_array_body(w, *t, items)
        }
        scalar => {
            w.write_u8(type_id);
            write_scalar(w, scalar)
        }
    }
}

pub fn read_variant(r: &mut BinaryReader<'_>, ctx: &CodecContext) -> DecodeResult<Variant> {
    let encoding = r.read_u8()?;
    let id = encoding & VARIANT_TYPE_MASK;
    let t = BuiltInType::from_u8(id).ok_or(DecodeError::UnsupportedBuiltInType(id))?;
    if t != BuiltInType::Null && !t.is_supported_scalar() {
        return Err(DecodeError::UnsupportedBuiltInType(id));
    }
    if encoding & VARIANT_ARRAY_BIT != 0 {
        if encoding & VARIANT_DIMENSIONS_BIT != 0 {
            return Err(DecodeError::InvalidValue(
                "multi-dimensional arrays are not supported".into(),
            ));
        }
        return read_array_body(r, ctx, t);
    }
    read_scalar(r, ctx, t)
}

// ============================================================================
// DataValue
// ============================================================================

fn data_value_mask(dv: &DataValue, fields: DataSetFieldContentFlags) -> u8 {
    type F = DataSetFieldContentFlags;
    let mut mask = 0u8;
    if !dv.value.is_null() {
        mask |= DV_VALUE;
    }
    if fields.contains(F::STATUS_CODE) && !dv.status.is_good() {
        mask |= DV_STATUS;
    }
    if fields.contains(F::SOURCE_TIMESTAMP) && dv.source_timestamp.is_some() {
        mask |= DV_SOURCE_TIMESTAMP;
    }
    if fields.contains(F::SERVER_TIMESTAMP) && dv.server_timestamp.is_some() {
        mask |= DV_SERVER_TIMESTAMP;
    }
    if fields.contains(F::SOURCE_PICOSECONDS) && dv.source_picoseconds != 0 {
        mask |= DV_SOURCE_PICOSECONDS;
    }
    if fields.contains(F::SERVER_PICOSECONDS) && dv.server_picoseconds != 0 {
        mask |= DV_SERVER_PICOSECONDS;
    }
    mask
}

/// Write a DataValue carrying only the sub-fields selected by `fields`.
pub fn write_data_value(
    w: &mut BinaryWriter,
    dv: &DataValue,
    fields: DataSetFieldContentFlags,
) -> EncodeResult<()> {
    let mask = data_value_mask(dv, fields);
    w.write_u8(mask);
    if mask & DV_VALUE != 0 {
        write_variant(w, &dv.value)?;
    }
    if mask & DV_STATUS != 0 {
        w.write_u32(dv.status.code());
    }
    if let (true, Some(ts)) = (mask & DV_SOURCE_TIMESTAMP != 0, &dv.source_timestamp) {
        write_datetime(w, ts);
    }
    if mask & DV_SOURCE_PICOSECONDS != 0 {
        w.write_u16(dv.source_picoseconds);
    }
    if let (true, Some(ts)) = (mask & DV_SERVER_TIMESTAMP != 0, &dv.server_timestamp) {
        write_datetime(w, ts);
    }
    if mask & DV_SERVER_PICOSECONDS != 0 {
        w.write_u16(dv.server_picoseconds);
    }
    Ok(())
}

pub fn read_data_value(r: &mut BinaryReader<'_>, ctx: &CodecContext) -> DecodeResult<DataValue> {
    let mask = r.read_u8()?;
    let mut dv = DataValue::default();
    if mask & DV_VALUE != 0 {
        dv.value = read_variant(r, ctx)?;
    }
    if mask & DV_STATUS != 0 {
        dv.status = StatusCode(r.read_u32()?);
    }
    if mask & DV_SOURCE_TIMESTAMP != 0 {
        dv.source_timestamp = Some(read_datetime(r)?);
    }
    if mask & DV_SOURCE_PICOSECONDS != 0 {
        dv.source_picoseconds = r.read_u16()?;
    }
    if mask & DV_SERVER_TIMESTAMP != 0 {
        dv.server_timestamp = Some(read_datetime(r)?);
    }
    if mask & DV_SERVER_PICOSECONDS != 0 {
        dv.server_picoseconds = r.read_u16()?;
    }
    Ok(dv)
}

// ============================================================================
// RawData fields
// ============================================================================

/// Write a RawData field typed by its metadata.
///
/// Null scalars are written as the type's zero value. Value ranks other than
/// scalar and one-dimensional write nothing.
pub fn write_raw_field(w: &mut BinaryWriter, field: &FieldMetaData, value: &Variant) -> EncodeResult<()> {
    let t = field.built_in_type;
    if !t.is_supported_scalar() {
        return Err(EncodeError::UnsupportedBuiltInType(t as u8));
    }
    match field.value_rank {
        VALUE_RANK_SCALAR => {
            if value.is_null() {
                return write_scalar(w, &Variant::default_for(t));
            }
            if value.is_array() || value.built_in_type().wire_type() != t.wire_type() {
                return Err(EncodeError::TypeMismatch(format!(
                    "field {:?} is {:?} but value is {:?}",
                    field.name,
                    t,
                    value.built_in_type()
                )));
            }
            write_scalar(w, value)
        }
        VALUE_RANK_ONE_DIMENSION => match value {
            Variant::Null => {
                w.write_i32(-1);
                Ok(())
            }
            Variant::Array(_, items) => write_array_body(w, t, items),
            other => Err(EncodeError::TypeMismatch(format!(
                "field {:?} is an array but value is scalar {:?}",
                field.name,
                other.built_in_type()
            ))),
        },
        _ => Ok(()),
    }
}

pub fn read_raw_field(
    r: &mut BinaryReader<'_>,
    ctx: &CodecContext,
    field: &FieldMetaData,
) -> DecodeResult<Variant> {
    match field.value_rank {
        VALUE_RANK_SCALAR => read_scalar(r, ctx, field.built_in_type),
        VALUE_RANK_ONE_DIMENSION => read_array_body(r, ctx, field.built_in_type.wire_type()),
        _ => Ok(Variant::StatusCode(StatusCode::BAD_NOT_SUPPORTED)),
    }
}

// ============================================================================
// DataSetMetaData
// ============================================================================

fn write_field_metadata(w: &mut BinaryWriter, field: &FieldMetaData) -> EncodeResult<()> {
    write_string(w, Some(&field.name))?;
    write_localized_text(w, &field.description)?;
    w.write_u16(field.field_flags);
    w.write_u8(field.built_in_type as u8);
    write_node_id(w, &field.data_type);
    w.write_i32(field.value_rank);
    write_length(w, field.array_dimensions.len())?;
    for dim in &field.array_dimensions {
        w.write_u32(*dim);
    }
    w.write_u32(field.max_string_length);
    write_guid(w, &field.data_set_field_id);
    // properties
    w.write_i32(0);
    Ok(())
}

fn read_field_metadata(r: &mut BinaryReader<'_>, ctx: &CodecContext) -> DecodeResult<FieldMetaData> {
    let name = read_string(r, ctx)?.unwrap_or_default();
    let description = read_localized_text(r, ctx)?;
    let field_flags = r.read_u16()?;
    let type_id = r.read_u8()?;
    let built_in_type =
        BuiltInType::from_u8(type_id).ok_or(DecodeError::UnsupportedBuiltInType(type_id))?;
    let data_type = read_node_id(r)?;
    let value_rank = r.read_i32()?;
    let dims = read_length(r, ctx.max_array_length, "array dimensions")?.unwrap_or(0);
    let mut array_dimensions = Vec::with_capacity(dims.min(32));
    for _ in 0..dims {
        array_dimensions.push(r.read_u32()?);
    }
    let max_string_length = r.read_u32()?;
    let data_set_field_id = read_guid(r)?;
    // properties: QualifiedName key + Variant value, not kept
    let properties = read_length(r, ctx.max_array_length, "property count")?.unwrap_or(0);
    for _ in 0..properties {
        r.read_u16()?;
        read_string(r, ctx)?;
        read_variant(r, ctx)?;
    }
    Ok(FieldMetaData {
        name,
        description,
        field_flags,
        built_in_type,
        data_type,
        value_rank,
        array_dimensions,
        max_string_length,
        data_set_field_id,
    })
}

pub fn write_metadata(w: &mut BinaryWriter, metadata: &DataSetMetaData) -> EncodeResult<()> {
    // namespaces, structure, enum and simple data types
    for _ in 0..4 {
        w.write_i32(0);
    }
    write_string(w, Some(&metadata.name))?;
    write_localized_text(w, &metadata.description)?;
    write_length(w, metadata.fields.len())?;
    for field in &metadata.fields {
        write_field_metadata(w, field)?;
    }
    write_guid(w, &metadata.data_set_class_id);
    w.write_u32(metadata.configuration_version.major_version);
    w.write_u32(metadata.configuration_version.minor_version);
    Ok(())
}

pub fn read_metadata(r: &mut BinaryReader<'_>, ctx: &CodecContext) -> DecodeResult<DataSetMetaData> {
    let namespaces = read_length(r, ctx.max_array_length, "namespace count")?.unwrap_or(0);
    for _ in 0..namespaces {
        read_string(r, ctx)?;
    }
    for what in ["structure data types", "enum data types", "simple data types"] {
        if read_length(r, ctx.max_array_length, "data type count")?.unwrap_or(0) != 0 {
            return Err(DecodeError::InvalidValue(format!("{} are not supported", what)));
        }
    }
    let name = read_string(r, ctx)?.unwrap_or_default();
    let description = read_localized_text(r, ctx)?;
    let count = read_length(r, ctx.max_array_length, "field count")?.unwrap_or(0);
    let mut fields = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        fields.push(read_field_metadata(r, ctx)?);
    }
    let data_set_class_id = read_guid(r)?;
    let major = r.read_u32()?;
    let minor = r.read_u32()?;
    Ok(DataSetMetaData {
        name,
        description,
        fields,
        data_set_class_id,
        configuration_version: ConfigurationVersion::new(major, minor),
    })
}
