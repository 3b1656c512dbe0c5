// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Avro NetworkMessage with a schema generated on first write.
//!
//! Avro frames carry no type information, so the schema is part of the
//! message state: it is built from the first dataset message the first time
//! the message is encoded and must be handed to the decoder out of band
//! (`schema_json()` / [`AvroNetworkMessage::from_schema_json`]).
//!
//! Record layout:
//!
//! ```text
//! NetworkMessage  MessageId, MessageType, [PublisherId], [DataSetClassId],
//!                 DataSetWriterGroup, Messages (array, or record when single)
//! DataSetMessage  [DataSetWriterId], [SequenceNumber], [MetaDataVersion],
//!                 [Timestamp], [Status], [MessageType], [DataSetWriterName],
//!                 Payload
//! DataSet         one field per dataset field
//! ```
//!
//! Without a network header the root is the `Messages` schema; without a
//! dataset header each message is the `DataSet` record alone.

use super::codec::{read_value, write_value, AvroValue};
use super::schema::{escape_name, AvroSchema, Primitive, PrimitiveKind, RecordField, RecordSchema, NAMESPACE};
use crate::binary::codec::{read_variant, write_variant};
use crate::binary::{BinaryReader, BinaryWriter};
use crate::compress::{gunzip, gzip};
use crate::config::{content_type, field, message_type, schema_uri, CodecContext};
use crate::error::{DecodeError, DecodeResult, EncodeError, EncodeResult};
use crate::flags::{DataSetFieldContentFlags, DataSetMessageContentFlags, NetworkMessageContentFlags};
use crate::message::{DataSetMessage, MessageCodec, MessageIdSource, MessageType, NetworkMessageBase};
use crate::types::{
    BuiltInType, ConfigurationVersion, DataSet, DataSetMetaData, DataValue, MetaDataResolver,
    StatusCode, Variant, VALUE_RANK_SCALAR,
};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use uuid::Uuid;

type N = NetworkMessageContentFlags;
type M = DataSetMessageContentFlags;
type F = DataSetFieldContentFlags;

const NETWORK_RECORD: &str = "NetworkMessage";
const DATASET_MESSAGE_RECORD: &str = "DataSetMessage";
const DATASET_RECORD: &str = "DataSet";
const VARIANT_RECORD: &str = "Variant";
const VERSION_RECORD: &str = "ConfigurationVersion";
const DATA_VALUE_SUFFIX: &str = "DataValue";

const TIMESTAMP_MICROS: &str = "timestamp-micros";
const UUID: &str = "uuid";

// ============================================================================
// Schema generation
// ============================================================================

fn variant_record() -> AvroSchema {
    AvroSchema::record(
        VARIANT_RECORD,
        vec![
            RecordField::new(field::TYPE, AvroSchema::int()),
            RecordField::new(field::BODY, AvroSchema::bytes()),
        ],
    )
}

fn timestamp_schema() -> AvroSchema {
    AvroSchema::long().with_logical_type(TIMESTAMP_MICROS)
}

fn status_schema() -> AvroSchema {
    AvroSchema::long().with_built_in_type(BuiltInType::StatusCode)
}

fn scalar_schema(t: BuiltInType) -> AvroSchema {
    use BuiltInType as B;
    let schema = match t {
        B::Boolean => AvroSchema::boolean(),
        B::SByte | B::Byte | B::Int16 | B::UInt16 | B::Int32 => AvroSchema::int(),
        B::UInt32 | B::Int64 | B::UInt64 | B::StatusCode => AvroSchema::long(),
        B::Float => AvroSchema::primitive(PrimitiveKind::Float),
        B::Double => AvroSchema::primitive(PrimitiveKind::Double),
        B::String | B::NodeId => AvroSchema::string(),
        B::DateTime => timestamp_schema(),
        B::Guid => AvroSchema::string().with_logical_type(UUID),
        B::ByteString => AvroSchema::bytes(),
        _ => return variant_record(),
    };
    schema.with_built_in_type(t)
}

/// Field type from metadata, else from the first value.
fn field_type(
    name: &str,
    value: Option<&DataValue>,
    metadata: Option<&DataSetMetaData>,
) -> Option<(BuiltInType, bool)> {
    if let Some(fmd) = metadata.and_then(|md| md.fields.iter().find(|f| f.name == name)) {
        let t = fmd.built_in_type.wire_type();
        return t
            .is_supported_scalar()
            .then_some((t, fmd.value_rank != VALUE_RANK_SCALAR));
    }
    let value = &value?.value;
    let t = value.built_in_type().wire_type();
    (!value.is_null() && t.is_supported_scalar()).then_some((t, value.is_array()))
}

fn value_schema(name: &str, value: Option<&DataValue>, metadata: Option<&DataSetMetaData>) -> AvroSchema {
    match field_type(name, value, metadata) {
        Some((t, false)) => scalar_schema(t),
        Some((t, true)) => AvroSchema::array(scalar_schema(t)),
        None => variant_record(),
    }
}

fn data_value_schema(name: &str, value: AvroSchema, mask: F) -> AvroSchema {
    let mut fields = vec![RecordField::new(field::VALUE, value.nullable())];
    let optional = [
        (F::STATUS_CODE, field::STATUS_CODE, status_schema()),
        (F::SOURCE_TIMESTAMP, field::SOURCE_TIMESTAMP, timestamp_schema()),
        (F::SOURCE_PICOSECONDS, field::SOURCE_PICOSECONDS, AvroSchema::int()),
        (F::SERVER_TIMESTAMP, field::SERVER_TIMESTAMP, timestamp_schema()),
        (F::SERVER_PICOSECONDS, field::SERVER_PICOSECONDS, AvroSchema::int()),
    ];
    for (flag, field_name, schema) in optional {
        if mask.contains(flag) {
            fields.push(RecordField::new(field_name, schema.nullable()));
        }
    }
    AvroSchema::record(format!("{}{}", escape_name(name), DATA_VALUE_SUFFIX), fields)
}

fn payload_schema(msg: &DataSetMessage, metadata: Option<&DataSetMetaData>) -> AvroSchema {
    let mask = msg.payload.field_mask;
    let fields = msg
        .payload
        .iter()
        .map(|(name, value)| {
            let schema = if mask.contains(F::RAW_DATA) {
                value_schema(name, value, metadata)
            } else if mask.is_empty() {
                variant_record()
            } else {
                data_value_schema(name, value_schema(name, value, metadata), mask)
            };
            RecordField::escaped(name, schema.nullable())
        })
        .collect();
    AvroSchema::record(DATASET_RECORD, fields)
}

fn dataset_schema(msg: &DataSetMessage, with_header: bool, metadata: Option<&DataSetMetaData>) -> AvroSchema {
    let payload = payload_schema(msg, metadata);
    if !with_header {
        return payload;
    }
    let version = AvroSchema::record(
        VERSION_RECORD,
        vec![
            RecordField::new(field::MAJOR_VERSION, AvroSchema::long()),
            RecordField::new(field::MINOR_VERSION, AvroSchema::long()),
        ],
    );
    let header = [
        (M::DATASET_WRITER_ID, field::DATASET_WRITER_ID, AvroSchema::int()),
        (M::SEQUENCE_NUMBER, field::SEQUENCE_NUMBER, AvroSchema::long()),
        (M::METADATA_VERSION, field::METADATA_VERSION, version),
        (M::TIMESTAMP, field::TIMESTAMP, timestamp_schema()),
        (M::STATUS, field::STATUS, status_schema()),
        (M::MESSAGE_TYPE, field::MESSAGE_TYPE, AvroSchema::string()),
        (M::DATASET_WRITER_NAME, field::DATASET_WRITER_NAME, AvroSchema::string()),
    ];
    let mut fields: Vec<RecordField> = header
        .into_iter()
        .filter(|(flag, _, _)| msg.content_mask.contains(*flag))
        .map(|(_, name, schema)| RecordField::new(name, schema.nullable()))
        .collect();
    fields.push(RecordField::new(field::PAYLOAD, payload));
    AvroSchema::record(DATASET_MESSAGE_RECORD, fields)
}

fn is_data_value_record(record: &RecordSchema) -> bool {
    record.name.ends_with(DATA_VALUE_SUFFIX) && record.has_field(field::VALUE)
}

fn data_value_mask(record: &RecordSchema) -> F {
    let mut mask = F::NONE;
    for (flag, name) in [
        (F::STATUS_CODE, field::STATUS_CODE),
        (F::SOURCE_TIMESTAMP, field::SOURCE_TIMESTAMP),
        (F::SOURCE_PICOSECONDS, field::SOURCE_PICOSECONDS),
        (F::SERVER_TIMESTAMP, field::SERVER_TIMESTAMP),
        (F::SERVER_PICOSECONDS, field::SERVER_PICOSECONDS),
    ] {
        mask.set(flag, record.has_field(name));
    }
    mask
}

// ============================================================================
// Value mapping
// ============================================================================

/// Select the null or value branch of a nullable schema.
fn wrap(schema: &AvroSchema, value: Option<AvroValue>) -> EncodeResult<AvroValue> {
    match schema {
        AvroSchema::Union(branches) => {
            let index = branches
                .iter()
                .position(|b| matches!(b, AvroSchema::Null) == value.is_none())
                .ok_or_else(|| EncodeError::AvroSchema(format!("no union branch for {:?}", value)))?;
            Ok(AvroValue::Union(index, Box::new(value.unwrap_or(AvroValue::Null))))
        }
        AvroSchema::Null if value.is_none() => Ok(AvroValue::Null),
        _ => value.ok_or_else(|| EncodeError::AvroSchema(format!("null for {}", schema.type_name()))),
    }
}

/// Resolve unions; `None` for null.
fn resolve_union(schema: &AvroSchema, value: AvroValue) -> Option<(&AvroSchema, AvroValue)> {
    match (schema, value) {
        (AvroSchema::Union(branches), AvroValue::Union(index, inner)) => {
            resolve_union(branches.get(index)?, *inner)
        }
        (_, AvroValue::Null) => None,
        (schema, value) => Some((schema, value)),
    }
}

fn union_value(schema: &AvroSchema, value: AvroValue) -> Option<AvroValue> {
    resolve_union(schema, value).map(|(_, v)| v)
}

fn record_values(record: &RecordSchema, value: AvroValue) -> DecodeResult<Vec<AvroValue>> {
    match value {
        AvroValue::Record(values) if values.len() == record.fields.len() => Ok(values),
        other => Err(DecodeError::Avro(format!(
            "{:?} is not a {} record",
            other, record.name
        ))),
    }
}

fn record_value<W>(record: &RecordSchema, mut f: W) -> EncodeResult<AvroValue>
where
    W: FnMut(&RecordField) -> EncodeResult<AvroValue>,
{
    record
        .fields
        .iter()
        .map(|field| f(field))
        .collect::<EncodeResult<Vec<_>>>()
        .map(AvroValue::Record)
}

fn micros(dt: &DateTime<Utc>) -> AvroValue {
    AvroValue::Long(dt.timestamp_micros())
}

fn from_micros(us: i64) -> DecodeResult<DateTime<Utc>> {
    DateTime::from_timestamp_micros(us)
        .ok_or_else(|| DecodeError::InvalidValue(format!("timestamp {} out of range", us)))
}

fn primitive_type(p: &Primitive) -> BuiltInType {
    if let Some(t) = p.built_in_type {
        return t;
    }
    match (p.kind, p.logical_type.as_deref()) {
        (PrimitiveKind::Boolean, _) => BuiltInType::Boolean,
        (PrimitiveKind::Int, _) => BuiltInType::Int32,
        (PrimitiveKind::Long, Some(TIMESTAMP_MICROS)) => BuiltInType::DateTime,
        (PrimitiveKind::Long, _) => BuiltInType::Int64,
        (PrimitiveKind::Float, _) => BuiltInType::Float,
        (PrimitiveKind::Double, _) => BuiltInType::Double,
        (PrimitiveKind::Bytes, _) => BuiltInType::ByteString,
        (PrimitiveKind::String, Some(UUID)) => BuiltInType::Guid,
        (PrimitiveKind::String, _) => BuiltInType::String,
    }
}

fn scalar_to_avro(value: &Variant, p: &Primitive) -> EncodeResult<AvroValue> {
    let expected = primitive_type(p).wire_type();
    if value.built_in_type().wire_type() != expected {
        return Err(EncodeError::TypeMismatch(format!(
            "{:?} value for {:?} field",
            value.built_in_type(),
            expected
        )));
    }
    let out_of_range = || EncodeError::TypeMismatch(format!("{:?} does not fit {}", value, p.kind.name()));
    Ok(match (p.kind, value) {
        (PrimitiveKind::Boolean, Variant::Boolean(b)) => AvroValue::Boolean(*b),
        (PrimitiveKind::Int, v) => AvroValue::Int(
            v.as_i64()
                .and_then(|i| i32::try_from(i).ok())
                .ok_or_else(out_of_range)?,
        ),
        // bit pattern preserved; the builtInType attribute restores the sign
        (PrimitiveKind::Long, Variant::UInt64(v)) => AvroValue::Long(*v as i64),
        (PrimitiveKind::Long, Variant::DateTime(dt)) => micros(dt),
        (PrimitiveKind::Long, v) => AvroValue::Long(v.as_i64().ok_or_else(out_of_range)?),
        (PrimitiveKind::Float, Variant::Float(v)) => AvroValue::Float(*v),
        (PrimitiveKind::Double, Variant::Double(v)) => AvroValue::Double(*v),
        (PrimitiveKind::Bytes, Variant::ByteString(v)) => AvroValue::Bytes(v.clone()),
        (PrimitiveKind::String, Variant::String(v)) => AvroValue::String(v.clone()),
        (PrimitiveKind::String, Variant::Guid(v)) => AvroValue::String(v.to_string()),
        (PrimitiveKind::String, Variant::NodeId(v)) => AvroValue::String(v.to_string()),
        _ => return Err(out_of_range()),
    })
}

fn avro_to_scalar(value: AvroValue, p: &Primitive) -> DecodeResult<Variant> {
    use BuiltInType as B;
    let t = primitive_type(p);
    let invalid = |v: &AvroValue| DecodeError::InvalidValue(format!("{:?} for {:?} field", v, t));
    macro_rules! narrow {
        ($variant:ident, $type:ty, $v:expr) => {
            Variant::$variant(<$type>::try_from($v).map_err(|_| invalid(&AvroValue::Long($v as i64)))?)
        };
    }
    Ok(match (t.wire_type(), value) {
        (B::Boolean, AvroValue::Boolean(b)) => Variant::Boolean(b),
        (B::SByte, AvroValue::Int(v)) => narrow!(SByte, i8, v),
        (B::Byte, AvroValue::Int(v)) => narrow!(Byte, u8, v),
        (B::Int16, AvroValue::Int(v)) => narrow!(Int16, i16, v),
        (B::UInt16, AvroValue::Int(v)) => narrow!(UInt16, u16, v),
        (B::Int32, AvroValue::Int(v)) => Variant::Int32(v),
        (B::UInt32, AvroValue::Long(v)) => narrow!(UInt32, u32, v),
        (B::Int64, AvroValue::Long(v)) => Variant::Int64(v),
        (B::UInt64, AvroValue::Long(v)) => Variant::UInt64(v as u64),
        (B::StatusCode, AvroValue::Long(v)) => Variant::StatusCode(StatusCode(
            u32::try_from(v).map_err(|_| invalid(&AvroValue::Long(v)))?,
        )),
        (B::Float, AvroValue::Float(v)) => Variant::Float(v),
        (B::Double, AvroValue::Double(v)) => Variant::Double(v),
        (B::String, AvroValue::String(s)) => Variant::String(s),
        (B::NodeId, AvroValue::String(s)) => Variant::NodeId(s.parse().map_err(DecodeError::InvalidValue)?),
        (B::DateTime, AvroValue::Long(v)) => Variant::DateTime(from_micros(v)?),
        (B::Guid, AvroValue::String(s)) => Variant::Guid(
            Uuid::parse_str(&s).map_err(|e| DecodeError::InvalidValue(format!("guid {}: {}", s, e)))?,
        ),
        (B::ByteString, AvroValue::Bytes(b)) => Variant::ByteString(b),
        (_, other) => return Err(invalid(&other)),
    })
}

/// Map a non-null variant onto the value branch of a field schema.
fn variant_to_avro(value: &Variant, schema: &AvroSchema) -> EncodeResult<AvroValue> {
    match (schema, value) {
        (AvroSchema::Record(r), _) if r.name == VARIANT_RECORD => {
            let mut w = BinaryWriter::new();
            write_variant(&mut w, value)?;
            Ok(AvroValue::Record(vec![
                AvroValue::Int(i32::from(value.built_in_type() as u8)),
                AvroValue::Bytes(w.into_inner()),
            ]))
        }
        (AvroSchema::Array(items), Variant::Array(_, elements)) => {
            let AvroSchema::Primitive(p) = items.as_ref() else {
                return Err(EncodeError::AvroSchema(format!("array of {}", items.type_name())));
            };
            elements
                .iter()
                .map(|e| scalar_to_avro(e, p))
                .collect::<EncodeResult<Vec<_>>>()
                .map(AvroValue::Array)
        }
        (AvroSchema::Primitive(p), v) if !v.is_array() => scalar_to_avro(v, p),
        (schema, v) => Err(EncodeError::TypeMismatch(format!(
            "{:?} for {} field",
            v.built_in_type(),
            schema.type_name()
        ))),
    }
}

fn avro_to_variant(value: AvroValue, schema: &AvroSchema, ctx: &CodecContext) -> DecodeResult<Variant> {
    match (schema, value) {
        (AvroSchema::Record(r), value) if r.name == VARIANT_RECORD => {
            let values = record_values(r, value)?;
            match values.into_iter().nth(1) {
                Some(AvroValue::Bytes(body)) => read_variant(&mut BinaryReader::new(&body), ctx),
                _ => Err(DecodeError::Avro("variant without body".into())),
            }
        }
        (AvroSchema::Array(items), AvroValue::Array(values)) => {
            let AvroSchema::Primitive(p) = items.as_ref() else {
                return Err(DecodeError::Avro(format!("array of {}", items.type_name())));
            };
            let elements = values
                .into_iter()
                .map(|v| avro_to_scalar(v, p))
                .collect::<DecodeResult<Vec<_>>>()?;
            Ok(Variant::Array(primitive_type(p), elements))
        }
        (AvroSchema::Primitive(p), value) => avro_to_scalar(value, p),
        (schema, value) => Err(DecodeError::Avro(format!(
            "{:?} is not a {}",
            value,
            schema.type_name()
        ))),
    }
}

fn data_value_to_avro(record: &RecordSchema, dv: &DataValue) -> EncodeResult<AvroValue> {
    record_value(record, |f| {
        let value = match f.name.as_str() {
            field::VALUE if dv.value.is_null() => None,
            field::VALUE => Some(variant_to_avro(&dv.value, f.schema.value_branch())?),
            field::STATUS_CODE => (!dv.status.is_good()).then_some(AvroValue::Long(i64::from(dv.status.0))),
            field::SOURCE_TIMESTAMP => dv.source_timestamp.as_ref().map(micros),
            field::SOURCE_PICOSECONDS => {
                (dv.source_picoseconds != 0).then_some(AvroValue::Int(i32::from(dv.source_picoseconds)))
            }
            field::SERVER_TIMESTAMP => dv.server_timestamp.as_ref().map(micros),
            field::SERVER_PICOSECONDS => {
                (dv.server_picoseconds != 0).then_some(AvroValue::Int(i32::from(dv.server_picoseconds)))
            }
            _ => None,
        };
        wrap(&f.schema, value)
    })
}

fn data_value_from_avro(record: &RecordSchema, value: AvroValue, ctx: &CodecContext) -> DecodeResult<DataValue> {
    let mut dv = DataValue::default();
    for (f, v) in record.fields.iter().zip(record_values(record, value)?) {
        let Some((schema, v)) = resolve_union(&f.schema, v) else {
            continue;
        };
        match (f.name.as_str(), v) {
            (field::VALUE, v) => dv.value = avro_to_variant(v, schema, ctx)?,
            (field::STATUS_CODE, AvroValue::Long(code)) => {
                dv.status = StatusCode(
                    u32::try_from(code).map_err(|_| DecodeError::InvalidValue(format!("status {}", code)))?,
                );
            }
            (field::SOURCE_TIMESTAMP, AvroValue::Long(us)) => dv.source_timestamp = Some(from_micros(us)?),
            (field::SERVER_TIMESTAMP, AvroValue::Long(us)) => dv.server_timestamp = Some(from_micros(us)?),
            (field::SOURCE_PICOSECONDS, AvroValue::Int(ps)) => {
                dv.source_picoseconds = u16::try_from(ps).map_err(|_| DecodeError::InvalidValue(format!("picoseconds {}", ps)))?;
            }
            (field::SERVER_PICOSECONDS, AvroValue::Int(ps)) => {
                dv.server_picoseconds = u16::try_from(ps).map_err(|_| DecodeError::InvalidValue(format!("picoseconds {}", ps)))?;
            }
            (name, v) => {
                return Err(DecodeError::InvalidValue(format!("{}: {:?}", name, v)));
            }
        }
    }
    Ok(dv)
}

fn field_to_avro(schema: &AvroSchema, dv: Option<&DataValue>) -> EncodeResult<AvroValue> {
    let value = match (schema.value_branch(), dv) {
        (_, None) => None,
        (AvroSchema::Record(r), Some(dv)) if is_data_value_record(r) => Some(data_value_to_avro(r, dv)?),
        (_, Some(dv)) if dv.value.is_null() => None,
        (branch, Some(dv)) => Some(variant_to_avro(&dv.value, branch)?),
    };
    wrap(schema, value)
}

fn payload_to_avro(record: &RecordSchema, payload: &DataSet) -> EncodeResult<AvroValue> {
    if let Some(name) = payload
        .names()
        .find(|name| !record.fields.iter().any(|f| f.display_name() == *name))
    {
        return Err(EncodeError::AvroSchema(format!("field {} is not in the schema", name)));
    }
    record_value(record, |f| field_to_avro(&f.schema, payload.get(f.display_name())))
}

fn payload_from_avro(record: &RecordSchema, value: AvroValue, ctx: &CodecContext) -> DecodeResult<DataSet> {
    let mut mask = F::NONE;
    let mut typed = false;
    let mut payload = DataSet::new(F::NONE);
    for (f, v) in record.fields.iter().zip(record_values(record, value)?) {
        match f.schema.value_branch() {
            AvroSchema::Record(r) if is_data_value_record(r) => mask |= data_value_mask(r),
            AvroSchema::Record(r) if r.name == VARIANT_RECORD => {}
            _ => typed = true,
        }
        let dv = match resolve_union(&f.schema, v) {
            None => None,
            Some((AvroSchema::Record(r), v)) if is_data_value_record(r) => {
                Some(data_value_from_avro(r, v, ctx)?)
            }
            Some((schema, v)) => Some(DataValue::from(avro_to_variant(v, schema, ctx)?)),
        };
        payload.push(f.display_name(), dv);
    }
    payload.field_mask = if !mask.is_empty() {
        mask
    } else if typed {
        F::RAW_DATA
    } else {
        F::NONE
    };
    Ok(payload)
}

fn dataset_to_avro(record: &RecordSchema, msg: &DataSetMessage) -> EncodeResult<AvroValue> {
    if record.name != DATASET_MESSAGE_RECORD {
        return payload_to_avro(record, &msg.payload);
    }
    record_value(record, |f| {
        let value = match f.name.as_str() {
            field::PAYLOAD => {
                let payload = f
                    .schema
                    .as_record()
                    .ok_or_else(|| EncodeError::AvroSchema("payload is not a record".into()))?;
                return payload_to_avro(payload, &msg.payload);
            }
            field::DATASET_WRITER_ID => Some(AvroValue::Int(i32::from(msg.writer_id))),
            field::SEQUENCE_NUMBER => Some(AvroValue::Long(i64::from(msg.sequence_number))),
            field::METADATA_VERSION => msg.metadata_version.map(|v| {
                AvroValue::Record(vec![
                    AvroValue::Long(i64::from(v.major_version)),
                    AvroValue::Long(i64::from(v.minor_version)),
                ])
            }),
            field::TIMESTAMP => msg.timestamp.as_ref().map(micros),
            field::STATUS => {
                let status = msg.effective_status();
                (!status.is_good()).then_some(AvroValue::Long(i64::from(status.0)))
            }
            field::MESSAGE_TYPE => Some(AvroValue::String(
                msg.message_type
                    .json_name()
                    .ok_or(EncodeError::InvalidMessageType(msg.message_type.as_str()))?
                    .to_string(),
            )),
            field::DATASET_WRITER_NAME => msg.writer_name.clone().map(AvroValue::String),
            _ => None,
        };
        wrap(&f.schema, value)
    })
}

fn dataset_from_avro(record: &RecordSchema, value: AvroValue, ctx: &CodecContext) -> DecodeResult<DataSetMessage> {
    match record.name.as_str() {
        DATASET_RECORD => {
            return Ok(DataSetMessage {
                payload: payload_from_avro(record, value, ctx)?,
                ..DataSetMessage::default()
            })
        }
        DATASET_MESSAGE_RECORD => {}
        _ => return Err(DecodeError::NotA("Avro dataset message")),
    }

    let invalid = |name: &str, v: &AvroValue| DecodeError::InvalidValue(format!("{}: {:?}", name, v));
    let mut msg = DataSetMessage::default();
    for (f, v) in record.fields.iter().zip(record_values(record, value)?) {
        let flag = match f.name.as_str() {
            field::DATASET_WRITER_ID => M::DATASET_WRITER_ID,
            field::SEQUENCE_NUMBER => M::SEQUENCE_NUMBER,
            field::METADATA_VERSION => M::METADATA_VERSION,
            field::TIMESTAMP => M::TIMESTAMP,
            field::STATUS => M::STATUS,
            field::MESSAGE_TYPE => M::MESSAGE_TYPE,
            field::DATASET_WRITER_NAME => M::DATASET_WRITER_NAME,
            field::PAYLOAD => {
                let payload = f
                    .schema
                    .as_record()
                    .ok_or_else(|| DecodeError::Avro("payload is not a record".into()))?;
                msg.payload = payload_from_avro(payload, v, ctx)?;
                continue;
            }
            _ => continue,
        };
        msg.content_mask.insert(flag);
        let Some(v) = union_value(&f.schema, v) else {
            continue;
        };
        match (f.name.as_str(), v) {
            (field::DATASET_WRITER_ID, AvroValue::Int(id)) => {
                msg.writer_id = u16::try_from(id).map_err(|_| invalid(&f.name, &AvroValue::Int(id)))?;
            }
            (field::SEQUENCE_NUMBER, AvroValue::Long(seq)) => {
                msg.sequence_number = u32::try_from(seq).map_err(|_| invalid(&f.name, &AvroValue::Long(seq)))?;
            }
            (field::METADATA_VERSION, AvroValue::Record(parts)) => match parts.as_slice() {
                [AvroValue::Long(major), AvroValue::Long(minor)] => {
                    let version = u32::try_from(*major)
                        .ok()
                        .zip(u32::try_from(*minor).ok())
                        .ok_or_else(|| DecodeError::InvalidValue(format!("metadata version {}.{}", major, minor)))?;
                    msg.metadata_version = Some(ConfigurationVersion::new(version.0, version.1));
                }
                _ => return Err(DecodeError::InvalidValue("metadata version".into())),
            },
            (field::TIMESTAMP, AvroValue::Long(us)) => msg.timestamp = Some(from_micros(us)?),
            (field::STATUS, AvroValue::Long(code)) => {
                msg.status = Some(StatusCode(
                    u32::try_from(code).map_err(|_| invalid(&f.name, &AvroValue::Long(code)))?,
                ));
            }
            (field::MESSAGE_TYPE, AvroValue::String(kind)) => {
                msg.message_type = MessageType::from_json_name(&kind)
                    .ok_or_else(|| DecodeError::InvalidValue(format!("message type {}", kind)))?;
            }
            (field::DATASET_WRITER_NAME, AvroValue::String(name)) => msg.writer_name = Some(name),
            (_, other) => return Err(invalid(&f.name, &other)),
        }
    }
    Ok(msg)
}

// ============================================================================
// AvroNetworkMessage
// ============================================================================

/// Avro network message and the schema its frames are written with.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AvroNetworkMessage {
    pub base: NetworkMessageBase,
    pub message_id: MessageIdSource,
    pub use_gzip_compression: bool,
    pub(crate) schema: Option<AvroSchema>,
}

impl AvroNetworkMessage {
    pub fn new(base: NetworkMessageBase) -> Self {
        Self {
            base,
            ..Self::default()
        }
    }

    /// Empty message ready to decode frames written with `schema`.
    pub fn from_schema_json(schema: &str) -> DecodeResult<Self> {
        Ok(Self {
            schema: Some(AvroSchema::parse(schema)?),
            ..Self::default()
        })
    }

    pub fn schema(&self) -> Option<&AvroSchema> {
        self.schema.as_ref()
    }

    pub fn set_schema(&mut self, schema: AvroSchema) {
        self.schema = Some(schema);
    }

    /// Schema text, once generated or set.
    pub fn schema_json(&self) -> Option<String> {
        self.schema.as_ref().map(AvroSchema::to_json_string)
    }

    fn has(&self, flag: NetworkMessageContentFlags) -> bool {
        self.base.content_mask.contains(flag)
    }

    /// Build the schema from the first dataset message.
    pub fn generate_schema(&self, resolver: Option<&dyn MetaDataResolver>) -> AvroSchema {
        let fallback = DataSetMessage::default();
        let first = self.base.messages.first().unwrap_or(&fallback);
        let metadata = resolver.and_then(|r| {
            let (major, minor) = first.resolver_version();
            r.resolve(first.writer_id, major, minor)
        });
        let dataset = dataset_schema(first, self.has(N::DATASET_MESSAGE_HEADER), metadata.as_deref());
        let messages = if self.base.is_single() {
            dataset
        } else {
            AvroSchema::array(dataset)
        };
        if !self.has(N::NETWORK_MESSAGE_HEADER) {
            return messages.with_namespace(NAMESPACE);
        }

        let mut fields = vec![
            RecordField::new(field::MESSAGE_ID, AvroSchema::string().nullable()),
            RecordField::new(field::MESSAGE_TYPE, AvroSchema::string().nullable()),
        ];
        if self.has(N::PUBLISHER_ID) {
            fields.push(RecordField::new(field::PUBLISHER_ID, AvroSchema::string().nullable()));
        }
        if self.has(N::DATASET_CLASS_ID) {
            fields.push(RecordField::new(
                field::DATASET_CLASS_ID,
                AvroSchema::string().with_logical_type(UUID).nullable(),
            ));
        }
        fields.push(RecordField::new(field::DATASET_WRITER_GROUP, AvroSchema::string().nullable()));
        fields.push(RecordField::new(field::MESSAGES, messages));
        AvroSchema::record(NETWORK_RECORD, fields).with_namespace(NAMESPACE)
    }

    // ========================================================================
    // Encode
    // ========================================================================

    fn messages_to_avro(&self, schema: &AvroSchema, messages: &[DataSetMessage]) -> EncodeResult<AvroValue> {
        match (schema, messages) {
            (AvroSchema::Array(items), _) => {
                let record = items
                    .as_record()
                    .ok_or_else(|| EncodeError::AvroSchema("messages are not records".into()))?;
                messages
                    .iter()
                    .map(|m| dataset_to_avro(record, m))
                    .collect::<EncodeResult<Vec<_>>>()
                    .map(AvroValue::Array)
            }
            (AvroSchema::Record(record), [single]) => dataset_to_avro(record, single),
            _ => Err(EncodeError::AvroSchema(format!(
                "{} dataset messages for a {} schema",
                messages.len(),
                schema.type_name()
            ))),
        }
    }

    fn network_to_avro(&self, schema: &AvroSchema, messages: &[DataSetMessage]) -> EncodeResult<AvroValue> {
        let record = match schema {
            AvroSchema::Record(r) if r.name == NETWORK_RECORD => r,
            other => return self.messages_to_avro(other, messages),
        };
        record_value(record, |f| {
            let value = match f.name.as_str() {
                field::MESSAGES => return self.messages_to_avro(&f.schema, messages),
                field::MESSAGE_ID => Some(AvroValue::String(self.message_id.next_id())),
                field::MESSAGE_TYPE => Some(AvroValue::String(message_type::DATA.to_string())),
                field::PUBLISHER_ID => self.base.publisher_id.clone().map(AvroValue::String),
                field::DATASET_CLASS_ID => (!self.base.data_set_class_id.is_nil())
                    .then(|| AvroValue::String(self.base.data_set_class_id.to_string())),
                field::DATASET_WRITER_GROUP => self
                    .base
                    .data_set_writer_group
                    .clone()
                    .filter(|g| !g.is_empty())
                    .map(AvroValue::String),
                _ => None,
            };
            wrap(&f.schema, value)
        })
    }

    fn encode_batch(&self, schema: &AvroSchema, messages: &[DataSetMessage]) -> EncodeResult<Vec<u8>> {
        let value = self.network_to_avro(schema, messages)?;
        let mut w = BinaryWriter::new();
        write_value(&mut w, schema, &value)?;
        let bytes = w.into_inner();
        if self.use_gzip_compression {
            return gzip(&bytes);
        }
        Ok(bytes)
    }

    /// Push the batch if it fits, else split it in halves and retry.
    fn encode_fitting(
        &self,
        schema: &AvroSchema,
        messages: &[DataSetMessage],
        max_chunk_size: usize,
        out: &mut Vec<Vec<u8>>,
    ) -> EncodeResult<()> {
        let frame = self.encode_batch(schema, messages)?;
        if frame.len() < max_chunk_size {
            out.push(frame);
        } else if messages.len() <= 1 {
            log::warn!(
                "[avro] message of {} bytes does not fit max chunk size {}, dropped",
                frame.len(),
                max_chunk_size
            );
            out.push(Vec::new());
        } else {
            let (left, right) = messages.split_at(messages.len() / 2);
            self.encode_fitting(schema, left, max_chunk_size, out)?;
            self.encode_fitting(schema, right, max_chunk_size, out)?;
        }
        Ok(())
    }

    fn encode_frames(&self, schema: &AvroSchema, max_chunk_size: usize) -> EncodeResult<Vec<Vec<u8>>> {
        let mut frames = Vec::new();
        let messages = &self.base.messages;
        if self.base.is_single() {
            for msg in messages {
                self.encode_fitting(schema, std::slice::from_ref(msg), max_chunk_size, &mut frames)?;
            }
        } else {
            self.encode_fitting(schema, messages, max_chunk_size, &mut frames)?;
        }
        Ok(frames)
    }

    // ========================================================================
    // Decode
    // ========================================================================

    fn read_messages(&mut self, schema: &AvroSchema, value: AvroValue, ctx: &CodecContext) -> DecodeResult<()> {
        match (schema, value) {
            (AvroSchema::Array(items), AvroValue::Array(values)) => {
                let record = items
                    .as_record()
                    .ok_or_else(|| DecodeError::Avro("messages are not records".into()))?;
                for v in values {
                    let msg = dataset_from_avro(record, v, ctx)?;
                    self.base.messages.push(msg);
                }
            }
            (AvroSchema::Record(record), value) => {
                self.base.content_mask.insert(N::SINGLE_DATASET_MESSAGE);
                let msg = dataset_from_avro(record, value, ctx)?;
                self.base.messages.push(msg);
            }
            (schema, _) => {
                return Err(DecodeError::Avro(format!("unexpected messages schema {}", schema.type_name())))
            }
        }
        let record = match schema {
            AvroSchema::Array(items) => items.as_record(),
            other => other.as_record(),
        };
        if record.is_some_and(|r| r.name == DATASET_MESSAGE_RECORD) {
            self.base.content_mask.insert(N::DATASET_MESSAGE_HEADER);
        }
        Ok(())
    }

    fn read_root(&mut self, schema: &AvroSchema, value: AvroValue, ctx: &CodecContext) -> DecodeResult<()> {
        let record = match schema {
            AvroSchema::Record(r) if r.name == NETWORK_RECORD => r,
            other => return self.read_messages(other, value, ctx),
        };
        self.base.content_mask.insert(N::NETWORK_MESSAGE_HEADER);
        let string = |f: &RecordField, v: AvroValue| -> DecodeResult<Option<String>> {
            match union_value(&f.schema, v) {
                None => Ok(None),
                Some(AvroValue::String(s)) => Ok(Some(s)),
                Some(other) => Err(DecodeError::InvalidValue(format!("{}: {:?}", f.name, other))),
            }
        };
        for (f, v) in record.fields.iter().zip(record_values(record, value)?) {
            match f.name.as_str() {
                field::MESSAGE_ID => {
                    if let Some(id) = string(f, v)? {
                        self.message_id = MessageIdSource::Fixed(id);
                    }
                }
                field::MESSAGE_TYPE => {
                    let kind = string(f, v)?;
                    if !kind.is_some_and(|k| k.eq_ignore_ascii_case(message_type::DATA)) {
                        return Err(DecodeError::NotA("Avro data network message"));
                    }
                }
                field::PUBLISHER_ID => {
                    self.base.content_mask.insert(N::PUBLISHER_ID);
                    self.base.publisher_id = string(f, v)?;
                }
                field::DATASET_CLASS_ID => {
                    self.base.content_mask.insert(N::DATASET_CLASS_ID);
                    if let Some(id) = string(f, v)? {
                        self.base.data_set_class_id = Uuid::parse_str(&id)
                            .map_err(|e| DecodeError::InvalidValue(format!("dataset class id {}: {}", id, e)))?;
                    }
                }
                field::DATASET_WRITER_GROUP => self.base.data_set_writer_group = string(f, v)?,
                field::MESSAGES => self.read_messages(&f.schema, v, ctx)?,
                _ => {}
            }
        }
        Ok(())
    }
}

impl MessageCodec for AvroNetworkMessage {
    fn content_type(&self) -> &'static str {
        if self.use_gzip_compression {
            content_type::AVRO_GZIP
        } else {
            content_type::AVRO
        }
    }

    fn message_schema(&self) -> &'static str {
        schema_uri::NETWORK_MESSAGE_AVRO
    }

    fn encode(
        &mut self,
        _ctx: &CodecContext,
        max_chunk_size: usize,
        resolver: Option<&dyn MetaDataResolver>,
    ) -> EncodeResult<Vec<Vec<u8>>> {
        let schema = match self.schema.take() {
            Some(schema) => schema,
            None => {
                let schema = self.generate_schema(resolver);
                log::debug!("[avro] generated schema {}", schema.to_json_string());
                schema
            }
        };
        let result = self.encode_frames(&schema, max_chunk_size);
        self.schema = Some(schema);
        let frames = result?;
        log::debug!(
            "[avro] encoded {} dataset messages into {} frames",
            self.base.messages.len(),
            frames.len()
        );
        Ok(frames)
    }

    fn try_decode(
        &mut self,
        ctx: &CodecContext,
        frames: &mut VecDeque<Vec<u8>>,
        _resolver: Option<&dyn MetaDataResolver>,
    ) -> DecodeResult<()> {
        let schema = self
            .schema
            .clone()
            .ok_or_else(|| DecodeError::Avro("no schema to decode with".into()))?;
        let frame = frames.front().ok_or(DecodeError::Truncated {
            offset: 0,
            needed: 1,
        })?;
        if frame.len() > ctx.max_message_size {
            return Err(DecodeError::LimitExceeded("message size"));
        }
        let inflated;
        let bytes = if self.use_gzip_compression {
            inflated = gunzip(frame, ctx.max_message_size)?;
            inflated.as_slice()
        } else {
            frame.as_slice()
        };

        let mut r = BinaryReader::new(bytes);
        let value = read_value(&mut r, &schema, ctx)?;
        if !r.is_eof() {
            return Err(DecodeError::Avro(format!(
                "{} trailing bytes after message",
                r.remaining()
            )));
        }
        let mut decoded = AvroNetworkMessage {
            use_gzip_compression: self.use_gzip_compression,
            ..AvroNetworkMessage::default()
        };
        decoded.read_root(&schema, value, ctx)?;
        decoded.schema = Some(schema);
        *self = decoded;
        frames.pop_front();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FieldMetaData, MetaDataStore, NodeId};
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 123_456_000).unwrap()
    }

    fn raw_payload() -> DataSet {
        let mut payload = DataSet::new(F::RAW_DATA)
            .with("temperature", Variant::Double(21.5))
            .with("count", Variant::UInt32(7))
            .with("big", Variant::UInt64(u64::MAX))
            .with("small", Variant::Int16(-3))
            .with("label", Variant::from("pump"))
            .with("when", Variant::DateTime(ts(1)))
            .with("id", Variant::Guid(Uuid::from_u128(42)))
            .with("node", Variant::NodeId(NodeId::new(2, 17)))
            .with("levels", Variant::Array(BuiltInType::Int32, vec![Variant::Int32(1), Variant::Int32(2)]));
        payload.push("missing", None);
        payload
    }

    fn header_message(writer_id: u16, payload: DataSet) -> DataSetMessage {
        DataSetMessage {
            content_mask: M::DATASET_WRITER_ID
                | M::SEQUENCE_NUMBER
                | M::METADATA_VERSION
                | M::TIMESTAMP
                | M::STATUS
                | M::MESSAGE_TYPE
                | M::DATASET_WRITER_NAME,
            writer_id,
            writer_name: Some(format!("Writer{}", writer_id)),
            metadata_version: Some(ConfigurationVersion::new(2, 1)),
            sequence_number: 99,
            timestamp: Some(ts(0)),
            status: Some(StatusCode::UNCERTAIN),
            message_type: MessageType::DeltaFrame,
            ..DataSetMessage::new(writer_id, payload)
        }
    }

    fn network(mask: N, messages: Vec<DataSetMessage>) -> AvroNetworkMessage {
        let mut base = NetworkMessageBase::new(mask, messages);
        base.publisher_id = Some("publisher-1".into());
        base.data_set_class_id = Uuid::from_u128(7);
        base.data_set_writer_group = Some("group".into());
        let mut msg = AvroNetworkMessage::new(base);
        msg.message_id = MessageIdSource::Fixed("id-1".into());
        msg
    }

    fn decode_with(schema: &str, frame: Vec<u8>, gzip: bool) -> DecodeResult<AvroNetworkMessage> {
        let mut out = AvroNetworkMessage::from_schema_json(schema)?;
        out.use_gzip_compression = gzip;
        let mut queue: VecDeque<Vec<u8>> = vec![frame].into();
        out.try_decode(&CodecContext::default(), &mut queue, None)?;
        assert!(queue.is_empty());
        Ok(out)
    }

    #[test]
    fn test_round_trip_with_headers() {
        let ctx = CodecContext::default();
        let mask = N::NETWORK_MESSAGE_HEADER
            | N::DATASET_MESSAGE_HEADER
            | N::PUBLISHER_ID
            | N::DATASET_CLASS_ID;
        let mut msg = network(
            mask,
            vec![header_message(1, raw_payload()), header_message(2, raw_payload())],
        );
        let frames = msg.encode(&ctx, 65536, None).unwrap();
        assert_eq!(frames.len(), 1);

        let schema = msg.schema_json().unwrap();
        let decoded = decode_with(&schema, frames[0].clone(), false).unwrap();
        assert_eq!(decoded.base, msg.base);
        assert_eq!(decoded.message_id, msg.message_id);
    }

    #[test]
    fn test_schema_shape() {
        let mut msg = network(N::NETWORK_MESSAGE_HEADER | N::DATASET_MESSAGE_HEADER, vec![header_message(1, raw_payload())]);
        msg.encode(&CodecContext::default(), 65536, None).unwrap();
        let schema: serde_json::Value = serde_json::from_str(&msg.schema_json().unwrap()).unwrap();
        assert_eq!(schema["name"], "NetworkMessage");
        assert_eq!(schema["namespace"], NAMESPACE);
        let names: Vec<&str> = schema["fields"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, ["MessageId", "MessageType", "DataSetWriterGroup", "Messages"]);

        let dataset = &schema["fields"][3]["type"]["items"];
        let header: Vec<&str> = dataset["fields"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["name"].as_str().unwrap())
            .collect();
        assert_eq!(
            header,
            [
                "DataSetWriterId",
                "SequenceNumber",
                "MetaDataVersion",
                "Timestamp",
                "Status",
                "MessageType",
                "DataSetWriterName",
                "Payload"
            ]
        );
        let temperature = &dataset["fields"][7]["type"]["fields"][0];
        assert_eq!(temperature["type"][0], "null");
        assert_eq!(temperature["type"][1]["type"], "double");
        assert_eq!(temperature["type"][1]["builtInType"], 11);
    }

    #[test]
    fn test_data_value_mode_round_trip() {
        let mask = F::STATUS_CODE | F::SOURCE_TIMESTAMP | F::SERVER_PICOSECONDS;
        let mut payload = DataSet::new(mask);
        payload.push(
            "flow rate",
            Some(
                DataValue::new(12.5f64)
                    .with_status(StatusCode::BAD_OUT_OF_RANGE)
                    .with_source_timestamp(ts(2), 0)
                    .with_server_timestamp(ts(3), 0),
            ),
        );
        payload.push("valve", Some(DataValue::new(true)));
        let mut expected = payload.clone();
        // server timestamp is not in the mask
        expected.push(
            "flow rate",
            Some(
                DataValue::new(12.5f64)
                    .with_status(StatusCode::BAD_OUT_OF_RANGE)
                    .with_source_timestamp(ts(2), 0),
            ),
        );

        let mut msg = network(N::SINGLE_DATASET_MESSAGE, vec![DataSetMessage::new(0, payload)]);
        let frames = msg.encode(&CodecContext::default(), 65536, None).unwrap();
        let schema = msg.schema_json().unwrap();
        assert!(schema.contains("flow_rateDataValue"));
        assert!(schema.contains(r#""originalName":"flow rate""#));

        let decoded = decode_with(&schema, frames[0].clone(), false).unwrap();
        assert!(decoded.base.is_single());
        assert_eq!(decoded.base.messages.len(), 1);
        assert_eq!(decoded.base.messages[0].payload, expected);
        assert_eq!(decoded.base.messages[0].payload.field_mask, mask);
    }

    #[test]
    fn test_untyped_fields_use_variant_record() {
        let payload = DataSet::new(F::NONE)
            .with("a", Variant::Int32(5))
            .with("b", Variant::from("x"));
        let mut msg = network(N::NONE, vec![DataSetMessage::new(0, payload.clone())]);
        let frames = msg.encode(&CodecContext::default(), 65536, None).unwrap();
        let schema = msg.schema_json().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&schema).unwrap();
        assert_eq!(parsed["type"], "array");
        assert_eq!(parsed["items"]["fields"][0]["type"][1]["name"], "Variant");
        assert_eq!(parsed["items"]["fields"][1]["type"][1], "Variant");

        let decoded = decode_with(&schema, frames[0].clone(), false).unwrap();
        assert_eq!(decoded.base.messages[0].payload, payload);
    }

    #[test]
    fn test_metadata_types_the_schema() {
        let store = MetaDataStore::new();
        let mut md = DataSetMetaData::new(
            "pump",
            vec![
                FieldMetaData::scalar("speed", BuiltInType::Float),
                FieldMetaData::array("codes", BuiltInType::UInt16),
            ],
        );
        md.configuration_version = ConfigurationVersion::new(1, 0);
        store.insert(4, md);

        let mut payload = DataSet::new(F::RAW_DATA);
        payload.push("speed", None);
        payload.push("codes", None);
        let mut msg = network(N::NONE, vec![DataSetMessage::new(4, payload)]);
        msg.encode(&CodecContext::default(), 65536, Some(&store)).unwrap();
        let schema: serde_json::Value = serde_json::from_str(&msg.schema_json().unwrap()).unwrap();
        assert_eq!(schema["items"]["fields"][0]["type"][1]["type"], "float");
        assert_eq!(schema["items"]["fields"][1]["type"][1]["type"], "array");
        assert_eq!(schema["items"]["fields"][1]["type"][1]["items"]["builtInType"], 5);
    }

    #[test]
    fn test_type_mismatch_against_schema() {
        let first = DataSetMessage::new(1, DataSet::new(F::RAW_DATA).with("v", Variant::Double(1.0)));
        let second = DataSetMessage::new(1, DataSet::new(F::RAW_DATA).with("v", Variant::from("text")));
        let mut msg = network(N::NONE, vec![first, second]);
        assert!(matches!(
            msg.encode(&CodecContext::default(), 65536, None),
            Err(EncodeError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_single_message_per_frame_and_gzip() {
        let messages: Vec<_> = (1..=3).map(|i| header_message(i, raw_payload())).collect();
        let mut msg = network(N::DATASET_MESSAGE_HEADER | N::SINGLE_DATASET_MESSAGE, messages);
        msg.use_gzip_compression = true;
        assert_eq!(msg.content_type(), content_type::AVRO_GZIP);
        let frames = msg.encode(&CodecContext::default(), 65536, None).unwrap();
        assert_eq!(frames.len(), 3);

        let schema = msg.schema_json().unwrap();
        for (i, frame) in frames.into_iter().enumerate() {
            let decoded = decode_with(&schema, frame, true).unwrap();
            assert_eq!(decoded.base.messages[0].writer_id, i as u16 + 1);
            assert!(decoded.base.content_mask.contains(N::DATASET_MESSAGE_HEADER));
        }
    }

    #[test]
    fn test_oversize_batch_is_bisected() {
        let messages: Vec<_> = (1..=4).map(|i| header_message(i, raw_payload())).collect();
        let mut msg = network(N::DATASET_MESSAGE_HEADER, messages);
        let whole = msg.encode(&CodecContext::default(), usize::MAX, None).unwrap();
        let limit = whole[0].len() / 2;
        let frames = msg.encode(&CodecContext::default(), limit, None).unwrap();
        assert!(frames.len() >= 2);
        assert!(frames.iter().all(|f| !f.is_empty() && f.len() < limit));

        let frames = msg.encode(&CodecContext::default(), 8, None).unwrap();
        assert_eq!(frames, vec![Vec::<u8>::new(); 4]);
    }

    #[test]
    fn test_decode_requires_schema() {
        let mut out = AvroNetworkMessage::default();
        let mut queue: VecDeque<Vec<u8>> = vec![vec![0u8]].into();
        assert!(out.try_decode(&CodecContext::default(), &mut queue, None).is_err());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut msg = network(N::NONE, vec![DataSetMessage::new(0, raw_payload())]);
        let mut frames = msg.encode(&CodecContext::default(), 65536, None).unwrap();
        frames[0].push(0);
        let schema = msg.schema_json().unwrap();
        assert!(decode_with(&schema, frames.remove(0), false).is_err());
    }
}
