// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UADP dataset message encoding.
//!
//! Layout:
//!
//! ```text
//! DataSetFlags1 | [DataSetFlags2] | [seq u16] | [timestamp i64] | [pico u16]
//!   | [status u16] | [major u32] | [minor u32] | payload
//! ```
//!
//! Key frames carry every field positionally. Delta frames and keep-alives
//! carry `(index, value)` pairs for the non-null fields only.

use super::flags::{DataSetFlags, DataSetFlags1, DataSetFlags2, FieldEncoding};
use crate::binary::codec::{
    datetime_to_ticks, read_data_value, read_raw_field, read_variant, ticks_to_datetime,
    write_data_value, write_raw_field, write_variant,
};
use crate::binary::{BinaryReader, BinaryWriter};
use crate::config::CodecContext;
use crate::error::{DecodeError, DecodeResult, EncodeError, EncodeResult};
use crate::flags::DataSetFieldContentFlags;
use crate::message::DataSetMessage;
use crate::types::{
    ConfigurationVersion, DataSet, DataSetMetaData, DataValue, MetaDataResolver, StatusCode,
    Variant,
};
use std::sync::Arc;

/// Append one dataset message to `w`.
pub fn encode(
    w: &mut BinaryWriter,
    msg: &DataSetMessage,
    resolver: Option<&dyn MetaDataResolver>,
) -> EncodeResult<()> {
    let flags = DataSetFlags::derive(msg)?;
    flags.write(w);

    let (major, minor) = msg.resolver_version();
    if flags.flags1.has(DataSetFlags1::SEQUENCE_NUMBER) {
        w.write_u16(msg.sequence_number as u16);
    }
    if flags.flags2.has(DataSetFlags2::TIMESTAMP) {
        w.write_i64(msg.timestamp.as_ref().map_or(0, datetime_to_ticks));
    }
    if flags.flags2.has(DataSetFlags2::PICOSECONDS) {
        w.write_u16(msg.picoseconds);
    }
    if flags.flags1.has(DataSetFlags1::STATUS) {
        w.write_u16((msg.effective_status().code() >> 16) as u16);
    }
    if flags.flags1.has(DataSetFlags1::MAJOR_VERSION) {
        w.write_u32(major);
    }
    if flags.flags1.has(DataSetFlags1::MINOR_VERSION) {
        w.write_u32(minor);
    }

    let encoding = FieldEncoding::from_field_mask(msg.payload.field_mask);
    let metadata = resolver.and_then(|r| r.resolve(msg.writer_id, major, minor));
    if encoding == FieldEncoding::RawData && metadata.is_none() {
        return Err(EncodeError::MissingMetaData);
    }

    if flags.is_delta_payload() {
        encode_delta(w, &msg.payload, encoding, metadata.as_deref())
    } else {
        encode_key(w, &msg.payload, encoding, metadata.as_deref())
    }
}

fn field_count(len: usize) -> EncodeResult<u16> {
    u16::try_from(len).map_err(|_| EncodeError::TooManyFields(len))
}

fn encode_key(
    w: &mut BinaryWriter,
    payload: &DataSet,
    encoding: FieldEncoding,
    metadata: Option<&DataSetMetaData>,
) -> EncodeResult<()> {
    match (encoding, metadata) {
        (FieldEncoding::RawData, Some(metadata)) => {
            for (pos, field) in metadata.fields.iter().enumerate() {
                let value = payload
                    .get(&field.name)
                    .or_else(|| payload.value_at(pos))
                    .map_or(&Variant::Null, |dv| &dv.value);
                write_raw_field(w, field, value)?;
            }
            Ok(())
        }
        (FieldEncoding::RawData, None) => Err(EncodeError::MissingMetaData),
        (FieldEncoding::Variant, _) => {
            w.write_u16(field_count(payload.len())?);
            for (_, value) in payload.iter() {
                write_variant(w, value.map_or(&Variant::Null, |dv| &dv.value))?;
            }
            Ok(())
        }
        (FieldEncoding::DataValue, _) => {
            w.write_u16(field_count(payload.len())?);
            let empty = DataValue::default();
            for (_, value) in payload.iter() {
                write_data_value(w, value.unwrap_or(&empty), payload.field_mask)?;
            }
            Ok(())
        }
    }
}

fn encode_delta(
    w: &mut BinaryWriter,
    payload: &DataSet,
    encoding: FieldEncoding,
    metadata: Option<&DataSetMetaData>,
) -> EncodeResult<()> {
    let present: Vec<(usize, &str, &DataValue)> = payload
        .iter()
        .enumerate()
        .filter_map(|(pos, (name, value))| {
            value
                .filter(|v| !v.value.is_null())
                .map(|v| (pos, name, v))
        })
        .collect();
    w.write_u16(field_count(present.len())?);

    for (pos, name, value) in present {
        let index = match metadata {
            Some(md) => md.field_index(name).unwrap_or(md.fields.len() + pos),
            None => pos,
        };
        w.write_u16(field_count(index)?);
        match encoding {
            FieldEncoding::Variant => write_variant(w, &value.value)?,
            FieldEncoding::DataValue => write_data_value(w, value, payload.field_mask)?,
            FieldEncoding::RawData => {
                let field = metadata
                    .and_then(|md| md.fields.get(index))
                    .ok_or(EncodeError::MissingMetaData)?;
                write_raw_field(w, field, &value.value)?;
            }
        }
    }
    Ok(())
}

/// Read one dataset message. `writer_id` comes from the payload header.
pub fn decode(
    r: &mut BinaryReader<'_>,
    ctx: &CodecContext,
    writer_id: u16,
    resolver: Option<&dyn MetaDataResolver>,
) -> DecodeResult<DataSetMessage> {
    let flags = DataSetFlags::read(r)?;
    if !flags.flags1.has(DataSetFlags1::VALID) {
        return Err(DecodeError::InvalidFlags("dataset message not valid".into()));
    }
    let encoding = flags.field_encoding()?;

    let mut msg = DataSetMessage {
        content_mask: flags.content_mask(),
        message_type: flags.message_type()?,
        writer_id,
        ..DataSetMessage::default()
    };

    if flags.flags1.has(DataSetFlags1::SEQUENCE_NUMBER) {
        msg.sequence_number = u32::from(r.read_u16()?);
    }
    if flags.flags2.has(DataSetFlags2::TIMESTAMP) {
        let ticks = r.read_i64()?;
        msg.timestamp = (ticks != 0).then(|| ticks_to_datetime(ticks));
    }
    if flags.flags2.has(DataSetFlags2::PICOSECONDS) {
        msg.picoseconds = r.read_u16()?;
    }
    if flags.flags1.has(DataSetFlags1::STATUS) {
        msg.status = Some(StatusCode(u32::from(r.read_u16()?) << 16));
    }
    let major = if flags.flags1.has(DataSetFlags1::MAJOR_VERSION) {
        Some(r.read_u32()?)
    } else {
        None
    };
    let minor = if flags.flags1.has(DataSetFlags1::MINOR_VERSION) {
        Some(r.read_u32()?)
    } else {
        None
    };
    if major.is_some() || minor.is_some() {
        msg.metadata_version = Some(ConfigurationVersion::new(
            major.unwrap_or(0),
            minor.unwrap_or(1),
        ));
    }

    let major = major.filter(|v| *v != 0).unwrap_or(1);
    let minor = minor.unwrap_or(0);
    let metadata = resolver.and_then(|res| res.resolve(writer_id, major, minor));
    if encoding == FieldEncoding::RawData && metadata.is_none() {
        return Err(DecodeError::MissingMetaData {
            writer_id,
            major,
            minor,
        });
    }

    msg.payload = if flags.is_delta_payload() {
        decode_delta(r, ctx, encoding, metadata)?
    } else {
        decode_key(r, ctx, encoding, metadata)?
    };
    Ok(msg)
}

fn decoded_mask(encoding: FieldEncoding) -> DataSetFieldContentFlags {
    match encoding {
        FieldEncoding::Variant => DataSetFieldContentFlags::NONE,
        FieldEncoding::RawData => DataSetFieldContentFlags::RAW_DATA,
        FieldEncoding::DataValue => DataSetFieldContentFlags::data_value_fields(),
    }
}

fn decode_value(
    r: &mut BinaryReader<'_>,
    ctx: &CodecContext,
    encoding: FieldEncoding,
) -> DecodeResult<Option<DataValue>> {
    Ok(match encoding {
        FieldEncoding::DataValue => {
            let dv = read_data_value(r, ctx)?;
            (dv != DataValue::default()).then_some(dv)
        }
        _ => {
            let v = read_variant(r, ctx)?;
            (!v.is_null()).then(|| DataValue::new(v))
        }
    })
}

fn decode_key(
    r: &mut BinaryReader<'_>,
    ctx: &CodecContext,
    encoding: FieldEncoding,
    metadata: Option<Arc<DataSetMetaData>>,
) -> DecodeResult<DataSet> {
    let mut payload = DataSet::new(decoded_mask(encoding));
    if encoding == FieldEncoding::RawData {
        let metadata = metadata.ok_or(DecodeError::InvalidValue("raw data without metadata".into()))?;
        for field in &metadata.fields {
            let value = read_raw_field(r, ctx, field)?;
            payload.push(field.name.clone(), Some(DataValue::new(value)));
        }
        return Ok(payload);
    }

    let count = usize::from(r.read_u16()?);
    for index in 0..count {
        let value = decode_value(r, ctx, encoding)?;
        let name = metadata
            .as_ref()
            .and_then(|md| md.fields.get(index))
            .map_or_else(|| index.to_string(), |f| f.name.clone());
        payload.push(name, value);
    }
    Ok(payload)
}

fn decode_delta(
    r: &mut BinaryReader<'_>,
    ctx: &CodecContext,
    encoding: FieldEncoding,
    metadata: Option<Arc<DataSetMetaData>>,
) -> DecodeResult<DataSet> {
    let mut payload = DataSet::new(decoded_mask(encoding));
    let count = r.read_u16()?;
    for _ in 0..count {
        let index = usize::from(r.read_u16()?);
        let field = metadata.as_ref().and_then(|md| md.fields.get(index));
        let value = if encoding == FieldEncoding::RawData {
            let field = field.ok_or_else(|| {
                DecodeError::InvalidValue(format!("delta index {} outside metadata", index))
            })?;
            Some(DataValue::new(read_raw_field(r, ctx, field)?))
        } else {
            decode_value(r, ctx, encoding)?
        };
        let name = field.map_or_else(|| index.to_string(), |f| f.name.clone());
        payload.push(name, value);
    }
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::DataSetMessageContentFlags;
    use crate::message::MessageType;
    use crate::types::{BuiltInType, FieldMetaData, MetaDataStore};
    use chrono::{TimeZone, Utc};

    type M = DataSetMessageContentFlags;
    type F = DataSetFieldContentFlags;

    fn metadata() -> DataSetMetaData {
        DataSetMetaData::new(
            "machine",
            vec![
                FieldMetaData::scalar("speed", BuiltInType::Double),
                FieldMetaData::scalar("count", BuiltInType::Int32),
                FieldMetaData::array("tags", BuiltInType::String),
            ],
        )
    }

    fn store() -> MetaDataStore {
        let store = MetaDataStore::new();
        store.insert(7, metadata());
        store
    }

    fn round_trip(msg: &DataSetMessage, resolver: Option<&dyn MetaDataResolver>) -> DataSetMessage {
        let mut w = BinaryWriter::new();
        encode(&mut w, msg, resolver).unwrap();
        let bytes = w.into_inner();
        let mut r = BinaryReader::new(&bytes);
        let out = decode(&mut r, &CodecContext::default(), msg.writer_id, resolver).unwrap();
        assert!(r.is_eof());
        out
    }

    #[test]
    fn test_minimal_variant_key_frame() {
        let msg = DataSetMessage::new(1, DataSet::default().with("x", 42i32));
        let mut w = BinaryWriter::new();
        encode(&mut w, &msg, None).unwrap();
        // flags1, count, variant(Int32)
        assert_eq!(w.as_slice(), &[0x01, 0x01, 0x00, 0x06, 42, 0, 0, 0]);

        let out = round_trip(&msg, None);
        assert_eq!(out.payload.get("0"), Some(&DataValue::new(42i32)));
    }

    #[test]
    fn test_header_fields_round_trip() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let msg = DataSetMessage {
            content_mask: M::SEQUENCE_NUMBER
                | M::TIMESTAMP
                | M::PICOSECONDS
                | M::STATUS
                | M::MAJOR_VERSION
                | M::MINOR_VERSION,
            writer_id: 7,
            sequence_number: 300,
            timestamp: Some(ts),
            picoseconds: 12,
            status: Some(StatusCode::UNCERTAIN),
            metadata_version: Some(ConfigurationVersion::new(3, 2)),
            payload: DataSet::default().with("a", true),
            ..DataSetMessage::default()
        };
        let out = round_trip(&msg, None);
        assert_eq!(out.content_mask, msg.content_mask);
        assert_eq!(out.sequence_number, 300);
        assert_eq!(out.timestamp, Some(ts));
        assert_eq!(out.picoseconds, 12);
        assert_eq!(out.status, Some(StatusCode::UNCERTAIN));
        assert_eq!(out.metadata_version, Some(ConfigurationVersion::new(3, 2)));
    }

    #[test]
    fn test_omitted_header_fields_decode_to_defaults() {
        let msg = DataSetMessage {
            writer_id: 3,
            sequence_number: 99,
            status: Some(StatusCode::BAD),
            payload: DataSet::default().with("a", 1u8),
            ..DataSetMessage::default()
        };
        let out = round_trip(&msg, None);
        assert_eq!(out.sequence_number, 0);
        assert_eq!(out.status, None);
        assert_eq!(out.metadata_version, None);
        assert_eq!(out.message_type, MessageType::KeyFrame);
    }

    #[test]
    fn test_data_value_mode() {
        let ts = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let payload = DataSet::new(F::STATUS_CODE | F::SOURCE_TIMESTAMP)
            .with(
                "speed",
                DataValue::new(1.5f64)
                    .with_status(StatusCode::UNCERTAIN)
                    .with_source_timestamp(ts, 0),
            )
            .with("count", 4i32);
        let msg = DataSetMessage::new(7, payload);
        let resolver = store();
        let out = round_trip(&msg, Some(&resolver));
        assert_eq!(out.payload.get("speed"), msg.payload.get("speed"));
        assert_eq!(out.payload.get("count"), Some(&DataValue::new(4i32)));
    }

    #[test]
    fn test_raw_data_requires_metadata() {
        let msg = DataSetMessage::new(7, DataSet::new(F::RAW_DATA).with("speed", 1.0f64));
        let mut w = BinaryWriter::new();
        assert!(matches!(
            encode(&mut w, &msg, None),
            Err(EncodeError::MissingMetaData)
        ));

        let resolver = store();
        let mut w = BinaryWriter::new();
        encode(&mut w, &msg, Some(&resolver)).unwrap();
        let bytes = w.into_inner();
        let err = decode(
            &mut BinaryReader::new(&bytes),
            &CodecContext::default(),
            7,
            None,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            DecodeError::MissingMetaData {
                writer_id: 7,
                major: 1,
                minor: 0
            }
        ));
    }

    #[test]
    fn test_raw_data_key_frame_fills_missing_fields() {
        let payload = DataSet::new(F::RAW_DATA)
            .with("count", 9i32)
            .with("speed", 2.5f64);
        let msg = DataSetMessage::new(7, payload);
        let resolver = store();
        let out = round_trip(&msg, Some(&resolver));
        let names: Vec<&str> = out.payload.names().collect();
        assert_eq!(names, ["speed", "count", "tags"]);
        assert_eq!(out.payload.get("speed"), Some(&DataValue::new(2.5f64)));
        assert_eq!(out.payload.get("count"), Some(&DataValue::new(9i32)));
        assert_eq!(
            out.payload.get("tags").map(|dv| &dv.value),
            Some(&Variant::Null)
        );
    }

    #[test]
    fn test_delta_frame_indices() {
        let mut payload = DataSet::default().with("count", 5i32);
        payload.push("speed", None);
        payload.push("extra", Some(DataValue::new("x")));
        let msg = DataSetMessage {
            message_type: MessageType::DeltaFrame,
            writer_id: 7,
            payload,
            ..DataSetMessage::default()
        };
        let resolver = store();
        let mut w = BinaryWriter::new();
        encode(&mut w, &msg, Some(&resolver)).unwrap();
        let bytes = w.into_inner();
        // flags1, flags2, count 2, index 1 (count), ..., index 3 + 2 (extra)
        assert_eq!(&bytes[..6], &[0x81, 0x01, 0x02, 0x00, 0x01, 0x00]);

        let out = decode(
            &mut BinaryReader::new(&bytes),
            &CodecContext::default(),
            7,
            Some(&resolver),
        )
        .unwrap();
        assert_eq!(out.message_type, MessageType::DeltaFrame);
        assert_eq!(out.payload.get("count"), Some(&DataValue::new(5i32)));
        assert_eq!(out.payload.get("5"), Some(&DataValue::new("x")));
        assert_eq!(out.payload.len(), 2);
    }

    #[test]
    fn test_delta_frame_skips_null_values() {
        let mut payload = DataSet::default().with("a", 5i32);
        payload.push(
            "b",
            Some(DataValue::new(Variant::Null).with_status(StatusCode::BAD_NOT_SUPPORTED)),
        );
        let msg = DataSetMessage {
            message_type: MessageType::DeltaFrame,
            writer_id: 3,
            payload,
            ..DataSetMessage::default()
        };
        let mut w = BinaryWriter::new();
        encode(&mut w, &msg, None).unwrap();
        // flags1, flags2, count 1, index 0
        assert_eq!(&w.as_slice()[..6], &[0x81, 0x01, 0x01, 0x00, 0x00, 0x00]);

        let out = round_trip(&msg, None);
        assert_eq!(out.payload.len(), 1);
        assert_eq!(out.payload.get("0"), Some(&DataValue::new(5i32)));
    }

    #[test]
    fn test_delta_and_key_frame_agree() {
        let payload = DataSet::new(F::RAW_DATA)
            .with("speed", 3.0f64)
            .with("count", 1i32)
            .with(
                "tags",
                Variant::Array(BuiltInType::String, vec![Variant::from("a")]),
            );
        let key = DataSetMessage::new(7, payload.clone());
        let delta = DataSetMessage {
            message_type: MessageType::DeltaFrame,
            ..key.clone()
        };
        let resolver = store();
        let key_out = round_trip(&key, Some(&resolver));
        let delta_out = round_trip(&delta, Some(&resolver));
        assert_eq!(key_out.payload, delta_out.payload);
        assert_eq!(key_out.payload, payload);
    }

    #[test]
    fn test_keep_alive_has_empty_delta_payload() {
        let msg = DataSetMessage {
            message_type: MessageType::KeepAlive,
            content_mask: M::SEQUENCE_NUMBER,
            sequence_number: 4,
            ..DataSetMessage::default()
        };
        let mut w = BinaryWriter::new();
        encode(&mut w, &msg, None).unwrap();
        assert_eq!(w.as_slice(), &[0x89, 0x03, 0x04, 0x00, 0x00, 0x00]);
        let out = round_trip(&msg, None);
        assert_eq!(out.message_type, MessageType::KeepAlive);
        assert!(out.payload.is_empty());
    }

    #[test]
    fn test_truncated_payload_fails() {
        let msg = DataSetMessage::new(1, DataSet::default().with("x", 42i32));
        let mut w = BinaryWriter::new();
        encode(&mut w, &msg, None).unwrap();
        let bytes = w.into_inner();
        assert!(matches!(
            decode(
                &mut BinaryReader::new(&bytes[..bytes.len() - 1]),
                &CodecContext::default(),
                1,
                None
            ),
            Err(DecodeError::Truncated { .. })
        ));
    }
}
