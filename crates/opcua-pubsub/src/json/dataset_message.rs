// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! JSON DataSetMessage.
//!
//! With a header the message is an object of header fields followed by
//! `Payload`; without one it is the payload object alone. Decoding is
//! self-describing: the fields present set the content mask bits.

use super::value::{
    field_from_json, field_to_json, format_datetime, get_ci, parse_datetime, status_from_json,
    status_to_json, ValueOptions,
};
use crate::config::{field, CodecContext};
use crate::error::{DecodeError, DecodeResult, EncodeError, EncodeResult};
use crate::flags::{DataSetFieldContentFlags, DataSetMessageContentFlags};
use crate::message::{DataSetMessage, MessageType};
use crate::types::{ConfigurationVersion, DataSet};
use serde_json::{json, Map, Value};

type M = DataSetMessageContentFlags;

// ============================================================================
// Encode
// ============================================================================

fn payload_to_json(msg: &DataSetMessage, ctx: &CodecContext, advanced: bool) -> EncodeResult<Value> {
    let opts = ValueOptions {
        ctx,
        reversible: msg.content_mask.contains(M::REVERSIBLE_FIELD_ENCODING),
        advanced,
    };
    let mut obj = Map::new();
    for (name, value) in msg.payload.iter() {
        obj.insert(
            name.to_string(),
            field_to_json(value, msg.payload.field_mask, &opts)?,
        );
    }
    Ok(Value::Object(obj))
}

/// Encode `msg`, with or without the header fields.
pub fn encode(
    msg: &DataSetMessage,
    with_header: bool,
    ctx: &CodecContext,
    advanced: bool,
) -> EncodeResult<Value> {
    let payload = payload_to_json(msg, ctx, advanced)?;
    if !with_header {
        return Ok(payload);
    }

    let mask = msg.content_mask;
    let compat = msg.use_compatibility_mode;
    let mut obj = Map::new();
    if mask.contains(M::DATASET_WRITER_ID) {
        let id = match (&msg.writer_name, compat) {
            (Some(name), true) => json!(name),
            _ => json!(msg.writer_id),
        };
        obj.insert(field::DATASET_WRITER_ID.into(), id);
    }
    if mask.contains(M::SEQUENCE_NUMBER) {
        obj.insert(field::SEQUENCE_NUMBER.into(), json!(msg.sequence_number));
    }
    if mask.contains(M::METADATA_VERSION) {
        obj.insert(
            field::METADATA_VERSION.into(),
            serde_json::to_value(msg.metadata_version.unwrap_or_default())?,
        );
    }
    if let (true, Some(ts)) = (mask.contains(M::TIMESTAMP), &msg.timestamp) {
        obj.insert(field::TIMESTAMP.into(), json!(format_datetime(ts)));
    }
    if mask.contains(M::STATUS) {
        let status = msg.effective_status();
        if !status.is_good() {
            obj.insert(field::STATUS.into(), status_to_json(status, !compat));
        }
    }
    if mask.contains(M::MESSAGE_TYPE) {
        let name = msg
            .message_type
            .json_name()
            .ok_or(EncodeError::InvalidMessageType(msg.message_type.as_str()))?;
        obj.insert(field::MESSAGE_TYPE.into(), json!(name));
    }
    if let (true, false, Some(name)) = (
        mask.contains(M::DATASET_WRITER_NAME),
        compat,
        &msg.writer_name,
    ) {
        obj.insert(field::DATASET_WRITER_NAME.into(), json!(name));
    }
    obj.insert(field::PAYLOAD.into(), payload);
    Ok(Value::Object(obj))
}

// ============================================================================
// Decode
// ============================================================================

/// Payload fields in wire order plus whether reversible encoding was seen.
fn payload_from_json(map: &Map<String, Value>, ctx: &CodecContext) -> DecodeResult<(DataSet, bool)> {
    if map.len() > ctx.max_array_length {
        return Err(DecodeError::LimitExceeded("payload field count"));
    }
    let mut mask = DataSetFieldContentFlags::NONE;
    let mut could_be_raw = false;
    let mut reversible = false;
    let mut fields = Vec::with_capacity(map.len());
    for (name, value) in map {
        let (dv, shape) = field_from_json(value, ctx)?;
        mask |= shape.mask;
        could_be_raw |= shape.bare;
        reversible |= shape.reversible;
        fields.push((name.clone(), dv));
    }

    let mut payload: DataSet = fields.into_iter().collect();
    payload.field_mask = if !mask.is_empty() || !could_be_raw {
        mask
    } else {
        DataSetFieldContentFlags::RAW_DATA
    };
    Ok((payload, reversible))
}

fn bare_message(map: &Map<String, Value>, ctx: &CodecContext) -> DecodeResult<DataSetMessage> {
    let (payload, reversible) = payload_from_json(map, ctx)?;
    let mut msg = DataSetMessage {
        payload,
        ..DataSetMessage::default()
    };
    msg.content_mask.set(M::REVERSIBLE_FIELD_ENCODING, reversible);
    Ok(msg)
}

fn u32_field(value: &Value, what: &str) -> DecodeResult<u32> {
    value
        .as_u64()
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| DecodeError::InvalidValue(format!("{}: {}", what, value)))
}

/// Decode one dataset message; the flag tells whether a header was present.
///
/// An object without a `Payload` object, or with a `MessageType` outside the
/// dataset vocabulary, is read as a bare payload.
pub fn decode(value: &Value, ctx: &CodecContext) -> DecodeResult<(DataSetMessage, bool)> {
    let Value::Object(map) = value else {
        return Err(DecodeError::InvalidValue(format!(
            "dataset message must be an object, got {}",
            value
        )));
    };
    let Some(Value::Object(payload)) = get_ci(map, field::PAYLOAD) else {
        return Ok((bare_message(map, ctx)?, false));
    };
    let message_type = match get_ci(map, field::MESSAGE_TYPE) {
        None => None,
        Some(v) => match v.as_str().and_then(MessageType::from_json_name) {
            Some(t) => Some(t),
            None => {
                log::debug!("[json] unknown dataset message type {}, reading as payload", v);
                return Ok((bare_message(map, ctx)?, false));
            }
        },
    };

    let mut msg = DataSetMessage::default();
    let mut mask = M::NONE;

    if let Some(id) = get_ci(map, field::DATASET_WRITER_ID) {
        match id {
            Value::String(name) => {
                msg.writer_name = Some(name.clone());
                msg.use_compatibility_mode = true;
            }
            other => {
                msg.writer_id = other
                    .as_u64()
                    .and_then(|v| u16::try_from(v).ok())
                    .ok_or_else(|| DecodeError::InvalidValue(format!("writer id: {}", other)))?;
            }
        }
        mask.insert(M::DATASET_WRITER_ID);
    }
    if let Some(seq) = get_ci(map, field::SEQUENCE_NUMBER) {
        msg.sequence_number = u32_field(seq, "sequence number")?;
        mask.insert(M::SEQUENCE_NUMBER);
    }
    if let Some(Value::Object(version)) = get_ci(map, field::METADATA_VERSION) {
        let major = get_ci(version, field::MAJOR_VERSION)
            .map(|v| u32_field(v, "major version"))
            .transpose()?;
        let minor = get_ci(version, field::MINOR_VERSION)
            .map(|v| u32_field(v, "minor version"))
            .transpose()?;
        msg.metadata_version = Some(ConfigurationVersion::new(
            major.unwrap_or(0),
            minor.unwrap_or(0),
        ));
        mask.insert(M::METADATA_VERSION);
    }
    if let Some(ts) = get_ci(map, field::TIMESTAMP) {
        msg.timestamp = Some(parse_datetime(ts)?);
        mask.insert(M::TIMESTAMP);
    }
    if let Some(status) = get_ci(map, field::STATUS) {
        msg.status = Some(status_from_json(status)?);
        msg.use_compatibility_mode |= status.is_object();
        mask.insert(M::STATUS);
    }
    if let Some(t) = message_type {
        msg.message_type = t;
        mask.insert(M::MESSAGE_TYPE);
    }
    if !msg.use_compatibility_mode {
        if let Some(name) = get_ci(map, field::DATASET_WRITER_NAME).and_then(Value::as_str) {
            msg.writer_name = Some(name.to_string());
            mask.insert(M::DATASET_WRITER_NAME);
        }
    }

    let (data, reversible) = payload_from_json(payload, ctx)?;
    msg.payload = data;
    mask.set(M::REVERSIBLE_FIELD_ENCODING, reversible);
    msg.content_mask = mask;
    Ok((msg, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataValue, StatusCode, Variant};
    use chrono::{TimeZone, Utc};

    fn header_mask() -> DataSetMessageContentFlags {
        M::DATASET_WRITER_ID
            | M::SEQUENCE_NUMBER
            | M::METADATA_VERSION
            | M::TIMESTAMP
            | M::STATUS
            | M::MESSAGE_TYPE
            | M::DATASET_WRITER_NAME
    }

    fn sample() -> DataSetMessage {
        let mut msg = DataSetMessage::new(
            100,
            DataSet::new(DataSetFieldContentFlags::STATUS_CODE)
                .with("Temperature", DataValue::new(25i32).with_status(StatusCode::UNCERTAIN))
                .with("Label", DataValue::new("pump-1")),
        );
        msg.content_mask = header_mask();
        msg.writer_name = Some("Writer100".into());
        msg.sequence_number = 3;
        msg.metadata_version = Some(ConfigurationVersion::new(2, 1));
        msg.timestamp = Some(Utc.with_ymd_and_hms(2021, 9, 27, 18, 45, 19).unwrap());
        msg.status = Some(StatusCode::UNCERTAIN);
        msg.message_type = MessageType::DeltaFrame;
        msg
    }

    #[test]
    fn test_header_field_order() {
        let ctx = CodecContext::default();
        let encoded = encode(&sample(), true, &ctx, false).unwrap();
        let keys: Vec<_> = encoded.as_object().unwrap().keys().cloned().collect();
        assert_eq!(
            keys,
            vec![
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
        assert_eq!(encoded["Status"], json!(1073741824u32));
        assert_eq!(encoded["MessageType"], json!("ua-deltaframe"));
        assert_eq!(
            encoded["MetaDataVersion"],
            json!({"MajorVersion": 2, "MinorVersion": 1})
        );
    }

    #[test]
    fn test_round_trip_with_header() {
        let ctx = CodecContext::default();
        let msg = sample();
        let encoded = encode(&msg, true, &ctx, false).unwrap();
        let (decoded, has_header) = decode(&encoded, &ctx).unwrap();
        assert!(has_header);
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_omitted_fields_decode_to_defaults() {
        let ctx = CodecContext::default();
        let mut msg = sample();
        msg.content_mask = M::DATASET_WRITER_ID;
        let encoded = encode(&msg, true, &ctx, false).unwrap();
        assert_eq!(encoded.as_object().unwrap().len(), 2);

        let (decoded, _) = decode(&encoded, &ctx).unwrap();
        assert_eq!(decoded.writer_id, 100);
        assert_eq!(decoded.sequence_number, 0);
        assert_eq!(decoded.message_type, MessageType::KeyFrame);
        assert_eq!(decoded.writer_name, None);
        assert_eq!(decoded.status, None);
        assert_eq!(decoded.effective_status(), StatusCode::UNCERTAIN);
    }

    #[test]
    fn test_compatibility_mode() {
        let ctx = CodecContext::default();
        let mut msg = sample();
        msg.use_compatibility_mode = true;
        let encoded = encode(&msg, true, &ctx, false).unwrap();
        assert_eq!(encoded["DataSetWriterId"], json!("Writer100"));
        assert_eq!(
            encoded["Status"],
            json!({"Code": 1073741824u32, "Symbol": "Uncertain"})
        );
        assert!(encoded.get("DataSetWriterName").is_none());

        let (decoded, _) = decode(&encoded, &ctx).unwrap();
        assert!(decoded.use_compatibility_mode);
        assert_eq!(decoded.writer_id, 0);
        assert_eq!(decoded.writer_name.as_deref(), Some("Writer100"));
        assert_eq!(decoded.status, Some(StatusCode::UNCERTAIN));
    }

    #[test]
    fn test_legacy_string_writer_id_wins() {
        let ctx = CodecContext::default();
        let text = r#"{"DataSetWriterId":0,"DataSetWriterId":"Writer7","Payload":{"a":1}}"#;
        let value: Value = serde_json::from_str(text).unwrap();
        let (decoded, _) = decode(&value, &ctx).unwrap();
        assert!(decoded.use_compatibility_mode);
        assert_eq!(decoded.writer_name.as_deref(), Some("Writer7"));
        assert_eq!(decoded.writer_id, 0);
    }

    #[test]
    fn test_unknown_message_type_reads_as_payload() {
        let ctx = CodecContext::default();
        let value = json!({"MessageType": "ua-metadata", "Payload": {"Type": 6, "Body": 1}, "x": 2});
        let (decoded, has_header) = decode(&value, &ctx).unwrap();
        assert!(!has_header);
        assert_eq!(decoded.payload.len(), 3);
        assert_eq!(
            decoded.payload.get("MessageType").map(|v| &v.value),
            Some(&Variant::String("ua-metadata".into()))
        );
    }

    #[test]
    fn test_payload_mask_inference() {
        let ctx = CodecContext::default();
        let (raw, _) = decode(&json!({"a": 1, "b": "x"}), &ctx).unwrap();
        assert_eq!(raw.payload.field_mask, DataSetFieldContentFlags::RAW_DATA);

        let (variants, _) = decode(&json!({"a": {"Type": 6, "Body": 1}}), &ctx).unwrap();
        assert_eq!(variants.payload.field_mask, DataSetFieldContentFlags::NONE);

        let (values, _) = decode(
            &json!({"a": {"Value": {"Type": 6, "Body": 1}, "StatusCode": 1073741824u32}}),
            &ctx,
        )
        .unwrap();
        assert_eq!(values.payload.field_mask, DataSetFieldContentFlags::STATUS_CODE);
        assert!(values.content_mask.contains(M::REVERSIBLE_FIELD_ENCODING));
    }

    #[test]
    fn test_reserved_message_types_rejected_on_encode() {
        let ctx = CodecContext::default();
        let mut msg = sample();
        msg.message_type = MessageType::Metadata;
        assert!(matches!(
            encode(&msg, true, &ctx, false),
            Err(EncodeError::InvalidMessageType(_))
        ));
        assert!(encode(&msg, false, &ctx, false).is_ok());
    }
}
