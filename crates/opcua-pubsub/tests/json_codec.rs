// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test/bench code readability over pedantic
#![allow(clippy::missing_panics_doc)] // Tests/examples panic on failure

//! JSON network and metadata messages through content-type dispatch.

use opcua_pubsub::flags::{DataSetFieldContentFlags, DataSetMessageContentFlags, NetworkMessageContentFlags};
use opcua_pubsub::{
    decode, decode_stream, encode, BuiltInType, CodecContext, DataSet, DataSetMessage, DataSetMetaData,
    DataValue, FieldMetaData, JsonMetaDataMessage, JsonNetworkMessage, MessageIdSource, MetaDataStore,
    NetworkMessageBase, PubSubMessage, StatusCode,
};
use serde_json::{json, Value};

type N = NetworkMessageContentFlags;
type D = DataSetMessageContentFlags;

const JSON: &str = "application/json";

fn sensor(writer_id: u16, value: f64) -> DataSetMessage {
    let mut msg = DataSetMessage::new(
        writer_id,
        DataSet::new(DataSetFieldContentFlags::STATUS_CODE)
            .with("Pressure", DataValue::new(value).with_status(StatusCode::UNCERTAIN))
            .with("Unit", "bar"),
    );
    msg.content_mask = D::DATASET_WRITER_ID | D::SEQUENCE_NUMBER | D::MESSAGE_TYPE;
    msg.sequence_number = 5;
    msg
}

fn network(mask: NetworkMessageContentFlags, messages: Vec<DataSetMessage>) -> JsonNetworkMessage {
    let mut base = NetworkMessageBase::new(mask, messages);
    base.publisher_id = Some("plant-3".into());
    let mut msg = JsonNetworkMessage::new(base);
    msg.message_id = MessageIdSource::Fixed("42".into());
    msg
}

#[test]
fn test_legacy_string_writer_id() {
    let ctx = CodecContext::default();
    let text = r#"{
        "MessageId": "7",
        "MessageType": "ua-data",
        "Messages": [
            {"DataSetWriterId": 0, "DataSetWriterId": "Writer12", "Payload": {"a": 1}}
        ]
    }"#;
    let decoded = decode(text.as_bytes(), JSON, &ctx, None, None).unwrap();
    let PubSubMessage::Json(msg) = decoded else {
        panic!("expected a JSON data message");
    };
    let ds = &msg.base.messages[0];
    assert!(ds.use_compatibility_mode);
    assert_eq!(ds.writer_id, 0);
    assert_eq!(ds.writer_name.as_deref(), Some("Writer12"));
    assert!(ds.payload.get("a").is_some());
}

#[test]
fn test_headers_and_omission() {
    let ctx = CodecContext::default();
    let mut msg = PubSubMessage::from(network(
        N::NETWORK_MESSAGE_HEADER | N::DATASET_MESSAGE_HEADER,
        vec![sensor(1, 1.25), sensor(2, 2.5)],
    ));
    let frames = encode(&mut msg, &ctx, 65536, None).unwrap();
    assert_eq!(frames.len(), 1);

    let doc: Value = serde_json::from_slice(&frames[0]).unwrap();
    assert_eq!(doc["MessageId"], json!("42"));
    // PublisherId is set but not selected by the mask
    assert!(doc.get("PublisherId").is_none());
    let first = &doc["Messages"][0];
    assert_eq!(first["DataSetWriterId"], json!(1));
    assert_eq!(first["SequenceNumber"], json!(5));
    assert!(first.get("Timestamp").is_none());
    assert!(first.get("MetaDataVersion").is_none());

    let decoded = decode(&frames[0], JSON, &ctx, None, None).unwrap();
    let network = decoded.network().unwrap();
    assert_eq!(network.publisher_id, None);
    assert_eq!(network.messages.len(), 2);
    assert_eq!(network.messages[1].writer_id, 2);
    assert_eq!(
        network.messages[0].payload.get("Pressure").map(|dv| dv.status),
        Some(StatusCode::UNCERTAIN)
    );
}

#[test]
fn test_payload_only_messages() {
    let ctx = CodecContext::default();
    let mut msg = PubSubMessage::from(network(N::SINGLE_DATASET_MESSAGE, vec![sensor(1, 3.0)]));
    let frames = encode(&mut msg, &ctx, 65536, None).unwrap();
    let doc: Value = serde_json::from_slice(&frames[0]).unwrap();
    assert!(doc.get("MessageId").is_none());
    assert!(doc.get("DataSetWriterId").is_none());
    assert_eq!(doc["Pressure"]["Value"], json!(3.0));

    let decoded = decode(&frames[0], JSON, &ctx, None, None).unwrap();
    let ds = &decoded.network().unwrap().messages[0];
    assert_eq!(ds.writer_id, 0);
    assert_eq!(ds.sequence_number, 0);
}

#[test]
fn test_metadata_then_data_stream() {
    let ctx = CodecContext::default();
    let metadata = DataSetMetaData::new(
        "boiler",
        vec![
            FieldMetaData::scalar("Pressure", BuiltInType::Double),
            FieldMetaData::scalar("Unit", BuiltInType::String),
        ],
    );
    let mut announce = PubSubMessage::from(JsonMetaDataMessage::new(1, metadata.clone()));
    let mut data = PubSubMessage::from(network(
        N::NETWORK_MESSAGE_HEADER | N::DATASET_MESSAGE_HEADER | N::PUBLISHER_ID,
        vec![sensor(1, 4.5)],
    ));

    let mut frames = encode(&mut announce, &ctx, 65536, None).unwrap();
    frames.push(b"not json".to_vec());
    frames.extend(encode(&mut data, &ctx, 65536, None).unwrap());

    let store = MetaDataStore::new();
    let kinds: Vec<&str> = decode_stream(frames, JSON, &ctx, None)
        .map(|msg| {
            if let PubSubMessage::JsonMetaData(m) = &msg {
                m.register(&store);
            }
            msg.kind()
        })
        .collect();
    assert_eq!(kinds, ["json-metadata", "json-data"]);
    assert_eq!(store.len(), 1);
}

#[test]
fn test_array_envelope_with_gzip() {
    let ctx = CodecContext::default();
    let mut msg = network(N::NETWORK_MESSAGE_HEADER | N::DATASET_MESSAGE_HEADER, vec![sensor(1, 1.0), sensor(2, 2.0)]);
    msg.use_array_envelope = true;
    msg.use_gzip_compression = true;
    let mut msg = PubSubMessage::from(msg);
    assert_eq!(msg.content_type(), "application/json;gzip");
    let frames = encode(&mut msg, &ctx, 65536, None).unwrap();

    let decoded = decode(&frames[0], "application/json;gzip", &ctx, None, None).unwrap();
    let PubSubMessage::Json(json) = decoded else {
        panic!("expected a JSON data message");
    };
    assert!(json.use_array_envelope);
    assert_eq!(json.base.messages.len(), 2);
}
