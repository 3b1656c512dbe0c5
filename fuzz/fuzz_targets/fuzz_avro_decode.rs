// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![no_main]

use libfuzzer_sys::fuzz_target;
use opcua_pubsub::{decode, CodecContext};

// Network message with headers, an array of dataset messages and a variant payload
const SCHEMA: &str = r#"{"type":"record","name":"NetworkMessage","namespace":"org.opcfoundation.ua.pubsub","fields":[
  {"name":"MessageId","type":"string"},
  {"name":"MessageType","type":"string"},
  {"name":"Messages","type":{"type":"array","items":{"type":"record","name":"DataSetMessage","fields":[
    {"name":"DataSetWriterId","type":"int"},
    {"name":"SequenceNumber","type":"long"},
    {"name":"Payload","type":{"type":"record","name":"DataSet","fields":[
      {"name":"value","type":["null",{"type":"record","name":"Variant","fields":[
        {"name":"Type","type":"int"},{"name":"Body","type":"bytes"}]}]},
      {"name":"count","type":["null",{"type":"long","builtInType":7}]}
    ]}}
  ]}}}
]}"#;

fuzz_target!(|data: &[u8]| {
    let ctx = CodecContext::default();

    // Fuzz the schema parser
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = opcua_pubsub::avro::AvroSchema::parse(text);
    }

    // Fuzz the value reader against a fixed schema
    let _ = decode(data, "avro/binary", &ctx, None, Some(SCHEMA));
});
