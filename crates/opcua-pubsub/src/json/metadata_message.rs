// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! JSON DataSetMetaData message (`"MessageType": "ua-metadata"`).

use super::value::{format_node_id, get_ci, parse_node_id};
use crate::compress::{gunzip, gzip};
use crate::config::{content_type, field, message_type, schema_uri, CodecContext};
use crate::error::{DecodeError, DecodeResult, EncodeError, EncodeResult};
use crate::message::{MessageCodec, MessageIdSource};
use crate::types::{DataSetMetaData, MetaDataResolver, MetaDataStore, NodeId};
use serde_json::{json, Map, Value};
use std::collections::VecDeque;
use std::sync::Arc;

const DATA_TYPE: &str = "DataType";
const FIELDS: &str = "Fields";

/// Metadata announcement of one dataset writer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JsonMetaDataMessage {
    pub message_id: MessageIdSource,
    pub publisher_id: Option<String>,
    pub data_set_writer_id: u16,
    pub data_set_writer_group: Option<String>,
    pub data_set_writer_name: Option<String>,
    pub metadata: Option<DataSetMetaData>,
    pub use_gzip_compression: bool,
    /// Field data types with namespace URIs.
    pub use_advanced_encoding: bool,
}

/// Rewrite every `Fields[].DataType` string with `f`.
fn map_data_types<F>(metadata: &mut Value, mut f: F) -> Result<(), String>
where
    F: FnMut(&str) -> Result<String, String>,
{
    let Some(Value::Array(fields)) = metadata.get_mut(FIELDS) else {
        return Ok(());
    };
    for item in fields {
        if let Some(Value::String(data_type)) = item.get_mut(DATA_TYPE) {
            *data_type = f(data_type)?;
        }
    }
    Ok(())
}

impl JsonMetaDataMessage {
    pub fn new(writer_id: u16, metadata: DataSetMetaData) -> Self {
        Self {
            data_set_writer_id: writer_id,
            metadata: Some(metadata),
            ..Self::default()
        }
    }

    /// Store the carried metadata for later RawData decoding.
    pub fn register(&self, store: &MetaDataStore) -> Option<Arc<DataSetMetaData>> {
        self.metadata
            .as_ref()
            .map(|md| store.insert(self.data_set_writer_id, md.clone()))
    }

    fn document(&self, ctx: &CodecContext) -> EncodeResult<Value> {
        let metadata = self.metadata.as_ref().ok_or(EncodeError::MissingMetaData)?;
        let mut metadata_value = serde_json::to_value(metadata)?;
        if self.use_advanced_encoding {
            map_data_types(&mut metadata_value, |s| {
                let id: NodeId = s.parse()?;
                Ok(format_node_id(&id, true, ctx))
            })
            .map_err(EncodeError::TypeMismatch)?;
        }

        let mut obj = Map::new();
        obj.insert(field::MESSAGE_ID.into(), json!(self.message_id.next_id()));
        obj.insert(field::MESSAGE_TYPE.into(), json!(message_type::METADATA));
        if let Some(publisher) = &self.publisher_id {
            obj.insert(field::PUBLISHER_ID.into(), json!(publisher));
        }
        obj.insert(field::DATASET_WRITER_ID.into(), json!(self.data_set_writer_id));
        if let Some(group) = self.data_set_writer_group.as_deref().filter(|g| !g.is_empty()) {
            obj.insert(field::DATASET_WRITER_GROUP.into(), json!(group));
        }
        obj.insert(field::METADATA.into(), metadata_value);
        if let Some(name) = &self.data_set_writer_name {
            obj.insert(field::DATASET_WRITER_NAME.into(), json!(name));
        }
        Ok(Value::Object(obj))
    }

    fn read_document(&mut self, document: &Value, ctx: &CodecContext) -> DecodeResult<()> {
        let Value::Object(map) = document else {
            return Err(DecodeError::NotA("JSON metadata message"));
        };
        let Some(Value::String(id)) = get_ci(map, field::MESSAGE_ID) else {
            return Err(DecodeError::NotA("JSON metadata message"));
        };
        let kind = get_ci(map, field::MESSAGE_TYPE).and_then(Value::as_str);
        if !kind.is_some_and(|k| k.eq_ignore_ascii_case(message_type::METADATA)) {
            return Err(DecodeError::NotA("JSON metadata message"));
        }

        let string_field = |name: &str| -> DecodeResult<Option<String>> {
            match get_ci(map, name) {
                None | Some(Value::Null) => Ok(None),
                Some(Value::String(s)) => Ok(Some(s.clone())),
                Some(other) => Err(DecodeError::InvalidValue(format!("{}: {}", name, other))),
            }
        };
        self.message_id = MessageIdSource::Fixed(id.clone());
        self.publisher_id = string_field(field::PUBLISHER_ID)?;
        self.data_set_writer_group = string_field(field::DATASET_WRITER_GROUP)?;
        self.data_set_writer_name = string_field(field::DATASET_WRITER_NAME)?;
        self.data_set_writer_id = match get_ci(map, field::DATASET_WRITER_ID) {
            None => 0,
            Some(v) => v
                .as_u64()
                .and_then(|id| u16::try_from(id).ok())
                .ok_or_else(|| DecodeError::InvalidValue(format!("writer id: {}", v)))?,
        };

        let mut metadata = get_ci(map, field::METADATA)
            .filter(|v| v.is_object())
            .cloned()
            .ok_or_else(|| DecodeError::InvalidValue("metadata message without MetaData".into()))?;
        map_data_types(&mut metadata, |s| {
            parse_node_id(s, ctx)
                .map(|id| id.to_string())
                .map_err(|e| e.to_string())
        })
        .map_err(DecodeError::InvalidValue)?;
        self.metadata = Some(serde_json::from_value(metadata)?);
        Ok(())
    }
}

impl MessageCodec for JsonMetaDataMessage {
    fn content_type(&self) -> &'static str {
        if self.use_gzip_compression {
            content_type::JSON_GZIP
        } else {
            content_type::JSON
        }
    }

    fn message_schema(&self) -> &'static str {
        schema_uri::NETWORK_MESSAGE_JSON
    }

    fn encode(
        &mut self,
        ctx: &CodecContext,
        max_chunk_size: usize,
        _resolver: Option<&dyn MetaDataResolver>,
    ) -> EncodeResult<Vec<Vec<u8>>> {
        let mut frame = serde_json::to_vec(&self.document(ctx)?)?;
        if self.use_gzip_compression {
            frame = gzip(&frame)?;
        }
        if frame.len() >= max_chunk_size {
            log::warn!(
                "[json] metadata message of {} bytes does not fit max chunk size {}, dropped",
                frame.len(),
                max_chunk_size
            );
            frame.clear();
        }
        Ok(vec![frame])
    }

    fn try_decode(
        &mut self,
        ctx: &CodecContext,
        frames: &mut VecDeque<Vec<u8>>,
        _resolver: Option<&dyn MetaDataResolver>,
    ) -> DecodeResult<()> {
        let frame = frames.front().ok_or(DecodeError::Truncated {
            offset: 0,
            needed: 1,
        })?;
        let document: Value = if self.use_gzip_compression {
            serde_json::from_slice(&gunzip(frame, ctx.max_message_size)?)?
        } else {
            serde_json::from_slice(frame)?
        };
        let mut decoded = JsonMetaDataMessage {
            use_gzip_compression: self.use_gzip_compression,
            use_advanced_encoding: self.use_advanced_encoding,
            ..JsonMetaDataMessage::default()
        };
        decoded.read_document(&document, ctx)?;
        *self = decoded;
        frames.pop_front();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BuiltInType, ConfigurationVersion, FieldMetaData};

    fn metadata(ns: u16) -> DataSetMetaData {
        let mut pressure = FieldMetaData::scalar("pressure", BuiltInType::Double);
        pressure.data_type = NodeId::new(ns, 3001);
        let mut md = DataSetMetaData::new(
            "pump",
            vec![pressure, FieldMetaData::array("alarms", BuiltInType::Boolean)],
        );
        md.configuration_version = ConfigurationVersion::new(3, 2);
        md
    }

    fn message(ns: u16) -> JsonMetaDataMessage {
        let mut msg = JsonMetaDataMessage::new(12, metadata(ns));
        msg.message_id = MessageIdSource::Fixed("m-1".into());
        msg.publisher_id = Some("pub-1".into());
        msg.data_set_writer_name = Some("Writer12".into());
        msg
    }

    fn decode(frame: Vec<u8>, ctx: &CodecContext) -> DecodeResult<JsonMetaDataMessage> {
        let mut queue: VecDeque<Vec<u8>> = vec![frame].into();
        let mut out = JsonMetaDataMessage::default();
        out.try_decode(ctx, &mut queue, None)?;
        Ok(out)
    }

    #[test]
    fn test_round_trip() {
        let ctx = CodecContext::default();
        let mut msg = message(0);
        let frames = msg.encode(&ctx, 65536, None).unwrap();
        let doc: Value = serde_json::from_slice(&frames[0]).unwrap();
        assert_eq!(doc["MessageType"], json!("ua-metadata"));
        assert_eq!(doc["DataSetWriterId"], json!(12));
        assert_eq!(doc["MetaData"]["ConfigurationVersion"]["MajorVersion"], json!(3));

        assert_eq!(decode(frames[0].clone(), &ctx).unwrap(), msg);
    }

    #[test]
    fn test_advanced_encoding_uses_namespace_uris() {
        let mut ctx = CodecContext::default();
        let ns = ctx.namespace_index("urn:pumps");
        let mut msg = message(ns);
        msg.use_advanced_encoding = true;
        let frames = msg.encode(&ctx, 65536, None).unwrap();
        let doc: Value = serde_json::from_slice(&frames[0]).unwrap();
        assert_eq!(doc["MetaData"]["Fields"][0]["DataType"], json!("nsu=urn:pumps;i=3001"));
        assert_eq!(doc["MetaData"]["Fields"][1]["DataType"], json!("i=1"));

        let decoded = decode(frames[0].clone(), &ctx).unwrap();
        assert_eq!(decoded.metadata, msg.metadata);
        assert!(decode(frames[0].clone(), &CodecContext::default()).is_err());
    }

    #[test]
    fn test_requires_metadata() {
        let mut msg = JsonMetaDataMessage::default();
        assert!(matches!(
            msg.encode(&CodecContext::default(), 65536, None),
            Err(EncodeError::MissingMetaData)
        ));
    }

    #[test]
    fn test_data_message_is_rejected() {
        let doc = json!({"MessageId": "1", "MessageType": "ua-data", "Messages": []});
        let result = decode(serde_json::to_vec(&doc).unwrap(), &CodecContext::default());
        assert!(matches!(result, Err(DecodeError::NotA(_))));
    }

    #[test]
    fn test_oversize_yields_empty_frame() {
        let mut msg = message(0);
        let frames = msg.encode(&CodecContext::default(), 32, None).unwrap();
        assert_eq!(frames, vec![Vec::<u8>::new()]);
    }

    #[test]
    fn test_register() {
        let store = MetaDataStore::new();
        assert!(message(0).register(&store).is_some());
        assert!(store.resolve(12, 3, 2).is_some());
    }
}
