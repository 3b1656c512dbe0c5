// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! JSON NetworkMessage (OPC UA Part 14, 7.2.3).
//!
//! Wire shape by network mask (NMH = NetworkMessageHeader, DSMH =
//! DataSetMessageHeader):
//!
//! ```text
//! NMH          {"MessageId":..,"MessageType":"ua-data",..,"Messages":[...]}
//! NMH+single   {"MessageId":..,..,"Messages":{...}}
//! NMH+envelope [{"MessageId":..,"Messages":[m0]}, {"MessageId":..,"Messages":[m1]}]
//! single       {header fields.., "Payload":{...}} or the payload object
//! otherwise    [m0, m1, ...]
//! ```

use super::dataset_message;
use super::value::get_ci;
use crate::compress::{gunzip, gzip};
use crate::config::{content_type, field, message_type, schema_uri, CodecContext};
use crate::error::{DecodeError, DecodeResult, EncodeResult};
use crate::flags::NetworkMessageContentFlags;
use crate::message::{DataSetMessage, MessageCodec, MessageIdSource, NetworkMessageBase};
use crate::types::MetaDataResolver;
use serde_json::{json, Map, Value};
use std::collections::VecDeque;
use uuid::Uuid;

type N = NetworkMessageContentFlags;

/// JSON network message with its encoder options.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JsonNetworkMessage {
    pub base: NetworkMessageBase,
    pub message_id: MessageIdSource,
    /// Applied to every dataset message on encode; set on decode when any
    /// dataset message used the legacy form.
    pub use_compatibility_mode: bool,
    /// Wrap network messages in a top-level array.
    pub use_array_envelope: bool,
    pub use_gzip_compression: bool,
    /// Node ids with namespace URIs.
    pub use_advanced_encoding: bool,
}

impl JsonNetworkMessage {
    pub fn new(base: NetworkMessageBase) -> Self {
        Self {
            base,
            ..Self::default()
        }
    }

    fn has(&self, flag: NetworkMessageContentFlags) -> bool {
        self.base.content_mask.contains(flag)
    }

    // ========================================================================
    // Encode
    // ========================================================================

    fn dataset_value(&self, msg: &DataSetMessage, ctx: &CodecContext) -> EncodeResult<Value> {
        let with_header = self.has(N::DATASET_MESSAGE_HEADER);
        if self.use_compatibility_mode && !msg.use_compatibility_mode {
            let mut msg = msg.clone();
            msg.use_compatibility_mode = true;
            return dataset_message::encode(&msg, with_header, ctx, self.use_advanced_encoding);
        }
        dataset_message::encode(msg, with_header, ctx, self.use_advanced_encoding)
    }

    fn network_object(&self, messages: &[DataSetMessage], ctx: &CodecContext) -> EncodeResult<Value> {
        let mut obj = Map::new();
        obj.insert(field::MESSAGE_ID.into(), json!(self.message_id.next_id()));
        obj.insert(field::MESSAGE_TYPE.into(), json!(message_type::DATA));
        if let (true, Some(id)) = (self.has(N::PUBLISHER_ID), &self.base.publisher_id) {
            obj.insert(field::PUBLISHER_ID.into(), json!(id));
        }
        if self.has(N::DATASET_CLASS_ID) && !self.base.data_set_class_id.is_nil() {
            obj.insert(
                field::DATASET_CLASS_ID.into(),
                json!(self.base.data_set_class_id.to_string()),
            );
        }
        if let Some(group) = self.base.data_set_writer_group.as_deref().filter(|g| !g.is_empty()) {
            obj.insert(field::DATASET_WRITER_GROUP.into(), json!(group));
        }
        let messages_value = match messages {
            [single] if self.base.is_single() => self.dataset_value(single, ctx)?,
            _ => self.dataset_array(messages, ctx)?,
        };
        obj.insert(field::MESSAGES.into(), messages_value);
        Ok(Value::Object(obj))
    }

    fn dataset_array(&self, messages: &[DataSetMessage], ctx: &CodecContext) -> EncodeResult<Value> {
        messages
            .iter()
            .map(|m| self.dataset_value(m, ctx))
            .collect::<EncodeResult<Vec<_>>>()
            .map(Value::Array)
    }

    /// Top-level JSON document for one batch.
    fn document(&self, messages: &[DataSetMessage], ctx: &CodecContext) -> EncodeResult<Value> {
        if self.has(N::NETWORK_MESSAGE_HEADER) {
            if self.use_array_envelope {
                return messages
                    .iter()
                    .map(|m| self.network_object(std::slice::from_ref(m), ctx))
                    .collect::<EncodeResult<Vec<_>>>()
                    .map(Value::Array);
            }
            return self.network_object(messages, ctx);
        }
        match messages {
            [single] if self.base.is_single() && !self.use_array_envelope => {
                self.dataset_value(single, ctx)
            }
            _ => self.dataset_array(messages, ctx),
        }
    }

    fn encode_batch(&self, messages: &[DataSetMessage], ctx: &CodecContext) -> EncodeResult<Vec<u8>> {
        let bytes = serde_json::to_vec(&self.document(messages, ctx)?)?;
        if self.use_gzip_compression {
            return gzip(&bytes);
        }
        Ok(bytes)
    }

    /// Push the batch if it fits, else split it in halves and retry.
    fn encode_fitting(
        &self,
        messages: &[DataSetMessage],
        ctx: &CodecContext,
        max_chunk_size: usize,
        out: &mut Vec<Vec<u8>>,
    ) -> EncodeResult<()> {
        let frame = self.encode_batch(messages, ctx)?;
        if frame.len() < max_chunk_size {
            out.push(frame);
        } else if messages.len() <= 1 {
            log::warn!(
                "[json] message of {} bytes does not fit max chunk size {}, dropped",
                frame.len(),
                max_chunk_size
            );
            out.push(Vec::new());
        } else {
            let (left, right) = messages.split_at(messages.len() / 2);
            self.encode_fitting(left, ctx, max_chunk_size, out)?;
            self.encode_fitting(right, ctx, max_chunk_size, out)?;
        }
        Ok(())
    }

    // ========================================================================
    // Decode
    // ========================================================================

    fn read_datasets(
        &mut self,
        value: &Value,
        ctx: &CodecContext,
        any_header: &mut bool,
    ) -> DecodeResult<()> {
        let (msg, has_header) = dataset_message::decode(value, ctx)?;
        *any_header |= has_header;
        self.use_compatibility_mode |= msg.use_compatibility_mode;
        self.base.messages.push(msg);
        Ok(())
    }

    fn read_network_header(
        &mut self,
        map: &Map<String, Value>,
        id: &str,
        ctx: &CodecContext,
        any_header: &mut bool,
    ) -> DecodeResult<()> {
        let kind = get_ci(map, field::MESSAGE_TYPE).and_then(Value::as_str);
        if !kind.is_some_and(|k| k.eq_ignore_ascii_case(message_type::DATA)) {
            return Err(DecodeError::NotA("JSON data network message"));
        }
        self.message_id = MessageIdSource::Fixed(id.to_string());
        self.base.content_mask.insert(N::NETWORK_MESSAGE_HEADER);

        if let Some(publisher) = get_ci(map, field::PUBLISHER_ID) {
            let publisher = publisher
                .as_str()
                .ok_or_else(|| DecodeError::InvalidValue(format!("publisher id: {}", publisher)))?;
            self.base.publisher_id = Some(publisher.to_string());
            self.base.content_mask.insert(N::PUBLISHER_ID);
        }
        if let Some(class_id) = get_ci(map, field::DATASET_CLASS_ID) {
            self.base.data_set_class_id = class_id
                .as_str()
                .and_then(|s| Uuid::parse_str(s).ok())
                .ok_or_else(|| DecodeError::InvalidValue(format!("dataset class id: {}", class_id)))?;
            self.base.content_mask.insert(N::DATASET_CLASS_ID);
        }
        if let Some(group) = get_ci(map, field::DATASET_WRITER_GROUP) {
            let group = group
                .as_str()
                .ok_or_else(|| DecodeError::InvalidValue(format!("writer group: {}", group)))?;
            self.base.data_set_writer_group = Some(group.to_string());
        }

        match get_ci(map, field::MESSAGES) {
            Some(single @ Value::Object(_)) => {
                self.base.content_mask.insert(N::SINGLE_DATASET_MESSAGE);
                self.read_datasets(single, ctx, any_header)
            }
            Some(Value::Array(items)) => items
                .iter()
                .try_for_each(|item| self.read_datasets(item, ctx, any_header)),
            _ => Err(DecodeError::InvalidValue(
                "network message without Messages".into(),
            )),
        }
    }

    fn read_document(&mut self, document: &Value, ctx: &CodecContext) -> DecodeResult<()> {
        let (items, enveloped) = match document {
            Value::Array(items) => (items.as_slice(), true),
            other => (std::slice::from_ref(other), false),
        };
        if items.len() > ctx.max_array_length {
            return Err(DecodeError::LimitExceeded("network message count"));
        }

        let mut any_header = false;
        let mut saw_network_header = false;
        for item in items {
            match item {
                Value::Object(map) => match get_ci(map, field::MESSAGE_ID) {
                    Some(Value::String(id)) => {
                        self.read_network_header(map, id, ctx, &mut any_header)?;
                        saw_network_header = true;
                    }
                    _ => {
                        if !enveloped {
                            self.base.content_mask.insert(N::SINGLE_DATASET_MESSAGE);
                        }
                        self.read_datasets(item, ctx, &mut any_header)?;
                    }
                },
                Value::Array(inner) => inner
                    .iter()
                    .try_for_each(|m| self.read_datasets(m, ctx, &mut any_header))?,
                other => {
                    return Err(DecodeError::InvalidValue(format!(
                        "unexpected JSON {} in network message",
                        other
                    )))
                }
            }
        }
        if any_header {
            self.base.content_mask.insert(N::DATASET_MESSAGE_HEADER);
        }
        self.use_array_envelope = enveloped && saw_network_header;
        Ok(())
    }
}

impl MessageCodec for JsonNetworkMessage {
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
        let mut frames = Vec::new();
        let messages = &self.base.messages;
        if self.base.is_single() && !self.use_array_envelope {
            for msg in messages {
                self.encode_fitting(std::slice::from_ref(msg), ctx, max_chunk_size, &mut frames)?;
            }
        } else {
            self.encode_fitting(messages, ctx, max_chunk_size, &mut frames)?;
        }
        log::debug!(
            "[json] encoded {} dataset messages into {} frames",
            messages.len(),
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
        let frame = frames.front().ok_or(DecodeError::Truncated {
            offset: 0,
            needed: 1,
        })?;
        if frame.len() > ctx.max_message_size {
            return Err(DecodeError::LimitExceeded("message size"));
        }
        let document: Value = if self.use_gzip_compression {
            serde_json::from_slice(&gunzip(frame, ctx.max_message_size)?)?
        } else {
            serde_json::from_slice(frame)?
        };

        let mut decoded = JsonNetworkMessage {
            use_gzip_compression: self.use_gzip_compression,
            use_advanced_encoding: self.use_advanced_encoding,
            ..JsonNetworkMessage::default()
        };
        decoded.read_document(&document, ctx)?;
        *self = decoded;
        frames.pop_front();
        Ok(())
    }
}
