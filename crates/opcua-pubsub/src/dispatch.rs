// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Content-type dispatch.
//!
//! Maps a transport content type to candidate decoders and tries them in
//! order:
//!
//! ```text
//! application/json[;gzip]    JsonNetworkMessage -> JsonMetaDataMessage
//! application/octet-stream   UadpNetworkMessage -> UadpDiscoveryMessage
//! avro/binary, avro/gzip     AvroNetworkMessage (needs a schema)
//! ```
//!
//! Unknown content types decode to `None`; the caller reports them.

use crate::avro::{AvroNetworkMessage, AvroSchema};
use crate::config::{content_type, schema_uri, CodecContext, ConfigError, EncoderConfig, MessageEncoding};
use crate::error::{DecodeError, EncodeResult};
use crate::json::{JsonMetaDataMessage, JsonNetworkMessage};
use crate::message::{MessageCodec, NetworkMessageBase};
use crate::types::MetaDataResolver;
use crate::uadp::{ChunkReassembler, UadpDiscoveryMessage, UadpNetworkMessage};
use std::collections::VecDeque;

/// Any message the codec produces or recognizes.
#[derive(Debug, Clone)]
pub enum PubSubMessage {
    Uadp(UadpNetworkMessage),
    UadpDiscovery(UadpDiscoveryMessage),
    Json(JsonNetworkMessage),
    JsonMetaData(JsonMetaDataMessage),
    Avro(AvroNetworkMessage),
}

impl PubSubMessage {
    /// Data message of the configured encoding, with the configured masks
    /// applied to `base` and every dataset message in it.
    pub fn from_config(config: &EncoderConfig, mut base: NetworkMessageBase) -> Result<Self, ConfigError> {
        base.content_mask = config.network_flags()?;
        let dataset_mask = config.dataset_flags()?;
        let field_mask = config.field_flags()?;
        for msg in &mut base.messages {
            msg.content_mask = dataset_mask;
            msg.payload.field_mask = field_mask;
            msg.use_compatibility_mode = config.use_compatibility_mode;
        }
        Ok(match config.encoding {
            MessageEncoding::Uadp => PubSubMessage::Uadp(UadpNetworkMessage::new(base)),
            MessageEncoding::Json => PubSubMessage::Json(JsonNetworkMessage {
                use_compatibility_mode: config.use_compatibility_mode,
                use_array_envelope: config.use_array_envelope,
                use_gzip_compression: config.use_gzip_compression,
                use_advanced_encoding: config.use_advanced_encoding,
                ..JsonNetworkMessage::new(base)
            }),
            MessageEncoding::Avro => PubSubMessage::Avro(AvroNetworkMessage {
                use_gzip_compression: config.use_gzip_compression,
                ..AvroNetworkMessage::new(base)
            }),
        })
    }

    fn codec(&self) -> &dyn MessageCodec {
        match self {
            PubSubMessage::Uadp(m) => m,
            PubSubMessage::UadpDiscovery(m) => m,
            PubSubMessage::Json(m) => m,
            PubSubMessage::JsonMetaData(m) => m,
            PubSubMessage::Avro(m) => m,
        }
    }

    fn codec_mut(&mut self) -> &mut dyn MessageCodec {
        match self {
            PubSubMessage::Uadp(m) => m,
            PubSubMessage::UadpDiscovery(m) => m,
            PubSubMessage::Json(m) => m,
            PubSubMessage::JsonMetaData(m) => m,
            PubSubMessage::Avro(m) => m,
        }
    }

    pub fn content_type(&self) -> &'static str {
        self.codec().content_type()
    }

    pub fn message_schema(&self) -> &'static str {
        self.codec().message_schema()
    }

    pub fn encode(
        &mut self,
        ctx: &CodecContext,
        max_chunk_size: usize,
        resolver: Option<&dyn MetaDataResolver>,
    ) -> EncodeResult<Vec<Vec<u8>>> {
        self.codec_mut().encode(ctx, max_chunk_size, resolver)
    }

    /// Shared network fields of data messages.
    pub fn network(&self) -> Option<&NetworkMessageBase> {
        match self {
            PubSubMessage::Uadp(m) => Some(&m.base),
            PubSubMessage::Json(m) => Some(&m.base),
            PubSubMessage::Avro(m) => Some(&m.base),
            PubSubMessage::UadpDiscovery(_) | PubSubMessage::JsonMetaData(_) => None,
        }
    }

    pub fn network_mut(&mut self) -> Option<&mut NetworkMessageBase> {
        match self {
            PubSubMessage::Uadp(m) => Some(&mut m.base),
            PubSubMessage::Json(m) => Some(&mut m.base),
            PubSubMessage::Avro(m) => Some(&mut m.base),
            PubSubMessage::UadpDiscovery(_) | PubSubMessage::JsonMetaData(_) => None,
        }
    }

    /// Short kind name for logs and tools.
    pub fn kind(&self) -> &'static str {
        match self {
            PubSubMessage::Uadp(_) => "uadp-data",
            PubSubMessage::UadpDiscovery(_) => "uadp-discovery",
            PubSubMessage::Json(_) => "json-data",
            PubSubMessage::JsonMetaData(_) => "json-metadata",
            PubSubMessage::Avro(_) => "avro-data",
        }
    }
}

macro_rules! impl_from_message {
    ($($type:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$type> for PubSubMessage {
                fn from(m: $type) -> Self {
                    PubSubMessage::$variant(m)
                }
            }
        )*
    };
}

impl_from_message!(
    UadpNetworkMessage => Uadp,
    UadpDiscoveryMessage => UadpDiscovery,
    JsonNetworkMessage => Json,
    JsonMetaDataMessage => JsonMetaData,
    AvroNetworkMessage => Avro,
);

// ============================================================================
// Content types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContentKind {
    Json { gzip: bool },
    Uadp,
    Avro { gzip: bool },
}

/// Case-insensitive; parameters after `;` are ignored except `gzip`.
fn parse_content_type(value: &str) -> Option<ContentKind> {
    let lower = value.to_ascii_lowercase();
    let mut parts = lower.split(';').map(str::trim);
    let media = parts.next().unwrap_or_default();
    let gzip = parts.any(|p| p == "gzip" || p == "gzip=true" || p == "encoding=gzip");

    let json = content_type::JSON;
    let uadp = content_type::UADP;
    Some(match media {
        m if m == json || m == schema_uri::NETWORK_MESSAGE_JSON => ContentKind::Json { gzip },
        m if m == uadp || m == schema_uri::NETWORK_MESSAGE_UADP => ContentKind::Uadp,
        m if m == content_type::AVRO || m == schema_uri::NETWORK_MESSAGE_AVRO => ContentKind::Avro { gzip },
        m if m == content_type::AVRO_GZIP => ContentKind::Avro { gzip: true },
        _ => return None,
    })
}

// ============================================================================
// Decode
// ============================================================================

fn fallback(kind: &str, err: &DecodeError) {
    log::debug!("[dispatch] {} decode failed: {}", kind, err);
}

/// Decode the frame at the head of `frames` with the candidates for `kind`.
fn decode_front(
    frames: &mut VecDeque<Vec<u8>>,
    kind: ContentKind,
    ctx: &CodecContext,
    resolver: Option<&dyn MetaDataResolver>,
    avro_schema: Option<&AvroSchema>,
    reassembler: &mut ChunkReassembler,
) -> Option<PubSubMessage> {
    match kind {
        ContentKind::Json { gzip } => {
            let mut msg = JsonNetworkMessage {
                use_gzip_compression: gzip,
                ..JsonNetworkMessage::default()
            };
            match msg.try_decode(ctx, frames, resolver) {
                Ok(()) => return Some(msg.into()),
                Err(e) => fallback("JSON network message", &e),
            }
            let mut meta = JsonMetaDataMessage {
                use_gzip_compression: gzip,
                ..JsonMetaDataMessage::default()
            };
            match meta.try_decode(ctx, frames, resolver) {
                Ok(()) => Some(meta.into()),
                Err(e) => {
                    fallback("JSON metadata message", &e);
                    None
                }
            }
        }
        ContentKind::Uadp => {
            let mut msg = UadpNetworkMessage::default();
            msg.replace_reassembler(std::mem::take(reassembler));
            let result = msg.try_decode(ctx, frames, resolver);
            *reassembler = msg.replace_reassembler(ChunkReassembler::default());
            match result {
                Ok(()) => return Some(msg.into()),
                Err(e) => fallback("UADP network message", &e),
            }
            let mut discovery = UadpDiscoveryMessage::default();
            match discovery.try_decode(ctx, frames, resolver) {
                Ok(()) => Some(discovery.into()),
                Err(e) => {
                    fallback("UADP discovery message", &e);
                    None
                }
            }
        }
        ContentKind::Avro { gzip } => {
            let Some(schema) = avro_schema else {
                log::debug!("[dispatch] Avro frame without a message schema");
                return None;
            };
            let mut msg = AvroNetworkMessage {
                use_gzip_compression: gzip,
                ..AvroNetworkMessage::default()
            };
            msg.set_schema(schema.clone());
            match msg.try_decode(ctx, frames, resolver) {
                Ok(()) => Some(msg.into()),
                Err(e) => {
                    fallback("Avro network message", &e);
                    None
                }
            }
        }
    }
}

/// A UADP decode that only buffered chunks of an unfinished train.
fn is_partial(msg: &PubSubMessage) -> bool {
    matches!(msg, PubSubMessage::Uadp(m) if m.is_partial())
}

fn parse_message_schema(message_schema: Option<&str>) -> Option<AvroSchema> {
    let text = message_schema?;
    match AvroSchema::parse(text) {
        Ok(schema) => Some(schema),
        Err(e) => {
            log::debug!("[dispatch] ignoring message schema: {}", e);
            None
        }
    }
}

/// Decode one buffer.
///
/// `message_schema` is the Avro schema text for Avro content types and is
/// ignored otherwise. A chunk of an unfinished UADP train decodes to `None`.
pub fn decode(
    buffer: &[u8],
    content_type: &str,
    ctx: &CodecContext,
    resolver: Option<&dyn MetaDataResolver>,
    message_schema: Option<&str>,
) -> Option<PubSubMessage> {
    let Some(kind) = parse_content_type(content_type) else {
        log::debug!("[dispatch] unsupported content type {:?}", content_type);
        return None;
    };
    let avro_schema = match kind {
        ContentKind::Avro { .. } => parse_message_schema(message_schema),
        _ => None,
    };
    let mut frames = VecDeque::from(vec![buffer.to_vec()]);
    let mut reassembler = ChunkReassembler::default();
    let msg = decode_front(&mut frames, kind, ctx, resolver, avro_schema.as_ref(), &mut reassembler)?;
    if is_partial(&msg) {
        log::debug!("[dispatch] buffer is part of an unfinished chunk train");
        return None;
    }
    Some(msg)
}

/// Lazily decode a queue of frames.
///
/// Chunk trains are reassembled across frames. Frames no candidate accepts are
/// dropped and decoding continues with the next one.
pub fn decode_stream<'a, Q>(
    frames: Q,
    content_type: &str,
    ctx: &'a CodecContext,
    resolver: Option<&'a dyn MetaDataResolver>,
) -> DecodeStream<'a>
where
    Q: Into<VecDeque<Vec<u8>>>,
{
    let kind = parse_content_type(content_type);
    if kind.is_none() {
        log::debug!("[dispatch] unsupported content type {:?}", content_type);
    }
    DecodeStream {
        frames: frames.into(),
        kind,
        ctx,
        resolver,
        avro_schema: None,
        reassembler: ChunkReassembler::default(),
    }
}

/// Iterator returned by [`decode_stream`].
pub struct DecodeStream<'a> {
    frames: VecDeque<Vec<u8>>,
    kind: Option<ContentKind>,
    ctx: &'a CodecContext,
    resolver: Option<&'a dyn MetaDataResolver>,
    avro_schema: Option<AvroSchema>,
    reassembler: ChunkReassembler,
}

impl DecodeStream<'_> {
    /// Schema text used for Avro frames.
    #[must_use]
    pub fn with_message_schema(mut self, message_schema: &str) -> Self {
        self.avro_schema = parse_message_schema(Some(message_schema));
        self
    }

    /// Frames not yet consumed.
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }

    /// Chunk trains still waiting for frames.
    pub fn reassembler(&self) -> &ChunkReassembler {
        &self.reassembler
    }
}

impl Iterator for DecodeStream<'_> {
    type Item = PubSubMessage;

    fn next(&mut self) -> Option<PubSubMessage> {
        let kind = self.kind?;
        while !self.frames.is_empty() {
            let before = self.frames.len();
            let decoded = decode_front(
                &mut self.frames,
                kind,
                self.ctx,
                self.resolver,
                self.avro_schema.as_ref(),
                &mut self.reassembler,
            );
            match decoded {
                Some(msg) if is_partial(&msg) => continue,
                Some(msg) => return Some(msg),
                None => {
                    if self.frames.len() == before {
                        if let Some(frame) = self.frames.pop_front() {
                            log::debug!("[dispatch] dropping undecodable frame of {} bytes", frame.len());
                        }
                    }
                }
            }
        }
        None
    }
}

/// Encode `message` into transport frames.
pub fn encode(
    message: &mut PubSubMessage,
    ctx: &CodecContext,
    max_chunk_size: usize,
    resolver: Option<&dyn MetaDataResolver>,
) -> EncodeResult<Vec<Vec<u8>>> {
    let frames = message.encode(ctx, max_chunk_size, resolver)?;
    log::trace!(
        "[dispatch] {} encoded into {} frames ({})",
        message.kind(),
        frames.len(),
        message.content_type()
    );
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::{DataSetFieldContentFlags, DataSetMessageContentFlags, NetworkMessageContentFlags};
    use crate::message::{DataSetMessage, MessageIdSource};
    use crate::types::{BuiltInType, DataSet, DataSetMetaData, FieldMetaData, Variant};

    type N = NetworkMessageContentFlags;

    fn base(mask: NetworkMessageContentFlags) -> NetworkMessageBase {
        let payload = DataSet::new(DataSetFieldContentFlags::RAW_DATA).with("x", Variant::Int32(42));
        let mut msg = DataSetMessage::new(3, payload);
        msg.content_mask = DataSetMessageContentFlags::DATASET_WRITER_ID;
        let mut base = NetworkMessageBase::new(mask, vec![msg]);
        base.publisher_id = Some("pub".into());
        base
    }

    fn metadata() -> DataSetMetaData {
        DataSetMetaData::new("m", vec![FieldMetaData::scalar("x", BuiltInType::Int32)])
    }

    #[test]
    fn test_parse_content_type() {
        assert_eq!(parse_content_type("application/json"), Some(ContentKind::Json { gzip: false }));
        assert_eq!(parse_content_type("Application/JSON; charset=utf-8"), Some(ContentKind::Json { gzip: false }));
        assert_eq!(parse_content_type("application/json;gzip"), Some(ContentKind::Json { gzip: true }));
        assert_eq!(parse_content_type("APPLICATION/OCTET-STREAM"), Some(ContentKind::Uadp));
        assert_eq!(parse_content_type("avro/binary"), Some(ContentKind::Avro { gzip: false }));
        assert_eq!(parse_content_type("avro/gzip"), Some(ContentKind::Avro { gzip: true }));
        assert_eq!(parse_content_type("text/plain"), None);
    }

    #[test]
    fn test_unknown_content_type_is_none() {
        let ctx = CodecContext::default();
        assert!(decode(b"{}", "text/xml", &ctx, None, None).is_none());
        assert_eq!(decode_stream(vec![b"{}".to_vec()], "text/xml", &ctx, None).count(), 0);
    }

    #[test]
    fn test_json_metadata_fallback() {
        let ctx = CodecContext::default();
        let mut meta = JsonMetaDataMessage::new(3, metadata());
        meta.message_id = MessageIdSource::Fixed("m1".into());
        let frames = meta.encode(&ctx, 65536, None).unwrap();

        let decoded = decode(&frames[0], content_type::JSON, &ctx, None, None).unwrap();
        match decoded {
            PubSubMessage::JsonMetaData(m) => {
                assert_eq!(m.data_set_writer_id, 3);
                assert_eq!(m.metadata, Some(metadata()));
            }
            other => panic!("expected metadata message, got {}", other.kind()),
        }
    }

    #[test]
    fn test_json_gzip_marker() {
        let ctx = CodecContext::default();
        let mut msg = PubSubMessage::Json(JsonNetworkMessage {
            use_gzip_compression: true,
            ..JsonNetworkMessage::new(base(N::NETWORK_MESSAGE_HEADER | N::DATASET_MESSAGE_HEADER))
        });
        assert_eq!(msg.content_type(), content_type::JSON_GZIP);
        let frames = encode(&mut msg, &ctx, 65536, None).unwrap();

        assert!(decode(&frames[0], "application/json", &ctx, None, None).is_none());
        let decoded = decode(&frames[0], "application/json; gzip", &ctx, None, None).unwrap();
        assert_eq!(decoded.kind(), "json-data");
        assert_eq!(decoded.network().unwrap().messages[0].writer_id, 3);
    }

    #[test]
    fn test_uadp_discovery_fallback() {
        let ctx = CodecContext::default();
        let mut msg = PubSubMessage::from(UadpDiscoveryMessage::announcement("pub", 3, metadata()));
        let frames = msg.encode(&ctx, 65536, None).unwrap();
        let decoded = decode(&frames[0], content_type::UADP, &ctx, None, None).unwrap();
        assert!(matches!(decoded, PubSubMessage::UadpDiscovery(_)));
        assert!(decoded.network().is_none());
    }

    #[test]
    fn test_avro_needs_schema() {
        let ctx = CodecContext::default();
        let mut msg = AvroNetworkMessage::new(base(N::NETWORK_MESSAGE_HEADER));
        let frames = msg.encode(&ctx, 65536, None).unwrap();
        let schema = msg.schema_json().unwrap();

        assert!(decode(&frames[0], content_type::AVRO, &ctx, None, None).is_none());
        let decoded = decode(&frames[0], content_type::AVRO, &ctx, None, Some(&schema)).unwrap();
        assert_eq!(decoded.message_schema(), schema_uri::NETWORK_MESSAGE_AVRO);
        assert_eq!(decoded.network().unwrap().messages[0].payload, msg.base.messages[0].payload);
    }

    #[test]
    fn test_stream_reassembles_chunks() {
        let ctx = CodecContext::default();
        let mut base = base(N::PUBLISHER_ID | N::PAYLOAD_HEADER);
        base.messages[0].payload = DataSet::new(DataSetFieldContentFlags::NONE)
            .with("blob", Variant::ByteString(vec![7; 4000]));
        let mut msg = PubSubMessage::Uadp(UadpNetworkMessage::new(base));
        let frames = msg.encode(&ctx, 512, None).unwrap();
        assert!(frames.len() > 1);

        assert!(decode(&frames[0], content_type::UADP, &ctx, None, None).is_none());

        let mut queue = vec![vec![0xFFu8, 0x00]];
        queue.extend(frames);
        let decoded: Vec<_> = decode_stream(queue, content_type::UADP, &ctx, None).collect();
        assert_eq!(decoded.len(), 1);
        let network = decoded[0].network().unwrap();
        assert_eq!(network.messages.len(), 1);
        assert_eq!(
            network.messages[0].payload.get("0").map(|dv| &dv.value),
            Some(&Variant::ByteString(vec![7; 4000]))
        );
    }

    #[test]
    fn test_stream_keeps_heartbeat_inside_chunk_train() {
        let ctx = CodecContext::default();
        let mut base = base(N::PUBLISHER_ID | N::PAYLOAD_HEADER);
        base.messages[0].payload = DataSet::new(DataSetFieldContentFlags::NONE)
            .with("blob", Variant::ByteString(vec![9; 2000]));
        let mut msg = PubSubMessage::Uadp(UadpNetworkMessage::new(base));
        let chunks = msg.encode(&ctx, 512, None).unwrap();
        assert!(chunks.len() > 2);

        let mut heartbeat =
            UadpNetworkMessage::new(NetworkMessageBase::new(N::PUBLISHER_ID | N::PAYLOAD_HEADER, vec![]));
        heartbeat.base.publisher_id = Some("pub".into());
        let heartbeat = heartbeat.encode(&ctx, 512, None).unwrap();
        assert!(decode(&heartbeat[0], content_type::UADP, &ctx, None, None).is_some());

        let mut queue = vec![chunks[0].clone(), heartbeat[0].clone()];
        queue.extend(chunks[1..].iter().cloned());
        let decoded: Vec<_> = decode_stream(queue, content_type::UADP, &ctx, None).collect();
        assert_eq!(decoded.len(), 2);
        assert!(decoded[0].network().unwrap().messages.is_empty());
        let network = decoded[1].network().unwrap();
        assert_eq!(network.messages.len(), 1);
        assert_eq!(
            network.messages[0].payload.get("0").map(|dv| &dv.value),
            Some(&Variant::ByteString(vec![9; 2000]))
        );
    }

    #[test]
    fn test_stream_with_avro_schema() {
        let ctx = CodecContext::default();
        let mut msg = AvroNetworkMessage::new(base(N::SINGLE_DATASET_MESSAGE));
        msg.base.messages.push(msg.base.messages[0].clone());
        let frames = msg.encode(&ctx, 65536, None).unwrap();
        assert_eq!(frames.len(), 2);
        let schema = msg.schema_json().unwrap();

        let stream = decode_stream(frames.clone(), content_type::AVRO, &ctx, None);
        assert_eq!(stream.count(), 0);
        let stream = decode_stream(frames, content_type::AVRO, &ctx, None).with_message_schema(&schema);
        assert_eq!(stream.count(), 2);
    }

    #[test]
    fn test_from_config() {
        let config = EncoderConfig::from_json_str(
            r#"{"encoding": "json", "use_array_envelope": true,
                "network_message_content_mask": ["NetworkMessageHeader", "DataSetMessageHeader"],
                "dataset_message_content_mask": ["SequenceNumber"],
                "dataset_field_content_mask": ["StatusCode"]}"#,
        )
        .unwrap();
        let msg = PubSubMessage::from_config(&config, base(N::NONE)).unwrap();
        let PubSubMessage::Json(json) = &msg else {
            panic!("expected a JSON message");
        };
        assert!(json.use_array_envelope);
        assert_eq!(json.base.content_mask, N::NETWORK_MESSAGE_HEADER | N::DATASET_MESSAGE_HEADER);
        assert_eq!(json.base.messages[0].content_mask, DataSetMessageContentFlags::SEQUENCE_NUMBER);
        assert_eq!(json.base.messages[0].payload.field_mask, DataSetFieldContentFlags::STATUS_CODE);
        assert_eq!(msg.content_type(), content_type::JSON);
    }
}
