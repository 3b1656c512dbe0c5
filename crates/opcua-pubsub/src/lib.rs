// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # opcua-pubsub - OPC UA PubSub network message codec
//!
//! Encodes and decodes OPC UA Part 14 PubSub network messages in three
//! encodings, independent of any transport.
//!
//! ## Quick Start
//!
//! ```rust
//! use opcua_pubsub::flags::{DataSetFieldContentFlags, NetworkMessageContentFlags};
//! use opcua_pubsub::{dispatch, CodecContext, DataSet, DataSetMessage, NetworkMessageBase};
//! use opcua_pubsub::{PubSubMessage, UadpNetworkMessage, Variant};
//!
//! let payload = DataSet::new(DataSetFieldContentFlags::NONE).with("0", Variant::Int32(42));
//! let base = NetworkMessageBase::new(
//!     NetworkMessageContentFlags::PAYLOAD_HEADER,
//!     vec![DataSetMessage::new(1, payload)],
//! );
//! let ctx = CodecContext::default();
//! let mut msg = PubSubMessage::from(UadpNetworkMessage::new(base));
//! let frames = dispatch::encode(&mut msg, &ctx, 65535, None).unwrap();
//!
//! let decoded = dispatch::decode(&frames[0], "application/octet-stream", &ctx, None, None).unwrap();
//! assert_eq!(decoded.network().unwrap().messages.len(), 1);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |                    dispatch (content type -> codec)                  |
//! +---------------------------------------------------------------------+
//! |   uadp (binary, chunks,  |   json (ua-data,      |   avro (schema-   |
//! |   discovery)             |   ua-metadata, gzip)  |   on-write)       |
//! +---------------------------------------------------------------------+
//! |   message (NetworkMessageBase, DataSetMessage) | flags | config      |
//! +---------------------------------------------------------------------+
//! |   types (Variant, DataValue, DataSet, metadata) | binary | compress  |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`PubSubMessage`] | Any decodable message, returned by [`dispatch::decode`] |
//! | [`UadpNetworkMessage`] | Binary data message with chunking |
//! | [`JsonNetworkMessage`] | JSON data message |
//! | [`AvroNetworkMessage`] | Avro data message with a generated schema |
//! | [`MetaDataStore`] | Writer metadata used to decode RawData payloads |
//! | [`EncoderConfig`] | Encoding and masks loaded from YAML or JSON |

/// Avro binary encoding and schema generation.
pub mod avro;
/// Little-endian cursor and OPC UA binary built-in encodings.
pub mod binary;
/// Gzip helpers with a decompression limit.
pub mod compress;
/// Constants, limits and encoder configuration.
pub mod config;
/// Content-type dispatch and streaming decode.
pub mod dispatch;
/// Encode and decode errors.
pub mod error;
/// Content mask bit sets.
pub mod flags;
/// JSON network and metadata messages.
pub mod json;
/// Encoding-independent message model and the codec trait.
pub mod message;
/// OPC UA built-in values and dataset metadata.
pub mod types;
/// UADP network, discovery and chunk messages.
pub mod uadp;

pub use avro::AvroNetworkMessage;
pub use config::{CodecContext, ConfigError, EncoderConfig, MessageEncoding};
pub use dispatch::{decode, decode_stream, encode, DecodeStream, PubSubMessage};
pub use error::{DecodeError, DecodeResult, EncodeError, EncodeResult};
pub use json::{JsonMetaDataMessage, JsonNetworkMessage};
pub use message::{DataSetMessage, MessageCodec, MessageIdSource, MessageType, NetworkMessageBase};
pub use types::{
    BuiltInType, DataSet, DataSetMetaData, DataValue, FieldMetaData, MetaDataResolver,
    MetaDataStore, NodeId, StatusCode, Variant,
};
pub use uadp::{ChunkReassembler, UadpDiscoveryMessage, UadpNetworkMessage};
