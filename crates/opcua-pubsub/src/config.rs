// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wire constants, decoder limits and producer configuration.
//!
//! # Example YAML
//!
//! ```yaml
//! encoding: json
//! max_chunk_size: 262144
//! use_gzip_compression: true
//! network_message_content_mask: [NetworkMessageHeader, DataSetMessageHeader, PublisherId]
//! dataset_message_content_mask: 0x7f        # JsonDataSetMessageContentMask
//! dataset_field_content_mask: [StatusCode, SourceTimestamp]
//! ```

use crate::flags::{
    DataSetFieldContentFlags, DataSetMessageContentFlags, NetworkMessageContentFlags, UnknownFlag,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

// ============================================================================
// Wire constants
// ============================================================================

/// UADP protocol version carried in the low nibble of UADPFlags.
pub const UADP_VERSION: u8 = 1;

/// Chunk header: u16 sequence, u32 offset, u32 total size, i32 slice length.
pub const CHUNK_HEADER_SIZE: usize = 14;

/// Payload header count is a single byte.
pub const MAX_MESSAGES_PER_FRAME: usize = 255;

/// Largest chunk slice (u16 size field).
pub const MAX_CHUNK_SLICE: usize = 65535;

pub const DEFAULT_MAX_CHUNK_SIZE: usize = 256 * 1024;

/// 100 ns ticks between 1601-01-01 and 1970-01-01.
pub const UNIX_EPOCH_TICKS: i64 = 116_444_736_000_000_000;

/// Transport content types.
pub mod content_type {
    pub const JSON: &str = "application/json";
    pub const JSON_GZIP: &str = "application/json;gzip";
    pub const UADP: &str = "application/octet-stream";
    pub const AVRO: &str = "avro/binary";
    pub const AVRO_GZIP: &str = "avro/gzip";
}

/// Message schema identifiers.
pub mod schema_uri {
    pub const NETWORK_MESSAGE_JSON: &str = "application/ua+json";
    pub const NETWORK_MESSAGE_UADP: &str = "application/ua+uadp";
    pub const NETWORK_MESSAGE_AVRO: &str = "application/ua+avro";
    pub const MONITORED_ITEM_MESSAGE_JSON: &str = "application/x-monitored-item-json-v1";
}

/// JSON message type literals.
pub mod message_type {
    pub const DATA: &str = "ua-data";
    pub const METADATA: &str = "ua-metadata";
    pub const KEY_FRAME: &str = "ua-keyframe";
    pub const DELTA_FRAME: &str = "ua-deltaframe";
    pub const EVENT: &str = "ua-event";
    pub const KEEP_ALIVE: &str = "ua-keepalive";
    pub const CONDITION: &str = "ua-condition";
}

/// JSON field names (exact on encode, case-insensitive on decode).
pub mod field {
    pub const MESSAGE_ID: &str = "MessageId";
    pub const MESSAGE_TYPE: &str = "MessageType";
    pub const PUBLISHER_ID: &str = "PublisherId";
    pub const DATASET_CLASS_ID: &str = "DataSetClassId";
    pub const DATASET_WRITER_GROUP: &str = "DataSetWriterGroup";
    pub const MESSAGES: &str = "Messages";
    pub const DATASET_WRITER_ID: &str = "DataSetWriterId";
    pub const SEQUENCE_NUMBER: &str = "SequenceNumber";
    pub const METADATA_VERSION: &str = "MetaDataVersion";
    pub const MAJOR_VERSION: &str = "MajorVersion";
    pub const MINOR_VERSION: &str = "MinorVersion";
    pub const TIMESTAMP: &str = "Timestamp";
    pub const STATUS: &str = "Status";
    pub const DATASET_WRITER_NAME: &str = "DataSetWriterName";
    pub const PAYLOAD: &str = "Payload";
    pub const METADATA: &str = "MetaData";

    pub const VALUE: &str = "Value";
    pub const STATUS_CODE: &str = "StatusCode";
    pub const SOURCE_TIMESTAMP: &str = "SourceTimestamp";
    pub const SOURCE_PICOSECONDS: &str = "SourcePicoseconds";
    pub const SERVER_TIMESTAMP: &str = "ServerTimestamp";
    pub const SERVER_PICOSECONDS: &str = "ServerPicoseconds";
    pub const TYPE: &str = "Type";
    pub const BODY: &str = "Body";
    pub const CODE: &str = "Code";
    pub const SYMBOL: &str = "Symbol";
}

// ============================================================================
// Codec context
// ============================================================================

/// Shared encoding context and decoder safety limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecContext {
    /// Namespace table; index 0 is the OPC UA namespace.
    pub namespace_uris: Vec<String>,
    pub max_string_length: usize,
    pub max_byte_string_length: usize,
    pub max_array_length: usize,
    /// Largest accepted frame or reassembled message.
    pub max_message_size: usize,
    /// Chunk trains kept in flight per reassembler.
    pub max_pending_chunks: usize,
}

impl Default for CodecContext {
    fn default() -> Self {
        Self {
            namespace_uris: vec!["http://opcfoundation.org/UA/".to_string()],
            max_string_length: 16 * 1024 * 1024,
            max_byte_string_length: 16 * 1024 * 1024,
            max_array_length: 1024 * 1024,
            max_message_size: 64 * 1024 * 1024,
            max_pending_chunks: 256,
        }
    }
}

impl CodecContext {
    pub fn namespace_uri(&self, index: u16) -> Option<&str> {
        self.namespace_uris.get(index as usize).map(String::as_str)
    }

    /// Index of `uri`, appending it when unknown.
    pub fn namespace_index(&mut self, uri: &str) -> u16 {
        if let Some(pos) = self.namespace_uris.iter().position(|u| u == uri) {
            return pos as u16;
        }
        self.namespace_uris.push(uri.to_string());
        (self.namespace_uris.len() - 1) as u16
    }
}

// ============================================================================
// Encoder configuration
// ============================================================================

/// Configuration loading error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "config-yaml")]
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    UnknownFlag(#[from] UnknownFlag),

    #[error("unsupported configuration format: {0}")]
    UnsupportedFormat(String),
}

/// Wire encoding selected by a configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageEncoding {
    Uadp,
    #[default]
    Json,
    Avro,
}

/// A content mask given as a stack mask number or a list of flag names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaskSpec {
    Bits(u32),
    Names(Vec<String>),
}

impl Default for MaskSpec {
    fn default() -> Self {
        MaskSpec::Bits(0)
    }
}

/// Producer options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub encoding: MessageEncoding,
    pub max_chunk_size: usize,
    pub use_gzip_compression: bool,
    pub use_array_envelope: bool,
    pub use_compatibility_mode: bool,
    pub use_advanced_encoding: bool,
    pub network_message_content_mask: MaskSpec,
    pub dataset_message_content_mask: MaskSpec,
    pub dataset_field_content_mask: MaskSpec,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            encoding: MessageEncoding::Json,
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            use_gzip_compression: false,
            use_array_envelope: false,
            use_compatibility_mode: false,
            use_advanced_encoding: false,
            network_message_content_mask: MaskSpec::Names(vec![
                "NetworkMessageHeader".into(),
                "DataSetMessageHeader".into(),
                "PublisherId".into(),
            ]),
            dataset_message_content_mask: MaskSpec::Bits(0),
            dataset_field_content_mask: MaskSpec::Bits(0),
        }
    }
}

impl EncoderConfig {
    #[cfg(feature = "config-yaml")]
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from a `.json`, `.yaml` or `.yml` file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "json" => Self::from_json_str(&content),
            #[cfg(feature = "config-yaml")]
            "yaml" | "yml" => Self::from_yaml_str(&content),
            other => Err(ConfigError::UnsupportedFormat(other.to_string())),
        }
    }

    /// Network mask; numbers are read as the stack mask of `encoding`.
    pub fn network_flags(&self) -> Result<NetworkMessageContentFlags, ConfigError> {
        Ok(match &self.network_message_content_mask {
            MaskSpec::Bits(bits) => match self.encoding {
                MessageEncoding::Uadp => NetworkMessageContentFlags::from_uadp_stack(*bits),
                MessageEncoding::Json | MessageEncoding::Avro => {
                    NetworkMessageContentFlags::from_json_stack(*bits)
                }
            },
            MaskSpec::Names(names) => NetworkMessageContentFlags::from_names(names)?,
        })
    }

    pub fn dataset_flags(&self) -> Result<DataSetMessageContentFlags, ConfigError> {
        Ok(match &self.dataset_message_content_mask {
            MaskSpec::Bits(bits) => match self.encoding {
                MessageEncoding::Uadp => DataSetMessageContentFlags::from_uadp_stack(*bits),
                MessageEncoding::Json | MessageEncoding::Avro => {
                    DataSetMessageContentFlags::from_json_stack(*bits)
                }
            },
            MaskSpec::Names(names) => DataSetMessageContentFlags::from_names(names)?,
        })
    }

    pub fn field_flags(&self) -> Result<DataSetFieldContentFlags, ConfigError> {
        Ok(match &self.dataset_field_content_mask {
            MaskSpec::Bits(bits) => DataSetFieldContentFlags::from_stack(*bits),
            MaskSpec::Names(names) => DataSetFieldContentFlags::from_names(names)?,
        })
    }

    /// Transport content type produced by this configuration.
    pub fn content_type(&self) -> &'static str {
        match (self.encoding, self.use_gzip_compression) {
            (MessageEncoding::Uadp, _) => content_type::UADP,
            (MessageEncoding::Json, false) => content_type::JSON,
            (MessageEncoding::Json, true) => content_type::JSON_GZIP,
            (MessageEncoding::Avro, false) => content_type::AVRO,
            (MessageEncoding::Avro, true) => content_type::AVRO_GZIP,
        }
    }
}
