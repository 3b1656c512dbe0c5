// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Encoding-neutral message model.
//!
//! [`DataSetMessage`] and [`NetworkMessageBase`] hold the fields every encoding
//! shares. Each encoding module wraps them in its own network message type and
//! implements [`MessageCodec`].

use crate::config::{message_type, CodecContext};
use crate::error::{DecodeResult, EncodeResult};
use crate::flags::{DataSetMessageContentFlags, NetworkMessageContentFlags};
use crate::types::{ConfigurationVersion, DataSet, MetaDataResolver, StatusCode};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use uuid::Uuid;

/// Dataset message kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MessageType {
    #[default]
    KeyFrame,
    DeltaFrame,
    Event,
    KeepAlive,
    Condition,
    Metadata,
    Closed,
}

impl MessageType {
    /// JSON `MessageType` literal for data-carrying kinds.
    pub fn json_name(&self) -> Option<&'static str> {
        Some(match self {
            MessageType::KeyFrame => message_type::KEY_FRAME,
            MessageType::DeltaFrame => message_type::DELTA_FRAME,
            MessageType::Event => message_type::EVENT,
            MessageType::KeepAlive => message_type::KEEP_ALIVE,
            MessageType::Condition => message_type::CONDITION,
            MessageType::Metadata | MessageType::Closed => return None,
        })
    }

    /// Closed vocabulary; anything else is `None`.
    pub fn from_json_name(name: &str) -> Option<Self> {
        [
            MessageType::KeyFrame,
            MessageType::DeltaFrame,
            MessageType::Event,
            MessageType::KeepAlive,
            MessageType::Condition,
        ]
        .into_iter()
        .find(|t| t.json_name().is_some_and(|n| n.eq_ignore_ascii_case(name)))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::KeyFrame => "KeyFrame",
            MessageType::DeltaFrame => "DeltaFrame",
            MessageType::Event => "Event",
            MessageType::KeepAlive => "KeepAlive",
            MessageType::Condition => "Condition",
            MessageType::Metadata => "Metadata",
            MessageType::Closed => "Closed",
        }
    }
}

/// One dataset message. Fields outside `content_mask` are not written.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataSetMessage {
    pub content_mask: DataSetMessageContentFlags,
    pub message_type: MessageType,
    pub writer_id: u16,
    pub writer_name: Option<String>,
    pub metadata_version: Option<ConfigurationVersion>,
    pub sequence_number: u32,
    pub timestamp: Option<DateTime<Utc>>,
    pub picoseconds: u16,
    /// Defaults to the worst payload status when `None`.
    pub status: Option<StatusCode>,
    pub payload: DataSet,
    /// JSON only: carry the writer name in `DataSetWriterId`.
    pub use_compatibility_mode: bool,
}

impl DataSetMessage {
    pub fn new(writer_id: u16, payload: DataSet) -> Self {
        Self {
            writer_id,
            payload,
            ..Self::default()
        }
    }

    /// Explicit status, else the first non-Good payload status.
    pub fn effective_status(&self) -> StatusCode {
        self.status.unwrap_or_else(|| self.payload.worst_status())
    }

    /// Version used to look up metadata: missing parts default to 1.0.
    pub fn resolver_version(&self) -> (u32, u32) {
        match self.metadata_version {
            Some(v) => (
                if v.major_version == 0 { 1 } else { v.major_version },
                v.minor_version,
            ),
            None => (1, 0),
        }
    }
}

/// Message id strategy for JSON and Avro headers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MessageIdSource {
    /// Fresh UUID v4 for every written header.
    #[default]
    Random,
    Fixed(String),
}

impl MessageIdSource {
    pub fn next_id(&self) -> String {
        match self {
            MessageIdSource::Random => Uuid::new_v4().to_string(),
            MessageIdSource::Fixed(id) => id.clone(),
        }
    }
}

/// Network message fields shared by all encodings.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NetworkMessageBase {
    pub content_mask: NetworkMessageContentFlags,
    pub data_set_class_id: Uuid,
    pub publisher_id: Option<String>,
    pub data_set_writer_group: Option<String>,
    pub messages: Vec<DataSetMessage>,
}

impl NetworkMessageBase {
    pub fn new(content_mask: NetworkMessageContentFlags, messages: Vec<DataSetMessage>) -> Self {
        Self {
            content_mask,
            messages,
            ..Self::default()
        }
    }

    pub fn is_single(&self) -> bool {
        self.content_mask
            .contains(NetworkMessageContentFlags::SINGLE_DATASET_MESSAGE)
    }
}

/// Encode/decode contract of a concrete network message type.
pub trait MessageCodec {
    fn content_type(&self) -> &'static str;

    fn message_schema(&self) -> &'static str;

    /// Encode into one or more frames, each at most `max_chunk_size` bytes
    /// wherever the encoding allows it.
    fn encode(
        &mut self,
        ctx: &CodecContext,
        max_chunk_size: usize,
        resolver: Option<&dyn MetaDataResolver>,
    ) -> EncodeResult<Vec<Vec<u8>>>;

    /// Decode from the head of `frames`, consuming what was used.
    ///
    /// On error the first frame is left in place when it was not recognized,
    /// so another decoder can be tried.
    fn try_decode(
        &mut self,
        ctx: &CodecContext,
        frames: &mut VecDeque<Vec<u8>>,
        resolver: Option<&dyn MetaDataResolver>,
    ) -> DecodeResult<()>;
}
