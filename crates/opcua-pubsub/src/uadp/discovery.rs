// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UADP discovery messages: metadata probes and metadata announcements.
//!
//! ```text
//! probe:        flags | publisher id | info type (u8) | writer ids (i32 count + u16...)
//! announcement: flags | publisher id | info type (u8) | seq (u16) | writer id (u16)
//!               | DataSetMetaData | status (u32)
//! ```

use super::flags::{
    read_publisher_id, write_publisher_id, ExtendedFlags2, NetworkFlags, PublisherIdType, UadpFlags,
};
use crate::binary::codec::{read_metadata, write_metadata};
use crate::binary::{BinaryReader, BinaryWriter};
use crate::config::{content_type, schema_uri, CodecContext};
use crate::error::{DecodeError, DecodeResult, EncodeError, EncodeResult};
use crate::message::MessageCodec;
use crate::types::{DataSetMetaData, MetaDataResolver, MetaDataStore, StatusCode};
use std::collections::VecDeque;
use std::sync::Arc;

const INFO_PUBLISHER_ENDPOINTS: u8 = 1;
const INFO_DATASET_METADATA: u8 = 2;
const INFO_DATASET_WRITER_CONFIGURATION: u8 = 3;

/// Discovery payload.
#[derive(Debug, Clone, PartialEq)]
pub enum DiscoveryPayload {
    /// Request for the metadata of the listed writers.
    Probe { writer_ids: Vec<u16> },
    /// Metadata announcement of one writer.
    MetaData {
        sequence_number: u16,
        writer_id: u16,
        metadata: Option<DataSetMetaData>,
        status: StatusCode,
    },
}

impl Default for DiscoveryPayload {
    fn default() -> Self {
        DiscoveryPayload::MetaData {
            sequence_number: 0,
            writer_id: 0,
            metadata: None,
            status: StatusCode::GOOD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UadpDiscoveryMessage {
    pub publisher_id: Option<String>,
    pub payload: DiscoveryPayload,
}

impl UadpDiscoveryMessage {
    pub fn announcement(publisher_id: impl Into<String>, writer_id: u16, metadata: DataSetMetaData) -> Self {
        Self {
            publisher_id: Some(publisher_id.into()),
            payload: DiscoveryPayload::MetaData {
                sequence_number: 0,
                writer_id,
                metadata: Some(metadata),
                status: StatusCode::GOOD,
            },
        }
    }

    pub fn probe(publisher_id: impl Into<String>, writer_ids: Vec<u16>) -> Self {
        Self {
            publisher_id: Some(publisher_id.into()),
            payload: DiscoveryPayload::Probe { writer_ids },
        }
    }

    /// Store announced metadata so later RawData frames can be decoded.
    pub fn register(&self, store: &MetaDataStore) -> Option<Arc<DataSetMetaData>> {
        match &self.payload {
            DiscoveryPayload::MetaData {
                writer_id,
                metadata: Some(metadata),
                status,
                ..
            } if status.is_good() => Some(store.insert(*writer_id, metadata.clone())),
            _ => None,
        }
    }

    fn read(frame: &[u8], ctx: &CodecContext) -> DecodeResult<Self> {
        let mut r = BinaryReader::new(frame);
        let flags = NetworkFlags::read(&mut r)?;
        let kind = flags.ext2.bits() & ExtendedFlags2::MESSAGE_TYPE_MASK;
        if kind != ExtendedFlags2::DISCOVERY_PROBE && kind != ExtendedFlags2::DISCOVERY_ANNOUNCEMENT {
            return Err(DecodeError::NotA("UADP discovery message"));
        }
        let publisher_id = if flags.uadp.has(UadpFlags::PUBLISHER_ID) {
            Some(read_publisher_id(&mut r, ctx, flags.publisher_id_type()?)?)
        } else {
            None
        };

        let info = r.read_u8()?;
        match info {
            INFO_DATASET_METADATA => {}
            INFO_PUBLISHER_ENDPOINTS | INFO_DATASET_WRITER_CONFIGURATION => {
                return Err(DecodeError::InvalidValue(format!(
                    "discovery information type {} is not supported",
                    info
                )))
            }
            other => {
                return Err(DecodeError::InvalidFlags(format!(
                    "unknown discovery information type {}",
                    other
                )))
            }
        }

        let payload = if kind == ExtendedFlags2::DISCOVERY_PROBE {
            let count = r.read_i32()?;
            let count = usize::try_from(count).unwrap_or(0);
            if count > ctx.max_array_length {
                return Err(DecodeError::LimitExceeded("probe writer ids"));
            }
            let writer_ids = (0..count)
                .map(|_| r.read_u16())
                .collect::<DecodeResult<Vec<u16>>>()?;
            DiscoveryPayload::Probe { writer_ids }
        } else {
            let sequence_number = r.read_u16()?;
            let writer_id = r.read_u16()?;
            let metadata = read_metadata(&mut r, ctx)?;
            let status = StatusCode(r.read_u32()?);
            DiscoveryPayload::MetaData {
                sequence_number,
                writer_id,
                metadata: Some(metadata),
                status,
            }
        };
        Ok(Self {
            publisher_id,
            payload,
        })
    }
}

impl MessageCodec for UadpDiscoveryMessage {
    fn content_type(&self) -> &'static str {
        content_type::UADP
    }

    fn message_schema(&self) -> &'static str {
        schema_uri::NETWORK_MESSAGE_UADP
    }

    fn encode(
        &mut self,
        _ctx: &CodecContext,
        max_chunk_size: usize,
        _resolver: Option<&dyn MetaDataResolver>,
    ) -> EncodeResult<Vec<Vec<u8>>> {
        let publisher_id = self
            .publisher_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or(EncodeError::MissingPublisherId)?;

        let mut w = BinaryWriter::new();
        match &self.payload {
            DiscoveryPayload::Probe { writer_ids } => {
                let flags = NetworkFlags::discovery(publisher_id, ExtendedFlags2::DISCOVERY_PROBE);
                flags.write(&mut w);
                write_publisher_id(&mut w, PublisherIdType::detect(publisher_id), publisher_id)?;
                w.write_u8(INFO_DATASET_METADATA);
                let count = i32::try_from(writer_ids.len())
                    .map_err(|_| EncodeError::ValueTooLarge("probe writer ids"))?;
                w.write_i32(count);
                for id in writer_ids {
                    w.write_u16(*id);
                }
            }
            DiscoveryPayload::MetaData {
                sequence_number,
                writer_id,
                metadata,
                status,
            } => {
                let metadata = metadata.as_ref().ok_or(EncodeError::MissingMetaData)?;
                let flags =
                    NetworkFlags::discovery(publisher_id, ExtendedFlags2::DISCOVERY_ANNOUNCEMENT);
                flags.write(&mut w);
                write_publisher_id(&mut w, PublisherIdType::detect(publisher_id), publisher_id)?;
                w.write_u8(INFO_DATASET_METADATA);
                w.write_u16(*sequence_number);
                w.write_u16(*writer_id);
                write_metadata(&mut w, metadata)?;
                w.write_u32(status.code());
            }
        }

        let frame = w.into_inner();
        if frame.len() > max_chunk_size {
            log::debug!(
                "[uadp] discovery frame of {} bytes exceeds max chunk size {}",
                frame.len(),
                max_chunk_size
            );
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
        *self = Self::read(frame, ctx)?;
        frames.pop_front();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BuiltInType, FieldMetaData};

    fn metadata() -> DataSetMetaData {
        DataSetMetaData::new(
            "pump",
            vec![
                FieldMetaData::scalar("pressure", BuiltInType::Float),
                FieldMetaData::array("alarms", BuiltInType::Boolean),
            ],
        )
    }

    fn decode(frame: Vec<u8>) -> DecodeResult<UadpDiscoveryMessage> {
        let mut queue: VecDeque<Vec<u8>> = vec![frame].into();
        let mut out = UadpDiscoveryMessage::default();
        out.try_decode(&CodecContext::default(), &mut queue, None)?;
        Ok(out)
    }

    #[test]
    fn test_announcement_round_trip() {
        let mut msg = UadpDiscoveryMessage::announcement("1000", 3, metadata());
        let frames = msg.encode(&CodecContext::default(), 4096, None).unwrap();
        assert_eq!(frames.len(), 1);
        // version 1 + PublisherId + ExtendedFlags1, UInt16 id + ExtendedFlags2
        assert_eq!(&frames[0][..3], &[0x91, 0x81, 0x08]);

        let out = decode(frames[0].clone()).unwrap();
        assert_eq!(out, msg);
    }

    #[test]
    fn test_probe_round_trip() {
        let mut msg = UadpDiscoveryMessage::probe("pub-a", vec![1, 2, 3]);
        let frames = msg.encode(&CodecContext::default(), 4096, None).unwrap();
        assert_eq!(decode(frames[0].clone()).unwrap(), msg);
    }

    #[test]
    fn test_encode_preconditions() {
        let mut msg = UadpDiscoveryMessage::announcement("", 3, metadata());
        assert!(matches!(
            msg.encode(&CodecContext::default(), 4096, None),
            Err(EncodeError::MissingPublisherId)
        ));

        let mut msg = UadpDiscoveryMessage {
            publisher_id: Some("7".into()),
            payload: DiscoveryPayload::default(),
        };
        assert!(matches!(
            msg.encode(&CodecContext::default(), 4096, None),
            Err(EncodeError::MissingMetaData)
        ));
    }

    #[test]
    fn test_data_frame_is_not_discovery() {
        let mut queue: VecDeque<Vec<u8>> = vec![vec![0x01, 0x01, 0x00]].into();
        let mut out = UadpDiscoveryMessage::default();
        assert!(matches!(
            out.try_decode(&CodecContext::default(), &mut queue, None),
            Err(DecodeError::NotA(_))
        ));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_other_information_types_rejected() {
        let mut w = BinaryWriter::new();
        NetworkFlags::discovery("1", ExtendedFlags2::DISCOVERY_ANNOUNCEMENT).write(&mut w);
        w.write_u8(1);
        w.write_u8(INFO_PUBLISHER_ENDPOINTS);
        assert!(matches!(
            decode(w.into_inner()),
            Err(DecodeError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_register_into_store() {
        let store = MetaDataStore::new();
        let msg = UadpDiscoveryMessage::announcement("1", 11, metadata());
        assert!(msg.register(&store).is_some());
        assert!(store.resolve(11, 1, 0).is_some());
        assert!(UadpDiscoveryMessage::probe("1", vec![11])
            .register(&store)
            .is_none());
    }
}
