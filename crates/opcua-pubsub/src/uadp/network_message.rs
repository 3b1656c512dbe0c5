// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UADP network message.
//!
//! # Frame layout
//!
//! ```text
//! +-----------+-------------+----------+--------------+----------------+
//! | flags     | publisher   | class id | group header | payload header |
//! | (1-3 B)   | id (opt)    | (opt)    | (opt)        | (opt)          |
//! +-----------+-------------+----------+--------------+----------------+
//! | timestamp | picoseconds | security header | payload | footer (opt) |
//! +-----------+-------------+-----------------+---------+--------------+
//! ```
//!
//! The payload is either a list of dataset messages (with u16 sizes when a
//! payload header is present) or one chunk of a dataset message too large for
//! the configured frame size.
//!
//! # Packing
//!
//! All dataset messages are encoded up front. Each frame is then written with
//! as many whole messages as fit: if the candidate span does not fit it is
//! shrunk to the prefix that does (or halved when even the header does not
//! fit) and the frame is rewritten. A message that does not fit alone is sent
//! as a chunk train.

use super::chunk::{ChunkHeader, ChunkKey, ChunkReassembler, ReassemblerConfig};
use super::dataset_message;
use super::flags::{
    read_publisher_id, write_publisher_id, ExtendedFlags1, GroupFlags, NetworkFlags,
    PublisherIdType, SecurityFlags, UadpFlags,
};
use crate::binary::codec::{datetime_to_ticks, read_guid, ticks_to_datetime, write_guid};
use crate::binary::{BinaryReader, BinaryWriter};
use crate::config::{
    content_type, schema_uri, CodecContext, CHUNK_HEADER_SIZE, MAX_CHUNK_SLICE,
    MAX_MESSAGES_PER_FRAME,
};
use crate::error::{DecodeError, DecodeResult, EncodeError, EncodeResult};
use crate::flags::NetworkMessageContentFlags;
use crate::message::{MessageCodec, NetworkMessageBase};
use crate::types::MetaDataResolver;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use uuid::Uuid;

/// Security header as found on the wire. Only unsecured messages (footer
/// pass-through) are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SecurityHeader {
    pub flags: SecurityFlags,
    pub token_id: u32,
    pub nonce: Vec<u8>,
    pub footer_size: u16,
}

impl SecurityHeader {
    fn read(r: &mut BinaryReader<'_>) -> DecodeResult<Self> {
        let flags = SecurityFlags(r.read_u8()?);
        if flags.has(SecurityFlags::SIGNED) || flags.has(SecurityFlags::ENCRYPTED) {
            return Err(DecodeError::InvalidFlags(
                "signed or encrypted messages are not supported".into(),
            ));
        }
        let token_id = r.read_u32()?;
        let nonce_len = usize::from(r.read_u8()?);
        let nonce = r.read_bytes(nonce_len)?.to_vec();
        let footer_size = if flags.has(SecurityFlags::FOOTER) {
            r.read_u16()?
        } else {
            0
        };
        Ok(Self {
            flags,
            token_id,
            nonce,
            footer_size,
        })
    }
}

/// Payload header contents of one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PayloadHeader {
    Absent,
    Messages(Vec<u16>),
    Chunk(u16),
}

/// Everything before the payload, parsed without consuming the frame.
#[derive(Debug)]
struct FrameHeader {
    flags: NetworkFlags,
    publisher_id: Option<String>,
    data_set_class_id: Option<Uuid>,
    writer_group_id: u16,
    group_version: u32,
    network_message_number: u16,
    sequence_number: u16,
    payload_header: PayloadHeader,
    timestamp: Option<DateTime<Utc>>,
    picoseconds: u16,
    security: Option<SecurityHeader>,
    length: usize,
}

impl FrameHeader {
    fn read(frame: &[u8], ctx: &CodecContext) -> DecodeResult<Self> {
        let mut r = BinaryReader::new(frame);
        let flags = NetworkFlags::read(&mut r)?;
        if flags.is_discovery() {
            return Err(DecodeError::NotA("UADP data message"));
        }

        let publisher_id = if flags.uadp.has(UadpFlags::PUBLISHER_ID) {
            Some(read_publisher_id(&mut r, ctx, flags.publisher_id_type()?)?)
        } else {
            None
        };
        let data_set_class_id = if flags.ext1.has(ExtendedFlags1::DATASET_CLASS_ID) {
            Some(read_guid(&mut r)?)
        } else {
            None
        };

        let mut header = Self {
            flags,
            publisher_id,
            data_set_class_id,
            writer_group_id: 0,
            group_version: 0,
            network_message_number: 0,
            sequence_number: 0,
            payload_header: PayloadHeader::Absent,
            timestamp: None,
            picoseconds: 0,
            security: None,
            length: 0,
        };

        if flags.uadp.has(UadpFlags::GROUP_HEADER) {
            let group = GroupFlags(r.read_u8()?);
            header.flags.group = group;
            if group.has(GroupFlags::WRITER_GROUP_ID) {
                header.writer_group_id = r.read_u16()?;
            }
            if group.has(GroupFlags::GROUP_VERSION) {
                header.group_version = r.read_u32()?;
            }
            if group.has(GroupFlags::NETWORK_MESSAGE_NUMBER) {
                header.network_message_number = r.read_u16()?;
            }
            if group.has(GroupFlags::SEQUENCE_NUMBER) {
                header.sequence_number = r.read_u16()?;
            }
        }

        if flags.uadp.has(UadpFlags::PAYLOAD_HEADER) {
            header.payload_header = if flags.is_chunk() {
                PayloadHeader::Chunk(r.read_u16()?)
            } else {
                let count = usize::from(r.read_u8()?);
                let ids = (0..count)
                    .map(|_| r.read_u16())
                    .collect::<DecodeResult<Vec<u16>>>()?;
                PayloadHeader::Messages(ids)
            };
        }

        if flags.ext1.has(ExtendedFlags1::TIMESTAMP) {
            let ticks = r.read_i64()?;
            header.timestamp = (ticks != 0).then(|| ticks_to_datetime(ticks));
        }
        if flags.ext1.has(ExtendedFlags1::PICOSECONDS) {
            header.picoseconds = r.read_u16()?;
        }
        if flags.ext1.has(ExtendedFlags1::SECURITY) {
            header.security = Some(SecurityHeader::read(&mut r)?);
        }

        header.length = r.offset();
        Ok(header)
    }

    fn footer_size(&self) -> usize {
        self.security.as_ref().map_or(0, |s| usize::from(s.footer_size))
    }
}

/// One encoded dataset message waiting to be packed into frames.
#[derive(Debug)]
struct PendingMessage {
    writer_id: u16,
    data: Vec<u8>,
    offset: usize,
    sequence: u16,
}

impl PendingMessage {
    fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }
}

/// Packing state carried across frame rewrites.
#[derive(Debug, Default)]
struct Packer {
    /// First message not yet fully written.
    start: usize,
    /// Messages the current frame tries to carry.
    span: usize,
    chunk_mode: bool,
}

/// UADP network message: encodes to and decodes from binary frames.
#[derive(Debug, Clone, Default)]
pub struct UadpNetworkMessage {
    pub base: NetworkMessageBase,
    pub writer_group_id: u16,
    /// Group version, commonly seconds since 2000-01-01.
    pub group_version: u32,
    /// Incremented for every emitted frame.
    pub network_message_number: u16,
    pub sequence_number: u16,
    pub timestamp: Option<DateTime<Utc>>,
    pub picoseconds: u16,
    /// Security header of the last decoded frame, if it had one.
    pub security: Option<SecurityHeader>,
    reassembler: ChunkReassembler,
    /// Last decode consumed chunks without completing a train.
    partial: bool,
}

impl UadpNetworkMessage {
    pub fn new(base: NetworkMessageBase) -> Self {
        Self {
            base,
            ..Self::default()
        }
    }

    /// Chunk trains still waiting for frames.
    pub fn reassembler(&self) -> &ChunkReassembler {
        &self.reassembler
    }

    /// True when the last decode only buffered chunks of an unfinished train.
    pub fn is_partial(&self) -> bool {
        self.partial
    }

    pub(crate) fn replace_reassembler(&mut self, reassembler: ChunkReassembler) -> ChunkReassembler {
        std::mem::replace(&mut self.reassembler, reassembler)
    }

    fn has_payload_header(&self) -> bool {
        self.base
            .content_mask
            .contains(NetworkMessageContentFlags::PAYLOAD_HEADER)
    }

    fn write_header(
        &self,
        w: &mut BinaryWriter,
        flags: &NetworkFlags,
        network_message_number: u16,
        span: &[PendingMessage],
        chunk_mode: bool,
    ) -> EncodeResult<()> {
        flags.write(w);
        if flags.uadp.has(UadpFlags::PUBLISHER_ID) {
            let id = self
                .base
                .publisher_id
                .as_deref()
                .ok_or(EncodeError::MissingPublisherId)?;
            write_publisher_id(w, PublisherIdType::detect(id), id)?;
        }
        if flags.ext1.has(ExtendedFlags1::DATASET_CLASS_ID) {
            write_guid(w, &self.base.data_set_class_id);
        }

        if flags.uadp.has(UadpFlags::GROUP_HEADER) {
            w.write_u8(flags.group.bits());
            if flags.group.has(GroupFlags::WRITER_GROUP_ID) {
                w.write_u16(self.writer_group_id);
            }
            if flags.group.has(GroupFlags::GROUP_VERSION) {
                w.write_u32(self.group_version);
            }
            if flags.group.has(GroupFlags::NETWORK_MESSAGE_NUMBER) {
                w.write_u16(network_message_number);
            }
            if flags.group.has(GroupFlags::SEQUENCE_NUMBER) {
                w.write_u16(self.sequence_number);
            }
        }

        if flags.uadp.has(UadpFlags::PAYLOAD_HEADER) {
            if chunk_mode {
                w.write_u16(span.first().map_or(0, |m| m.writer_id));
            } else {
                w.write_u8(span.len() as u8);
                for message in span {
                    w.write_u16(message.writer_id);
                }
            }
        }

        if flags.ext1.has(ExtendedFlags1::TIMESTAMP) {
            w.write_i64(self.timestamp.as_ref().map_or(0, datetime_to_ticks));
        }
        if flags.ext1.has(ExtendedFlags1::PICOSECONDS) {
            w.write_u16(self.picoseconds);
        }
        Ok(())
    }

    /// Write the payload of the current frame.
    ///
    /// Returns `false` when the packer state changed and the frame must be
    /// rewritten from the start.
    fn try_write_payload(
        &self,
        w: &mut BinaryWriter,
        max_chunk_size: usize,
        messages: &mut [PendingMessage],
        packer: &mut Packer,
    ) -> EncodeResult<bool> {
        let header_size = w.position() + CHUNK_HEADER_SIZE;
        if header_size > max_chunk_size {
            if packer.span <= 1 {
                return Err(EncodeError::MaxChunkSizeTooSmall {
                    max_chunk_size,
                    header_size,
                });
            }
            packer.span /= 2;
            log::debug!("[uadp] header does not fit, halving span to {}", packer.span);
            return Ok(false);
        }
        let mut available = max_chunk_size - header_size;

        if packer.span == 0 {
            return Ok(true);
        }

        let size_field = if self.has_payload_header() { 2 } else { 0 };
        let first = &mut messages[packer.start];
        if packer.chunk_mode
            || first.remaining() + size_field > available
            || first.remaining() > usize::from(u16::MAX)
            || first.offset > 0
        {
            if !packer.chunk_mode {
                log::debug!(
                    "[uadp] message of writer {} ({} bytes) sent as chunks",
                    first.writer_id,
                    first.data.len()
                );
                packer.chunk_mode = true;
                packer.span = 1;
                return Ok(false);
            }

            available = available.min(MAX_CHUNK_SLICE);
            if available == 0 {
                return Err(EncodeError::MaxChunkSizeTooSmall {
                    max_chunk_size,
                    header_size: header_size + 1,
                });
            }
            ChunkHeader {
                sequence: first.sequence,
                offset: first.offset as u32,
                total_size: first.data.len() as u32,
            }
            .write(w);
            let len = first.remaining().min(available);
            w.write_i32(len as i32);
            w.write_bytes(&first.data[first.offset..first.offset + len]);
            first.offset += len;

            if first.remaining() == 0 {
                packer.start += 1;
                packer.chunk_mode = false;
            } else {
                first.sequence = first.sequence.wrapping_add(1);
            }
            return Ok(true);
        }

        let span = &messages[packer.start..packer.start + packer.span];
        let mut fit = 0;
        for message in span {
            let needed = message.remaining() + size_field;
            // a size entry cannot describe it; it starts the next frame as chunks
            let oversized = size_field != 0 && message.remaining() > usize::from(u16::MAX);
            if needed > available || oversized {
                break;
            }
            available -= needed;
            fit += 1;
        }
        if fit != packer.span {
            packer.span = fit;
            return Ok(false);
        }

        if size_field != 0 {
            for message in span {
                let size = u16::try_from(message.data.len())
                    .map_err(|_| EncodeError::ValueTooLarge("data set message size"))?;
                w.write_u16(size);
            }
        }
        for message in span {
            w.write_bytes(&message.data);
        }
        packer.start += packer.span;
        Ok(true)
    }

    fn decode_messages(
        &mut self,
        payload: &[u8],
        writer_ids: &PayloadHeader,
        ctx: &CodecContext,
        resolver: Option<&dyn MetaDataResolver>,
    ) -> DecodeResult<()> {
        let mut r = BinaryReader::new(payload);
        match writer_ids {
            PayloadHeader::Messages(ids) => {
                let sizes = ids
                    .iter()
                    .map(|_| r.read_u16())
                    .collect::<DecodeResult<Vec<u16>>>()?;
                for (writer_id, size) in ids.iter().zip(sizes) {
                    let bytes = r.read_bytes(usize::from(size))?;
                    let message =
                        dataset_message::decode(&mut BinaryReader::new(bytes), ctx, *writer_id, resolver)?;
                    self.base.messages.push(message);
                }
            }
            PayloadHeader::Chunk(writer_id) => {
                let message = dataset_message::decode(&mut r, ctx, *writer_id, resolver)?;
                self.base.messages.push(message);
            }
            PayloadHeader::Absent => {
                let message = dataset_message::decode(&mut r, ctx, 0, resolver)?;
                self.base.messages.push(message);
                while !r.is_eof() {
                    match dataset_message::decode(&mut r, ctx, 0, resolver) {
                        Ok(message) => self.base.messages.push(message),
                        Err(e) => {
                            log::debug!("[uadp] stopped reading trailing messages: {}", e);
                            break;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn apply_header(&mut self, header: &FrameHeader) {
        let mut mask = header.flags.content_mask();
        mask.set(
            NetworkMessageContentFlags::PAYLOAD_HEADER,
            header.payload_header != PayloadHeader::Absent,
        );
        self.base.content_mask = mask;
        self.base.publisher_id = header.publisher_id.clone();
        if let Some(id) = header.data_set_class_id {
            self.base.data_set_class_id = id;
        }
        self.writer_group_id = header.writer_group_id;
        self.group_version = header.group_version;
        self.network_message_number = header.network_message_number;
        self.sequence_number = header.sequence_number;
        self.timestamp = header.timestamp;
        self.picoseconds = header.picoseconds;
        self.security = header.security.clone();
    }
}

impl MessageCodec for UadpNetworkMessage {
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
        resolver: Option<&dyn MetaDataResolver>,
    ) -> EncodeResult<Vec<Vec<u8>>> {
        let mut messages = self
            .base
            .messages
            .iter()
            .map(|message| {
                let mut w = BinaryWriter::new();
                dataset_message::encode(&mut w, message, resolver)?;
                Ok(PendingMessage {
                    writer_id: message.writer_id,
                    data: w.into_inner(),
                    offset: 0,
                    sequence: 0,
                })
            })
            .collect::<EncodeResult<Vec<_>>>()?;

        let mut frames = Vec::new();
        let mut packer = Packer::default();
        // At least one frame, even without messages (heartbeat)
        loop {
            let number = self.network_message_number;
            self.network_message_number = number.wrapping_add(1);

            packer.span = (messages.len() - packer.start).min(MAX_MESSAGES_PER_FRAME);
            let mut w = BinaryWriter::with_capacity(max_chunk_size.min(64 * 1024));
            loop {
                w.truncate(0);
                let flags = NetworkFlags::derive(
                    self.base.content_mask,
                    self.base.publisher_id.as_deref(),
                    packer.chunk_mode,
                );
                let end = (packer.start + packer.span).min(messages.len());
                self.write_header(
                    &mut w,
                    &flags,
                    number,
                    &messages[packer.start..end],
                    packer.chunk_mode,
                )?;
                if self.try_write_payload(&mut w, max_chunk_size, &mut messages, &mut packer)? {
                    break;
                }
            }
            frames.push(w.into_inner());

            if packer.start >= messages.len() {
                break;
            }
        }

        log::trace!(
            "[uadp] encoded {} messages into {} frames",
            messages.len(),
            frames.len()
        );
        Ok(frames)
    }

    /// Decode the frame at the head of the queue.
    ///
    /// Chunk frames are consumed until a train completes. When the queue runs
    /// dry first, the partial train stays in the reassembler and the call
    /// returns with no messages.
    fn try_decode(
        &mut self,
        ctx: &CodecContext,
        frames: &mut VecDeque<Vec<u8>>,
        resolver: Option<&dyn MetaDataResolver>,
    ) -> DecodeResult<()> {
        self.reassembler
            .set_config(ReassemblerConfig::from_context(ctx));
        self.partial = false;
        if frames.is_empty() {
            return Err(DecodeError::Truncated {
                offset: 0,
                needed: 1,
            });
        }

        while let Some(frame) = frames.front() {
            if frame.len() > ctx.max_message_size {
                return Err(DecodeError::LimitExceeded("frame size"));
            }
            let header = FrameHeader::read(frame, ctx)?;
            let Some(frame) = frames.pop_front() else {
                break;
            };
            self.apply_header(&header);

            let end = frame
                .len()
                .checked_sub(header.footer_size())
                .filter(|end| *end >= header.length)
                .ok_or(DecodeError::Truncated {
                    offset: header.length,
                    needed: header.footer_size(),
                })?;
            let payload = &frame[header.length..end];

            if !header.flags.is_chunk() {
                self.partial = false;
                return self.decode_messages(payload, &header.payload_header, ctx, resolver);
            }

            let writer_id = match header.payload_header {
                PayloadHeader::Chunk(id) => id,
                _ => 0,
            };
            let mut r = BinaryReader::new(payload);
            let chunk = ChunkHeader::read(&mut r)?;
            let len = r.read_i32()?;
            let data = r.read_bytes(usize::try_from(len).unwrap_or(0))?.to_vec();
            let key = ChunkKey {
                publisher_id: header.publisher_id.clone().unwrap_or_default(),
                writer_id,
            };
            self.partial = true;
            if let Some(message) = self.reassembler.on_chunk(key, &chunk, data)? {
                self.partial = false;
                return self.decode_messages(
                    &message,
                    &PayloadHeader::Chunk(writer_id),
                    ctx,
                    resolver,
                );
            }
        }
        Ok(())
    }
}
