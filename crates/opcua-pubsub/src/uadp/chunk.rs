// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Chunk reassembly for UADP chunk messages.
//!
//! A dataset message too large for one frame is sent as a train of chunk
//! frames. Each carries the writer id in its payload header and a chunk
//! header:
//!
//! ```text
//! ChunkHeader = sequence(u16) | offset(u32) | total_size(u32) | slice(i32 length + bytes)
//! ```
//!
//! - `sequence`: position of the chunk in its train, starting at 0
//! - `offset`: byte offset of the slice in the original message
//! - `total_size`: length of the original message, equal on every chunk
//!
//! Trains are keyed per stream by `(publisher id, writer id)`, so chunks of
//! different streams can interleave.

use crate::binary::{BinaryReader, BinaryWriter};
use crate::config::CodecContext;
use crate::error::{DecodeError, DecodeResult};
use std::collections::HashMap;
use std::time::Instant;

/// Chunk header fields (the slice length is part of the byte string).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub sequence: u16,
    pub offset: u32,
    pub total_size: u32,
}

impl ChunkHeader {
    pub fn write(&self, w: &mut BinaryWriter) {
        w.write_u16(self.sequence);
        w.write_u32(self.offset);
        w.write_u32(self.total_size);
    }

    pub fn read(r: &mut BinaryReader<'_>) -> DecodeResult<Self> {
        Ok(Self {
            sequence: r.read_u16()?,
            offset: r.read_u32()?,
            total_size: r.read_u32()?,
        })
    }
}

// ============================================================================
// Reassembler
// ============================================================================

/// Reassembler limits.
#[derive(Debug, Clone)]
pub struct ReassemblerConfig {
    /// Maximum trains in flight.
    pub max_pending: usize,
    /// Maximum reassembled message size.
    pub max_message_size: usize,
}

impl Default for ReassemblerConfig {
    fn default() -> Self {
        Self::from_context(&CodecContext::default())
    }
}

impl ReassemblerConfig {
    pub fn from_context(ctx: &CodecContext) -> Self {
        Self {
            max_pending: ctx.max_pending_chunks,
            max_message_size: ctx.max_message_size,
        }
    }
}

/// Train identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChunkKey {
    pub publisher_id: String,
    pub writer_id: u16,
}

#[derive(Debug, Clone)]
struct PendingTrain {
    total_size: u32,
    received: usize,
    /// `(sequence, offset, slice)`
    chunks: Vec<(u16, u32, Vec<u8>)>,
    created_at: Instant,
}

impl PendingTrain {
    fn new(total_size: u32) -> Self {
        Self {
            total_size,
            received: 0,
            chunks: Vec::new(),
            created_at: Instant::now(),
        }
    }

    /// Concatenate in sequence order; sequences must be contiguous from 0 and
    /// every slice must start where the previous one ended.
    fn reassemble(mut self) -> DecodeResult<Vec<u8>> {
        self.chunks.sort_by_key(|(seq, _, _)| *seq);
        let mut payload = Vec::with_capacity(self.total_size as usize);
        for (expected, (seq, offset, data)) in self.chunks.into_iter().enumerate() {
            if seq as usize != expected {
                return Err(DecodeError::ChunkReassembly(format!(
                    "chunk sequence gap: expected {} got {}",
                    expected, seq
                )));
            }
            if offset as usize != payload.len() {
                return Err(DecodeError::ChunkReassembly(format!(
                    "chunk {} at offset {}, expected {}",
                    seq,
                    offset,
                    payload.len()
                )));
            }
            payload.extend_from_slice(&data);
        }
        if payload.len() != self.total_size as usize {
            return Err(DecodeError::ChunkReassembly(format!(
                "reassembled {} bytes, expected {}",
                payload.len(),
                self.total_size
            )));
        }
        Ok(payload)
    }
}

/// Reassembler statistics.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReassemblerStats {
    pub chunks_received: u64,
    pub messages_reassembled: u64,
    pub duplicates_dropped: u64,
    /// Trains dropped on error or eviction.
    pub trains_discarded: u64,
    pub pending_trains: usize,
}

/// Per-stream chunk reassembler.
#[derive(Debug, Clone, Default)]
pub struct ChunkReassembler {
    config: ReassemblerConfig,
    pending: HashMap<ChunkKey, PendingTrain>,
    stats: ReassemblerStats,
}

impl ChunkReassembler {
    pub fn new(config: ReassemblerConfig) -> Self {
        Self {
            config,
            pending: HashMap::new(),
            stats: ReassemblerStats::default(),
        }
    }

    pub fn set_config(&mut self, config: ReassemblerConfig) {
        self.config = config;
    }

    pub fn stats(&self) -> ReassemblerStats {
        let mut stats = self.stats.clone();
        stats.pending_trains = self.pending.len();
        stats
    }

    /// Add a chunk. Returns the message when the train is complete.
    ///
    /// A total size differing from the train's, or a sequence gap at
    /// completion, discards the train.
    pub fn on_chunk(
        &mut self,
        key: ChunkKey,
        header: &ChunkHeader,
        data: Vec<u8>,
    ) -> DecodeResult<Option<Vec<u8>>> {
        self.stats.chunks_received += 1;

        if header.total_size as usize > self.config.max_message_size {
            return Err(DecodeError::LimitExceeded("chunked message size"));
        }

        if !self.pending.contains_key(&key) && self.pending.len() >= self.config.max_pending {
            self.evict_oldest();
        }
        let train = self
            .pending
            .entry(key.clone())
            .or_insert_with(|| PendingTrain::new(header.total_size));

        if train.total_size != header.total_size {
            let expected = train.total_size;
            self.discard(&key);
            return Err(DecodeError::ChunkReassembly(format!(
                "total size changed from {} to {}",
                expected, header.total_size
            )));
        }

        if train.chunks.iter().any(|(seq, _, _)| *seq == header.sequence) {
            self.stats.duplicates_dropped += 1;
            return Ok(None);
        }

        train.received += data.len();
        train.chunks.push((header.sequence, header.offset, data));
        if train.received < train.total_size as usize {
            return Ok(None);
        }

        let Some(train) = self.pending.remove(&key) else {
            return Ok(None);
        };
        match train.reassemble() {
            Ok(payload) => {
                self.stats.messages_reassembled += 1;
                log::trace!(
                    "[chunk] reassembled {} bytes for writer {}",
                    payload.len(),
                    key.writer_id
                );
                Ok(Some(payload))
            }
            Err(e) => {
                self.stats.trains_discarded += 1;
                log::debug!("[chunk] discarded train for writer {}: {}", key.writer_id, e);
                Err(e)
            }
        }
    }

    fn discard(&mut self, key: &ChunkKey) {
        if self.pending.remove(key).is_some() {
            self.stats.trains_discarded += 1;
            log::debug!("[chunk] discarded train for writer {}", key.writer_id);
        }
    }

    fn evict_oldest(&mut self) {
        if let Some(oldest) = self
            .pending
            .iter()
            .min_by_key(|(_, t)| t.created_at)
            .map(|(k, _)| k.clone())
        {
            self.discard(&oldest);
        }
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
