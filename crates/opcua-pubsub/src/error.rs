// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Codec error types.
//!
//! Two families:
//!
//! - [`EncodeError`]: caller or configuration mistakes (missing publisher id,
//!   chunk size smaller than any header). These abort the whole encode.
//! - [`DecodeError`]: the bytes could not be interpreted. The dispatcher treats
//!   every variant the same way and moves on to the next candidate decoder.

use std::io;
use thiserror::Error;

/// Encode failure (programming-error class, never a data problem).
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("publisher id is required by the content mask but not set")]
    MissingPublisherId,

    #[error("metadata is required but not set")]
    MissingMetaData,

    #[error("publisher id {0:?} does not fit the selected publisher id type")]
    InvalidPublisherId(String),

    #[error("reserved field encoding is not allowed")]
    ReservedFieldEncoding,

    #[error("message type {0} is not valid for a data set message")]
    InvalidMessageType(&'static str),

    #[error("max chunk size {max_chunk_size} too small for header of {header_size} bytes")]
    MaxChunkSizeTooSmall {
        max_chunk_size: usize,
        header_size: usize,
    },

    #[error("too many fields in data set ({0})")]
    TooManyFields(usize),

    #[error("value too large to encode: {0}")]
    ValueTooLarge(&'static str),

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("built-in type {0} cannot be encoded")]
    UnsupportedBuiltInType(u8),

    #[error("value does not match schema: {0}")]
    AvroSchema(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Decode failure. Never raised as a panic; callers may retry another decoder.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("truncated input at offset {offset} (needed {needed} bytes)")]
    Truncated { offset: usize, needed: usize },

    #[error("invalid flags: {0}")]
    InvalidFlags(String),

    #[error("unsupported built-in type {0}")]
    UnsupportedBuiltInType(u8),

    #[error("metadata for writer {writer_id} version {major}.{minor} not available")]
    MissingMetaData { writer_id: u16, major: u32, minor: u32 },

    #[error("reserved field encoding")]
    ReservedFieldEncoding,

    #[error("decoder limit exceeded: {0}")]
    LimitExceeded(&'static str),

    #[error("chunk reassembly failed: {0}")]
    ChunkReassembly(String),

    #[error("not a {0}")]
    NotA(&'static str),

    #[error("invalid UTF-8 in string")]
    InvalidUtf8,

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("Avro error: {0}")]
    Avro(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type EncodeResult<T> = Result<T, EncodeError>;
pub type DecodeResult<T> = Result<T, DecodeError>;
