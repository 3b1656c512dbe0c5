// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Gzip framing for the `application/json;gzip` and `avro/gzip` content types.

use crate::error::{DecodeError, DecodeResult, EncodeResult};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// True when `buf` starts with the gzip member header.
pub fn is_gzip(buf: &[u8]) -> bool {
    buf.starts_with(&GZIP_MAGIC)
}

pub fn gzip(buf: &[u8]) -> EncodeResult<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(buf)?;
    let compressed = encoder.finish()?;
    log::trace!("[gzip] {} bytes -> {} bytes", buf.len(), compressed.len());
    Ok(compressed)
}

/// Inflate at most `limit` bytes; larger output is rejected.
pub fn gunzip(buf: &[u8], limit: usize) -> DecodeResult<Vec<u8>> {
    let decoder = GzDecoder::new(buf);
    let mut out = Vec::new();
    decoder
        .take((limit as u64).saturating_add(1))
        .read_to_end(&mut out)?;
    if out.len() > limit {
        return Err(DecodeError::LimitExceeded("inflated message size"));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gzip_round_trip() {
        let original: Vec<u8> = b"{\"Value\":25}".iter().cycle().take(600).copied().collect();
        let compressed = gzip(&original).unwrap();
        assert!(is_gzip(&compressed));
        assert!(compressed.len() < original.len());
        assert_eq!(gunzip(&compressed, 4096).unwrap(), original);
    }

    #[test]
    fn test_gunzip_limit() {
        let compressed = gzip(&[0u8; 2048]).unwrap();
        assert!(matches!(
            gunzip(&compressed, 1024),
            Err(DecodeError::LimitExceeded(_))
        ));
    }

    #[test]
    fn test_gunzip_invalid_data() {
        assert!(!is_gzip(b"{}"));
        assert!(gunzip(b"\x1f\x8b\xff\xff\xff\xff", 1024).is_err());
    }
}
