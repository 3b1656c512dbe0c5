// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![no_main]

use libfuzzer_sys::fuzz_target;
use opcua_pubsub::{decode, decode_stream, CodecContext};

fuzz_target!(|data: &[u8]| {
    let ctx = CodecContext::default();

    // Whole buffer as one frame (data and discovery decoders)
    let _ = decode(data, "application/octet-stream", &ctx, None, None);

    // Split into frames to exercise chunk reassembly
    let frames: Vec<Vec<u8>> = data.chunks(64).map(<[u8]>::to_vec).collect();
    for _ in decode_stream(frames, "application/octet-stream", &ctx, None) {}
});
