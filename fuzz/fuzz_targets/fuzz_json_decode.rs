// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![no_main]

use libfuzzer_sys::fuzz_target;
use opcua_pubsub::{decode, CodecContext};

fuzz_target!(|data: &[u8]| {
    let ctx = CodecContext::default();

    // Fuzz data and metadata message parsers
    let _ = decode(data, "application/json", &ctx, None, None);

    // Fuzz gzip framing
    let _ = decode(data, "application/json;gzip", &ctx, None, None);
});
