// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! OPC UA binary primitives shared by UADP and the Avro variant fallback.

pub mod codec;
mod cursor;

pub use cursor::{BinaryReader, BinaryWriter};
