// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UADP binary encoding (OPC UA Part 14, 7.2.2).

pub mod chunk;
pub mod dataset_message;
mod discovery;
pub mod flags;
mod network_message;

pub use chunk::{ChunkReassembler, ReassemblerStats};
pub use discovery::{DiscoveryPayload, UadpDiscoveryMessage};
pub use network_message::{SecurityHeader, UadpNetworkMessage};
