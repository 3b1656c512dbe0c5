// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! JSON encoding (OPC UA Part 14, 7.2.3) and the `ua-metadata` message.

mod dataset_message;
mod metadata_message;
mod network_message;
pub mod value;

pub use metadata_message::JsonMetaDataMessage;
pub use network_message::JsonNetworkMessage;
