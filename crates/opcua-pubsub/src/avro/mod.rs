// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Avro binary encoding with schema-on-write.

pub mod codec;
mod network_message;
pub mod schema;

pub use codec::AvroValue;
pub use network_message::AvroNetworkMessage;
pub use schema::AvroSchema;
