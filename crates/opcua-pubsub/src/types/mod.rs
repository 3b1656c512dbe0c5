// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Value model shared by all encodings.

mod builtin;
mod data_value;
mod dataset;
mod metadata;
mod variant;

pub use builtin::{BuiltInType, LocalizedText, NodeId, StatusCode};
pub use data_value::DataValue;
pub use dataset::DataSet;
pub use metadata::{
    ConfigurationVersion, DataSetMetaData, FieldMetaData, MetaDataResolver, MetaDataStore,
    VALUE_RANK_ONE_DIMENSION, VALUE_RANK_SCALAR,
};
pub use variant::Variant;
