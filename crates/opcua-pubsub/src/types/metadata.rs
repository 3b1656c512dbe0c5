// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Dataset metadata and metadata resolution.
//!
//! RawData fields carry no type information on the wire; a decoder needs the
//! writer's [`DataSetMetaData`] to interpret them. Producers announce metadata
//! through discovery/metadata messages, subscribers keep it in a
//! [`MetaDataStore`] and hand that to the decoder as a [`MetaDataResolver`].

use super::{BuiltInType, LocalizedText, NodeId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use uuid::Uuid;

/// Value rank of a scalar field.
pub const VALUE_RANK_SCALAR: i32 = -1;
/// Value rank of a one-dimensional array field.
pub const VALUE_RANK_ONE_DIMENSION: i32 = 1;

/// Metadata version pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConfigurationVersion {
    pub major_version: u32,
    pub minor_version: u32,
}

impl ConfigurationVersion {
    pub const fn new(major_version: u32, minor_version: u32) -> Self {
        Self {
            major_version,
            minor_version,
        }
    }
}

/// One field of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct FieldMetaData {
    pub name: String,
    #[serde(skip_serializing_if = "LocalizedText::is_empty")]
    pub description: LocalizedText,
    pub field_flags: u16,
    pub built_in_type: BuiltInType,
    pub data_type: NodeId,
    pub value_rank: i32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub array_dimensions: Vec<u32>,
    pub max_string_length: u32,
    pub data_set_field_id: Uuid,
}

impl Default for FieldMetaData {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: LocalizedText::default(),
            field_flags: 0,
            built_in_type: BuiltInType::Null,
            data_type: NodeId::default(),
            value_rank: VALUE_RANK_SCALAR,
            array_dimensions: Vec::new(),
            max_string_length: 0,
            data_set_field_id: Uuid::nil(),
        }
    }
}

impl FieldMetaData {
    pub fn scalar(name: impl Into<String>, built_in_type: BuiltInType) -> Self {
        Self {
            name: name.into(),
            built_in_type,
            data_type: NodeId::for_built_in(built_in_type),
            ..Self::default()
        }
    }

    pub fn array(name: impl Into<String>, built_in_type: BuiltInType) -> Self {
        Self {
            value_rank: VALUE_RANK_ONE_DIMENSION,
            ..Self::scalar(name, built_in_type)
        }
    }
}

/// Dataset schema announced by a writer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DataSetMetaData {
    pub name: String,
    #[serde(skip_serializing_if = "LocalizedText::is_empty")]
    pub description: LocalizedText,
    pub fields: Vec<FieldMetaData>,
    pub data_set_class_id: Uuid,
    pub configuration_version: ConfigurationVersion,
}

impl DataSetMetaData {
    pub fn new(name: impl Into<String>, fields: Vec<FieldMetaData>) -> Self {
        Self {
            name: name.into(),
            fields,
            configuration_version: ConfigurationVersion::new(1, 0),
            ..Self::default()
        }
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Looks up metadata for a writer and version.
pub trait MetaDataResolver {
    fn resolve(&self, writer_id: u16, major: u32, minor: u32) -> Option<Arc<DataSetMetaData>>;
}

impl<F> MetaDataResolver for F
where
    F: Fn(u16, u32, u32) -> Option<Arc<DataSetMetaData>>,
{
    fn resolve(&self, writer_id: u16, major: u32, minor: u32) -> Option<Arc<DataSetMetaData>> {
        self(writer_id, major, minor)
    }
}

/// In-memory metadata cache shared between decoders.
///
/// Lookups match the exact version first, then the latest minor version with
/// the same major version.
#[derive(Debug, Default)]
pub struct MetaDataStore {
    entries: RwLock<HashMap<u16, BTreeMap<ConfigurationVersion, Arc<DataSetMetaData>>>>,
}

impl MetaDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `metadata` under its own configuration version.
    pub fn insert(&self, writer_id: u16, metadata: DataSetMetaData) -> Arc<DataSetMetaData> {
        let version = metadata.configuration_version;
        let metadata = Arc::new(metadata);
        self.entries
            .write()
            .entry(writer_id)
            .or_default()
            .insert(version, Arc::clone(&metadata));
        log::debug!(
            "[metadata] stored writer {} version {}.{}",
            writer_id,
            version.major_version,
            version.minor_version
        );
        metadata
    }

    pub fn remove(&self, writer_id: u16) -> bool {
        self.entries.write().remove(&writer_id).is_some()
    }

    /// Number of stored metadata versions.
    pub fn len(&self) -> usize {
        self.entries.read().values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl MetaDataResolver for MetaDataStore {
    fn resolve(&self, writer_id: u16, major: u32, minor: u32) -> Option<Arc<DataSetMetaData>> {
        let entries = self.entries.read();
        let versions = entries.get(&writer_id)?;
        if let Some(exact) = versions.get(&ConfigurationVersion::new(major, minor)) {
            return Some(Arc::clone(exact));
        }
        versions
            .range(ConfigurationVersion::new(major, 0)..=ConfigurationVersion::new(major, u32::MAX))
            .next_back()
            .map(|(_, m)| Arc::clone(m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(major: u32, minor: u32) -> DataSetMetaData {
        DataSetMetaData {
            configuration_version: ConfigurationVersion::new(major, minor),
            ..DataSetMetaData::new(
                "Temperatures",
                vec![FieldMetaData::scalar("t1", BuiltInType::Double)],
            )
        }
    }

    #[test]
    fn test_store_exact_then_latest_minor() {
        let store = MetaDataStore::new();
        store.insert(7, meta(1, 0));
        store.insert(7, meta(1, 3));
        store.insert(7, meta(2, 0));
        assert_eq!(store.len(), 3);

        let m = store.resolve(7, 1, 0).unwrap();
        assert_eq!(m.configuration_version, ConfigurationVersion::new(1, 0));

        let m = store.resolve(7, 1, 9).unwrap();
        assert_eq!(m.configuration_version, ConfigurationVersion::new(1, 3));

        assert!(store.resolve(7, 3, 0).is_none());
        assert!(store.resolve(8, 1, 0).is_none());
    }

    #[test]
    fn test_store_remove_and_clear() {
        let store = MetaDataStore::new();
        store.insert(1, meta(1, 0));
        store.insert(2, meta(1, 0));
        assert!(store.remove(1));
        assert!(!store.remove(1));
        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_closure_resolver() {
        let m = Arc::new(meta(1, 0));
        let resolver = move |id: u16, _: u32, _: u32| (id == 3).then(|| Arc::clone(&m));
        assert!(resolver.resolve(3, 1, 0).is_some());
        assert!(resolver.resolve(4, 1, 0).is_none());
    }

    #[test]
    fn test_metadata_json_field_names() {
        let json = serde_json::to_value(meta(1, 2)).unwrap();
        assert_eq!(json["Name"], "Temperatures");
        assert_eq!(json["Fields"][0]["Name"], "t1");
        assert_eq!(json["Fields"][0]["BuiltInType"], 11);
        assert_eq!(json["Fields"][0]["DataType"], "i=11");
        assert_eq!(json["Fields"][0]["ValueRank"], -1);
        assert_eq!(json["ConfigurationVersion"]["MinorVersion"], 2);

        let back: DataSetMetaData = serde_json::from_value(json).unwrap();
        assert_eq!(back, meta(1, 2));
    }
}
