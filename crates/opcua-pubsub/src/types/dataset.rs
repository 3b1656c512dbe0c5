// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::{DataValue, StatusCode};
use crate::flags::DataSetFieldContentFlags;

/// Ordered field name to value mapping.
///
/// Insertion order is significant: key frames and RawData encode fields by
/// position, and delta frames fall back to positional indices when no metadata
/// is available.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataSet {
    /// Which DataValue sub-fields travel on the wire.
    pub field_mask: DataSetFieldContentFlags,
    fields: Vec<(String, Option<DataValue>)>,
}

impl DataSet {
    pub fn new(field_mask: DataSetFieldContentFlags) -> Self {
        Self {
            field_mask,
            fields: Vec::new(),
        }
    }

    /// Insert a field, replacing the value in place if the name exists.
    pub fn push(&mut self, name: impl Into<String>, value: Option<DataValue>) {
        let name = name.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<DataValue>) -> Self {
        self.push(name, Some(value.into()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&DataValue> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| v.as_ref())
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|(n, _)| n == name)
    }

    pub fn value_at(&self, index: usize) -> Option<&DataValue> {
        self.fields.get(index).and_then(|(_, v)| v.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&DataValue>)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_ref()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// First non-Good field status, else Good.
    pub fn worst_status(&self) -> StatusCode {
        self.fields
            .iter()
            .filter_map(|(_, v)| v.as_ref())
            .map(|v| v.status)
            .find(|s| !s.is_good())
            .unwrap_or(StatusCode::GOOD)
    }
}

impl<S: Into<String>> FromIterator<(S, Option<DataValue>)> for DataSet {
    fn from_iter<I: IntoIterator<Item = (S, Option<DataValue>)>>(iter: I) -> Self {
        let mut set = DataSet::default();
        for (name, value) in iter {
            set.push(name, value);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_is_kept() {
        let set = DataSet::default()
            .with("b", DataValue::new(1i32))
            .with("a", DataValue::new(2i32))
            .with("c", DataValue::new(3i32));
        let names: Vec<_> = set.names().collect();
        assert_eq!(names, vec!["b", "a", "c"]);
        assert_eq!(set.position("a"), Some(1));
    }

    #[test]
    fn test_push_replaces_in_place() {
        let mut set = DataSet::default()
            .with("a", DataValue::new(1i32))
            .with("b", DataValue::new(2i32));
        set.push("a", None);
        assert_eq!(set.len(), 2);
        assert_eq!(set.get("a"), None);
        assert_eq!(set.position("a"), Some(0));
    }

    #[test]
    fn test_worst_status_prefers_first_non_good() {
        let set = DataSet::default()
            .with("a", DataValue::new(1i32))
            .with("b", DataValue::new(2i32).with_status(StatusCode::UNCERTAIN))
            .with("c", DataValue::new(3i32).with_status(StatusCode::BAD));
        assert_eq!(set.worst_status(), StatusCode::UNCERTAIN);
        assert_eq!(DataSet::default().worst_status(), StatusCode::GOOD);
    }
}
