// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Avro schema model and its JSON text form.
//!
//! Only the subset the PubSub mapping produces is modelled: primitives with
//! an optional `logicalType` and `builtInType` attribute, arrays, records and
//! unions. Record names are registered on first definition and rendered as
//! plain name references afterwards.

use crate::error::{DecodeError, DecodeResult};
use crate::types::BuiltInType;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};

/// Namespace of the root record.
pub const NAMESPACE: &str = "org.opcfoundation.ua.pubsub";

/// Attribute carrying the OPC UA built-in type id of a primitive.
const BUILT_IN_TYPE: &str = "builtInType";
/// Attribute carrying a field name that had to be escaped.
const ORIGINAL_NAME: &str = "originalName";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    Boolean,
    Int,
    Long,
    Float,
    Double,
    Bytes,
    String,
}

impl PrimitiveKind {
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Long => "long",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
            PrimitiveKind::Bytes => "bytes",
            PrimitiveKind::String => "string",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "boolean" => PrimitiveKind::Boolean,
            "int" => PrimitiveKind::Int,
            "long" => PrimitiveKind::Long,
            "float" => PrimitiveKind::Float,
            "double" => PrimitiveKind::Double,
            "bytes" => PrimitiveKind::Bytes,
            "string" => PrimitiveKind::String,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Primitive {
    pub kind: PrimitiveKind,
    pub logical_type: Option<String>,
    pub built_in_type: Option<BuiltInType>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordField {
    pub name: String,
    pub schema: AvroSchema,
    /// Field name before escaping to an Avro name.
    pub original_name: Option<String>,
}

impl RecordField {
    pub fn new(name: impl Into<String>, schema: AvroSchema) -> Self {
        Self {
            name: name.into(),
            schema,
            original_name: None,
        }
    }

    /// Field keyed by an arbitrary dataset field name.
    pub fn escaped(name: &str, schema: AvroSchema) -> Self {
        let escaped = escape_name(name);
        Self {
            original_name: (escaped != name).then(|| name.to_string()),
            name: escaped,
            schema,
        }
    }

    /// Name of the field as the application knows it.
    pub fn display_name(&self) -> &str {
        self.original_name.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    pub name: String,
    pub namespace: Option<String>,
    pub fields: Vec<RecordField>,
}

impl RecordSchema {
    pub fn field(&self, name: &str) -> Option<&RecordField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AvroSchema {
    Null,
    Primitive(Primitive),
    Array(Box<AvroSchema>),
    Record(RecordSchema),
    Union(Vec<AvroSchema>),
}

/// Make `name` a valid Avro name (`[A-Za-z_][A-Za-z0-9_]*`).
pub fn escape_name(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

impl AvroSchema {
    pub fn primitive(kind: PrimitiveKind) -> Self {
        AvroSchema::Primitive(Primitive {
            kind,
            logical_type: None,
            built_in_type: None,
        })
    }

    pub fn boolean() -> Self {
        Self::primitive(PrimitiveKind::Boolean)
    }

    pub fn int() -> Self {
        Self::primitive(PrimitiveKind::Int)
    }

    pub fn long() -> Self {
        Self::primitive(PrimitiveKind::Long)
    }

    pub fn string() -> Self {
        Self::primitive(PrimitiveKind::String)
    }

    pub fn bytes() -> Self {
        Self::primitive(PrimitiveKind::Bytes)
    }

    pub fn array(items: AvroSchema) -> Self {
        AvroSchema::Array(Box::new(items))
    }

    pub fn record(name: impl Into<String>, fields: Vec<RecordField>) -> Self {
        AvroSchema::Record(RecordSchema {
            name: name.into(),
            namespace: None,
            fields,
        })
    }

    /// `["null", self]`.
    #[must_use]
    pub fn nullable(self) -> Self {
        AvroSchema::Union(vec![AvroSchema::Null, self])
    }

    #[must_use]
    pub fn with_logical_type(mut self, logical_type: &str) -> Self {
        if let AvroSchema::Primitive(p) = &mut self {
            p.logical_type = Some(logical_type.to_string());
        }
        self
    }

    #[must_use]
    pub fn with_built_in_type(mut self, t: BuiltInType) -> Self {
        if let AvroSchema::Primitive(p) = &mut self {
            p.built_in_type = Some(t);
        }
        self
    }

    #[must_use]
    pub fn with_namespace(mut self, namespace: &str) -> Self {
        if let AvroSchema::Record(r) = &mut self {
            r.namespace = Some(namespace.to_string());
        }
        self
    }

    pub fn as_record(&self) -> Option<&RecordSchema> {
        match self {
            AvroSchema::Record(r) => Some(r),
            _ => None,
        }
    }

    /// First non-null branch of a union, the schema itself otherwise.
    pub fn value_branch(&self) -> &AvroSchema {
        match self {
            AvroSchema::Union(branches) => branches
                .iter()
                .find(|b| !matches!(b, AvroSchema::Null))
                .unwrap_or(self),
            other => other,
        }
    }

    /// Short type name for diagnostics.
    pub fn type_name(&self) -> String {
        match self {
            AvroSchema::Null => "null".into(),
            AvroSchema::Primitive(p) => p.kind.name().into(),
            AvroSchema::Array(_) => "array".into(),
            AvroSchema::Record(r) => r.name.clone(),
            AvroSchema::Union(_) => "union".into(),
        }
    }

    // ========================================================================
    // JSON text form
    // ========================================================================

    pub fn to_json(&self) -> Value {
        self.render(&mut HashSet::new())
    }

    pub fn to_json_string(&self) -> String {
        self.to_json().to_string()
    }

    fn render(&self, defined: &mut HashSet<String>) -> Value {
        match self {
            AvroSchema::Null => json!("null"),
            AvroSchema::Primitive(p) => {
                if p.logical_type.is_none() && p.built_in_type.is_none() {
                    return json!(p.kind.name());
                }
                let mut obj = Map::new();
                obj.insert("type".into(), json!(p.kind.name()));
                if let Some(logical) = &p.logical_type {
                    obj.insert("logicalType".into(), json!(logical));
                }
                if let Some(t) = p.built_in_type {
                    obj.insert(BUILT_IN_TYPE.into(), json!(t as u8));
                }
                Value::Object(obj)
            }
            AvroSchema::Array(items) => json!({"type": "array", "items": items.render(defined)}),
            AvroSchema::Record(r) => {
                if !defined.insert(r.name.clone()) {
                    return json!(r.name);
                }
                let fields: Vec<Value> = r
                    .fields
                    .iter()
                    .map(|f| {
                        let mut obj = Map::new();
                        obj.insert("name".into(), json!(f.name));
                        obj.insert("type".into(), f.schema.render(defined));
                        if let Some(original) = &f.original_name {
                            obj.insert(ORIGINAL_NAME.into(), json!(original));
                        }
                        Value::Object(obj)
                    })
                    .collect();
                let mut obj = Map::new();
                obj.insert("type".into(), json!("record"));
                obj.insert("name".into(), json!(r.name));
                if let Some(ns) = &r.namespace {
                    obj.insert("namespace".into(), json!(ns));
                }
                obj.insert("fields".into(), Value::Array(fields));
                Value::Object(obj)
            }
            AvroSchema::Union(branches) => {
                Value::Array(branches.iter().map(|b| b.render(defined)).collect())
            }
        }
    }

    /// Parse the JSON text form.
    pub fn parse(text: &str) -> DecodeResult<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_json(&value, &mut HashMap::new())
    }

    fn from_json(value: &Value, named: &mut HashMap<String, AvroSchema>) -> DecodeResult<Self> {
        match value {
            Value::String(name) => Self::from_type_name(name, named),
            Value::Array(branches) => Ok(AvroSchema::Union(
                branches
                    .iter()
                    .map(|b| Self::from_json(b, named))
                    .collect::<DecodeResult<_>>()?,
            )),
            Value::Object(obj) => match obj.get("type") {
                Some(Value::String(kind)) => match kind.as_str() {
                    "record" => Self::record_from_json(obj, named),
                    "array" => {
                        let items = obj
                            .get("items")
                            .ok_or_else(|| invalid("array without items"))?;
                        Ok(AvroSchema::array(Self::from_json(items, named)?))
                    }
                    other => match PrimitiveKind::from_name(other) {
                        Some(kind) => {
                            let built_in_type = match obj.get(BUILT_IN_TYPE) {
                                None => None,
                                Some(v) => Some(
                                    v.as_u64()
                                        .and_then(|id| u8::try_from(id).ok())
                                        .and_then(BuiltInType::from_u8)
                                        .ok_or_else(|| invalid("invalid builtInType"))?,
                                ),
                            };
                            Ok(AvroSchema::Primitive(Primitive {
                                kind,
                                logical_type: obj
                                    .get("logicalType")
                                    .and_then(Value::as_str)
                                    .map(str::to_string),
                                built_in_type,
                            }))
                        }
                        None => Self::from_type_name(other, named),
                    },
                },
                Some(nested) => Self::from_json(nested, named),
                None => Err(invalid("schema object without type")),
            },
            _ => Err(invalid("unexpected schema node")),
        }
    }

    fn from_type_name(name: &str, named: &HashMap<String, AvroSchema>) -> DecodeResult<Self> {
        if name == "null" {
            return Ok(AvroSchema::Null);
        }
        if let Some(kind) = PrimitiveKind::from_name(name) {
            return Ok(AvroSchema::primitive(kind));
        }
        // references may be fully qualified
        let short = name.rsplit('.').next().unwrap_or(name);
        named
            .get(short)
            .cloned()
            .ok_or_else(|| DecodeError::Avro(format!("unknown type {}", name)))
    }

    fn record_from_json(
        obj: &Map<String, Value>,
        named: &mut HashMap<String, AvroSchema>,
    ) -> DecodeResult<Self> {
        let name = obj
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid("record without name"))?;
        let Some(Value::Array(items)) = obj.get("fields") else {
            return Err(invalid("record without fields"));
        };
        let mut fields = Vec::with_capacity(items.len());
        for item in items {
            let field_name = item
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| invalid("field without name"))?;
            let field_type = item.get("type").ok_or_else(|| invalid("field without type"))?;
            fields.push(RecordField {
                name: field_name.to_string(),
                schema: Self::from_json(field_type, named)?,
                original_name: item
                    .get(ORIGINAL_NAME)
                    .and_then(Value::as_str)
                    .map(str::to_string),
            });
        }
        let record = AvroSchema::Record(RecordSchema {
            name: name.to_string(),
            namespace: obj
                .get("namespace")
                .and_then(Value::as_str)
                .map(str::to_string),
            fields,
        });
        named.insert(name.to_string(), record.clone());
        Ok(record)
    }
}

fn invalid(what: &str) -> DecodeError {
    DecodeError::Avro(what.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant_record() -> AvroSchema {
        AvroSchema::record(
            "Variant",
            vec![
                RecordField::new("Type", AvroSchema::int()),
                RecordField::new("Body", AvroSchema::bytes()),
            ],
        )
    }

    #[test]
    fn test_escape_name() {
        assert_eq!(escape_name("Temperature"), "Temperature");
        assert_eq!(escape_name("pump.1 speed"), "pump_1_speed");
        assert_eq!(escape_name("1st"), "_1st");
        assert_eq!(escape_name(""), "_");

        let field = RecordField::escaped("a-b", AvroSchema::int());
        assert_eq!(field.name, "a_b");
        assert_eq!(field.display_name(), "a-b");
        assert!(RecordField::escaped("ab", AvroSchema::int()).original_name.is_none());
    }

    #[test]
    fn test_named_record_rendered_once() {
        let schema = AvroSchema::record(
            "DataSet",
            vec![
                RecordField::new("a", variant_record().nullable()),
                RecordField::new("b", variant_record().nullable()),
            ],
        )
        .with_namespace(NAMESPACE);
        let json = schema.to_json();
        assert_eq!(json["namespace"], json!(NAMESPACE));
        assert_eq!(json["fields"][0]["type"][1]["type"], json!("record"));
        assert_eq!(json["fields"][1]["type"][1], json!("Variant"));
    }

    #[test]
    fn test_parse_round_trip() {
        let schema = AvroSchema::record(
            "DataSet",
            vec![
                RecordField::escaped(
                    "speed rpm",
                    AvroSchema::long()
                        .with_built_in_type(BuiltInType::UInt32)
                        .nullable(),
                ),
                RecordField::new(
                    "ts",
                    AvroSchema::long().with_logical_type("timestamp-micros"),
                ),
                RecordField::new("v1", variant_record()),
                RecordField::new("v2", variant_record()),
                RecordField::new("list", AvroSchema::array(AvroSchema::string())),
            ],
        );
        let text = schema.to_json_string();
        assert_eq!(AvroSchema::parse(&text).unwrap(), schema);
    }

    #[test]
    fn test_parse_errors() {
        assert!(AvroSchema::parse(r#""Unknown""#).is_err());
        assert!(AvroSchema::parse(r#"{"type": "record", "fields": []}"#).is_err());
        assert!(AvroSchema::parse(r#"{"type": "int", "builtInType": 99}"#).is_err());
        assert!(AvroSchema::parse("not json").is_err());
    }

    #[test]
    fn test_value_branch() {
        let s = AvroSchema::int().nullable();
        assert_eq!(s.value_branch(), &AvroSchema::int());
        assert_eq!(AvroSchema::int().value_branch(), &AvroSchema::int());
    }
}
