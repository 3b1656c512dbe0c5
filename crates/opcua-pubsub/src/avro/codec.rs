// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Avro binary encoding (Avro 1.11, "Binary Encoding").
//!
//! ```text
//! int, long   zigzag varint (LEB128, 7 bits per byte, LSB first)
//! float       4 bytes little-endian
//! double      8 bytes little-endian
//! bytes       long length | raw bytes
//! string      long length | UTF-8
//! array       blocks of (long count | items), terminated by a 0 count
//! union       long branch index | value
//! record      field values in schema order
//! ```

use super::schema::{AvroSchema, PrimitiveKind};
use crate::binary::{BinaryReader, BinaryWriter};
use crate::config::CodecContext;
use crate::error::{DecodeError, DecodeResult, EncodeError, EncodeResult};

/// Longest varint for a 64-bit value.
const MAX_VARINT_LEN: usize = 10;

/// A value shaped by an [`AvroSchema`].
#[derive(Debug, Clone, PartialEq)]
pub enum AvroValue {
    Null,
    Boolean(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Bytes(Vec<u8>),
    String(String),
    Array(Vec<AvroValue>),
    /// Field values in schema order.
    Record(Vec<AvroValue>),
    /// Branch index and value.
    Union(usize, Box<AvroValue>),
}

// ============================================================================
// Primitives
// ============================================================================

pub fn write_long(w: &mut BinaryWriter, value: i64) {
    let mut n = ((value << 1) ^ (value >> 63)) as u64;
    loop {
        let byte = (n & 0x7F) as u8;
        n >>= 7;
        if n == 0 {
            w.write_u8(byte);
            return;
        }
        w.write_u8(byte | 0x80);
    }
}

pub fn write_int(w: &mut BinaryWriter, value: i32) {
    write_long(w, i64::from(value));
}

pub fn write_bytes(w: &mut BinaryWriter, bytes: &[u8]) {
    write_long(w, bytes.len() as i64);
    w.write_bytes(bytes);
}

pub fn read_long(r: &mut BinaryReader<'_>) -> DecodeResult<i64> {
    let mut n: u64 = 0;
    let mut shift = 0u32;
    for i in 0..MAX_VARINT_LEN {
        let byte = r.read_u8()?;
        let data = u64::from(byte & 0x7F);
        if i == MAX_VARINT_LEN - 1 && data > 1 {
            return Err(DecodeError::Avro("varint overflow".into()));
        }
        n |= data << shift;
        if byte & 0x80 == 0 {
            return Ok((n >> 1) as i64 ^ -((n & 1) as i64));
        }
        shift += 7;
    }
    Err(DecodeError::Avro("varint overflow".into()))
}

pub fn read_int(r: &mut BinaryReader<'_>) -> DecodeResult<i32> {
    let v = read_long(r)?;
    i32::try_from(v).map_err(|_| DecodeError::Avro(format!("int out of range: {}", v)))
}

fn read_len(r: &mut BinaryReader<'_>, limit: usize, what: &'static str) -> DecodeResult<usize> {
    let len = read_long(r)?;
    let len = usize::try_from(len).map_err(|_| DecodeError::Avro(format!("negative {}", what)))?;
    if len > limit {
        return Err(DecodeError::LimitExceeded(what));
    }
    Ok(len)
}

pub fn read_bytes(r: &mut BinaryReader<'_>, ctx: &CodecContext) -> DecodeResult<Vec<u8>> {
    let len = read_len(r, ctx.max_byte_string_length, "bytes length")?;
    Ok(r.read_bytes(len)?.to_vec())
}

pub fn read_string(r: &mut BinaryReader<'_>, ctx: &CodecContext) -> DecodeResult<String> {
    let len = read_len(r, ctx.max_string_length, "string length")?;
    String::from_utf8(r.read_bytes(len)?.to_vec()).map_err(|_| DecodeError::InvalidUtf8)
}

// ============================================================================
// Schema-driven values
// ============================================================================

fn mismatch(schema: &AvroSchema, value: &AvroValue) -> EncodeError {
    EncodeError::AvroSchema(format!("{:?} does not match {}", value, schema.type_name()))
}

/// Write `value` as described by `schema`.
pub fn write_value(w: &mut BinaryWriter, schema: &AvroSchema, value: &AvroValue) -> EncodeResult<()> {
    match (schema, value) {
        (AvroSchema::Null, AvroValue::Null) => {}
        (AvroSchema::Primitive(p), value) => match (p.kind, value) {
            (PrimitiveKind::Boolean, AvroValue::Boolean(b)) => w.write_u8(u8::from(*b)),
            (PrimitiveKind::Int, AvroValue::Int(v)) => write_int(w, *v),
            (PrimitiveKind::Long, AvroValue::Long(v)) => write_long(w, *v),
            (PrimitiveKind::Float, AvroValue::Float(v)) => w.write_f32(*v),
            (PrimitiveKind::Double, AvroValue::Double(v)) => w.write_f64(*v),
            (PrimitiveKind::Bytes, AvroValue::Bytes(v)) => write_bytes(w, v),
            (PrimitiveKind::String, AvroValue::String(v)) => write_bytes(w, v.as_bytes()),
            _ => return Err(mismatch(schema, value)),
        },
        (AvroSchema::Array(items), AvroValue::Array(values)) => {
            if !values.is_empty() {
                write_long(w, values.len() as i64);
                for v in values {
                    write_value(w, items, v)?;
                }
            }
            write_long(w, 0);
        }
        (AvroSchema::Record(record), AvroValue::Record(values)) => {
            if record.fields.len() != values.len() {
                return Err(EncodeError::AvroSchema(format!(
                    "record {} has {} fields, got {} values",
                    record.name,
                    record.fields.len(),
                    values.len()
                )));
            }
            for (field, v) in record.fields.iter().zip(values) {
                write_value(w, &field.schema, v)?;
            }
        }
        (AvroSchema::Union(branches), AvroValue::Union(index, v)) => {
            let branch = branches.get(*index).ok_or_else(|| mismatch(schema, value))?;
            write_long(w, *index as i64);
            write_value(w, branch, v)?;
        }
        _ => return Err(mismatch(schema, value)),
    }
    Ok(())
}

/// Read a value described by `schema`.
pub fn read_value(
    r: &mut BinaryReader<'_>,
    schema: &AvroSchema,
    ctx: &CodecContext,
) -> DecodeResult<AvroValue> {
    Ok(match schema {
        AvroSchema::Null => AvroValue::Null,
        AvroSchema::Primitive(p) => match p.kind {
            PrimitiveKind::Boolean => match r.read_u8()? {
                0 => AvroValue::Boolean(false),
                1 => AvroValue::Boolean(true),
                other => return Err(DecodeError::Avro(format!("invalid boolean {}", other))),
            },
            PrimitiveKind::Int => AvroValue::Int(read_int(r)?),
            PrimitiveKind::Long => AvroValue::Long(read_long(r)?),
            PrimitiveKind::Float => AvroValue::Float(r.read_f32()?),
            PrimitiveKind::Double => AvroValue::Double(r.read_f64()?),
            PrimitiveKind::Bytes => AvroValue::Bytes(read_bytes(r, ctx)?),
            PrimitiveKind::String => AvroValue::String(read_string(r, ctx)?),
        },
        AvroSchema::Array(items) => {
            let mut values = Vec::new();
            loop {
                let count = read_long(r)?;
                if count == 0 {
                    break;
                }
                if count < 0 {
                    // negative count: block size in bytes follows
                    read_long(r)?;
                }
                let count = count.unsigned_abs() as usize;
                if values.len() + count > ctx.max_array_length {
                    return Err(DecodeError::LimitExceeded("array length"));
                }
                for _ in 0..count {
                    values.push(read_value(r, items, ctx)?);
                }
            }
            AvroValue::Array(values)
        }
        AvroSchema::Record(record) => AvroValue::Record(
            record
                .fields
                .iter()
                .map(|f| read_value(r, &f.schema, ctx))
                .collect::<DecodeResult<Vec<_>>>()?,
        ),
        AvroSchema::Union(branches) => {
            let index = read_long(r)?;
            let branch = usize::try_from(index)
                .ok()
                .and_then(|i| branches.get(i).map(|b| (i, b)));
            let Some((index, branch)) = branch else {
                return Err(DecodeError::Avro(format!("union branch {} out of range", index)));
            };
            AvroValue::Union(index, Box::new(read_value(r, branch, ctx)?))
        }
    })
}
