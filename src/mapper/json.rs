use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::sync::Arc;

use super::RecordSerializer;
use crate::error::SerializationError;
use crate::schema::{FieldType, Record, Schema, Value};

/// Encodes records as compact JSON objects.
///
/// Keys are written in schema order, bytes as standard base64 and nested rows
/// as nested objects, so equal records always encode to equal bytes.
#[derive(Debug, Clone)]
pub struct JsonSerializer {
    schema: Arc<Schema>,
}

impl JsonSerializer {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self { schema }
    }
}

impl RecordSerializer for JsonSerializer {
    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    fn encode(&self, record: &Record) -> Result<Bytes, SerializationError> {
        if !Arc::ptr_eq(record.schema(), &self.schema) && **record.schema() != *self.schema {
            return Err(SerializationError::SchemaMismatch {
                expected: self.schema.to_string(),
                found: record.schema().to_string(),
            });
        }

        check_record(record, None)?;
        encode_json(record)
    }
}

/// Encodes `record` without checking values against declared types.
///
/// Used for error records, whose `failed_row` may hold exactly the values
/// the checked encoding rejected. Non-finite numbers become `null`.
pub fn encode_json(record: &Record) -> Result<Bytes, SerializationError> {
    let encoded = serde_json::to_vec(&RecordJson(record))?;
    Ok(Bytes::from(encoded))
}

fn check_record(record: &Record, parent: Option<&str>) -> Result<(), SerializationError> {
    for (field, value) in record.iter() {
        let path = match parent {
            Some(parent) => format!("{}.{}", parent, field.name),
            None => field.name.clone(),
        };
        check_value(&field.field_type, field.nullable, value, &path)?;
    }
    Ok(())
}

fn check_value(
    field_type: &FieldType,
    nullable: bool,
    value: &Value,
    path: &str,
) -> Result<(), SerializationError> {
    match (field_type, value) {
        (_, Value::Null) if nullable => Ok(()),
        (_, Value::Null) => Err(SerializationError::NullValue {
            field: path.to_string(),
        }),
        (FieldType::Boolean, Value::Boolean(_))
        | (FieldType::Int32, Value::Int32(_))
        | (FieldType::Int64, Value::Int64(_))
        | (FieldType::String, Value::String(_))
        | (FieldType::Bytes, Value::Bytes(_)) => Ok(()),
        (FieldType::Float, Value::Float(v)) if v.is_finite() => Ok(()),
        (FieldType::Double, Value::Double(v)) if v.is_finite() => Ok(()),
        (FieldType::Float, Value::Float(_)) | (FieldType::Double, Value::Double(_)) => {
            Err(SerializationError::NonFiniteFloat {
                field: path.to_string(),
            })
        }
        (FieldType::Array(element), Value::Array(items)) => {
            for (i, item) in items.iter().enumerate() {
                check_value(element, false, item, &format!("{}[{}]", path, i))?;
            }
            Ok(())
        }
        (FieldType::Row(schema), Value::Row(record)) if **record.schema() == **schema => {
            check_record(record, Some(path))
        }
        (expected, found) => Err(SerializationError::TypeMismatch {
            field: path.to_string(),
            expected: expected.to_string(),
            found: found.type_name(),
        }),
    }
}

struct RecordJson<'a>(&'a Record);

impl Serialize for RecordJson<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.values().len()))?;
        for (field, value) in self.0.iter() {
            map.serialize_entry(&field.name, &ValueJson(value))?;
        }
        map.end()
    }
}

struct ValueJson<'a>(&'a Value);

impl Serialize for ValueJson<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Value::Null => serializer.serialize_none(),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Int32(n) => serializer.serialize_i32(*n),
            Value::Int64(n) => serializer.serialize_i64(*n),
            Value::Float(n) => serializer.serialize_f32(*n),
            Value::Double(n) => serializer.serialize_f64(*n),
            Value::String(s) => serializer.serialize_str(s),
            Value::Bytes(b) => serializer.serialize_str(&STANDARD.encode(b)),
            Value::Array(items) => serializer.collect_seq(items.iter().map(ValueJson)),
            Value::Row(record) => RecordJson(record).serialize(serializer),
        }
    }
}
