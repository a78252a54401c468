//! Decoding of JSON input objects into records.
//!
//! Decoding is guided by the declared field types but never rejects a value
//! for having the wrong shape: such a value is kept with its own type, so the
//! record reaches the mapper and fails there, on the error channel.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{Map, Number, Value as JsonValue};
use std::sync::Arc;
use tracing::debug;

use super::types::{FieldType, Record, Schema, Value};
use crate::{Error, Result};

/// Builds a record of `schema` from a JSON object.
pub fn record_from_json(schema: &Arc<Schema>, json: &JsonValue) -> Result<Record> {
    match json {
        JsonValue::Object(object) => Ok(record_from_object(schema, object)),
        other => Err(Error::Schema(format!(
            "expected a JSON object but found {}",
            json_type_name(other)
        ))),
    }
}

fn record_from_object(schema: &Arc<Schema>, object: &Map<String, JsonValue>) -> Record {
    for key in object.keys() {
        if schema.index_of(key).is_none() {
            debug!("Ignoring field '{}' not present in schema", key);
        }
    }

    let values = schema
        .fields()
        .iter()
        .map(|field| match object.get(&field.name) {
            Some(json) => value_from_json(&field.field_type, json),
            None => Value::Null,
        })
        .collect();

    Record::from_parts(Arc::clone(schema), values)
}

fn value_from_json(field_type: &FieldType, json: &JsonValue) -> Value {
    match (field_type, json) {
        (_, JsonValue::Null) => Value::Null,
        (FieldType::Bytes, JsonValue::String(s)) => match STANDARD.decode(s) {
            Ok(bytes) => Value::from(bytes),
            Err(_) => Value::String(s.clone()),
        },
        (FieldType::Row(schema), JsonValue::Object(object)) => {
            Value::Row(record_from_object(schema, object))
        }
        (FieldType::Array(element), JsonValue::Array(items)) => Value::Array(
            items
                .iter()
                .map(|item| value_from_json(element, item))
                .collect(),
        ),
        (_, JsonValue::Number(n)) => number_value(field_type, n),
        (_, other) => untyped_value(other),
    }
}

fn number_value(field_type: &FieldType, n: &Number) -> Value {
    let typed = match field_type {
        FieldType::Int32 => n
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .map(Value::Int32),
        FieldType::Int64 => n.as_i64().map(Value::Int64),
        FieldType::Float => n.as_f64().map(|v| Value::Float(v as f32)),
        FieldType::Double => n.as_f64().map(Value::Double),
        _ => None,
    };

    typed.unwrap_or_else(|| untyped_number(n))
}

fn untyped_number(n: &Number) -> Value {
    match n.as_i64() {
        Some(v) => Value::Int64(v),
        None => n.as_f64().map_or(Value::Null, Value::Double),
    }
}

fn untyped_value(json: &JsonValue) -> Value {
    match json {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Boolean(*b),
        JsonValue::Number(n) => untyped_number(n),
        JsonValue::String(s) => Value::String(s.clone()),
        JsonValue::Array(items) => Value::Array(items.iter().map(untyped_value).collect()),
        JsonValue::Object(_) => Value::String(json.to_string()),
    }
}

fn json_type_name(json: &JsonValue) -> &'static str {
    match json {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
