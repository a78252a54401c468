use bytes::Bytes;
use std::sync::Arc;

use super::RecordSerializer;
use crate::error::SerializationError;
use crate::schema::{FieldType, Record, Schema, Value};
use crate::{Error, Result};

/// Passes the bytes of a single binary field through unchanged.
#[derive(Debug, Clone)]
pub struct RawSerializer {
    schema: Arc<Schema>,
    field: String,
}

impl RawSerializer {
    /// Fails unless `schema` is exactly one bytes field named `field`.
    pub fn new(schema: Arc<Schema>, field: impl Into<String>) -> Result<Self> {
        let field = field.into();

        let only = match schema.fields() {
            [only] => only,
            _ => {
                return Err(Error::Configuration(format!(
                    "raw format needs a schema with exactly one field, got {}",
                    schema
                )))
            }
        };

        if only.name != field {
            return Err(Error::Configuration(format!(
                "raw field '{}' is not part of schema {}",
                field, schema
            )));
        }

        if only.field_type != FieldType::Bytes {
            return Err(Error::Configuration(format!(
                "raw field '{}' must be bytes but is {}",
                field, only.field_type
            )));
        }

        Ok(Self { schema, field })
    }

    pub fn field(&self) -> &str {
        &self.field
    }
}

impl RecordSerializer for RawSerializer {
    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    fn encode(&self, record: &Record) -> std::result::Result<Bytes, SerializationError> {
        match record.get(&self.field) {
            Some(Value::Bytes(bytes)) => Ok(bytes.clone()),
            Some(Value::Null) => Err(SerializationError::NullValue {
                field: self.field.clone(),
            }),
            Some(other) => Err(SerializationError::TypeMismatch {
                field: self.field.clone(),
                expected: FieldType::Bytes.to_string(),
                found: other.type_name(),
            }),
            None => Err(SerializationError::MissingField {
                field: self.field.clone(),
            }),
        }
    }
}
