//! Error schema derivation and error record construction.
//!
//! An error record pairs the record that failed mapping with a description
//! of the failure. The derived layout is:
//!
//! | field           | type                  |
//! |-----------------|-----------------------|
//! | `failed_row`    | nullable row of input |
//! | `error_message` | string                |
//!
//! Hand-written error schemas may store the failed record as a string
//! instead, and may carry extra nullable fields which are left null.

use std::sync::Arc;

use super::types::{Field, FieldType, Record, Schema, Value};
use crate::{Error, Result};

pub const FAILED_ROW_FIELD: &str = "failed_row";
pub const ERROR_MESSAGE_FIELD: &str = "error_message";

/// Derives the error schema for records conforming to `input`.
pub fn error_schema(input: &Arc<Schema>) -> Arc<Schema> {
    Arc::new(Schema::from_fields(vec![
        Field::nullable(FAILED_ROW_FIELD, FieldType::row(Arc::clone(input))),
        Field::new(ERROR_MESSAGE_FIELD, FieldType::String),
    ]))
}

#[derive(Debug, Clone)]
enum FailedRowSlot {
    Row(Arc<Schema>),
    Text,
}

/// An error schema checked against the input schema it reports on.
#[derive(Debug, Clone)]
pub struct ErrorSchema {
    schema: Arc<Schema>,
    failed_row_index: usize,
    failed_row: FailedRowSlot,
    error_message_index: usize,
}

impl ErrorSchema {
    /// Derives and wraps the error schema for `input`.
    pub fn derive(input: &Arc<Schema>) -> Self {
        Self {
            schema: error_schema(input),
            failed_row_index: 0,
            failed_row: FailedRowSlot::Row(Arc::clone(input)),
            error_message_index: 1,
        }
    }

    /// Validates a supplied error schema against the mapper's input schema.
    pub fn new(schema: Arc<Schema>, input: &Arc<Schema>) -> Result<Self> {
        let failed_row_index = schema.index_of(FAILED_ROW_FIELD).ok_or_else(|| {
            Error::Configuration(format!(
                "error schema {} has no '{}' field",
                schema, FAILED_ROW_FIELD
            ))
        })?;
        let error_message_index = schema.index_of(ERROR_MESSAGE_FIELD).ok_or_else(|| {
            Error::Configuration(format!(
                "error schema {} has no '{}' field",
                schema, ERROR_MESSAGE_FIELD
            ))
        })?;

        let failed_row_field = &schema.fields()[failed_row_index];
        let failed_row = match &failed_row_field.field_type {
            // Records from a foreign schema leave the row slot null
            FieldType::Row(_) if !failed_row_field.nullable => {
                return Err(Error::Configuration(format!(
                    "error schema field '{}' must be nullable when it holds a row",
                    FAILED_ROW_FIELD
                )))
            }
            FieldType::Row(row) if **row == **input => FailedRowSlot::Row(Arc::clone(row)),
            FieldType::String => FailedRowSlot::Text,
            other => {
                return Err(Error::Configuration(format!(
                    "error schema field '{}' has type {} but must be row{} or string",
                    FAILED_ROW_FIELD, other, input
                )))
            }
        };

        if schema.fields()[error_message_index].field_type != FieldType::String {
            return Err(Error::Configuration(format!(
                "error schema field '{}' must be a string",
                ERROR_MESSAGE_FIELD
            )));
        }

        if let Some(extra) = schema.fields().iter().enumerate().find(|(i, f)| {
            *i != failed_row_index && *i != error_message_index && !f.nullable
        }) {
            return Err(Error::Configuration(format!(
                "error schema field '{}' must be nullable",
                extra.1.name
            )));
        }

        Ok(Self {
            schema,
            failed_row_index,
            failed_row,
            error_message_index,
        })
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Builds the error record for `failed`.
    ///
    /// A record whose schema differs from the expected input schema cannot be
    /// embedded as a row; `failed_row` is then null and the record's display
    /// form is appended to the message.
    pub fn record(&self, failed: &Record, message: String) -> Record {
        let mut values = vec![Value::Null; self.schema.len()];

        let message = match &self.failed_row {
            FailedRowSlot::Row(expected) if **failed.schema() == **expected => {
                values[self.failed_row_index] = Value::Row(failed.clone());
                message
            }
            FailedRowSlot::Row(_) => format!("{} (failed row: {})", message, failed),
            FailedRowSlot::Text => {
                values[self.failed_row_index] = Value::String(failed.to_string());
                message
            }
        };
        values[self.error_message_index] = Value::String(message);

        Record::from_parts(Arc::clone(&self.schema), values)
    }
}
