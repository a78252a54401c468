//! Record to bytes mappers.
//!
//! A mapper turns a [`Record`] conforming to a pre-declared [`Schema`] into
//! the value bytes of a Kafka message. The variant is picked once, from
//! configuration, and then applied to every record:
//!
//! - [`JsonSerializer`] encodes the whole record as a JSON object whose keys
//!   follow the schema's field order.
//! - [`RawSerializer`] passes the bytes of a single binary field through
//!   untouched.

pub mod json;
pub mod raw;


use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::SerializationError;
use crate::schema::{Record, Schema};
use crate::{Error, Result};

pub use json::{encode_json, JsonSerializer};
pub use raw::RawSerializer;

/// The single capability every mapper provides.
pub trait RecordSerializer {
    /// Schema the mapper was configured with.
    fn schema(&self) -> &Arc<Schema>;

    /// Encodes one record into value bytes.
    fn encode(&self, record: &Record) -> std::result::Result<Bytes, SerializationError>;
}

/// Output format selected in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SerializationFormat {
    #[default]
    #[serde(alias = "JSON")]
    Json,
    #[serde(alias = "RAW")]
    Raw,
}

/// The configured mapper.
#[derive(Debug, Clone)]
pub enum ValueMapper {
    Json(JsonSerializer),
    Raw(RawSerializer),
}

impl ValueMapper {
    pub fn json(schema: Arc<Schema>) -> Self {
        ValueMapper::Json(JsonSerializer::new(schema))
    }

    pub fn raw(schema: Arc<Schema>, field: &str) -> Result<Self> {
        RawSerializer::new(schema, field).map(ValueMapper::Raw)
    }

    /// Builds the mapper for `format`.
    ///
    /// For [`SerializationFormat::Raw`] without an explicit field name, the
    /// schema's only field is used.
    pub fn from_format(
        format: SerializationFormat,
        schema: Arc<Schema>,
        raw_field: Option<&str>,
    ) -> Result<Self> {
        match format {
            SerializationFormat::Json => Ok(Self::json(schema)),
            SerializationFormat::Raw => {
                let field = match raw_field {
                    Some(field) => field.to_string(),
                    None => match schema.fields() {
                        [only] => only.name.clone(),
                        _ => {
                            return Err(Error::Configuration(format!(
                                "raw format needs a schema with exactly one bytes field, got {}",
                                schema
                            )))
                        }
                    },
                };
                Self::raw(schema, &field)
            }
        }
    }

    pub fn format(&self) -> SerializationFormat {
        match self {
            ValueMapper::Json(_) => SerializationFormat::Json,
            ValueMapper::Raw(_) => SerializationFormat::Raw,
        }
    }
}

impl RecordSerializer for ValueMapper {
    fn schema(&self) -> &Arc<Schema> {
        match self {
            ValueMapper::Json(serializer) => serializer.schema(),
            ValueMapper::Raw(serializer) => serializer.schema(),
        }
    }

    fn encode(&self, record: &Record) -> std::result::Result<Bytes, SerializationError> {
        match self {
            ValueMapper::Json(serializer) => serializer.encode(record),
            ValueMapper::Raw(serializer) => serializer.encode(record),
        }
    }
}
