//! Error types and result handling for kafka-row-writer.
//!
//! Two families of errors live here:
//!
//! - [`Error`] covers everything that stops the writer: bad configuration,
//!   broker failures, unreadable input. It is returned through the crate's
//!   [`Result`] alias.
//! - [`SerializationError`] is produced per record by a value mapper. The
//!   error-isolating transform catches it and routes the record to the error
//!   channel, so it never reaches the caller as a processing failure.
//!
//! # Example
//!
//! ```rust
//! use kafka_row_writer::{Error, Result};
//!
//! fn build_mapper() -> Result<()> {
//!     Err(Error::Configuration("raw format needs a bytes field".to_string()))
//! }
//!
//! match build_mapper() {
//!     Ok(()) => println!("Ready"),
//!     Err(Error::Configuration(msg)) => eprintln!("Configuration error: {}", msg),
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! ```

use thiserror::Error;

/// The main error type for kafka-row-writer operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Construction-time rejection of a mapper, transform or schema setup.
    ///
    /// Raised before any record is processed.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Failure loading or deserializing the settings file and environment.
    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    /// Kafka client or producer error.
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    /// JSON error outside of per-record mapping, e.g. while reading input.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error, typically from input or dead-letter files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A record was built against a schema it does not fit.
    #[error("Schema error: {0}")]
    Schema(String),

    /// An input line could not be turned into a record.
    #[error("Invalid input at line {line}: {message}")]
    InvalidInput {
        /// 1-based line number in the input stream
        line: usize,
        /// Description of what was invalid
        message: String,
    },

    /// A pipeline channel closed while records were still being routed.
    #[error("Channel closed: {0}")]
    ChannelClosed(String),
}

/// Per-record failure of a value mapper.
///
/// These errors are recoverable: the error-isolating transform converts them
/// into error records instead of propagating them.
#[derive(Error, Debug)]
pub enum SerializationError {
    /// The record was built against a different schema than the mapper's.
    #[error("record schema {found} does not match configured schema {expected}")]
    SchemaMismatch {
        /// Configured schema
        expected: String,
        /// Schema carried by the record
        found: String,
    },

    /// The record carries no value for a required field.
    #[error("field '{field}' is missing from the record")]
    MissingField {
        /// Field name
        field: String,
    },

    /// A value does not match its declared field type.
    #[error("field '{field}' expected {expected} but found {found}")]
    TypeMismatch {
        /// Field path
        field: String,
        /// Declared type
        expected: String,
        /// Runtime type of the value
        found: &'static str,
    },

    /// A non-nullable field holds null.
    #[error("field '{field}' is not nullable but holds null")]
    NullValue {
        /// Field path
        field: String,
    },

    /// JSON cannot represent NaN or infinite numbers.
    #[error("field '{field}' holds a non-finite number")]
    NonFiniteFloat {
        /// Field path
        field: String,
    },

    /// The JSON encoder itself failed.
    #[error("JSON encoding failed")]
    Json(#[from] serde_json::Error),
}

/// A convenient Result type alias for kafka-row-writer operations.
///
/// This is equivalent to `std::result::Result<T, kafka_row_writer::Error>`.
pub type Result<T> = std::result::Result<T, Error>;
