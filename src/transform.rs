//! Error-isolating write transform.
//!
//! [`ErrorIsolatingTransform`] wraps a [`ValueMapper`] and turns it into a
//! total function over the input: every record produces exactly one output,
//! either a [`BinaryPair`] for the broker or an error record for the dead
//! letter channel. Mapping failures bump an [`ErrorCounter`].
//!
//! # Example
//!
//! ```rust
//! use kafka_row_writer::mapper::ValueMapper;
//! use kafka_row_writer::schema::{error_schema, FieldType, Record, Schema};
//! use kafka_row_writer::transform::{ErrorIsolatingTransform, Routed};
//!
//! # fn main() -> kafka_row_writer::Result<()> {
//! let schema = Schema::builder().field("name", FieldType::String).build()?;
//! let transform = ErrorIsolatingTransform::new(
//!     "Kafka-write-error-counter",
//!     ValueMapper::json(schema.clone()),
//!     error_schema(&schema),
//!     true,
//! )?;
//!
//! let record = Record::builder(schema).with_field_value("name", "a").build()?;
//! match transform.process(&record) {
//!     Routed::Success(pair) => assert_eq!(&pair.value[..], br#"{"name":"a"}"#),
//!     Routed::Failure(error) => panic!("unexpected failure: {}", error),
//! }
//! # Ok(())
//! # }
//! ```

use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, error};

use crate::error::SerializationError;
use crate::mapper::{RecordSerializer, ValueMapper};
use crate::metrics::ErrorCounter;
use crate::schema::{ErrorSchema, Record, Schema};
use crate::Result;

/// Key/value bytes ready for publishing.
///
/// The key is always empty; this stage derives no partition key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BinaryPair {
    pub key: Bytes,
    pub value: Bytes,
}

impl BinaryPair {
    pub fn new(value: Bytes) -> Self {
        Self {
            key: Bytes::new(),
            value,
        }
    }
}

/// Outcome of processing one record.
#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    Success(BinaryPair),
    /// Error record conforming to the transform's error schema.
    Failure(Record),
}

/// Receiver with one channel per output kind.
pub trait OutputReceiver {
    fn output(&mut self, pair: BinaryPair);
    fn output_error(&mut self, record: Record);
}

/// In-memory receiver collecting both channels.
#[derive(Debug, Default)]
pub struct CollectedOutputs {
    pub pairs: Vec<BinaryPair>,
    pub errors: Vec<Record>,
}

impl OutputReceiver for CollectedOutputs {
    fn output(&mut self, pair: BinaryPair) {
        self.pairs.push(pair);
    }

    fn output_error(&mut self, record: Record) {
        self.errors.push(record);
    }
}

#[derive(Debug)]
pub struct ErrorIsolatingTransform {
    counter: ErrorCounter,
    mapper: ValueMapper,
    error_schema: ErrorSchema,
    include_stack_trace: bool,
}

impl ErrorIsolatingTransform {
    /// Creates a transform with its own counter named `counter_name`.
    ///
    /// Fails with [`crate::Error::Configuration`] when `error_schema` cannot
    /// hold error records for the mapper's schema.
    pub fn new(
        counter_name: impl Into<String>,
        mapper: ValueMapper,
        error_schema: Arc<Schema>,
        include_stack_trace: bool,
    ) -> Result<Self> {
        Self::with_counter(
            ErrorCounter::new(counter_name),
            mapper,
            error_schema,
            include_stack_trace,
        )
    }

    /// Creates a transform that increments an existing counter handle.
    pub fn with_counter(
        counter: ErrorCounter,
        mapper: ValueMapper,
        error_schema: Arc<Schema>,
        include_stack_trace: bool,
    ) -> Result<Self> {
        let error_schema = ErrorSchema::new(error_schema, mapper.schema())?;

        debug!(
            counter = %counter.name(),
            format = ?mapper.format(),
            schema = %mapper.schema(),
            include_stack_trace,
            "Created error-isolating transform"
        );

        Ok(Self {
            counter,
            mapper,
            error_schema,
            include_stack_trace,
        })
    }

    pub fn counter(&self) -> &ErrorCounter {
        &self.counter
    }

    pub fn mapper(&self) -> &ValueMapper {
        &self.mapper
    }

    pub fn error_schema(&self) -> &Arc<Schema> {
        self.error_schema.schema()
    }

    pub fn process(&self, record: &Record) -> Routed {
        match self.mapper.encode(record) {
            Ok(value) => Routed::Success(BinaryPair::new(value)),
            Err(err) => {
                self.counter.inc();
                error!(
                    counter = %self.counter.name(),
                    error = %err,
                    "Error while processing the element"
                );
                let message = self.describe(err);
                Routed::Failure(self.error_schema.record(record, message))
            }
        }
    }

    pub fn process_into<R: OutputReceiver + ?Sized>(&self, record: &Record, receiver: &mut R) {
        match self.process(record) {
            Routed::Success(pair) => receiver.output(pair),
            Routed::Failure(error_record) => receiver.output_error(error_record),
        }
    }

    /// Processes a batch into a fresh [`CollectedOutputs`].
    pub fn process_all<'a, I>(&self, records: I) -> CollectedOutputs
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let mut outputs = CollectedOutputs::default();
        for record in records {
            self.process_into(record, &mut outputs);
        }
        outputs
    }

    fn describe(&self, err: SerializationError) -> String {
        if self.include_stack_trace {
            format!("{:?}", anyhow::Error::new(err))
        } else {
            err.to_string()
        }
    }
}
