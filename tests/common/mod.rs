#![allow(dead_code)]

use kafka_row_writer::config::{Config, FieldConfig, KafkaConfig, SchemaConfig, WriterConfig};
use kafka_row_writer::schema::{FieldType, Record, Schema};
use kafka_row_writer::SerializationFormat;
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

pub const ERROR_COUNTER: &str = "Kafka-write-error-counter";

/// `{name: string}`
pub fn name_schema() -> Arc<Schema> {
    Schema::builder()
        .field("name", FieldType::String)
        .build()
        .unwrap()
}

/// `{payload: bytes}`
pub fn raw_schema() -> Arc<Schema> {
    Schema::builder()
        .field("payload", FieldType::Bytes)
        .build()
        .unwrap()
}

pub fn name_rows(schema: &Arc<Schema>) -> Vec<Record> {
    ["a", "b", "c"]
        .iter()
        .map(|name| {
            Record::builder(Arc::clone(schema))
                .with_field_value("name", *name)
                .build()
                .unwrap()
        })
        .collect()
}

pub fn raw_rows(schema: &Arc<Schema>) -> Vec<Record> {
    ["a", "b", "c"]
        .iter()
        .map(|payload| {
            Record::builder(Arc::clone(schema))
                .with_field_value("payload", payload.as_bytes())
                .build()
                .unwrap()
        })
        .collect()
}

/// Get test configuration from environment variables
pub fn get_test_config(format: SerializationFormat, dead_letter_path: Option<PathBuf>) -> Config {
    let fields = match format {
        SerializationFormat::Json => vec![FieldConfig {
            name: "name".to_string(),
            field_type: "string".to_string(),
            nullable: false,
        }],
        SerializationFormat::Raw => vec![FieldConfig {
            name: "payload".to_string(),
            field_type: "bytes".to_string(),
            nullable: false,
        }],
    };

    let writer = WriterConfig {
        format,
        topic: format!("test_{}", std::process::id()),
        raw_field: None,
        include_stack_trace: true,
        error_counter_name: ERROR_COUNTER.to_string(),
        dead_letter_path,
        channel_capacity: 16,
    };

    let kafka = KafkaConfig {
        brokers: env::var("TEST_KAFKA_BROKERS")
            .unwrap_or_else(|_| "localhost:9092".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .collect(),
        compression: "none".to_string(), // No compression for tests
        acks: "all".to_string(),
        linger_ms: 0, // Immediate sending for tests
        batch_size: 1, // Small batches for tests
        message_timeout_ms: 10_000,
        producer_config_updates: HashMap::new(),
    };

    Config {
        schema: SchemaConfig { fields },
        writer,
        kafka,
    }
}
