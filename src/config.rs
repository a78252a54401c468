use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::mapper::SerializationFormat;
use crate::metrics::DEFAULT_ERROR_COUNTER;
use crate::schema::{Field, FieldType, Schema};
use crate::{Error, Result};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub schema: SchemaConfig,
    pub writer: WriterConfig,
    pub kafka: KafkaConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchemaConfig {
    pub fields: Vec<FieldConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FieldConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub nullable: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WriterConfig {
    #[serde(default)]
    pub format: SerializationFormat,
    pub topic: String,
    #[serde(default)]
    pub raw_field: Option<String>,
    #[serde(default = "default_include_stack_trace")]
    pub include_stack_trace: bool,
    #[serde(default = "default_error_counter_name")]
    pub error_counter_name: String,
    #[serde(default)]
    pub dead_letter_path: Option<PathBuf>,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KafkaConfig {
    pub brokers: Vec<String>,
    #[serde(default = "default_compression")]
    pub compression: String,
    #[serde(default = "default_acks")]
    pub acks: String,
    #[serde(default = "default_linger_ms")]
    pub linger_ms: u32,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_message_timeout_ms")]
    pub message_timeout_ms: u64,
    /// Raw librdkafka properties, applied after the typed settings.
    #[serde(default)]
    pub producer_config_updates: HashMap<String, String>,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("ROW_WRITER")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema.fields.is_empty() {
            return Err(Error::Configuration(
                "schema must declare at least one field".to_string(),
            ));
        }
        if self.writer.topic.trim().is_empty() {
            return Err(Error::Configuration("writer.topic must not be empty".to_string()));
        }
        if self.writer.channel_capacity == 0 {
            return Err(Error::Configuration(
                "writer.channel_capacity must be greater than zero".to_string(),
            ));
        }
        if self.kafka.brokers.is_empty() {
            return Err(Error::Configuration("kafka.brokers must not be empty".to_string()));
        }
        if self.writer.raw_field.is_some() && self.writer.format != SerializationFormat::Raw {
            return Err(Error::Configuration(format!(
                "writer.raw_field only applies to the raw format, not {:?}",
                self.writer.format
            )));
        }

        self.input_schema().map(|_| ())
    }

    /// Builds the input schema declared under `[schema]`.
    pub fn input_schema(&self) -> Result<Arc<Schema>> {
        let fields = self
            .schema
            .fields
            .iter()
            .map(|f| -> Result<Field> {
                let field_type: FieldType = f.field_type.parse()?;
                Ok(Field {
                    name: f.name.clone(),
                    field_type,
                    nullable: f.nullable,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        match Schema::new(fields) {
            Ok(schema) => Ok(Arc::new(schema)),
            Err(Error::Schema(message)) => Err(Error::Configuration(message)),
            Err(e) => Err(e),
        }
    }

    pub fn bootstrap_servers(&self) -> String {
        self.kafka.brokers.join(",")
    }
}

fn default_include_stack_trace() -> bool {
    true
}

fn default_error_counter_name() -> String {
    DEFAULT_ERROR_COUNTER.to_string()
}

fn default_channel_capacity() -> usize {
    1000
}

fn default_compression() -> String {
    "snappy".to_string()
}

fn default_acks() -> String {
    "all".to_string()
}

fn default_linger_ms() -> u32 {
    100
}

fn default_batch_size() -> usize {
    16384
}

fn default_message_timeout_ms() -> u64 {
    30_000
}
