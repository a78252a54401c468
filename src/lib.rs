pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod schema;
pub mod transform;

pub mod kafka;
pub mod mapper;

pub use config::Config;
pub use error::{Error, Result, SerializationError};
pub use mapper::{RecordSerializer, SerializationFormat, ValueMapper};
pub use metrics::ErrorCounter;
pub use pipeline::WritePipeline;
pub use transform::{BinaryPair, ErrorIsolatingTransform, Routed};
