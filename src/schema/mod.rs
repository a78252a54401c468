pub mod error_schema;
pub mod input;
pub mod types;

pub use error_schema::{error_schema, ErrorSchema, ERROR_MESSAGE_FIELD, FAILED_ROW_FIELD};
pub use input::record_from_json;
pub use types::*;
