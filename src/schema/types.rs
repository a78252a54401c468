use bytes::Bytes;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::{Error, Result};

/// Declared type of a schema field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Boolean,
    Int32,
    Int64,
    Float,
    Double,
    String,
    Bytes,
    Array(Box<FieldType>),
    Row(Arc<Schema>),
}

impl FieldType {
    pub fn array(element: FieldType) -> Self {
        FieldType::Array(Box::new(element))
    }

    pub fn row(schema: Arc<Schema>) -> Self {
        FieldType::Row(schema)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Boolean => f.write_str("boolean"),
            FieldType::Int32 => f.write_str("int32"),
            FieldType::Int64 => f.write_str("int64"),
            FieldType::Float => f.write_str("float"),
            FieldType::Double => f.write_str("double"),
            FieldType::String => f.write_str("string"),
            FieldType::Bytes => f.write_str("bytes"),
            FieldType::Array(element) => write!(f, "array<{}>", element),
            FieldType::Row(schema) => write!(f, "row{}", schema),
        }
    }
}

/// Parses the type names accepted in configuration files.
///
/// Row types cannot be spelled this way; they only appear in schemas built
/// in code, such as derived error schemas.
impl FromStr for FieldType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().to_ascii_lowercase();

        if let Some(inner) = name
            .strip_prefix("array<")
            .and_then(|rest| rest.strip_suffix('>'))
        {
            return Ok(FieldType::array(inner.parse()?));
        }

        match name.as_str() {
            "boolean" | "bool" => Ok(FieldType::Boolean),
            "int32" | "int" => Ok(FieldType::Int32),
            "int64" | "long" => Ok(FieldType::Int64),
            "float" => Ok(FieldType::Float),
            "double" => Ok(FieldType::Double),
            "string" => Ok(FieldType::String),
            "bytes" => Ok(FieldType::Bytes),
            _ => Err(Error::Configuration(format!(
                "unsupported field type '{}'",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub field_type: FieldType,
    pub nullable: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            nullable: false,
        }
    }

    pub fn nullable(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            nullable: true,
        }
    }
}

/// Ordered field list describing a [`Record`].
///
/// Field position determines the position of the value inside the record and
/// the key order of structured encodings.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    /// Builds a schema, rejecting duplicate field names.
    pub fn new(fields: Vec<Field>) -> Result<Self> {
        for (i, field) in fields.iter().enumerate() {
            if fields[..i].iter().any(|f| f.name == field.name) {
                return Err(Error::Schema(format!(
                    "duplicate field '{}' in schema",
                    field.name
                )));
            }
        }

        Ok(Self { fields })
    }

    pub(crate) fn from_fields(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", field.name, field.field_type)?;
            if field.nullable {
                f.write_str("?")?;
            }
        }
        f.write_str("}")
    }
}

#[derive(Debug, Default)]
pub struct SchemaBuilder {
    fields: Vec<Field>,
}

impl SchemaBuilder {
    pub fn field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.push(Field::new(name, field_type));
        self
    }

    pub fn nullable_field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.push(Field::nullable(name, field_type));
        self
    }

    pub fn build(self) -> Result<Arc<Schema>> {
        Schema::new(self.fields).map(Arc::new)
    }
}

/// A single field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    Float(f32),
    Double(f64),
    String(String),
    Bytes(Bytes),
    Array(Vec<Value>),
    Row(Record),
}

impl Value {
    /// Runtime type name, used in mismatch reports.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Array(_) => "array",
            Value::Row(_) => "row",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Int32(n) => write!(f, "{}", n),
            Value::Int64(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::Double(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Bytes(b) => write!(f, "{:?}", b),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Row(record) => write!(f, "{}", record),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Bytes> for Value {
    fn from(value: Bytes) -> Self {
        Value::Bytes(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(Bytes::from(value))
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Value::Bytes(Bytes::copy_from_slice(value))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int32(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int64(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<Record> for Value {
    fn from(value: Record) -> Self {
        Value::Row(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// An immutable row of values laid out in its schema's field order.
///
/// Values are not type-checked on construction; mappers check them when
/// encoding, so a record that does not fit its declared types surfaces as a
/// per-record serialization failure.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    schema: Arc<Schema>,
    values: Vec<Value>,
}

impl Record {
    pub fn builder(schema: Arc<Schema>) -> RecordBuilder {
        RecordBuilder::new(schema)
    }

    /// Creates a record from positional values.
    pub fn new(schema: Arc<Schema>, values: Vec<Value>) -> Result<Self> {
        if values.len() != schema.len() {
            return Err(Error::Schema(format!(
                "schema {} has {} fields but {} values were given",
                schema,
                schema.len(),
                values.len()
            )));
        }

        Ok(Self { schema, values })
    }

    pub(crate) fn from_parts(schema: Arc<Schema>, values: Vec<Value>) -> Self {
        debug_assert_eq!(schema.len(), values.len());
        Self { schema, values }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.schema.index_of(name).map(|i| &self.values[i])
    }

    /// Iterates fields and their values in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&Field, &Value)> {
        self.schema.fields().iter().zip(self.values.iter())
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (field, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", field.name, value)?;
        }
        f.write_str("}")
    }
}

/// Builds a [`Record`] by field name. Unset fields are null.
#[derive(Debug)]
pub struct RecordBuilder {
    schema: Arc<Schema>,
    values: Vec<Value>,
    unknown: Vec<String>,
}

impl RecordBuilder {
    fn new(schema: Arc<Schema>) -> Self {
        let values = vec![Value::Null; schema.len()];
        Self {
            schema,
            values,
            unknown: Vec::new(),
        }
    }

    pub fn with_field_value(mut self, name: &str, value: impl Into<Value>) -> Self {
        match self.schema.index_of(name) {
            Some(i) => self.values[i] = value.into(),
            None => self.unknown.push(name.to_string()),
        }
        self
    }

    pub fn build(self) -> Result<Record> {
        if !self.unknown.is_empty() {
            return Err(Error::Schema(format!(
                "fields [{}] are not part of schema {}",
                self.unknown.join(", "),
                self.schema
            )));
        }

        Ok(Record {
            schema: self.schema,
            values: self.values,
        })
    }
}
