//! Record model: field values, the self-rendering capability, and record sources.

use std::borrow::Cow;
use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, TimeZone};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::error::ExportError;
use crate::spec::SpecFieldSchema;

/// Type-level override: a value that renders itself as export text.
///
/// Takes precedence over every other rendering rule.
pub trait CellExport {
    fn to_cell_string(&self) -> String;
}

/// Runtime value of one record field.
#[derive(Clone)]
pub enum EnumFieldValue<'a> {
    /// Missing value; renders as a blank cell.
    None,
    /// Self-rendering value.
    Custom(&'a dyn CellExport),
    /// Text.
    Text(Cow<'a, str>),
    /// Arbitrary-precision decimal.
    Decimal(Decimal),
    /// Signed integer.
    Integer(i64),
    /// Unsigned integer.
    Unsigned(u64),
    /// Floating point number.
    Float(f64),
    /// Boolean.
    Boolean(bool),
    /// Calendar time with its own offset.
    DateTime(DateTime<FixedOffset>),
    /// Anything else, already in display form.
    Other(String),
}

impl std::fmt::Debug for EnumFieldValue<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Custom(value) => write!(f, "Custom({:?})", value.to_cell_string()),
            Self::Text(s) => write!(f, "Text({s:?})"),
            Self::Decimal(d) => write!(f, "Decimal({d})"),
            Self::Integer(n) => write!(f, "Integer({n})"),
            Self::Unsigned(n) => write!(f, "Unsigned({n})"),
            Self::Float(n) => write!(f, "Float({n})"),
            Self::Boolean(b) => write!(f, "Boolean({b})"),
            Self::DateTime(dt) => write!(f, "DateTime({})", dt.to_rfc3339()),
            Self::Other(s) => write!(f, "Other({s:?})"),
        }
    }
}

impl<'a> From<&'a str> for EnumFieldValue<'a> {
    fn from(value: &'a str) -> Self {
        EnumFieldValue::Text(Cow::Borrowed(value))
    }
}

impl<'a> From<&'a String> for EnumFieldValue<'a> {
    fn from(value: &'a String) -> Self {
        EnumFieldValue::Text(Cow::Borrowed(value.as_str()))
    }
}

impl From<String> for EnumFieldValue<'_> {
    fn from(value: String) -> Self {
        EnumFieldValue::Text(Cow::Owned(value))
    }
}

impl From<Decimal> for EnumFieldValue<'_> {
    fn from(value: Decimal) -> Self {
        EnumFieldValue::Decimal(value)
    }
}

impl From<i64> for EnumFieldValue<'_> {
    fn from(value: i64) -> Self {
        EnumFieldValue::Integer(value)
    }
}

impl From<i32> for EnumFieldValue<'_> {
    fn from(value: i32) -> Self {
        EnumFieldValue::Integer(i64::from(value))
    }
}

impl From<u64> for EnumFieldValue<'_> {
    fn from(value: u64) -> Self {
        EnumFieldValue::Unsigned(value)
    }
}

impl From<u32> for EnumFieldValue<'_> {
    fn from(value: u32) -> Self {
        EnumFieldValue::Unsigned(u64::from(value))
    }
}

impl From<f64> for EnumFieldValue<'_> {
    fn from(value: f64) -> Self {
        EnumFieldValue::Float(value)
    }
}

impl From<bool> for EnumFieldValue<'_> {
    fn from(value: bool) -> Self {
        EnumFieldValue::Boolean(value)
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for EnumFieldValue<'_> {
    fn from(value: DateTime<Tz>) -> Self {
        EnumFieldValue::DateTime(value.fixed_offset())
    }
}

impl<'a, T: Into<EnumFieldValue<'a>>> From<Option<T>> for EnumFieldValue<'a> {
    fn from(value: Option<T>) -> Self {
        value.map_or(EnumFieldValue::None, Into::into)
    }
}

/// A record type with a fixed, ordered set of named fields.
///
/// `schema()` and `field_values()` must list fields in the same order.
///
/// ```
/// use rowkit_io_xlsx::{EnumFieldValue, ExportRecord, SpecFieldSchema};
///
/// struct Person {
///     name: String,
///     age: i64,
/// }
///
/// impl ExportRecord for Person {
///     fn schema() -> Vec<SpecFieldSchema> {
///         vec![
///             SpecFieldSchema::new("Name", "title=姓名"),
///             SpecFieldSchema::new("Age", ""),
///         ]
///     }
///
///     fn field_values(&self) -> Vec<EnumFieldValue<'_>> {
///         vec![(&self.name).into(), self.age.into()]
///     }
/// }
/// ```
pub trait ExportRecord {
    /// Field names and annotations, in declaration order.
    fn schema() -> Vec<SpecFieldSchema>;
    /// Field values, in declaration order.
    fn field_values(&self) -> Vec<EnumFieldValue<'_>>;
}

/// Collection of records as seen by the discovery and emission phases.
pub trait RecordSource {
    /// Number of records; fails with [`ExportError::NotASequence`].
    fn count_records(&self) -> Result<usize, ExportError>;
    /// Ordered field schema; fails with [`ExportError::ElementNotRecord`].
    fn derive_field_schema(&self) -> Result<Vec<SpecFieldSchema>, ExportError>;
    /// Values of record `idx_record`, in schema order.
    fn derive_record_values(&self, idx_record: usize) -> Vec<EnumFieldValue<'_>>;
}

impl<R: ExportRecord> RecordSource for [R] {
    fn count_records(&self) -> Result<usize, ExportError> {
        Ok(self.len())
    }

    fn derive_field_schema(&self) -> Result<Vec<SpecFieldSchema>, ExportError> {
        let l_schema = R::schema();
        if l_schema.is_empty() {
            return Err(ExportError::ElementNotRecord);
        }
        Ok(l_schema)
    }

    fn derive_record_values(&self, idx_record: usize) -> Vec<EnumFieldValue<'_>> {
        self.get(idx_record)
            .map(ExportRecord::field_values)
            .unwrap_or_default()
    }
}

impl<R: ExportRecord> RecordSource for Vec<R> {
    fn count_records(&self) -> Result<usize, ExportError> {
        self.as_slice().count_records()
    }

    fn derive_field_schema(&self) -> Result<Vec<SpecFieldSchema>, ExportError> {
        self.as_slice().derive_field_schema()
    }

    fn derive_record_values(&self, idx_record: usize) -> Vec<EnumFieldValue<'_>> {
        self.as_slice().derive_record_values(idx_record)
    }
}

/// Records held as a JSON array of flat objects.
///
/// Fields are the first object's keys in document order; annotations are
/// looked up by field name.
#[derive(Debug, Clone)]
pub struct JsonRecords<'a> {
    data: &'a Value,
    dict_annotations: BTreeMap<String, String>,
}

impl<'a> JsonRecords<'a> {
    /// Wrap `data` with no annotations.
    pub fn new(data: &'a Value) -> Self {
        Self {
            data,
            dict_annotations: BTreeMap::new(),
        }
    }

    /// Attach per-field annotations.
    pub fn with_annotations(mut self, dict_annotations: BTreeMap<String, String>) -> Self {
        self.dict_annotations = dict_annotations;
        self
    }

    fn records(&self) -> Result<&'a Vec<Value>, ExportError> {
        self.data.as_array().ok_or(ExportError::NotASequence)
    }
}

impl RecordSource for JsonRecords<'_> {
    fn count_records(&self) -> Result<usize, ExportError> {
        Ok(self.records()?.len())
    }

    fn derive_field_schema(&self) -> Result<Vec<SpecFieldSchema>, ExportError> {
        let l_records = self.records()?;
        if !l_records.iter().all(Value::is_object) {
            return Err(ExportError::ElementNotRecord);
        }
        let Some(dict_first) = l_records.first().and_then(Value::as_object) else {
            return Err(ExportError::ElementNotRecord);
        };
        if dict_first.is_empty() {
            return Err(ExportError::ElementNotRecord);
        }

        Ok(dict_first
            .keys()
            .map(|c_name| {
                SpecFieldSchema::new(
                    c_name.as_str(),
                    self.dict_annotations
                        .get(c_name)
                        .cloned()
                        .unwrap_or_default(),
                )
            })
            .collect())
    }

    fn derive_record_values(&self, idx_record: usize) -> Vec<EnumFieldValue<'_>> {
        let Some(dict_first) = self.data.get(0).and_then(Value::as_object) else {
            return vec![];
        };
        let dict_record = self.data.get(idx_record).and_then(Value::as_object);

        dict_first
            .keys()
            .map(|c_name| {
                dict_record
                    .and_then(|dict| dict.get(c_name))
                    .map_or(EnumFieldValue::None, derive_field_value_from_json)
            })
            .collect()
    }
}

fn derive_field_value_from_json(value: &Value) -> EnumFieldValue<'_> {
    match value {
        Value::Null => EnumFieldValue::None,
        Value::Bool(b) => EnumFieldValue::Boolean(*b),
        Value::Number(n) => {
            if let Some(n_int) = n.as_i64() {
                EnumFieldValue::Integer(n_int)
            } else if let Some(n_uint) = n.as_u64() {
                EnumFieldValue::Unsigned(n_uint)
            } else {
                n.as_f64()
                    .map_or_else(|| EnumFieldValue::Other(n.to_string()), EnumFieldValue::Float)
            }
        }
        Value::String(s) => EnumFieldValue::Text(Cow::Borrowed(s.as_str())),
        Value::Array(_) | Value::Object(_) => EnumFieldValue::Other(value.to_string()),
    }
}
