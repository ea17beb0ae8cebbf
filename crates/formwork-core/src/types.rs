use chrono::NaiveDate;
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// Date format used on the wire for date-valued fields
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A single field value inside a dialog or an action request
///
/// Values are JSON-serializable: dates travel as ISO-8601 strings,
/// `Empty` travels as `null`.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// No value entered
    Empty,
    /// Free text (also carries select options)
    Text(String),
    /// Calendar date
    Date(NaiveDate),
    /// Boolean flag
    Bool(bool),
    /// Numeric quantity
    Number(f64),
    /// Reference to a record by name
    Reference(RecordName),
}

impl FieldValue {
    /// Whether the value counts as missing for required-field validation
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Empty => true,
            FieldValue::Text(s) => s.is_empty(),
            FieldValue::Reference(r) => r.0.is_empty(),
            _ => false,
        }
    }

    /// Convert to the wire representation
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Empty => serde_json::Value::Null,
            FieldValue::Text(s) => serde_json::Value::String(s.clone()),
            FieldValue::Date(d) => serde_json::Value::String(d.format(DATE_FORMAT).to_string()),
            FieldValue::Bool(b) => serde_json::Value::Bool(*b),
            FieldValue::Number(n) => match serde_json::Number::from_f64(*n) {
                Some(num) => serde_json::Value::Number(num),
                None => serde_json::Value::Null,
            },
            FieldValue::Reference(r) => serde_json::Value::String(r.0.clone()),
        }
    }

    /// Best-effort conversion from a JSON value
    ///
    /// Strings that parse as ISO-8601 dates become `Date`; references
    /// cannot be told apart from text on the wire and come back as `Text`.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => FieldValue::Empty,
            serde_json::Value::Bool(b) => FieldValue::Bool(*b),
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(f) => FieldValue::Number(f),
                None => FieldValue::Empty,
            },
            serde_json::Value::String(s) => match NaiveDate::parse_from_str(s, DATE_FORMAT) {
                Ok(d) => FieldValue::Date(d),
                Err(_) => FieldValue::Text(s.clone()),
            },
            other => FieldValue::Text(other.to_string()),
        }
    }

    /// Try to read the value as text
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Reference(r) => Some(&r.0),
            _ => None,
        }
    }

    /// Try to read the value as a date
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Try to read the value as a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to read the value as a number
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(FieldValue::from_json(&value))
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(d: NaiveDate) -> Self {
        FieldValue::Date(d)
    }
}

/// Value object: record type identifier (one persisted business entity kind)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordType(pub String);

impl RecordType {
    /// Create a record type from any string-like value
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

/// Value object: unique name of a persisted record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordName(pub String);

impl RecordName {
    /// Create a record name from any string-like value
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

/// Read-only snapshot of a record as seen by a form
///
/// This is the context handed to event handlers and controllers. The
/// record itself lives in the external record store; the snapshot is just
/// the field values the form currently shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSnapshot {
    /// Type of the record
    pub record_type: RecordType,

    /// Unique name of the record
    pub name: RecordName,

    /// Current field values as a JSON map
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl RecordSnapshot {
    /// Create a snapshot from a record type, name and field map
    pub fn new(
        record_type: RecordType,
        name: RecordName,
        fields: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            record_type,
            name,
            fields,
        }
    }

    /// Get a field value by name
    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.fields.get(name)
    }

    /// Get a field value as a string, if present and textual
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(|v| v.as_str())
    }
}
