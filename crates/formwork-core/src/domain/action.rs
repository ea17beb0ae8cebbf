use crate::types::{FieldValue, RecordName, RecordType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Value object: name of a server-side remote operation
///
/// The expected response shape is always [`ActionResult`], so the name is
/// the whole reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationRef(pub String);

impl OperationRef {
    /// Create an operation reference from any string-like value
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

/// Parameter mapping carried by one remote invocation
///
/// Built from the visible fields of a dialog at submit time and consumed
/// exactly once by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ActionRequest {
    /// Parameter name to value mapping
    pub params: BTreeMap<String, FieldValue>,
}

impl ActionRequest {
    /// Create an empty request
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a parameter
    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        self.params.insert(name.into(), value);
    }

    /// Insert a parameter, builder style
    pub fn with(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.insert(name, value);
        self
    }

    /// Get a parameter by name
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.params.get(name)
    }

    /// Whether a parameter is present
    pub fn contains(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether the request carries no parameters
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Convert to a JSON object for the wire
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for (name, value) in &self.params {
            map.insert(name.clone(), value.to_json());
        }
        serde_json::Value::Object(map)
    }
}

/// Result envelope returned by a remote operation
///
/// An empty envelope is a "no-op success": the call went through but there
/// is nothing to show and nothing to refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ActionResult {
    /// Optional user-facing message, displayed verbatim
    #[serde(default)]
    pub message: Option<String>,

    /// Identifiers of records the operation created or modified
    #[serde(default)]
    pub records: Vec<RecordName>,
}

impl ActionResult {
    /// An empty success envelope
    pub fn empty() -> Self {
        Self::default()
    }

    /// A success envelope carrying a user-facing message
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            records: Vec::new(),
        }
    }

    /// A success envelope listing affected records
    pub fn with_records(records: Vec<RecordName>) -> Self {
        Self {
            message: None,
            records,
        }
    }

    /// Attach a message, builder style
    pub fn and_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Whether the envelope carries no payload
    pub fn is_empty(&self) -> bool {
        self.message.is_none() && self.records.is_empty()
    }
}

/// Which dependent view to reconcile after a populated success
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefreshTarget {
    /// Nothing to refresh
    None,

    /// Reload the collection view of a record type, preserving filters
    List(RecordType),

    /// Reload one record's full state
    Record(RecordType, RecordName),
}
