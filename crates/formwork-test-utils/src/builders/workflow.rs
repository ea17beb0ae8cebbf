//! WorkflowDefinition and RecordSnapshot builders for tests.

use formwork_core::{
    DialogSchema, FieldDefinition, OperationRef, RecordName, RecordSnapshot, RecordType,
    RefreshTarget, WorkflowDefinition, WorkflowId,
};

/// Fluent builder for a [`WorkflowDefinition`]
///
/// The built definition still goes through the service's validation;
/// the builder only assembles it.
pub struct WorkflowBuilder {
    id: String,
    title: String,
    fields: Vec<FieldDefinition>,
    operation: Option<OperationRef>,
    refresh: RefreshTarget,
}

impl WorkflowBuilder {
    /// Start a workflow with the given id; the dialog title defaults to it
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            title: id.clone(),
            id,
            fields: Vec::new(),
            operation: None,
            refresh: RefreshTarget::None,
        }
    }

    /// Set the dialog title
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Append a field
    pub fn field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }

    /// Bind the remote operation
    pub fn operation(mut self, name: impl Into<String>) -> Self {
        self.operation = Some(OperationRef::new(name));
        self
    }

    /// Reconcile the list view of a record type after success
    pub fn refresh_list(mut self, record_type: impl Into<String>) -> Self {
        self.refresh = RefreshTarget::List(RecordType::new(record_type));
        self
    }

    /// Reconcile one record after success
    pub fn refresh_record(
        mut self,
        record_type: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        self.refresh = RefreshTarget::Record(RecordType::new(record_type), RecordName::new(name));
        self
    }

    /// Assemble the definition
    pub fn build(self) -> WorkflowDefinition {
        WorkflowDefinition {
            id: WorkflowId::new(self.id),
            schema: DialogSchema::new(self.title, self.fields),
            operation: self.operation,
            refresh: self.refresh,
        }
    }
}

/// Build a record snapshot from a field list
pub fn record_snapshot(
    record_type: impl Into<String>,
    name: impl Into<String>,
    fields: &[(&str, serde_json::Value)],
) -> RecordSnapshot {
    let mut map = serde_json::Map::new();
    for (field, value) in fields {
        map.insert(field.to_string(), value.clone());
    }
    RecordSnapshot::new(RecordType::new(record_type), RecordName::new(name), map)
}
