use crate::domain::action::{OperationRef, RefreshTarget};
use crate::types::{FieldValue, RecordType};
use crate::WorkflowError;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Value object: Workflow ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowId(pub String);

impl WorkflowId {
    /// Create a workflow id from any string-like value
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

/// Declared type of a dialog field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldType {
    /// Free text input
    Text,

    /// Calendar date input
    Date,

    /// Checkbox
    Boolean,

    /// Numeric quantity
    Numeric,

    /// Single choice from a fixed option list
    Select {
        /// The selectable options, in display order
        options: Vec<String>,
    },

    /// Link to a record of the given type
    Reference {
        /// Record type the field points at
        record_type: RecordType,
    },
}

impl FieldType {
    /// Whether a value fits this field type
    ///
    /// `Empty` fits everywhere; the required flag decides whether that is
    /// acceptable at submit time.
    pub fn accepts(&self, value: &FieldValue) -> bool {
        match (self, value) {
            (_, FieldValue::Empty) => true,
            (FieldType::Text, FieldValue::Text(_)) => true,
            (FieldType::Date, FieldValue::Date(_)) => true,
            (FieldType::Boolean, FieldValue::Bool(_)) => true,
            (FieldType::Numeric, FieldValue::Number(_)) => true,
            (FieldType::Select { .. }, FieldValue::Text(_)) => true,
            (FieldType::Reference { .. }, FieldValue::Reference(_)) => true,
            (FieldType::Reference { .. }, FieldValue::Text(_)) => true,
            _ => false,
        }
    }
}

/// Default value policy for a field, resolved once when the dialog opens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldDefault {
    /// A fixed value
    Literal(FieldValue),

    /// Today's date, computed at open time and never re-resolved
    CurrentDate,
}

impl FieldDefault {
    /// Resolve the default into a concrete value
    pub fn resolve(&self) -> FieldValue {
        match self {
            FieldDefault::Literal(value) => value.clone(),
            FieldDefault::CurrentDate => FieldValue::Date(Utc::now().date_naive()),
        }
    }
}

/// Visibility predicate over another field's current value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibleWhen {
    /// Name of the controlling field
    pub field: String,

    /// Value the controlling field must hold for this field to show
    pub equals: FieldValue,
}

/// One field of a dialog schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Parameter name, unique within the schema
    pub name: String,

    /// Human-readable label
    pub label: String,

    /// Declared type
    pub field_type: FieldType,

    /// Whether the field must be filled before submit
    pub required: bool,

    /// Default value policy
    pub default: Option<FieldDefault>,

    /// Optional visibility predicate
    pub visible_when: Option<VisibleWhen>,
}

impl FieldDefinition {
    /// Create a field with the given name and type, optional and unlabeled
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            field_type,
            required: false,
            default: None,
            visible_when: None,
        }
    }

    /// Create a free text field
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Text)
    }

    /// Create a date field
    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Date)
    }

    /// Create a boolean field
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Boolean)
    }

    /// Create a numeric field
    pub fn numeric(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Numeric)
    }

    /// Create a select field with the given options
    pub fn select(name: impl Into<String>, options: &[&str]) -> Self {
        Self::new(
            name,
            FieldType::Select {
                options: options.iter().map(|o| o.to_string()).collect(),
            },
        )
    }

    /// Create a reference field pointing at a record type
    pub fn reference(name: impl Into<String>, record_type: RecordType) -> Self {
        Self::new(name, FieldType::Reference { record_type })
    }

    /// Set the label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Mark the field required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Set a literal default value
    pub fn with_default(mut self, value: FieldValue) -> Self {
        self.default = Some(FieldDefault::Literal(value));
        self
    }

    /// Default the field to the date the dialog opens
    pub fn default_current_date(mut self) -> Self {
        self.default = Some(FieldDefault::CurrentDate);
        self
    }

    /// Show the field only while another field holds the given value
    pub fn visible_when(mut self, field: impl Into<String>, equals: FieldValue) -> Self {
        self.visible_when = Some(VisibleWhen {
            field: field.into(),
            equals,
        });
        self
    }
}

/// Represents a validated dialog field schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogSchema {
    /// Dialog title
    pub title: String,

    /// The fields, in declaration order
    pub fields: Vec<FieldDefinition>,
}

impl DialogSchema {
    /// Create a schema from a title and field list
    pub fn new(title: impl Into<String>, fields: Vec<FieldDefinition>) -> Self {
        Self {
            title: title.into(),
            fields,
        }
    }

    /// Look up a field definition by name
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Validate the schema
    ///
    /// Every failure here is a developer error: the schema is wrong, not
    /// the user input.
    pub fn validate(&self) -> Result<(), WorkflowError> {
        if self.fields.is_empty() {
            return Err(WorkflowError::SchemaError(
                "Dialog must have at least one field".to_string(),
            ));
        }

        // Check for name uniqueness
        let mut names = HashSet::new();
        for field in &self.fields {
            if !names.insert(field.name.as_str()) {
                return Err(WorkflowError::SchemaError(format!(
                    "Duplicate field name: {}",
                    field.name
                )));
            }
        }

        for field in &self.fields {
            // Visibility predicates must point at another declared field
            if let Some(predicate) = &field.visible_when {
                if predicate.field == field.name {
                    return Err(WorkflowError::SchemaError(format!(
                        "Field {} cannot be visible_when on itself",
                        field.name
                    )));
                }
                if !names.contains(predicate.field.as_str()) {
                    return Err(WorkflowError::SchemaError(format!(
                        "Field {} references undeclared field: {}",
                        field.name, predicate.field
                    )));
                }
            }

            match &field.field_type {
                FieldType::Select { options } => {
                    if options.is_empty() {
                        return Err(WorkflowError::SchemaError(format!(
                            "Select field {} has no options",
                            field.name
                        )));
                    }
                    // A literal select default must be one of the options
                    if let Some(FieldDefault::Literal(FieldValue::Text(default))) = &field.default {
                        if !options.contains(default) {
                            return Err(WorkflowError::SchemaError(format!(
                                "Default '{}' of select field {} is not an option",
                                default, field.name
                            )));
                        }
                    }
                }
                FieldType::Reference { record_type } => {
                    if record_type.0.is_empty() {
                        return Err(WorkflowError::SchemaError(format!(
                            "Reference field {} has no record type",
                            field.name
                        )));
                    }
                }
                _ => {}
            }

            // Literal defaults must fit the declared type
            if let Some(FieldDefault::Literal(default)) = &field.default {
                if !field.field_type.accepts(default) {
                    return Err(WorkflowError::SchemaError(format!(
                        "Default of field {} does not fit its declared type",
                        field.name
                    )));
                }
            }
            if let Some(FieldDefault::CurrentDate) = &field.default {
                if !matches!(field.field_type, FieldType::Date) {
                    return Err(WorkflowError::SchemaError(format!(
                        "CurrentDate default on non-date field {}",
                        field.name
                    )));
                }
            }
        }

        Ok(())
    }
}

/// A registered workflow: dialog schema, bound operation and refresh target
///
/// Immutable after registration. The operation may be absent while a
/// workflow is under construction; submitting such a workflow fails fast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// ID of the workflow
    pub id: WorkflowId,

    /// The dialog schema presented to the user
    pub schema: DialogSchema,

    /// The remote operation submits dispatch to
    pub operation: Option<OperationRef>,

    /// Which view to reconcile after a populated success
    pub refresh: RefreshTarget,
}

impl WorkflowDefinition {
    /// Validate the workflow definition
    pub fn validate(&self) -> Result<(), WorkflowError> {
        if self.id.0.is_empty() {
            return Err(WorkflowError::SchemaError(
                "Workflow id must not be empty".to_string(),
            ));
        }
        self.schema.validate()
    }
}
