use crate::domain::schema::{DialogSchema, WorkflowId};
use crate::domain::action::ActionRequest;
use crate::types::FieldValue;
use crate::WorkflowError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Dialog instance status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogStatus {
    /// Dialog is visible and accepting input
    Open,

    /// A remote call has been dispatched; the dialog is hidden
    AwaitingResponse,

    /// The remote call settled successfully
    Completed,

    /// The remote call settled with an error
    Failed,

    /// The dialog was dismissed without submitting
    Cancelled,
}

/// Value object: Dialog instance ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DialogId(pub String);

/// A field-level validation error, surfaced inside the dialog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Name of the flagged field
    pub field: String,

    /// Error message shown next to the field
    pub message: String,
}

/// Live state of one field inside an open dialog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldState {
    /// Field name, matching the schema entry
    pub name: String,

    /// Current value
    pub value: FieldValue,

    /// Whether the field is currently shown
    pub visible: bool,

    /// Field-level error from the last failed validation
    pub error: Option<String>,
}

/// Aggregate: one open dialog
///
/// Owns the field values entered so far and the submit lifecycle. The
/// instance issues at most one action request; the request is collected
/// from the fields that are visible at submit time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogInstance {
    /// Unique identifier
    pub id: DialogId,

    /// Workflow this dialog belongs to
    pub workflow_id: WorkflowId,

    /// The schema the dialog was opened with
    pub schema: DialogSchema,

    /// Per-field state, in declaration order
    pub fields: Vec<FieldState>,

    /// Current status
    pub status: DialogStatus,

    /// Error message if the remote call failed
    pub error: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl DialogInstance {
    /// Open a new dialog for a validated schema
    ///
    /// Defaults are resolved exactly once, here. Caller-supplied defaults
    /// override schema defaults; a caller default naming an undeclared
    /// field is a developer error.
    pub fn open(
        workflow_id: WorkflowId,
        schema: &DialogSchema,
        defaults: &BTreeMap<String, FieldValue>,
    ) -> Result<Self, WorkflowError> {
        for (name, value) in defaults {
            let definition = schema
                .field(name)
                .ok_or_else(|| WorkflowError::UnknownField(name.clone()))?;
            if !definition.field_type.accepts(value) {
                return Err(WorkflowError::InvalidValue(format!(
                    "Default for field {} does not fit its declared type",
                    name
                )));
            }
        }

        let fields = schema
            .fields
            .iter()
            .map(|definition| {
                let value = match defaults.get(&definition.name) {
                    Some(override_value) => override_value.clone(),
                    None => definition
                        .default
                        .as_ref()
                        .map(|d| d.resolve())
                        .unwrap_or(FieldValue::Empty),
                };
                FieldState {
                    name: definition.name.clone(),
                    value,
                    visible: true,
                    error: None,
                }
            })
            .collect();

        let now = Utc::now();
        let mut instance = Self {
            id: DialogId(Uuid::new_v4().to_string()),
            workflow_id,
            schema: schema.clone(),
            fields,
            status: DialogStatus::Open,
            error: None,
            created_at: now,
            updated_at: now,
        };
        instance.refresh_visibility();
        Ok(instance)
    }

    /// Update the timestamp
    #[inline]
    pub fn update_timestamp(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Whether the modal is hidden
    ///
    /// Hiding happens exactly once, on the transition out of `Open`;
    /// every later state keeps the dialog hidden.
    #[inline]
    pub fn is_hidden(&self) -> bool {
        self.status != DialogStatus::Open
    }

    /// Get the state of one field
    pub fn field(&self, name: &str) -> Option<&FieldState> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Get the current value of one field
    pub fn value_of(&self, name: &str) -> Option<&FieldValue> {
        self.field(name).map(|f| &f.value)
    }

    /// Set a field value and re-evaluate visibility
    ///
    /// Clears the field's error flag; the next validation re-flags it if
    /// the value is still missing.
    pub fn set_value(&mut self, name: &str, value: FieldValue) -> Result<(), WorkflowError> {
        if self.status != DialogStatus::Open {
            return Err(WorkflowError::InvalidState(format!(
                "Cannot edit dialog in state: {:?}",
                self.status
            )));
        }

        let definition = self
            .schema
            .field(name)
            .ok_or_else(|| WorkflowError::UnknownField(name.to_string()))?;
        if !definition.field_type.accepts(&value) {
            return Err(WorkflowError::InvalidValue(format!(
                "Field {} does not accept {:?}",
                name, value
            )));
        }

        let field = self
            .fields
            .iter_mut()
            .find(|f| f.name == name)
            .ok_or_else(|| WorkflowError::UnknownField(name.to_string()))?;
        field.value = value;
        field.error = None;

        self.refresh_visibility();
        self.update_timestamp();
        Ok(())
    }

    /// Re-evaluate every visibility predicate, in field-declaration order
    ///
    /// Hidden fields keep their stored value; they are only excluded from
    /// the collected action request.
    pub fn refresh_visibility(&mut self) {
        for index in 0..self.fields.len() {
            let visible = match &self.schema.fields[index].visible_when {
                None => true,
                Some(predicate) => self
                    .value_of(&predicate.field)
                    .map(|value| *value == predicate.equals)
                    .unwrap_or(false),
            };
            self.fields[index].visible = visible;
        }
    }

    /// Validate required fields over the currently visible fields
    ///
    /// Failing fields get their error flag set; passing fields get it
    /// cleared. Returns the collected field errors, empty on success.
    pub fn validate_required(&mut self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        for index in 0..self.fields.len() {
            let definition = &self.schema.fields[index];
            let field = &mut self.fields[index];
            if field.visible && definition.required && field.value.is_empty() {
                let message = format!("{} is required", definition.label);
                field.error = Some(message.clone());
                errors.push(FieldError {
                    field: field.name.clone(),
                    message,
                });
            } else {
                field.error = None;
            }
        }
        errors
    }

    /// Collect the action request from the visible fields
    pub fn collect_request(&self) -> ActionRequest {
        let mut request = ActionRequest::new();
        for field in &self.fields {
            if field.visible {
                request.insert(field.name.clone(), field.value.clone());
            }
        }
        request
    }

    /// Transition into the in-flight state, hiding the dialog
    ///
    /// Rejected when a prior submit from this instance is still pending,
    /// or when the dialog has already settled.
    pub fn begin_submit(&mut self) -> Result<(), WorkflowError> {
        match self.status {
            DialogStatus::Open => {
                self.status = DialogStatus::AwaitingResponse;
                self.update_timestamp();
                Ok(())
            }
            DialogStatus::AwaitingResponse => Err(WorkflowError::SubmitInFlight(self.id.0.clone())),
            other => Err(WorkflowError::InvalidState(format!(
                "Cannot submit dialog in state: {:?}",
                other
            ))),
        }
    }

    /// Settle the in-flight request successfully
    pub fn complete(&mut self) -> Result<(), WorkflowError> {
        if self.status != DialogStatus::AwaitingResponse {
            return Err(WorkflowError::InvalidState(format!(
                "Cannot complete dialog in state: {:?}",
                self.status
            )));
        }
        self.status = DialogStatus::Completed;
        self.update_timestamp();
        Ok(())
    }

    /// Settle the in-flight request with a remote failure
    pub fn fail(&mut self, error: String) -> Result<(), WorkflowError> {
        if self.status != DialogStatus::AwaitingResponse {
            return Err(WorkflowError::InvalidState(format!(
                "Cannot fail dialog in state: {:?}",
                self.status
            )));
        }
        self.status = DialogStatus::Failed;
        self.error = Some(error);
        self.update_timestamp();
        Ok(())
    }

    /// Dismiss an open dialog without submitting
    pub fn dismiss(&mut self) -> Result<(), WorkflowError> {
        if self.status != DialogStatus::Open {
            return Err(WorkflowError::InvalidState(format!(
                "Cannot dismiss dialog in state: {:?}",
                self.status
            )));
        }
        self.status = DialogStatus::Cancelled;
        self.update_timestamp();
        Ok(())
    }
}
