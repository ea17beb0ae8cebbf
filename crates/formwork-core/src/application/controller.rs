use crate::domain::action::{ActionRequest, OperationRef, RefreshTarget};
use crate::domain::schema::WorkflowId;
use crate::types::RecordSnapshot;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What clicking a form action does
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActionCommand {
    /// Open the dialog of a registered workflow
    OpenDialog(WorkflowId),

    /// Invoke a remote operation directly, then reconcile the given view
    Invoke {
        /// The operation to call
        operation: OperationRef,
        /// Parameters derived from the record
        params: ActionRequest,
        /// View to reconcile on a populated success
        refresh: RefreshTarget,
    },
}

/// One action a form offers for a record in its current state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormAction {
    /// Button label
    pub label: String,

    /// Optional button group ("Status", "Create", "Get Items From")
    pub group: Option<String>,

    /// What the action does
    pub command: ActionCommand,
}

impl FormAction {
    /// Create an ungrouped action
    pub fn new(label: impl Into<String>, command: ActionCommand) -> Self {
        Self {
            label: label.into(),
            group: None,
            command,
        }
    }

    /// Place the action under a button group
    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }
}

/// Derives the actions a form offers for a record
pub trait FormController: Send + Sync {
    /// Name of the controller, used in logs
    fn controller_type(&self) -> &str;

    /// The actions to offer for the record in its current state
    fn actions(&self, record: &RecordSnapshot) -> Vec<FormAction>;
}

/// Composition of a base controller and an extension
///
/// The base contributes its actions first, the extension appends its own.
/// Layers nest: a `LayeredController` can itself be the base of another.
pub struct LayeredController {
    base: Arc<dyn FormController>,
    extension: Arc<dyn FormController>,
}

impl LayeredController {
    /// Layer an extension over a base controller
    pub fn new(base: Arc<dyn FormController>, extension: Arc<dyn FormController>) -> Self {
        Self { base, extension }
    }
}

impl FormController for LayeredController {
    fn controller_type(&self) -> &str {
        self.extension.controller_type()
    }

    fn actions(&self, record: &RecordSnapshot) -> Vec<FormAction> {
        let mut actions = self.base.actions(record);
        actions.extend(self.extension.actions(record));
        actions
    }
}
