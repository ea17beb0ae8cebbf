use crate::domain::action::{ActionRequest, ActionResult, OperationRef, RefreshTarget};
use crate::domain::boundary::{MessageSink, RemoteGateway, ViewHost};
use crate::domain::dialog::{DialogId, DialogInstance, DialogStatus, FieldError};
use crate::domain::schema::{WorkflowDefinition, WorkflowId};
use crate::types::FieldValue;
use crate::WorkflowError;
use dashmap::DashMap;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Synchronous outcome of a submit
#[derive(Debug)]
pub enum SubmitOutcome {
    /// Required fields are missing; the dialog stays open and no remote
    /// call was made. The errors are also flagged on the instance.
    ValidationFailed {
        /// The failing fields
        field_errors: Vec<FieldError>,
    },

    /// Exactly one remote call was dispatched and the dialog is hidden.
    /// The task settles the call; dropping the handle is fine, the task
    /// keeps running.
    Dispatched {
        /// Handle of the spawned settle task
        task: JoinHandle<()>,
    },
}

/// Service running dialog workflows against the application boundaries
///
/// Workflows are registered once at construction and immutable afterwards.
/// Each open dialog is single-owner: all mutation goes through this
/// service, and nothing holds a map guard across an await point.
pub struct DialogService {
    /// Registered workflows by id
    workflows: HashMap<String, WorkflowDefinition>,

    /// Remote invocation boundary
    gateway: Arc<dyn RemoteGateway>,

    /// View refresh boundary
    views: Arc<dyn ViewHost>,

    /// User-facing messaging boundary
    messages: Arc<dyn MessageSink>,

    /// Open dialog instances by id
    dialogs: Arc<DashMap<String, DialogInstance>>,
}

impl DialogService {
    /// Create a service over a fixed set of workflow definitions
    ///
    /// Every definition is validated here, so schema mistakes fail at
    /// startup rather than when a user opens the dialog.
    pub fn new(
        workflows: Vec<WorkflowDefinition>,
        gateway: Arc<dyn RemoteGateway>,
        views: Arc<dyn ViewHost>,
        messages: Arc<dyn MessageSink>,
    ) -> Result<Self, WorkflowError> {
        let mut registered = HashMap::with_capacity(workflows.len());
        for workflow in workflows {
            workflow.validate()?;
            if registered
                .insert(workflow.id.0.clone(), workflow)
                .is_some()
            {
                return Err(WorkflowError::SchemaError(
                    "Duplicate workflow id".to_string(),
                ));
            }
        }

        Ok(Self {
            workflows: registered,
            gateway,
            views,
            messages,
            dialogs: Arc::new(DashMap::new()),
        })
    }

    /// Look up a registered workflow
    pub fn workflow(&self, id: &WorkflowId) -> Option<&WorkflowDefinition> {
        self.workflows.get(&id.0)
    }

    /// Open a dialog for a registered workflow
    ///
    /// Caller-supplied defaults override schema defaults; both are
    /// resolved once, here.
    pub fn open(
        &self,
        workflow_id: &WorkflowId,
        defaults: &BTreeMap<String, FieldValue>,
    ) -> Result<DialogId, WorkflowError> {
        let workflow = self
            .workflows
            .get(&workflow_id.0)
            .ok_or_else(|| WorkflowError::WorkflowNotFound(workflow_id.0.clone()))?;

        let instance = DialogInstance::open(workflow.id.clone(), &workflow.schema, defaults)?;
        let dialog_id = instance.id.clone();
        debug!(
            "Opened dialog {} for workflow {}",
            dialog_id.0, workflow_id.0
        );
        self.dialogs.insert(dialog_id.0.clone(), instance);
        Ok(dialog_id)
    }

    /// Snapshot the current state of a dialog
    pub fn dialog(&self, id: &DialogId) -> Option<DialogInstance> {
        self.dialogs.get(&id.0).map(|entry| entry.clone())
    }

    /// Set a field value on an open dialog
    pub fn set_value(
        &self,
        id: &DialogId,
        field: &str,
        value: FieldValue,
    ) -> Result<(), WorkflowError> {
        let mut entry = self
            .dialogs
            .get_mut(&id.0)
            .ok_or_else(|| WorkflowError::DialogNotFound(id.0.clone()))?;
        entry.set_value(field, value)
    }

    /// Dismiss an open dialog without submitting
    pub fn dismiss(&self, id: &DialogId) -> Result<(), WorkflowError> {
        let mut entry = self
            .dialogs
            .get_mut(&id.0)
            .ok_or_else(|| WorkflowError::DialogNotFound(id.0.clone()))?;
        entry.dismiss()
    }

    /// Submit a dialog
    ///
    /// The synchronous part validates and dispatches; the returned task
    /// settles the remote call. In order:
    /// - fails fast if the workflow has no operation bound (no call made);
    /// - rejects a second submit while one is in flight;
    /// - on missing required fields, flags them and returns
    ///   `ValidationFailed` with the dialog still open and zero calls made;
    /// - otherwise hides the dialog, issues exactly one invocation and
    ///   returns `Dispatched`.
    pub fn submit(&self, id: &DialogId) -> Result<SubmitOutcome, WorkflowError> {
        let mut entry = self
            .dialogs
            .get_mut(&id.0)
            .ok_or_else(|| WorkflowError::DialogNotFound(id.0.clone()))?;

        let workflow = self
            .workflows
            .get(&entry.workflow_id.0)
            .ok_or_else(|| WorkflowError::WorkflowNotFound(entry.workflow_id.0.clone()))?;

        let operation = match &workflow.operation {
            Some(operation) if !operation.0.is_empty() => operation.clone(),
            _ => return Err(WorkflowError::OperationNotBound(workflow.id.0.clone())),
        };

        match entry.status {
            DialogStatus::Open => {}
            DialogStatus::AwaitingResponse => {
                return Err(WorkflowError::SubmitInFlight(id.0.clone()))
            }
            other => {
                return Err(WorkflowError::InvalidState(format!(
                    "Cannot submit dialog in state: {:?}",
                    other
                )))
            }
        }

        let field_errors = entry.validate_required();
        if !field_errors.is_empty() {
            debug!(
                "Dialog {} failed validation on {} field(s)",
                id.0,
                field_errors.len()
            );
            return Ok(SubmitOutcome::ValidationFailed { field_errors });
        }

        let request = entry.collect_request();
        entry.begin_submit()?;
        drop(entry);

        debug!("Dialog {} dispatched to operation {}", id.0, operation.0);
        let task = self.spawn_settle(
            Some(id.clone()),
            operation,
            request,
            workflow.refresh.clone(),
        );
        Ok(SubmitOutcome::Dispatched { task })
    }

    /// Run a dialog-less action: one remote call, then reconciliation
    ///
    /// Covers the direct button actions that skip input collection, such
    /// as a status change followed by a record reload.
    pub fn invoke_now(
        &self,
        operation: OperationRef,
        request: ActionRequest,
        refresh: RefreshTarget,
    ) -> Result<JoinHandle<()>, WorkflowError> {
        if operation.0.is_empty() {
            return Err(WorkflowError::OperationNotBound(
                "direct invocation".to_string(),
            ));
        }
        Ok(self.spawn_settle(None, operation, request, refresh))
    }

    /// Spawn the settle task for one dispatched invocation
    fn spawn_settle(
        &self,
        dialog_id: Option<DialogId>,
        operation: OperationRef,
        request: ActionRequest,
        refresh: RefreshTarget,
    ) -> JoinHandle<()> {
        let gateway = Arc::clone(&self.gateway);
        let views = Arc::clone(&self.views);
        let messages = Arc::clone(&self.messages);
        let dialogs = Arc::clone(&self.dialogs);

        tokio::spawn(async move {
            let outcome = gateway.invoke(&operation, request).await;
            Self::reconcile(&views, &messages, &operation, &refresh, &outcome).await;

            if let Some(id) = dialog_id {
                if let Some(mut entry) = dialogs.get_mut(&id.0) {
                    let transition = match &outcome {
                        Ok(_) => entry.complete(),
                        Err(error) => entry.fail(error.to_string()),
                    };
                    if let Err(error) = transition {
                        warn!("Dialog {} could not settle: {}", id.0, error);
                    }
                }
            }
        })
    }

    /// Single resolution point for every remote call
    ///
    /// A populated success reconciles the declared view and shows the
    /// payload message; an empty success does nothing; a failure does
    /// nothing beyond a log line, since the transport owns its own error
    /// surfacing and no local state was touched before the call.
    async fn reconcile(
        views: &Arc<dyn ViewHost>,
        messages: &Arc<dyn MessageSink>,
        operation: &OperationRef,
        refresh: &RefreshTarget,
        outcome: &Result<ActionResult, WorkflowError>,
    ) {
        match outcome {
            Ok(result) if result.is_empty() => {
                debug!("Operation {} returned no payload, skipping refresh", operation.0);
            }
            Ok(result) => {
                match refresh {
                    RefreshTarget::None => {}
                    RefreshTarget::List(record_type) => {
                        if views.has_list(record_type).await {
                            if let Err(error) = views.reload_list(record_type).await {
                                warn!("List reload failed for {}: {}", record_type.0, error);
                            }
                        } else {
                            debug!("List view for {} is gone, skipping reload", record_type.0);
                        }
                    }
                    RefreshTarget::Record(record_type, name) => {
                        if views.has_record(record_type, name).await {
                            if let Err(error) = views.reload_record(record_type, name).await {
                                warn!("Record reload failed for {}: {}", name.0, error);
                            }
                        } else {
                            debug!("Record view for {} is gone, skipping reload", name.0);
                        }
                    }
                }

                if let Some(message) = &result.message {
                    if let Err(error) = messages.show(message).await {
                        warn!("Could not display message: {}", error);
                    }
                }
            }
            Err(error) => {
                warn!("Operation {} failed, no refresh: {}", operation.0, error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::boundary::memory::{MemoryMessageSink, MemoryViewHost};
    use crate::domain::schema::{DialogSchema, FieldDefinition};
    use async_trait::async_trait;

    struct NullGateway;

    #[async_trait]
    impl RemoteGateway for NullGateway {
        async fn invoke(
            &self,
            _operation: &OperationRef,
            _request: ActionRequest,
        ) -> Result<ActionResult, WorkflowError> {
            Ok(ActionResult::empty())
        }
    }

    fn workflow(id: &str) -> WorkflowDefinition {
        WorkflowDefinition {
            id: WorkflowId::new(id),
            schema: DialogSchema::new(
                "Reason for Hold",
                vec![FieldDefinition::text("reason_for_hold").required()],
            ),
            operation: Some(OperationRef::new("desk.add_comment")),
            refresh: RefreshTarget::None,
        }
    }

    fn service(workflows: Vec<WorkflowDefinition>) -> Result<DialogService, WorkflowError> {
        DialogService::new(
            workflows,
            Arc::new(NullGateway),
            Arc::new(MemoryViewHost::new()),
            Arc::new(MemoryMessageSink::new()),
        )
    }

    #[tokio::test]
    async fn test_new_rejects_duplicate_workflow_ids() {
        let result = service(vec![workflow("hold"), workflow("hold")]);
        assert!(matches!(result, Err(WorkflowError::SchemaError(_))));
    }

    #[tokio::test]
    async fn test_new_rejects_invalid_schema() {
        let mut bad = workflow("hold");
        bad.schema.fields.clear();
        assert!(matches!(
            service(vec![bad]),
            Err(WorkflowError::SchemaError(_))
        ));
    }

    #[tokio::test]
    async fn test_open_unknown_workflow() {
        let service = service(vec![workflow("hold")]).unwrap();
        let result = service.open(&WorkflowId::new("missing"), &BTreeMap::new());
        assert_eq!(
            result.unwrap_err(),
            WorkflowError::WorkflowNotFound("missing".to_string())
        );
    }

    #[tokio::test]
    async fn test_operations_on_unknown_dialog() {
        let service = service(vec![workflow("hold")]).unwrap();
        let ghost = DialogId("ghost".to_string());

        assert!(matches!(
            service.set_value(&ghost, "reason_for_hold", FieldValue::from("x")),
            Err(WorkflowError::DialogNotFound(_))
        ));
        assert!(matches!(
            service.submit(&ghost),
            Err(WorkflowError::DialogNotFound(_))
        ));
        assert!(matches!(
            service.dismiss(&ghost),
            Err(WorkflowError::DialogNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_invoke_now_requires_operation_name() {
        let service = service(vec![workflow("hold")]).unwrap();
        let result = service.invoke_now(
            OperationRef::new(""),
            ActionRequest::new(),
            RefreshTarget::None,
        );
        assert!(matches!(result, Err(WorkflowError::OperationNotBound(_))));
    }
}
