use thiserror::Error;

/// Core error type for the formwork engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    /// Schema definition error
    #[error("Schema error: {0}")]
    SchemaError(String),

    /// Workflow definition not found
    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    /// Dialog instance not found
    #[error("Dialog not found: {0}")]
    DialogNotFound(String),

    /// Field not declared by the schema
    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// Value does not fit the declared field type
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Operation attempted in the wrong dialog state
    #[error("Invalid dialog state: {0}")]
    InvalidState(String),

    /// A remote call is already pending for this dialog
    #[error("Submit already in flight: {0}")]
    SubmitInFlight(String),

    /// Workflow has no remote operation bound
    #[error("No remote operation bound: {0}")]
    OperationNotBound(String),

    /// Remote invocation error
    #[error("Remote invocation error: {0}")]
    RemoteError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Settings lookup error
    #[error("Settings error: {0}")]
    SettingsError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for WorkflowError {
    fn from(err: serde_json::Error) -> Self {
        WorkflowError::SerializationError(err.to_string())
    }
}

impl From<String> for WorkflowError {
    fn from(err: String) -> Self {
        WorkflowError::Other(err)
    }
}

impl From<&str> for WorkflowError {
    fn from(err: &str) -> Self {
        WorkflowError::Other(err.to_string())
    }
}
