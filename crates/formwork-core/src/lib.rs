//!
//! Formwork Core - engine for dialog-driven remote-action workflows
//!
//! A dialog collects structured input against a declared field schema,
//! validates it, dispatches it to a named remote operation and reconciles
//! dependent views with the asynchronous result. The rendering layer, the
//! transport and the record store stay behind boundary traits; this crate
//! owns the workflow itself.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Domain layer - schemas, dialog instances, actions and boundaries
pub mod domain;

/// Application services - workflow service, registry, controllers
pub mod application;

/// Core value types
pub mod types;

/// Error types
pub mod error;

// Re-export key types
pub use error::WorkflowError;
pub use types::{FieldValue, RecordName, RecordSnapshot, RecordType};

// Re-export main API types for easy use
pub use domain::action::{ActionRequest, ActionResult, OperationRef, RefreshTarget};
pub use domain::boundary::{MessageSink, RemoteGateway, SettingsProvider, ViewHost};
pub use domain::dialog::{DialogId, DialogInstance, DialogStatus, FieldError, FieldState};
pub use domain::schema::{
    DialogSchema, FieldDefault, FieldDefinition, FieldType, VisibleWhen, WorkflowDefinition,
    WorkflowId,
};

// Application interfaces
pub use application::controller::{ActionCommand, FormAction, FormController, LayeredController};
pub use application::dialog_service::{DialogService, SubmitOutcome};
pub use application::registry::{FormEvent, FormEventHandler, HandlerRegistry, RegistryBuilder};
