use crate::types::{RecordSnapshot, RecordType};
use crate::WorkflowError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Form lifecycle events dispatched to registered handlers
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FormEvent {
    /// Form is being set up, before any data is shown
    Setup,

    /// Form loaded a record
    Onload,

    /// Form re-rendered
    Refresh,

    /// Record was saved
    AfterSave,

    /// A named field changed value
    FieldChange(String),
}

/// A handler bound to form lifecycle events of one record type
///
/// Handlers that only care about some events simply return `Ok(())` for
/// the rest.
#[async_trait]
pub trait FormEventHandler: Send + Sync {
    /// Name of the handler, used in logs
    fn handler_name(&self) -> &str;

    /// React to one lifecycle event
    async fn on_event(
        &self,
        event: &FormEvent,
        record: &RecordSnapshot,
    ) -> Result<(), WorkflowError>;
}

/// Explicit registry of form event handlers
///
/// Built once at process startup and passed by reference to whatever
/// renders forms. There is no way to register a handler after `build`,
/// so no call site can mutate dispatch behavior at a distance.
pub struct HandlerRegistry {
    handlers: HashMap<String, Vec<Arc<dyn FormEventHandler>>>,
}

impl HandlerRegistry {
    /// Start building a registry
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder {
            handlers: HashMap::new(),
        }
    }

    /// Handlers registered for a record type, in registration order
    pub fn handlers_for(&self, record_type: &RecordType) -> &[Arc<dyn FormEventHandler>] {
        self.handlers
            .get(&record_type.0)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of record types with at least one handler
    pub fn record_type_count(&self) -> usize {
        self.handlers.len()
    }

    /// Dispatch one event to every handler of the record's type
    ///
    /// Handlers run in registration order; the first error stops the
    /// chain and propagates.
    pub async fn dispatch(
        &self,
        event: &FormEvent,
        record: &RecordSnapshot,
    ) -> Result<(), WorkflowError> {
        for handler in self.handlers_for(&record.record_type) {
            debug!(
                "Dispatching {:?} on {} to {}",
                event,
                record.record_type.0,
                handler.handler_name()
            );
            handler.on_event(event, record).await?;
        }
        Ok(())
    }
}

/// Builder for [`HandlerRegistry`]
pub struct RegistryBuilder {
    handlers: HashMap<String, Vec<Arc<dyn FormEventHandler>>>,
}

impl RegistryBuilder {
    /// Register a handler for a record type
    pub fn on(mut self, record_type: RecordType, handler: Arc<dyn FormEventHandler>) -> Self {
        self.handlers
            .entry(record_type.0)
            .or_default()
            .push(handler);
        self
    }

    /// Finish building; the registry is immutable from here on
    pub fn build(self) -> HandlerRegistry {
        HandlerRegistry {
            handlers: self.handlers,
        }
    }
}
