//! Boundary traits for the formwork engine
//!
//! The engine never talks to a transport, a rendering layer or a settings
//! store directly. External crates implement these traits to plug the
//! engine into a concrete application shell.

use async_trait::async_trait;

use crate::domain::action::{ActionRequest, ActionResult, OperationRef};
use crate::types::{RecordName, RecordType};
use crate::WorkflowError;

/// Remote invocation boundary
///
/// Implementations own the transport and its failure surfacing: a
/// transport error comes back as `Err`, and whatever user-facing error
/// channel the transport has (an error modal, a toast) is the
/// implementation's business, not the engine's.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Invoke a named remote operation with a parameter mapping
    async fn invoke(
        &self,
        operation: &OperationRef,
        request: ActionRequest,
    ) -> Result<ActionResult, WorkflowError>;
}

/// View refresh boundary
///
/// Both reload operations are idempotent re-reads: they re-fetch current
/// state and re-render, they never apply deltas. The `has_*` checks let
/// the engine skip a refresh whose target view was discarded while a call
/// was in flight.
#[async_trait]
pub trait ViewHost: Send + Sync {
    /// Whether a list view for the record type is currently shown
    async fn has_list(&self, record_type: &RecordType) -> bool;

    /// Re-fetch and re-render the list view, preserving filters
    async fn reload_list(&self, record_type: &RecordType) -> Result<(), WorkflowError>;

    /// Whether the given record is currently shown
    async fn has_record(&self, record_type: &RecordType, name: &RecordName) -> bool;

    /// Re-fetch a single record's full state
    async fn reload_record(
        &self,
        record_type: &RecordType,
        name: &RecordName,
    ) -> Result<(), WorkflowError>;
}

/// User-facing messaging boundary
///
/// Non-blocking and dismissible; used for informational and error content
/// alike.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Display a message to the user
    async fn show(&self, message: &str) -> Result<(), WorkflowError>;
}

/// Configuration boundary
///
/// Event handlers consult server-held flags before opening dialogs, the
/// way the original forms gate optional behavior on single values.
#[async_trait]
pub trait SettingsProvider: Send + Sync {
    /// Read a boolean flag; absent keys read as `false`
    async fn flag(&self, key: &str) -> Result<bool, WorkflowError>;
}

/// Memory implementations for testing
#[cfg(feature = "testing")]
pub mod memory {
    use super::*;
    use dashmap::DashMap;
    use std::collections::HashMap;
    use std::sync::RwLock;

    /// Rendered state of one in-memory list view
    #[derive(Debug, Clone, Default)]
    struct ListViewState {
        /// What the backing store currently holds
        rows: Vec<RecordName>,
        /// What the view last rendered
        rendered: Vec<RecordName>,
        /// How many reloads have run
        reloads: u64,
    }

    /// In-memory view host
    ///
    /// Models the surrounding application's open views: a reload copies
    /// the backing rows into the rendered state, so reloading twice
    /// renders the same thing as reloading once.
    #[derive(Default)]
    pub struct MemoryViewHost {
        lists: DashMap<String, ListViewState>,
        record_reloads: DashMap<String, u64>,
    }

    impl MemoryViewHost {
        /// Create an empty view host with no open views
        pub fn new() -> Self {
            Self::default()
        }

        fn record_key(record_type: &RecordType, name: &RecordName) -> String {
            format!("{}/{}", record_type.0, name.0)
        }

        /// Open a list view over the given backing rows
        pub fn open_list(&self, record_type: &RecordType, rows: Vec<RecordName>) {
            self.lists.insert(
                record_type.0.clone(),
                ListViewState {
                    rendered: rows.clone(),
                    rows,
                    reloads: 0,
                },
            );
        }

        /// Replace the backing rows without re-rendering
        pub fn set_rows(&self, record_type: &RecordType, rows: Vec<RecordName>) {
            if let Some(mut list) = self.lists.get_mut(&record_type.0) {
                list.rows = rows;
            }
        }

        /// Discard the list view
        pub fn close_list(&self, record_type: &RecordType) {
            self.lists.remove(&record_type.0);
        }

        /// What the list view currently renders
        pub fn rendered_rows(&self, record_type: &RecordType) -> Option<Vec<RecordName>> {
            self.lists
                .get(&record_type.0)
                .map(|list| list.rendered.clone())
        }

        /// How many times the list view reloaded
        pub fn list_reloads(&self, record_type: &RecordType) -> u64 {
            self.lists
                .get(&record_type.0)
                .map(|list| list.reloads)
                .unwrap_or(0)
        }

        /// Open a record view
        pub fn open_record(&self, record_type: &RecordType, name: &RecordName) {
            self.record_reloads
                .insert(Self::record_key(record_type, name), 0);
        }

        /// Discard a record view
        pub fn close_record(&self, record_type: &RecordType, name: &RecordName) {
            self.record_reloads
                .remove(&Self::record_key(record_type, name));
        }

        /// How many times the record view reloaded
        pub fn record_reload_count(&self, record_type: &RecordType, name: &RecordName) -> u64 {
            self.record_reloads
                .get(&Self::record_key(record_type, name))
                .map(|count| *count)
                .unwrap_or(0)
        }
    }

    #[async_trait]
    impl ViewHost for MemoryViewHost {
        async fn has_list(&self, record_type: &RecordType) -> bool {
            self.lists.contains_key(&record_type.0)
        }

        async fn reload_list(&self, record_type: &RecordType) -> Result<(), WorkflowError> {
            let mut list = self.lists.get_mut(&record_type.0).ok_or_else(|| {
                WorkflowError::Other(format!("No open list view for: {}", record_type.0))
            })?;
            list.rendered = list.rows.clone();
            list.reloads += 1;
            Ok(())
        }

        async fn has_record(&self, record_type: &RecordType, name: &RecordName) -> bool {
            self.record_reloads
                .contains_key(&Self::record_key(record_type, name))
        }

        async fn reload_record(
            &self,
            record_type: &RecordType,
            name: &RecordName,
        ) -> Result<(), WorkflowError> {
            let key = Self::record_key(record_type, name);
            let mut count = self
                .record_reloads
                .get_mut(&key)
                .ok_or_else(|| WorkflowError::Other(format!("No open record view for: {}", key)))?;
            *count += 1;
            Ok(())
        }
    }

    /// In-memory message sink collecting everything shown to the user
    #[derive(Default)]
    pub struct MemoryMessageSink {
        messages: RwLock<Vec<String>>,
    }

    impl MemoryMessageSink {
        /// Create an empty sink
        pub fn new() -> Self {
            Self::default()
        }

        /// All messages shown so far, in order
        pub fn messages(&self) -> Vec<String> {
            self.messages
                .read()
                .map(|messages| messages.clone())
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl MessageSink for MemoryMessageSink {
        async fn show(&self, message: &str) -> Result<(), WorkflowError> {
            let mut messages = self.messages.write().map_err(|e| {
                WorkflowError::Other(format!("Failed to acquire write lock: {}", e))
            })?;
            messages.push(message.to_string());
            Ok(())
        }
    }

    /// In-memory settings provider
    #[derive(Default)]
    pub struct MemorySettings {
        flags: RwLock<HashMap<String, bool>>,
    }

    impl MemorySettings {
        /// Create a provider with no flags set
        pub fn new() -> Self {
            Self::default()
        }

        /// Set a flag
        pub fn set_flag(&self, key: &str, value: bool) {
            if let Ok(mut flags) = self.flags.write() {
                flags.insert(key.to_string(), value);
            }
        }
    }

    #[async_trait]
    impl SettingsProvider for MemorySettings {
        async fn flag(&self, key: &str) -> Result<bool, WorkflowError> {
            let flags = self.flags.read().map_err(|e| {
                WorkflowError::SettingsError(format!("Failed to acquire read lock: {}", e))
            })?;
            Ok(flags.get(key).copied().unwrap_or(false))
        }
    }

}
