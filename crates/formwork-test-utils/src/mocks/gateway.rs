//! Scripted remote gateway for driving workflow tests.

use async_trait::async_trait;
use formwork_core::{
    ActionRequest, ActionResult, MessageSink, OperationRef, RemoteGateway, WorkflowError,
};
use mockall::mock;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::debug;

mock! {
    /// mockall mock of the remote invocation boundary, for tests that
    /// script expectations call by call
    pub RemoteGateway {}

    #[async_trait]
    impl RemoteGateway for RemoteGateway {
        async fn invoke(
            &self,
            operation: &OperationRef,
            request: ActionRequest,
        ) -> Result<ActionResult, WorkflowError>;
    }
}

#[derive(Clone)]
enum Behavior {
    Respond(ActionResult),
    Fail(String),
}

/// Handle releasing a gated [`StubGateway`]
///
/// While no permit has been released, every `invoke` stays pending; that
/// is how tests hold a dialog in its in-flight state.
pub struct GatewayGate {
    permits: Arc<Semaphore>,
}

impl GatewayGate {
    /// Let one pending invocation proceed
    pub fn release(&self) {
        self.permits.add_permits(1);
    }
}

/// Scripted gateway recording every invocation
///
/// Behaviors:
/// - `respond_with` / `respond_empty`: settle immediately with a fixed
///   envelope;
/// - `failing`: settle with a transport error, optionally surfacing a
///   generic message through a sink first, the way a real transport
///   raises its own error modal;
/// - `gated`: hold every invocation until the gate releases it.
pub struct StubGateway {
    behavior: Mutex<Behavior>,
    invocations: Mutex<Vec<(OperationRef, ActionRequest)>>,
    gate: Option<Arc<Semaphore>>,
    error_sink: Option<Arc<dyn MessageSink>>,
}

impl StubGateway {
    /// Answer every call with the given envelope
    pub fn respond_with(result: ActionResult) -> Self {
        Self {
            behavior: Mutex::new(Behavior::Respond(result)),
            invocations: Mutex::new(Vec::new()),
            gate: None,
            error_sink: None,
        }
    }

    /// Answer every call with an empty envelope
    pub fn respond_empty() -> Self {
        Self::respond_with(ActionResult::empty())
    }

    /// Fail every call with a transport error
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            behavior: Mutex::new(Behavior::Fail(message.into())),
            invocations: Mutex::new(Vec::new()),
            gate: None,
            error_sink: None,
        }
    }

    /// Surface transport failures through the given sink before erroring
    pub fn with_error_sink(mut self, sink: Arc<dyn MessageSink>) -> Self {
        self.error_sink = Some(sink);
        self
    }

    /// Hold every invocation until the returned gate releases it
    pub fn gated(mut self) -> (Self, GatewayGate) {
        let permits = Arc::new(Semaphore::new(0));
        self.gate = Some(Arc::clone(&permits));
        (self, GatewayGate { permits })
    }

    /// Everything invoked so far, in call order
    pub fn invocations(&self) -> Vec<(OperationRef, ActionRequest)> {
        self.invocations.lock().clone()
    }

    /// Number of invocations so far
    pub fn invocation_count(&self) -> usize {
        self.invocations.lock().len()
    }
}

#[async_trait]
impl RemoteGateway for StubGateway {
    async fn invoke(
        &self,
        operation: &OperationRef,
        request: ActionRequest,
    ) -> Result<ActionResult, WorkflowError> {
        debug!("StubGateway invoked: {}", operation.0);
        {
            let mut invocations = self.invocations.lock();
            invocations.push((operation.clone(), request));
        }

        if let Some(gate) = &self.gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|_| WorkflowError::RemoteError("gateway gate closed".to_string()))?;
            permit.forget();
        }

        let behavior = self.behavior.lock().clone();
        match behavior {
            Behavior::Respond(result) => Ok(result),
            Behavior::Fail(message) => {
                if let Some(sink) = &self.error_sink {
                    let _ = sink.show(&format!("Server error: {}", message)).await;
                }
                Err(WorkflowError::RemoteError(message))
            }
        }
    }
}
