use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use execai_core::{ActionPlan, ActionType, Entities, ExecutionResult, TraceRecorder, TraceStage};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerFailure {
    #[error("no open slot between {start} and {end}")]
    NoAvailability { start: String, end: String },
    #[error("invalid parameter {key}: {detail}")]
    InvalidParameter { key: &'static str, detail: String },
    /// The request was understood but cannot be honoured as asked.
    #[error("{0}")]
    Rejected(String),
}

/// A mock workflow bound to one action type.
pub trait ActionHandler: Send + Sync {
    fn name(&self) -> &'static str;

    fn handle(&self, parameters: &Entities) -> Result<Value, HandlerFailure>;
}

/// Registry from action type to handler. Whatever a handler does, `dispatch`
/// returns an [`ExecutionResult`].
#[derive(Clone, Default)]
pub struct ActionDispatcher {
    handlers: HashMap<ActionType, Arc<dyn ActionHandler>>,
}

impl fmt::Debug for ActionDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut registered = self
            .handlers
            .iter()
            .map(|(action, handler)| (action.as_str(), handler.name()))
            .collect::<Vec<_>>();
        registered.sort_unstable();
        f.debug_struct("ActionDispatcher")
            .field("handlers", &registered)
            .finish()
    }
}

impl ActionDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, action_type: ActionType, handler: Arc<dyn ActionHandler>) -> Self {
        self.handlers.insert(action_type, handler);
        self
    }

    pub fn is_registered(&self, action_type: ActionType) -> bool {
        self.handlers.contains_key(&action_type)
    }

    pub fn dispatch(&self, plan: &ActionPlan, trace: &mut TraceRecorder) -> ExecutionResult {
        let action_type = plan.action_type;
        let Some(handler) = self.handlers.get(&action_type) else {
            trace.record(
                TraceStage::Dispatcher,
                format!("no handler registered for {action_type}; nothing to execute"),
            );
            return ExecutionResult::success(action_type, Value::Object(Default::default()));
        };

        let outcome = catch_unwind(AssertUnwindSafe(|| handler.handle(&plan.parameters)));
        match outcome {
            Ok(Ok(payload)) => {
                info!(action = %action_type, handler = handler.name(), "action executed");
                trace.record(
                    TraceStage::Dispatcher,
                    format!("handler {} returned success", handler.name()),
                );
                ExecutionResult::success(action_type, payload)
            }
            Ok(Err(failure)) => {
                warn!(action = %action_type, handler = handler.name(), error = %failure, "action failed");
                trace.record(
                    TraceStage::Dispatcher,
                    format!("handler {} failed: {failure}", handler.name()),
                );
                failed(action_type, failure.to_string())
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                warn!(action = %action_type, handler = handler.name(), panic = %message, "action handler panicked");
                trace.record(
                    TraceStage::Dispatcher,
                    format!("handler {} panicked: {message}", handler.name()),
                );
                failed(action_type, format!("handler panicked: {message}"))
            }
        }
    }
}

fn failed(action_type: ActionType, error: String) -> ExecutionResult {
    ExecutionResult::failed(
        action_type,
        serde_json::json!({
            "error": error,
            "action_type": action_type,
        }),
    )
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
