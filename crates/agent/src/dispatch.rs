//! Routes one sanitized tool call to its capability.
//!
//! Always yields exactly one [`ToolResult`] and the matching tool message.
//! Capability errors, panics, and denied confirmations become failure
//! results here and never reach the round loop.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use cl_domain::error::Result;
use cl_domain::tool::{Message, ToolCallRequest, ToolErrorKind, ToolResult};
use cl_domain::trace::TraceEvent;
use cl_tools::{ToolError, ToolRegistry};
use futures_util::FutureExt;
use tracing::Instrument;

use crate::confirm::{ConfirmRequest, ConfirmationGate};
use crate::sanitize;

/// Stage of a dispatch reported to an [`ExecutionMonitor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceStage {
    Start,
    Observation,
    Decision,
}

/// Optional observer of tool execution.
///
/// `emit_trace` is called inline and must not block. Errors are logged
/// and otherwise ignored.
pub trait ExecutionMonitor: Send + Sync {
    fn emit_trace(&self, stage: TraceStage, message: &str) -> Result<()>;
}

pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    monitor: Option<Arc<dyn ExecutionMonitor>>,
    confirmation: Option<ConfirmationGate>,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            monitor: None,
            confirmation: None,
        }
    }

    pub fn with_monitor(mut self, monitor: Arc<dyn ExecutionMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Ask `gate` before mutating tools run.
    pub fn with_confirmation(mut self, gate: ConfirmationGate) -> Self {
        self.confirmation = Some(gate);
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Run `call` and build its tool-result message. `include_name` adds
    /// the tool name for providers that require it.
    pub async fn dispatch(&self, call: &ToolCallRequest, include_name: bool) -> (ToolResult, Message) {
        let span = tracing::info_span!("tool.call", tool = %call.name, call_id = %call.id);
        let result = self.execute(call).instrument(span).await;

        let mut message = Message::tool_result(call.id.clone(), result.content());
        if include_name {
            message.name = Some(call.name.clone());
        }
        (result, message)
    }

    async fn execute(&self, call: &ToolCallRequest) -> ToolResult {
        let started = Instant::now();
        self.trace(TraceStage::Start, &format!("{} {}", call.name, call.arguments));

        let result = self.invoke(call).await;

        let summary = if result.success { "succeeded" } else { "failed" };
        self.trace(
            TraceStage::Observation,
            &format!("{} {summary}: {}", call.name, preview(&result.content(), 200)),
        );
        let decision = match result.error_kind {
            None => "continue",
            Some(ToolErrorKind::UnknownTool | ToolErrorKind::InvalidArguments) => "report to model for correction",
            Some(ToolErrorKind::Denied) => "report denial to model",
            Some(_) => "report failure to model",
        };
        self.trace(TraceStage::Decision, decision);

        let duration_ms = started.elapsed().as_millis() as u64;
        tracing::debug!(success = result.success, duration_ms, "tool finished");
        TraceEvent::ToolDispatched {
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            success: result.success,
            duration_ms,
        }
        .emit();
        result
    }

    async fn invoke(&self, call: &ToolCallRequest) -> ToolResult {
        let args = match sanitize::parse_arguments(&call.arguments) {
            Ok(args) => args,
            Err(e) => {
                return ToolResult::failure(
                    ToolErrorKind::InvalidArguments,
                    format!("Invalid arguments for {}: {e}", call.name),
                )
            }
        };

        let Some(capability) = self.registry.get(&call.name) else {
            return ToolResult::failure(ToolErrorKind::UnknownTool, format!("Unknown tool: {}", call.name));
        };

        if let Some(gate) = &self.confirmation {
            if let Some(request) = ConfirmRequest::for_call(&call.name, &args) {
                if let Err(reason) = gate.check(&request).await {
                    return ToolResult::failure(ToolErrorKind::Denied, reason);
                }
            }
        }

        match AssertUnwindSafe(capability.invoke(args)).catch_unwind().await {
            Ok(Ok(result)) => result,
            Ok(Err(ToolError::InvalidArguments(msg))) => ToolResult::failure(
                ToolErrorKind::InvalidArguments,
                format!("Invalid arguments for {}: {msg}", call.name),
            ),
            Ok(Err(e)) => ToolResult::failure(
                ToolErrorKind::ExecutionFailed,
                format!("Tool execution error: {e}"),
            ),
            Err(payload) => {
                let msg = panic_message(payload.as_ref());
                tracing::warn!(tool = %call.name, panic = %msg, "tool panicked");
                ToolResult::failure(ToolErrorKind::ExecutionFailed, format!("Tool panicked: {msg}"))
            }
        }
    }

    fn trace(&self, stage: TraceStage, message: &str) {
        if let Some(monitor) = &self.monitor {
            if let Err(e) = monitor.emit_trace(stage, message) {
                tracing::warn!(error = %e, ?stage, "execution monitor rejected trace");
            }
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_owned();
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    cut.push('…');
    cut
}
