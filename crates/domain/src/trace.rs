use serde::Serialize;

/// Structured trace events emitted across all codeloop crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    LlmRequest {
        provider: String,
        model: String,
        streaming: bool,
        round: usize,
        duration_ms: u64,
    },
    ToolDispatched {
        call_id: String,
        tool_name: String,
        success: bool,
        duration_ms: u64,
    },
    ToolNameRepaired {
        call_id: String,
        from: String,
        to: String,
    },
    RoundLimitReached {
        max_rounds: usize,
    },
    SummaryFallback {
        model: String,
        strategy: String,
    },
    HistoryRestored {
        entries: usize,
        messages: usize,
        dropped: usize,
    },
    ModelSwitched {
        provider: String,
        model: String,
    },
    TranscriptAppend {
        session_id: String,
        lines: usize,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "cl_event");
    }
}
