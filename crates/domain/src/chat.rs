//! UI-facing conversation units and the chunk protocol of streamed turns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::tool::{tool_calls_to_wire, ToolCallRequest, ToolResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    User,
    Assistant,
    ToolCall,
    ToolResult,
}

/// One persisted/displayed conversation unit.
///
/// A `ToolCall` entry is completed in place into a `ToolResult` entry
/// (same `id`) once execution finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEntry {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(default)]
    pub content: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    /// Wire-shaped tool calls of an assistant turn. Kept as raw JSON since
    /// persisted data is revalidated on restore.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCallRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<ToolResult>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_streaming: bool,
}

impl ChatEntry {
    fn new(kind: EntryKind, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            content: content.into(),
            timestamp: Utc::now(),
            tool_calls: None,
            tool_call: None,
            tool_result: None,
            is_streaming: false,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(EntryKind::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(EntryKind::Assistant, content)
    }

    pub fn assistant_with_tools(content: impl Into<String>, calls: &[ToolCallRequest]) -> Self {
        let mut entry = Self::new(EntryKind::Assistant, content);
        if !calls.is_empty() {
            entry.tool_calls = Some(tool_calls_to_wire(calls));
        }
        entry
    }

    /// Placeholder shown while a tool runs.
    pub fn tool_call(call: &ToolCallRequest) -> Self {
        let mut entry = Self::new(EntryKind::ToolCall, "Executing...");
        entry.tool_call = Some(call.clone());
        entry.is_streaming = true;
        entry
    }

    /// Complete a `ToolCall` entry into a `ToolResult` entry, keeping its id.
    pub fn complete(&mut self, result: ToolResult) {
        self.kind = EntryKind::ToolResult;
        self.content = result.content();
        self.tool_result = Some(result);
        self.is_streaming = false;
        self.timestamp = Utc::now();
    }

    pub fn tool_result(call: &ToolCallRequest, result: ToolResult) -> Self {
        let mut entry = Self::tool_call(call);
        entry.complete(result);
        entry
    }
}

/// One event of a streamed turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamingChunk {
    /// Incremental assistant text.
    Content { content: String },
    /// Tool calls the model requested this round.
    ToolCalls { tool_calls: Vec<ToolCallRequest> },
    /// Outcome of one dispatched tool call.
    ToolResult {
        tool_call: ToolCallRequest,
        tool_result: ToolResult,
    },
    /// Estimated size of the conversation context.
    TokenCount { token_count: usize },
    /// The turn is over. Always the last chunk.
    Done,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_call_entry_completes_in_place() {
        let call = ToolCallRequest::new("c1", "bash", "{}");
        let mut entry = ChatEntry::tool_call(&call);
        let id = entry.id;
        assert_eq!(entry.kind, EntryKind::ToolCall);
        assert!(entry.is_streaming);

        entry.complete(ToolResult::ok("done"));
        assert_eq!(entry.id, id);
        assert_eq!(entry.kind, EntryKind::ToolResult);
        assert_eq!(entry.content, "done");
        assert!(!entry.is_streaming);
    }

    #[test]
    fn chunk_serializes_with_type_tag() {
        let json = serde_json::to_value(StreamingChunk::TokenCount { token_count: 12 }).unwrap();
        assert_eq!(json["type"], "token_count");
        assert_eq!(json["token_count"], 12);

        let done = serde_json::to_value(StreamingChunk::Done).unwrap();
        assert_eq!(done["type"], "done");
    }

    #[test]
    fn entry_parses_without_optional_fields() {
        let raw = r#"{"type":"assistant","content":"hi","timestamp":"2025-01-01T00:00:00Z"}"#;
        let entry: ChatEntry = serde_json::from_str(raw).unwrap();
        assert_eq!(entry.kind, EntryKind::Assistant);
        assert!(entry.tool_calls.is_none());
        assert!(!entry.is_streaming);
    }
}
