//! Rebuilds Conversation State from a persisted transcript.
//!
//! Persisted data is not trusted: assistant tool calls are re-parsed from
//! their wire JSON, and tool results are kept only when they answer a call
//! of the nearest preceding assistant message. Calls left without a result
//! get a synthetic `interrupted` failure.

use std::collections::HashSet;

use cl_domain::chat::{ChatEntry, EntryKind};
use cl_domain::tool::{Message, ToolCallRequest, ToolErrorKind, TOOL_CALL_TYPE};
use cl_domain::trace::TraceEvent;
use serde_json::Value;

use crate::conversation::Conversation;

pub(crate) const INTERRUPTED_REASON: &str = "Tool execution was interrupted before it finished";

/// Outcome of a restore.
#[derive(Debug, Default)]
pub struct Restored {
    /// Model context, without a system prompt.
    pub messages: Vec<Message>,
    /// Entries that survived validation, in order.
    pub entries: Vec<ChatEntry>,
    /// Entries rejected as corrupt or orphaned.
    pub dropped: usize,
}

/// Strictly parse a persisted tool-call array. Malformed elements are
/// skipped; anything that isn't an array yields no calls.
pub fn parse_wire_tool_calls(value: &Value) -> Vec<ToolCallRequest> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };
    items.iter().filter_map(parse_wire_tool_call).collect()
}

fn parse_wire_tool_call(item: &Value) -> Option<ToolCallRequest> {
    let id = item.get("id")?.as_str().filter(|s| !s.is_empty())?;
    if item.get("type")?.as_str()? != TOOL_CALL_TYPE {
        return None;
    }
    let function = item.get("function")?;
    let name = function.get("name")?.as_str().filter(|s| !s.is_empty())?;
    let arguments = function.get("arguments")?.as_str()?;
    Some(ToolCallRequest::new(id, name, arguments))
}

/// Map persisted entries back to messages. `include_tool_name` mirrors the
/// active provider's tool-result quirk.
pub fn restore(entries: &[ChatEntry], include_tool_name: bool) -> Restored {
    // The scratch conversation owns the pairing bookkeeping; its system
    // prompt is discarded at the end.
    let mut conv = Conversation::new(String::new());
    let mut kept = Vec::with_capacity(entries.len());
    let mut dropped = 0;
    let mut answered: HashSet<String> = HashSet::new();

    for entry in entries {
        match entry.kind {
            EntryKind::User => {
                conv.close_open_tool_calls(ToolErrorKind::Interrupted, INTERRUPTED_REASON, include_tool_name);
                conv.push_message(Message::user(entry.content.clone()));
                kept.push(entry.clone());
            }
            EntryKind::Assistant => {
                conv.close_open_tool_calls(ToolErrorKind::Interrupted, INTERRUPTED_REASON, include_tool_name);
                let calls = entry
                    .tool_calls
                    .as_ref()
                    .map(parse_wire_tool_calls)
                    .unwrap_or_default();
                answered.clear();
                conv.push_message(Message::assistant_with_tools(entry.content.clone(), calls));
                kept.push(entry.clone());
            }
            EntryKind::ToolResult => {
                if let Some(message) = accept_result(&conv, entry, &answered, include_tool_name) {
                    answered.insert(message.tool_call_id.clone().unwrap_or_default());
                    conv.push_message(message);
                    kept.push(entry.clone());
                } else {
                    tracing::warn!(
                        entry_id = %entry.id,
                        "dropping tool result without a matching assistant tool call"
                    );
                    dropped += 1;
                }
            }
            // In-flight placeholders are never persisted by a healthy run.
            EntryKind::ToolCall => {
                tracing::warn!(entry_id = %entry.id, "dropping unfinished tool call entry");
                dropped += 1;
            }
        }
    }
    conv.close_open_tool_calls(ToolErrorKind::Interrupted, INTERRUPTED_REASON, include_tool_name);

    let messages: Vec<Message> = conv.messages()[1..].to_vec();
    TraceEvent::HistoryRestored {
        entries: kept.len(),
        messages: messages.len(),
        dropped,
    }
    .emit();

    Restored {
        messages,
        entries: kept,
        dropped,
    }
}

fn accept_result(
    conv: &Conversation,
    entry: &ChatEntry,
    answered: &HashSet<String>,
    include_tool_name: bool,
) -> Option<Message> {
    let call = entry.tool_call.as_ref()?;
    let anchor = conv
        .messages()
        .iter()
        .rev()
        .find(|m| m.tool_call_id.is_none())?;
    if !anchor.has_tool_calls() || answered.contains(&call.id) {
        return None;
    }
    let requested = anchor.tool_calls.iter().find(|c| c.id == call.id)?;

    let content = entry
        .tool_result
        .as_ref()
        .map(|r| r.content())
        .unwrap_or_else(|| entry.content.clone());
    let mut message = Message::tool_result(call.id.clone(), content);
    if include_tool_name {
        message.name = Some(requested.name.clone());
    }
    Some(message)
}
