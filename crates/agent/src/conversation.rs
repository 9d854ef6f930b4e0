//! Conversation State: model context plus the displayed transcript.
//!
//! `messages` is what the model sees on every call; `entries` is what the
//! user sees and what gets persisted. The round loop is the only writer
//! while a turn runs.

use std::collections::HashSet;

use cl_domain::chat::ChatEntry;
use cl_domain::tool::{Message, Role, ToolErrorKind, ToolResult};

use crate::tokens;

#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    entries: Vec<ChatEntry>,
}

impl Conversation {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(system_prompt)],
            entries: Vec::new(),
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Append an entry and return its position, for in-place completion.
    pub fn push_entry(&mut self, entry: ChatEntry) -> usize {
        self.entries.push(entry);
        self.entries.len() - 1
    }

    pub fn entry_mut(&mut self, index: usize) -> Option<&mut ChatEntry> {
        self.entries.get_mut(index)
    }

    /// Complete every in-flight tool-call entry with `result` and return
    /// the completed entries.
    pub fn complete_streaming_entries(&mut self, result: &ToolResult) -> Vec<ChatEntry> {
        self.entries
            .iter_mut()
            .filter(|e| e.is_streaming)
            .map(|e| {
                e.complete(result.clone());
                e.clone()
            })
            .collect()
    }

    /// Drop every system message and put `prompt` first.
    pub fn replace_system_prompt(&mut self, prompt: impl Into<String>) {
        self.messages.retain(|m| m.role != Role::System);
        self.messages.insert(0, Message::system(prompt));
    }

    /// Replace history (everything but the system prompt) wholesale.
    pub fn reset(&mut self, messages: Vec<Message>, entries: Vec<ChatEntry>) {
        self.messages.retain(|m| m.role == Role::System);
        self.messages.extend(messages);
        self.entries = entries;
    }

    pub fn clear(&mut self) {
        self.reset(Vec::new(), Vec::new());
    }

    pub fn estimate_tokens(&self) -> usize {
        tokens::estimate_tokens(&self.messages)
    }

    /// Give every unanswered tool call of the trailing assistant message a
    /// synthetic failure result, so the next model call is well-formed.
    /// Returns how many results were added.
    pub fn close_open_tool_calls(&mut self, kind: ToolErrorKind, reason: &str, include_name: bool) -> usize {
        let Some(pos) = self.messages.iter().rposition(|m| m.role != Role::Tool) else {
            return 0;
        };
        if !self.messages[pos].has_tool_calls() {
            return 0;
        }

        let answered: HashSet<&str> = self.messages[pos + 1..]
            .iter()
            .filter_map(|m| m.tool_call_id.as_deref())
            .collect();
        let missing: Vec<_> = self.messages[pos]
            .tool_calls
            .iter()
            .filter(|c| !answered.contains(c.id.as_str()))
            .cloned()
            .collect();

        let content = ToolResult::failure(kind, reason).content();
        for call in &missing {
            let mut msg = Message::tool_result(call.id.clone(), content.clone());
            if include_name {
                msg.name = Some(call.name.clone());
            }
            self.messages.push(msg);
        }
        missing.len()
    }
}
