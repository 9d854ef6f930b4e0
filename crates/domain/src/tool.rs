use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Canonical `type` tag for tool calls on the wire.
pub const TOOL_CALL_TYPE: &str = "function";

/// A tool invocation requested by the model.
///
/// Model-produced and untrusted: `arguments` is the raw JSON text exactly as
/// streamed, and is only parsed right before dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// OpenAI-style wire shape: `{id, type: "function", function: {name, arguments}}`.
    pub fn to_wire(&self) -> Value {
        serde_json::json!({
            "id": self.id,
            "type": TOOL_CALL_TYPE,
            "function": {
                "name": self.name,
                "arguments": self.arguments,
            }
        })
    }
}

/// Serialize a list of tool calls into the persisted wire array.
pub fn tool_calls_to_wire(calls: &[ToolCallRequest]) -> Value {
    Value::Array(calls.iter().map(ToolCallRequest::to_wire).collect())
}

/// Why a tool invocation did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    UnknownTool,
    InvalidArguments,
    ExecutionFailed,
    Cancelled,
    Interrupted,
    /// The user declined a confirmation prompt.
    Denied,
}

/// Outcome of one tool invocation. Exactly one per [`ToolCallRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ToolErrorKind>,
}

impl ToolResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: Some(output.into()),
            error: None,
            error_kind: None,
        }
    }

    pub fn failure(kind: ToolErrorKind, error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
            error_kind: Some(kind),
        }
    }

    /// Text fed back to the model as the tool message content.
    pub fn content(&self) -> String {
        if self.success {
            match self.output.as_deref() {
                Some(out) if !out.is_empty() => out.to_owned(),
                _ => "Success".into(),
            }
        } else {
            match self.error.as_deref() {
                Some(err) if !err.is_empty() => err.to_owned(),
                _ => "Error occurred".into(),
            }
        }
    }
}

/// Tool definition exposed to the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's parameters.
    pub parameters: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A message in the conversation (provider-agnostic).
///
/// Invariant maintained by the agent: a `Tool` message always follows an
/// `Assistant` message whose `tool_calls` contains `tool_call_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Tool name echoed on tool-result messages, for providers that need it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

// ── Convenience constructors ───────────────────────────────────────

impl Message {
    fn plain(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: text.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
            timestamp: Utc::now(),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::plain(Role::System, text)
    }
    pub fn user(text: impl Into<String>) -> Self {
        Self::plain(Role::User, text)
    }
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, text)
    }
    pub fn assistant_with_tools(text: impl Into<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            tool_calls,
            ..Self::plain(Role::Assistant, text)
        }
    }
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::plain(Role::Tool, content)
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        self.role == Role::Assistant && !self.tool_calls.is_empty()
    }
}
