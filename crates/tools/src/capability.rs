//! The capability contract every tool implements.

use cl_domain::tool::{ToolDefinition, ToolResult};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Faults a capability may raise. The dispatcher turns these into
/// failed [`ToolResult`]s; they never abort a turn.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Failed(String),
}

/// A local capability invocable by name with JSON object arguments.
#[async_trait::async_trait]
pub trait Capability: Send + Sync {
    /// The name the model uses to call this tool.
    fn name(&self) -> &str;

    /// JSON-schema definition sent with every model request.
    fn definition(&self) -> ToolDefinition;

    /// Run the tool. Expected failures (missing file, non-zero exit) are
    /// `Ok(ToolResult::failure(..))`; `Err` is reserved for faults.
    async fn invoke(&self, args: Value) -> Result<ToolResult, ToolError>;
}

/// Deserialize a tool's argument object into its request type.
pub fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

/// Cut `text` to at most `max_chars` characters, noting how much was dropped.
pub(crate) fn truncate_output(text: String, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text;
    }
    let mut kept: String = text.chars().take(max_chars).collect();
    kept.push_str(&format!("\n... [truncated {} chars]", total - max_chars));
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, serde::Deserialize)]
    struct Req {
        path: String,
    }

    #[test]
    fn parse_args_reports_missing_fields() {
        let ok: Req = parse_args(serde_json::json!({"path": "a.txt"})).unwrap();
        assert_eq!(ok.path, "a.txt");

        let err = parse_args::<Req>(serde_json::json!({})).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(ref m) if m.contains("path")));
    }

    #[test]
    fn truncation_counts_dropped_chars() {
        assert_eq!(truncate_output("short".into(), 10), "short");
        let cut = truncate_output("abcdefghij".into(), 4);
        assert_eq!(cut, "abcd\n... [truncated 6 chars]");
    }
}
