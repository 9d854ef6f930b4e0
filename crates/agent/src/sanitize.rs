//! Repairs untrusted model-produced tool calls before dispatch.
//!
//! Two passes:
//! - [`clean_tool_calls`] runs once per model response, before the
//!   assistant message is recorded: ids are bounded, names are repaired.
//! - [`parse_arguments`] runs at dispatch: trailing garbage after the
//!   first complete JSON value is cut off before parsing.

use cl_domain::tool::ToolCallRequest;
use cl_domain::trace::TraceEvent;
use cl_tools::ToolRegistry;
use serde_json::Value;

/// Longest tool-call id kept; some providers reject longer ones.
pub const MAX_TOOL_CALL_ID_LEN: usize = 40;

/// Bound ids, fill missing ones, and repair names against `registry`.
pub fn clean_tool_calls(calls: Vec<ToolCallRequest>, registry: &ToolRegistry) -> Vec<ToolCallRequest> {
    calls
        .into_iter()
        .map(|mut call| {
            call.id = bound_id(&call.id);
            if let Some(repaired) = repair_name(&call.name, registry) {
                tracing::warn!(
                    call_id = %call.id,
                    from = %call.name,
                    to = %repaired,
                    "repaired garbled tool name"
                );
                TraceEvent::ToolNameRepaired {
                    call_id: call.id.clone(),
                    from: call.name.clone(),
                    to: repaired.clone(),
                }
                .emit();
                call.name = repaired;
            }
            call
        })
        .collect()
}

/// A non-empty id of at most [`MAX_TOOL_CALL_ID_LEN`] chars. Empty ids get
/// a fresh `call_<uuid>`.
pub fn bound_id(id: &str) -> String {
    if id.is_empty() {
        return format!("call_{}", uuid::Uuid::new_v4().simple());
    }
    id.chars().take(MAX_TOOL_CALL_ID_LEN).collect()
}

/// The longest known tool name that `name` ends with, when `name` itself
/// is not known. Models sometimes emit a repeated or garbage prefix
/// (`bashbashview_file`).
///
/// Heuristic: a new tool whose name happens to end with a known tool's
/// name is rewritten too.
pub fn repair_name(name: &str, registry: &ToolRegistry) -> Option<String> {
    if name.is_empty() || registry.is_known_name(name) {
        return None;
    }
    registry
        .names()
        .into_iter()
        .filter(|known| name.len() > known.len() && name.ends_with(known))
        .max_by_key(|known| known.len())
        .map(str::to_owned)
}

/// Cut `raw` right after the first complete top-level JSON value.
///
/// Tracks string and escape state so brackets inside strings don't count.
/// Input whose depth never returns to zero is returned whole.
pub fn truncate_to_balanced(raw: &str) -> &str {
    let mut depth: usize = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in raw.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return &raw[..i + ch.len_utf8()];
                }
            }
            _ => {}
        }
    }
    raw
}

/// Parse raw tool arguments into a JSON object.
///
/// Empty or whitespace-only input means "no arguments" (`{}`).
pub fn parse_arguments(raw: &str) -> Result<Value, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    let candidate = truncate_to_balanced(trimmed);
    match serde_json::from_str::<Value>(candidate) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(other) => Err(format!("expected a JSON object, got {}", kind_of(&other))),
        Err(e) => Err(e.to_string()),
    }
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
