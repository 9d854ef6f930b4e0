//! Folds streamed deltas into one accumulated response.
//!
//! Merge rules, applied per field and recursively:
//! - absent key: take the delta value (list elements lose their `index`)
//! - string + string: concatenate
//! - list + list: merge element-wise, addressed by `index` when present
//! - object + object: recurse
//!
//! An `index` more than [`MAX_INDEX_GAP`] past the end of the list is
//! model garbage; that element is dropped.
//!
//! Folding is associative over the delta sequence, so any re-chunking of
//! the same ordered stream yields the same result.

use cl_domain::stream::Delta;
use cl_domain::tool::ToolCallRequest;
use serde_json::{Map, Value};

const INDEX_KEY: &str = "index";

/// How far past the current end an indexed list element may land.
pub const MAX_INDEX_GAP: usize = 256;

/// Everything one streaming model call has produced so far.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccumulatedResponse {
    fields: Map<String, Value>,
}

impl AccumulatedResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one delta in place.
    pub fn apply(&mut self, delta: &Delta) {
        merge_object(&mut self.fields, delta.fields());
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Accumulated assistant text.
    pub fn content(&self) -> &str {
        self.fields
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Tool calls in positional order, as raw (unsanitized) requests.
    /// Missing pieces come back as empty strings.
    pub fn tool_calls(&self) -> Vec<ToolCallRequest> {
        let Some(Value::Array(calls)) = self.fields.get("tool_calls") else {
            return Vec::new();
        };
        calls
            .iter()
            .filter(|c| c.is_object())
            .map(|c| {
                let text = |v: Option<&Value>| v.and_then(Value::as_str).unwrap_or_default().to_owned();
                let function = c.get("function");
                ToolCallRequest {
                    id: text(c.get("id")),
                    name: text(function.and_then(|f| f.get("name"))),
                    arguments: text(function.and_then(|f| f.get("arguments"))),
                }
            })
            .collect()
    }

    /// Whether at least one tool call already has a name.
    pub fn has_named_tool_call(&self) -> bool {
        self.tool_calls().iter().any(|c| !c.name.is_empty())
    }
}

/// Fold a whole delta sequence from scratch.
pub fn reduce<'a>(deltas: impl IntoIterator<Item = &'a Delta>) -> AccumulatedResponse {
    let mut acc = AccumulatedResponse::new();
    for delta in deltas {
        acc.apply(delta);
    }
    acc
}

fn merge_object(prev: &mut Map<String, Value>, delta: &Map<String, Value>) {
    for (key, value) in delta {
        match prev.get_mut(key) {
            Some(existing) => merge_value(existing, value),
            None => {
                prev.insert(key.clone(), fresh(value));
            }
        }
    }
}

fn merge_value(prev: &mut Value, delta: &Value) {
    match (prev, delta) {
        // Providers send `null` for fields they have nothing new for.
        (_, Value::Null) => {}
        (Value::String(a), Value::String(b)) => a.push_str(b),
        (Value::Array(a), Value::Array(b)) => merge_list(a, b),
        (Value::Object(a), Value::Object(b)) => merge_object(a, b),
        (slot, value) => *slot = fresh(value),
    }
}

fn merge_list(prev: &mut Vec<Value>, delta: &[Value]) {
    for (position, element) in delta.iter().enumerate() {
        let target = match element.get(INDEX_KEY).and_then(Value::as_u64) {
            None => position,
            Some(i) => match usize::try_from(i) {
                Ok(i) if i <= prev.len() + MAX_INDEX_GAP => i,
                _ => {
                    tracing::warn!(index = i, len = prev.len(), "dropping list element with out-of-range index");
                    continue;
                }
            },
        };
        let element = strip_index(element);

        if target < prev.len() {
            merge_value(&mut prev[target], &element);
        } else {
            prev.resize(target, Value::Null);
            prev.push(fresh(&element));
        }
    }
}

/// A new value built from `value` as if merged into nothing, so list
/// elements land at their `index` and lose the marker.
fn fresh(value: &Value) -> Value {
    match value {
        Value::Array(items) => {
            let mut list = Vec::new();
            merge_list(&mut list, items);
            Value::Array(list)
        }
        Value::Object(map) => Value::Object(map.iter().map(|(k, v)| (k.clone(), fresh(v))).collect()),
        other => other.clone(),
    }
}

fn strip_index(element: &Value) -> Value {
    match element {
        Value::Object(map) if map.contains_key(INDEX_KEY) => {
            let mut map = map.clone();
            map.remove(INDEX_KEY);
            Value::Object(map)
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn delta(v: Value) -> Delta {
        Delta::from_value(v).unwrap()
    }

    fn sample_stream() -> Vec<Delta> {
        vec![
            Delta::text("Let me "),
            Delta::text("look."),
            Delta::tool_call(0, Some("call_1"), Some("view_"), None),
            Delta::tool_call(0, None, Some("file"), Some("{\"pa")),
            Delta::tool_call(1, Some("call_2"), Some("bash"), Some("{}")),
            Delta::tool_call(0, None, None, Some("th\":\"a.txt\"}")),
        ]
    }

    #[test]
    fn text_concatenates() {
        let acc = reduce(&[Delta::text("Hel"), Delta::text("lo")]);
        assert_eq!(acc.content(), "Hello");
    }

    #[test]
    fn tool_calls_assemble_by_index() {
        let acc = reduce(&sample_stream());
        let calls = acc.tool_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], ToolCallRequest::new("call_1", "view_file", r#"{"path":"a.txt"}"#));
        assert_eq!(calls[1], ToolCallRequest::new("call_2", "bash", "{}"));
        assert_eq!(acc.content(), "Let me look.");
    }

    #[test]
    fn index_markers_are_stripped() {
        let acc = reduce(&sample_stream());
        let calls = acc.fields()["tool_calls"].as_array().unwrap();
        assert!(calls.iter().all(|c| c.get("index").is_none()));
        assert_eq!(calls[0]["type"], "function");
    }

    #[test]
    fn chunk_boundaries_do_not_matter() {
        let stream = sample_stream();
        let whole = reduce(&stream);
        for split in 0..=stream.len() {
            let (d1, d2) = stream.split_at(split);
            let mut acc = reduce(d1);
            for d in d2 {
                acc.apply(d);
            }
            assert_eq!(acc, whole, "split at {split}");
        }
    }

    #[test]
    fn unindexed_list_elements_merge_by_position() {
        let acc = reduce(&[
            delta(json!({"tool_calls": [{"id": "a", "function": {"name": "ba"}}]})),
            delta(json!({"tool_calls": [{"function": {"name": "sh", "arguments": "{}"}}]})),
        ]);
        assert_eq!(acc.tool_calls(), vec![ToolCallRequest::new("a", "bash", "{}")]);
    }

    #[test]
    fn null_fields_do_not_clobber() {
        let acc = reduce(&[
            delta(json!({"content": "hi"})),
            delta(json!({"content": null, "role": "assistant"})),
        ]);
        assert_eq!(acc.content(), "hi");
        assert_eq!(acc.fields()["role"], "assistant");
    }

    #[test]
    fn sparse_index_pads_positions() {
        let acc = reduce(&[Delta::tool_call(1, Some("b"), Some("bash"), None)]);
        let calls = acc.tool_calls();
        assert_eq!(calls.len(), 1, "null padding is not a tool call");
        assert_eq!(calls[0].id, "b");

        let acc = reduce(&[
            Delta::tool_call(1, Some("b"), Some("bash"), None),
            Delta::tool_call(0, Some("a"), Some("view_file"), None),
        ]);
        let ids: Vec<String> = acc.tool_calls().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn out_of_range_index_is_dropped() {
        let acc = reduce(&[
            Delta::tool_call(0, Some("a"), Some("bash"), Some("{}")),
            delta(json!({"tool_calls": [{"index": u64::MAX, "id": "x", "function": {"name": "bash"}}]})),
            delta(json!({"tool_calls": [{"index": 100_000_000u64, "id": "y", "function": {"name": "bash"}}]})),
        ]);
        assert_eq!(acc.tool_calls(), vec![ToolCallRequest::new("a", "bash", "{}")]);

        // A first delta may not open with a huge index either.
        let acc = reduce(&[delta(json!({"tool_calls": [{"index": u64::MAX, "id": "x"}]}))]);
        assert!(acc.tool_calls().is_empty());
    }

    #[test]
    fn index_within_the_gap_is_kept() {
        let acc = reduce(&[Delta::tool_call(MAX_INDEX_GAP, Some("far"), Some("bash"), None)]);
        let calls = acc.tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "far");
    }

    #[test]
    fn named_call_detection() {
        let mut acc = AccumulatedResponse::new();
        acc.apply(&Delta::tool_call(0, Some("c"), None, Some("{")));
        assert!(!acc.has_named_tool_call());
        acc.apply(&Delta::tool_call(0, None, Some("bash"), None));
        assert!(acc.has_named_tool_call());
    }
}
