use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::pin::Pin;

/// A boxed async stream, used for LLM streaming responses.
pub type BoxStream<'a, T> = Pin<Box<dyn futures_core::Stream<Item = T> + Send + 'a>>;

/// One partial fragment of a streamed model response.
///
/// Provider adapters normalize their wire deltas into the OpenAI chat
/// `delta` shape (`content`, `tool_calls[{index, id, type, function}]`)
/// before handing them to the agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Delta(pub Map<String, Value>);

impl Delta {
    /// Wrap a JSON object. Non-objects carry no fields and yield `None`.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// A text-only delta.
    pub fn text(text: impl Into<String>) -> Self {
        let mut map = Map::new();
        map.insert("content".into(), Value::String(text.into()));
        Self(map)
    }

    /// A delta carrying one tool-call fragment at position `index`.
    pub fn tool_call(
        index: usize,
        id: Option<&str>,
        name: Option<&str>,
        arguments: Option<&str>,
    ) -> Self {
        let mut function = Map::new();
        if let Some(name) = name {
            function.insert("name".into(), Value::String(name.into()));
        }
        if let Some(args) = arguments {
            function.insert("arguments".into(), Value::String(args.into()));
        }

        let mut call = Map::new();
        call.insert("index".into(), Value::from(index));
        if let Some(id) = id {
            call.insert("id".into(), Value::String(id.into()));
            call.insert("type".into(), Value::String("function".into()));
        }
        call.insert("function".into(), Value::Object(function));

        let mut map = Map::new();
        map.insert("tool_calls".into(), Value::Array(vec![Value::Object(call)]));
        Self(map)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Token usage for a completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}
