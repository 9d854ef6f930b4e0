use cl_domain::error::Result;
use cl_domain::stream::{BoxStream, Delta, Usage};
use cl_domain::tool::{Message, ToolCallRequest, ToolDefinition};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / Response types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A provider-agnostic chat completion request.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    /// The conversation messages to send.
    pub messages: Vec<Message>,
    /// Tool definitions the model may invoke. Empty = plain completion.
    pub tools: Vec<ToolDefinition>,
    /// Model identifier override. When `None`, the provider uses its default.
    pub model: Option<String>,
    /// Sampling temperature (0.0 – 2.0). `None` lets the provider choose.
    pub temperature: Option<f32>,
    /// Maximum tokens in the response. `None` lets the provider choose.
    pub max_tokens: Option<u32>,
}

/// A provider-agnostic chat completion response.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    /// Textual content of the response.
    pub content: String,
    /// Tool calls emitted by the model, arguments left as raw text.
    pub tool_calls: Vec<ToolCallRequest>,
    /// Token usage information.
    pub usage: Option<Usage>,
    /// The model that actually produced the response.
    pub model: String,
    /// The reason the model stopped generating (e.g. "stop", "tool_calls").
    pub finish_reason: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core provider trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Model transport consumed by the agent.
///
/// Implementations translate between our internal types and a provider's
/// HTTP API. Streaming responses are normalized into [`Delta`]s in the
/// OpenAI chat `delta` shape, so the agent never sees provider-specific
/// wire formats. Retries, if any, belong here and not in the agent loop.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a chat completion request and wait for the full response.
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse>;

    /// Send a chat completion request and return a stream of deltas.
    async fn chat_stream(&self, req: &ChatRequest) -> Result<BoxStream<'static, Result<Delta>>>;

    /// A unique identifier for this provider instance.
    fn provider_id(&self) -> &str;
}
