//! OpenAI-compatible adapter.
//!
//! Works with every built-in provider (xAI, Anthropic's compat endpoint,
//! OpenAI, DeepSeek, Mistral) and any other endpoint that follows the
//! OpenAI chat completions contract.

use std::time::Duration;

use cl_domain::config::{LlmConfig, ProviderConfig};
use cl_domain::error::{Error, Result};
use cl_domain::stream::{BoxStream, Delta, Usage};
use cl_domain::tool::{tool_calls_to_wire, Message, Role, ToolCallRequest, ToolDefinition};
use serde_json::{Map, Value};

use crate::traits::{ChatRequest, ChatResponse, LlmProvider};
use crate::util::{from_reqwest, is_reasoning_model, resolve_api_key};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct OpenAiCompatProvider {
    id: String,
    base_url: String,
    api_key: Option<String>,
    default_model: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a provider for `model` from its config entry.
    pub fn from_config(cfg: &ProviderConfig, llm: &LlmConfig, model: &str) -> Result<Self> {
        let api_key = resolve_api_key(cfg)?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(llm.timeout_ms))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            id: cfg.id.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            default_model: model.to_string(),
            client,
        })
    }

    fn authed_post(&self, url: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .post(url)
            .header("Content-Type", "application/json");
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    fn effective_model<'a>(&'a self, req: &'a ChatRequest) -> &'a str {
        req.model.as_deref().unwrap_or(&self.default_model)
    }

    fn build_chat_body(&self, req: &ChatRequest, stream: bool) -> Value {
        let model = self.effective_model(req);
        let messages: Vec<Value> = req.messages.iter().map(msg_to_openai).collect();

        let mut body = serde_json::json!({
            "model": model,
            "messages": messages,
            "stream": stream,
        });

        if !req.tools.is_empty() {
            let tools: Vec<Value> = req.tools.iter().map(tool_to_openai).collect();
            body["tools"] = Value::Array(tools);
            body["tool_choice"] = Value::String("auto".into());
        }

        // Reasoning models reject `temperature` and renamed `max_tokens`.
        if is_reasoning_model(model) {
            if let Some(max) = req.max_tokens {
                body["max_completion_tokens"] = serde_json::json!(max);
            }
        } else {
            if let Some(temp) = req.temperature {
                body["temperature"] = serde_json::json!(temp);
            }
            if let Some(max) = req.max_tokens {
                body["max_tokens"] = serde_json::json!(max);
            }
        }
        body
    }

    async fn post_checked(&self, body: &Value) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url);
        tracing::debug!(provider = %self.id, url = %url, "chat completions request");

        let resp = self
            .authed_post(&url)
            .json(body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let err_text = resp.text().await.map_err(from_reqwest)?;
            return Err(Error::Provider {
                provider: self.id.clone(),
                message: format!("HTTP {} - {}", status.as_u16(), err_text),
            });
        }
        Ok(resp)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message serialization helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn role_to_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

fn msg_to_openai(msg: &Message) -> Value {
    match msg.role {
        Role::Tool => {
            let mut obj = serde_json::json!({
                "role": "tool",
                "tool_call_id": msg.tool_call_id.as_deref().unwrap_or_default(),
                "content": msg.content,
            });
            if let Some(name) = &msg.name {
                obj["name"] = Value::String(name.clone());
            }
            obj
        }
        Role::Assistant if !msg.tool_calls.is_empty() => {
            let content = if msg.content.is_empty() {
                Value::Null
            } else {
                Value::String(msg.content.clone())
            };
            serde_json::json!({
                "role": "assistant",
                "content": content,
                "tool_calls": tool_calls_to_wire(&msg.tool_calls),
            })
        }
        role => serde_json::json!({
            "role": role_to_str(role),
            "content": msg.content,
        }),
    }
}

fn tool_to_openai(tool: &ToolDefinition) -> Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response deserialization helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn parse_chat_response(provider: &str, body: &Value) -> Result<ChatResponse> {
    let choice = body
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first())
        .ok_or_else(|| Error::Provider {
            provider: provider.into(),
            message: "no choices in response".into(),
        })?;

    let message = choice.get("message").ok_or_else(|| Error::Provider {
        provider: provider.into(),
        message: "no message in choice".into(),
    })?;

    let content = message
        .get("content")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    let finish_reason = choice
        .get("finish_reason")
        .and_then(|v| v.as_str())
        .map(String::from);

    let model = body
        .get("model")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string();

    Ok(ChatResponse {
        content,
        tool_calls: parse_openai_tool_calls(message),
        usage: body.get("usage").and_then(parse_openai_usage),
        model,
        finish_reason,
    })
}

/// Tool calls of a complete response. Arguments stay raw; the agent
/// sanitizes them before dispatch.
fn parse_openai_tool_calls(message: &Value) -> Vec<ToolCallRequest> {
    let Some(arr) = message.get("tool_calls").and_then(|v| v.as_array()) else {
        return Vec::new();
    };
    arr.iter()
        .filter_map(|tc| {
            let id = tc.get("id")?.as_str()?;
            let func = tc.get("function")?;
            let name = func.get("name")?.as_str()?;
            let arguments = func.get("arguments").and_then(|v| v.as_str()).unwrap_or("");
            Some(ToolCallRequest::new(id, name, arguments))
        })
        .collect()
}

fn parse_openai_usage(v: &Value) -> Option<Usage> {
    Some(Usage {
        prompt_tokens: v.get("prompt_tokens")?.as_u64()? as u32,
        completion_tokens: v.get("completion_tokens")?.as_u64()? as u32,
        total_tokens: v.get("total_tokens")?.as_u64()? as u32,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SSE streaming helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Normalize one SSE payload into at most one [`Delta`].
///
/// Only `content` and `tool_calls` survive; role markers, usage-only
/// chunks, reasoning text and the `[DONE]` sentinel produce nothing.
fn parse_sse_data(data: &str) -> Vec<Result<Delta>> {
    if data.trim() == "[DONE]" {
        return Vec::new();
    }

    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => return vec![Err(Error::Json(e))],
    };

    let Some(delta) = v
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first())
        .and_then(|choice| choice.get("delta"))
    else {
        return Vec::new();
    };

    let mut fields = Map::new();
    if let Some(text) = delta.get("content").and_then(|v| v.as_str()) {
        if !text.is_empty() {
            fields.insert("content".into(), Value::String(text.into()));
        }
    }
    if let Some(calls) = delta.get("tool_calls").filter(|v| v.is_array()) {
        fields.insert("tool_calls".into(), calls.clone());
    }

    if fields.is_empty() {
        Vec::new()
    } else {
        vec![Ok(Delta(fields))]
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl LlmProvider for OpenAiCompatProvider {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        let body = self.build_chat_body(req, false);
        let resp = self.post_checked(&body).await?;
        let resp_text = resp.text().await.map_err(from_reqwest)?;
        let resp_json: Value = serde_json::from_str(&resp_text)?;
        parse_chat_response(&self.id, &resp_json)
    }

    async fn chat_stream(&self, req: &ChatRequest) -> Result<BoxStream<'static, Result<Delta>>> {
        let body = self.build_chat_body(req, true);
        let resp = self.post_checked(&body).await?;
        Ok(crate::sse::sse_response_stream(resp, parse_sse_data))
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
