//! Synthesizes a final answer when a terse model ends a tool-using turn
//! with little or no text.
//!
//! Strategies, in order: a dedicated non-tool model call, one retry with a
//! simpler prompt, then a deterministic digest of the turn's tool calls.

use cl_domain::config::SummaryConfig;
use cl_domain::tool::{Message, Role, ToolCallRequest};
use cl_domain::trace::TraceEvent;
use cl_providers::{ChatRequest, LlmProvider};

const FINAL_ANSWER_PROMPT: &str = "Write your final answer to my last request now. \
Structure it with a short direct answer first, then the key findings or changes as a list. \
Do not describe which tools you used or how you used them, and do not call any tools.";

const SIMPLE_PROMPT: &str = "In a few sentences, what is the answer to my request?";

/// Largest tool output carried into the simplified retry.
const MAX_RESULT_CHARS: usize = 2_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryStrategy {
    Model,
    Simplified,
    Digest,
}

impl SummaryStrategy {
    fn as_str(self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Simplified => "simplified",
            Self::Digest => "digest",
        }
    }
}

/// Whether the final answer of a turn needs the fallback.
pub fn needs_summary(cfg: &SummaryConfig, model: &str, content: &str, tool_rounds: usize) -> bool {
    cfg.enabled
        && tool_rounds > 0
        && cfg.is_terse_model(model)
        && content.trim().chars().count() < cfg.min_chars
}

/// Produce the synthesized answer, already wrapped in the configured header.
///
/// `turn_messages` are the messages of the current turn, starting at the
/// user message; `trace` is every tool call the turn issued.
pub async fn synthesize(
    provider: &dyn LlmProvider,
    model: &str,
    cfg: &SummaryConfig,
    context: &[Message],
    turn_messages: &[Message],
    trace: &[ToolCallRequest],
) -> (String, SummaryStrategy) {
    let mut messages = context.to_vec();
    messages.push(Message::user(FINAL_ANSWER_PROMPT));
    let (body, strategy) = match ask(provider, model, messages).await {
        Some(text) => (text, SummaryStrategy::Model),
        None => match ask(provider, model, simplified_messages(context, turn_messages)).await {
            Some(text) => (text, SummaryStrategy::Simplified),
            None => (tool_digest(trace), SummaryStrategy::Digest),
        },
    };

    TraceEvent::SummaryFallback {
        model: model.to_owned(),
        strategy: strategy.as_str().to_owned(),
    }
    .emit();
    (format!("{}\n\n{}", cfg.header, body.trim()), strategy)
}

async fn ask(provider: &dyn LlmProvider, model: &str, messages: Vec<Message>) -> Option<String> {
    let req = ChatRequest {
        messages,
        tools: Vec::new(),
        model: Some(model.to_owned()),
        ..Default::default()
    };
    match provider.chat(&req).await {
        Ok(resp) if !resp.content.trim().is_empty() => Some(resp.content),
        Ok(_) => {
            tracing::debug!(model, "summary call returned no text");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, model, "summary call failed");
            None
        }
    }
}

/// The system prompt, the user's request, and the tool outputs flattened
/// into plain text. No tool-role messages, so any model accepts it.
fn simplified_messages(context: &[Message], turn_messages: &[Message]) -> Vec<Message> {
    let mut out: Vec<Message> = context
        .iter()
        .filter(|m| m.role == Role::System)
        .cloned()
        .collect();

    let request = turn_messages
        .iter()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.as_str())
        .unwrap_or_default();

    let mut findings = String::new();
    for m in turn_messages.iter().filter(|m| m.role == Role::Tool) {
        let text: String = m.content.chars().take(MAX_RESULT_CHARS).collect();
        findings.push_str(&format!("\n---\n{text}"));
    }

    out.push(Message::user(format!(
        "My request was:\n{request}\n\nHere is what was found:{findings}\n\n{SIMPLE_PROMPT}"
    )));
    out
}

/// Deterministic summary of the tool activity, grouped by tool name in
/// order of first use.
pub fn tool_digest(trace: &[ToolCallRequest]) -> String {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for call in trace {
        match counts.iter_mut().find(|(name, _)| *name == call.name) {
            Some((_, n)) => *n += 1,
            None => counts.push((call.name.as_str(), 1)),
        }
    }

    let mut out = format!(
        "I ran {} tool call{} for this request but did not produce a written answer. Tool activity:",
        trace.len(),
        if trace.len() == 1 { "" } else { "s" }
    );
    for (name, n) in counts {
        let noun = if n == 1 { "invocation" } else { "invocations" };
        out.push_str(&format!("\n- {name}: {n} {noun}"));
    }
    out.push_str("\n\nAsk me to continue if you need more detail.");
    out
}
