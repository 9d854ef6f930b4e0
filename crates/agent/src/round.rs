//! The round controller: one user turn, start to finish.
//!
//! ```text
//! Idle → AwaitingModel → (ToolsPending → Executing → AwaitingModel)* → Finalized
//!                 └──────────── Cancelled (from any non-terminal state)
//! ```
//!
//! Tool calls run strictly one after another, each result recorded before
//! the next call starts. Cancellation is polled before every model call,
//! between stream deltas, and before every tool call. Transport errors end
//! the turn as a single assistant error entry; nothing is retried here.
//!
//! Every assistant entry a turn records also lands in the model context, so
//! the live context matches what a restore rebuilds from the transcript.

use std::time::Instant;

use cl_domain::chat::{ChatEntry, StreamingChunk};
use cl_domain::config::{AgentConfig, LlmConfig, SummaryConfig};
use cl_domain::error::Result;
use cl_domain::tool::{Message, ToolCallRequest, ToolErrorKind, ToolResult};
use cl_domain::trace::TraceEvent;
use cl_providers::ChatRequest;
use cl_sessions::ChatStore;
use futures_util::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::Instrument;

use crate::binding::ModelBinding;
use crate::cancel::CancelToken;
use crate::conversation::Conversation;
use crate::dispatch::ToolDispatcher;
use crate::reducer::AccumulatedResponse;
use crate::restore::INTERRUPTED_REASON;
use crate::sanitize;
use crate::summary;

pub const CANCEL_MARKER: &str = "\n\n[Operation cancelled by user]";
pub const ROUND_LIMIT_NOTICE: &str = "Maximum tool execution rounds reached. Stopping to prevent infinite loops.";
const CANCELLED_TOOL_REASON: &str = "Cancelled by user before execution";

/// Per-turn knobs, snapshotted from config.
#[derive(Debug, Clone)]
pub struct TurnSettings {
    pub max_rounds: usize,
    pub persist: bool,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub summary: SummaryConfig,
}

impl TurnSettings {
    pub fn from_config(agent: &AgentConfig, llm: &LlmConfig) -> Self {
        Self {
            max_rounds: agent.max_tool_rounds,
            persist: agent.persist_session,
            temperature: Some(llm.temperature),
            max_tokens: Some(llm.max_tokens),
            summary: agent.summary.clone(),
        }
    }
}

impl Default for TurnSettings {
    fn default() -> Self {
        Self::from_config(&AgentConfig::default(), &LlmConfig::default())
    }
}

/// How a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Finalized,
    RoundLimit,
    Cancelled,
    Failed,
}

/// Collaborators of one turn.
pub struct TurnContext<'a> {
    pub binding: &'a ModelBinding,
    pub dispatcher: &'a ToolDispatcher,
    pub store: &'a dyn ChatStore,
    pub settings: &'a TurnSettings,
    pub cancel: &'a CancelToken,
    /// Chunk sink of a streamed turn; `None` for buffered turns.
    pub tx: Option<&'a mpsc::Sender<StreamingChunk>>,
}

enum Streamed {
    Complete {
        content: String,
        calls: Vec<ToolCallRequest>,
        announced: bool,
    },
    Cancelled {
        partial: String,
    },
}

impl TurnContext<'_> {
    async fn send(&self, chunk: StreamingChunk) {
        if let Some(tx) = self.tx {
            // A dropped receiver only means nobody is watching.
            let _ = tx.send(chunk).await;
        }
    }

    async fn send_token_count(&self, conv: &Conversation) {
        self.send(StreamingChunk::TokenCount {
            token_count: conv.estimate_tokens(),
        })
        .await;
    }

    async fn persist(&self, entry: &ChatEntry) {
        if !self.settings.persist {
            return;
        }
        if let Err(e) = self.store.append(entry).await {
            tracing::warn!(error = %e, entry_id = %entry.id, "failed to persist chat entry");
        }
    }

    /// Append a finished entry to the transcript and persist it.
    async fn record(&self, conv: &mut Conversation, entry: ChatEntry) {
        self.persist(&entry).await;
        conv.push_entry(entry);
    }
}

/// Run one user turn against `conv`.
pub async fn run_turn(ctx: &TurnContext<'_>, conv: &mut Conversation, text: &str) -> TurnOutcome {
    let turn_start = conv.messages().len();
    conv.push_message(Message::user(text));
    ctx.record(conv, ChatEntry::user(text)).await;
    ctx.send_token_count(conv).await;

    match drive_rounds(ctx, conv, turn_start).await {
        Ok(outcome) => {
            tracing::info!(?outcome, "turn finished");
            outcome
        }
        Err(e) => {
            tracing::warn!(error = %e, "turn failed");
            fail_turn(ctx, conv, &e.to_string()).await
        }
    }
}

/// End a turn on an error or fault with one assistant error entry.
///
/// Tool calls left open by the failure get `interrupted` results, both in
/// the transcript and in the model context.
pub async fn fail_turn(ctx: &TurnContext<'_>, conv: &mut Conversation, error: &str) -> TurnOutcome {
    let interrupted = ToolResult::failure(ToolErrorKind::Interrupted, INTERRUPTED_REASON);
    for entry in conv.complete_streaming_entries(&interrupted) {
        ctx.persist(&entry).await;
    }
    conv.close_open_tool_calls(
        ToolErrorKind::Interrupted,
        INTERRUPTED_REASON,
        ctx.binding.tool_result_name,
    );

    let text = format!("Sorry, I encountered an error: {error}");
    ctx.send(StreamingChunk::Content { content: text.clone() }).await;
    conv.push_message(Message::assistant(text.clone()));
    ctx.record(conv, ChatEntry::assistant(text)).await;
    TurnOutcome::Failed
}

async fn drive_rounds(ctx: &TurnContext<'_>, conv: &mut Conversation, turn_start: usize) -> Result<TurnOutcome> {
    let registry = ctx.dispatcher.registry();
    let mut trace: Vec<ToolCallRequest> = Vec::new();
    let mut rounds = 0;

    while rounds < ctx.settings.max_rounds {
        if ctx.cancel.is_cancelled() {
            return Ok(cancelled(ctx, conv, "").await);
        }

        let (content, calls, announced) = match stream_model(ctx, conv, rounds).await? {
            Streamed::Cancelled { partial } => return Ok(cancelled(ctx, conv, &partial).await),
            Streamed::Complete {
                content,
                calls,
                announced,
            } => (content, calls, announced),
        };

        let calls = sanitize::clean_tool_calls(calls, registry);
        if calls.is_empty() {
            finalize(ctx, conv, content, rounds, turn_start, &trace).await;
            return Ok(TurnOutcome::Finalized);
        }

        // ── ToolsPending ────────────────────────────────────────────
        if !announced {
            ctx.send(StreamingChunk::ToolCalls {
                tool_calls: calls.clone(),
            })
            .await;
        }
        conv.push_message(Message::assistant_with_tools(content.clone(), calls.clone()));
        ctx.record(conv, ChatEntry::assistant_with_tools(content, &calls)).await;

        // ── Executing ───────────────────────────────────────────────
        for call in calls {
            if ctx.cancel.is_cancelled() {
                conv.close_open_tool_calls(
                    ToolErrorKind::Cancelled,
                    CANCELLED_TOOL_REASON,
                    ctx.binding.tool_result_name,
                );
                return Ok(cancelled(ctx, conv, "").await);
            }

            let slot = conv.push_entry(ChatEntry::tool_call(&call));
            let (result, message) = ctx.dispatcher.dispatch(&call, ctx.binding.tool_result_name).await;
            conv.push_message(message);
            if let Some(entry) = conv.entry_mut(slot) {
                entry.complete(result.clone());
                let done = entry.clone();
                ctx.persist(&done).await;
            }
            ctx.send(StreamingChunk::ToolResult {
                tool_call: call.clone(),
                tool_result: result,
            })
            .await;
            trace.push(call);
        }

        rounds += 1;
        tracing::debug!(round = rounds, "tool round complete");
        ctx.send_token_count(conv).await;
    }

    tracing::warn!(max_rounds = ctx.settings.max_rounds, "tool round limit reached");
    TraceEvent::RoundLimitReached {
        max_rounds: ctx.settings.max_rounds,
    }
    .emit();
    conv.push_message(Message::assistant(ROUND_LIMIT_NOTICE));
    ctx.send(StreamingChunk::Content {
        content: ROUND_LIMIT_NOTICE.to_owned(),
    })
    .await;
    ctx.record(conv, ChatEntry::assistant(ROUND_LIMIT_NOTICE)).await;
    Ok(TurnOutcome::RoundLimit)
}

/// AwaitingModel: one streaming call, folded through the reducer.
async fn stream_model(ctx: &TurnContext<'_>, conv: &Conversation, round: usize) -> Result<Streamed> {
    let binding = ctx.binding;
    let req = ChatRequest {
        messages: conv.messages().to_vec(),
        tools: ctx.dispatcher.registry().definitions(),
        model: Some(binding.model.clone()),
        temperature: ctx.settings.temperature,
        max_tokens: ctx.settings.max_tokens,
    };

    let span = tracing::info_span!("llm.call", model = %binding.model, round);
    async {
        let started = Instant::now();
        let mut stream = binding.provider.chat_stream(&req).await?;
        let mut acc = AccumulatedResponse::new();
        let mut announced = false;
        // Ids handed out at announcement to calls that had none, by position.
        let mut filled_ids: Vec<Option<String>> = Vec::new();

        loop {
            if ctx.cancel.is_cancelled() {
                return Ok(Streamed::Cancelled {
                    partial: acc.content().to_owned(),
                });
            }
            let Some(next) = stream.next().await else {
                break;
            };
            let delta = next?;
            acc.apply(&delta);

            if let Some(text) = delta
                .fields()
                .get("content")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
            {
                ctx.send(StreamingChunk::Content {
                    content: text.to_owned(),
                })
                .await;
            }

            if !announced && acc.has_named_tool_call() {
                let (tool_calls, filled) = announceable(&acc, ctx.dispatcher);
                filled_ids = filled;
                ctx.send(StreamingChunk::ToolCalls { tool_calls }).await;
                announced = true;
            }
        }

        TraceEvent::LlmRequest {
            provider: binding.provider_id.clone(),
            model: binding.model.clone(),
            streaming: true,
            round,
            duration_ms: started.elapsed().as_millis() as u64,
        }
        .emit();

        let mut calls = acc.tool_calls();
        for (call, filled) in calls.iter_mut().zip(filled_ids) {
            match filled {
                Some(id) if call.id.is_empty() => call.id = id,
                _ => {}
            }
        }

        Ok(Streamed::Complete {
            content: acc.content().to_owned(),
            calls,
            announced,
        })
    }
    .instrument(span)
    .await
}

/// Named calls seen so far, with ids bounded the way dispatch will see
/// them and display names repaired. Also returns, by position, the ids
/// generated for calls that streamed without one.
fn announceable(acc: &AccumulatedResponse, dispatcher: &ToolDispatcher) -> (Vec<ToolCallRequest>, Vec<Option<String>>) {
    let mut calls = Vec::new();
    let mut filled = Vec::new();
    for mut call in acc.tool_calls() {
        let generated = call.id.is_empty();
        call.id = sanitize::bound_id(&call.id);
        filled.push(generated.then(|| call.id.clone()));

        if call.name.is_empty() {
            continue;
        }
        if let Some(name) = sanitize::repair_name(&call.name, dispatcher.registry()) {
            call.name = name;
        }
        calls.push(call);
    }
    (calls, filled)
}

/// Finalized: record the answer, synthesizing one for terse models.
async fn finalize(
    ctx: &TurnContext<'_>,
    conv: &mut Conversation,
    content: String,
    rounds: usize,
    turn_start: usize,
    trace: &[ToolCallRequest],
) {
    let binding = ctx.binding;
    let summarize = summary::needs_summary(&ctx.settings.summary, &binding.model, &content, rounds)
        && !ctx.cancel.is_cancelled();

    if !summarize || !content.trim().is_empty() {
        conv.push_message(Message::assistant(content.clone()));
        ctx.record(conv, ChatEntry::assistant(content)).await;
    }
    if !summarize {
        return;
    }

    let (text, strategy) = summary::synthesize(
        binding.provider.as_ref(),
        &binding.model,
        &ctx.settings.summary,
        conv.messages(),
        &conv.messages()[turn_start..],
        trace,
    )
    .await;
    tracing::info!(?strategy, "synthesized final answer");

    ctx.send(StreamingChunk::Content {
        content: format!("\n\n{text}"),
    })
    .await;
    conv.push_message(Message::assistant(text.clone()));
    ctx.record(conv, ChatEntry::assistant(text)).await;
}

/// Cancelled: surface the marker and keep the partial answer.
async fn cancelled(ctx: &TurnContext<'_>, conv: &mut Conversation, partial: &str) -> TurnOutcome {
    tracing::info!("turn cancelled");
    ctx.send(StreamingChunk::Content {
        content: CANCEL_MARKER.to_owned(),
    })
    .await;
    let text = format!("{partial}{CANCEL_MARKER}");
    let text = text.trim_start();
    conv.push_message(Message::assistant(text));
    ctx.record(conv, ChatEntry::assistant(text)).await;
    TurnOutcome::Cancelled
}
