//! Scripted transports and tools shared by the agent integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cl_agent::{Agent, AgentParts, ConfirmDecision, ConfirmRequest, Confirmer, ModelBinding, TransportFactory, TurnSettings};
use cl_domain::chat::StreamingChunk;
use cl_domain::error::{Error, Result};
use cl_domain::stream::{BoxStream, Delta};
use cl_domain::tool::{ToolDefinition, ToolResult};
use cl_providers::{ChatRequest, ChatResponse, LlmProvider};
use cl_sessions::{ChatStore, MemoryChatStore};
use cl_tools::{Capability, ToolError, ToolRegistry};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::{mpsc, Notify};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scripted provider
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One step of a scripted streaming response.
pub enum Step {
    Delta(Delta),
    /// Park the stream until the gate is notified.
    Wait(Arc<Notify>),
    Fail(String),
    /// The transport itself blows up mid-stream.
    Panic(&'static str),
}

/// What one `chat_stream` call does.
pub enum Script {
    Stream(Vec<Step>),
    Refuse(String),
}

pub fn text(t: &str) -> Step {
    Step::Delta(Delta::text(t))
}

/// A complete tool call in a single delta.
pub fn call(index: usize, id: &str, name: &str, args: &str) -> Step {
    Step::Delta(Delta::tool_call(index, Some(id), Some(name), Some(args)))
}

/// A response that requests `name` once.
pub fn tool_round(id: &str, name: &str, args: &str) -> Script {
    Script::Stream(vec![call(0, id, name, args)])
}

pub fn answer(t: &str) -> Script {
    Script::Stream(vec![text(t)])
}

#[derive(Default)]
pub struct ScriptedProvider {
    scripts: Mutex<VecDeque<Script>>,
    replies: Mutex<VecDeque<Result<String>>>,
    pub stream_requests: Mutex<Vec<ChatRequest>>,
    pub chat_requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    pub fn new(scripts: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            ..Default::default()
        })
    }

    /// Answers for non-streaming calls, in order.
    pub fn with_replies(self: Arc<Self>, replies: Vec<Result<String>>) -> Arc<Self> {
        *self.replies.lock() = replies.into();
        self
    }

    pub fn stream_calls(&self) -> usize {
        self.stream_requests.lock().len()
    }
}

#[async_trait::async_trait]
impl LlmProvider for ScriptedProvider {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        self.chat_requests.lock().push(req.clone());
        let content = self
            .replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Other("no reply scripted".into())))?;
        Ok(ChatResponse {
            content,
            tool_calls: Vec::new(),
            usage: None,
            model: req.model.clone().unwrap_or_default(),
            finish_reason: Some("stop".into()),
        })
    }

    async fn chat_stream(&self, req: &ChatRequest) -> Result<BoxStream<'static, Result<Delta>>> {
        self.stream_requests.lock().push(req.clone());
        let script = self.scripts.lock().pop_front();
        let steps = match script {
            Some(Script::Stream(steps)) => steps,
            Some(Script::Refuse(msg)) => return Err(Error::Http(msg)),
            None => return Err(Error::Other("no script left".into())),
        };

        Ok(Box::pin(async_stream::stream! {
            for step in steps {
                match step {
                    Step::Delta(delta) => yield Ok(delta),
                    Step::Wait(gate) => gate.notified().await,
                    Step::Fail(msg) => {
                        yield Err(Error::Http(msg));
                        return;
                    }
                    Step::Panic(msg) => panic!("{msg}"),
                }
            }
        }))
    }

    fn provider_id(&self) -> &str {
        "scripted"
    }
}

/// Binds every model to the same scripted provider.
pub struct ScriptedFactory {
    pub provider: Arc<ScriptedProvider>,
    pub tool_result_name: bool,
}

impl ScriptedFactory {
    pub fn binding(&self, model: &str) -> ModelBinding {
        ModelBinding {
            provider: self.provider.clone(),
            provider_id: "scripted".into(),
            model: model.into(),
            tool_result_name: self.tool_result_name,
        }
    }
}

impl TransportFactory for ScriptedFactory {
    fn bind(&self, model: &str, provider_id: Option<&str>) -> Result<ModelBinding> {
        match provider_id {
            Some(id) if id != "scripted" => Err(Error::Config(format!("unknown provider '{id}'"))),
            _ => Ok(self.binding(model)),
        }
    }

    fn default_model(&self, _provider_id: &str) -> Option<String> {
        Some("scripted-default".into())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Counting tool
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Records every invocation and echoes a fixed reply.
pub struct CountingTool {
    name: String,
    reply: String,
    pub calls: AtomicUsize,
    pub seen: Mutex<Vec<Value>>,
}

impl CountingTool {
    pub fn new(name: &str, reply: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            reply: reply.into(),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Capability for CountingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: format!("test tool {}", self.name),
            parameters: json!({"type": "object", "properties": {}}),
        }
    }

    async fn invoke(&self, args: Value) -> std::result::Result<ToolResult, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().push(args);
        Ok(ToolResult::ok(self.reply.clone()))
    }
}

/// Signals `entered` when invoked, then holds until `release` fires.
pub struct GatedTool {
    name: String,
    pub calls: AtomicUsize,
    pub entered: Notify,
    pub release: Notify,
}

impl GatedTool {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            calls: AtomicUsize::new(0),
            entered: Notify::new(),
            release: Notify::new(),
        })
    }

    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Capability for GatedTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: "waits for the test".into(),
            parameters: json!({"type": "object", "properties": {}}),
        }
    }

    async fn invoke(&self, _args: Value) -> std::result::Result<ToolResult, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        self.release.notified().await;
        Ok(ToolResult::ok("released"))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scripted confirmer
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Answers prompts in order; denies once the script runs out.
#[derive(Default)]
pub struct ScriptedConfirmer {
    answers: Mutex<VecDeque<ConfirmDecision>>,
    pub asked: Mutex<Vec<ConfirmRequest>>,
}

impl ScriptedConfirmer {
    pub fn new(answers: Vec<ConfirmDecision>) -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(answers.into()),
            ..Default::default()
        })
    }
}

#[async_trait::async_trait]
impl Confirmer for ScriptedConfirmer {
    async fn confirm(&self, request: &ConfirmRequest) -> ConfirmDecision {
        self.asked.lock().push(request.clone());
        self.answers
            .lock()
            .pop_front()
            .unwrap_or(ConfirmDecision::Denied { reason: None })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Harness
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct Harness {
    pub agent: Arc<Agent>,
    pub provider: Arc<ScriptedProvider>,
    pub store: Arc<MemoryChatStore>,
    pub bash: Arc<CountingTool>,
    pub view_file: Arc<CountingTool>,
    _workdir: tempfile::TempDir,
}

pub struct HarnessBuilder {
    provider: Arc<ScriptedProvider>,
    model: String,
    settings: TurnSettings,
    tool_result_name: bool,
    store: Arc<MemoryChatStore>,
    extra_tools: Vec<Arc<dyn Capability>>,
    confirmer: Option<Arc<dyn Confirmer>>,
}

impl HarnessBuilder {
    pub fn new(provider: Arc<ScriptedProvider>) -> Self {
        Self {
            provider,
            model: "grok-code-fast-1".into(),
            settings: TurnSettings::default(),
            tool_result_name: false,
            store: Arc::new(MemoryChatStore::new()),
            extra_tools: Vec::new(),
            confirmer: None,
        }
    }

    pub fn model(mut self, model: &str) -> Self {
        self.model = model.into();
        self
    }

    pub fn max_rounds(mut self, n: usize) -> Self {
        self.settings.max_rounds = n;
        self
    }

    pub fn tool_result_name(mut self) -> Self {
        self.tool_result_name = true;
        self
    }

    pub fn store(mut self, store: Arc<MemoryChatStore>) -> Self {
        self.store = store;
        self
    }

    pub fn tool(mut self, tool: Arc<dyn Capability>) -> Self {
        self.extra_tools.push(tool);
        self
    }

    pub fn confirmer(mut self, confirmer: Arc<dyn Confirmer>) -> Self {
        self.confirmer = Some(confirmer);
        self
    }

    pub fn build(self) -> Harness {
        let workdir = tempfile::tempdir().unwrap();
        let bash = CountingTool::new("bash", "ok");
        let view_file = CountingTool::new("view_file", "1: fn main() {}");
        let mut registry = ToolRegistry::new();
        registry.register(bash.clone());
        registry.register(view_file.clone());
        for tool in self.extra_tools {
            registry.register(tool);
        }

        let factory = ScriptedFactory {
            provider: self.provider.clone(),
            tool_result_name: self.tool_result_name,
        };
        let binding = factory.binding(&self.model);
        let store: Arc<dyn ChatStore> = self.store.clone();

        let agent = Agent::new(AgentParts {
            binding,
            factory: Arc::new(factory),
            tools: Arc::new(registry),
            store,
            settings: self.settings,
            workdir: workdir.path().to_path_buf(),
            custom_instructions: None,
            monitor: None,
            confirmer: self.confirmer,
            stream_capacity: 64,
        });

        Harness {
            agent: Arc::new(agent),
            provider: self.provider,
            store: self.store,
            bash,
            view_file,
            _workdir: workdir,
        }
    }
}

/// Drain a turn's chunks up to and including `Done`.
pub async fn collect(mut rx: mpsc::Receiver<StreamingChunk>) -> Vec<StreamingChunk> {
    let mut chunks = Vec::new();
    while let Some(chunk) = rx.recv().await {
        let done = chunk == StreamingChunk::Done;
        chunks.push(chunk);
        if done {
            break;
        }
    }
    chunks
}

/// Concatenated `Content` chunks.
pub fn streamed_text(chunks: &[StreamingChunk]) -> String {
    chunks
        .iter()
        .filter_map(|c| match c {
            StreamingChunk::Content { content } => Some(content.as_str()),
            _ => None,
        })
        .collect()
}

/// Compact chunk labels for ordering assertions.
pub fn kinds(chunks: &[StreamingChunk]) -> Vec<&'static str> {
    chunks
        .iter()
        .map(|c| match c {
            StreamingChunk::Content { .. } => "content",
            StreamingChunk::ToolCalls { .. } => "tool_calls",
            StreamingChunk::ToolResult { .. } => "tool_result",
            StreamingChunk::TokenCount { .. } => "token_count",
            StreamingChunk::Done => "done",
        })
        .collect()
}
