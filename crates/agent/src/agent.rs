//! The agent facade used by the CLI.
//!
//! One [`Agent`] owns one conversation. Turns, model switches, and history
//! operations are serialized behind a single async lock; aborting only
//! touches the active turn's cancel token and never waits on that lock.
//!
//! A panic inside a turn is caught here and recorded like any other turn
//! failure; the agent stays usable afterwards.

use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cl_domain::chat::{ChatEntry, StreamingChunk};
use cl_domain::config::Config;
use cl_domain::error::{Error, Result};
use cl_domain::trace::TraceEvent;
use cl_sessions::ChatStore;
use cl_tools::ToolRegistry;
use futures_util::FutureExt;
use tokio::sync::{mpsc, Mutex};
use tracing::Instrument;

use crate::binding::{ModelBinding, TransportFactory};
use crate::cancel::{ActiveTurn, CancelToken};
use crate::conversation::Conversation;
use crate::confirm::{ConfirmationGate, Confirmer};
use crate::dispatch::{panic_message, ExecutionMonitor, ToolDispatcher};
use crate::prompt;
use crate::restore;
use crate::round::{self, TurnContext, TurnOutcome, TurnSettings};

/// Everything an [`Agent`] is built from.
pub struct AgentParts {
    pub binding: ModelBinding,
    pub factory: Arc<dyn TransportFactory>,
    pub tools: Arc<ToolRegistry>,
    pub store: Arc<dyn ChatStore>,
    pub settings: TurnSettings,
    pub workdir: PathBuf,
    pub custom_instructions: Option<String>,
    pub monitor: Option<Arc<dyn ExecutionMonitor>>,
    /// Asked before mutating tools run; `None` runs them unasked.
    pub confirmer: Option<Arc<dyn Confirmer>>,
    pub stream_capacity: usize,
}

impl AgentParts {
    /// Parts wired from config, with the instructions file read from
    /// `workdir`.
    pub fn from_config(
        config: &Config,
        binding: ModelBinding,
        factory: Arc<dyn TransportFactory>,
        tools: Arc<ToolRegistry>,
        store: Arc<dyn ChatStore>,
        workdir: &Path,
    ) -> Self {
        let instructions_path = workdir.join(&config.agent.instructions_file);
        Self {
            binding,
            factory,
            tools,
            store,
            settings: TurnSettings::from_config(&config.agent, &config.llm),
            workdir: workdir.to_path_buf(),
            custom_instructions: prompt::load_custom_instructions(&instructions_path),
            monitor: None,
            confirmer: None,
            stream_capacity: config.agent.stream_channel_capacity,
        }
    }
}

/// State guarded by the single-flight lock.
struct Session {
    conversation: Conversation,
    binding: ModelBinding,
}

pub struct Agent {
    session: Arc<Mutex<Session>>,
    active: ActiveTurn,
    dispatcher: ToolDispatcher,
    factory: Arc<dyn TransportFactory>,
    store: Arc<dyn ChatStore>,
    settings: TurnSettings,
    workdir: PathBuf,
    custom_instructions: Option<String>,
    stream_capacity: usize,
}

impl Agent {
    pub fn new(parts: AgentParts) -> Self {
        let mut dispatcher = ToolDispatcher::new(parts.tools);
        if let Some(monitor) = parts.monitor {
            dispatcher = dispatcher.with_monitor(monitor);
        }
        if let Some(confirmer) = parts.confirmer {
            dispatcher = dispatcher.with_confirmation(ConfirmationGate::new(confirmer));
        }
        let system = prompt::build_system_prompt(
            &parts.binding.model,
            &dispatcher.registry().names(),
            &parts.workdir,
            parts.custom_instructions.as_deref(),
        );
        Self {
            session: Arc::new(Mutex::new(Session {
                conversation: Conversation::new(system),
                binding: parts.binding,
            })),
            active: ActiveTurn::default(),
            dispatcher,
            factory: parts.factory,
            store: parts.store,
            settings: parts.settings,
            workdir: parts.workdir,
            custom_instructions: parts.custom_instructions,
            stream_capacity: parts.stream_capacity.max(1),
        }
    }

    fn system_prompt(&self, model: &str) -> String {
        prompt::build_system_prompt(
            model,
            &self.dispatcher.registry().names(),
            &self.workdir,
            self.custom_instructions.as_deref(),
        )
    }

    /// Run one turn with the lock held and `tx` as the chunk sink.
    async fn run_locked(
        &self,
        session: &mut Session,
        text: &str,
        tx: Option<&mpsc::Sender<StreamingChunk>>,
    ) -> (TurnOutcome, usize) {
        let token = CancelToken::new();
        let _registration = self.active.register(token.clone());
        let first_new = session.conversation.entries().len();

        let ctx = TurnContext {
            binding: &session.binding,
            dispatcher: &self.dispatcher,
            store: self.store.as_ref(),
            settings: &self.settings,
            cancel: &token,
            tx,
        };
        let caught = AssertUnwindSafe(round::run_turn(&ctx, &mut session.conversation, text))
            .catch_unwind()
            .await;
        let outcome = match caught {
            Ok(outcome) => outcome,
            Err(payload) => {
                let msg = panic_message(payload.as_ref());
                tracing::error!(panic = %msg, "turn panicked");
                round::fail_turn(&ctx, &mut session.conversation, &format!("internal error: {msg}")).await
            }
        };
        (outcome, first_new)
    }

    /// Run a turn to completion and return the entries it produced.
    pub async fn process_message(&self, text: &str) -> Vec<ChatEntry> {
        let mut session = self.session.lock().await;
        let span = tracing::info_span!("turn", model = %session.binding.model);
        let (_, first_new) = self.run_locked(&mut session, text, None).instrument(span).await;
        session.conversation.entries()[first_new..].to_vec()
    }

    /// Run a turn in the background, streaming its chunks. The last chunk
    /// is always [`StreamingChunk::Done`].
    pub fn process_message_stream(self: &Arc<Self>, text: impl Into<String>) -> mpsc::Receiver<StreamingChunk> {
        let (tx, rx) = mpsc::channel(self.stream_capacity);
        let agent = Arc::clone(self);
        let text = text.into();

        tokio::spawn(async move {
            let turn = async {
                let mut session = agent.session.clone().lock_owned().await;
                let span = tracing::info_span!("turn", model = %session.binding.model);
                agent
                    .run_locked(&mut session, &text, Some(&tx))
                    .instrument(span)
                    .await;
            };
            if AssertUnwindSafe(turn).catch_unwind().await.is_err() {
                tracing::error!("turn task panicked while recovering");
            }
            let _ = tx.send(StreamingChunk::Done).await;
        });
        rx
    }

    /// Cancel the running turn, if any. Returns immediately.
    pub fn abort_current_operation(&self) -> bool {
        let aborted = self.active.abort();
        if aborted {
            tracing::info!("abort requested");
        }
        aborted
    }

    pub fn is_busy(&self) -> bool {
        self.active.is_running()
    }

    pub async fn current_model(&self) -> String {
        self.session.lock().await.binding.model.clone()
    }

    pub async fn current_provider(&self) -> String {
        self.session.lock().await.binding.provider_id.clone()
    }

    /// Switch models, keeping the provider unless the new model belongs
    /// to another one.
    pub async fn set_model(&self, model: &str) -> Result<()> {
        let mut session = self.session.lock().await;
        let binding = match self.factory.bind(model, None) {
            Ok(b) => b,
            Err(Error::Config(_)) => self.factory.bind(model, Some(&session.binding.provider_id))?,
            Err(e) => return Err(e),
        };
        self.apply_binding(&mut session, binding);
        Ok(())
    }

    /// Switch providers. Without a model, the provider's default model is
    /// used, falling back to the current one.
    pub async fn switch_provider(&self, provider_id: &str, model: Option<&str>) -> Result<()> {
        let mut session = self.session.lock().await;
        let model = match model {
            Some(m) => m.to_owned(),
            None => self
                .factory
                .default_model(provider_id)
                .unwrap_or_else(|| session.binding.model.clone()),
        };
        let binding = self.factory.bind(&model, Some(provider_id))?;
        self.apply_binding(&mut session, binding);
        Ok(())
    }

    fn apply_binding(&self, session: &mut Session, binding: ModelBinding) {
        session
            .conversation
            .replace_system_prompt(self.system_prompt(&binding.model));
        TraceEvent::ModelSwitched {
            provider: binding.provider_id.clone(),
            model: binding.model.clone(),
        }
        .emit();
        session.binding = binding;
    }

    /// Replace the conversation with the persisted transcript. Returns the
    /// number of entries restored.
    pub async fn restore_from_history(&self) -> Result<usize> {
        let mut session = self.session.lock().await;
        let entries = self.store.load_history().await?;
        let restored = restore::restore(&entries, session.binding.tool_result_name);
        if restored.dropped > 0 {
            tracing::warn!(dropped = restored.dropped, "dropped invalid history entries");
        }
        let count = restored.entries.len();
        session.conversation.reset(restored.messages, restored.entries);
        Ok(count)
    }

    pub async fn chat_history(&self) -> Vec<ChatEntry> {
        self.session.lock().await.conversation.entries().to_vec()
    }

    /// Forget the conversation, in memory and in the store.
    pub async fn clear_history(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        self.store.clear().await?;
        session.conversation.clear();
        Ok(())
    }

    /// Estimated size of the current model context.
    pub async fn token_estimate(&self) -> usize {
        self.session.lock().await.conversation.estimate_tokens()
    }
}
