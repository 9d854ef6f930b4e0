//! `codeloop chat`: the interactive REPL.
//!
//! Each line is one agent turn, streamed to stdout. Tool activity and
//! diagnostics go to stderr. Ctrl-C during a turn aborts it; at the prompt
//! it only clears the line.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use cl_agent::{Agent, Confirmer};
use cl_domain::chat::{EntryKind, StreamingChunk};
use cl_domain::config::Config;

use super::confirm::TerminalConfirmer;
use crate::bootstrap;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Public entry point
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn chat(config: Arc<Config>, workdir: &Path) -> anyhow::Result<()> {
    let confirmer: Option<Arc<dyn Confirmer>> = if config.tools.confirm_mutations {
        Some(Arc::new(TerminalConfirmer))
    } else {
        None
    };
    let agent = bootstrap::build_agent(&config, workdir, confirmer).await?;

    let history_path = dirs::home_dir()
        .unwrap_or_default()
        .join(".codeloop")
        .join("repl_history.txt");
    if let Some(parent) = history_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let mut rl = rustyline::DefaultEditor::new()?;
    let _ = rl.load_history(&history_path);

    eprintln!("codeloop: {}", workdir.display());
    eprintln!(
        "Model: {}  |  Type /help for commands, Ctrl+D to exit",
        agent.current_model().await
    );
    eprintln!();

    loop {
        match rl.readline("you> ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                rl.add_history_entry(&line).ok();

                // ── Slash commands ────────────────────────────────
                if trimmed.starts_with('/') {
                    if handle_slash_command(&agent, trimmed).await {
                        break;
                    }
                    continue;
                }

                // ── User message → agent turn ────────────────────
                stream_turn(&agent, trimmed).await;
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                eprintln!("(Use Ctrl+D or /exit to quit)");
                continue;
            }
            Err(rustyline::error::ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("\x1B[31mreadline error: {e}\x1B[0m");
                break;
            }
        }
    }

    rl.save_history(&history_path).ok();
    eprintln!("Goodbye!");
    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Slash command handling
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Process a slash command. Returns `true` if the REPL should exit.
async fn handle_slash_command(agent: &Agent, input: &str) -> bool {
    let mut parts = input.split_whitespace();
    let cmd = parts.next().unwrap_or_default();
    let args: Vec<&str> = parts.collect();

    match cmd {
        "/exit" | "/quit" => return true,

        "/model" => match args.first() {
            Some(model) => match agent.set_model(model).await {
                Ok(()) => eprintln!("Model set to: {}", agent.current_model().await),
                Err(e) => eprintln!("\x1B[31mcannot switch model: {e}\x1B[0m"),
            },
            None => {
                eprintln!("Current model: {}", agent.current_model().await);
                eprintln!("Usage: /model <name>");
            }
        },

        "/provider" => match args.first() {
            Some(provider) => match agent.switch_provider(provider, args.get(1).copied()).await {
                Ok(()) => eprintln!(
                    "Provider set to: {} ({})",
                    agent.current_provider().await,
                    agent.current_model().await
                ),
                Err(e) => eprintln!("\x1B[31mcannot switch provider: {e}\x1B[0m"),
            },
            None => {
                eprintln!("Current provider: {}", agent.current_provider().await);
                eprintln!("Usage: /provider <id> [model]");
            }
        },

        "/history" => {
            for entry in agent.chat_history().await {
                let label = match entry.kind {
                    EntryKind::User => "you",
                    EntryKind::Assistant => "assistant",
                    EntryKind::ToolCall | EntryKind::ToolResult => "tool",
                };
                eprintln!("{label}> {}", first_line(&entry.content));
            }
            eprintln!("(~{} tokens in context)", agent.token_estimate().await);
        }

        "/clear" => match agent.clear_history().await {
            Ok(()) => eprintln!("Conversation cleared."),
            Err(e) => eprintln!("\x1B[31mcannot clear history: {e}\x1B[0m"),
        },

        "/help" => {
            eprintln!("Commands:");
            eprintln!("  /model <name>          Switch the model");
            eprintln!("  /provider <id> [model] Switch the provider");
            eprintln!("  /history               Show the conversation so far");
            eprintln!("  /clear                 Forget the conversation");
            eprintln!("  /exit, /quit           Exit the chat");
            eprintln!("  /help                  Show this help");
        }

        other => {
            eprintln!("Unknown command: {other}  (type /help for a list)");
        }
    }

    false
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Turn streaming
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Run one turn, printing chunks until `Done`. The first Ctrl-C aborts the
/// turn; the rest of the stream still drains.
async fn stream_turn(agent: &Arc<Agent>, text: &str) {
    let mut rx = agent.process_message_stream(text);
    let mut aborted = false;

    loop {
        let chunk = tokio::select! {
            chunk = rx.recv() => chunk,
            _ = tokio::signal::ctrl_c(), if !aborted => {
                aborted = agent.abort_current_operation();
                continue;
            }
        };
        let Some(chunk) = chunk else { break };
        if render_chunk(&chunk) {
            break;
        }
    }
}

/// Print one chunk. Returns `true` on `Done`.
pub(crate) fn render_chunk(chunk: &StreamingChunk) -> bool {
    match chunk {
        StreamingChunk::Content { content } => {
            print!("{content}");
            std::io::stdout().flush().ok();
        }
        StreamingChunk::ToolCalls { tool_calls } => {
            for call in tool_calls {
                eprintln!("\x1B[2m[tool: {}]\x1B[0m", call.name);
            }
        }
        StreamingChunk::ToolResult { tool_call, tool_result } => {
            if tool_result.success {
                eprintln!("\x1B[2m[{}: ok]\x1B[0m", tool_call.name);
            } else {
                eprintln!(
                    "\x1B[31m[{}: {}]\x1B[0m",
                    tool_call.name,
                    first_line(&tool_result.content())
                );
            }
        }
        StreamingChunk::TokenCount { token_count } => {
            tracing::debug!(token_count, "context size");
        }
        StreamingChunk::Done => {
            println!();
            println!();
            return true;
        }
    }
    false
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}
