//! `codeloop history`: inspect or clear the transcript of a workdir.

use std::path::Path;

use anyhow::Context;
use cl_domain::chat::{ChatEntry, EntryKind};
use cl_domain::config::Config;

use crate::bootstrap;

pub async fn history(config: &Config, workdir: &Path, clear: bool) -> anyhow::Result<()> {
    if !config.agent.persist_session {
        eprintln!("Session persistence is disabled (agent.persist_session = false).");
        return Ok(());
    }
    let store = bootstrap::open_store(config, workdir);

    if clear {
        store.clear().await.context("clearing history")?;
        eprintln!("History cleared.");
        return Ok(());
    }

    let entries = store.load_history().await.context("loading history")?;
    if entries.is_empty() {
        eprintln!("No history for {}", workdir.display());
    }
    for entry in &entries {
        println!("{}", format_entry(entry));
    }
    Ok(())
}

fn format_entry(entry: &ChatEntry) -> String {
    let time = entry.timestamp.format("%Y-%m-%d %H:%M:%S");
    match entry.kind {
        EntryKind::User => format!("[{time}] you: {}", entry.content),
        EntryKind::Assistant => {
            let calls = entry
                .tool_calls
                .as_ref()
                .and_then(|v| v.as_array())
                .map_or(0, Vec::len);
            if calls > 0 {
                format!("[{time}] assistant ({calls} tool calls): {}", entry.content)
            } else {
                format!("[{time}] assistant: {}", entry.content)
            }
        }
        EntryKind::ToolCall | EntryKind::ToolResult => {
            let name = entry.tool_call.as_ref().map_or("?", |c| c.name.as_str());
            let status = match &entry.tool_result {
                Some(r) if r.success => "ok",
                Some(_) => "failed",
                None => "pending",
            };
            format!("[{time}] tool {name} ({status})")
        }
    }
}
