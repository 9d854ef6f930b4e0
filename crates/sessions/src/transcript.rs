//! Append-only JSONL transcripts.
//!
//! Each session gets a `<sessionId>.jsonl` file under the sessions
//! directory, one [`ChatEntry`] per line. An in-memory write-through cache
//! avoids re-reading the file, and disk I/O runs on the blocking pool.

use std::path::{Path, PathBuf};

use cl_domain::chat::ChatEntry;
use cl_domain::error::{Error, Result};
use cl_domain::trace::TraceEvent;
use parking_lot::RwLock;

use crate::store::ChatStore;

pub struct JsonlChatStore {
    session_id: String,
    path: PathBuf,
    cache: RwLock<Option<Vec<ChatEntry>>>,
}

impl JsonlChatStore {
    /// Open (lazily) the transcript of `session_id` under `base_dir`.
    /// The directory is created on first append.
    pub fn new(base_dir: &Path, session_id: &str) -> Self {
        Self {
            session_id: session_id.to_owned(),
            path: base_dir.join(format!("{session_id}.jsonl")),
            cache: RwLock::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

#[async_trait::async_trait]
impl ChatStore for JsonlChatStore {
    async fn append(&self, entry: &ChatEntry) -> Result<()> {
        let mut buf = serde_json::to_string(entry)
            .map_err(|e| Error::Store(format!("serializing chat entry: {e}")))?;
        buf.push('\n');
        let path = self.path.clone();

        // Write to disk first; only update the cache if I/O succeeds.
        tokio::task::spawn_blocking(move || append_line(&path, &buf))
            .await
            .map_err(|e| Error::Other(format!("spawn_blocking join: {e}")))??;

        if let Some(entries) = self.cache.write().as_mut() {
            entries.push(entry.clone());
        }

        TraceEvent::TranscriptAppend {
            session_id: self.session_id.clone(),
            lines: 1,
        }
        .emit();

        Ok(())
    }

    async fn load_history(&self) -> Result<Vec<ChatEntry>> {
        if let Some(entries) = self.cache.read().as_ref() {
            return Ok(entries.clone());
        }

        let path = self.path.clone();
        let sid = self.session_id.clone();
        let entries = tokio::task::spawn_blocking(move || read_jsonl_file(&path, &sid))
            .await
            .map_err(|e| Error::Other(format!("spawn_blocking join: {e}")))??;

        *self.cache.write() = Some(entries.clone());
        Ok(entries)
    }

    async fn clear(&self) -> Result<()> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        })
        .await
        .map_err(|e| Error::Other(format!("spawn_blocking join: {e}")))??;

        *self.cache.write() = Some(Vec::new());
        tracing::info!(session_id = %self.session_id, "transcript cleared");
        Ok(())
    }
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    use std::io::Write;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    file.write_all(line.as_bytes())?;
    Ok(())
}

/// Read and parse a JSONL transcript file. Unparsable lines are skipped.
fn read_jsonl_file(path: &Path, session_id: &str) -> Result<Vec<ChatEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let raw = std::fs::read_to_string(path)?;
    let mut entries = Vec::new();
    for line in raw.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ChatEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                tracing::warn!(
                    session_id = session_id,
                    error = %e,
                    "skipping malformed transcript line"
                );
            }
        }
    }
    Ok(entries)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use cl_domain::chat::EntryKind;
    use cl_domain::tool::{ToolCallRequest, ToolResult};

    #[tokio::test]
    async fn append_then_reload_from_fresh_store() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("sessions");

        let store = JsonlChatStore::new(&base, "abc");
        store.append(&ChatEntry::user("hello")).await.unwrap();
        let call = ToolCallRequest::new("c1", "bash", r#"{"command":"ls"}"#);
        store
            .append(&ChatEntry::assistant_with_tools("", std::slice::from_ref(&call)))
            .await
            .unwrap();
        store
            .append(&ChatEntry::tool_result(&call, ToolResult::ok("file.txt")))
            .await
            .unwrap();

        let reopened = JsonlChatStore::new(&base, "abc");
        let entries = reopened.load_history().await.unwrap();
        let kinds: Vec<EntryKind> = entries.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![EntryKind::User, EntryKind::Assistant, EntryKind::ToolResult]
        );
        assert_eq!(entries[2].tool_call.as_ref().unwrap().id, "c1");
        assert_eq!(entries[1].tool_calls.as_ref().unwrap()[0]["function"]["name"], "bash");
    }

    #[tokio::test]
    async fn malformed_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlChatStore::new(dir.path(), "s");
        store.append(&ChatEntry::user("one")).await.unwrap();
        std::fs::OpenOptions::new()
            .append(true)
            .open(store.path())
            .and_then(|mut f| std::io::Write::write_all(&mut f, b"{garbage\n\n"))
            .unwrap();
        store.append(&ChatEntry::assistant("two")).await.unwrap();

        let entries = JsonlChatStore::new(dir.path(), "s").load_history().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].content, "two");
    }

    #[tokio::test]
    async fn cache_tracks_appends_after_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlChatStore::new(dir.path(), "s");
        assert!(store.load_history().await.unwrap().is_empty());

        store.append(&ChatEntry::user("later")).await.unwrap();
        let entries = store.load_history().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].content, "later");
    }

    #[tokio::test]
    async fn clear_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlChatStore::new(dir.path(), "s");
        store.append(&ChatEntry::user("x")).await.unwrap();
        assert!(store.path().exists());

        store.clear().await.unwrap();
        assert!(!store.path().exists());
        assert!(store.load_history().await.unwrap().is_empty());
        // Clearing twice is fine.
        store.clear().await.unwrap();
    }
}
