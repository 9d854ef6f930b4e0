//! Conversation persistence for codeloop.
//!
//! The agent only sees the [`ChatStore`] contract (append / load / clear).
//! Transcripts are append-only JSONL files, one per working directory.

pub mod session_key;
pub mod store;
pub mod transcript;

pub use session_key::session_id_for_workdir;
pub use store::{ChatStore, MemoryChatStore};
pub use transcript::JsonlChatStore;
