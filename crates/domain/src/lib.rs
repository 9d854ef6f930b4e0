//! Shared types for codeloop: conversation messages, tool calls and
//! results, UI-facing chat entries and stream chunks, configuration,
//! errors, and structured trace events.

pub mod chat;
pub mod config;
pub mod error;
pub mod stream;
pub mod tool;
pub mod trace;
