use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Agent loop
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Upper bound on tool rounds per user turn.
    #[serde(default = "d_400")]
    pub max_tool_rounds: usize,
    /// Append every completed entry to the session transcript.
    #[serde(default = "d_true")]
    pub persist_session: bool,
    /// Rehydrate the conversation from the transcript at startup.
    #[serde(default = "d_true")]
    pub auto_restore_session: bool,
    /// Optional project instructions appended to the system prompt.
    #[serde(default = "d_instructions")]
    pub instructions_file: PathBuf,
    /// Buffer size of the chunk channel of a streamed turn.
    #[serde(default = "d_64")]
    pub stream_channel_capacity: usize,
    #[serde(default)]
    pub summary: SummaryConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: 400,
            persist_session: true,
            auto_restore_session: true,
            instructions_file: d_instructions(),
            stream_channel_capacity: 64,
            summary: SummaryConfig::default(),
        }
    }
}

/// Fallback answer synthesis for models that go quiet after tool use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryConfig {
    #[serde(default = "d_true")]
    pub enabled: bool,
    /// Final answers shorter than this (in chars) trigger the fallback.
    #[serde(default = "d_150")]
    pub min_chars: usize,
    /// Model id prefixes of models that answer tersely after tool use.
    #[serde(default = "d_terse_prefixes")]
    pub terse_model_prefixes: Vec<String>,
    /// Header prepended to every synthesized answer.
    #[serde(default = "d_header")]
    pub header: String,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_chars: 150,
            terse_model_prefixes: d_terse_prefixes(),
            header: d_header(),
        }
    }
}

impl SummaryConfig {
    /// Whether `model` belongs to the terse (reasoning) model class.
    pub fn is_terse_model(&self, model: &str) -> bool {
        let model = model.to_ascii_lowercase();
        self.terse_model_prefixes
            .iter()
            .any(|p| model.starts_with(&p.to_ascii_lowercase()))
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_400() -> usize {
    400
}
fn d_64() -> usize {
    64
}
fn d_150() -> usize {
    150
}
fn d_true() -> bool {
    true
}
fn d_instructions() -> PathBuf {
    PathBuf::from(".codeloop/instructions.md")
}
fn d_terse_prefixes() -> Vec<String> {
    vec!["o1".into(), "o3".into(), "gpt-5".into()]
}
fn d_header() -> String {
    "**Summary**".into()
}
