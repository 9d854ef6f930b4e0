use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Built-in tools
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Hard timeout for one `bash` invocation (seconds).
    #[serde(default = "d_120")]
    pub bash_timeout_sec: u64,
    /// Output beyond this many chars is truncated before reaching the model.
    #[serde(default = "d_100000")]
    pub max_output_chars: usize,
    /// Maximum matches returned by `search`.
    #[serde(default = "d_50")]
    pub search_max_results: usize,
    /// Ask before `bash`, `create_file`, and `str_replace_editor` run in the
    /// interactive chat. One-shot `run` never asks.
    #[serde(default = "d_true")]
    pub confirm_mutations: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            bash_timeout_sec: 120,
            max_output_chars: 100_000,
            search_max_results: 50,
            confirm_mutations: true,
        }
    }
}

fn d_120() -> u64 {
    120
}
fn d_100000() -> usize {
    100_000
}
fn d_50() -> usize {
    50
}
fn d_true() -> bool {
    true
}
