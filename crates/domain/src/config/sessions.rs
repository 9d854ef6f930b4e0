use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session transcripts
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Directory holding one `<session_id>.jsonl` per working directory.
    #[serde(default = "d_sessions_dir")]
    pub dir: PathBuf,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            dir: d_sessions_dir(),
        }
    }
}

fn d_sessions_dir() -> PathBuf {
    PathBuf::from(".codeloop/sessions")
}
