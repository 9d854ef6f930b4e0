use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Logging
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Log output configuration for the CLI.
///
/// Logs always go to stderr. `RUST_LOG` takes precedence over
/// `log_filter` when set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "d_log_filter")]
    pub log_filter: String,
    /// Emit JSON log lines instead of the compact human format.
    #[serde(default)]
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: d_log_filter(),
            json: false,
        }
    }
}

fn d_log_filter() -> String {
    "warn,cl_agent=info".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_keeps_agent_info() {
        let cfg = ObservabilityConfig::default();
        assert_eq!(cfg.log_filter, "warn,cl_agent=info");
        assert!(!cfg.json);
    }

    #[test]
    fn json_flag_deserializes() {
        let cfg: ObservabilityConfig = serde_json::from_str(r#"{"json": true}"#).unwrap();
        assert!(cfg.json);
        assert_eq!(cfg.log_filter, "warn,cl_agent=info");
    }
}
