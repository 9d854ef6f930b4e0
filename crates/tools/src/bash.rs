//! `bash` tool: run a shell command in the session working directory.
//!
//! A bare `cd <dir>` changes the directory later commands run in; anything
//! else is handed to `sh -c` with a hard timeout and combined output capped
//! at `max_output_chars`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use cl_domain::config::ToolsConfig;
use cl_domain::tool::{ToolDefinition, ToolErrorKind, ToolResult};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use tokio::process::Command;

use crate::capability::{parse_args, truncate_output, Capability, ToolError};

#[derive(Debug, Clone, Deserialize)]
pub struct BashRequest {
    pub command: String,
    /// Override the configured timeout (seconds).
    #[serde(default)]
    pub timeout_sec: Option<u64>,
}

pub struct BashTool {
    cwd: Mutex<PathBuf>,
    timeout_sec: u64,
    max_output_chars: usize,
}

impl BashTool {
    pub fn new(workdir: &Path, cfg: &ToolsConfig) -> Self {
        Self {
            cwd: Mutex::new(workdir.to_path_buf()),
            timeout_sec: cfg.bash_timeout_sec,
            max_output_chars: cfg.max_output_chars,
        }
    }

    pub fn current_dir(&self) -> PathBuf {
        self.cwd.lock().clone()
    }

    fn change_dir(&self, target: &str) -> ToolResult {
        let target = target.trim().trim_matches(|c| c == '"' || c == '\'');
        let candidate = {
            let cwd = self.cwd.lock();
            cwd.join(target)
        };
        match candidate.canonicalize() {
            Ok(dir) if dir.is_dir() => {
                let msg = format!("Changed directory to: {}", dir.display());
                *self.cwd.lock() = dir;
                ToolResult::ok(msg)
            }
            Ok(dir) => ToolResult::failure(
                ToolErrorKind::ExecutionFailed,
                format!("Cannot change directory: {} is not a directory", dir.display()),
            ),
            Err(e) => ToolResult::failure(
                ToolErrorKind::ExecutionFailed,
                format!("Cannot change directory: {e}"),
            ),
        }
    }
}

/// `cd foo` but not `cd foo && make`.
fn bare_cd_target(command: &str) -> Option<&str> {
    let rest = command.trim().strip_prefix("cd ")?;
    if rest.contains(['&', ';', '|', '\n']) {
        return None;
    }
    Some(rest)
}

#[async_trait::async_trait]
impl Capability for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "bash".into(),
            description: "Execute a bash command".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "command": {
                        "type": "string",
                        "description": "The bash command to execute"
                    }
                },
                "required": ["command"]
            }),
        }
    }

    async fn invoke(&self, args: Value) -> Result<ToolResult, ToolError> {
        let req: BashRequest = parse_args(args)?;
        if req.command.trim().is_empty() {
            return Err(ToolError::InvalidArguments("command must not be empty".into()));
        }
        if let Some(target) = bare_cd_target(&req.command) {
            return Ok(self.change_dir(target));
        }

        let timeout_sec = req.timeout_sec.unwrap_or(self.timeout_sec);
        let cwd = self.current_dir();

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(&req.command);
        cmd.current_dir(&cwd);
        cmd.stdin(std::process::Stdio::null());
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());
        cmd.kill_on_drop(true);

        let child = match cmd.spawn() {
            Ok(c) => c,
            Err(e) => {
                return Ok(ToolResult::failure(
                    ToolErrorKind::ExecutionFailed,
                    format!("failed to spawn: {e}"),
                ))
            }
        };

        // Dropping the child on timeout kills it.
        let output = match tokio::time::timeout(
            Duration::from_secs(timeout_sec),
            child.wait_with_output(),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                tracing::debug!(command = %req.command, timeout_sec, "bash command timed out");
                return Ok(ToolResult::failure(
                    ToolErrorKind::ExecutionFailed,
                    format!("Command timed out after {timeout_sec}s"),
                ));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();

        if output.status.success() {
            let mut text = if stdout.is_empty() {
                "Command executed successfully (no output)".to_owned()
            } else {
                stdout
            };
            if !stderr.is_empty() {
                text.push_str("\n[stderr]\n");
                text.push_str(&stderr);
            }
            return Ok(ToolResult::ok(truncate_output(text, self.max_output_chars)));
        }

        let code = output
            .status
            .code()
            .map_or_else(|| "signal".to_owned(), |c| c.to_string());
        let mut result = ToolResult::failure(
            ToolErrorKind::ExecutionFailed,
            truncate_output(
                format!("Command failed (exit {code}): {stderr}"),
                self.max_output_chars,
            ),
        );
        if !stdout.is_empty() {
            result.output = Some(truncate_output(stdout, self.max_output_chars));
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(dir: &Path) -> BashTool {
        BashTool::new(dir, &ToolsConfig::default())
    }

    #[tokio::test]
    async fn runs_in_workdir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "x").unwrap();
        let result = tool(dir.path())
            .invoke(serde_json::json!({"command": "ls"}))
            .await
            .unwrap();
        assert!(result.success);
        assert!(result.output.unwrap().contains("marker.txt"));
    }

    #[tokio::test]
    async fn non_zero_exit_is_a_failure_result() {
        let dir = tempfile::tempdir().unwrap();
        let result = tool(dir.path())
            .invoke(serde_json::json!({"command": "echo oops >&2; exit 3"}))
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ToolErrorKind::ExecutionFailed));
        let err = result.error.unwrap();
        assert!(err.contains("exit 3"));
        assert!(err.contains("oops"));
    }

    #[tokio::test]
    async fn empty_output_gets_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let result = tool(dir.path())
            .invoke(serde_json::json!({"command": "true"}))
            .await
            .unwrap();
        assert_eq!(
            result.output.as_deref(),
            Some("Command executed successfully (no output)")
        );
    }

    #[tokio::test]
    async fn timeout_kills_command() {
        let dir = tempfile::tempdir().unwrap();
        let result = tool(dir.path())
            .invoke(serde_json::json!({"command": "sleep 5", "timeout_sec": 1}))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn bare_cd_changes_directory_for_later_commands() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/inner.txt"), "x").unwrap();
        let bash = tool(dir.path());

        let cd = bash
            .invoke(serde_json::json!({"command": "cd sub"}))
            .await
            .unwrap();
        assert!(cd.success);

        let ls = bash
            .invoke(serde_json::json!({"command": "ls"}))
            .await
            .unwrap();
        assert!(ls.output.unwrap().contains("inner.txt"));

        let bad = bash
            .invoke(serde_json::json!({"command": "cd does-not-exist"}))
            .await
            .unwrap();
        assert!(!bad.success);
    }

    #[tokio::test]
    async fn missing_command_is_invalid_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let err = tool(dir.path()).invoke(serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[test]
    fn compound_cd_is_not_bare() {
        assert_eq!(bare_cd_target("cd src"), Some("src"));
        assert_eq!(bare_cd_target("cd src && ls"), None);
        assert_eq!(bare_cd_target("ls"), None);
    }
}
