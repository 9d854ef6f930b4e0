//! File tools constrained to the session working directory.
//!
//! Every path goes through [`resolve_in_workspace`]: relative paths are
//! joined onto the root, absolute paths are accepted only when they already
//! point inside it, and `..` components are rejected outright.

use std::path::{Component, Path, PathBuf};

use cl_domain::tool::{ToolDefinition, ToolErrorKind, ToolResult};
use serde::Deserialize;
use serde_json::Value;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::capability::{parse_args, Capability, ToolError};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Deserialize)]
pub struct ViewFileRequest {
    pub path: String,
    /// First line to show (1-based, inclusive).
    #[serde(default)]
    pub start_line: Option<usize>,
    /// Last line to show (1-based, inclusive).
    #[serde(default)]
    pub end_line: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateFileRequest {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StrReplaceRequest {
    pub path: String,
    pub old_str: String,
    pub new_str: String,
    #[serde(default)]
    pub replace_all: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Path validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Validate and resolve a requested path within a workspace root.
///
/// Paths that do not exist yet are resolved through their nearest existing
/// ancestor, so new files in new directories validate too.
pub fn resolve_in_workspace(workspace_root: &Path, requested: &str) -> Result<PathBuf, String> {
    let requested_path = Path::new(requested);
    if requested_path
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err("path must not contain '..' components".to_owned());
    }

    let canonical_root = workspace_root.canonicalize().map_err(|e| {
        format!(
            "cannot resolve workspace root '{}': {e}",
            workspace_root.display()
        )
    })?;

    let candidate = if requested_path.is_absolute() {
        requested_path.to_path_buf()
    } else {
        canonical_root.join(requested_path)
    };

    let resolved = if candidate.exists() {
        candidate
            .canonicalize()
            .map_err(|e| format!("cannot resolve path '{}': {e}", candidate.display()))?
    } else {
        let mut existing = candidate.as_path();
        let mut tail_parts: Vec<&std::ffi::OsStr> = Vec::new();
        while !existing.exists() {
            match existing.parent() {
                Some(parent) => {
                    if let Some(file_name) = existing.file_name() {
                        tail_parts.push(file_name);
                    }
                    existing = parent;
                }
                None => break,
            }
        }
        let mut resolved = existing
            .canonicalize()
            .map_err(|e| format!("cannot resolve ancestor of '{}': {e}", candidate.display()))?;
        for part in tail_parts.into_iter().rev() {
            resolved.push(part);
        }
        resolved
    };

    if !resolved.starts_with(&canonical_root) {
        return Err(format!(
            "path '{}' resolves outside workspace root '{}'",
            requested,
            canonical_root.display()
        ));
    }

    Ok(resolved)
}

fn path_failure(msg: String) -> ToolResult {
    ToolResult::failure(ToolErrorKind::ExecutionFailed, msg)
}

/// Atomic write: uniquely-named `.tmp` sibling, sync, rename into place.
async fn write_atomic(path: &Path, content: &str) -> Result<(), ToolError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let tmp_name = format!(
        ".{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        uuid::Uuid::new_v4().as_simple()
    );
    let tmp_path = path.with_file_name(tmp_name);

    let mut file = fs::File::create(&tmp_path).await?;
    file.write_all(content.as_bytes()).await?;
    file.flush().await?;
    file.sync_data().await?;
    drop(file);

    if let Err(e) = fs::rename(&tmp_path, path).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(ToolError::Failed(format!(
            "failed to rename temp file into place: {e}"
        )));
    }
    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// view_file
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct ViewFile {
    root: PathBuf,
}

impl ViewFile {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }
}

async fn list_dir(path: &Path, shown: &str) -> Result<ToolResult, ToolError> {
    let mut read_dir = fs::read_dir(path).await?;
    let mut names = Vec::new();
    while let Some(entry) = read_dir.next_entry().await? {
        let mut name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type().await?.is_dir() {
            name.push('/');
        }
        names.push(name);
    }
    names.sort();
    Ok(ToolResult::ok(format!(
        "Directory contents of {shown}:\n{}",
        names.join("\n")
    )))
}

#[async_trait::async_trait]
impl Capability for ViewFile {
    fn name(&self) -> &str {
        "view_file"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "view_file".into(),
            description: "View contents of a file or list directory contents".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": "Path to file or directory to view"},
                    "start_line": {"type": "number", "description": "Starting line number for partial file view (optional)"},
                    "end_line": {"type": "number", "description": "Ending line number for partial file view (optional)"}
                },
                "required": ["path"]
            }),
        }
    }

    async fn invoke(&self, args: Value) -> Result<ToolResult, ToolError> {
        let req: ViewFileRequest = parse_args(args)?;
        let path = match resolve_in_workspace(&self.root, &req.path) {
            Ok(p) => p,
            Err(e) => return Ok(path_failure(e)),
        };

        let meta = match fs::metadata(&path).await {
            Ok(m) => m,
            Err(_) => return Ok(path_failure(format!("File or directory not found: {}", req.path))),
        };
        if meta.is_dir() {
            return list_dir(&path, &req.path).await;
        }

        let content = fs::read_to_string(&path).await?;
        let lines: Vec<&str> = content.lines().collect();
        let total = lines.len();
        let start = req.start_line.unwrap_or(1).max(1);
        let end = req.end_line.unwrap_or(total).min(total);
        if start > end && total > 0 {
            return Ok(ToolResult::failure(
                ToolErrorKind::InvalidArguments,
                format!("invalid line range {start}-{end} for a file of {total} lines"),
            ));
        }

        let numbered: Vec<String> = lines
            .iter()
            .enumerate()
            .skip(start - 1)
            .take(end.saturating_sub(start - 1))
            .map(|(i, line)| format!("{}: {line}", i + 1))
            .collect();

        let header = if req.start_line.is_some() || req.end_line.is_some() {
            format!("Lines {start}-{end} of {}", req.path)
        } else {
            format!("Contents of {}", req.path)
        };
        Ok(ToolResult::ok(format!("{header}:\n{}", numbered.join("\n"))))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// create_file
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct CreateFile {
    root: PathBuf,
}

impl CreateFile {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }
}

#[async_trait::async_trait]
impl Capability for CreateFile {
    fn name(&self) -> &str {
        "create_file"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "create_file".into(),
            description: "Create a new file with specified content".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": "Path where the file should be created"},
                    "content": {"type": "string", "description": "Content to write to the file"}
                },
                "required": ["path", "content"]
            }),
        }
    }

    async fn invoke(&self, args: Value) -> Result<ToolResult, ToolError> {
        let req: CreateFileRequest = parse_args(args)?;
        let path = match resolve_in_workspace(&self.root, &req.path) {
            Ok(p) => p,
            Err(e) => return Ok(path_failure(e)),
        };
        if path.is_dir() {
            return Ok(path_failure(format!("{} is a directory", req.path)));
        }

        write_atomic(&path, &req.content).await?;
        let lines = req.content.lines().count();
        Ok(ToolResult::ok(format!(
            "Created {} ({lines} lines, {} bytes)",
            req.path,
            req.content.len()
        )))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// str_replace_editor
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct StrReplaceEditor {
    root: PathBuf,
}

impl StrReplaceEditor {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }
}

#[async_trait::async_trait]
impl Capability for StrReplaceEditor {
    fn name(&self) -> &str {
        "str_replace_editor"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "str_replace_editor".into(),
            description: "Replace specific text in a file. Use this for single line edits only".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": "Path to the file to edit"},
                    "old_str": {"type": "string", "description": "Text to replace (must match exactly)"},
                    "new_str": {"type": "string", "description": "Text to replace with"},
                    "replace_all": {"type": "boolean", "description": "Replace all occurrences (default: false, only replaces first occurrence)"}
                },
                "required": ["path", "old_str", "new_str"]
            }),
        }
    }

    async fn invoke(&self, args: Value) -> Result<ToolResult, ToolError> {
        let req: StrReplaceRequest = parse_args(args)?;
        if req.old_str.is_empty() {
            return Err(ToolError::InvalidArguments("old_str must not be empty".into()));
        }
        let path = match resolve_in_workspace(&self.root, &req.path) {
            Ok(p) => p,
            Err(e) => return Ok(path_failure(e)),
        };
        let content = match fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(_) => return Ok(path_failure(format!("File not found: {}", req.path))),
        };

        let occurrences = content.matches(req.old_str.as_str()).count();
        if occurrences == 0 {
            return Ok(path_failure(format!(
                "String not found in {}: {}",
                req.path, req.old_str
            )));
        }

        let (updated, replaced) = if req.replace_all {
            (content.replace(&req.old_str, &req.new_str), occurrences)
        } else {
            (content.replacen(&req.old_str, &req.new_str, 1), 1)
        };
        write_atomic(&path, &updated).await?;

        Ok(ToolResult::ok(format!(
            "Updated {}: replaced {replaced} of {occurrences} occurrence(s)",
            req.path
        )))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
