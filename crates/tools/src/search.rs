//! `search` tool: find files by name and text by content.
//!
//! The walk runs on the blocking pool. Hidden entries are skipped unless
//! asked for, and well-known build/vendor directories are always skipped.

use std::path::{Path, PathBuf};

use cl_domain::config::ToolsConfig;
use cl_domain::tool::{ToolDefinition, ToolResult};
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use serde_json::Value;

use crate::capability::{parse_args, truncate_output, Capability, ToolError};

const SKIPPED_DIRS: &[&str] = &["node_modules", "target", ".git", "dist", "build"];

/// Files larger than this are not scanned for text.
const MAX_SCAN_BYTES: u64 = 2 * 1024 * 1024;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    Text,
    Files,
    #[default]
    Both,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub search_type: SearchType,
    #[serde(default)]
    pub include_pattern: Option<String>,
    #[serde(default)]
    pub exclude_pattern: Option<String>,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default)]
    pub whole_word: bool,
    #[serde(default)]
    pub regex: bool,
    #[serde(default)]
    pub max_results: Option<usize>,
    #[serde(default)]
    pub file_types: Vec<String>,
    #[serde(default)]
    pub include_hidden: bool,
}

pub struct SearchTool {
    root: PathBuf,
    max_results: usize,
    max_output_chars: usize,
}

impl SearchTool {
    pub fn new(root: &Path, cfg: &ToolsConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            max_results: cfg.search_max_results,
            max_output_chars: cfg.max_output_chars,
        }
    }
}

struct Filters {
    include: Option<glob::Pattern>,
    exclude: Option<glob::Pattern>,
    file_types: Vec<String>,
    include_hidden: bool,
}

impl Filters {
    fn from_request(req: &SearchRequest) -> Result<Self, ToolError> {
        let compile = |p: &Option<String>| -> Result<Option<glob::Pattern>, ToolError> {
            p.as_deref()
                .map(|s| {
                    glob::Pattern::new(s)
                        .map_err(|e| ToolError::InvalidArguments(format!("bad glob '{s}': {e}")))
                })
                .transpose()
        };
        Ok(Self {
            include: compile(&req.include_pattern)?,
            exclude: compile(&req.exclude_pattern)?,
            file_types: req
                .file_types
                .iter()
                .map(|t| t.trim_start_matches('.').to_owned())
                .collect(),
            include_hidden: req.include_hidden,
        })
    }

    fn skip_dir(&self, name: &str, rel: &str) -> bool {
        SKIPPED_DIRS.contains(&name)
            || (!self.include_hidden && name.starts_with('.'))
            || self
                .exclude
                .as_ref()
                .is_some_and(|p| p.matches(name) || p.matches(rel))
    }

    fn accept_file(&self, name: &str, rel: &str) -> bool {
        if !self.include_hidden && name.starts_with('.') {
            return false;
        }
        if let Some(p) = &self.exclude {
            if p.matches(name) || p.matches(rel) {
                return false;
            }
        }
        if let Some(p) = &self.include {
            if !(p.matches(name) || p.matches(rel)) {
                return false;
            }
        }
        if !self.file_types.is_empty() {
            let ext = Path::new(name)
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default();
            if !self.file_types.iter().any(|t| t == ext) {
                return false;
            }
        }
        true
    }
}

fn build_matcher(req: &SearchRequest) -> Result<Regex, ToolError> {
    let mut pattern = if req.regex {
        req.query.clone()
    } else {
        regex::escape(&req.query)
    };
    if req.whole_word {
        pattern = format!(r"\b(?:{pattern})\b");
    }
    RegexBuilder::new(&pattern)
        .case_insensitive(!req.case_sensitive)
        .build()
        .map_err(|e| ToolError::InvalidArguments(format!("bad pattern: {e}")))
}

/// Depth-first walk collecting workspace-relative file paths, sorted.
fn collect_files(root: &Path, filters: &Filters) -> Vec<(PathBuf, String)> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(read_dir) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in read_dir.flatten() {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            let rel = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .to_string_lossy()
                .into_owned();
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                if !filters.skip_dir(&name, &rel) {
                    stack.push(path);
                }
            } else if file_type.is_file() && filters.accept_file(&name, &rel) {
                out.push((path, rel));
            }
        }
    }
    out.sort_by(|a, b| a.1.cmp(&b.1));
    out
}

fn run_search(root: &Path, req: &SearchRequest, limit: usize) -> Result<String, ToolError> {
    let filters = Filters::from_request(req)?;
    let matcher = build_matcher(req)?;
    let files = collect_files(root, &filters);

    let mut sections = Vec::new();

    if matches!(req.search_type, SearchType::Files | SearchType::Both) {
        let needle = req.query.to_lowercase();
        let hits: Vec<&str> = files
            .iter()
            .map(|(_, rel)| rel.as_str())
            .filter(|rel| {
                if req.regex {
                    matcher.is_match(rel)
                } else {
                    rel.to_lowercase().contains(&needle)
                }
            })
            .take(limit)
            .collect();
        if !hits.is_empty() {
            sections.push(format!("Files:\n{}", hits.join("\n")));
        }
    }

    if matches!(req.search_type, SearchType::Text | SearchType::Both) {
        let mut hits = Vec::new();
        'files: for (path, rel) in &files {
            if std::fs::metadata(path).map_or(true, |m| m.len() > MAX_SCAN_BYTES) {
                continue;
            }
            // Binary or non-UTF-8 files are skipped.
            let Ok(content) = std::fs::read_to_string(path) else {
                continue;
            };
            for (i, line) in content.lines().enumerate() {
                if matcher.is_match(line) {
                    hits.push(format!("{rel}:{}: {}", i + 1, line.trim()));
                    if hits.len() >= limit {
                        break 'files;
                    }
                }
            }
        }
        if !hits.is_empty() {
            sections.push(format!("Matches:\n{}", hits.join("\n")));
        }
    }

    if sections.is_empty() {
        return Ok(format!("No results found for \"{}\"", req.query));
    }
    Ok(sections.join("\n\n"))
}

#[async_trait::async_trait]
impl Capability for SearchTool {
    fn name(&self) -> &str {
        "search"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "search".into(),
            description: "Unified search tool for finding text content or files".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Text to search for or file name/path pattern"},
                    "search_type": {
                        "type": "string",
                        "enum": ["text", "files", "both"],
                        "description": "Type of search: 'text' for content search, 'files' for file names, 'both' for both (default: 'both')"
                    },
                    "include_pattern": {"type": "string", "description": "Glob pattern for files to include (e.g. '*.rs')"},
                    "exclude_pattern": {"type": "string", "description": "Glob pattern for files to exclude (e.g. '*.log')"},
                    "case_sensitive": {"type": "boolean", "description": "Whether search should be case sensitive (default: false)"},
                    "whole_word": {"type": "boolean", "description": "Whether to match whole words only (default: false)"},
                    "regex": {"type": "boolean", "description": "Whether query is a regex pattern (default: false)"},
                    "max_results": {"type": "number", "description": "Maximum number of results to return (default: 50)"},
                    "file_types": {"type": "array", "items": {"type": "string"}, "description": "File types to search (e.g. ['rs', 'toml'])"},
                    "include_hidden": {"type": "boolean", "description": "Whether to include hidden files (default: false)"}
                },
                "required": ["query"]
            }),
        }
    }

    async fn invoke(&self, args: Value) -> Result<ToolResult, ToolError> {
        let req: SearchRequest = parse_args(args)?;
        if req.query.is_empty() {
            return Err(ToolError::InvalidArguments("query must not be empty".into()));
        }
        let limit = req.max_results.unwrap_or(self.max_results).max(1);
        let root = self.root.clone();

        let text = tokio::task::spawn_blocking(move || run_search(&root, &req, limit))
            .await
            .map_err(|e| ToolError::Failed(format!("search task failed: {e}")))??;

        Ok(ToolResult::ok(truncate_output(text, self.max_output_chars)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        std::fs::create_dir_all(root.join(".hidden")).unwrap();
        std::fs::write(root.join("src/main.rs"), "fn main() {\n    run_agent();\n}\n").unwrap();
        std::fs::write(root.join("src/agent.rs"), "pub fn run_agent() {}\n").unwrap();
        std::fs::write(root.join("notes.md"), "Agent notes\n").unwrap();
        std::fs::write(root.join("node_modules/pkg/index.js"), "run_agent()\n").unwrap();
        std::fs::write(root.join(".hidden/secret.rs"), "run_agent\n").unwrap();
        dir
    }

    async fn search(root: &Path, args: Value) -> String {
        SearchTool::new(root, &ToolsConfig::default())
            .invoke(args)
            .await
            .unwrap()
            .output
            .unwrap()
    }

    #[tokio::test]
    async fn text_search_skips_vendor_and_hidden() {
        let dir = fixture();
        let out = search(
            dir.path(),
            serde_json::json!({"query": "run_agent", "search_type": "text"}),
        )
        .await;
        assert_eq!(
            out,
            "Matches:\nsrc/agent.rs:1: pub fn run_agent() {}\nsrc/main.rs:2: run_agent();"
        );
    }

    #[tokio::test]
    async fn file_search_is_case_insensitive_by_default() {
        let dir = fixture();
        let out = search(
            dir.path(),
            serde_json::json!({"query": "AGENT", "search_type": "files"}),
        )
        .await;
        assert_eq!(out, "Files:\nsrc/agent.rs");
    }

    #[tokio::test]
    async fn file_type_and_whole_word_filters() {
        let dir = fixture();
        let out = search(
            dir.path(),
            serde_json::json!({
                "query": "agent",
                "search_type": "text",
                "whole_word": true,
                "file_types": ["md"]
            }),
        )
        .await;
        assert_eq!(out, "Matches:\nnotes.md:1: Agent notes");
    }

    #[tokio::test]
    async fn no_results_message() {
        let dir = fixture();
        let out = search(dir.path(), serde_json::json!({"query": "zzz_nothing"})).await;
        assert_eq!(out, "No results found for \"zzz_nothing\"");
    }

    #[tokio::test]
    async fn invalid_regex_is_rejected() {
        let dir = fixture();
        let err = SearchTool::new(dir.path(), &ToolsConfig::default())
            .invoke(serde_json::json!({"query": "(", "regex": true}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
