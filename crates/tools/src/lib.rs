//! Local capabilities the model can invoke.
//!
//! Every tool implements [`Capability`]; the [`ToolRegistry`] maps the
//! names the model sees to implementations. Built-ins:
//! - `bash`: run a shell command in the session working directory
//! - `view_file` / `create_file` / `str_replace_editor`: workspace file I/O
//! - `search`: file-name and content search
//! - `create_todo_list` / `update_todo_list`: the model's task plan

pub mod bash;
pub mod capability;
pub mod file_ops;
pub mod registry;
pub mod search;
pub mod todo;

use std::path::Path;
use std::sync::Arc;

use cl_domain::config::ToolsConfig;

pub use capability::{parse_args, Capability, ToolError};
pub use registry::{ToolRegistry, EXTERNAL_TOOL_PREFIX};

/// Registry holding every built-in capability rooted at `workdir`.
pub fn builtin_registry(workdir: &Path, cfg: &ToolsConfig) -> ToolRegistry {
    let todos = Arc::new(todo::TodoList::default());
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(file_ops::ViewFile::new(workdir)));
    registry.register(Arc::new(file_ops::CreateFile::new(workdir)));
    registry.register(Arc::new(file_ops::StrReplaceEditor::new(workdir)));
    registry.register(Arc::new(bash::BashTool::new(workdir, cfg)));
    registry.register(Arc::new(search::SearchTool::new(workdir, cfg)));
    registry.register(Arc::new(todo::CreateTodoList::new(todos.clone())));
    registry.register(Arc::new(todo::UpdateTodoList::new(todos)));
    registry
}
