//! The model's own task plan: `create_todo_list` and `update_todo_list`.
//!
//! Both tools share one [`TodoList`]; each call returns the rendered list
//! so the plan stays visible in the transcript.

use std::sync::Arc;

use cl_domain::tool::{ToolDefinition, ToolErrorKind, ToolResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::capability::{parse_args, Capability, ToolError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TodoPriority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: String,
    pub content: String,
    pub status: TodoStatus,
    pub priority: TodoPriority,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TodoUpdate {
    pub id: String,
    #[serde(default)]
    pub status: Option<TodoStatus>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub priority: Option<TodoPriority>,
}

#[derive(Debug, Deserialize)]
struct CreateRequest {
    todos: Vec<TodoItem>,
}

#[derive(Debug, Deserialize)]
struct UpdateRequest {
    updates: Vec<TodoUpdate>,
}

#[derive(Default)]
pub struct TodoList {
    items: RwLock<Vec<TodoItem>>,
}

impl TodoList {
    pub fn items(&self) -> Vec<TodoItem> {
        self.items.read().clone()
    }

    pub fn replace(&self, items: Vec<TodoItem>) {
        *self.items.write() = items;
    }

    /// Apply updates in order. Returns the ids that matched no item;
    /// the other updates still apply.
    pub fn apply(&self, updates: &[TodoUpdate]) -> Vec<String> {
        let mut items = self.items.write();
        let mut missing = Vec::new();
        for update in updates {
            let Some(item) = items.iter_mut().find(|i| i.id == update.id) else {
                missing.push(update.id.clone());
                continue;
            };
            if let Some(status) = update.status {
                item.status = status;
            }
            if let Some(content) = &update.content {
                item.content.clone_from(content);
            }
            if let Some(priority) = update.priority {
                item.priority = priority;
            }
        }
        missing
    }

    pub fn render(&self) -> String {
        let items = self.items.read();
        if items.is_empty() {
            return "No todos".to_owned();
        }
        items
            .iter()
            .map(|item| {
                let mark = match item.status {
                    TodoStatus::Completed => "[x]",
                    TodoStatus::InProgress => "[~]",
                    TodoStatus::Pending => "[ ]",
                };
                let priority = match item.priority {
                    TodoPriority::High => "high",
                    TodoPriority::Medium => "medium",
                    TodoPriority::Low => "low",
                };
                format!("{mark} {} ({priority})", item.content)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn item_schema(required: &[&str]) -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "id": {"type": "string", "description": "Unique identifier for the todo item"},
            "content": {"type": "string", "description": "Description of the todo item"},
            "status": {"type": "string", "enum": ["pending", "in_progress", "completed"]},
            "priority": {"type": "string", "enum": ["high", "medium", "low"]}
        },
        "required": required
    })
}

pub struct CreateTodoList {
    list: Arc<TodoList>,
}

impl CreateTodoList {
    pub fn new(list: Arc<TodoList>) -> Self {
        Self { list }
    }
}

#[async_trait::async_trait]
impl Capability for CreateTodoList {
    fn name(&self) -> &str {
        "create_todo_list"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "create_todo_list".into(),
            description: "Create a new todo list for planning and tracking tasks".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "todos": {
                        "type": "array",
                        "description": "Array of todo items",
                        "items": item_schema(&["id", "content", "status", "priority"])
                    }
                },
                "required": ["todos"]
            }),
        }
    }

    async fn invoke(&self, args: Value) -> Result<ToolResult, ToolError> {
        let req: CreateRequest = parse_args(args)?;
        self.list.replace(req.todos);
        Ok(ToolResult::ok(self.list.render()))
    }
}

pub struct UpdateTodoList {
    list: Arc<TodoList>,
}

impl UpdateTodoList {
    pub fn new(list: Arc<TodoList>) -> Self {
        Self { list }
    }
}

#[async_trait::async_trait]
impl Capability for UpdateTodoList {
    fn name(&self) -> &str {
        "update_todo_list"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "update_todo_list".into(),
            description: "Update existing todos in the todo list".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "updates": {
                        "type": "array",
                        "description": "Array of todo updates",
                        "items": item_schema(&["id"])
                    }
                },
                "required": ["updates"]
            }),
        }
    }

    async fn invoke(&self, args: Value) -> Result<ToolResult, ToolError> {
        let req: UpdateRequest = parse_args(args)?;
        let missing = self.list.apply(&req.updates);
        if !missing.is_empty() {
            let mut result = ToolResult::failure(
                ToolErrorKind::ExecutionFailed,
                format!("Todo item(s) not found: {}", missing.join(", ")),
            );
            result.output = Some(self.list.render());
            return Ok(result);
        }
        Ok(ToolResult::ok(self.list.render()))
    }
}
