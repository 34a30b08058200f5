//! In-memory todo list tool.

use std::sync::{Arc, OnceLock, RwLock};

use chrono::{DateTime, Utc};
use ordino_core::{FieldType, InputSchema, JsonMap, Tool, ToolResult};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

/// A single task in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TodoItem {
    fn new(title: String, description: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title,
            description,
            completed: false,
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}

/// Task list with add, list, complete, and delete operations.
///
/// Handles to the same store share state: [`TodoStore::shared`] hands out
/// the process-global instance every run in a server sees, while
/// [`TodoStore::new`] creates an isolated list for embedding and tests.
/// Items keep insertion order.
///
/// `add` appends unconditionally, so a completed `add` would duplicate if
/// its plan were executed again from the top; it answers `false` to
/// [`Tool::replay_safe`]. The read and idempotent operations answer true.
#[derive(Default, Clone)]
pub struct TodoStore {
    todos: Arc<RwLock<Vec<TodoItem>>>,
}

impl TodoStore {
    /// An isolated store with its own empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the process-global store shared by every run.
    pub fn shared() -> Self {
        static SHARED: OnceLock<TodoStore> = OnceLock::new();
        SHARED.get_or_init(TodoStore::new).clone()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<TodoItem>> {
        self.todos.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<TodoItem>> {
        self.todos.write().unwrap_or_else(|e| e.into_inner())
    }

    fn add(&self, input: &JsonMap) -> ToolResult {
        let title = input
            .get("title")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .unwrap_or_default();
        if title.is_empty() {
            return ToolResult::failure("'title' is required for add operation");
        }

        let description = input
            .get("description")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        let todo = TodoItem::new(title.to_string(), description.to_string());
        self.write().push(todo.clone());

        ToolResult::success(json!({
            "message": "Todo added successfully",
            "todo": todo,
        }))
    }

    fn list(&self) -> ToolResult {
        let todos = self.read().clone();
        ToolResult::success(json!({
            "count": todos.len(),
            "todos": todos,
        }))
    }

    fn complete(&self, input: &JsonMap) -> ToolResult {
        let todo_id = match required_id(input, "complete") {
            Ok(id) => id,
            Err(result) => return result,
        };

        let mut todos = self.write();
        let Some(todo) = todos.iter_mut().find(|t| t.id == todo_id) else {
            return ToolResult::failure(format!("Todo with id '{todo_id}' not found"));
        };

        if todo.completed {
            return ToolResult::success(json!({
                "message": "Todo was already completed",
                "todo": todo,
            }));
        }

        todo.completed = true;
        todo.completed_at = Some(Utc::now());
        ToolResult::success(json!({
            "message": "Todo marked as completed",
            "todo": todo,
        }))
    }

    fn delete(&self, input: &JsonMap) -> ToolResult {
        let todo_id = match required_id(input, "delete") {
            Ok(id) => id,
            Err(result) => return result,
        };

        let mut todos = self.write();
        let Some(index) = todos.iter().position(|t| t.id == todo_id) else {
            return ToolResult::failure(format!("Todo with id '{todo_id}' not found"));
        };

        let deleted = todos.remove(index);
        ToolResult::success(json!({
            "message": "Todo deleted successfully",
            "deleted_todo": deleted,
        }))
    }
}

fn required_id(input: &JsonMap, operation: &str) -> Result<String, ToolResult> {
    let todo_id = input
        .get("todo_id")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .unwrap_or_default();
    if todo_id.is_empty() {
        Err(ToolResult::failure(format!(
            "'todo_id' is required for {operation} operation"
        )))
    } else {
        Ok(todo_id.to_string())
    }
}

impl Tool for TodoStore {
    fn name(&self) -> &str {
        "TodoStore"
    }

    fn description(&self) -> &str {
        "Manages todo items. Supports operations: add, list, complete, delete. State persists within the session."
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new()
            .required_field(
                "operation",
                FieldType::String,
                "Operation to perform: add, list, complete, or delete",
            )
            .field("title", FieldType::String, "Todo title (required for 'add')")
            .field(
                "description",
                FieldType::String,
                "Todo description (optional for 'add')",
            )
            .field(
                "todo_id",
                FieldType::String,
                "Todo ID (required for 'complete' and 'delete')",
            )
    }

    fn execute(&self, input: &JsonMap) -> ToolResult {
        let Some(operation) = input.get("operation").and_then(|v| v.as_str()) else {
            return ToolResult::failure("Missing required field: 'operation'");
        };

        match operation {
            "add" => self.add(input),
            "list" => self.list(),
            "complete" => self.complete(input),
            "delete" => self.delete(input),
            other => ToolResult::failure(format!(
                "Invalid operation: '{other}'. Must be one of: add, list, complete, delete"
            )),
        }
    }

    fn replay_safe(&self, input: &JsonMap) -> bool {
        input.get("operation").and_then(|v| v.as_str()) != Some("add")
    }
}
