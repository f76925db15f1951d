// add_todo / update_todo / show_todos over the session store

use crate::session::cancel::CancellationSignal;
use crate::tools::registry::ToolHandler;
use crate::tools::todo::{TodoPriority, TodoStatus, TodoStore};
use crate::tools::types::{ToolInvocation, ToolKind, ToolResult};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct TodoTools {
    store: Arc<Mutex<TodoStore>>,
}

impl TodoTools {
    pub const KINDS: &'static [ToolKind] = &[
        ToolKind::AddTodo,
        ToolKind::UpdateTodo,
        ToolKind::ShowTodos,
    ];

    pub fn new(store: Arc<Mutex<TodoStore>>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ToolHandler for TodoTools {
    async fn execute(
        &self,
        invocation: &ToolInvocation,
        _cancel: &CancellationSignal,
    ) -> Result<ToolResult> {
        match invocation {
            ToolInvocation::AddTodo {
                title,
                description,
                priority,
            } => {
                if title.is_empty() {
                    return Ok(ToolResult::error("todo title must not be empty"));
                }
                let priority: TodoPriority = match priority.parse() {
                    Ok(p) => p,
                    Err(e) => return Ok(ToolResult::error(e)),
                };
                let mut store = self.store.lock().await;
                let id = store.add(title, description, priority);
                Ok(ToolResult::success(format!(
                    "Added todo [{}] {} ({})",
                    id, title, priority
                )))
            }
            ToolInvocation::UpdateTodo {
                id,
                status,
                progress,
            } => {
                let status: TodoStatus = match status.parse() {
                    Ok(s) => s,
                    Err(e) => return Ok(ToolResult::error(e)),
                };
                let mut store = self.store.lock().await;
                match store.update(id, status, *progress) {
                    Ok(item) => Ok(ToolResult::success(format!(
                        "Updated todo [{}] {}: {} ({}%)",
                        item.id, item.title, item.status, item.progress
                    ))),
                    Err(e) => Ok(ToolResult::error(e)),
                }
            }
            ToolInvocation::ShowTodos => {
                let store = self.store.lock().await;
                Ok(ToolResult::success(store.render()))
            }
            other => anyhow::bail!("todo handler cannot execute {}", other.kind()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tools() -> TodoTools {
        TodoTools::new(Arc::new(Mutex::new(TodoStore::new())))
    }

    async fn run(tools: &TodoTools, inv: ToolInvocation) -> ToolResult {
        tools.execute(&inv, &CancellationSignal::new()).await.unwrap()
    }

    #[tokio::test]
    async fn test_add_and_show() {
        let tools = tools();
        let added = run(
            &tools,
            ToolInvocation::AddTodo {
                title: "Refactor parser".into(),
                description: "split module".into(),
                priority: "high".into(),
            },
        )
        .await;
        assert!(!added.is_error());
        assert!(added.message.contains("Refactor parser"));

        let shown = run(&tools, ToolInvocation::ShowTodos).await;
        assert!(shown.message.contains("Refactor parser"));
        assert!(shown.message.contains("high"));
    }

    #[tokio::test]
    async fn test_add_rejects_empty_title() {
        let result = run(
            &tools(),
            ToolInvocation::AddTodo {
                title: "".into(),
                description: "".into(),
                priority: "medium".into(),
            },
        )
        .await;
        assert!(result.is_error());
    }

    #[tokio::test]
    async fn test_add_rejects_unknown_priority() {
        let result = run(
            &tools(),
            ToolInvocation::AddTodo {
                title: "x".into(),
                description: "".into(),
                priority: "whenever".into(),
            },
        )
        .await;
        assert!(result.is_error());
        assert!(result.message.contains("unknown priority"));
    }

    #[tokio::test]
    async fn test_update_by_prefix() {
        let tools = tools();
        let added = run(
            &tools,
            ToolInvocation::AddTodo {
                title: "x".into(),
                description: "".into(),
                priority: "low".into(),
            },
        )
        .await;
        // Message shape: "Added todo [<id>] ..."
        let id = added
            .message
            .split('[')
            .nth(1)
            .unwrap()
            .split(']')
            .next()
            .unwrap()
            .to_string();

        let updated = run(
            &tools,
            ToolInvocation::UpdateTodo {
                id: id[..4].to_string(),
                status: "done".into(),
                progress: None,
            },
        )
        .await;
        assert!(!updated.is_error());
        assert!(updated.message.contains("completed"));
        assert!(updated.message.contains("100%"));
    }

    #[tokio::test]
    async fn test_update_unknown_id() {
        let result = run(
            &tools(),
            ToolInvocation::UpdateTodo {
                id: "ffffffff".into(),
                status: "pending".into(),
                progress: None,
            },
        )
        .await;
        assert!(result.is_error());
    }
}
