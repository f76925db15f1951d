// Session-scoped task list
//
// The store lives only for the duration of the session and is never
// persisted. The model manages it through add_todo / update_todo /
// show_todos; items are addressed by a short id and updates accept any
// unambiguous id prefix.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TodoPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl FromStr for TodoPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(TodoPriority::Low),
            "medium" | "" => Ok(TodoPriority::Medium),
            "high" => Ok(TodoPriority::High),
            "urgent" => Ok(TodoPriority::Urgent),
            other => Err(format!("unknown priority '{}'", other)),
        }
    }
}

impl fmt::Display for TodoPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TodoPriority::Low => "low",
            TodoPriority::Medium => "medium",
            TodoPriority::High => "high",
            TodoPriority::Urgent => "urgent",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl FromStr for TodoStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(TodoStatus::Pending),
            "in_progress" | "in progress" => Ok(TodoStatus::InProgress),
            "completed" | "done" => Ok(TodoStatus::Completed),
            "cancelled" | "canceled" => Ok(TodoStatus::Cancelled),
            other => Err(format!("unknown status '{}'", other)),
        }
    }
}

impl fmt::Display for TodoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TodoStatus::Pending => "pending",
            TodoStatus::InProgress => "in_progress",
            TodoStatus::Completed => "completed",
            TodoStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// A single task item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoItem {
    /// Short stable id (first 8 hex chars of a v4 uuid).
    pub id: String,
    pub title: String,
    pub description: String,
    pub priority: TodoPriority,
    pub status: TodoStatus,
    /// Completion percentage, 0-100.
    pub progress: u8,
    pub created_at: DateTime<Utc>,
}

/// Session-scoped task store.
#[derive(Debug, Default)]
pub struct TodoStore {
    items: Vec<TodoItem>,
}

impl TodoStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new item and return its short id.
    pub fn add(&mut self, title: &str, description: &str, priority: TodoPriority) -> String {
        let id = Uuid::new_v4().simple().to_string()[..8].to_string();
        self.items.push(TodoItem {
            id: id.clone(),
            title: title.to_string(),
            description: description.to_string(),
            priority,
            status: TodoStatus::Pending,
            progress: 0,
            created_at: Utc::now(),
        });
        id
    }

    /// Update an item addressed by id or unambiguous id prefix.
    ///
    /// Setting status to completed forces progress to 100; setting
    /// progress to 100 forces status to completed.
    pub fn update(
        &mut self,
        id_prefix: &str,
        status: TodoStatus,
        progress: Option<u8>,
    ) -> Result<&TodoItem, String> {
        let prefix = id_prefix.trim();
        if prefix.is_empty() {
            return Err("empty todo id".to_string());
        }

        let matches: Vec<usize> = self
            .items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.id.starts_with(prefix))
            .map(|(i, _)| i)
            .collect();

        let idx = match matches.as_slice() {
            [] => return Err(format!("no todo matches id '{}'", prefix)),
            [i] => *i,
            _ => return Err(format!("id '{}' matches {} todos", prefix, matches.len())),
        };

        let item = &mut self.items[idx];
        item.status = status;
        if let Some(p) = progress {
            item.progress = p.min(100);
        }
        if item.status == TodoStatus::Completed {
            item.progress = 100;
        } else if item.progress == 100 {
            item.status = TodoStatus::Completed;
        }
        Ok(&self.items[idx])
    }

    pub fn get_all(&self) -> &[TodoItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Plain-text rendering for show_todos and the REPL.
    pub fn render(&self) -> String {
        if self.items.is_empty() {
            return "No todos in this session.".to_string();
        }
        let mut out = format!("Todos ({} items):\n", self.items.len());
        for item in &self.items {
            out.push_str(&format!(
                "[{}] {} ({}, {}, {}%)",
                item.id, item.title, item.priority, item.status, item.progress
            ));
            if !item.description.is_empty() {
                out.push_str(&format!(" - {}", item.description));
            }
            out.push('\n');
        }
        out
    }
}
