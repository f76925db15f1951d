// Core tool types
//
// A model reply is parsed into typed ToolInvocation values; every executed
// invocation produces a ToolResult that is folded back into the conversation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a tool, independent of its field payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    ReadFile,
    WriteFile,
    CreateFile,
    InsertCode,
    ReplaceCode,
    DeleteFile,
    ListDirectory,
    CodeSearch,
    ExecuteCommand,
    AddTodo,
    UpdateTodo,
    ShowTodos,
    Plan,
    TaskComplete,
    ProviderListTools,
    ProviderCallTool,
    ProviderReadResource,
}

impl ToolKind {
    /// Tag name as it appears in model output.
    pub fn tag(&self) -> &'static str {
        match self {
            ToolKind::ReadFile => "read_file",
            ToolKind::WriteFile => "write_file",
            ToolKind::CreateFile => "create_file",
            ToolKind::InsertCode => "insert_code",
            ToolKind::ReplaceCode => "replace_code",
            ToolKind::DeleteFile => "delete_file",
            ToolKind::ListDirectory => "list_directory",
            ToolKind::CodeSearch => "code_search",
            ToolKind::ExecuteCommand => "execute_command",
            ToolKind::AddTodo => "add_todo",
            ToolKind::UpdateTodo => "update_todo",
            ToolKind::ShowTodos => "show_todos",
            ToolKind::Plan => "plan",
            ToolKind::TaskComplete => "task_complete",
            ToolKind::ProviderListTools => "provider_list_tools",
            ToolKind::ProviderCallTool => "provider_call_tool",
            ToolKind::ProviderReadResource => "provider_read_resource",
        }
    }

    /// Tools that only observe state. Allowed in every permission mode.
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            ToolKind::ReadFile
                | ToolKind::ListDirectory
                | ToolKind::CodeSearch
                | ToolKind::ShowTodos
                | ToolKind::Plan
                | ToolKind::TaskComplete
                | ToolKind::ProviderListTools
                | ToolKind::ProviderReadResource
        )
    }

    /// Every kind the parser knows about, in stable order.
    pub fn all() -> &'static [ToolKind] {
        &[
            ToolKind::ReadFile,
            ToolKind::WriteFile,
            ToolKind::CreateFile,
            ToolKind::InsertCode,
            ToolKind::ReplaceCode,
            ToolKind::DeleteFile,
            ToolKind::ListDirectory,
            ToolKind::CodeSearch,
            ToolKind::ExecuteCommand,
            ToolKind::AddTodo,
            ToolKind::UpdateTodo,
            ToolKind::ShowTodos,
            ToolKind::Plan,
            ToolKind::TaskComplete,
            ToolKind::ProviderListTools,
            ToolKind::ProviderCallTool,
            ToolKind::ProviderReadResource,
        ]
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A fully-typed tool call extracted from model output.
///
/// Fields are validated at parse time; handlers never see raw tag text.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInvocation {
    ReadFile {
        path: String,
    },
    WriteFile {
        path: String,
        content: String,
    },
    CreateFile {
        path: String,
        content: String,
    },
    InsertCode {
        path: String,
        line: usize,
        content: String,
    },
    ReplaceCode {
        path: String,
        start_line: usize,
        end_line: usize,
        content: String,
    },
    DeleteFile {
        path: String,
    },
    ListDirectory {
        path: String,
    },
    CodeSearch {
        pattern: String,
        path: String,
    },
    ExecuteCommand {
        command: String,
    },
    AddTodo {
        title: String,
        description: String,
        priority: String,
    },
    UpdateTodo {
        id: String,
        status: String,
        progress: Option<u8>,
    },
    ShowTodos,
    Plan {
        content: String,
    },
    TaskComplete {
        summary: String,
    },
    ProviderListTools,
    ProviderCallTool {
        server: String,
        tool: String,
        arguments: String,
    },
    ProviderReadResource {
        server: String,
        uri: String,
    },
}

impl ToolInvocation {
    pub fn kind(&self) -> ToolKind {
        match self {
            ToolInvocation::ReadFile { .. } => ToolKind::ReadFile,
            ToolInvocation::WriteFile { .. } => ToolKind::WriteFile,
            ToolInvocation::CreateFile { .. } => ToolKind::CreateFile,
            ToolInvocation::InsertCode { .. } => ToolKind::InsertCode,
            ToolInvocation::ReplaceCode { .. } => ToolKind::ReplaceCode,
            ToolInvocation::DeleteFile { .. } => ToolKind::DeleteFile,
            ToolInvocation::ListDirectory { .. } => ToolKind::ListDirectory,
            ToolInvocation::CodeSearch { .. } => ToolKind::CodeSearch,
            ToolInvocation::ExecuteCommand { .. } => ToolKind::ExecuteCommand,
            ToolInvocation::AddTodo { .. } => ToolKind::AddTodo,
            ToolInvocation::UpdateTodo { .. } => ToolKind::UpdateTodo,
            ToolInvocation::ShowTodos => ToolKind::ShowTodos,
            ToolInvocation::Plan { .. } => ToolKind::Plan,
            ToolInvocation::TaskComplete { .. } => ToolKind::TaskComplete,
            ToolInvocation::ProviderListTools => ToolKind::ProviderListTools,
            ToolInvocation::ProviderCallTool { .. } => ToolKind::ProviderCallTool,
            ToolInvocation::ProviderReadResource { .. } => ToolKind::ProviderReadResource,
        }
    }

    /// Short human-readable form, used for logging and the repeated-operation
    /// guard in the conversation loop.
    pub fn describe(&self) -> String {
        match self {
            ToolInvocation::ReadFile { path } => format!("read_file {}", path),
            ToolInvocation::WriteFile { path, .. } => format!("write_file {}", path),
            ToolInvocation::CreateFile { path, .. } => format!("create_file {}", path),
            ToolInvocation::InsertCode { path, line, .. } => {
                format!("insert_code {}:{}", path, line)
            }
            ToolInvocation::ReplaceCode {
                path,
                start_line,
                end_line,
                ..
            } => {
                format!("replace_code {}:{}-{}", path, start_line, end_line)
            }
            ToolInvocation::DeleteFile { path } => format!("delete_file {}", path),
            ToolInvocation::ListDirectory { path } => format!("list_directory {}", path),
            ToolInvocation::CodeSearch { pattern, path } => {
                format!("code_search '{}' in {}", pattern, path)
            }
            ToolInvocation::ExecuteCommand { command } => {
                format!("execute_command {}", command)
            }
            ToolInvocation::AddTodo { title, .. } => format!("add_todo {}", title),
            ToolInvocation::UpdateTodo { id, status, .. } => {
                format!("update_todo {} -> {}", id, status)
            }
            ToolInvocation::ShowTodos => "show_todos".to_string(),
            ToolInvocation::Plan { .. } => "plan".to_string(),
            ToolInvocation::TaskComplete { .. } => "task_complete".to_string(),
            ToolInvocation::ProviderListTools => "provider_list_tools".to_string(),
            ToolInvocation::ProviderCallTool { server, tool, .. } => {
                format!("provider_call_tool {}/{}", server, tool)
            }
            ToolInvocation::ProviderReadResource { server, uri } => {
                format!("provider_read_resource {}/{}", server, uri)
            }
        }
    }
}

/// A parsed call together with its byte offset in the reply, so batches
/// execute in document order.
#[derive(Debug, Clone)]
pub struct ParsedCall {
    pub invocation: ToolInvocation,
    pub offset: usize,
}

/// Outcome status of a single tool execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolStatus {
    Success,
    Error,
    Cancelled,
}

/// Result of executing one tool invocation.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub status: ToolStatus,
    pub message: String,
    /// Diff-style preview lines for mutating operations, shown to the user.
    pub preview: Vec<String>,
}

impl ToolResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Success,
            message: message.into(),
            preview: Vec::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Error,
            message: message.into(),
            preview: Vec::new(),
        }
    }

    pub fn cancelled() -> Self {
        Self {
            status: ToolStatus::Cancelled,
            message: "operation cancelled by user".to_string(),
            preview: Vec::new(),
        }
    }

    pub fn with_preview(mut self, preview: Vec<String>) -> Self {
        self.preview = preview;
        self
    }

    pub fn is_error(&self) -> bool {
        self.status == ToolStatus::Error
    }

    /// Label used when folding results back into the conversation.
    pub fn status_label(&self) -> &'static str {
        match self.status {
            ToolStatus::Success => "success",
            ToolStatus::Error => "error",
            ToolStatus::Cancelled => "cancelled",
        }
    }
}
