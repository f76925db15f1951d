// Permission modes and the gate applied before every tool execution
//
// Three modes, cycled by the user at any time:
//   ReadOnly    - observation only; every mutating tool is denied
//   ConfirmEach - mutating tools pause for per-call confirmation
//   AutoApprove - mutating tools run without prompting
//
// Classification is a pure function of (mode, kind); the executor owns
// the actual confirmation prompt.

use crate::tools::types::ToolKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How eagerly the agent may change the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PermissionMode {
    /// Deny every mutating tool.
    ReadOnly,
    /// Ask the user before each mutating tool.
    #[default]
    ConfirmEach,
    /// Run mutating tools without prompting.
    AutoApprove,
}

impl PermissionMode {
    /// Advance to the next mode. Cycles ReadOnly -> ConfirmEach ->
    /// AutoApprove -> ReadOnly.
    pub fn cycle(self) -> Self {
        match self {
            PermissionMode::ReadOnly => PermissionMode::ConfirmEach,
            PermissionMode::ConfirmEach => PermissionMode::AutoApprove,
            PermissionMode::AutoApprove => PermissionMode::ReadOnly,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PermissionMode::ReadOnly => "read-only",
            PermissionMode::ConfirmEach => "confirm-each",
            PermissionMode::AutoApprove => "auto-approve",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            PermissionMode::ReadOnly => "mutating tools are denied",
            PermissionMode::ConfirmEach => "mutating tools ask for confirmation",
            PermissionMode::AutoApprove => "mutating tools run without prompting",
        }
    }
}

impl fmt::Display for PermissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of checking a tool against the active mode.
#[derive(Debug, Clone, PartialEq)]
pub enum PermissionCheck {
    /// Execute without prompting.
    Allow,
    /// Pause and ask the user first.
    ConfirmRequired,
    /// Refuse, with a reason surfaced to the model.
    Deny(String),
}

/// Classify a tool kind under a permission mode.
pub fn classify(mode: PermissionMode, kind: ToolKind) -> PermissionCheck {
    if kind.is_read_only() {
        return PermissionCheck::Allow;
    }
    match mode {
        PermissionMode::ReadOnly => PermissionCheck::Deny(format!(
            "{} is a mutating tool and the session is in read-only mode",
            kind.tag()
        )),
        PermissionMode::ConfirmEach => PermissionCheck::ConfirmRequired,
        PermissionMode::AutoApprove => PermissionCheck::Allow,
    }
}
