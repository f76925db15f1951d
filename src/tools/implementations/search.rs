// code_search: regex search across a directory tree

use crate::session::cancel::CancellationSignal;
use crate::tools::registry::ToolHandler;
use crate::tools::types::{ToolInvocation, ToolKind, ToolResult};
use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use std::path::Path;
use walkdir::WalkDir;

const MAX_MATCHES: usize = 100;
const MAX_FILE_BYTES: u64 = 1_048_576;
const SKIP_DIRS: &[&str] = &[".git", "target", "node_modules", "__pycache__", ".venv", "venv"];

pub struct SearchTools;

impl SearchTools {
    pub const KINDS: &'static [ToolKind] = &[ToolKind::CodeSearch];
}

fn should_skip(entry: &walkdir::DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| SKIP_DIRS.contains(&name) || (name.starts_with('.') && name.len() > 1))
        .unwrap_or(false)
}

fn search(pattern: &str, root: &str, cancel: &CancellationSignal) -> ToolResult {
    let re = match Regex::new(pattern) {
        Ok(re) => re,
        Err(e) => return ToolResult::error(format!("Invalid search pattern: {}", e)),
    };
    if !Path::new(root).exists() {
        return ToolResult::error(format!("Path '{}' does not exist", root));
    }

    let mut matches = Vec::new();
    let walker = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !should_skip(e));

    'files: for entry in walker.filter_map(|e| e.ok()) {
        if cancel.is_cancelled() {
            return ToolResult::cancelled();
        }
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.metadata().map(|m| m.len() > MAX_FILE_BYTES).unwrap_or(true) {
            continue;
        }
        // Binary files fail utf-8 and are skipped.
        let Ok(content) = std::fs::read_to_string(entry.path()) else {
            continue;
        };
        for (line_no, line) in content.lines().enumerate() {
            if re.is_match(line) {
                matches.push(format!(
                    "{}:{}: {}",
                    entry.path().display(),
                    line_no + 1,
                    line.trim()
                ));
                if matches.len() >= MAX_MATCHES {
                    break 'files;
                }
            }
        }
    }

    if matches.is_empty() {
        return ToolResult::success(format!("No matches for '{}' under '{}'", pattern, root));
    }
    let mut out = format!("{} match(es) for '{}':\n", matches.len(), pattern);
    out.push_str(&matches.join("\n"));
    if matches.len() >= MAX_MATCHES {
        out.push_str("\n... (match limit reached)");
    }
    ToolResult::success(out)
}

#[async_trait]
impl ToolHandler for SearchTools {
    async fn execute(
        &self,
        invocation: &ToolInvocation,
        cancel: &CancellationSignal,
    ) -> Result<ToolResult> {
        match invocation {
            ToolInvocation::CodeSearch { pattern, path } => {
                let pattern = pattern.clone();
                let path = path.clone();
                let cancel = cancel.clone();
                // Directory walks can be large; keep them off the runtime.
                let result =
                    tokio::task::spawn_blocking(move || search(&pattern, &path, &cancel)).await?;
                Ok(result)
            }
            other => anyhow::bail!("search handler cannot execute {}", other.kind()),
        }
    }
}
