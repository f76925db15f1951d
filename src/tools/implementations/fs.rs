// Filesystem tools: read, write, create, insert, replace, delete, list
//
// Line numbers in insert_code / replace_code are 1-based and validated
// against the current file. Mutating operations return diff-style
// previews so the user can see what changed (or is about to change when
// confirmation is on).

use crate::session::cancel::CancellationSignal;
use crate::tools::registry::ToolHandler;
use crate::tools::types::{ToolInvocation, ToolKind, ToolResult};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;

// Read results larger than this are truncated before going back to the
// model; the full file stays on disk.
const MAX_READ_CHARS: usize = 50_000;

// Preview at most this many changed lines per side.
const PREVIEW_LINES: usize = 10;

pub struct FsTools;

impl FsTools {
    pub const KINDS: &'static [ToolKind] = &[
        ToolKind::ReadFile,
        ToolKind::WriteFile,
        ToolKind::CreateFile,
        ToolKind::InsertCode,
        ToolKind::ReplaceCode,
        ToolKind::DeleteFile,
        ToolKind::ListDirectory,
    ];
}

fn preview_added(start_line: usize, content: &str) -> Vec<String> {
    let lines: Vec<&str> = content.lines().collect();
    let mut preview: Vec<String> = lines
        .iter()
        .take(PREVIEW_LINES)
        .enumerate()
        .map(|(i, line)| format!("+ {}: {}", start_line + i, line))
        .collect();
    if lines.len() > PREVIEW_LINES {
        preview.push(format!("... ({} more lines)", lines.len() - PREVIEW_LINES));
    }
    preview
}

fn preview_removed(start_line: usize, lines: &[String]) -> Vec<String> {
    let mut preview: Vec<String> = lines
        .iter()
        .take(PREVIEW_LINES)
        .enumerate()
        .map(|(i, line)| format!("- {}: {}", start_line + i, line))
        .collect();
    if lines.len() > PREVIEW_LINES {
        preview.push(format!("... ({} more lines)", lines.len() - PREVIEW_LINES));
    }
    preview
}

async fn read_file(path: &str) -> Result<ToolResult> {
    if !Path::new(path).is_file() {
        return Ok(ToolResult::error(format!("File '{}' does not exist", path)));
    }
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read '{}'", path))?;

    if content.chars().count() > MAX_READ_CHARS {
        let truncated: String = content.chars().take(MAX_READ_CHARS).collect();
        return Ok(ToolResult::success(format!(
            "{}\n... (truncated, file is {} lines)",
            truncated,
            content.lines().count()
        )));
    }
    Ok(ToolResult::success(content))
}

async fn write_all(path: &str, content: &str) -> Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create directories for '{}'", path))?;
        }
    }
    tokio::fs::write(path, content)
        .await
        .with_context(|| format!("failed to write '{}'", path))
}

async fn write_file(path: &str, content: &str, must_be_new: bool) -> Result<ToolResult> {
    let existed = Path::new(path).exists();
    write_all(path, content).await?;

    let lines = content.lines().count();
    let message = if must_be_new && existed {
        format!("File '{}' already existed; overwrote it ({} lines)", path, lines)
    } else {
        format!("Wrote '{}' ({} lines, {} bytes)", path, lines, content.len())
    };
    Ok(ToolResult::success(message).with_preview(preview_added(1, content)))
}

// Lines plus whether the file ended with a newline, so edits do not
// silently normalize the trailing-newline state.
async fn load_lines(path: &str) -> Result<Option<(Vec<String>, bool)>> {
    if !Path::new(path).is_file() {
        return Ok(None);
    }
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read '{}'", path))?;
    let trailing_newline = content.ends_with('\n');
    Ok(Some((
        content.lines().map(str::to_string).collect(),
        trailing_newline,
    )))
}

async fn store_lines(path: &str, lines: &[String], trailing_newline: bool) -> Result<()> {
    let mut out = lines.join("\n");
    if trailing_newline {
        out.push('\n');
    }
    write_all(path, &out).await
}

async fn insert_code(path: &str, line: usize, content: &str) -> Result<ToolResult> {
    let Some((mut lines, trailing_newline)) = load_lines(path).await? else {
        return Ok(ToolResult::error(format!("File '{}' does not exist", path)));
    };
    if line > lines.len() + 1 {
        return Ok(ToolResult::error(format!(
            "Line {} is out of range; '{}' has {} lines",
            line,
            path,
            lines.len()
        )));
    }

    let new_lines: Vec<String> = content.lines().map(str::to_string).collect();
    let inserted = new_lines.len();
    for (i, l) in new_lines.into_iter().enumerate() {
        lines.insert(line - 1 + i, l);
    }
    store_lines(path, &lines, trailing_newline).await?;

    Ok(
        ToolResult::success(format!(
            "Inserted {} line(s) into '{}' at line {}",
            inserted, path, line
        ))
        .with_preview(preview_added(line, content)),
    )
}

async fn replace_code(
    path: &str,
    start_line: usize,
    end_line: usize,
    content: &str,
) -> Result<ToolResult> {
    let Some((mut lines, trailing_newline)) = load_lines(path).await? else {
        return Ok(ToolResult::error(format!("File '{}' does not exist", path)));
    };
    if end_line > lines.len() {
        return Ok(ToolResult::error(format!(
            "Range {}-{} is out of range; '{}' has {} lines",
            start_line,
            end_line,
            path,
            lines.len()
        )));
    }

    let removed: Vec<String> = lines.drain(start_line - 1..end_line).collect();
    let new_lines: Vec<String> = content.lines().map(str::to_string).collect();
    for (i, l) in new_lines.into_iter().enumerate() {
        lines.insert(start_line - 1 + i, l);
    }
    store_lines(path, &lines, trailing_newline).await?;

    let mut preview = preview_removed(start_line, &removed);
    preview.extend(preview_added(start_line, content));
    Ok(
        ToolResult::success(format!(
            "Replaced lines {}-{} of '{}'",
            start_line, end_line, path
        ))
        .with_preview(preview),
    )
}

async fn delete_file(path: &str) -> Result<ToolResult> {
    if !Path::new(path).is_file() {
        return Ok(ToolResult::error(format!("File '{}' does not exist", path)));
    }
    tokio::fs::remove_file(path)
        .await
        .with_context(|| format!("failed to delete '{}'", path))?;
    Ok(ToolResult::success(format!("Deleted '{}'", path)))
}

async fn list_directory(path: &str) -> Result<ToolResult> {
    let target = if path.is_empty() { "." } else { path };
    if !Path::new(target).is_dir() {
        return Ok(ToolResult::error(format!(
            "Directory '{}' does not exist",
            target
        )));
    }

    let mut entries = tokio::fs::read_dir(target)
        .await
        .with_context(|| format!("failed to list '{}'", target))?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let mut name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
            name.push('/');
        }
        names.push(name);
    }
    names.sort();

    if names.is_empty() {
        return Ok(ToolResult::success(format!("'{}' is empty", target)));
    }
    Ok(ToolResult::success(format!(
        "Contents of '{}' ({} entries):\n{}",
        target,
        names.len(),
        names.join("\n")
    )))
}

#[async_trait]
impl ToolHandler for FsTools {
    async fn execute(
        &self,
        invocation: &ToolInvocation,
        _cancel: &CancellationSignal,
    ) -> Result<ToolResult> {
        match invocation {
            ToolInvocation::ReadFile { path } => read_file(path).await,
            ToolInvocation::WriteFile { path, content } => write_file(path, content, false).await,
            ToolInvocation::CreateFile { path, content } => write_file(path, content, true).await,
            ToolInvocation::InsertCode {
                path,
                line,
                content,
            } => insert_code(path, *line, content).await,
            ToolInvocation::ReplaceCode {
                path,
                start_line,
                end_line,
                content,
            } => replace_code(path, *start_line, *end_line, content).await,
            ToolInvocation::DeleteFile { path } => delete_file(path).await,
            ToolInvocation::ListDirectory { path } => list_directory(path).await,
            other => anyhow::bail!("fs handler cannot execute {}", other.kind()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn signal() -> CancellationSignal {
        CancellationSignal::new()
    }

    async fn run(inv: ToolInvocation) -> ToolResult {
        FsTools.execute(&inv, &signal()).await.unwrap()
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nope.txt").to_string_lossy().into_owned();
        let result = run(ToolInvocation::ReadFile { path }).await;
        assert!(result.is_error());
        assert!(result.message.contains("does not exist"));
    }

    #[tokio::test]
    async fn test_write_then_read_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hello.txt").to_string_lossy().into_owned();

        let write = run(ToolInvocation::WriteFile {
            path: path.clone(),
            content: "line one\nline two\n".into(),
        })
        .await;
        assert!(!write.is_error());
        assert!(write.preview.iter().any(|l| l.starts_with("+ 1:")));

        let read = run(ToolInvocation::ReadFile { path }).await;
        assert!(!read.is_error());
        assert_eq!(read.message, "line one\nline two\n");
    }

    #[tokio::test]
    async fn test_write_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir
            .path()
            .join("a/b/c.txt")
            .to_string_lossy()
            .into_owned();
        let result = run(ToolInvocation::WriteFile {
            path: path.clone(),
            content: "x".into(),
        })
        .await;
        assert!(!result.is_error());
        assert!(Path::new(&path).is_file());
    }

    #[tokio::test]
    async fn test_create_existing_file_notes_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dup.txt").to_string_lossy().into_owned();
        tokio::fs::write(&path, "old").await.unwrap();

        let result = run(ToolInvocation::CreateFile {
            path: path.clone(),
            content: "new".into(),
        })
        .await;
        assert!(!result.is_error());
        assert!(result.message.contains("already existed"));
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "new");
    }

    #[tokio::test]
    async fn test_insert_code_at_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("code.py").to_string_lossy().into_owned();
        tokio::fs::write(&path, "a\nb\nc\n").await.unwrap();

        let result = run(ToolInvocation::InsertCode {
            path: path.clone(),
            line: 2,
            content: "inserted".into(),
        })
        .await;
        assert!(!result.is_error());
        assert_eq!(
            tokio::fs::read_to_string(&path).await.unwrap(),
            "a\ninserted\nb\nc\n"
        );
    }

    #[tokio::test]
    async fn test_insert_code_out_of_range() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("code.py").to_string_lossy().into_owned();
        tokio::fs::write(&path, "a\n").await.unwrap();

        let result = run(ToolInvocation::InsertCode {
            path,
            line: 10,
            content: "x".into(),
        })
        .await;
        assert!(result.is_error());
        assert!(result.message.contains("out of range"));
    }

    #[tokio::test]
    async fn test_replace_code_range() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("code.py").to_string_lossy().into_owned();
        tokio::fs::write(&path, "one\ntwo\nthree\nfour\n").await.unwrap();

        let result = run(ToolInvocation::ReplaceCode {
            path: path.clone(),
            start_line: 2,
            end_line: 3,
            content: "TWO".into(),
        })
        .await;
        assert!(!result.is_error());
        assert_eq!(
            tokio::fs::read_to_string(&path).await.unwrap(),
            "one\nTWO\nfour\n"
        );
        assert!(result.preview.iter().any(|l| l.starts_with("- 2: two")));
        assert!(result.preview.iter().any(|l| l.starts_with("+ 2: TWO")));
    }

    #[tokio::test]
    async fn test_insert_preserves_absent_trailing_newline() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("code.py").to_string_lossy().into_owned();
        tokio::fs::write(&path, "a\nb").await.unwrap();

        let result = run(ToolInvocation::InsertCode {
            path: path.clone(),
            line: 2,
            content: "mid".into(),
        })
        .await;
        assert!(!result.is_error());
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "a\nmid\nb");
    }

    #[tokio::test]
    async fn test_replace_preserves_absent_trailing_newline() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("code.py").to_string_lossy().into_owned();
        tokio::fs::write(&path, "one\ntwo").await.unwrap();

        let result = run(ToolInvocation::ReplaceCode {
            path: path.clone(),
            start_line: 2,
            end_line: 2,
            content: "TWO".into(),
        })
        .await;
        assert!(!result.is_error());
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "one\nTWO");
    }

    #[tokio::test]
    async fn test_replace_code_out_of_range() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("code.py").to_string_lossy().into_owned();
        tokio::fs::write(&path, "one\n").await.unwrap();

        let result = run(ToolInvocation::ReplaceCode {
            path,
            start_line: 1,
            end_line: 5,
            content: "x".into(),
        })
        .await;
        assert!(result.is_error());
    }

    #[tokio::test]
    async fn test_delete_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gone.txt").to_string_lossy().into_owned();
        tokio::fs::write(&path, "x").await.unwrap();

        let result = run(ToolInvocation::DeleteFile { path: path.clone() }).await;
        assert!(!result.is_error());
        assert!(!Path::new(&path).exists());

        let again = run(ToolInvocation::DeleteFile { path }).await;
        assert!(again.is_error());
    }

    #[tokio::test]
    async fn test_list_directory() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(dir.path().join("b.txt"), "x").await.unwrap();
        tokio::fs::write(dir.path().join("a.txt"), "x").await.unwrap();
        tokio::fs::create_dir(dir.path().join("sub")).await.unwrap();

        let result = run(ToolInvocation::ListDirectory {
            path: dir.path().to_string_lossy().into_owned(),
        })
        .await;
        assert!(!result.is_error());
        let lines: Vec<&str> = result.message.lines().skip(1).collect();
        assert_eq!(lines, vec!["a.txt", "b.txt", "sub/"]);
    }

    #[tokio::test]
    async fn test_list_missing_directory() {
        let result = run(ToolInvocation::ListDirectory {
            path: "/definitely/not/here".into(),
        })
        .await;
        assert!(result.is_error());
    }
}
