// Tool-call extraction from model replies
//
// The model emits tool calls as XML-ish tags inline with prose:
//
//   I'll check the file first.
//   <read_file><path>src/main.rs</path></read_file>
//
// Extraction is regex-based and non-greedy; it never requires the reply to
// be well-formed XML. Calls are returned in document order. Tag fragments
// that open a known tool but never produce a complete call are reported as
// incomplete so the loop can ask the model to re-emit them instead of
// treating the text as prose.

use crate::tools::types::{ParsedCall, ToolInvocation, ToolKind};
use once_cell::sync::Lazy;
use regex::Regex;

/// A recognized tool tag that could not be turned into a typed call.
#[derive(Debug, Clone, PartialEq)]
pub struct IncompleteCall {
    pub tag: String,
    pub reason: String,
}

/// Everything extracted from one model reply.
#[derive(Debug, Default)]
pub struct ParsedResponse {
    /// Complete calls in document order.
    pub calls: Vec<ParsedCall>,
    /// Reply text with tool tags removed.
    pub thought: String,
    /// Recognized tags that were unclosed or had invalid fields.
    pub incomplete: Vec<IncompleteCall>,
}

impl ParsedResponse {
    pub fn has_calls(&self) -> bool {
        !self.calls.is_empty()
    }

    pub fn has_incomplete(&self) -> bool {
        !self.incomplete.is_empty()
    }
}

// Field-sequence patterns per tool. `(?s)` so content fields may span lines;
// `.*?` so adjacent calls of the same kind do not merge.
fn pattern_for(kind: ToolKind) -> String {
    let body = match kind {
        ToolKind::ReadFile | ToolKind::DeleteFile | ToolKind::ListDirectory => {
            r"\s*<path>(.*?)</path>\s*"
        }
        ToolKind::WriteFile | ToolKind::CreateFile => {
            r"\s*<path>(.*?)</path>\s*<content>(.*?)</content>\s*"
        }
        ToolKind::InsertCode => {
            r"\s*<path>(.*?)</path>\s*<line>(.*?)</line>\s*<content>(.*?)</content>\s*"
        }
        ToolKind::ReplaceCode => {
            r"\s*<path>(.*?)</path>\s*<start_line>(.*?)</start_line>\s*<end_line>(.*?)</end_line>\s*<content>(.*?)</content>\s*"
        }
        ToolKind::CodeSearch => {
            r"\s*<pattern>(.*?)</pattern>\s*(?:<path>(.*?)</path>\s*)?"
        }
        ToolKind::ExecuteCommand => r"\s*<command>(.*?)</command>\s*",
        ToolKind::AddTodo => {
            r"\s*<title>(.*?)</title>\s*(?:<description>(.*?)</description>\s*)?(?:<priority>(.*?)</priority>\s*)?"
        }
        ToolKind::UpdateTodo => {
            r"\s*<id>(.*?)</id>\s*<status>(.*?)</status>\s*(?:<progress>(.*?)</progress>\s*)?"
        }
        ToolKind::ShowTodos | ToolKind::ProviderListTools => r"\s*",
        ToolKind::Plan => r"\s*<content>(.*?)</content>\s*",
        ToolKind::TaskComplete => r"\s*<summary>(.*?)</summary>\s*",
        ToolKind::ProviderCallTool => {
            r"\s*<server>(.*?)</server>\s*<tool>(.*?)</tool>\s*(?:<arguments>(.*?)</arguments>\s*)?"
        }
        ToolKind::ProviderReadResource => {
            r"\s*<server>(.*?)</server>\s*<uri>(.*?)</uri>\s*"
        }
    };
    format!(r"(?s)<{tag}>{body}</{tag}>", tag = kind.tag(), body = body)
}

static TAG_PATTERNS: Lazy<Vec<(ToolKind, Regex)>> = Lazy::new(|| {
    ToolKind::all()
        .iter()
        .map(|&kind| {
            let re = Regex::new(&pattern_for(kind))
                .unwrap_or_else(|e| panic!("invalid pattern for {}: {}", kind.tag(), e));
            (kind, re)
        })
        .collect()
});

// Matches any opening fragment of a known tool tag, closed or not.
static TAG_FRAGMENT: Lazy<Regex> = Lazy::new(|| {
    let names: Vec<&str> = ToolKind::all().iter().map(|k| k.tag()).collect();
    Regex::new(&format!(r"<({})\b[^>]*>?", names.join("|"))).expect("invalid fragment pattern")
});

// Trailing field tags (and an eventual closing tag) of a broken call, so
// the whole call is excised from the thought text instead of leaving
// `<path>...</path>` residue behind. Field names cannot open a new call,
// so this never runs into a complete match.
static FRAGMENT_TAIL: Lazy<Regex> = Lazy::new(|| {
    let fields = "path|content|line|start_line|end_line|pattern|command|title|description\
                  |priority|id|status|progress|summary|server|tool|uri|arguments";
    let names: Vec<&str> = ToolKind::all().iter().map(|k| k.tag()).collect();
    Regex::new(&format!(
        r"(?s)\A\s*(?:<(?:{fields})>.*?</(?:{fields})>|</(?:{names})>)",
        fields = fields,
        names = names.join("|")
    ))
    .expect("invalid fragment tail pattern")
});

/// True when `text` contains the opening of any known tool tag. Used by the
/// context manager to classify turns that carry tool traffic.
pub fn mentions_tool_tag(text: &str) -> bool {
    TAG_FRAGMENT.is_match(text)
}

fn parse_line_field(tag: &str, field: &str, raw: &str) -> Result<usize, IncompleteCall> {
    let trimmed = raw.trim();
    match trimmed.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(IncompleteCall {
            tag: tag.to_string(),
            reason: format!("<{}> must be a positive integer, got '{}'", field, trimmed),
        }),
    }
}

fn parse_progress_field(tag: &str, raw: &str) -> Result<u8, IncompleteCall> {
    let trimmed = raw.trim();
    match trimmed.parse::<u8>() {
        Ok(n) if n <= 100 => Ok(n),
        _ => Err(IncompleteCall {
            tag: tag.to_string(),
            reason: format!("<progress> must be an integer 0-100, got '{}'", trimmed),
        }),
    }
}

fn capture(caps: &regex::Captures<'_>, i: usize) -> String {
    caps.get(i).map(|m| m.as_str().to_string()).unwrap_or_default()
}

fn build_invocation(
    kind: ToolKind,
    caps: &regex::Captures<'_>,
) -> Result<ToolInvocation, IncompleteCall> {
    let tag = kind.tag();
    let inv = match kind {
        ToolKind::ReadFile => ToolInvocation::ReadFile {
            path: capture(caps, 1).trim().to_string(),
        },
        ToolKind::WriteFile => ToolInvocation::WriteFile {
            path: capture(caps, 1).trim().to_string(),
            content: capture(caps, 2),
        },
        ToolKind::CreateFile => ToolInvocation::CreateFile {
            path: capture(caps, 1).trim().to_string(),
            content: capture(caps, 2),
        },
        ToolKind::InsertCode => ToolInvocation::InsertCode {
            path: capture(caps, 1).trim().to_string(),
            line: parse_line_field(tag, "line", &capture(caps, 2))?,
            content: capture(caps, 3),
        },
        ToolKind::ReplaceCode => {
            let start_line = parse_line_field(tag, "start_line", &capture(caps, 2))?;
            let end_line = parse_line_field(tag, "end_line", &capture(caps, 3))?;
            if end_line < start_line {
                return Err(IncompleteCall {
                    tag: tag.to_string(),
                    reason: format!(
                        "<end_line> ({}) is before <start_line> ({})",
                        end_line, start_line
                    ),
                });
            }
            ToolInvocation::ReplaceCode {
                path: capture(caps, 1).trim().to_string(),
                start_line,
                end_line,
                content: capture(caps, 4),
            }
        }
        ToolKind::DeleteFile => ToolInvocation::DeleteFile {
            path: capture(caps, 1).trim().to_string(),
        },
        ToolKind::ListDirectory => ToolInvocation::ListDirectory {
            path: capture(caps, 1).trim().to_string(),
        },
        ToolKind::CodeSearch => {
            let path = capture(caps, 2).trim().to_string();
            ToolInvocation::CodeSearch {
                pattern: capture(caps, 1).trim().to_string(),
                path: if path.is_empty() { ".".to_string() } else { path },
            }
        }
        ToolKind::ExecuteCommand => ToolInvocation::ExecuteCommand {
            command: capture(caps, 1).trim().to_string(),
        },
        ToolKind::AddTodo => {
            let priority = capture(caps, 3).trim().to_lowercase();
            ToolInvocation::AddTodo {
                title: capture(caps, 1).trim().to_string(),
                description: capture(caps, 2).trim().to_string(),
                priority: if priority.is_empty() {
                    "medium".to_string()
                } else {
                    priority
                },
            }
        }
        ToolKind::UpdateTodo => {
            let raw_progress = capture(caps, 3);
            let progress = if raw_progress.trim().is_empty() {
                None
            } else {
                Some(parse_progress_field(tag, &raw_progress)?)
            };
            ToolInvocation::UpdateTodo {
                id: capture(caps, 1).trim().to_string(),
                status: capture(caps, 2).trim().to_lowercase(),
                progress,
            }
        }
        ToolKind::ShowTodos => ToolInvocation::ShowTodos,
        ToolKind::Plan => ToolInvocation::Plan {
            content: capture(caps, 1).trim().to_string(),
        },
        ToolKind::TaskComplete => ToolInvocation::TaskComplete {
            summary: capture(caps, 1).trim().to_string(),
        },
        ToolKind::ProviderListTools => ToolInvocation::ProviderListTools,
        ToolKind::ProviderCallTool => {
            let arguments = capture(caps, 3).trim().to_string();
            ToolInvocation::ProviderCallTool {
                server: capture(caps, 1).trim().to_string(),
                tool: capture(caps, 2).trim().to_string(),
                arguments: if arguments.is_empty() {
                    "{}".to_string()
                } else {
                    arguments
                },
            }
        }
        ToolKind::ProviderReadResource => ToolInvocation::ProviderReadResource {
            server: capture(caps, 1).trim().to_string(),
            uri: capture(caps, 2).trim().to_string(),
        },
    };
    Ok(inv)
}

/// Extract every tool call from a model reply.
pub fn parse_response(text: &str) -> ParsedResponse {
    let mut calls: Vec<ParsedCall> = Vec::new();
    let mut incomplete: Vec<IncompleteCall> = Vec::new();
    // Byte spans consumed by a complete tag match (valid fields or not).
    let mut spans: Vec<(usize, usize)> = Vec::new();

    for (kind, re) in TAG_PATTERNS.iter() {
        for caps in re.captures_iter(text) {
            let m = caps.get(0).expect("capture 0 always present");
            spans.push((m.start(), m.end()));
            match build_invocation(*kind, &caps) {
                Ok(invocation) => calls.push(ParsedCall {
                    invocation,
                    offset: m.start(),
                }),
                Err(bad) => incomplete.push(bad),
            }
        }
    }

    calls.sort_by_key(|c| c.offset);

    // Any opening fragment of a known tag that no complete match covers is
    // an unclosed or field-less call.
    let mut fragment_spans: Vec<(usize, usize)> = Vec::new();
    for m in TAG_FRAGMENT.find_iter(text) {
        let covered = spans.iter().any(|&(s, e)| m.start() >= s && m.start() < e);
        if !covered {
            let mut end = m.end();
            while let Some(tail) = FRAGMENT_TAIL.find(&text[end..]) {
                let closing = tail.as_str().trim_start().starts_with("</");
                end += tail.end();
                if closing {
                    break;
                }
            }
            fragment_spans.push((m.start(), end));
            let tag = m
                .as_str()
                .trim_start_matches('<')
                .trim_end_matches('>')
                .split_whitespace()
                .next()
                .unwrap_or("")
                .to_string();
            incomplete.push(IncompleteCall {
                tag,
                reason: "tag is unclosed or missing required fields".to_string(),
            });
        }
    }

    // Thought text: everything outside complete matches and stray fragments.
    let mut cut: Vec<(usize, usize)> = spans;
    cut.extend(fragment_spans);
    cut.sort();
    let mut thought = String::with_capacity(text.len());
    let mut pos = 0;
    for (start, end) in cut {
        if start > pos {
            thought.push_str(&text[pos..start]);
        }
        pos = pos.max(end);
    }
    if pos < text.len() {
        thought.push_str(&text[pos..]);
    }

    ParsedResponse {
        calls,
        thought: thought.trim().to_string(),
        incomplete,
    }
}

/// Corrective feedback sent back to the model when a reply contained only
/// broken tool tags.
pub fn corrective_feedback(incomplete: &[IncompleteCall]) -> String {
    let mut out = String::from(
        "Your last reply contained incomplete tool calls. \
         Re-emit each call with all required fields and matching closing tags:\n",
    );
    for bad in incomplete {
        out.push_str(&format!("- <{}>: {}\n", bad.tag, bad.reason));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_read_file() {
        let parsed = parse_response("<read_file><path>test.py</path></read_file>");
        assert_eq!(parsed.calls.len(), 1);
        assert!(parsed.incomplete.is_empty());
        assert_eq!(
            parsed.calls[0].invocation,
            ToolInvocation::ReadFile {
                path: "test.py".into()
            }
        );
    }

    #[test]
    fn test_calls_in_document_order() {
        let text = "First:\n<write_file><path>b.txt</path><content>B</content></write_file>\n\
                    then\n<read_file><path>a.txt</path></read_file>\ndone.";
        let parsed = parse_response(text);
        assert_eq!(parsed.calls.len(), 2);
        assert_eq!(parsed.calls[0].invocation.kind(), ToolKind::WriteFile);
        assert_eq!(parsed.calls[1].invocation.kind(), ToolKind::ReadFile);
    }

    #[test]
    fn test_adjacent_same_kind_calls_do_not_merge() {
        let text = "<read_file><path>a.txt</path></read_file>\
                    <read_file><path>b.txt</path></read_file>";
        let parsed = parse_response(text);
        assert_eq!(parsed.calls.len(), 2);
    }

    #[test]
    fn test_multiline_content_preserved() {
        let text = "<create_file><path>hi.py</path><content>line1\nline2\n</content></create_file>";
        let parsed = parse_response(text);
        match &parsed.calls[0].invocation {
            ToolInvocation::CreateFile { content, .. } => {
                assert_eq!(content, "line1\nline2\n");
            }
            other => panic!("unexpected invocation: {:?}", other),
        }
    }

    #[test]
    fn test_whitespace_between_fields_tolerated() {
        let text = "<write_file>\n  <path>x.txt</path>\n  <content>hello</content>\n</write_file>";
        let parsed = parse_response(text);
        assert_eq!(parsed.calls.len(), 1);
        assert!(parsed.incomplete.is_empty());
    }

    #[test]
    fn test_thought_text_extracted() {
        let text = "Let me check.\n<read_file><path>a.rs</path></read_file>\nThen I'll edit.";
        let parsed = parse_response(text);
        assert!(parsed.thought.contains("Let me check."));
        assert!(parsed.thought.contains("Then I'll edit."));
        assert!(!parsed.thought.contains("<read_file>"));
    }

    #[test]
    fn test_empty_tag_is_incomplete() {
        let parsed = parse_response("<read_file></read_file>");
        assert!(parsed.calls.is_empty());
        assert!(parsed.has_incomplete());
        assert_eq!(parsed.incomplete[0].tag, "read_file");
    }

    #[test]
    fn test_bare_opening_fragment_is_incomplete() {
        let parsed = parse_response("<write_file");
        assert!(parsed.calls.is_empty());
        assert!(parsed.has_incomplete());
        assert_eq!(parsed.incomplete[0].tag, "write_file");
    }

    #[test]
    fn test_missing_field_is_incomplete() {
        let parsed = parse_response("<create_file><path>test.py</path></create_file>");
        assert!(parsed.calls.is_empty());
        assert!(parsed.has_incomplete());
    }

    #[test]
    fn test_fragment_inside_prose_is_incomplete() {
        let parsed = parse_response("I want to <execute_command run something");
        assert!(parsed.calls.is_empty());
        assert!(parsed.has_incomplete());
        assert_eq!(parsed.incomplete[0].tag, "execute_command");
    }

    #[test]
    fn test_unclosed_call_fields_removed_from_thought() {
        let parsed = parse_response("Working on it.\n<write_file><path>x.txt</path>");
        assert!(parsed.has_incomplete());
        assert_eq!(parsed.thought, "Working on it.");
    }

    #[test]
    fn test_empty_tag_leaves_no_residue_in_thought() {
        let parsed = parse_response("<read_file></read_file>");
        assert!(parsed.has_incomplete());
        assert_eq!(parsed.thought, "");
    }

    #[test]
    fn test_broken_call_tail_does_not_swallow_complete_call() {
        let text = "<write_file><path>a.txt</path>\n\
                    <read_file><path>b.txt</path></read_file>";
        let parsed = parse_response(text);
        assert_eq!(parsed.calls.len(), 1);
        assert_eq!(parsed.calls[0].invocation.kind(), ToolKind::ReadFile);
        assert!(parsed.has_incomplete());
        assert!(!parsed.thought.contains("a.txt"));
    }

    #[test]
    fn test_plain_text_is_not_incomplete() {
        let parsed = parse_response("Just ordinary prose, no tool calls here.");
        assert!(parsed.calls.is_empty());
        assert!(!parsed.has_incomplete());
        assert_eq!(parsed.thought, "Just ordinary prose, no tool calls here.");
    }

    #[test]
    fn test_insert_code_line_parsed() {
        let text =
            "<insert_code><path>a.py</path><line>3</line><content>x = 1</content></insert_code>";
        let parsed = parse_response(text);
        match &parsed.calls[0].invocation {
            ToolInvocation::InsertCode { line, .. } => assert_eq!(*line, 3),
            other => panic!("unexpected invocation: {:?}", other),
        }
    }

    #[test]
    fn test_non_numeric_line_rejected() {
        let text =
            "<insert_code><path>a.py</path><line>abc</line><content>x</content></insert_code>";
        let parsed = parse_response(text);
        assert!(parsed.calls.is_empty());
        assert!(parsed.has_incomplete());
        assert!(parsed.incomplete[0].reason.contains("positive integer"));
    }

    #[test]
    fn test_inverted_replace_range_rejected() {
        let text = "<replace_code><path>a.py</path><start_line>9</start_line>\
                    <end_line>3</end_line><content>x</content></replace_code>";
        let parsed = parse_response(text);
        assert!(parsed.calls.is_empty());
        assert!(parsed.has_incomplete());
    }

    #[test]
    fn test_zero_field_tags() {
        let parsed = parse_response("<show_todos></show_todos>");
        assert_eq!(parsed.calls.len(), 1);
        assert_eq!(parsed.calls[0].invocation, ToolInvocation::ShowTodos);

        let parsed = parse_response("<provider_list_tools>\n</provider_list_tools>");
        assert_eq!(parsed.calls.len(), 1);
    }

    #[test]
    fn test_add_todo_defaults() {
        let parsed = parse_response("<add_todo><title>Ship it</title></add_todo>");
        match &parsed.calls[0].invocation {
            ToolInvocation::AddTodo {
                title,
                description,
                priority,
            } => {
                assert_eq!(title, "Ship it");
                assert!(description.is_empty());
                assert_eq!(priority, "medium");
            }
            other => panic!("unexpected invocation: {:?}", other),
        }
    }

    #[test]
    fn test_update_todo_progress_optional() {
        let parsed =
            parse_response("<update_todo><id>ab12</id><status>in_progress</status></update_todo>");
        match &parsed.calls[0].invocation {
            ToolInvocation::UpdateTodo { progress, .. } => assert!(progress.is_none()),
            other => panic!("unexpected invocation: {:?}", other),
        }

        let parsed = parse_response(
            "<update_todo><id>ab12</id><status>completed</status><progress>150</progress></update_todo>",
        );
        assert!(parsed.calls.is_empty());
        assert!(parsed.has_incomplete());
    }

    #[test]
    fn test_task_complete_summary() {
        let parsed =
            parse_response("All done!\n<task_complete><summary>Added tests</summary></task_complete>");
        match &parsed.calls[0].invocation {
            ToolInvocation::TaskComplete { summary } => assert_eq!(summary, "Added tests"),
            other => panic!("unexpected invocation: {:?}", other),
        }
    }

    #[test]
    fn test_provider_call_default_arguments() {
        let parsed = parse_response(
            "<provider_call_tool><server>fs</server><tool>stat</tool></provider_call_tool>",
        );
        match &parsed.calls[0].invocation {
            ToolInvocation::ProviderCallTool { arguments, .. } => assert_eq!(arguments, "{}"),
            other => panic!("unexpected invocation: {:?}", other),
        }
    }

    #[test]
    fn test_complete_and_incomplete_can_coexist() {
        let text = "<read_file><path>a.txt</path></read_file>\n<write_file><path>b.txt</path>";
        let parsed = parse_response(text);
        assert_eq!(parsed.calls.len(), 1);
        assert!(parsed.has_incomplete());
    }

    #[test]
    fn test_mentions_tool_tag() {
        assert!(mentions_tool_tag("<read_file><path>x</path></read_file>"));
        assert!(mentions_tool_tag("partial <execute_command here"));
        assert!(!mentions_tool_tag("Vec<u8> is not a tool"));
    }

    #[test]
    fn test_corrective_feedback_lists_tags() {
        let bad = vec![IncompleteCall {
            tag: "write_file".into(),
            reason: "tag is unclosed or missing required fields".into(),
        }];
        let msg = corrective_feedback(&bad);
        assert!(msg.contains("<write_file>"));
        assert!(msg.contains("incomplete"));
    }
}
