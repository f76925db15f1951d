// Conversation context under a token budget
//
// The manager owns the full turn history plus a small set of keyed
// entries (project facts, environment notes) and a rolling summary of
// everything that has been folded away. Optimization is lossy but never
// fails: when the estimate crosses the budget, old turns collapse into
// the summary while recent turns, recent tool traffic, and recent
// error/success reports survive.

pub mod tokens;

use crate::provider::{ChatMessage, Role};
use crate::tools::parser::mentions_tool_tag;
use tokens::{CharEstimator, TokenEstimator};

/// Inclusive bounds on the configurable budget.
pub const BUDGET_MIN: usize = 4_096;
pub const BUDGET_MAX: usize = 200_000;
pub const BUDGET_DEFAULT: usize = 180_000;

// Retention rule during optimization.
const RETAIN_RECENT_TURNS: usize = 20;
const RETAIN_TOOL_TURNS: usize = 10;
const RETAIN_KEYWORD_TURNS: usize = 5;

// Optimize once the estimate passes this fraction of the budget.
const OPTIMIZE_THRESHOLD: f64 = 0.9;

const SUMMARY_MAX_CHARS: usize = 2_000;
const SUMMARY_SNIPPET_CHARS: usize = 100;

const OUTCOME_KEYWORDS: &[&str] = &["error", "failed", "success", "complete", "exception"];

/// Keyed side-channel entry pinned into the provider prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryPriority {
    Normal,
    High,
}

#[derive(Debug, Clone)]
struct ContextEntry {
    key: String,
    content: String,
    priority: EntryPriority,
}

#[derive(Debug, Clone)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

/// Point-in-time view of the budget, for the REPL's /context command.
#[derive(Debug, Clone)]
pub struct ContextStats {
    pub turns: usize,
    pub estimated_tokens: usize,
    pub budget: usize,
    pub summary_chars: usize,
}

pub struct ContextBudgetManager {
    turns: Vec<Turn>,
    entries: Vec<ContextEntry>,
    summary: String,
    budget: usize,
    estimator: Box<dyn TokenEstimator>,
}

impl ContextBudgetManager {
    /// Budget is clamped into [BUDGET_MIN, BUDGET_MAX].
    pub fn new(budget: usize) -> Self {
        Self::with_estimator(budget, Box::new(CharEstimator))
    }

    pub fn with_estimator(budget: usize, estimator: Box<dyn TokenEstimator>) -> Self {
        Self {
            turns: Vec::new(),
            entries: Vec::new(),
            summary: String::new(),
            budget: budget.clamp(BUDGET_MIN, BUDGET_MAX),
            estimator,
        }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Append a turn, optimizing afterwards if the estimate crossed the
    /// threshold.
    pub fn add_turn(&mut self, role: Role, content: impl Into<String>) {
        self.turns.push(Turn {
            role,
            content: content.into(),
        });
        if self.estimated_tokens() as f64 > self.budget as f64 * OPTIMIZE_THRESHOLD {
            self.optimize();
        }
    }

    /// Insert or replace a keyed entry.
    pub fn set_entry(&mut self, key: &str, content: impl Into<String>, priority: EntryPriority) {
        let content = content.into();
        if let Some(existing) = self.entries.iter_mut().find(|e| e.key == key) {
            existing.content = content;
            existing.priority = priority;
        } else {
            self.entries.push(ContextEntry {
                key: key.to_string(),
                content,
                priority,
            });
        }
    }

    pub fn estimated_tokens(&self) -> usize {
        let turns: usize = self
            .turns
            .iter()
            .map(|t| self.estimator.count(&t.content))
            .sum();
        let entries: usize = self
            .entries
            .iter()
            .map(|e| self.estimator.count(&e.content))
            .sum();
        turns + entries + self.estimator.count(&self.summary)
    }

    pub fn stats(&self) -> ContextStats {
        ContextStats {
            turns: self.turns.len(),
            estimated_tokens: self.estimated_tokens(),
            budget: self.budget,
            summary_chars: self.summary.chars().count(),
        }
    }

    /// Collapse old turns into the rolling summary. Retains the most
    /// recent turns, the most recent tool-bearing turns, and the most
    /// recent turns that mention an outcome keyword; everything else is
    /// folded, oldest first. Never fails.
    pub fn optimize(&mut self) {
        if self.turns.is_empty() {
            return;
        }
        let total = self.turns.len();

        let mut keep = vec![false; total];
        for i in total.saturating_sub(RETAIN_RECENT_TURNS)..total {
            keep[i] = true;
        }

        let tool_turns: Vec<usize> = (0..total)
            .filter(|&i| {
                mentions_tool_tag(&self.turns[i].content)
                    || self.turns[i].content.starts_with("Tool results")
            })
            .collect();
        for &i in tool_turns.iter().rev().take(RETAIN_TOOL_TURNS) {
            keep[i] = true;
        }

        let keyword_turns: Vec<usize> = (0..total)
            .filter(|&i| {
                let lower = self.turns[i].content.to_lowercase();
                OUTCOME_KEYWORDS.iter().any(|k| lower.contains(k))
            })
            .collect();
        for &i in keyword_turns.iter().rev().take(RETAIN_KEYWORD_TURNS) {
            keep[i] = true;
        }

        let mut retained = Vec::with_capacity(total);
        for (i, turn) in std::mem::take(&mut self.turns).into_iter().enumerate() {
            if keep[i] {
                retained.push(turn);
            } else {
                self.fold_into_summary(&turn);
            }
        }
        self.turns = retained;

        // Still over budget: keep folding from the front, but never fold
        // away the final turn.
        while self.turns.len() > 1 && self.estimated_tokens() > self.budget {
            let turn = self.turns.remove(0);
            self.fold_into_summary(&turn);
        }

        // Last resort: shed normal-priority entries. High-priority entries
        // are pinned for the life of the session.
        if self.estimated_tokens() > self.budget {
            self.entries.retain(|e| e.priority == EntryPriority::High);
        }

        tracing::debug!(
            retained = self.turns.len(),
            folded = total - self.turns.len(),
            estimated_tokens = self.estimated_tokens(),
            "context optimized"
        );
    }

    fn fold_into_summary(&mut self, turn: &Turn) {
        let snippet: String = turn.content.chars().take(SUMMARY_SNIPPET_CHARS).collect();
        let snippet = snippet.replace('\n', " ");
        self.summary
            .push_str(&format!("- {}: {}\n", turn.role.as_str(), snippet));

        // Trim oldest summary lines once the cap is passed.
        while self.summary.chars().count() > SUMMARY_MAX_CHARS {
            match self.summary.find('\n') {
                Some(pos) => self.summary.drain(..=pos),
                None => break,
            };
        }
    }

    /// Assemble the provider message list: system prompt, summary,
    /// pinned entries, then the retained turns in order.
    pub fn messages_for_provider(&self, system_prompt: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.turns.len() + 3);
        if !system_prompt.is_empty() {
            messages.push(ChatMessage::system(system_prompt));
        }
        if !self.summary.is_empty() {
            messages.push(ChatMessage::system(format!(
                "Conversation so far (oldest turns, condensed):\n{}",
                self.summary
            )));
        }
        for entry in &self.entries {
            messages.push(ChatMessage::system(format!(
                "[{}] {}",
                entry.key, entry.content
            )));
        }
        for turn in &self.turns {
            messages.push(ChatMessage {
                role: turn.role,
                content: turn.content.clone(),
            });
        }
        messages
    }

    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }

    #[cfg(test)]
    fn summary(&self) -> &str {
        &self.summary
    }
}
