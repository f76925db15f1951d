// Settings schema with serde defaults

use crate::tools::provider::ToolProviderConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// OpenAI-compatible chat completions endpoint.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// max_tokens sent with each completion request.
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Context token budget; clamped into the supported range at use.
    #[serde(default = "default_context_budget")]
    pub context_budget: usize,

    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Seconds of silence before a stall recovery prompt.
    #[serde(default = "default_quiet_period_secs")]
    pub quiet_period_secs: u64,

    #[serde(default = "default_max_recovery_prompts")]
    pub max_recovery_prompts: usize,

    /// Timeout for execute_command, in seconds.
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,

    /// External tool providers, keyed by name.
    #[serde(default)]
    pub tool_providers: HashMap<String, ToolProviderConfig>,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_output_tokens() -> u32 {
    2_000
}

fn default_context_budget() -> usize {
    crate::context::BUDGET_DEFAULT
}

fn default_max_iterations() -> usize {
    crate::session::DEFAULT_MAX_ITERATIONS
}

fn default_quiet_period_secs() -> u64 {
    15
}

fn default_max_recovery_prompts() -> usize {
    crate::session::stall::RECOVERY_PROMPTS.len()
}

fn default_command_timeout_secs() -> u64 {
    30
}

impl Default for Settings {
    fn default() -> Self {
        // serde defaults and Default must agree; round-trip through an
        // empty document.
        toml::from_str("").expect("empty settings must deserialize")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert!(s.api_url.contains("chat/completions"));
        assert!(s.api_key.is_empty());
        assert_eq!(s.context_budget, 180_000);
        assert_eq!(s.quiet_period_secs, 15);
        assert_eq!(s.max_recovery_prompts, 3);
        assert_eq!(s.command_timeout_secs, 30);
        assert!(s.tool_providers.is_empty());
    }

    #[test]
    fn test_partial_toml_overrides() {
        let s: Settings = toml::from_str(
            r#"
            api_key = "sk-test"
            model = "some-model"
            max_iterations = 10

            [tool_providers.fs]
            command = "provider-fs"
            "#,
        )
        .unwrap();
        assert_eq!(s.api_key, "sk-test");
        assert_eq!(s.model, "some-model");
        assert_eq!(s.max_iterations, 10);
        assert_eq!(s.tool_providers.len(), 1);
        // untouched fields keep their defaults
        assert_eq!(s.context_budget, 180_000);
    }
}
