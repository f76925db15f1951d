// Launch configuration for external tool providers

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolProviderConfig {
    /// Executable to launch.
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Extra environment variables for the child.
    #[serde(default)]
    pub env: HashMap<String, String>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}
