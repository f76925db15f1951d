// provider_list_tools / provider_call_tool / provider_read_resource

use crate::session::cancel::CancellationSignal;
use crate::tools::provider::ToolProviderRegistry;
use crate::tools::registry::ToolHandler;
use crate::tools::types::{ToolInvocation, ToolKind, ToolResult};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub struct ProviderTools {
    registry: Arc<ToolProviderRegistry>,
}

impl ProviderTools {
    pub const KINDS: &'static [ToolKind] = &[
        ToolKind::ProviderListTools,
        ToolKind::ProviderCallTool,
        ToolKind::ProviderReadResource,
    ];

    pub fn new(registry: Arc<ToolProviderRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl ToolHandler for ProviderTools {
    async fn execute(
        &self,
        invocation: &ToolInvocation,
        _cancel: &CancellationSignal,
    ) -> Result<ToolResult> {
        match invocation {
            ToolInvocation::ProviderListTools => {
                Ok(ToolResult::success(self.registry.describe_tools().await))
            }
            ToolInvocation::ProviderCallTool {
                server,
                tool,
                arguments,
            } => {
                let parsed: serde_json::Value = match serde_json::from_str(arguments) {
                    Ok(v) => v,
                    Err(e) => {
                        return Ok(ToolResult::error(format!(
                            "arguments must be valid JSON: {}",
                            e
                        )))
                    }
                };
                match self.registry.call_tool(server, tool, parsed).await {
                    Ok(output) => Ok(ToolResult::success(output)),
                    Err(e) => Ok(ToolResult::error(e.to_string())),
                }
            }
            ToolInvocation::ProviderReadResource { server, uri } => {
                match self.registry.read_resource(server, uri).await {
                    Ok(output) => Ok(ToolResult::success(output)),
                    Err(e) => Ok(ToolResult::error(e.to_string())),
                }
            }
            other => anyhow::bail!("provider handler cannot execute {}", other.kind()),
        }
    }
}
