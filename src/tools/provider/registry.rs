// All configured tool providers, addressed by name

use super::config::ToolProviderConfig;
use super::connection::ToolProviderConnection;
use anyhow::{bail, Result};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Connected providers. A provider that fails to launch is skipped with
/// a warning; the rest of the session works without it.
#[derive(Default)]
pub struct ToolProviderRegistry {
    connections: HashMap<String, Mutex<ToolProviderConnection>>,
}

impl ToolProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn from_config(configs: &HashMap<String, ToolProviderConfig>) -> Self {
        let mut registry = Self::new();
        for (name, config) in configs {
            if !config.enabled {
                tracing::debug!(provider = %name, "skipping disabled tool provider");
                continue;
            }
            match ToolProviderConnection::spawn(name, config).await {
                Ok(conn) => {
                    registry.connections.insert(name.clone(), Mutex::new(conn));
                }
                Err(e) => {
                    tracing::warn!(provider = %name, error = %e, "tool provider failed to start");
                }
            }
        }
        registry
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Text listing of every advertised tool across providers.
    pub async fn describe_tools(&self) -> String {
        if self.connections.is_empty() {
            return "No tool providers configured.".to_string();
        }
        let mut out = String::new();
        let mut names: Vec<&String> = self.connections.keys().collect();
        names.sort();
        for name in names {
            let conn = self.connections[name].lock().await;
            out.push_str(&format!("{} ({} tools):\n", name, conn.tools().len()));
            for tool in conn.tools() {
                match &tool.description {
                    Some(desc) => out.push_str(&format!("  {} - {}\n", tool.name, desc)),
                    None => out.push_str(&format!("  {}\n", tool.name)),
                }
            }
        }
        out
    }

    pub async fn call_tool(&self, server: &str, tool: &str, arguments: Value) -> Result<String> {
        let Some(conn) = self.connections.get(server) else {
            bail!("unknown tool provider '{}'", server);
        };
        conn.lock().await.call_tool(tool, arguments).await
    }

    pub async fn read_resource(&self, server: &str, uri: &str) -> Result<String> {
        let Some(conn) = self.connections.get(server) else {
            bail!("unknown tool provider '{}'", server);
        };
        conn.lock().await.read_resource(uri).await
    }

    pub async fn shutdown(self) {
        for (name, conn) in self.connections {
            tracing::debug!(provider = %name, "shutting down tool provider");
            conn.into_inner().shutdown().await;
        }
    }
}
