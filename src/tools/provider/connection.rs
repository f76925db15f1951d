// One tool-provider child process, newline-delimited JSON-RPC 2.0
//
// Requests carry incrementing ids; responses may arrive interleaved with
// notifications, so reads skip anything whose id does not match. Every
// request has a hard timeout so a wedged provider cannot stall the loop.

use super::config::ToolProviderConfig;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A tool advertised by a provider.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteTool {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

pub struct ToolProviderConnection {
    name: String,
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
    tools: Vec<RemoteTool>,
}

/// Serialize one request line.
fn build_request(id: u64, method: &str, params: Value) -> String {
    let mut line = json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params,
    })
    .to_string();
    line.push('\n');
    line
}

/// Parse one response line into (id, result-or-error-message). Lines
/// without an id (notifications) return None.
fn parse_response(line: &str) -> Result<Option<(u64, Result<Value, String>)>> {
    let value: Value = serde_json::from_str(line).context("provider sent invalid JSON")?;
    let Some(id) = value.get("id").and_then(Value::as_u64) else {
        return Ok(None);
    };
    if let Some(err) = value.get("error") {
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown provider error")
            .to_string();
        return Ok(Some((id, Err(message))));
    }
    let result = value.get("result").cloned().unwrap_or(Value::Null);
    Ok(Some((id, Ok(result))))
}

/// Render a tools/call or resources/read result as text. Providers
/// usually return `content` blocks with a `text` field; anything else
/// falls back to pretty JSON.
fn render_result(result: &Value, block_key: &str) -> String {
    if let Some(blocks) = result.get(block_key).and_then(Value::as_array) {
        let texts: Vec<&str> = blocks
            .iter()
            .filter_map(|b| b.get("text").and_then(Value::as_str))
            .collect();
        if !texts.is_empty() {
            return texts.join("\n");
        }
    }
    serde_json::to_string_pretty(result).unwrap_or_else(|_| result.to_string())
}

impl ToolProviderConnection {
    /// Launch the provider and fetch its tool list.
    pub async fn spawn(name: &str, config: &ToolProviderConfig) -> Result<Self> {
        let mut child = Command::new(&config.command)
            .args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to launch tool provider '{}'", name))?;

        let stdin = child.stdin.take().context("provider stdin missing")?;
        let stdout = child.stdout.take().context("provider stdout missing")?;

        let mut conn = Self {
            name: name.to_string(),
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            next_id: 1,
            tools: Vec::new(),
        };
        conn.refresh_tools().await?;
        tracing::info!(provider = name, tools = conn.tools.len(), "tool provider connected");
        Ok(conn)
    }

    async fn request(&mut self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id;
        self.next_id += 1;

        let line = build_request(id, method, params);
        self.stdin
            .write_all(line.as_bytes())
            .await
            .with_context(|| format!("failed to write to provider '{}'", self.name))?;
        self.stdin.flush().await?;

        let reply = tokio::time::timeout(REQUEST_TIMEOUT, async {
            loop {
                let Some(line) = self.stdout.next_line().await? else {
                    bail!("provider '{}' closed its output", self.name);
                };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_response(&line)? {
                    Some((reply_id, outcome)) if reply_id == id => return Ok(outcome),
                    Some(_) | None => continue,
                }
            }
        })
        .await
        .map_err(|_| anyhow::anyhow!("provider '{}' did not answer within 10s", self.name))??;

        reply.map_err(|e| anyhow::anyhow!("provider '{}' error: {}", self.name, e))
    }

    /// Refresh the advertised tool list via tools/list.
    pub async fn refresh_tools(&mut self) -> Result<()> {
        let result = self.request("tools/list", json!({})).await?;
        let tools = result.get("tools").cloned().unwrap_or(Value::Array(vec![]));
        self.tools = serde_json::from_value(tools)
            .with_context(|| format!("provider '{}' sent a malformed tool list", self.name))?;
        Ok(())
    }

    pub fn tools(&self) -> &[RemoteTool] {
        &self.tools
    }

    /// Invoke one remote tool via tools/call.
    pub async fn call_tool(&mut self, tool: &str, arguments: Value) -> Result<String> {
        let result = self
            .request("tools/call", json!({ "name": tool, "arguments": arguments }))
            .await?;
        Ok(render_result(&result, "content"))
    }

    /// Fetch a resource via resources/read.
    pub async fn read_resource(&mut self, uri: &str) -> Result<String> {
        let result = self.request("resources/read", json!({ "uri": uri })).await?;
        Ok(render_result(&result, "contents"))
    }

    pub async fn shutdown(mut self) {
        let _ = self.child.kill().await;
    }
}
