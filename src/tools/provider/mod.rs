// External tool providers
//
// A provider is a child process speaking newline-delimited JSON-RPC 2.0
// over stdio. The agent exposes three tools on top of it:
// provider_list_tools, provider_call_tool, provider_read_resource.
//
// - ToolProviderConnection: one child process
// - ToolProviderRegistry: all configured providers, by name
// - ToolProviderConfig: launch configuration (command, args, env)

pub mod config;
pub mod connection;
pub mod registry;

pub use config::ToolProviderConfig;
pub use connection::{RemoteTool, ToolProviderConnection};
pub use registry::ToolProviderRegistry;
