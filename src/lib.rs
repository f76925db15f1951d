// ByteForge - agent execution core for an LLM coding assistant
//
// The crate is organized around one conversation loop (session) that
// extracts tool calls from model replies (tools::parser), gates them by
// permission mode (tools::permissions), executes them (tools::executor),
// and feeds results back under a context token budget (context).

pub mod config;
pub mod context;
pub mod errors;
pub mod provider;
pub mod session;
pub mod tools;

pub use errors::AgentError;
