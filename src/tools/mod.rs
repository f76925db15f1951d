// Tool system: extraction, permissions, execution
//
// parser      - tag extraction from model replies
// permissions - mode-based gating
// registry    - handler trait + dispatch table
// executor    - gate, confirm, dispatch, aggregate
// failure     - command-output failure heuristics
// todo        - session task store
// provider    - external tool providers over stdio
// implementations - the built-in handlers

pub mod executor;
pub mod failure;
pub mod implementations;
pub mod parser;
pub mod permissions;
pub mod provider;
pub mod registry;
pub mod todo;
pub mod types;

pub use executor::{aggregate_results, Confirmer, StdinConfirmer, ToolExecutor};
pub use parser::{parse_response, ParsedResponse};
pub use permissions::{classify, PermissionCheck, PermissionMode};
pub use registry::{ToolHandler, ToolRegistry};
pub use types::{ParsedCall, ToolInvocation, ToolKind, ToolResult, ToolStatus};
