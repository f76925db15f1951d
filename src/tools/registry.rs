// Tool handler trait and kind -> handler registry

use crate::session::cancel::CancellationSignal;
use crate::tools::types::{ToolInvocation, ToolKind, ToolResult};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Executes one family of tool invocations.
///
/// Handlers may run for a while (commands, remote calls) and must poll
/// the cancellation signal. Returning Err is equivalent to an
/// error-status result; the executor converts it.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn execute(
        &self,
        invocation: &ToolInvocation,
        cancel: &CancellationSignal,
    ) -> Result<ToolResult>;
}

/// Maps tool kinds to their handlers.
#[derive(Default)]
pub struct ToolRegistry {
    handlers: HashMap<ToolKind, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one handler for several kinds (handlers typically cover a
    /// family, e.g. all filesystem tools).
    pub fn register(&mut self, kinds: &[ToolKind], handler: Arc<dyn ToolHandler>) {
        for &kind in kinds {
            self.handlers.insert(kind, Arc::clone(&handler));
        }
    }

    pub fn get(&self, kind: ToolKind) -> Option<Arc<dyn ToolHandler>> {
        self.handlers.get(&kind).cloned()
    }

    pub fn registered_kinds(&self) -> Vec<ToolKind> {
        self.handlers.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoHandler;

    #[async_trait]
    impl ToolHandler for EchoHandler {
        async fn execute(
            &self,
            invocation: &ToolInvocation,
            _cancel: &CancellationSignal,
        ) -> Result<ToolResult> {
            Ok(ToolResult::success(invocation.describe()))
        }
    }

    #[tokio::test]
    async fn test_register_and_dispatch() {
        let mut registry = ToolRegistry::new();
        registry.register(
            &[ToolKind::ReadFile, ToolKind::ListDirectory],
            Arc::new(EchoHandler),
        );

        let handler = registry.get(ToolKind::ReadFile).expect("registered");
        let result = handler
            .execute(
                &ToolInvocation::ReadFile { path: "x".into() },
                &CancellationSignal::new(),
            )
            .await
            .unwrap();
        assert_eq!(result.message, "read_file x");

        assert!(registry.get(ToolKind::ExecuteCommand).is_none());
        assert_eq!(registry.registered_kinds().len(), 2);
    }
}
