//! Trigger node executors.
//!
//! Trigger kinds mark the entry point of a workflow; the inbound event's
//! payload is already seeded into the context by the runner, so these
//! executors pass the context through unchanged. They still honor the
//! status-event contract so observers see them progress.

use async_trait::async_trait;
use loomcore::{Context, ExecutorContext, NodeError, NodeExecutor, NodeKind, NodeStatus};

fn pass_through(kind: NodeKind, ctx: ExecutorContext) -> Context {
    ctx.publisher.publish(&ctx.node_id, NodeStatus::Loading);
    tracing::debug!(node_id = %ctx.node_id, %kind, "Trigger node passing through");
    ctx.publisher.publish(&ctx.node_id, NodeStatus::Success);
    ctx.context
}

/// Entry-point node placed on every new workflow
pub struct InitialExecutor;

#[async_trait]
impl NodeExecutor for InitialExecutor {
    fn kind(&self) -> NodeKind {
        NodeKind::Initial
    }

    async fn execute(&self, ctx: ExecutorContext) -> Result<Context, NodeError> {
        Ok(pass_through(self.kind(), ctx))
    }
}

/// Trigger for runs started by hand from the editor
pub struct ManualTriggerExecutor;

#[async_trait]
impl NodeExecutor for ManualTriggerExecutor {
    fn kind(&self) -> NodeKind {
        NodeKind::ManualTrigger
    }

    async fn execute(&self, ctx: ExecutorContext) -> Result<Context, NodeError> {
        Ok(pass_through(self.kind(), ctx))
    }
}

/// Trigger for runs started by a Google Form submission; the form
/// response arrives as the run's initial context.
pub struct GoogleFormTriggerExecutor;

#[async_trait]
impl NodeExecutor for GoogleFormTriggerExecutor {
    fn kind(&self) -> NodeKind {
        NodeKind::GoogleFormTrigger
    }

    async fn execute(&self, ctx: ExecutorContext) -> Result<Context, NodeError> {
        Ok(pass_through(self.kind(), ctx))
    }
}
