use crate::context::Context;
use crate::source::CredentialSource;
use crate::status::StatusPublisher;
use crate::step::StepRuntime;
use crate::workflow::{NodeId, NodeKind};
use crate::NodeError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Capability trait every node executor implements.
///
/// Executors share a common contract: publish a `loading` status first,
/// validate configuration (non-retriable on missing fields), render
/// template fields against the incoming context, perform their unit of
/// work inside a durable step, and publish a terminal `success`/`error`
/// status. Only the unit of work and the output payload shape differ
/// between kinds.
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    /// The node kind this executor handles
    fn kind(&self) -> NodeKind;

    /// Execute the node, returning the incoming context augmented with
    /// this node's output entry.
    async fn execute(&self, ctx: ExecutorContext) -> Result<Context, NodeError>;
}

/// Everything an executor needs for one node invocation
pub struct ExecutorContext {
    pub node_id: NodeId,
    /// Node configuration as authored in the editor
    pub data: Map<String, Value>,
    /// Reference into the credential store, if the node carries one
    pub credential_id: Option<String>,
    /// Accumulated outputs of upstream nodes
    pub context: Context,
    /// Durable step runtime scoped to the current run
    pub steps: StepRuntime,
    /// Status publisher scoped to this node's kind channel
    pub publisher: StatusPublisher,
    pub credentials: Arc<dyn CredentialSource>,
}

impl ExecutorContext {
    /// Read a non-empty string field from the node configuration.
    pub fn string_field(&self, name: &str) -> Option<String> {
        self.data
            .get(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
    }
}
