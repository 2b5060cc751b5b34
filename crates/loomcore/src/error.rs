use crate::workflow::NodeId;
use thiserror::Error;

/// Top-level error for a workflow run
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Node(#[from] NodeError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Whether the run-level retry policy should re-attempt the whole run.
    ///
    /// Only transient provider failures qualify. Structural problems
    /// (cycles, unknown node types, missing workflows) and configuration
    /// problems will not change by re-running.
    pub fn is_retriable(&self) -> bool {
        match self {
            EngineError::Node(e) => e.is_retriable(),
            _ => false,
        }
    }
}

/// Errors raised by node executors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NodeError {
    /// Missing or invalid node configuration. Non-retriable.
    #[error("{0}")]
    Configuration(String),

    /// The referenced credential does not exist. Non-retriable.
    #[error("Credential not found: {0}")]
    CredentialNotFound(String),

    /// Transient failure calling an external HTTP endpoint or model
    /// provider. Retriable at run level.
    #[error("Provider error: {0}")]
    TransientProvider(String),

    /// A durable step recorded a result that can no longer be decoded.
    #[error("Step checkpoint error: {0}")]
    Checkpoint(String),
}

impl NodeError {
    pub fn is_retriable(&self) -> bool {
        matches!(self, NodeError::TransientProvider(_))
    }
}

/// Errors in workflow structure or lookup
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkflowError {
    #[error("Workflow not found: {0}")]
    NotFound(String),

    #[error("Workflow contains a cycle; node {0} could not be ordered")]
    CyclicGraph(NodeId),

    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Duplicate node id: {0}")]
    DuplicateNodeId(NodeId),

    #[error(
        "Duplicate connection from {from_node}:{from_output} to {to_node}:{to_input}"
    )]
    DuplicateConnection {
        from_node: NodeId,
        from_output: String,
        to_node: NodeId,
        to_input: String,
    },
}
