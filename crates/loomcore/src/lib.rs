//! Core abstractions for the loom workflow engine
//!
//! This crate provides the fundamental types and traits that all other
//! components depend on: the workflow graph model, the execution context
//! threaded between nodes, the error taxonomy with its retriable/non-retriable
//! classification, the durable step runtime, the per-node-kind status
//! broadcaster, and the collaborator traits for graph and credential storage.

mod context;
mod error;
mod node;
pub mod source;
mod status;
mod step;
mod workflow;

pub use context::Context;
pub use error::{EngineError, NodeError, WorkflowError};
pub use node::{ExecutorContext, NodeExecutor};
pub use source::{CredentialSource, GraphSource, MemoryCredentialSource, MemoryGraphSource};
pub use status::{NodeStatus, StatusBus, StatusEvent, StatusPublisher};
pub use step::{MemoryStepStore, StepRuntime, StepStore};
pub use workflow::{Connection, NodeId, NodeKind, NodeSpec, Position, Workflow, WorkflowId};

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
