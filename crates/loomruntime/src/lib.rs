//! Workflow execution runtime
//!
//! This crate turns a workflow graph into one durable sequential run:
//! it orders nodes with a deterministic topological sort, dispatches each
//! node through the closed executor registry, maintains the execution
//! record, and applies the run-level retry policy.

mod record;
mod registry;
mod runner;
pub mod sort;

pub use record::{ExecutionRecord, ExecutionStatus, ExecutionStore, MemoryExecutionStore};
pub use registry::ExecutorRegistry;
pub use runner::{RunOutcome, RunnerConfig, TriggerEvent, WorkflowRunner};
