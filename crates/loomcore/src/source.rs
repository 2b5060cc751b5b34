//! Collaborator traits for external storage.
//!
//! The engine does not own a persistence layer. Graph and credential
//! lookups go through these seams; the in-memory implementations back
//! tests and the CLI, and a real deployment substitutes its own.

use crate::workflow::{Workflow, WorkflowId};
use crate::{NodeError, WorkflowError};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Loads workflow graphs from the persistence layer
#[async_trait]
pub trait GraphSource: Send + Sync {
    async fn load_graph(&self, workflow_id: &str) -> Result<Workflow, WorkflowError>;
}

/// Resolves externally-stored secrets by credential id
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn resolve(&self, credential_id: &str) -> Result<String, NodeError>;
}

/// In-memory graph source
#[derive(Default)]
pub struct MemoryGraphSource {
    workflows: RwLock<HashMap<WorkflowId, Workflow>>,
}

impl MemoryGraphSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, workflow: Workflow) {
        let mut workflows = self.workflows.write().await;
        workflows.insert(workflow.id.clone(), workflow);
    }
}

#[async_trait]
impl GraphSource for MemoryGraphSource {
    async fn load_graph(&self, workflow_id: &str) -> Result<Workflow, WorkflowError> {
        let workflows = self.workflows.read().await;
        workflows
            .get(workflow_id)
            .cloned()
            .ok_or_else(|| WorkflowError::NotFound(workflow_id.to_string()))
    }
}

/// In-memory credential source
#[derive(Default)]
pub struct MemoryCredentialSource {
    secrets: RwLock<HashMap<String, String>>,
}

impl MemoryCredentialSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, credential_id: impl Into<String>, secret: impl Into<String>) {
        let mut secrets = self.secrets.write().await;
        secrets.insert(credential_id.into(), secret.into());
    }
}

#[async_trait]
impl CredentialSource for MemoryCredentialSource {
    async fn resolve(&self, credential_id: &str) -> Result<String, NodeError> {
        let secrets = self.secrets.read().await;
        secrets
            .get(credential_id)
            .cloned()
            .ok_or_else(|| NodeError::CredentialNotFound(credential_id.to_string()))
    }
}
