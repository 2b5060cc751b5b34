use async_trait::async_trait;
use chrono::{DateTime, Utc};
use loomcore::WorkflowId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Lifecycle status of one execution record.
///
/// Strictly linear: RUNNING moves to exactly one of SUCCESS or FAILED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Running,
    Success,
    Failed,
}

/// Persisted summary of one run's lifecycle and outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: Uuid,
    #[serde(rename = "workflowId")]
    pub workflow_id: WorkflowId,
    #[serde(rename = "triggerEventId")]
    pub trigger_event_id: String,
    pub status: ExecutionStatus,
    #[serde(rename = "startedAt")]
    pub started_at: DateTime<Utc>,
    #[serde(rename = "completedAt")]
    pub completed_at: Option<DateTime<Utc>>,
    pub output: Option<Value>,
    pub error: Option<String>,
    #[serde(rename = "errorStack")]
    pub error_stack: Option<String>,
}

/// Storage collaborator for execution records.
///
/// `begin` upserts by trigger event id: a re-triggered run reuses the
/// lookup key so the record reflects only the final attempt sequence's
/// outcome. The runner calls exactly one of `complete`/`fail` per run.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    async fn begin(&self, workflow_id: &str, trigger_event_id: &str) -> Uuid;
    async fn complete(&self, record_id: Uuid, output: Value);
    async fn fail(&self, record_id: Uuid, error: String, error_stack: String);
    async fn find_by_trigger(&self, trigger_event_id: &str) -> Option<ExecutionRecord>;
}

/// In-memory execution record store, keyed by trigger event id
#[derive(Default)]
pub struct MemoryExecutionStore {
    records: Mutex<HashMap<String, ExecutionRecord>>,
}

impl MemoryExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExecutionStore for MemoryExecutionStore {
    async fn begin(&self, workflow_id: &str, trigger_event_id: &str) -> Uuid {
        let mut records = self.records.lock().await;
        let id = records
            .get(trigger_event_id)
            .map(|existing| existing.id)
            .unwrap_or_else(Uuid::new_v4);
        records.insert(
            trigger_event_id.to_string(),
            ExecutionRecord {
                id,
                workflow_id: workflow_id.to_string(),
                trigger_event_id: trigger_event_id.to_string(),
                status: ExecutionStatus::Running,
                started_at: Utc::now(),
                completed_at: None,
                output: None,
                error: None,
                error_stack: None,
            },
        );
        id
    }

    async fn complete(&self, record_id: Uuid, output: Value) {
        let mut records = self.records.lock().await;
        if let Some(record) = records.values_mut().find(|r| r.id == record_id) {
            record.status = ExecutionStatus::Success;
            record.completed_at = Some(Utc::now());
            record.output = Some(output);
        }
    }

    async fn fail(&self, record_id: Uuid, error: String, error_stack: String) {
        let mut records = self.records.lock().await;
        if let Some(record) = records.values_mut().find(|r| r.id == record_id) {
            record.status = ExecutionStatus::Failed;
            record.completed_at = Some(Utc::now());
            record.error = Some(error);
            record.error_stack = Some(error_stack);
        }
    }

    async fn find_by_trigger(&self, trigger_event_id: &str) -> Option<ExecutionRecord> {
        let records = self.records.lock().await;
        records.get(trigger_event_id).cloned()
    }
}
