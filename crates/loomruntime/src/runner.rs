use crate::record::ExecutionStore;
use crate::registry::ExecutorRegistry;
use crate::sort;
use loomcore::{
    Context, CredentialSource, EngineError, ExecutorContext, GraphSource, NodeId, StatusBus,
    StepRuntime, StepStore, Workflow, WorkflowError,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Inbound event that starts a run.
///
/// The trigger event id doubles as the idempotency key: the execution
/// record and the durable step ledger are both scoped to it.
#[derive(Debug, Clone)]
pub struct TriggerEvent {
    pub workflow_id: String,
    pub trigger_event_id: String,
    pub initial_context: Option<Context>,
}

/// Final result of a successful run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub record_id: Uuid,
    pub context: Context,
}

/// Run-level retry configuration
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Maximum attempts per run; only retriable failures re-attempt.
    pub max_attempts: u32,
    /// Delay between attempts.
    pub retry_delay: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// Orchestrates one durable workflow run end to end: load, sort, record,
/// execute nodes strictly sequentially, finalize.
pub struct WorkflowRunner {
    graphs: Arc<dyn GraphSource>,
    credentials: Arc<dyn CredentialSource>,
    registry: Arc<ExecutorRegistry>,
    status: Arc<StatusBus>,
    records: Arc<dyn ExecutionStore>,
    steps: Arc<dyn StepStore>,
    config: RunnerConfig,
}

impl WorkflowRunner {
    pub fn new(
        graphs: Arc<dyn GraphSource>,
        credentials: Arc<dyn CredentialSource>,
        registry: Arc<ExecutorRegistry>,
        status: Arc<StatusBus>,
        records: Arc<dyn ExecutionStore>,
        steps: Arc<dyn StepStore>,
        config: RunnerConfig,
    ) -> Self {
        Self {
            graphs,
            credentials,
            registry,
            status,
            records,
            steps,
            config,
        }
    }

    /// Execute one run for the given trigger event.
    ///
    /// Graph loading, validation and sorting happen before the execution
    /// record exists: a missing workflow or a cycle is terminal without
    /// leaving a record behind. After that, up to `max_attempts`
    /// sequential attempts share one step ledger, and exactly one
    /// terminal write hits the record.
    pub async fn run(&self, event: TriggerEvent) -> Result<RunOutcome, EngineError> {
        tracing::info!(
            workflow_id = %event.workflow_id,
            trigger_event_id = %event.trigger_event_id,
            "Starting workflow run"
        );

        let workflow = self.graphs.load_graph(&event.workflow_id).await?;
        workflow.validate()?;
        let order = sort::topological_order(&workflow)?;

        let record_id = self
            .records
            .begin(&event.workflow_id, &event.trigger_event_id)
            .await;

        let mut attempt = 1;
        loop {
            match self.attempt(&workflow, &order, &event).await {
                Ok(context) => {
                    let output: Value = serde_json::to_value(&context)?;
                    self.records.complete(record_id, output).await;
                    tracing::info!(workflow_id = %workflow.id, "Workflow run succeeded");
                    return Ok(RunOutcome { record_id, context });
                }
                Err(error) if error.is_retriable() && attempt < self.config.max_attempts => {
                    tracing::warn!(
                        workflow_id = %workflow.id,
                        attempt,
                        %error,
                        "Attempt failed with a retriable error, re-attempting"
                    );
                    tokio::time::sleep(self.config.retry_delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    tracing::error!(workflow_id = %workflow.id, %error, "Workflow run failed");
                    self.records
                        .fail(record_id, error.to_string(), format!("{error:?}"))
                        .await;
                    return Err(error);
                }
            }
        }
    }

    /// One attempt: iterate the sorted nodes, threading the context
    /// through each executor in turn. Never parallel; later nodes may
    /// depend on context entries of earlier ones even without a declared
    /// connection between them.
    async fn attempt(
        &self,
        workflow: &Workflow,
        order: &[NodeId],
        event: &TriggerEvent,
    ) -> Result<Context, EngineError> {
        let steps = StepRuntime::new(self.steps.clone(), event.trigger_event_id.clone());
        let mut context = event.initial_context.clone().unwrap_or_default();

        for node_id in order {
            let node = workflow
                .find_node(node_id)
                .ok_or_else(|| WorkflowError::NodeNotFound(node_id.clone()))?;
            let executor = self.registry.resolve(node.kind);

            tracing::debug!(node_id = %node.id, kind = %node.kind, "Executing node");
            context = executor
                .execute(ExecutorContext {
                    node_id: node.id.clone(),
                    data: node.data.clone(),
                    credential_id: node.credential_id.clone(),
                    context,
                    steps: steps.clone(),
                    publisher: self.status.publisher(node.kind),
                    credentials: self.credentials.clone(),
                })
                .await?;
        }

        Ok(context)
    }
}
