use crate::NodeError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Ledger of completed step results, keyed by run key and step name.
///
/// The run key is the trigger event id, so every attempt of the same run
/// shares one ledger. Implementations back this with whatever durability
/// the deployment needs; [`MemoryStepStore`] keeps it in process memory.
#[async_trait]
pub trait StepStore: Send + Sync {
    async fn load(&self, run_key: &str, step_name: &str) -> Option<Value>;
    async fn save(&self, run_key: &str, step_name: &str, value: Value);
}

/// In-memory step ledger
#[derive(Default)]
pub struct MemoryStepStore {
    entries: Mutex<HashMap<String, HashMap<String, Value>>>,
}

impl MemoryStepStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StepStore for MemoryStepStore {
    async fn load(&self, run_key: &str, step_name: &str) -> Option<Value> {
        let entries = self.entries.lock().await;
        entries.get(run_key)?.get(step_name).cloned()
    }

    async fn save(&self, run_key: &str, step_name: &str, value: Value) {
        let mut entries = self.entries.lock().await;
        entries
            .entry(run_key.to_string())
            .or_default()
            .insert(step_name.to_string(), value);
    }
}

/// Checkpointing substrate executors use to wrap side-effecting work.
///
/// `run` and `sleep` are the engine's only suspension points. A step whose
/// result was recorded on an earlier attempt of the same run returns the
/// recorded result without re-executing, so retries are incremental and
/// externally-visible side effects happen at most once per run.
#[derive(Clone)]
pub struct StepRuntime {
    store: Arc<dyn StepStore>,
    run_key: String,
}

impl StepRuntime {
    pub fn new(store: Arc<dyn StepStore>, run_key: impl Into<String>) -> Self {
        Self {
            store,
            run_key: run_key.into(),
        }
    }

    /// Execute `work` once per run, memoizing its result under `step_name`.
    ///
    /// Failures are not recorded; a failed step re-executes on the next
    /// attempt.
    pub async fn run<T, F, Fut>(&self, step_name: &str, work: F) -> Result<T, NodeError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, NodeError>> + Send,
    {
        if let Some(recorded) = self.store.load(&self.run_key, step_name).await {
            tracing::debug!("Step '{}' already recorded, skipping", step_name);
            return serde_json::from_value(recorded).map_err(|e| {
                NodeError::Checkpoint(format!(
                    "Recorded result for step '{}' could not be decoded: {}",
                    step_name, e
                ))
            });
        }

        let result = work().await?;
        let value = serde_json::to_value(&result).map_err(|e| {
            NodeError::Checkpoint(format!(
                "Result of step '{}' could not be recorded: {}",
                step_name, e
            ))
        })?;
        self.store.save(&self.run_key, step_name, value).await;
        Ok(result)
    }

    /// Suspend progress for `duration` without occupying a worker thread.
    ///
    /// The completed delay is recorded, so a retried attempt does not
    /// sleep again.
    pub async fn sleep(&self, step_name: &str, duration: Duration) {
        if self.store.load(&self.run_key, step_name).await.is_some() {
            tracing::debug!("Sleep '{}' already recorded, skipping", step_name);
            return;
        }
        tokio::time::sleep(duration).await;
        self.store
            .save(&self.run_key, step_name, Value::Bool(true))
            .await;
    }
}
