//! End-to-end engine tests: real executors against local HTTP servers,
//! plus run-level retry behavior with a substituted executor.

use async_trait::async_trait;
use loomcore::{
    Context, EngineError, ExecutorContext, MemoryCredentialSource, MemoryGraphSource,
    MemoryStepStore, NodeError, NodeExecutor, NodeKind, NodeSpec, NodeStatus, StatusBus, Workflow,
    WorkflowError,
};
use loomruntime::{
    ExecutionStatus, ExecutionStore, ExecutorRegistry, MemoryExecutionStore, RunnerConfig,
    TriggerEvent, WorkflowRunner,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;

struct Harness {
    graphs: Arc<MemoryGraphSource>,
    credentials: Arc<MemoryCredentialSource>,
    records: Arc<MemoryExecutionStore>,
    status: Arc<StatusBus>,
    runner: WorkflowRunner,
}

fn harness_with(registry: ExecutorRegistry) -> Harness {
    let graphs = Arc::new(MemoryGraphSource::new());
    let credentials = Arc::new(MemoryCredentialSource::new());
    let records = Arc::new(MemoryExecutionStore::new());
    let status = Arc::new(StatusBus::new(64));
    let runner = WorkflowRunner::new(
        graphs.clone(),
        credentials.clone(),
        Arc::new(registry),
        status.clone(),
        records.clone(),
        Arc::new(MemoryStepStore::new()),
        RunnerConfig {
            max_attempts: 3,
            retry_delay: Duration::from_millis(1),
        },
    );
    Harness {
        graphs,
        credentials,
        records,
        status,
        runner,
    }
}

fn trigger(workflow_id: &str) -> TriggerEvent {
    TriggerEvent {
        workflow_id: workflow_id.to_string(),
        trigger_event_id: "evt-1".to_string(),
        initial_context: None,
    }
}

/// Minimal HTTP server: answers every connection with the given JSON body
/// and records the raw requests it saw.
async fn spawn_server(body: &str) -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let captured = Arc::new(Mutex::new(Vec::new()));

    let body = body.to_string();
    let requests = captured.clone();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };

            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            let headers_end = loop {
                let Ok(n) = socket.read(&mut chunk).await else {
                    break 0;
                };
                if n == 0 {
                    break 0;
                }
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = find_subslice(&buf, b"\r\n\r\n") {
                    break pos + 4;
                }
            };
            if headers_end == 0 {
                continue;
            }

            let headers = String::from_utf8_lossy(&buf[..headers_end]).to_string();
            let content_length = headers
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    if name.eq_ignore_ascii_case("content-length") {
                        value.trim().parse::<usize>().ok()
                    } else {
                        None
                    }
                })
                .unwrap_or(0);
            while buf.len() < headers_end + content_length {
                let Ok(n) = socket.read(&mut chunk).await else {
                    break;
                };
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }

            requests
                .lock()
                .await
                .push(String::from_utf8_lossy(&buf).to_string());

            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
        }
    });

    (base_url, captured)
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[test]
fn standard_registry_wires_every_kind_to_a_matching_executor() {
    let registry = loomnodes::registry();
    for kind in NodeKind::ALL {
        assert_eq!(registry.resolve(kind).kind(), kind);
    }
}

#[tokio::test]
async fn initial_to_http_request_run_succeeds() {
    let (base_url, _) = spawn_server(r#"{"ok":true}"#).await;

    let mut workflow = Workflow::new("scenario-a");
    workflow.add_node(NodeSpec::new("a", NodeKind::Initial));
    workflow.add_node(
        NodeSpec::new("b", NodeKind::HttpRequest)
            .with_data("variableName", json!("httpResult"))
            .with_data("endpoint", json!(base_url)),
    );
    workflow.connect("a", "b").unwrap();
    let workflow_id = workflow.id.clone();

    let harness = harness_with(loomnodes::registry());
    harness.graphs.register(workflow).await;
    let mut http_events = harness.status.subscribe(NodeKind::HttpRequest);

    let outcome = harness.runner.run(trigger(&workflow_id)).await.unwrap();

    let result = outcome.context.get("httpResult").unwrap();
    assert_eq!(result["status"], json!(200));
    assert_eq!(result["data"], json!({"ok": true}));

    let record = harness.records.find_by_trigger("evt-1").await.unwrap();
    assert_eq!(record.status, ExecutionStatus::Success);
    assert!(record.completed_at.is_some());

    assert_eq!(http_events.try_recv().unwrap().status, NodeStatus::Loading);
    assert_eq!(http_events.try_recv().unwrap().status, NodeStatus::Success);
}

#[tokio::test]
async fn gemini_missing_user_prompt_fails_without_retry() {
    let mut workflow = Workflow::new("scenario-b");
    workflow.add_node(NodeSpec::new("a", NodeKind::Initial));
    workflow.add_node(
        NodeSpec::new("b", NodeKind::Gemini)
            .with_data("variableName", json!("summary"))
            .with_credential("cred-1"),
    );
    workflow.connect("a", "b").unwrap();
    let workflow_id = workflow.id.clone();

    let harness = harness_with(loomnodes::registry());
    harness.graphs.register(workflow).await;
    harness.credentials.register("cred-1", "api-key").await;
    let mut gemini_events = harness.status.subscribe(NodeKind::Gemini);

    let err = harness.runner.run(trigger(&workflow_id)).await.unwrap_err();
    assert!(err.to_string().contains("User prompt is missing"));

    let record = harness.records.find_by_trigger("evt-1").await.unwrap();
    assert_eq!(record.status, ExecutionStatus::Failed);
    assert!(record
        .error
        .as_deref()
        .unwrap()
        .contains("User prompt is missing"));

    // One loading and one error event: a non-retriable failure means the
    // node ran exactly once.
    assert_eq!(gemini_events.try_recv().unwrap().status, NodeStatus::Loading);
    assert_eq!(gemini_events.try_recv().unwrap().status, NodeStatus::Error);
    assert!(gemini_events.try_recv().is_err());
}

#[tokio::test]
async fn prompt_templates_substitute_upstream_context_values() {
    let canned = r#"{"candidates":[{"content":{"parts":[{"text":"A fine summary"}]}}]}"#;
    let (base_url, captured) = spawn_server(canned).await;

    let mut workflow = Workflow::new("scenario-c");
    workflow.add_node(NodeSpec::new("a", NodeKind::Initial));
    workflow.add_node(
        NodeSpec::new("b", NodeKind::Gemini)
            .with_data("variableName", json!("summary"))
            .with_data("userPrompt", json!("Summarize: {{trigger.text}}"))
            .with_credential("cred-1"),
    );
    workflow.connect("a", "b").unwrap();
    let workflow_id = workflow.id.clone();

    let registry = ExecutorRegistry {
        gemini: Box::new(loomnodes::GeminiExecutor::new().with_base_url(base_url)),
        ..loomnodes::registry()
    };
    let harness = harness_with(registry);
    harness.graphs.register(workflow).await;
    harness.credentials.register("cred-1", "api-key").await;

    let event = TriggerEvent {
        initial_context: Some(Context::new().with_entry("trigger", json!({"text": "hello loom"}))),
        ..trigger(&workflow_id)
    };
    let outcome = harness.runner.run(event).await.unwrap();

    assert_eq!(
        outcome.context.get("summary"),
        Some(&json!({"text": "A fine summary"}))
    );

    let requests = captured.lock().await;
    assert_eq!(requests.len(), 1);
    assert!(requests[0].contains("Summarize: hello loom"));
}

struct FlakyExecutor {
    attempts: AtomicUsize,
    external_calls: Arc<AtomicUsize>,
}

#[async_trait]
impl NodeExecutor for FlakyExecutor {
    fn kind(&self) -> NodeKind {
        NodeKind::HttpRequest
    }

    async fn execute(&self, ctx: ExecutorContext) -> Result<Context, NodeError> {
        ctx.publisher.publish(&ctx.node_id, NodeStatus::Loading);

        let external_calls = self.external_calls.clone();
        let value: u32 = ctx
            .steps
            .run(&format!("{}:external-call", ctx.node_id), || async move {
                external_calls.fetch_add(1, Ordering::SeqCst);
                Ok(11)
            })
            .await?;

        if self.attempts.fetch_add(1, Ordering::SeqCst) == 0 {
            ctx.publisher.publish(&ctx.node_id, NodeStatus::Error);
            return Err(NodeError::TransientProvider("connection reset".to_string()));
        }

        ctx.publisher.publish(&ctx.node_id, NodeStatus::Success);
        Ok(ctx.context.with_entry("flaky", json!({"value": value})))
    }
}

#[tokio::test]
async fn transient_failure_retries_without_repeating_durable_steps() {
    let external_calls = Arc::new(AtomicUsize::new(0));

    let mut workflow = Workflow::new("retry");
    workflow.add_node(NodeSpec::new("a", NodeKind::Initial));
    workflow.add_node(NodeSpec::new("b", NodeKind::HttpRequest));
    workflow.connect("a", "b").unwrap();
    let workflow_id = workflow.id.clone();

    let registry = ExecutorRegistry {
        http_request: Box::new(FlakyExecutor {
            attempts: AtomicUsize::new(0),
            external_calls: external_calls.clone(),
        }),
        ..loomnodes::registry()
    };
    let harness = harness_with(registry);
    harness.graphs.register(workflow).await;

    let outcome = harness.runner.run(trigger(&workflow_id)).await.unwrap();

    assert_eq!(outcome.context.get("flaky"), Some(&json!({"value": 11})));
    // The non-idempotent step ran once even though the run took two attempts.
    assert_eq!(external_calls.load(Ordering::SeqCst), 1);

    let record = harness.records.find_by_trigger("evt-1").await.unwrap();
    assert_eq!(record.status, ExecutionStatus::Success);
}

#[tokio::test]
async fn transient_failures_exhaust_attempts_and_fail_the_record() {
    struct AlwaysDown;

    #[async_trait]
    impl NodeExecutor for AlwaysDown {
        fn kind(&self) -> NodeKind {
            NodeKind::HttpRequest
        }

        async fn execute(&self, ctx: ExecutorContext) -> Result<Context, NodeError> {
            ctx.publisher.publish(&ctx.node_id, NodeStatus::Loading);
            ctx.publisher.publish(&ctx.node_id, NodeStatus::Error);
            Err(NodeError::TransientProvider("timeout".to_string()))
        }
    }

    let mut workflow = Workflow::new("exhausted");
    workflow.add_node(NodeSpec::new("a", NodeKind::HttpRequest));
    let workflow_id = workflow.id.clone();

    let registry = ExecutorRegistry {
        http_request: Box::new(AlwaysDown),
        ..loomnodes::registry()
    };
    let harness = harness_with(registry);
    harness.graphs.register(workflow).await;
    let mut http_events = harness.status.subscribe(NodeKind::HttpRequest);

    let err = harness.runner.run(trigger(&workflow_id)).await.unwrap_err();
    assert!(err.is_retriable());

    let record = harness.records.find_by_trigger("evt-1").await.unwrap();
    assert_eq!(record.status, ExecutionStatus::Failed);
    assert!(record.error.as_deref().unwrap().contains("timeout"));

    // max_attempts = 3: three loading/error pairs.
    let mut statuses = Vec::new();
    while let Ok(event) = http_events.try_recv() {
        statuses.push(event.status);
    }
    assert_eq!(
        statuses,
        vec![
            NodeStatus::Loading,
            NodeStatus::Error,
            NodeStatus::Loading,
            NodeStatus::Error,
            NodeStatus::Loading,
            NodeStatus::Error,
        ]
    );
}

#[tokio::test]
async fn missing_credential_fails_without_retry() {
    let mut workflow = Workflow::new("no-credential");
    workflow.add_node(
        NodeSpec::new("a", NodeKind::Gemini)
            .with_data("variableName", json!("summary"))
            .with_data("userPrompt", json!("Hello"))
            .with_credential("cred-missing"),
    );
    let workflow_id = workflow.id.clone();

    let harness = harness_with(loomnodes::registry());
    harness.graphs.register(workflow).await;
    let mut gemini_events = harness.status.subscribe(NodeKind::Gemini);

    let err = harness.runner.run(trigger(&workflow_id)).await.unwrap_err();
    assert!(!err.is_retriable());
    assert!(matches!(
        err,
        EngineError::Node(NodeError::CredentialNotFound(_))
    ));

    let record = harness.records.find_by_trigger("evt-1").await.unwrap();
    assert_eq!(record.status, ExecutionStatus::Failed);

    assert_eq!(gemini_events.try_recv().unwrap().status, NodeStatus::Loading);
    assert_eq!(gemini_events.try_recv().unwrap().status, NodeStatus::Error);
    assert!(gemini_events.try_recv().is_err());
}

#[tokio::test]
async fn unknown_workflow_fails_before_any_record_exists() {
    let harness = harness_with(loomnodes::registry());

    let err = harness.runner.run(trigger("missing")).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Workflow(WorkflowError::NotFound(_))
    ));
    assert!(harness.records.find_by_trigger("evt-1").await.is_none());
}

#[tokio::test]
async fn cyclic_workflow_fails_before_any_record_exists() {
    let mut workflow = Workflow::new("cycle");
    workflow.add_node(NodeSpec::new("a", NodeKind::Initial));
    workflow.add_node(NodeSpec::new("b", NodeKind::HttpRequest));
    workflow.connect("a", "b").unwrap();
    workflow.connect("b", "a").unwrap();
    let workflow_id = workflow.id.clone();

    let harness = harness_with(loomnodes::registry());
    harness.graphs.register(workflow).await;

    let err = harness.runner.run(trigger(&workflow_id)).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Workflow(WorkflowError::CyclicGraph(_))
    ));
    assert!(!err.is_retriable());
    assert!(harness.records.find_by_trigger("evt-1").await.is_none());
}

#[tokio::test]
async fn execution_follows_ascending_id_order_for_ready_nodes() {
    struct Recorder {
        seen: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl NodeExecutor for Recorder {
        fn kind(&self) -> NodeKind {
            NodeKind::HttpRequest
        }

        async fn execute(&self, ctx: ExecutorContext) -> Result<Context, NodeError> {
            ctx.publisher.publish(&ctx.node_id, NodeStatus::Loading);
            self.seen.lock().await.push(ctx.node_id.clone());
            ctx.publisher.publish(&ctx.node_id, NodeStatus::Success);
            Ok(ctx.context)
        }
    }

    let seen = Arc::new(Mutex::new(Vec::new()));

    // "z" is the entry point; its two successors become ready together
    // and must execute in id order.
    let mut workflow = Workflow::new("ordering");
    workflow.add_node(NodeSpec::new("z", NodeKind::Initial));
    workflow.add_node(NodeSpec::new("n2", NodeKind::HttpRequest));
    workflow.add_node(NodeSpec::new("n1", NodeKind::HttpRequest));
    workflow.connect("z", "n2").unwrap();
    workflow.connect("z", "n1").unwrap();
    let workflow_id = workflow.id.clone();

    let registry = ExecutorRegistry {
        http_request: Box::new(Recorder { seen: seen.clone() }),
        ..loomnodes::registry()
    };
    let harness = harness_with(registry);
    harness.graphs.register(workflow).await;

    harness.runner.run(trigger(&workflow_id)).await.unwrap();

    assert_eq!(*seen.lock().await, vec!["n1".to_string(), "n2".to_string()]);
}
