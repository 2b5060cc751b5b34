use anyhow::Result;
use clap::{Parser, Subcommand};
use loomcore::{
    Context, MemoryCredentialSource, MemoryGraphSource, MemoryStepStore, NodeKind, NodeSpec,
    NodeStatus, StatusBus, Workflow,
};
use loomruntime::{
    ExecutionStatus, ExecutionStore, MemoryExecutionStore, RunnerConfig, TriggerEvent,
    WorkflowRunner,
};
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "loom")]
#[command(about = "Loom workflow engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow file
    Run {
        /// Path to workflow JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Initial context as a JSON object
        #[arg(short, long)]
        input: Option<String>,

        /// Path to a credentials JSON file ({"credentialId": "secret"})
        #[arg(short, long)]
        credentials: Option<PathBuf>,

        /// Trigger event id (defaults to a fresh id)
        #[arg(short, long)]
        trigger_id: Option<String>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a workflow file (structure, duplicate edges, cycles)
    Validate {
        /// Path to workflow JSON file
        file: PathBuf,
    },

    /// List available node kinds
    Nodes,

    /// Create a new example workflow
    Init {
        /// Output file path
        #[arg(short, long, default_value = "workflow.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            input,
            credentials,
            trigger_id,
            verbose,
        } => {
            if verbose {
                tracing_subscriber::fmt()
                    .with_max_level(tracing::Level::DEBUG)
                    .init();
            } else {
                tracing_subscriber::fmt()
                    .with_max_level(tracing::Level::INFO)
                    .init();
            }

            run_workflow(file, input, credentials, trigger_id).await?;
        }

        Commands::Validate { file } => {
            validate_workflow(file)?;
        }

        Commands::Nodes => {
            list_nodes();
        }

        Commands::Init { output } => {
            create_example_workflow(output)?;
        }
    }

    Ok(())
}

async fn run_workflow(
    file: PathBuf,
    input: Option<String>,
    credentials_file: Option<PathBuf>,
    trigger_id: Option<String>,
) -> Result<()> {
    println!("🚀 Loading workflow from: {}", file.display());

    let workflow_json = std::fs::read_to_string(&file)?;
    let workflow: Workflow = serde_json::from_str(&workflow_json)?;

    println!("📋 Workflow: {}", workflow.name);
    println!("   Nodes: {}", workflow.nodes.len());
    println!("   Connections: {}", workflow.connections.len());
    println!();

    let initial_context = match input {
        Some(input_str) => {
            let parsed: serde_json::Value = serde_json::from_str(&input_str)?;
            let serde_json::Value::Object(entries) = parsed else {
                return Err(anyhow::anyhow!("Input must be a JSON object"));
            };
            Some(Context::from(entries))
        }
        None => None,
    };

    let credentials = Arc::new(MemoryCredentialSource::new());
    if let Some(path) = credentials_file {
        let raw = std::fs::read_to_string(&path)?;
        let secrets: HashMap<String, String> = serde_json::from_str(&raw)?;
        for (credential_id, secret) in secrets {
            credentials.register(credential_id, secret).await;
        }
    }

    let graphs = Arc::new(MemoryGraphSource::new());
    let workflow_id = workflow.id.clone();
    graphs.register(workflow).await;

    let records = Arc::new(MemoryExecutionStore::new());
    let status = Arc::new(StatusBus::new(256));
    let runner = WorkflowRunner::new(
        graphs,
        credentials,
        Arc::new(loomnodes::registry()),
        status.clone(),
        records.clone(),
        Arc::new(MemoryStepStore::new()),
        RunnerConfig::default(),
    );

    // Print status events live, one listener per node-kind channel.
    let mut listeners = Vec::new();
    for kind in NodeKind::ALL {
        let mut events = status.subscribe(kind);
        listeners.push(tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                let icon = match event.status {
                    NodeStatus::Loading => "⚡",
                    NodeStatus::Success => "✅",
                    NodeStatus::Error => "❌",
                };
                println!("  {} {} ({})", icon, event.node_id, kind);
            }
        }));
    }

    let trigger_event_id = trigger_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let result = runner
        .run(TriggerEvent {
            workflow_id,
            trigger_event_id: trigger_event_id.clone(),
            initial_context,
        })
        .await;

    // Let pending status prints flush before tearing the listeners down.
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    for listener in listeners {
        listener.abort();
    }

    println!();
    if let Some(record) = records.find_by_trigger(&trigger_event_id).await {
        let outcome = match record.status {
            ExecutionStatus::Running => "RUNNING",
            ExecutionStatus::Success => "SUCCESS",
            ExecutionStatus::Failed => "FAILED",
        };
        println!("📊 Execution Record:");
        println!("   Id: {}", record.id);
        println!("   Status: {}", outcome);
        if let Some(error) = record.error {
            println!("   Error: {}", error);
        }
    }

    match result {
        Ok(outcome) => {
            println!();
            println!("📤 Final context:");
            for (key, value) in outcome.context.iter() {
                println!("   {}: {}", key, value);
            }
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!("Workflow run failed: {}", e)),
    }
}

fn validate_workflow(file: PathBuf) -> Result<()> {
    println!("🔍 Validating workflow: {}", file.display());

    let workflow_json = std::fs::read_to_string(&file)?;
    let workflow: Workflow = serde_json::from_str(&workflow_json)?;

    workflow.validate()?;
    let order = loomruntime::sort::topological_order(&workflow)?;

    println!("✅ Workflow is valid:");
    println!("   Name: {}", workflow.name);
    println!("   Nodes: {}", workflow.nodes.len());
    println!("   Connections: {}", workflow.connections.len());
    println!("   Execution order: {}", order.join(" → "));

    Ok(())
}

fn list_nodes() {
    println!("📦 Available node kinds:");
    println!();
    for kind in NodeKind::ALL {
        println!("   {}", kind);
    }
}

fn create_example_workflow(output: PathBuf) -> Result<()> {
    let mut workflow = Workflow::new("Example workflow");
    let start = workflow.add_node(
        NodeSpec::new("start", NodeKind::Initial)
            .with_name("Start")
            .with_position(0.0, 0.0),
    );
    let fetch = workflow.add_node(
        NodeSpec::new("fetch-zen", NodeKind::HttpRequest)
            .with_name("Fetch zen")
            .with_data("variableName", json!("zen"))
            .with_data("endpoint", json!("https://api.github.com/zen"))
            .with_position(0.0, 200.0),
    );
    workflow.connect(start, fetch)?;

    let json = serde_json::to_string_pretty(&workflow)?;
    std::fs::write(&output, json)?;

    println!("✨ Created example workflow: {}", output.display());
    Ok(())
}
