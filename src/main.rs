use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use pigment_artifact::{ArtifactSink, FsStore};
use pigment_capability::{
  BuiltinProvider, CapabilityProvider, DataType, StoreUploadLoader, input_nodes,
};
use pigment_config::WorkflowDef;
use pigment_moderation::{DEFAULT_RECENT_LIMIT, IncidentLog, ModerationGate, OpenAiModerator};
use pigment_runtime::{
  ChannelNotifier, ExecutionEvent, RunOptions, RunOutcome, Runtime, RuntimeConfig, StepOutput,
};

/// Pigment - run image workflow graphs in dependency waves
#[derive(Parser)]
#[command(name = "pigment")]
#[command(version, about, long_about = None)]
struct Cli {
  #[command(flatten)]
  settings: Settings,

  #[command(subcommand)]
  command: Option<Commands>,
}

/// Process-wide settings, resolved once at startup.
#[derive(clap::Args)]
struct Settings {
  /// Directory holding images, uploads and moderation logs
  #[arg(long, global = true, env = "PIGMENT_DATA_DIR", default_value = "./data")]
  data_dir: PathBuf,

  /// API key for the moderation service; moderation is disabled without it
  #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
  openai_api_key: Option<String>,

  /// Block content when the moderation service cannot be reached
  #[arg(long, global = true, env = "MODERATION_STRICT_MODE")]
  moderation_strict: bool,
}

impl Settings {
  fn images_dir(&self) -> PathBuf {
    self.data_dir.join("images")
  }

  fn uploads_dir(&self) -> PathBuf {
    self.data_dir.join("uploads")
  }

  fn incidents_path(&self) -> PathBuf {
    self.data_dir.join("moderation").join("incidents.jsonl")
  }

  fn sink(&self) -> ArtifactSink {
    ArtifactSink::new(Arc::new(FsStore::new(self.images_dir())))
  }

  fn moderation_gate(&self) -> Result<ModerationGate> {
    match self.openai_api_key.as_deref().filter(|key| !key.is_empty()) {
      Some(key) => {
        let moderator = OpenAiModerator::new(key).context("failed to create moderation client")?;
        info!(strict = self.moderation_strict, "content moderation enabled");
        Ok(ModerationGate::new(
          Arc::new(moderator),
          self.moderation_strict,
          IncidentLog::new(self.incidents_path()),
        ))
      }
      None => {
        warn!("OPENAI_API_KEY not set, content moderation is disabled");
        Ok(ModerationGate::disabled())
      }
    }
  }
}

#[derive(Subcommand)]
enum Commands {
  /// Run a workflow
  Run {
    /// Path to the workflow file (JSON)
    workflow_file: PathBuf,

    /// Template the workflow was created from, recorded in provenance
    #[arg(long)]
    template_id: Option<String>,
  },

  /// Print a workflow as a sequential YAML pipeline
  Export {
    /// Path to the workflow file (JSON)
    workflow_file: PathBuf,
  },

  /// Inspect persisted images
  Artifacts {
    #[command(subcommand)]
    action: ArtifactsAction,
  },

  /// List the node types the builtin provider supports
  Nodes {
    #[arg(value_enum)]
    kind: NodeKind,

    /// Print only the params schema of this node
    name: Option<String>,
  },

  /// Show recent moderation incidents, newest first
  Incidents {
    #[arg(long, default_value_t = DEFAULT_RECENT_LIMIT)]
    limit: usize,
  },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum NodeKind {
  Generators,
  Transforms,
  Inputs,
}

#[derive(Subcommand)]
enum ArtifactsAction {
  /// List all artifacts, newest first
  List,

  /// Show one artifact with its provenance
  Show { id: String },
}

fn main() -> Result<()> {
  init_tracing()?;
  let cli = Cli::parse();

  let Some(command) = cli.command else {
    println!("pigment - use --help to see available commands");
    return Ok(());
  };

  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async {
    match command {
      Commands::Run {
        workflow_file,
        template_id,
      } => run_workflow(&cli.settings, &workflow_file, template_id).await,
      Commands::Export { workflow_file } => export_workflow(&workflow_file).await,
      Commands::Artifacts { action } => show_artifacts(&cli.settings, action).await,
      Commands::Nodes { kind, name } => show_nodes(kind, name.as_deref()),
      Commands::Incidents { limit } => show_incidents(&cli.settings, limit).await,
    }
  })
}

/// Log to stderr so stdout stays machine readable. `RUST_LOG` overrides the
/// default `info` level.
fn init_tracing() -> Result<()> {
  let env_filter = EnvFilter::try_from_default_env()
    .or_else(|_| EnvFilter::try_new("info"))
    .map_err(|e| anyhow!("failed to create env filter: {e}"))?;

  tracing_subscriber::registry()
    .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
    .with(env_filter)
    .try_init()
    .map_err(|e| anyhow!("failed to initialize tracing: {e}"))
}

async fn load_workflow(path: &Path) -> Result<WorkflowDef> {
  let content = tokio::fs::read_to_string(path)
    .await
    .with_context(|| format!("failed to read workflow file: {}", path.display()))?;

  serde_json::from_str(&content)
    .with_context(|| format!("failed to parse workflow file: {}", path.display()))
}

async fn run_workflow(
  settings: &Settings,
  workflow_file: &Path,
  template_id: Option<String>,
) -> Result<()> {
  let workflow = load_workflow(workflow_file).await?;
  eprintln!(
    "Loaded workflow: {} ({} nodes, {} edges)",
    workflow.name.as_deref().unwrap_or("untitled"),
    workflow.nodes.len(),
    workflow.edges.len()
  );

  let config = RuntimeConfig {
    capabilities: Arc::new(BuiltinProvider::new()),
    uploads: Arc::new(StoreUploadLoader::new(Arc::new(FsStore::new(
      settings.uploads_dir(),
    )))),
    moderation: settings.moderation_gate()?,
    sink: settings.sink(),
  };

  let (tx, mut rx) = mpsc::unbounded_channel();
  let progress = tokio::spawn(async move {
    while let Some(event) = rx.recv().await {
      print_event(&event);
    }
  });

  let runtime = Runtime::with_notifier(config, ChannelNotifier::new(tx));
  let result = runtime.invoke(&workflow, RunOptions { template_id }).await;

  // Closing the channel lets the progress printer finish.
  drop(runtime);
  let _ = progress.await;

  let outcome = result.map_err(|e| {
    if e.is_policy_violation() {
      anyhow!("{e}")
    } else {
      anyhow::Error::new(e).context("workflow execution failed")
    }
  })?;

  println!("{}", serde_json::to_string_pretty(&summary(&outcome))?);
  Ok(())
}

fn summary(outcome: &RunOutcome) -> serde_json::Value {
  json!({
    "executionId": outcome.execution_id,
    "imageIds": outcome.image_ids,
    "imageIdsByNode": outcome.image_ids_by_node,
    "dataOutputs": outcome.data_outputs,
    "waves": outcome.waves,
    "skipped": outcome.skipped,
    "unmoderated": outcome.unmoderated,
  })
}

fn print_event(event: &ExecutionEvent) {
  match event {
    ExecutionEvent::WorkflowStarted {
      execution_id,
      node_count,
    } => eprintln!("Execution {execution_id} started ({node_count} nodes)"),
    ExecutionEvent::NodeRunning { wave, node_id, .. } => {
      eprintln!("[wave {wave}] {node_id}: running")
    }
    ExecutionEvent::NodeCompleted {
      wave,
      node_id,
      output,
      ..
    } => match output {
      StepOutput::Image { image_id } => eprintln!("[wave {wave}] {node_id}: completed -> {image_id}"),
      StepOutput::Data(data) => {
        let kind = match data.data_type {
          DataType::Text => "text",
          DataType::Json => "json",
        };
        eprintln!(
          "[wave {wave}] {node_id}: completed ({kind}, {} chars)",
          data.content.len()
        )
      }
      StepOutput::None => eprintln!("[wave {wave}] {node_id}: completed"),
    },
    ExecutionEvent::NodeFailed {
      wave,
      node_id,
      error,
      ..
    } => eprintln!("[wave {wave}] {node_id}: failed: {error}"),
    ExecutionEvent::WorkflowCompleted { image_ids, .. } => {
      eprintln!("Execution completed: {} images", image_ids.len())
    }
    ExecutionEvent::WorkflowFailed { error, .. } => eprintln!("Execution failed: {error}"),
  }
}

async fn export_workflow(workflow_file: &Path) -> Result<()> {
  let workflow = load_workflow(workflow_file).await?;
  let pipeline = pigment_workflow::linearize(&workflow);
  let yaml = pipeline
    .to_yaml()
    .context("failed to render pipeline")?;
  print!("{yaml}");
  Ok(())
}

async fn show_artifacts(settings: &Settings, action: ArtifactsAction) -> Result<()> {
  let sink = settings.sink();
  let output = match action {
    ArtifactsAction::List => {
      let artifacts = sink.list().await.context("failed to list artifacts")?;
      serde_json::to_string_pretty(&artifacts)?
    }
    ArtifactsAction::Show { id } => {
      let artifact = sink
        .get(&id)
        .await
        .with_context(|| format!("failed to load artifact {id}"))?;
      serde_json::to_string_pretty(&artifact)?
    }
  };
  println!("{output}");
  Ok(())
}

fn show_nodes(kind: NodeKind, name: Option<&str>) -> Result<()> {
  let capabilities = BuiltinProvider::new().capabilities();
  let nodes = match kind {
    NodeKind::Generators => capabilities.generators,
    NodeKind::Transforms => capabilities.transforms,
    NodeKind::Inputs => input_nodes(),
  };

  let output = match name {
    Some(name) => {
      let node = nodes
        .into_iter()
        .find(|node| node.name == name)
        .ok_or_else(|| anyhow!("{} not found: {name}", kind.singular()))?;
      serde_json::to_string_pretty(&node.params)?
    }
    None => serde_json::to_string_pretty(&nodes)?,
  };
  println!("{output}");
  Ok(())
}

impl NodeKind {
  fn singular(self) -> &'static str {
    match self {
      NodeKind::Generators => "Generator",
      NodeKind::Transforms => "Transform",
      NodeKind::Inputs => "Input",
    }
  }
}

async fn show_incidents(settings: &Settings, limit: usize) -> Result<()> {
  let incidents = IncidentLog::new(settings.incidents_path())
    .recent(limit)
    .await
    .context("failed to read incident log")?;
  println!("{}", serde_json::to_string_pretty(&incidents)?);
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_cli_parses_run_with_template() {
    let cli = Cli::try_parse_from([
      "pigment",
      "--data-dir",
      "/tmp/pigment",
      "run",
      "wf.json",
      "--template-id",
      "poster",
    ])
    .unwrap();

    assert_eq!(cli.settings.data_dir, PathBuf::from("/tmp/pigment"));
    assert_eq!(
      cli.settings.incidents_path(),
      PathBuf::from("/tmp/pigment/moderation/incidents.jsonl")
    );
    match cli.command {
      Some(Commands::Run {
        workflow_file,
        template_id,
      }) => {
        assert_eq!(workflow_file, PathBuf::from("wf.json"));
        assert_eq!(template_id.as_deref(), Some("poster"));
      }
      _ => panic!("expected run command"),
    }
  }

  #[test]
  fn test_cli_parses_nodes() {
    let cli = Cli::try_parse_from(["pigment", "nodes", "transforms", "resize"]).unwrap();
    match cli.command {
      Some(Commands::Nodes { kind, name }) => {
        assert_eq!(kind, NodeKind::Transforms);
        assert_eq!(name.as_deref(), Some("resize"));
      }
      _ => panic!("expected nodes command"),
    }
    assert!(Cli::try_parse_from(["pigment", "nodes", "widgets"]).is_err());
  }

  #[test]
  fn test_show_nodes_unknown_name() {
    let err = show_nodes(NodeKind::Generators, Some("mermaid")).unwrap_err();
    assert_eq!(err.to_string(), "Generator not found: mermaid");
    assert!(show_nodes(NodeKind::Transforms, Some("blur")).is_ok());
    assert!(show_nodes(NodeKind::Inputs, None).is_ok());
  }

  #[test]
  fn test_incidents_limit_defaults() {
    let cli = Cli::try_parse_from(["pigment", "incidents"]).unwrap();
    assert!(matches!(
      cli.command,
      Some(Commands::Incidents { limit: DEFAULT_RECENT_LIMIT })
    ));
  }
}
