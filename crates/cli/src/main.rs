//! Crewline CLI entry point.
//!
//! This binary is the composition root for the entire system. Responsibilities:
//!
//! 1. **Wire observability**: `tracing-subscriber` with a human or JSON layer
//!    and an optional OpenTelemetry OTLP exporter. All `tracing` spans and
//!    structured events emitted by every crate in the workspace flow through it.
//! 2. **Load configuration**: the crew definition (or the built-in MVP crew),
//!    the engine settings file, and command-line overrides.
//! 3. **Construct infrastructure**: the filesystem artifact store, the tool
//!    registry, and the chat-completions backend, injected into
//!    [`runner::PipelineRunner`].
//! 4. **Run once**: execute the pipeline, archive the run log, and map the
//!    run's terminal status to the process exit code.

mod crew;
mod settings;
mod telemetry;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use llm::ChatCompletionsBackend;
use pipeline::{ArtifactStore, Run, RunStatus};
use runner::PipelineRunner;
use tools::{standard_registry, FsArtifactStore};
use tracing::{error, info, warn};

use crate::crew::CrewDefinition;
use crate::settings::Settings;
use crate::telemetry::LogFormat;

#[derive(Debug, Parser)]
#[command(name = "crewline")]
#[command(about = "Run a crew of LLM workers through a task pipeline", long_about = None)]
struct Cli {
    /// Crew definition (JSON). Defaults to the built-in architect/coder/reviewer crew.
    #[arg(long)]
    crew: Option<PathBuf>,

    /// Input parameter as `key=value`; repeatable. Overrides the crew's defaults.
    #[arg(long = "input", short = 'i', value_parser = parse_input)]
    inputs: Vec<(String, String)>,

    /// Directory artifacts are read from and written to.
    #[arg(long, default_value = ".")]
    workdir: PathBuf,

    /// Engine settings file (JSON).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Chat-completions API base URL, e.g. `http://localhost:11434/v1`.
    #[arg(long, env = "CREWLINE_API_BASE")]
    api_base: Option<String>,

    #[arg(long, env = "CREWLINE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Write the finished run (status, results, tool calls) here as JSON.
    #[arg(long)]
    run_log: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    /// OTLP/gRPC collector endpoint, e.g. `http://localhost:4317`.
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    otlp_endpoint: Option<String>,
}

fn parse_input(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty parameter name in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let _telemetry = telemetry::init(cli.log_format, cli.otlp_endpoint.as_deref())?;

    let crew = match &cli.crew {
        Some(path) => CrewDefinition::load(path)?,
        None => CrewDefinition::mvp()?,
    };
    let settings = Settings::load(cli.config.as_deref())?.with_overrides(cli.api_base, cli.api_key);
    let inputs = crew.merge_inputs(cli.inputs);

    tokio::fs::create_dir_all(&cli.workdir)
        .await
        .with_context(|| format!("Failed to create working directory {}", cli.workdir.display()))?;
    let store: Arc<dyn ArtifactStore> = Arc::new(FsArtifactStore::new(&cli.workdir));

    let pipeline = crew
        .build(standard_registry(store.clone()))
        .with_context(|| format!("Crew '{}' is not a valid pipeline", crew.name))?;
    let backend = ChatCompletionsBackend::new(settings.provider.clone())?;

    info!(
        crew = %crew.name,
        tasks = pipeline.tasks().len(),
        workdir = %cli.workdir.display(),
        api_base = %settings.provider.api_base,
        "Crew loaded"
    );

    let runner = PipelineRunner::new(Arc::new(pipeline), Arc::new(backend), store)
        .with_config(settings.runner);

    let token = runner.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; cancelling before the next task");
            token.cancel();
        }
    });

    let run = runner.run(inputs).await?;

    if let Some(path) = &cli.run_log {
        write_run_log(&run, path)?;
    }

    Ok(ExitCode::from(exit_status(&run)))
}

fn write_run_log(run: &Run, path: &std::path::Path) -> Result<()> {
    let json = serde_json::to_string_pretty(run).context("Failed to serialise run")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write run log {}", path.display()))?;
    info!(path = %path.display(), "Run log written");
    Ok(())
}

/// `0` completed, `130` cancelled (as for SIGINT), `1` otherwise.
fn exit_status(run: &Run) -> u8 {
    match run.status() {
        RunStatus::Completed => 0,
        RunStatus::Cancelled => 130,
        status => {
            if let Some(failure) = run.failure() {
                error!(%status, task = %failure.task, error = %failure.error, "Run did not complete");
            }
            1
        }
    }
}
