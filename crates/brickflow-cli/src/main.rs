//! CLI binary for running and validating brick pipelines.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use brickflow_runtime::{validate, PipelineExecutor, Severity};
use brickflow_types::{ExecutionContext, Expression, Pipeline, RunOptions};

#[derive(Parser)]
#[command(name = "bflow", version, about = "Declarative brick pipeline runner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pipeline from a JSON file
    Run {
        /// Path to the pipeline JSON file
        pipeline: PathBuf,

        /// Pipeline input as inline JSON (default: {})
        #[arg(short, long)]
        input: Option<String>,

        /// Mod options as inline JSON (default: {})
        #[arg(short, long)]
        options: Option<String>,

        /// Print trace events as JSON lines while running
        #[arg(long)]
        trace: bool,

        /// Maximum number of step executions before aborting. Prevents runaway loops.
        #[arg(long, default_value = "10000")]
        max_steps: u64,
    },

    /// Validate a pipeline JSON file without running it
    Validate {
        /// Path to the pipeline JSON file
        pipeline: PathBuf,
    },

    /// Show information about a pipeline
    Info {
        /// Path to the pipeline JSON file
        pipeline: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Run {
            pipeline,
            input,
            options,
            trace,
            max_steps,
        } => {
            cmd_run(&pipeline, input.as_deref(), options.as_deref(), trace, max_steps).await?;
        }
        Commands::Validate { pipeline } => {
            cmd_validate(&pipeline)?;
        }
        Commands::Info { pipeline } => {
            cmd_info(&pipeline)?;
        }
    }

    Ok(())
}

fn load_pipeline(path: &Path) -> anyhow::Result<Pipeline> {
    let source = std::fs::read_to_string(path)?;
    let pipeline: Pipeline = serde_json::from_str(&source)?;
    Ok(pipeline)
}

fn parse_json_arg(raw: Option<&str>) -> anyhow::Result<serde_json::Value> {
    match raw {
        Some(text) => Ok(serde_json::from_str(text)?),
        None => Ok(serde_json::json!({})),
    }
}

async fn cmd_run(
    path: &Path,
    input: Option<&str>,
    options: Option<&str>,
    trace: bool,
    max_steps: u64,
) -> anyhow::Result<()> {
    let pipeline = load_pipeline(path)?;
    let input = parse_json_arg(input)?;
    let options = parse_json_arg(options)?;

    let executor = PipelineExecutor::with_default_registry();
    let context = ExecutionContext::new(input, options);
    let run_options = RunOptions {
        max_steps,
        trace_values: trace,
        ..RunOptions::default()
    };

    tracing::info!(pipeline = %path.display(), run_id = %run_options.run_id, steps = pipeline.len(), "Running pipeline");

    if trace {
        let mut rx = executor.trace().subscribe();
        tokio::spawn(async move {
            while let Ok(event) = rx.recv().await {
                if let Ok(line) = serde_json::to_string(&event) {
                    eprintln!("{line}");
                }
            }
        });
    }

    // Ctrl-C fires the shared abort signal; the run fails with a
    // cancellation error instead of being killed mid-step.
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });

    let result = executor.run(&pipeline, context, &run_options, cancel).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn cmd_validate(path: &Path) -> anyhow::Result<()> {
    let pipeline = load_pipeline(path)?;
    let registry = brickflow_runtime::default_registry();
    let diagnostics = validate(&pipeline, &registry);

    if diagnostics.is_empty() {
        println!("Pipeline is valid");
        return Ok(());
    }

    let mut has_error = false;
    for diag in &diagnostics {
        let severity = match diag.severity {
            Severity::Error => {
                has_error = true;
                "ERROR"
            }
            Severity::Warning => "WARN",
            Severity::Info => "INFO",
        };
        println!("[{}] {} at step {}: {}", severity, diag.rule, diag.step_id, diag.message);
    }

    if has_error {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_info(path: &Path) -> anyhow::Result<()> {
    let pipeline = load_pipeline(path)?;
    let registry = brickflow_runtime::default_registry();

    println!("Pipeline: {}", path.display());
    println!("Steps: {}", pipeline.len());

    println!("\nSteps:");
    for (index, step) in pipeline.steps.iter().enumerate() {
        let label = step.label.as_deref().unwrap_or("");
        let output = step
            .output_key
            .as_deref()
            .map(|k| format!(" -> {k}"))
            .unwrap_or_default();
        let nested = step
            .config
            .values()
            .filter(|e| matches!(e, Expression::Pipeline(_)))
            .count();

        let mut traits = Vec::new();
        if let Some(brick) = registry.get(&step.id) {
            if brick.is_pure() {
                traits.push("pure");
            }
            if brick.is_root_aware() {
                traits.push("root-aware");
            }
        }
        if nested > 0 {
            traits.push("nested");
        }
        let suffix = if traits.is_empty() {
            String::new()
        } else {
            format!(" [{}]", traits.join(", "))
        };

        println!("  {index}: {} {label}{output}{suffix}", step.id);
    }

    Ok(())
}
