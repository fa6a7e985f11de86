use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cortex_decomposer::config::Config;
use cortex_decomposer::decomposer::{
    should_decompose_with_threshold, Decomposer, DecompositionResult, Scorer, TaskType,
};
use cortex_decomposer::llm::create_client;
use cortex_decomposer::workflow::{
    ApprovalHandler, ExecuteError, Step, StepCallback, StepResult, Workflow, WorkflowExecutor,
    WorkflowResult,
};

#[derive(Parser)]
#[command(name = "cortex-decomposer")]
#[command(about = "Score, decompose and run multi-step task workflows", long_about = None)]
struct Cli {
    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score how complex a request is
    Score {
        text: String,
        /// general, explain, review, debug, codegen, planning, refactor, infrastructure
        #[arg(short, long, default_value = "general")]
        task_type: TaskType,
    },
    /// Decide whether a score and template confidence call for decomposition
    ShouldDecompose {
        score: u8,
        template_confidence: f64,
    },
    /// Check a workflow file's dependency graph
    Validate { file: PathBuf },
    /// Break a request into steps, asking the model if it is complex
    Decompose {
        text: String,
        #[arg(short, long, default_value = "general")]
        task_type: TaskType,
        /// Write the plan as a workflow file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Execute a workflow file
    Run {
        file: PathBuf,
        /// Ask on stdin before each approval step instead of auto-approving
        #[arg(long)]
        confirm: bool,
        /// Stop at the next step boundary after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so --json output stays clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cortex_decomposer=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Score { text, task_type } => score(&text, task_type, cli.json)?,
        Commands::ShouldDecompose {
            score,
            template_confidence,
        } => decide(score, template_confidence, cli.json)?,
        Commands::Validate { file } => validate(&file, cli.json)?,
        Commands::Decompose {
            text,
            task_type,
            output,
        } => decompose(&text, task_type, output.as_deref(), cli.json).await?,
        Commands::Run {
            file,
            confirm,
            timeout,
        } => run(&file, confirm, timeout, cli.json).await?,
    }

    Ok(())
}

fn score(text: &str, task_type: TaskType, json: bool) -> Result<()> {
    let result = Scorer::new().score(text, task_type);

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("Score: {} ({})", result.score, result.level);
    println!("Needs decomposition: {}", result.needs_decomposition);
    for factor in &result.factors {
        println!("  - {}", factor);
    }
    Ok(())
}

fn decide(score: u8, template_confidence: f64, json: bool) -> Result<()> {
    let config = Config::load()?;
    let decision = should_decompose_with_threshold(
        score,
        template_confidence,
        config.decomposer.template_match_threshold,
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&decision)?);
    } else {
        println!("{} ({})", if decision.decompose { "yes" } else { "no" }, decision.reason);
    }
    Ok(())
}

fn load_workflow(path: &Path) -> Result<Workflow> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read workflow file {}", path.display()))?;
    Workflow::from_json(&data).with_context(|| format!("Invalid workflow {}", path.display()))
}

fn validate(path: &Path, json: bool) -> Result<()> {
    let workflow = load_workflow(path)?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "valid": true,
                "id": workflow.id,
                "steps": workflow.steps.len(),
                "requires_approval": workflow.requires_approval(),
            })
        );
    } else {
        println!(
            "✓ {} is valid ({} steps{})",
            workflow.name,
            workflow.steps.len(),
            if workflow.requires_approval() {
                ", requires approval"
            } else {
                ""
            }
        );
    }
    Ok(())
}

async fn decompose(
    text: &str,
    task_type: TaskType,
    output: Option<&Path>,
    json: bool,
) -> Result<()> {
    let config = Config::load()?;
    let decomposer = Decomposer::new(create_client(&config.llm));

    let cancel = cancel_on_ctrl_c();
    let result = decomposer.decompose(&cancel, text, task_type).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_plan(&result);
    }

    if let Some(path) = output {
        let workflow = result.into_workflow(workflow_name(text));
        std::fs::write(path, workflow.to_json()?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        if !json {
            println!("\nWorkflow written to {}", path.display());
        }
    }
    Ok(())
}

fn print_plan(result: &DecompositionResult) {
    println!(
        "Complexity: {} ({})",
        result.complexity.score, result.complexity.level
    );
    if !result.estimated_time.is_empty() {
        println!("Estimated time: {}", result.estimated_time);
    }
    if result.requires_approval {
        println!("⚠ Requires approval");
    }
    println!();
    for (i, step) in result.steps.iter().enumerate() {
        print!("{}. [{}] {} ({} risk)", i + 1, step.kind, step.id, step.risk_level);
        if !step.depends_on.is_empty() {
            print!(" after {}", step.depends_on.join(", "));
        }
        println!();
        if !step.description.is_empty() {
            println!("   {}", step.description);
        }
    }
}

/// Short workflow name from the first few words of a request
fn workflow_name(text: &str) -> String {
    let name = text.split_whitespace().take(6).collect::<Vec<_>>().join(" ");
    if name.is_empty() {
        "workflow".to_string()
    } else {
        name
    }
}

async fn run(path: &Path, confirm: bool, timeout: Option<u64>, json: bool) -> Result<()> {
    let config = Config::load()?;
    let workflow = load_workflow(path)?;

    let mut executor = WorkflowExecutor::new().with_llm(create_client(&config.llm));
    if confirm {
        executor = executor.with_approval(Arc::new(StdinApproval));
    }
    if let Some(limit) = timeout
        .map(Duration::from_secs)
        .or_else(|| config.executor.run_timeout())
    {
        executor = executor.with_run_timeout(limit);
    }

    let print_progress = |step: &Step, result: &StepResult| {
        let mark = if result.skipped {
            "-"
        } else if result.success {
            "✓"
        } else {
            "✗"
        };
        eprintln!("{} {} ({}ms)", mark, step.id, result.duration_ms);
    };

    let progress: &StepCallback<'_> = &print_progress;

    let cancel = cancel_on_ctrl_c();
    let outcome = executor
        .execute(&cancel, &workflow, (!json).then_some(progress))
        .await;
    let (result, failure) = into_report(outcome)?;

    print_result(&result, json)?;

    match failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Split a run outcome into the result to print and the error to exit with.
/// Cancelled and timed-out runs still report the steps they finished.
fn into_report(
    outcome: Result<WorkflowResult, ExecuteError>,
) -> Result<(WorkflowResult, Option<anyhow::Error>)> {
    match outcome {
        Ok(result) if result.success => Ok((result, None)),
        Ok(result) => {
            let err = anyhow!("workflow failed: {}", result.summary());
            Ok((result, Some(err)))
        }
        Err(ExecuteError::Cancelled { cause, partial }) => {
            let err = anyhow!("workflow {}: {}", cause, partial.summary());
            Ok((*partial, Some(err)))
        }
        Err(e) => Err(e.into()),
    }
}

fn print_result(result: &WorkflowResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    println!("\n{}", result.summary());
    for step in result.step_results.iter().filter(|r| !r.success) {
        if let Some(error) = &step.error {
            println!("  {}: {}", step.step_id, error);
        }
    }
    if !result.final_output.is_empty() {
        println!("\n{}", result.final_output);
    }
    Ok(())
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping after the current step");
            token.cancel();
        }
    });
    cancel
}

/// Prompts on the terminal for each approval step
struct StdinApproval;

#[async_trait]
impl ApprovalHandler for StdinApproval {
    async fn request_approval(&self, step: &Step) -> Result<bool> {
        let prompt = format!("Approve step {} ({})? [y/N] ", step.id, step.description);

        tokio::task::spawn_blocking(move || {
            print!("{}", prompt);
            io::stdout().flush()?;

            let mut answer = String::new();
            io::stdin().read_line(&mut answer)?;
            Ok::<_, anyhow::Error>(matches!(
                answer.trim().to_lowercase().as_str(),
                "y" | "yes"
            ))
        })
        .await?
    }
}
