//! Workflow executor
//!
//! Runs a validated workflow one step at a time in declared order. A step
//! runs only when every dependency succeeded earlier in the same run; its
//! output is then published to later steps as `<id>_output`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::llm::{LlmClient, Message};

use super::types::{Step, StepKind, StepResult, Variables, Workflow, WorkflowResult};
use super::validate::{validate_workflow, WorkflowError};

/// Runs named tools on behalf of tool steps
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute_tool(&self, tool: &str, variables: &Variables) -> Result<String>;
}

/// Renders templates on behalf of template steps
#[async_trait]
pub trait TemplateExecutor: Send + Sync {
    async fn execute_template(&self, template_id: &str, variables: &Variables) -> Result<String>;
}

/// Asks a human whether an approval step may pass
#[async_trait]
pub trait ApprovalHandler: Send + Sync {
    async fn request_approval(&self, step: &Step) -> Result<bool>;
}

/// Called once for every step the executor reaches, skipped steps included
pub type StepCallback<'a> = dyn Fn(&Step, &StepResult) + Send + Sync + 'a;

/// Why a run stopped before reaching the end of the plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelCause {
    Cancelled,
    DeadlineExceeded(Duration),
}

impl fmt::Display for CancelCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelCause::Cancelled => f.write_str("cancelled"),
            CancelCause::DeadlineExceeded(limit) => {
                write!(f, "exceeded its {}s deadline", limit.as_secs_f64())
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum ExecuteError {
    #[error("invalid workflow: {0}")]
    Invalid(#[from] WorkflowError),

    /// Carries every step result collected before the stop
    #[error("workflow {cause}")]
    Cancelled {
        cause: CancelCause,
        partial: Box<WorkflowResult>,
    },
}

impl ExecuteError {
    pub fn partial_result(&self) -> Option<&WorkflowResult> {
        match self {
            ExecuteError::Invalid(_) => None,
            ExecuteError::Cancelled { partial, .. } => Some(partial),
        }
    }
}

/// Progress notifications for observers of a run
#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    WorkflowStarted {
        workflow_id: String,
        name: String,
        total_steps: usize,
    },
    StepStarted {
        workflow_id: String,
        step_id: String,
        description: String,
    },
    /// Step ran, successfully or not
    StepCompleted {
        workflow_id: String,
        step_id: String,
        success: bool,
        output: Option<String>,
        error: Option<String>,
    },
    StepSkipped {
        workflow_id: String,
        step_id: String,
        missing: Vec<String>,
    },
    /// Pass finished, either at the end of the plan or on a required-step
    /// failure. Not sent for cancelled runs.
    WorkflowCompleted {
        workflow_id: String,
        success: bool,
        summary: String,
    },
}

/// Executes workflows against optional collaborators.
///
/// Unwired tool and template collaborators produce placeholder output so
/// partially configured workflows still run; an unwired approval handler
/// auto-approves. LLM steps need a client.
#[derive(Default)]
pub struct WorkflowExecutor {
    llm: Option<Arc<dyn LlmClient>>,
    tools: Option<Arc<dyn ToolExecutor>>,
    templates: Option<Arc<dyn TemplateExecutor>>,
    approval: Option<Arc<dyn ApprovalHandler>>,
    event_tx: Option<mpsc::UnboundedSender<WorkflowEvent>>,
    run_timeout: Option<Duration>,
}

impl WorkflowExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_tools(mut self, tools: Arc<dyn ToolExecutor>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_templates(mut self, templates: Arc<dyn TemplateExecutor>) -> Self {
        self.templates = Some(templates);
        self
    }

    pub fn with_approval(mut self, approval: Arc<dyn ApprovalHandler>) -> Self {
        self.approval = Some(approval);
        self
    }

    pub fn with_event_sender(mut self, event_tx: mpsc::UnboundedSender<WorkflowEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Stop a run at the next step boundary once this much time has passed
    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = Some(timeout);
        self
    }

    /// Run `workflow` once.
    ///
    /// Cancellation and the run deadline are checked before each step; a step
    /// already handed to a collaborator always runs to completion. A failed
    /// required step ends the pass and later steps are left out of the result.
    pub async fn execute(
        &self,
        cancel: &CancellationToken,
        workflow: &Workflow,
        on_step: Option<&StepCallback<'_>>,
    ) -> Result<WorkflowResult, ExecuteError> {
        validate_workflow(workflow)?;

        tracing::info!(
            "Starting workflow {} ({} steps)",
            workflow.name,
            workflow.steps.len()
        );

        let started = Instant::now();
        let mut result = WorkflowResult::new(workflow.steps.len());
        // Run-local copy; the workflow itself is never mutated
        let mut context = workflow.context.clone();
        let mut outputs: HashMap<&str, String> = HashMap::new();

        self.emit(WorkflowEvent::WorkflowStarted {
            workflow_id: workflow.id.clone(),
            name: workflow.name.clone(),
            total_steps: workflow.steps.len(),
        });

        for (i, step) in workflow.steps.iter().enumerate() {
            tracing::debug!(
                "Processing step {}/{}: {}",
                i + 1,
                workflow.steps.len(),
                step.id
            );

            if let Some(cause) = self.interrupted(cancel, started) {
                tracing::warn!("Workflow {} {}", workflow.name, cause);
                result.success = false;
                finish(&mut result, started);
                return Err(ExecuteError::Cancelled {
                    cause,
                    partial: Box::new(result),
                });
            }

            let missing: Vec<String> = step
                .depends_on
                .iter()
                .filter(|dep| !outputs.contains_key(dep.as_str()))
                .cloned()
                .collect();

            if !missing.is_empty() {
                tracing::warn!(
                    "Step {} skipped: missing dependencies {:?}",
                    step.id,
                    missing
                );
                let step_result = StepResult::skipped(&step.id, &missing);
                result.skipped_steps += 1;
                result.success = false;

                self.emit(WorkflowEvent::StepSkipped {
                    workflow_id: workflow.id.clone(),
                    step_id: step.id.clone(),
                    missing,
                });
                if let Some(callback) = on_step {
                    callback(step, &step_result);
                }
                result.step_results.push(step_result);
                continue;
            }

            self.emit(WorkflowEvent::StepStarted {
                workflow_id: workflow.id.clone(),
                step_id: step.id.clone(),
                description: step.description.clone(),
            });

            let variables = step_variables(step, &outputs, &context);
            let step_start = Instant::now();
            let outcome = self.run_step(step, &variables).await;
            let elapsed = step_start.elapsed();

            let step_result = match outcome {
                Ok(output) => {
                    tracing::info!("Step {} completed in {:?}", step.id, elapsed);
                    context.insert(
                        format!("{}_output", step.id),
                        serde_json::Value::String(output.clone()),
                    );
                    outputs.insert(step.id.as_str(), output.clone());
                    result.completed_steps += 1;
                    StepResult::succeeded(&step.id, output, elapsed)
                }
                Err(e) => {
                    tracing::error!("Step {} failed: {:#}", step.id, e);
                    result.failed_steps += 1;
                    result.success = false;
                    StepResult::failed(&step.id, format!("{:#}", e), elapsed)
                }
            };

            self.emit(WorkflowEvent::StepCompleted {
                workflow_id: workflow.id.clone(),
                step_id: step.id.clone(),
                success: step_result.success,
                output: step_result
                    .success
                    .then(|| step_result.output.clone()),
                error: step_result.error.clone(),
            });
            if let Some(callback) = on_step {
                callback(step, &step_result);
            }

            let abort = !step_result.success && !step.optional;
            result.step_results.push(step_result);

            if abort {
                tracing::error!("Workflow {} failed on required step {}", workflow.name, step.id);
                break;
            }
        }

        finish(&mut result, started);

        tracing::info!(
            "Workflow {} finished: {} in {:?}",
            workflow.name,
            result.summary(),
            result.total_duration()
        );

        self.emit(WorkflowEvent::WorkflowCompleted {
            workflow_id: workflow.id.clone(),
            success: result.success,
            summary: result.summary(),
        });

        Ok(result)
    }

    fn interrupted(&self, cancel: &CancellationToken, started: Instant) -> Option<CancelCause> {
        if cancel.is_cancelled() {
            return Some(CancelCause::Cancelled);
        }
        match self.run_timeout {
            Some(limit) if started.elapsed() >= limit => Some(CancelCause::DeadlineExceeded(limit)),
            _ => None,
        }
    }

    async fn run_step(&self, step: &Step, variables: &Variables) -> Result<String> {
        tracing::debug!(
            "Executing step {}: {} (type: {})",
            step.id,
            step.description,
            step.kind
        );

        match &step.kind {
            StepKind::Llm { prompt } => {
                let llm = self.llm.as_ref().context("LLM client not configured")?;
                let messages = [Message::user(substitute(prompt, variables))];
                llm.chat(&messages, None).await.context("LLM chat failed")
            }
            StepKind::Tool { tool } => match &self.tools {
                Some(tools) => tools
                    .execute_tool(tool, variables)
                    .await
                    .with_context(|| format!("tool {} failed", tool)),
                None => Ok(format!("[Tool {} would execute here]", tool)),
            },
            StepKind::Template { template_id } => match &self.templates {
                Some(templates) => templates
                    .execute_template(template_id, variables)
                    .await
                    .with_context(|| format!("template {} failed", template_id)),
                None => Ok(format!("[Template {} would execute here]", template_id)),
            },
            StepKind::Approval => {
                let Some(approval) = &self.approval else {
                    tracing::warn!(
                        "No approval handler configured, auto-approving step {}",
                        step.id
                    );
                    return Ok("Auto-approved (no handler)".to_string());
                };

                let approved = approval
                    .request_approval(step)
                    .await
                    .context("approval request failed")?;
                if !approved {
                    anyhow::bail!("user rejected approval");
                }
                Ok("Approved".to_string())
            }
        }
    }

    fn emit(&self, event: WorkflowEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }
}

fn finish(result: &mut WorkflowResult, started: Instant) {
    result.total_duration_ms = started.elapsed().as_millis() as u64;
    result.final_output = result.latest_output().unwrap_or_default().to_string();
}

/// Step variables, then `<dep>_output` for each dependency, then run context
/// for keys still unset
fn step_variables(step: &Step, outputs: &HashMap<&str, String>, context: &Variables) -> Variables {
    let mut variables = step.variables.clone();

    for dep in &step.depends_on {
        if let Some(output) = outputs.get(dep.as_str()) {
            variables.insert(
                format!("{}_output", dep),
                serde_json::Value::String(output.clone()),
            );
        }
    }

    for (key, value) in context {
        variables
            .entry(key.clone())
            .or_insert_with(|| value.clone());
    }

    variables
}

/// Replace `{{key}}` placeholders. Strings are inserted raw, other values as
/// JSON text.
fn substitute(prompt: &str, variables: &Variables) -> String {
    let mut out = String::with_capacity(prompt.len());
    let mut rest = prompt;

    // Single left-to-right pass; inserted values are never rescanned
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let value = after
            .find("}}")
            .and_then(|end| variables.get(&after[..end]).map(|value| (end, value)));

        match value {
            Some((end, serde_json::Value::String(s))) => {
                out.push_str(s);
                rest = &after[end + 2..];
            }
            Some((end, other)) => {
                out.push_str(&other.to_string());
                rest = &after[end + 2..];
            }
            None => {
                out.push('{');
                rest = &rest[start + 1..];
            }
        }
    }
    out.push_str(rest);
    out
}
