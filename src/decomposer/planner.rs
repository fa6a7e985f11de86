//! LLM-backed task decomposition
//!
//! Simple and medium requests pass straight through as one LLM step. Complex
//! ones are sent to the model once with a fixed planning prompt; whatever
//! comes back is mined for a JSON plan, and anything unusable degrades to a
//! single pass-through step instead of an error.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::llm::{LlmClient, Message};
use crate::workflow::builder::WorkflowBuilder;
use crate::workflow::types::{null_as_default, RiskLevel, Step, StepKind, Workflow};
use crate::workflow::validate::validate_steps;

use super::complexity::{ComplexityResult, Scorer, TaskType};
use super::extract::extract_json;

/// System prompt for task decomposition
pub const DECOMPOSITION_SYSTEM_PROMPT: &str = r#"You are a task decomposition assistant. Your job is to break complex tasks into simple, executable steps.

When given a task, analyze it and break it down into a sequence of steps. Each step should be:
1. Atomic - does one thing
2. Clear - easily understood
3. Executable - can be performed with available tools

For each step, specify:
- description: What this step does
- type: "tool" (use a tool), "template" (use a template), "llm" (ask AI), or "approval" (get user confirmation)
- tool: If type is "tool", which tool to use (read, write, edit, bash, glob, grep)
- risk_level: "low", "medium", or "high"

Output your analysis as JSON:
{
  "steps": [
    {
      "id": "step1",
      "description": "What this step does",
      "type": "tool",
      "tool": "read",
      "risk_level": "low",
      "depends_on": []
    },
    {
      "id": "step2",
      "description": "Another step",
      "type": "tool",
      "tool": "edit",
      "risk_level": "medium",
      "depends_on": ["step1"]
    }
  ],
  "estimated_time": "5-10 minutes",
  "requires_approval": false
}

Guidelines:
- High-risk operations (delete, deploy, execute) should have approval steps before them
- Group related operations when possible
- Consider rollback strategies for destructive operations
- Keep the number of steps reasonable (3-10 typically)"#;

#[derive(Error, Debug)]
pub enum DecomposeError {
    #[error("decomposition cancelled")]
    Cancelled,

    #[error("decomposition failed: {0}")]
    Llm(#[source] anyhow::Error),
}

/// Breakdown of a request into executable steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecompositionResult {
    pub original_input: String,
    pub complexity: ComplexityResult,
    pub steps: Vec<Step>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub estimated_time: String,
    pub requires_approval: bool,
}

impl DecompositionResult {
    /// Turn the plan into a workflow ready for validation and execution
    pub fn into_workflow(self, name: impl Into<String>) -> Workflow {
        self.steps
            .into_iter()
            .fold(
                WorkflowBuilder::new(name)
                    .with_description(self.original_input)
                    .with_estimated_time(self.estimated_time),
                |builder, step| builder.add_step(step),
            )
            .build()
    }
}

/// Shape the planning prompt asks the model for
#[derive(Debug, Deserialize)]
struct DecompositionResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    steps: Vec<Step>,
    #[serde(default, deserialize_with = "null_as_default")]
    estimated_time: String,
    #[serde(default, deserialize_with = "null_as_default")]
    requires_approval: bool,
}

/// Breaks complex tasks into manageable steps
pub struct Decomposer {
    llm: Arc<dyn LlmClient>,
    scorer: Scorer,
}

impl Decomposer {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            scorer: Scorer::new(),
        }
    }

    /// Score a request. Requests that don't need decomposition come back with
    /// a single pass-through step; complex ones come back with no steps.
    pub fn analyze(&self, input: &str, task_type: TaskType) -> DecompositionResult {
        let complexity = self.scorer.score(input, task_type);
        let steps = if complexity.needs_decomposition {
            Vec::new()
        } else {
            vec![Step::llm("single", "Execute the request directly", input)]
        };

        DecompositionResult {
            original_input: input.to_string(),
            complexity,
            steps,
            estimated_time: String::new(),
            requires_approval: false,
        }
    }

    /// Decompose a request, asking the model only when the request is complex
    pub async fn decompose(
        &self,
        cancel: &CancellationToken,
        input: &str,
        task_type: TaskType,
    ) -> Result<DecompositionResult, DecomposeError> {
        let mut result = self.analyze(input, task_type);

        if !result.complexity.needs_decomposition {
            tracing::debug!(
                "Task is {} (score {}), skipping decomposition",
                result.complexity.level,
                result.complexity.score
            );
            return Ok(result);
        }

        tracing::info!(
            "Decomposing complex task (score: {})",
            result.complexity.score
        );

        let messages = [Message::user(format!(
            "Decompose this task into steps:\n\n{}",
            input
        ))];

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DecomposeError::Cancelled),
            response = self.llm.chat(&messages, Some(DECOMPOSITION_SYSTEM_PROMPT)) => {
                response.map_err(DecomposeError::Llm)?
            }
        };

        let parsed = match parse_decomposition(&response) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Failed to parse decomposition, running as one step: {:#}", e);
                result.steps = vec![fallback_step(input)];
                return Ok(result);
            }
        };

        result.requires_approval = parsed.requires_approval
            || parsed.steps.iter().any(|s| s.risk_level == RiskLevel::High);
        result.steps = parsed.steps;
        result.estimated_time = parsed.estimated_time;

        tracing::info!(
            "Decomposed into {} steps (requires approval: {})",
            result.steps.len(),
            result.requires_approval
        );

        Ok(result)
    }
}

/// Single LLM step that runs the original request unchanged
fn fallback_step(input: &str) -> Step {
    Step::llm("fallback", "Execute via LLM (decomposition failed)", input)
        .with_risk(RiskLevel::Medium)
}

/// Decode the model's plan, filling in ids and prompts it left out, and
/// reject plans that are empty or structurally invalid
fn parse_decomposition(response: &str) -> Result<DecompositionResponse> {
    let json = extract_json(response).context("no JSON found in response")?;

    let mut parsed: DecompositionResponse =
        serde_json::from_str(json).context("failed to parse decomposition JSON")?;

    if parsed.steps.is_empty() {
        anyhow::bail!("no steps found in decomposition");
    }

    for (i, step) in parsed.steps.iter_mut().enumerate() {
        if step.id.is_empty() {
            step.id = format!("step{}", i + 1);
        }
        if let StepKind::Llm { prompt } = &mut step.kind {
            if prompt.is_empty() {
                prompt.clone_from(&step.description);
            }
        }
    }

    validate_steps(&parsed.steps).context("model returned an invalid plan")?;

    Ok(parsed)
}
