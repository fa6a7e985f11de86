//! Core types for workflows and their execution results

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use super::validate::{validate_workflow, WorkflowError};

/// Key/value map used for step variables and the shared workflow context
pub type Variables = HashMap<String, serde_json::Value>;

/// Decode an explicit `null` the same way as a missing field.
///
/// Model-written plans routinely emit `"depends_on": null` and the like.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Risk classification of a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

/// Accepts any letter case; `null` reads as low. Unknown levels are errors.
impl<'de> Deserialize<'de> for RiskLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        const LEVELS: &[&str] = &["low", "medium", "high"];

        let Some(raw) = Option::<String>::deserialize(deserializer)? else {
            return Ok(RiskLevel::Low);
        };
        match raw.to_ascii_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            _ => Err(de::Error::unknown_variant(&raw, LEVELS)),
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a step does, with the payload that kind of step needs.
///
/// Serialized flat into the owning step as `"type": "llm" | "tool" |
/// "template" | "approval"` next to its payload field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StepKind {
    /// Ask the model; `{{key}}` placeholders are filled from step variables
    Llm {
        #[serde(default, deserialize_with = "null_as_default")]
        prompt: String,
    },
    /// Run a named tool
    Tool {
        #[serde(default, deserialize_with = "null_as_default")]
        tool: String,
    },
    /// Render a template by id
    Template {
        #[serde(default, deserialize_with = "null_as_default")]
        template_id: String,
    },
    /// Wait for a human decision
    Approval,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Llm { .. } => "llm",
            StepKind::Tool { .. } => "tool",
            StepKind::Template { .. } => "template",
            StepKind::Approval => "approval",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single unit of work in a workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Unique within the owning workflow
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(flatten)]
    pub kind: StepKind,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "HashMap::is_empty"
    )]
    pub variables: Variables,
    /// Ids of steps that must succeed before this one runs
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub depends_on: Vec<String>,
    /// A failed optional step does not stop the run
    #[serde(default, deserialize_with = "null_as_default")]
    pub optional: bool,
    #[serde(default)]
    pub risk_level: RiskLevel,
}

impl Step {
    pub fn new(id: impl Into<String>, description: impl Into<String>, kind: StepKind) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            kind,
            variables: Variables::new(),
            depends_on: Vec::new(),
            optional: false,
            risk_level: RiskLevel::Low,
        }
    }

    pub fn llm(
        id: impl Into<String>,
        description: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self::new(
            id,
            description,
            StepKind::Llm {
                prompt: prompt.into(),
            },
        )
    }

    pub fn tool(
        id: impl Into<String>,
        description: impl Into<String>,
        tool: impl Into<String>,
    ) -> Self {
        Self::new(id, description, StepKind::Tool { tool: tool.into() })
    }

    pub fn template(
        id: impl Into<String>,
        description: impl Into<String>,
        template_id: impl Into<String>,
    ) -> Self {
        Self::new(
            id,
            description,
            StepKind::Template {
                template_id: template_id.into(),
            },
        )
    }

    /// Approval steps are always high risk
    pub fn approval(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(id, description, StepKind::Approval).with_risk(RiskLevel::High)
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    pub fn with_risk(mut self, risk_level: RiskLevel) -> Self {
        self.risk_level = risk_level;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// A multi-step execution plan.
///
/// Step order is the execution order. The executor trusts it to already
/// respect `depends_on`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub steps: Vec<Step>,
    /// Read-only input shared by every step of a run
    #[serde(default)]
    pub context: Variables,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub estimated_time: String,
}

impl Workflow {
    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// True if any step is high risk
    pub fn requires_approval(&self) -> bool {
        self.steps.iter().any(|s| s.risk_level == RiskLevel::High)
    }

    pub fn to_json(&self) -> Result<String, WorkflowError> {
        serde_json::to_string_pretty(self).map_err(WorkflowError::Serialize)
    }

    /// Parse a workflow document. The result has always passed validation.
    pub fn from_json(data: &str) -> Result<Self, WorkflowError> {
        let workflow: Workflow = serde_json::from_str(data).map_err(WorkflowError::Parse)?;
        validate_workflow(&workflow)?;
        Ok(workflow)
    }
}

/// Outcome of one attempted step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
    #[serde(default)]
    pub skipped: bool,
    pub timestamp: DateTime<Utc>,
}

impl StepResult {
    pub(crate) fn succeeded(step_id: &str, output: String, duration: Duration) -> Self {
        Self {
            step_id: step_id.to_string(),
            success: true,
            output,
            error: None,
            duration_ms: duration.as_millis() as u64,
            skipped: false,
            timestamp: Utc::now(),
        }
    }

    pub(crate) fn failed(step_id: &str, error: String, duration: Duration) -> Self {
        Self {
            step_id: step_id.to_string(),
            success: false,
            output: String::new(),
            error: Some(error),
            duration_ms: duration.as_millis() as u64,
            skipped: false,
            timestamp: Utc::now(),
        }
    }

    pub(crate) fn skipped(step_id: &str, missing: &[String]) -> Self {
        Self {
            step_id: step_id.to_string(),
            success: false,
            output: String::new(),
            error: Some(format!("missing dependencies: [{}]", missing.join(", "))),
            duration_ms: 0,
            skipped: true,
            timestamp: Utc::now(),
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

/// Outcome of one workflow run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub success: bool,
    pub step_results: Vec<StepResult>,
    /// Steps declared in the plan, reached or not
    pub total_steps: usize,
    pub completed_steps: usize,
    pub failed_steps: usize,
    pub skipped_steps: usize,
    pub total_duration_ms: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub final_output: String,
}

impl WorkflowResult {
    pub(crate) fn new(total_steps: usize) -> Self {
        Self {
            success: true,
            step_results: Vec::with_capacity(total_steps),
            total_steps,
            completed_steps: 0,
            failed_steps: 0,
            skipped_steps: 0,
            total_duration_ms: 0,
            final_output: String::new(),
        }
    }

    /// Most recent successful, non-empty step output
    pub fn latest_output(&self) -> Option<&str> {
        self.step_results
            .iter()
            .rev()
            .find(|r| r.success && !r.output.is_empty())
            .map(|r| r.output.as_str())
    }

    pub fn result_for(&self, step_id: &str) -> Option<&StepResult> {
        self.step_results.iter().find(|r| r.step_id == step_id)
    }

    pub fn total_duration(&self) -> Duration {
        Duration::from_millis(self.total_duration_ms)
    }

    pub fn progress_percent(&self) -> f32 {
        if self.total_steps == 0 {
            0.0
        } else {
            (self.completed_steps as f32 / self.total_steps as f32) * 100.0
        }
    }

    pub fn summary(&self) -> String {
        let mut summary = format!(
            "{}/{} steps completed",
            self.completed_steps, self.total_steps
        );
        if self.failed_steps > 0 {
            summary.push_str(&format!(", {} failed", self.failed_steps));
        }
        if self.skipped_steps > 0 {
            summary.push_str(&format!(", {} skipped", self.skipped_steps));
        }
        summary
    }
}
