//! Fluent construction of workflows
//!
//! The builder never validates. Call [`validate_workflow`] on the result
//! before running it.
//!
//! [`validate_workflow`]: super::validate::validate_workflow

use chrono::Utc;
use uuid::Uuid;

use super::types::{RiskLevel, Step, Variables, Workflow};

pub struct WorkflowBuilder {
    workflow: Workflow,
}

impl WorkflowBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            workflow: Workflow {
                id: Uuid::new_v4().to_string(),
                name: name.into(),
                description: String::new(),
                steps: Vec::new(),
                context: Variables::new(),
                created_at: Utc::now(),
                estimated_time: String::new(),
            },
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.workflow.description = description.into();
        self
    }

    pub fn with_estimated_time(mut self, estimated_time: impl Into<String>) -> Self {
        self.workflow.estimated_time = estimated_time.into();
        self
    }

    /// Merge entries into the shared context, replacing existing keys
    pub fn with_context<I, K>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, serde_json::Value)>,
        K: Into<String>,
    {
        self.workflow
            .context
            .extend(entries.into_iter().map(|(k, v)| (k.into(), v)));
        self
    }

    /// Append a step. An empty id becomes `step{N}`, N being the 1-based
    /// position at append time.
    pub fn add_step(mut self, mut step: Step) -> Self {
        if step.id.is_empty() {
            step.id = format!("step{}", self.workflow.steps.len() + 1);
        }
        self.workflow.steps.push(step);
        self
    }

    pub fn add_llm_step<I, S>(
        self,
        description: impl Into<String>,
        prompt: impl Into<String>,
        deps: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_step(Step::llm("", description, prompt).with_dependencies(deps))
    }

    pub fn add_tool_step<I, S>(
        self,
        description: impl Into<String>,
        tool: impl Into<String>,
        risk_level: RiskLevel,
        deps: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_step(
            Step::tool("", description, tool)
                .with_risk(risk_level)
                .with_dependencies(deps),
        )
    }

    pub fn add_template_step<I, S>(
        self,
        description: impl Into<String>,
        template_id: impl Into<String>,
        deps: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_step(Step::template("", description, template_id).with_dependencies(deps))
    }

    pub fn add_approval_step<I, S>(self, description: impl Into<String>, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_step(Step::approval("", description).with_dependencies(deps))
    }

    pub fn build(self) -> Workflow {
        self.workflow
    }
}
