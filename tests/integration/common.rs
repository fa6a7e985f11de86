#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use cortex_decomposer::llm::{LlmClient, Message};
use cortex_decomposer::workflow::{
    ApprovalHandler, Step, TemplateExecutor, ToolExecutor, Variables,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// One recorded call to a scripted collaborator
#[derive(Debug, Clone)]
pub struct LlmCall {
    pub messages: Vec<Message>,
    pub system_prompt: Option<String>,
}

/// LLM that answers from a fixed script, in order, and records every call
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<Result<String, String>>>,
    calls: Mutex<Vec<LlmCall>>,
    delay: Option<Duration>,
}

impl ScriptedLlm {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            calls: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub fn failing(error: &str) -> Self {
        Self {
            replies: Mutex::new(VecDeque::from([Err(error.to_string())])),
            calls: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Wait this long before answering each call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<LlmCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn chat(&self, messages: &[Message], system_prompt: Option<&str>) -> Result<String> {
        self.calls.lock().unwrap().push(LlmCall {
            messages: messages.to_vec(),
            system_prompt: system_prompt.map(str::to_string),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Ok(text)) => Ok(text),
            Some(Err(error)) => Err(anyhow::anyhow!(error)),
            None => Err(anyhow::anyhow!("script exhausted")),
        }
    }
}

/// Tools with canned outcomes keyed by tool name
#[derive(Default)]
pub struct ScriptedTools {
    outcomes: HashMap<String, Result<String, String>>,
    calls: Mutex<Vec<(String, Variables)>>,
    delay: Option<Duration>,
}

impl ScriptedTools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn succeed(mut self, tool: &str, output: &str) -> Self {
        self.outcomes
            .insert(tool.to_string(), Ok(output.to_string()));
        self
    }

    pub fn fail(mut self, tool: &str, error: &str) -> Self {
        self.outcomes
            .insert(tool.to_string(), Err(error.to_string()));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<(String, Variables)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called(&self) -> Vec<String> {
        self.calls().into_iter().map(|(tool, _)| tool).collect()
    }
}

#[async_trait]
impl ToolExecutor for ScriptedTools {
    async fn execute_tool(&self, tool: &str, variables: &Variables) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((tool.to_string(), variables.clone()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.outcomes.get(tool) {
            Some(Ok(output)) => Ok(output.clone()),
            Some(Err(error)) => Err(anyhow::anyhow!(error.clone())),
            None => Ok(format!("{} done", tool)),
        }
    }
}

/// Renders a template as `<id>:<sorted variable keys>`
pub struct EchoTemplates;

#[async_trait]
impl TemplateExecutor for EchoTemplates {
    async fn execute_template(&self, template_id: &str, variables: &Variables) -> Result<String> {
        let mut keys: Vec<&str> = variables.keys().map(String::as_str).collect();
        keys.sort_unstable();
        Ok(format!("{}:{}", template_id, keys.join(",")))
    }
}

/// Gives the same answer to every approval request and records the step ids
pub struct FixedApproval {
    approve: bool,
    asked: Mutex<Vec<String>>,
}

impl FixedApproval {
    pub fn new(approve: bool) -> Self {
        Self {
            approve,
            asked: Mutex::new(Vec::new()),
        }
    }

    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().unwrap().clone()
    }
}

#[async_trait]
impl ApprovalHandler for FixedApproval {
    async fn request_approval(&self, step: &Step) -> Result<bool> {
        self.asked.lock().unwrap().push(step.id.clone());
        Ok(self.approve)
    }
}

/// Request that scores well above the complex threshold as infrastructure work
pub const COMPLEX_REQUEST: &str = "First back up the database, then run the migration \
    scripts in db/migrations/001_init.sql and db/migrations/002_users.sql, and finally \
    apply the kubernetes manifests from deploy/k8s/app.yaml. If the rollout fails, \
    replay the transaction log.";

/// A plan in the shape the decomposition prompt asks for
pub const PLAN_JSON: &str = r#"{
  "steps": [
    {"id": "backup", "description": "Back up the database", "type": "tool", "tool": "bash", "risk_level": "medium"},
    {"id": "gate", "description": "Confirm the migration", "type": "approval", "risk_level": "high", "depends_on": ["backup"]},
    {"id": "migrate", "description": "Apply the schema migration", "type": "tool", "tool": "bash", "risk_level": "high", "depends_on": ["gate"]},
    {"id": "report", "description": "Summarize what changed", "type": "llm", "depends_on": ["migrate"]}
  ],
  "estimated_time": "20-30 minutes",
  "requires_approval": false
}"#;
