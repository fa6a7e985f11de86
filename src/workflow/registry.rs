use anyhow::Result;
use async_trait::async_trait;

use super::executor::ToolExecutor;
use super::types::Variables;

/// A named tool that workflow tool steps can call
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn name(&self) -> &str;
    async fn execute(&self, variables: &Variables) -> Result<String>;
}

/// Tools available to one executor, looked up by name.
///
/// Built and owned by the caller; nothing is registered implicitly.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool, replacing any tool already registered under its name
    pub fn register(&mut self, tool: Box<dyn ToolHandler>) {
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(tool);
    }

    pub fn with_tool(mut self, tool: Box<dyn ToolHandler>) -> Self {
        self.register(tool);
        self
    }

    pub fn get_tool(&self, name: &str) -> Option<&dyn ToolHandler> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    async fn execute_tool(&self, tool: &str, variables: &Variables) -> Result<String> {
        match self.get_tool(tool) {
            Some(handler) => handler.execute(variables).await,
            None => anyhow::bail!("unknown tool: {}", tool),
        }
    }
}
