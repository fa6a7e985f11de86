//! Language-model collaborator
//!
//! The decomposer and the workflow executor only need "messages in, text
//! out". `OllamaClient` is the bundled implementation; anything else can be
//! plugged in through [`LlmClient`].

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::LlmConfig;

pub mod ollama;

pub use ollama::OllamaClient;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send an ordered conversation with an optional system prompt and
    /// return the model's text reply
    async fn chat(&self, messages: &[Message], system_prompt: Option<&str>) -> Result<String>;
}

/// Create the configured LLM client
pub fn create_client(config: &LlmConfig) -> Arc<dyn LlmClient> {
    tracing::debug!(
        "Using OpenAI-compatible endpoint {} (model {})",
        config.base_url,
        config.model
    );
    Arc::new(OllamaClient::new(
        Some(config.base_url.clone()),
        config.model.clone(),
        config.max_tokens,
    ))
}
