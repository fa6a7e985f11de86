use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{LlmClient, Message};

/// Client for Ollama and other OpenAI-compatible chat endpoints
pub struct OllamaClient {
    base_url: String,
    model: String,
    max_tokens: usize,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

impl OllamaClient {
    pub fn new(base_url: Option<String>, model: String, max_tokens: usize) -> Self {
        Self {
            base_url: base_url
                .unwrap_or_else(|| "http://localhost:11434".to_string())
                .trim_end_matches('/')
                .to_string(),
            model,
            max_tokens,
            client: reqwest::Client::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn chat(&self, messages: &[Message], system_prompt: Option<&str>) -> Result<String> {
        let mut chat_messages = Vec::with_capacity(messages.len() + 1);

        if let Some(system) = system_prompt.filter(|s| !s.is_empty()) {
            chat_messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }

        chat_messages.extend(messages.iter().map(|msg| ChatMessage {
            role: msg.role.as_str(),
            content: &msg.content,
        }));

        let request = ChatRequest {
            model: &self.model,
            messages: chat_messages,
            max_tokens: (self.max_tokens > 0).then_some(self.max_tokens),
        };

        let url = format!("{}/v1/chat/completions", self.base_url);

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            anyhow::bail!("LLM API error ({}): {}", status, error_text);
        }

        let chat_response: ChatResponse = response.json().await?;

        let choice = chat_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("No response from LLM"))?;

        Ok(choice.message.content.unwrap_or_default())
    }
}
