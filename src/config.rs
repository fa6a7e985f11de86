use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::decomposer::policy::TEMPLATE_MATCH_THRESHOLD;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub decomposer: DecomposerConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// OpenAI-compatible endpoint (Ollama, vLLM, llama.cpp server, ...)
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "llama3.1".to_string()
}

fn default_max_tokens() -> usize {
    4096
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecomposerConfig {
    /// Template matches below this confidence count as weak
    #[serde(default = "default_template_match_threshold")]
    pub template_match_threshold: f64,
}

fn default_template_match_threshold() -> f64 {
    TEMPLATE_MATCH_THRESHOLD
}

impl Default for DecomposerConfig {
    fn default() -> Self {
        Self {
            template_match_threshold: default_template_match_threshold(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Per-run deadline in seconds, checked between steps (0 = none)
    #[serde(default)]
    pub run_timeout_secs: u64,
}

impl ExecutorConfig {
    pub fn run_timeout(&self) -> Option<Duration> {
        (self.run_timeout_secs > 0).then(|| Duration::from_secs(self.run_timeout_secs))
    }
}

impl Default for Config {
    fn default() -> Self {
        let mut config = Self {
            llm: LlmConfig::default(),
            decomposer: DecomposerConfig::default(),
            executor: ExecutorConfig::default(),
        };
        config.apply_env_overrides();
        config
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let mut config: Config =
            toml::from_str(&content).context("Failed to parse config file")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Endpoint variables win over both the file and the defaults
    fn apply_env_overrides(&mut self) {
        if let Ok(base_url) = std::env::var("CORTEX_LLM_BASE_URL") {
            self.llm.base_url = base_url;
        }
        if let Ok(model) = std::env::var("CORTEX_LLM_MODEL") {
            self.llm.model = model;
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not determine config directory")?;
        Ok(config_dir.join("cortex-decomposer").join("config.toml"))
    }
}
