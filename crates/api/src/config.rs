//! Server configuration.

use secondbrain_memory::MemoryConfig;
use secondbrain_orchestrator::OrchestratorConfig;
use serde::{Deserialize, Serialize};

/// Full server configuration, loadable from a TOML file with environment
/// overrides applied by the binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Listen port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Models advertised on `/v1/models`.
    #[serde(default = "default_models")]
    pub models: Vec<String>,

    /// Webhook HMAC secret; unset disables verification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_secret: Option<String>,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Downstream reasoning engine; unset runs with placeholders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<UpstreamConfig>,

    /// Remote embedder; unset uses the deterministic mock.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedder: Option<UpstreamConfig>,
}

/// Connection settings for an OpenAI-compatible upstream service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub model: String,
    /// Falls back to the `OPENAI_API_KEY` environment variable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl UpstreamConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(ref key) = self.api_key {
            if !key.is_empty() {
                return Some(key.clone());
            }
        }
        std::env::var("OPENAI_API_KEY").ok()
    }
}

fn default_bind() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    8080
}

fn default_models() -> Vec<String> {
    vec!["secondbrain".into()]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            models: default_models(),
            webhook_secret: None,
            memory: MemoryConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            reasoning: None,
            embedder: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}
