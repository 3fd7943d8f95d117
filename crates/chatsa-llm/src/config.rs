// Factory for building chat clients from provider configuration

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::anthropic::AnthropicClient;
use crate::openai::OpenAIClient;
use crate::traits::ChatClient;

/// LLM provider a chatbot answers with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    #[default]
    OpenAI,
    Anthropic,
    DeepSeek,
    Groq,
    Gemini,
}

impl ProviderType {
    pub const ALL: [ProviderType; 5] = [
        ProviderType::OpenAI,
        ProviderType::Anthropic,
        ProviderType::DeepSeek,
        ProviderType::Groq,
        ProviderType::Gemini,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::OpenAI => "openai",
            ProviderType::Anthropic => "anthropic",
            ProviderType::DeepSeek => "deepseek",
            ProviderType::Groq => "groq",
            ProviderType::Gemini => "gemini",
        }
    }

    /// Base URL of the provider's API
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderType::OpenAI => crate::openai::OPENAI_API_BASE,
            ProviderType::Anthropic => crate::anthropic::ANTHROPIC_API_BASE,
            ProviderType::DeepSeek => "https://api.deepseek.com/v1",
            ProviderType::Groq => "https://api.groq.com/openai/v1",
            ProviderType::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai",
        }
    }

    /// Whether the provider speaks the chat-completions wire format
    pub fn is_openai_compatible(&self) -> bool {
        !matches!(self, ProviderType::Anthropic)
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        ProviderType::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| anyhow::anyhow!("Unknown LLM provider: {}", s))
    }
}

/// Complete provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider: ProviderType,
    pub api_key: String,
    /// Overrides the provider's default base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl ProviderConfig {
    pub fn new(provider: ProviderType, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
            base_url: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
    }
}

/// Factory for creating LLM clients from configuration
pub struct ClientFactory;

impl ClientFactory {
    pub fn create_chat_client(config: ProviderConfig) -> Result<Arc<dyn ChatClient>> {
        let base_url = config.base_url().to_string();
        if config.provider.is_openai_compatible() {
            let client = OpenAIClient::new(config.api_key)?.with_base_url(base_url);
            Ok(Arc::new(client))
        } else {
            let client = AnthropicClient::new(config.api_key)?.with_base_url(base_url);
            Ok(Arc::new(client))
        }
    }
}
