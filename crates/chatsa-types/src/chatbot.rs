use chatsa_llm::ProviderType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant for a business website. \
Answer using only the provided context. If the answer is not in the context, say you don't know \
and offer to connect the visitor with the team.";

/// Tenant-owned chatbot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chatbot {
    pub id: String,
    pub team_id: String,
    pub name: String,
    /// Dataset id at the knowledge provider
    pub dataset_id: String,
    pub settings: ChatbotSettings,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Chatbot {
    pub fn new(
        team_id: impl Into<String>,
        name: impl Into<String>,
        dataset_id: impl Into<String>,
        settings: ChatbotSettings,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: crate::new_id(),
            team_id: team_id.into(),
            name: name.into(),
            dataset_id: dataset_id.into(),
            settings,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Missing fields take their defaults when deserializing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatbotSettings {
    pub provider: ProviderType,
    pub model: String,
    pub temperature: f32,
    pub system_prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub welcome_message: Option<String>,
    /// Knowledge chunks retrieved per question
    pub context_chunks: u32,
    /// Previous conversation messages sent to the model
    pub history_messages: u32,
}

impl Default for ChatbotSettings {
    fn default() -> Self {
        Self {
            provider: ProviderType::OpenAI,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.3,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            welcome_message: None,
            context_chunks: 5,
            history_messages: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings_use_defaults() {
        let settings: ChatbotSettings =
            serde_json::from_str(r#"{"provider":"anthropic","model":"claude-3-5-haiku-latest"}"#).unwrap();
        assert_eq!(settings.provider, ProviderType::Anthropic);
        assert_eq!(settings.context_chunks, 5);
        assert_eq!(settings.system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert!(settings.welcome_message.is_none());
    }
}
