use async_trait::async_trait;
use flama_core::FlamaResult;
use serde::{Deserialize, Serialize};

/// Who produced a history turn, in the model's own vocabulary: the bot's
/// past replies are presented as the model's own turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Model,
}

impl Speaker {
    pub fn as_str(&self) -> &'static str {
        match self {
            Speaker::User => "user",
            Speaker::Model => "model",
        }
    }
}

/// One prior exchange handed to the model as conversation context.
#[derive(Debug, Clone)]
pub struct HistoryTurn {
    pub speaker: Speaker,
    pub text: String,
}

/// Text-mode language model contract. Returns the raw model output; the
/// [`crate::Responder`] owns structured parsing and fallbacks.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(
        &self,
        system_instruction: &str,
        history: &[HistoryTurn],
        user_message: &str,
    ) -> FlamaResult<String>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_id")]
    pub model_id: String,
    pub api_key: String,
    pub api_base_url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_model_id() -> String {
    "gemini-3-pro-preview".to_string()
}

fn default_temperature() -> f32 {
    0.5
}

impl ModelConfig {
    pub fn base_url(&self) -> &str {
        self.api_base_url
            .as_deref()
            .unwrap_or("https://generativelanguage.googleapis.com")
    }
}
