use crate::model::{HistoryTurn, LanguageModel, ModelConfig};
use async_trait::async_trait;
use flama_core::{FlamaError, FlamaResult};

/// Gemini `generateContent` backend.
///
/// Requests a structured JSON body (`reply` + optional `suggestedActions`)
/// via a response schema, and enables Google Search as a fallback tool for
/// external or time-sensitive facts.
pub struct GeminiBackend {
    config: ModelConfig,
    http: reqwest::Client,
}

impl GeminiBackend {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn build_contents(&self, history: &[HistoryTurn], user_message: &str) -> Vec<serde_json::Value> {
        let mut contents: Vec<serde_json::Value> = history
            .iter()
            .map(|turn| {
                serde_json::json!({
                    "role": turn.speaker.as_str(),
                    "parts": [{"text": turn.text}]
                })
            })
            .collect();
        contents.push(serde_json::json!({
            "role": "user",
            "parts": [{"text": user_message}]
        }));
        contents
    }
}

#[async_trait]
impl LanguageModel for GeminiBackend {
    async fn generate(
        &self,
        system_instruction: &str,
        history: &[HistoryTurn],
        user_message: &str,
    ) -> FlamaResult<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url(),
            self.config.model_id
        );

        let body = serde_json::json!({
            "contents": self.build_contents(history, user_message),
            "systemInstruction": {"parts": [{"text": system_instruction}]},
            "tools": [{"google_search": {}}],
            "generationConfig": {
                "temperature": self.config.temperature,
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "OBJECT",
                    "properties": {
                        "reply": {
                            "type": "STRING",
                            "description": "A resposta textual para o usuário."
                        },
                        "suggestedActions": {
                            "type": "ARRAY",
                            "items": {"type": "STRING"},
                            "description": "Lista de 2 a 4 frases curtas para botões de ação rápida."
                        }
                    },
                    "required": ["reply"]
                }
            }
        });

        let resp = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| FlamaError::Http(e.to_string()))?;

        let status = resp.status();
        let resp_body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| FlamaError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(FlamaError::Http(format!(
                "Gemini API error {status}: {resp_body}"
            )));
        }

        resp_body["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| FlamaError::Model("Gemini response carried no text part".to_string()))
    }
}
