use crate::model::{HistoryTurn, LanguageModel};
use async_trait::async_trait;
use flama_core::Department;
use flama_knowledge::{grounding_for, SupportStore};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Canned reply when the model call fails for any reason (network, quota,
/// timeout). The caller must not retry automatically.
const FALLBACK_REPLY: &str =
    "Estamos com uma alta demanda no momento. Posso te transferir para um atendente humano agora mesmo?";

fn fallback_actions() -> Vec<String> {
    vec!["Sim, falar com humano".into(), "Tentar novamente".into()]
}

/// A bot reply ready to append to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotReply {
    pub text: String,
    pub actions: Vec<String>,
}

/// Seam the orchestrator talks to. Infallible by contract: every failure
/// resolves to a degraded [`BotReply`] inside the implementation.
#[async_trait]
pub trait ResponseService: Send + Sync {
    async fn respond(
        &self,
        user_message: &str,
        history: &[HistoryTurn],
        department: Department,
    ) -> BotReply;
}

/// Expected structured model output.
#[derive(Deserialize)]
struct StructuredReply {
    reply: String,
    #[serde(default, rename = "suggestedActions")]
    suggested_actions: Vec<String>,
}

/// Grounded responder: fetches the department knowledge matching the user
/// message, embeds it in the system instruction, and parses the structured
/// reply.
pub struct Responder {
    model: Box<dyn LanguageModel>,
    store: Arc<dyn SupportStore>,
}

impl Responder {
    pub fn new(model: Box<dyn LanguageModel>, store: Arc<dyn SupportStore>) -> Self {
        Self { model, store }
    }

    fn system_instruction(department: Department, grounding: &str) -> String {
        format!(
            "Você é o Assistente Oficial do Colégio Flama ({department}).\n\
             Use a base de conhecimento interna fornecida abaixo.\n\
             Se o usuário perguntar sobre datas externas (feriados, ENEM, notícias MEC), use a pesquisa do Google.\n\
             \n\
             BASE DE CONHECIMENTO INTERNA:\n\
             ---\n\
             {grounding}\n\
             ---\n\
             \n\
             DIRETRIZES:\n\
             - Responda de forma executiva e acolhedora.\n\
             - Priorize a base interna sobre a externa.\n\
             - Sempre ofereça ajuda humana para casos financeiros ou acadêmicos críticos."
        )
    }

    /// Raw output that fails to parse as the structured shape becomes the
    /// whole reply with no suggested actions.
    fn parse_reply(raw: &str) -> BotReply {
        match serde_json::from_str::<StructuredReply>(raw) {
            Ok(parsed) => BotReply {
                text: parsed.reply,
                actions: parsed.suggested_actions,
            },
            Err(_) => BotReply {
                text: raw.to_string(),
                actions: Vec::new(),
            },
        }
    }
}

#[async_trait]
impl ResponseService for Responder {
    async fn respond(
        &self,
        user_message: &str,
        history: &[HistoryTurn],
        department: Department,
    ) -> BotReply {
        let grounding = grounding_for(self.store.as_ref(), department, user_message).await;
        debug!(
            department = %department,
            grounding_len = grounding.len(),
            history_len = history.len(),
            "Calling language model"
        );

        let instruction = Self::system_instruction(department, &grounding);
        match self.model.generate(&instruction, history, user_message).await {
            Ok(raw) => Self::parse_reply(&raw),
            Err(e) => {
                warn!(error = %e, "Model call failed, returning canned reply");
                BotReply {
                    text: FALLBACK_REPLY.to_string(),
                    actions: fallback_actions(),
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use flama_core::{FlamaError, FlamaResult};
    use flama_knowledge::{FileSupportStore, KnowledgeEntry};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Model double that records the instruction it was given.
    struct ScriptedModel {
        output: FlamaResult<String>,
        seen_instruction: Mutex<Option<String>>,
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn generate(
            &self,
            system_instruction: &str,
            _history: &[HistoryTurn],
            _user_message: &str,
        ) -> FlamaResult<String> {
            *self.seen_instruction.lock().unwrap() = Some(system_instruction.to_string());
            match &self.output {
                Ok(s) => Ok(s.clone()),
                Err(_) => Err(FlamaError::Http("down".into())),
            }
        }
    }

    async fn store_with_boleto(tmp: &TempDir) -> Arc<dyn SupportStore> {
        let store = FileSupportStore::new(tmp.path().to_path_buf()).await.unwrap();
        store
            .add_knowledge(KnowledgeEntry::new(
                Department::Financial,
                "Boleto",
                "Segunda via no portal do aluno",
                "boleto, pagamento",
            ))
            .await
            .unwrap();
        Arc::new(store)
    }

    #[tokio::test]
    async fn structured_reply_is_parsed() {
        let tmp = TempDir::new().unwrap();
        let model = ScriptedModel {
            output: Ok(r#"{"reply":"Segue a segunda via.","suggestedActions":["Chave PIX","Falar com Atendente"]}"#.into()),
            seen_instruction: Mutex::new(None),
        };
        let responder = Responder::new(Box::new(model), store_with_boleto(&tmp).await);

        let reply = responder.respond("quero boleto", &[], Department::Financial).await;
        assert_eq!(reply.text, "Segue a segunda via.");
        assert_eq!(reply.actions, vec!["Chave PIX", "Falar com Atendente"]);
    }

    #[tokio::test]
    async fn grounding_is_embedded_in_instruction() {
        let tmp = TempDir::new().unwrap();
        let model = ScriptedModel {
            output: Ok(r#"{"reply":"ok"}"#.into()),
            seen_instruction: Mutex::new(None),
        };
        let seen = Arc::new(model);
        // Keep a handle to inspect after the call.
        struct Wrap(Arc<ScriptedModel>);
        #[async_trait]
        impl LanguageModel for Wrap {
            async fn generate(
                &self,
                si: &str,
                h: &[HistoryTurn],
                m: &str,
            ) -> FlamaResult<String> {
                self.0.generate(si, h, m).await
            }
        }
        let responder = Responder::new(
            Box::new(Wrap(Arc::clone(&seen))),
            store_with_boleto(&tmp).await,
        );

        responder.respond("boleto", &[], Department::Financial).await;
        let instruction = seen.seen_instruction.lock().unwrap().clone().unwrap();
        assert!(instruction.contains("Tópico: Boleto"));
        assert!(instruction.contains("Financeiro"));
    }

    #[tokio::test]
    async fn unparsable_output_becomes_the_whole_reply() {
        let tmp = TempDir::new().unwrap();
        let model = ScriptedModel {
            output: Ok("apenas texto corrido, sem JSON".into()),
            seen_instruction: Mutex::new(None),
        };
        let responder = Responder::new(Box::new(model), store_with_boleto(&tmp).await);

        let reply = responder.respond("oi", &[], Department::General).await;
        assert_eq!(reply.text, "apenas texto corrido, sem JSON");
        assert!(reply.actions.is_empty());
    }

    #[tokio::test]
    async fn model_failure_yields_canned_reply() {
        let tmp = TempDir::new().unwrap();
        let model = ScriptedModel {
            output: Err(FlamaError::Http("down".into())),
            seen_instruction: Mutex::new(None),
        };
        let responder = Responder::new(Box::new(model), store_with_boleto(&tmp).await);

        let reply = responder.respond("oi", &[], Department::General).await;
        assert_eq!(reply.text, FALLBACK_REPLY);
        assert_eq!(
            reply.actions,
            vec!["Sim, falar com humano", "Tentar novamente"]
        );
    }
}
