use crate::escalation::{handoff_link, resolve_attendant, wants_human, HandoffOpener};
use flama_agent::{HistoryTurn, ResponseService, Speaker};
use flama_core::{default_actions, Department, Message, Role};
use flama_knowledge::{ChatLogger, SupportStore};
use flama_session::{Session, SessionStatus, SessionStore};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Timing and context-window knobs. Tests zero the delays.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Pause between the escalation request and the transfer announcement.
    pub transfer_delay: Duration,
    /// Pause between the announcement and the external window opening.
    pub handoff_delay: Duration,
    /// How many trailing messages are replayed to the model as context.
    pub history_window: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            transfer_delay: Duration::from_millis(800),
            handoff_delay: Duration::from_secs(2),
            history_window: 6,
        }
    }
}

/// Drives one conversation through its lifecycle: department selection,
/// grounded bot replies, escalation to a human attendant over WhatsApp,
/// and post-handoff pass-through.
///
/// All methods take `&self`; the session lives behind an async lock so a
/// reset can land while a reply is in flight. In-flight work re-checks the
/// session id before appending and silently discards stale results.
pub struct Orchestrator {
    session: RwLock<Session>,
    store: Arc<dyn SessionStore>,
    support: Arc<dyn SupportStore>,
    responder: Arc<dyn ResponseService>,
    logger: ChatLogger,
    opener: Arc<dyn HandoffOpener>,
    typing: AtomicBool,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Restore the persisted session (or a fresh idle one) and wire the
    /// collaborators together.
    pub async fn load(
        store: Arc<dyn SessionStore>,
        support: Arc<dyn SupportStore>,
        responder: Arc<dyn ResponseService>,
        opener: Arc<dyn HandoffOpener>,
        config: OrchestratorConfig,
    ) -> Self {
        let session = store.load_session().await;
        let logger = ChatLogger::new(Arc::clone(&support));
        Self {
            session: RwLock::new(session),
            store,
            support,
            responder,
            logger,
            opener,
            typing: AtomicBool::new(false),
            config,
        }
    }

    pub async fn session(&self) -> Session {
        self.session.read().await.clone()
    }

    /// Whether a bot reply is currently being produced.
    pub fn is_typing(&self) -> bool {
        self.typing.load(Ordering::SeqCst)
    }

    /// Start over in the chosen department with a seeded welcome message.
    /// Always produces a brand-new session, even mid-conversation.
    pub async fn select_department(&self, department: Department) {
        let welcome = Message::bot(format!(
            "Olá! Bem-vindo ao setor: {}. Sou o assistente digital do Colégio Flama. \
             Como posso te auxiliar hoje?",
            department.label()
        ))
        .with_department(department)
        .with_actions(default_actions(department));

        let mut fresh = Session::new(Some(department));
        fresh.append_message(welcome.clone());

        *self.session.write().await = fresh;
        self.typing.store(false, Ordering::SeqCst);
        self.persist().await;
        self.log_message(&welcome).await;
        info!(department = %department, "Department selected");
    }

    /// Wipe everything back to the idle state.
    pub async fn reset(&self) {
        *self.session.write().await = Session::new(None);
        self.typing.store(false, Ordering::SeqCst);
        if let Err(e) = self.store.clear_session().await {
            warn!(error = %e, "Session clear failed");
        }
        info!("Conversation reset");
    }

    /// Handle one user message end to end. Returns once the conversation
    /// has settled (bot reply appended, escalation completed, or the
    /// message parked for a human).
    pub async fn send_user_message(&self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        let message = Message::user(text);
        let (session_id, status, department) = {
            let mut session = self.session.write().await;
            session.append_message(message.clone());
            (session.id, session.status, session.department)
        };
        self.persist().await;
        self.log_message(&message).await;

        match status {
            // Parked: a human owns the conversation, the bot stays quiet.
            SessionStatus::WaitingHuman | SessionStatus::Human => {
                debug!("Message appended while under human support");
            }
            SessionStatus::Idle | SessionStatus::Bot => {
                if wants_human(text) {
                    self.escalate_internal(session_id, text.to_string(), department)
                        .await;
                } else {
                    self.reply(session_id, text.to_string(), department).await;
                }
            }
        }
    }

    /// Explicit escalation, e.g. the "Falar com Atendente" quick action.
    pub async fn escalate(&self) {
        let (session_id, department, query) = {
            let session = self.session.read().await;
            let query = session
                .messages
                .iter()
                .rev()
                .find(|m| m.role == Role::User)
                .map(|m| m.text.clone())
                .unwrap_or_else(|| "atendimento".to_string());
            (session.id, session.department, query)
        };
        self.escalate_internal(session_id, query, department).await;
    }

    /// Append a human attendant's reply arriving through the admin side.
    pub async fn append_human_reply(&self, text: &str) {
        let message = Message::human(text);
        {
            let mut session = self.session.write().await;
            session.status = SessionStatus::Human;
            session.human_support = true;
            session.append_message(message.clone());
        }
        self.persist().await;
        self.log_message(&message).await;
    }

    /// Append one flushed voice turn (already transcribed) to the session.
    pub async fn append_voice_turn(&self, role: Role, text: &str) {
        let department = self.session.read().await.department;
        let mut message = Message::new(role, text).as_voice(text);
        if let Some(department) = department {
            message = message.with_department(department);
        }
        {
            let mut session = self.session.write().await;
            session.append_message(message.clone());
        }
        self.persist().await;
        self.log_message(&message).await;
    }

    /// Produce and append one grounded bot reply. Holds the typing flag
    /// for the duration; a concurrent send is dropped rather than queued.
    async fn reply(&self, session_id: Uuid, text: String, department: Option<Department>) {
        if self
            .typing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Reply already in flight, dropping send");
            return;
        }

        let department = department.unwrap_or(Department::General);
        let history = self.history_window().await;
        let reply = self.responder.respond(&text, &history, department).await;

        let actions = if reply.actions.is_empty() {
            default_actions(department)
        } else {
            reply.actions
        };
        let message = Message::bot(reply.text)
            .with_department(department)
            .with_actions(actions);

        // A reset or department switch can replace the session at any
        // point up to the append, so the id check and the append must
        // share one critical section.
        let appended = {
            let mut session = self.session.write().await;
            if session.id == session_id {
                session.append_message(message.clone());
                true
            } else {
                false
            }
        };
        self.typing.store(false, Ordering::SeqCst);
        if !appended {
            debug!("Discarding reply for a replaced session");
            return;
        }
        self.persist().await;
        self.log_message(&message).await;
    }

    /// The WhatsApp handoff: announce the transfer, mark the session as
    /// waiting, open the deep link when the attendant has a phone, then
    /// hand the conversation to the human.
    async fn escalate_internal(
        &self,
        session_id: Uuid,
        query: String,
        department: Option<Department>,
    ) {
        self.typing.store(true, Ordering::SeqCst);
        tokio::time::sleep(self.config.transfer_delay).await;

        if self.session.read().await.id != session_id {
            self.typing.store(false, Ordering::SeqCst);
            return;
        }

        let attendant = resolve_attendant(self.support.as_ref(), department).await;
        let announcement = Message::system(format!(
            "Entendo. Estou te conectando agora com {} via WhatsApp para um atendimento personalizado.",
            attendant.name
        ));
        // Same rule as the bot reply: the id check and the state change
        // share one critical section so a queued reset cannot interleave.
        let announced = {
            let mut session = self.session.write().await;
            if session.id == session_id {
                session.status = SessionStatus::WaitingHuman;
                session.human_support = true;
                session.append_message(announcement.clone());
                true
            } else {
                false
            }
        };
        self.typing.store(false, Ordering::SeqCst);
        if !announced {
            debug!("Discarding escalation for a replaced session");
            return;
        }
        self.persist().await;
        self.log_message(&announcement).await;
        info!(attendant = %attendant.name, "Escalation announced");

        tokio::time::sleep(self.config.handoff_delay).await;
        if self.session.read().await.id != session_id {
            return;
        }

        if !attendant.phone.is_empty() {
            let url = handoff_link(&attendant.name, &attendant.phone, &query);
            let opened = Message::human(
                "Janela de chat externo aberta. Se preferir, aguarde aqui por uma resposta direta.",
            );
            let landed = {
                let mut session = self.session.write().await;
                if session.id == session_id {
                    // The external window only opens for the session that
                    // asked for it.
                    self.opener.open(&url);
                    session.status = SessionStatus::Human;
                    session.append_message(opened.clone());
                    true
                } else {
                    false
                }
            };
            if landed {
                self.persist().await;
                self.log_message(&opened).await;
            }
        }
    }

    /// Trailing messages mapped into the model's two-speaker vocabulary:
    /// bot messages replay as the model, everything else as the user.
    async fn history_window(&self) -> Vec<HistoryTurn> {
        let session = self.session.read().await;
        let count = session.messages.len();
        // Exclude the user message just appended; it travels separately.
        let prior = &session.messages[..count.saturating_sub(1)];
        prior
            .iter()
            .rev()
            .map(|m| HistoryTurn {
                speaker: if m.role == Role::Bot {
                    Speaker::Model
                } else {
                    Speaker::User
                },
                text: m.text.clone(),
            })
            .take(self.config.history_window)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect()
    }

    /// Persistence failures must never break the conversation.
    async fn persist(&self) {
        let session = self.session.read().await.clone();
        if let Err(e) = self.store.save_session(&session).await {
            warn!(error = %e, "Session save failed");
        }
    }

    async fn log_message(&self, message: &Message) {
        let session = self.session.read().await;
        self.logger
            .log(session.id, message.role, &message.text, session.department);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use flama_agent::BotReply;
    use flama_core::FlamaResult;
    use flama_knowledge::FileSupportStore;
    use flama_session::ThemeConfig;
    use parking_lot::Mutex;
    use tempfile::TempDir;

    /// In-memory session store; optionally fails every save.
    #[derive(Default)]
    struct MemoryStore {
        session: Mutex<Option<Session>>,
        fail_saves: bool,
    }

    #[async_trait]
    impl SessionStore for MemoryStore {
        async fn load_session(&self) -> Session {
            self.session.lock().clone().unwrap_or_default()
        }

        async fn save_session(&self, session: &Session) -> FlamaResult<()> {
            if self.fail_saves {
                return Err(flama_core::FlamaError::Storage("disk full".into()));
            }
            *self.session.lock() = Some(session.clone());
            Ok(())
        }

        async fn clear_session(&self) -> FlamaResult<()> {
            *self.session.lock() = None;
            Ok(())
        }

        async fn load_theme(&self) -> ThemeConfig {
            ThemeConfig::default()
        }

        async fn save_theme(&self, _theme: &ThemeConfig) -> FlamaResult<()> {
            Ok(())
        }
    }

    struct ScriptedResponder {
        reply: BotReply,
        delay: Duration,
    }

    #[async_trait]
    impl ResponseService for ScriptedResponder {
        async fn respond(
            &self,
            _user_message: &str,
            _history: &[HistoryTurn],
            _department: Department,
        ) -> BotReply {
            tokio::time::sleep(self.delay).await;
            self.reply.clone()
        }
    }

    #[derive(Default)]
    struct RecordingOpener {
        urls: Mutex<Vec<String>>,
    }

    impl HandoffOpener for RecordingOpener {
        fn open(&self, url: &str) {
            self.urls.lock().push(url.to_string());
        }
    }

    fn zero_delays() -> OrchestratorConfig {
        OrchestratorConfig {
            transfer_delay: Duration::ZERO,
            handoff_delay: Duration::ZERO,
            history_window: 6,
        }
    }

    async fn build(
        tmp: &TempDir,
        reply: &str,
        delay: Duration,
    ) -> (Orchestrator, Arc<RecordingOpener>, Arc<dyn SupportStore>) {
        let support: Arc<dyn SupportStore> =
            Arc::new(FileSupportStore::new(tmp.path().to_path_buf()).await.unwrap());
        let opener = Arc::new(RecordingOpener::default());
        let orchestrator = Orchestrator::load(
            Arc::new(MemoryStore::default()),
            Arc::clone(&support),
            Arc::new(ScriptedResponder {
                reply: BotReply {
                    text: reply.to_string(),
                    actions: vec![],
                },
                delay,
            }),
            Arc::clone(&opener) as Arc<dyn HandoffOpener>,
            zero_delays(),
        )
        .await;
        (orchestrator, opener, support)
    }

    #[tokio::test]
    async fn department_selection_seeds_welcome_with_actions() {
        let tmp = TempDir::new().unwrap();
        let (orchestrator, _, _) = build(&tmp, "ok", Duration::ZERO).await;

        orchestrator.select_department(Department::Financial).await;

        let session = orchestrator.session().await;
        assert_eq!(session.status, SessionStatus::Bot);
        assert_eq!(session.messages.len(), 1);
        let welcome = &session.messages[0];
        assert_eq!(welcome.role, Role::Bot);
        assert!(welcome.text.contains("Financeiro"));
        let actions = welcome.suggested_actions.as_ref().unwrap();
        assert!(actions.contains(&"Falar com Atendente".to_string()));
    }

    #[tokio::test]
    async fn user_message_gets_a_bot_reply_in_order() {
        let tmp = TempDir::new().unwrap();
        let (orchestrator, _, _) = build(&tmp, "Segue o boleto.", Duration::ZERO).await;
        orchestrator.select_department(Department::Financial).await;

        orchestrator.send_user_message("quero meu boleto").await;

        let session = orchestrator.session().await;
        assert_eq!(session.messages.len(), 3);
        assert_eq!(session.messages[1].role, Role::User);
        assert_eq!(session.messages[2].role, Role::Bot);
        assert_eq!(session.messages[2].text, "Segue o boleto.");
        assert!(!orchestrator.is_typing());
    }

    #[tokio::test]
    async fn responder_receives_welcome_as_history() {
        struct RecordingResponder {
            seen: Mutex<Option<(Vec<String>, Department)>>,
        }

        #[async_trait]
        impl ResponseService for RecordingResponder {
            async fn respond(
                &self,
                _user_message: &str,
                history: &[HistoryTurn],
                department: Department,
            ) -> BotReply {
                let texts = history.iter().map(|t| t.text.clone()).collect();
                *self.seen.lock() = Some((texts, department));
                BotReply {
                    text: "ok".into(),
                    actions: vec![],
                }
            }
        }

        let tmp = TempDir::new().unwrap();
        let support: Arc<dyn SupportStore> =
            Arc::new(FileSupportStore::new(tmp.path().to_path_buf()).await.unwrap());
        let responder = Arc::new(RecordingResponder {
            seen: Mutex::new(None),
        });
        let orchestrator = Orchestrator::load(
            Arc::new(MemoryStore::default()),
            support,
            Arc::clone(&responder) as Arc<dyn ResponseService>,
            Arc::new(RecordingOpener::default()),
            zero_delays(),
        )
        .await;
        orchestrator.select_department(Department::Financial).await;

        orchestrator.send_user_message("quero boleto").await;

        let (history, department) = responder.seen.lock().clone().unwrap();
        assert_eq!(department, Department::Financial);
        assert_eq!(history.len(), 1);
        assert!(history[0].contains("Bem-vindo ao setor"));
    }

    #[tokio::test]
    async fn empty_reply_actions_fall_back_to_defaults() {
        let tmp = TempDir::new().unwrap();
        let (orchestrator, _, _) = build(&tmp, "resposta", Duration::ZERO).await;
        orchestrator.select_department(Department::Support).await;

        orchestrator.send_user_message("senha do portal").await;

        let session = orchestrator.session().await;
        let actions = session.messages[2].suggested_actions.as_ref().unwrap();
        assert_eq!(actions, &default_actions(Department::Support));
    }

    #[tokio::test]
    async fn trigger_word_escalates_to_whatsapp() {
        let tmp = TempDir::new().unwrap();
        let (orchestrator, opener, support) = build(&tmp, "nunca chamado", Duration::ZERO).await;
        support
            .upsert_attendants(vec![flama_knowledge::AttendantConfig {
                department: Department::Financial,
                name: "Carla".into(),
                phone: "(11) 98765-4321".into(),
            }])
            .await
            .unwrap();
        orchestrator.select_department(Department::Financial).await;

        orchestrator
            .send_user_message("preciso falar com um humano")
            .await;

        let session = orchestrator.session().await;
        assert_eq!(session.status, SessionStatus::Human);
        assert!(session.human_support);
        let texts: Vec<&str> = session.messages.iter().map(|m| m.text.as_str()).collect();
        assert!(texts.iter().any(|t| t.contains("Carla via WhatsApp")));
        assert!(texts.iter().any(|t| t.contains("Janela de chat externo")));
        // The responder must not run for an escalation message.
        assert!(!texts.contains(&"nunca chamado"));
        let handoff = session
            .messages
            .iter()
            .find(|m| m.text.contains("Janela de chat externo"))
            .unwrap();
        assert_eq!(handoff.role, Role::Human);

        let urls = opener.urls.lock();
        assert_eq!(urls.len(), 1);
        assert!(urls[0].starts_with("https://wa.me/5511987654321?text="));
    }

    #[tokio::test]
    async fn escalation_without_attendant_stays_waiting() {
        let tmp = TempDir::new().unwrap();
        let (orchestrator, opener, _) = build(&tmp, "n/a", Duration::ZERO).await;
        orchestrator.select_department(Department::General).await;

        orchestrator.send_user_message("quero um atendente").await;

        let session = orchestrator.session().await;
        assert_eq!(session.status, SessionStatus::WaitingHuman);
        assert!(opener.urls.lock().is_empty());
        assert!(session
            .messages
            .iter()
            .any(|m| m.text.contains("Secretaria Flama")));
    }

    #[tokio::test]
    async fn messages_while_waiting_are_parked() {
        let tmp = TempDir::new().unwrap();
        let (orchestrator, _, _) = build(&tmp, "não deveria responder", Duration::ZERO).await;
        orchestrator.select_department(Department::General).await;
        orchestrator.send_user_message("quero um atendente").await;

        let before = orchestrator.session().await.messages.len();
        orchestrator.send_user_message("alguém aí? é urgente").await;

        let session = orchestrator.session().await;
        assert_eq!(session.messages.len(), before + 1);
        assert_eq!(session.last_message().unwrap().role, Role::User);
    }

    #[tokio::test]
    async fn human_reply_moves_session_to_human() {
        let tmp = TempDir::new().unwrap();
        let (orchestrator, _, _) = build(&tmp, "n/a", Duration::ZERO).await;
        orchestrator.select_department(Department::General).await;
        orchestrator.send_user_message("quero um atendente").await;

        orchestrator.append_human_reply("Oi, sou a Ana. Como posso ajudar?").await;

        let session = orchestrator.session().await;
        assert_eq!(session.status, SessionStatus::Human);
        assert_eq!(session.last_message().unwrap().role, Role::Human);
    }

    #[tokio::test]
    async fn reset_returns_to_idle() {
        let tmp = TempDir::new().unwrap();
        let (orchestrator, _, _) = build(&tmp, "ok", Duration::ZERO).await;
        orchestrator.select_department(Department::Admissions).await;
        orchestrator.send_user_message("como faço matrícula?").await;
        let previous_id = orchestrator.session().await.id;

        orchestrator.reset().await;

        let session = orchestrator.session().await;
        assert_eq!(session.status, SessionStatus::Idle);
        assert!(session.messages.is_empty());
        assert!(session.department.is_none());
        assert_ne!(session.id, previous_id);
    }

    #[tokio::test]
    async fn reply_landing_after_reset_is_discarded() {
        let tmp = TempDir::new().unwrap();
        let (orchestrator, _, _) =
            build(&tmp, "resposta atrasada", Duration::from_millis(100)).await;
        orchestrator.select_department(Department::General).await;
        let orchestrator = Arc::new(orchestrator);

        let sender = Arc::clone(&orchestrator);
        let inflight = tokio::spawn(async move {
            sender.send_user_message("pergunta lenta").await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        orchestrator.reset().await;
        inflight.await.unwrap();

        let session = orchestrator.session().await;
        assert!(session.messages.is_empty(), "stale reply must be dropped");
        assert!(!orchestrator.is_typing());
    }

    #[tokio::test]
    async fn stale_reply_never_lands_in_a_fresh_session() {
        // The reset can win the session lock at any point around the
        // reply, including between the in-flight check and the append.
        // Wherever it lands, a wiped session must never show a bot
        // answer without the question that produced it.
        for pause in [0u64, 1, 3, 5, 10] {
            let tmp = TempDir::new().unwrap();
            let (orchestrator, _, _) =
                build(&tmp, "resposta tardia", Duration::from_millis(5)).await;
            orchestrator.select_department(Department::General).await;
            let orchestrator = Arc::new(orchestrator);

            let sender = Arc::clone(&orchestrator);
            let inflight = tokio::spawn(async move {
                sender.send_user_message("pergunta").await;
            });
            tokio::time::sleep(Duration::from_millis(pause)).await;
            orchestrator.reset().await;
            inflight.await.unwrap();

            let session = orchestrator.session().await;
            let has_reply = session
                .messages
                .iter()
                .any(|m| m.role == Role::Bot && m.text == "resposta tardia");
            let has_question = session.messages.iter().any(|m| m.role == Role::User);
            assert!(
                !has_reply || has_question,
                "stale reply landed in a wiped session (pause {pause}ms)"
            );
            assert!(!orchestrator.is_typing());
        }
    }

    #[tokio::test]
    async fn stale_escalation_never_lands_in_a_fresh_session() {
        for pause in [0u64, 1, 3] {
            let tmp = TempDir::new().unwrap();
            let support: Arc<dyn SupportStore> =
                Arc::new(FileSupportStore::new(tmp.path().to_path_buf()).await.unwrap());
            support
                .upsert_attendants(vec![flama_knowledge::AttendantConfig {
                    department: Department::Financial,
                    name: "Carla".into(),
                    phone: "(11) 98765-4321".into(),
                }])
                .await
                .unwrap();
            let orchestrator = Arc::new(
                Orchestrator::load(
                    Arc::new(MemoryStore::default()),
                    support,
                    Arc::new(ScriptedResponder {
                        reply: BotReply {
                            text: "n/a".into(),
                            actions: vec![],
                        },
                        delay: Duration::ZERO,
                    }),
                    Arc::new(RecordingOpener::default()),
                    OrchestratorConfig {
                        transfer_delay: Duration::from_millis(5),
                        handoff_delay: Duration::from_millis(5),
                        history_window: 6,
                    },
                )
                .await,
            );
            orchestrator.select_department(Department::Financial).await;

            let sender = Arc::clone(&orchestrator);
            let inflight = tokio::spawn(async move {
                sender.send_user_message("quero falar com atendente").await;
            });
            tokio::time::sleep(Duration::from_millis(pause)).await;
            orchestrator.reset().await;
            inflight.await.unwrap();

            let session = orchestrator.session().await;
            let has_announcement = session.messages.iter().any(|m| m.role == Role::System);
            let has_question = session.messages.iter().any(|m| m.role == Role::User);
            assert!(
                !has_announcement || has_question,
                "stale escalation landed in a wiped session (pause {pause}ms)"
            );
            if session.messages.is_empty() {
                assert_eq!(session.status, SessionStatus::Idle);
                assert!(!session.human_support);
            }
            assert!(!orchestrator.is_typing());
        }
    }

    #[tokio::test]
    async fn history_maps_every_non_bot_role_to_user() {
        struct SpeakerRecorder {
            seen: Mutex<Option<Vec<(Speaker, String)>>>,
        }

        #[async_trait]
        impl ResponseService for SpeakerRecorder {
            async fn respond(
                &self,
                _user_message: &str,
                history: &[HistoryTurn],
                _department: Department,
            ) -> BotReply {
                let turns = history.iter().map(|t| (t.speaker, t.text.clone())).collect();
                *self.seen.lock() = Some(turns);
                BotReply {
                    text: "ok".into(),
                    actions: vec![],
                }
            }
        }

        let tmp = TempDir::new().unwrap();
        let support: Arc<dyn SupportStore> =
            Arc::new(FileSupportStore::new(tmp.path().to_path_buf()).await.unwrap());
        let responder = Arc::new(SpeakerRecorder {
            seen: Mutex::new(None),
        });
        let orchestrator = Orchestrator::load(
            Arc::new(MemoryStore::default()),
            support,
            Arc::clone(&responder) as Arc<dyn ResponseService>,
            Arc::new(RecordingOpener::default()),
            zero_delays(),
        )
        .await;
        orchestrator.select_department(Department::General).await;
        orchestrator
            .append_voice_turn(Role::Human, "Já estou verificando seu caso.")
            .await;

        orchestrator.send_user_message("obrigado").await;

        let history = responder.seen.lock().clone().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].0, Speaker::Model);
        assert_eq!(
            history[1],
            (Speaker::User, "Já estou verificando seu caso.".to_string())
        );
    }

    #[tokio::test]
    async fn concurrent_send_is_dropped_while_typing() {
        let tmp = TempDir::new().unwrap();
        let (orchestrator, _, _) = build(&tmp, "única resposta", Duration::from_millis(80)).await;
        orchestrator.select_department(Department::General).await;
        let orchestrator = Arc::new(orchestrator);

        let first = {
            let o = Arc::clone(&orchestrator);
            tokio::spawn(async move { o.send_user_message("primeira").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        orchestrator.send_user_message("segunda").await;
        first.await.unwrap();

        let session = orchestrator.session().await;
        let bot_count = session
            .messages
            .iter()
            .filter(|m| m.role == Role::Bot && m.text == "única resposta")
            .count();
        assert_eq!(bot_count, 1);
    }

    #[tokio::test]
    async fn voice_turns_carry_voice_metadata() {
        let tmp = TempDir::new().unwrap();
        let (orchestrator, _, _) = build(&tmp, "ok", Duration::ZERO).await;
        orchestrator.select_department(Department::General).await;

        orchestrator.append_voice_turn(Role::User, "pergunta falada").await;
        orchestrator.append_voice_turn(Role::Bot, "resposta falada").await;

        let session = orchestrator.session().await;
        assert!(session.messages[1].is_voice());
        assert!(session.messages[2].is_voice());
        assert_eq!(session.messages[1].role, Role::User);
    }

    #[tokio::test]
    async fn save_failures_do_not_break_the_conversation() {
        let tmp = TempDir::new().unwrap();
        let support: Arc<dyn SupportStore> =
            Arc::new(FileSupportStore::new(tmp.path().to_path_buf()).await.unwrap());
        let orchestrator = Orchestrator::load(
            Arc::new(MemoryStore {
                session: Mutex::new(None),
                fail_saves: true,
            }),
            support,
            Arc::new(ScriptedResponder {
                reply: BotReply {
                    text: "continua funcionando".into(),
                    actions: vec![],
                },
                delay: Duration::ZERO,
            }),
            Arc::new(RecordingOpener::default()),
            zero_delays(),
        )
        .await;

        orchestrator.select_department(Department::General).await;
        orchestrator.send_user_message("oi").await;

        let session = orchestrator.session().await;
        assert_eq!(session.messages.len(), 3);
        assert_eq!(session.messages[2].text, "continua funcionando");
    }

    #[tokio::test]
    async fn blank_messages_are_ignored() {
        let tmp = TempDir::new().unwrap();
        let (orchestrator, _, _) = build(&tmp, "ok", Duration::ZERO).await;
        orchestrator.select_department(Department::General).await;

        orchestrator.send_user_message("   ").await;

        assert_eq!(orchestrator.session().await.messages.len(), 1);
    }
}
