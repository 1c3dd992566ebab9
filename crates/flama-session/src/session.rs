use flama_core::{Department, Message};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a conversation. Escalation moves monotonically
/// Bot → WaitingHuman → Human; only an explicit reset or department
/// re-selection goes back to Idle/Bot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Bot,
    WaitingHuman,
    Human,
}

/// One conversation with its append-only message log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub department: Option<Department>,
    pub messages: Vec<Message>,
    pub human_support: bool,
    pub status: SessionStatus,
}

impl Session {
    /// Fresh session: status Bot when a department is already selected,
    /// Idle otherwise.
    pub fn new(department: Option<Department>) -> Self {
        Self {
            id: Uuid::new_v4(),
            department,
            messages: Vec::new(),
            human_support: false,
            status: if department.is_some() {
                SessionStatus::Bot
            } else {
                SessionStatus::Idle
            },
        }
    }

    /// Pure append. Messages are never reordered or mutated afterwards.
    pub fn append_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(None)
    }
}

/// The widget color pair, persisted alongside the session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ThemeConfig {
    pub primary: String,
    pub secondary: String,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            primary: "#075e54".to_string(),
            secondary: "#e21a2c".to_string(),
        }
    }
}
