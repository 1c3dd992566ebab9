use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::department::Department;

/// The role of the participant that authored a [`Message`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A human end-user of the widget.
    User,
    /// The AI assistant.
    Bot,
    /// A human attendant (post-escalation).
    Human,
    /// A system notice, e.g. the handoff announcement.
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Bot => "bot",
            Role::Human => "human",
            Role::System => "system",
        }
    }
}

/// Extra data carried by voice-turn messages.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageMetadata {
    #[serde(default)]
    pub is_voice: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_transcription: Option<String>,
}

/// A single message within a conversation session.
///
/// Messages are immutable once appended: the orchestrator only ever pushes
/// new ones onto the session log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<Department>,
    /// Short labels surfaced as tappable quick-reply buttons for the
    /// next turn. Only bot messages carry these.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_actions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
}

impl Message {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            text: text.into(),
            timestamp: Utc::now(),
            department: None,
            suggested_actions: None,
            metadata: None,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self::new(Role::Bot, text)
    }

    pub fn human(text: impl Into<String>) -> Self {
        Self::new(Role::Human, text)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text)
    }

    pub fn with_department(mut self, department: Department) -> Self {
        self.department = Some(department);
        self
    }

    pub fn with_actions(mut self, actions: Vec<String>) -> Self {
        if !actions.is_empty() {
            self.suggested_actions = Some(actions);
        }
        self
    }

    /// Tag this message as a flushed voice turn, keeping the raw
    /// transcription alongside the displayed text.
    pub fn as_voice(mut self, transcription: impl Into<String>) -> Self {
        self.metadata = Some(MessageMetadata {
            is_voice: true,
            audio_transcription: Some(transcription.into()),
        });
        self
    }

    pub fn is_voice(&self) -> bool {
        self.metadata.as_ref().is_some_and(|m| m.is_voice)
    }
}
