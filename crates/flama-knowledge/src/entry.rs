use chrono::{DateTime, Utc};
use flama_core::{Department, Role};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One knowledge base record. Read-heavy; written only through the admin
/// surface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KnowledgeEntry {
    pub id: Uuid,
    pub department: Department,
    pub topic: String,
    pub content: String,
    pub keywords: String,
}

impl KnowledgeEntry {
    pub fn new(
        department: Department,
        topic: impl Into<String>,
        content: impl Into<String>,
        keywords: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            department,
            topic: topic.into(),
            content: content.into(),
            keywords: keywords.into(),
        }
    }
}

/// Human contact for one department. At most one active config per
/// department is consulted at escalation time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttendantConfig {
    pub department: Department,
    pub name: String,
    pub phone: String,
}

/// One mirrored chat message in the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatLogEntry {
    pub id: Uuid,
    pub session_id: Uuid,
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// Department label, "Informações Gerais" when none was selected.
    pub department: String,
}

impl ChatLogEntry {
    pub fn new(
        session_id: Uuid,
        role: Role,
        text: impl Into<String>,
        department: Option<Department>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            role,
            text: text.into(),
            timestamp: Utc::now(),
            department: department.unwrap_or(Department::General).label().to_string(),
        }
    }
}
