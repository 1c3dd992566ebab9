use crate::entry::ChatLogEntry;
use crate::store::SupportStore;
use flama_core::{Department, Role};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Fire-and-forget mirror of every chat message into the support store.
///
/// Writes happen on a background task; failures are logged and dropped so
/// the conversation never blocks on the audit trail.
#[derive(Clone)]
pub struct ChatLogger {
    tx: mpsc::UnboundedSender<ChatLogEntry>,
}

impl ChatLogger {
    pub fn new(store: Arc<dyn SupportStore>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<ChatLogEntry>();

        tokio::spawn(async move {
            while let Some(entry) = rx.recv().await {
                if let Err(e) = store.append_log(entry).await {
                    warn!(error = %e, "Chat log write failed, entry dropped");
                }
            }
        });

        Self { tx }
    }

    pub fn log(
        &self,
        session_id: Uuid,
        role: Role,
        text: impl Into<String>,
        department: Option<Department>,
    ) {
        let entry = ChatLogEntry::new(session_id, role, text, department);
        info!(
            session_id = %entry.session_id,
            role = entry.role.as_str(),
            department = %entry.department,
            "chat log"
        );
        let _ = self.tx.send(entry);
    }
}
