use crate::store::{SupportStore, DEFAULT_LOG_LIMIT};
use flama_core::{Department, FlamaResult};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct Backup {
    knowledge: Vec<crate::entry::KnowledgeEntry>,
    attendants: Vec<crate::entry::AttendantConfig>,
    logs: Vec<crate::entry::ChatLogEntry>,
}

/// Serialize the current knowledge base, attendants, and the newest 500
/// log entries into a timestamped backup document. Returns the written
/// path.
pub async fn export_backup(store: &dyn SupportStore, dir: &Path) -> FlamaResult<PathBuf> {
    let mut knowledge = Vec::new();
    for dept in Department::ALL {
        knowledge.extend(store.list_knowledge(dept).await?);
    }

    let backup = Backup {
        knowledge,
        attendants: store.list_attendants().await?,
        logs: store.list_logs(DEFAULT_LOG_LIMIT).await?,
    };

    let date = chrono::Utc::now().format("%Y-%m-%d");
    let path = dir.join(format!("backup_flama_{date}.json"));
    let json = serde_json::to_string_pretty(&backup)?;
    tokio::fs::write(&path, json).await?;
    Ok(path)
}
