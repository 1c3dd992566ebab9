use crate::entry::{AttendantConfig, ChatLogEntry, KnowledgeEntry};
use async_trait::async_trait;
use flama_core::{Department, FlamaResult};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

/// Newest-first page size used by the admin log viewer and the export.
pub const DEFAULT_LOG_LIMIT: usize = 500;

/// The admin-surface storage contract: knowledge entries, attendant
/// configs, and the mirrored chat log.
#[async_trait]
pub trait SupportStore: Send + Sync {
    async fn list_knowledge(&self, department: Department) -> FlamaResult<Vec<KnowledgeEntry>>;
    async fn add_knowledge(&self, entry: KnowledgeEntry) -> FlamaResult<()>;
    async fn delete_knowledge(&self, id: Uuid) -> FlamaResult<bool>;

    async fn list_attendants(&self) -> FlamaResult<Vec<AttendantConfig>>;
    /// Insert-or-update with `department` as the conflict key.
    async fn upsert_attendants(&self, configs: Vec<AttendantConfig>) -> FlamaResult<()>;

    async fn append_log(&self, entry: ChatLogEntry) -> FlamaResult<()>;
    /// Newest first, truncated to `limit`.
    async fn list_logs(&self, limit: usize) -> FlamaResult<Vec<ChatLogEntry>>;
    async fn clear_logs(&self) -> FlamaResult<()>;
}

/// File-backed store: `knowledge.jsonl` and `chat_logs.jsonl` (append-only,
/// rewritten on delete), `attendants.json` (whole list).
pub struct FileSupportStore {
    dir: PathBuf,
    knowledge: RwLock<Vec<KnowledgeEntry>>,
    attendants: RwLock<Vec<AttendantConfig>>,
}

impl FileSupportStore {
    pub async fn new(dir: PathBuf) -> FlamaResult<Self> {
        tokio::fs::create_dir_all(&dir).await?;

        let knowledge = read_jsonl(&dir.join("knowledge.jsonl")).await?;
        // A malformed attendants file must not block startup; the admin
        // side re-creates it on the next upsert.
        let attendants = match tokio::fs::read_to_string(dir.join("attendants.json")).await {
            Ok(data) => match serde_json::from_str(&data) {
                Ok(list) => list,
                Err(e) => {
                    warn!(error = %e, "Discarding malformed attendants file");
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };

        Ok(Self {
            dir,
            knowledge: RwLock::new(knowledge),
            attendants: RwLock::new(attendants),
        })
    }

    fn knowledge_path(&self) -> PathBuf {
        self.dir.join("knowledge.jsonl")
    }

    fn attendants_path(&self) -> PathBuf {
        self.dir.join("attendants.json")
    }

    fn logs_path(&self) -> PathBuf {
        self.dir.join("chat_logs.jsonl")
    }

    async fn rewrite_knowledge(&self) -> FlamaResult<()> {
        let entries = self.knowledge.read().await;
        write_jsonl(&self.knowledge_path(), entries.iter()).await
    }
}

/// Reads every parseable line; corrupt lines are logged and skipped so a
/// single bad record cannot take the whole store down.
async fn read_jsonl<T: serde::de::DeserializeOwned>(path: &PathBuf) -> FlamaResult<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let data = tokio::fs::read_to_string(path).await?;
    let mut entries = Vec::new();
    for line in data.lines().filter(|l| !l.trim().is_empty()) {
        match serde_json::from_str(line) {
            Ok(entry) => entries.push(entry),
            Err(e) => warn!(error = %e, path = %path.display(), "Skipping malformed record"),
        }
    }
    Ok(entries)
}

async fn write_jsonl<'a, T: serde::Serialize + 'a>(
    path: &PathBuf,
    entries: impl Iterator<Item = &'a T>,
) -> FlamaResult<()> {
    let mut data = String::new();
    for entry in entries {
        data.push_str(&serde_json::to_string(entry)?);
        data.push('\n');
    }
    tokio::fs::write(path, data.as_bytes()).await?;
    Ok(())
}

async fn append_jsonl<T: serde::Serialize>(path: &PathBuf, entry: &T) -> FlamaResult<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    let mut line = serde_json::to_string(entry)?;
    line.push('\n');
    file.write_all(line.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}

#[async_trait]
impl SupportStore for FileSupportStore {
    async fn list_knowledge(&self, department: Department) -> FlamaResult<Vec<KnowledgeEntry>> {
        let entries = self.knowledge.read().await;
        Ok(entries
            .iter()
            .filter(|e| e.department == department)
            .cloned()
            .collect())
    }

    async fn add_knowledge(&self, entry: KnowledgeEntry) -> FlamaResult<()> {
        append_jsonl(&self.knowledge_path(), &entry).await?;
        self.knowledge.write().await.push(entry);
        Ok(())
    }

    async fn delete_knowledge(&self, id: Uuid) -> FlamaResult<bool> {
        let deleted = {
            let mut entries = self.knowledge.write().await;
            let before = entries.len();
            entries.retain(|e| e.id != id);
            entries.len() < before
        };
        if deleted {
            self.rewrite_knowledge().await?;
        }
        Ok(deleted)
    }

    async fn list_attendants(&self) -> FlamaResult<Vec<AttendantConfig>> {
        Ok(self.attendants.read().await.clone())
    }

    async fn upsert_attendants(&self, configs: Vec<AttendantConfig>) -> FlamaResult<()> {
        {
            let mut current = self.attendants.write().await;
            for config in configs {
                match current.iter_mut().find(|a| a.department == config.department) {
                    Some(existing) => *existing = config,
                    None => current.push(config),
                }
            }
            let json = serde_json::to_string_pretty(&*current)?;
            tokio::fs::write(self.attendants_path(), json).await?;
        }
        Ok(())
    }

    async fn append_log(&self, entry: ChatLogEntry) -> FlamaResult<()> {
        append_jsonl(&self.logs_path(), &entry).await
    }

    async fn list_logs(&self, limit: usize) -> FlamaResult<Vec<ChatLogEntry>> {
        let mut entries: Vec<ChatLogEntry> = read_jsonl(&self.logs_path()).await?;
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries.truncate(limit);
        Ok(entries)
    }

    async fn clear_logs(&self) -> FlamaResult<()> {
        let path = self.logs_path();
        if path.exists() {
            tokio::fs::remove_file(path).await?;
        }
        Ok(())
    }
}
