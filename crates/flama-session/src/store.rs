use crate::session::{Session, ThemeConfig};
use async_trait::async_trait;
use flama_core::FlamaResult;
use std::path::PathBuf;
use tracing::warn;

/// Durable storage for the latest session and the UI theme.
///
/// Loads fail closed: a missing or malformed record yields the default
/// value and the corrupt payload is discarded, never an error.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load_session(&self) -> Session;
    async fn save_session(&self, session: &Session) -> FlamaResult<()>;
    async fn clear_session(&self) -> FlamaResult<()>;

    async fn load_theme(&self) -> ThemeConfig;
    async fn save_theme(&self, theme: &ThemeConfig) -> FlamaResult<()>;
}

/// File-based store: `session.json` and `theme.json` under a data dir.
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub async fn new(dir: PathBuf) -> FlamaResult<Self> {
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn session_path(&self) -> PathBuf {
        self.dir.join("session.json")
    }

    fn theme_path(&self) -> PathBuf {
        self.dir.join("theme.json")
    }

    /// Read and deserialize a record, removing the file when it cannot
    /// be parsed so the next load starts clean.
    async fn load_or_discard<T: serde::de::DeserializeOwned>(&self, path: PathBuf) -> Option<T> {
        let data = tokio::fs::read_to_string(&path).await.ok()?;
        match serde_json::from_str(&data) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Discarding corrupt record");
                let _ = tokio::fs::remove_file(&path).await;
                None
            }
        }
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load_session(&self) -> Session {
        self.load_or_discard(self.session_path())
            .await
            .unwrap_or_default()
    }

    async fn save_session(&self, session: &Session) -> FlamaResult<()> {
        let json = serde_json::to_string_pretty(session)?;
        tokio::fs::write(self.session_path(), json).await?;
        Ok(())
    }

    async fn clear_session(&self) -> FlamaResult<()> {
        let path = self.session_path();
        if path.exists() {
            tokio::fs::remove_file(path).await?;
        }
        Ok(())
    }

    async fn load_theme(&self) -> ThemeConfig {
        self.load_or_discard(self.theme_path())
            .await
            .unwrap_or_default()
    }

    async fn save_theme(&self, theme: &ThemeConfig) -> FlamaResult<()> {
        let json = serde_json::to_string_pretty(theme)?;
        tokio::fs::write(self.theme_path(), json).await?;
        Ok(())
    }
}
