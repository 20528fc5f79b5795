//! Durable storage for the single persisted reading session.

use crate::error::Result;
use crate::resume::PersistedSession;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const LOG_TARGET: &str = "lectern::store";

/// One fixed slot holding the latest [`PersistedSession`].
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Read the stored session.
    ///
    /// Missing or unreadable content is `None`, never an error.
    async fn load(&self) -> Option<PersistedSession>;

    /// Overwrite the stored session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be serialized or written.
    async fn save(&self, session: &PersistedSession) -> Result<()>;

    /// Remove the stored session.
    ///
    /// # Errors
    ///
    /// Returns an error if existing content cannot be removed.
    async fn clear(&self) -> Result<()>;
}

/// [`SessionStore`] writing pretty JSON to a single file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `~/.config/lectern/session.json`
    #[must_use]
    pub fn default_location() -> Self {
        Self::new(crate::paths::session_path())
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SessionStore for JsonFileStore {
    async fn load(&self) -> Option<PersistedSession> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(target: LOG_TARGET, "No stored session at {:?}", self.path);
                return None;
            }
            Err(e) => {
                warn!(target: LOG_TARGET, "Failed to read session file: {}", e);
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(session) => {
                info!(target: LOG_TARGET, "Loaded session from {:?}", self.path);
                Some(session)
            }
            Err(e) => {
                warn!(target: LOG_TARGET, "Failed to parse session file: {}", e);
                None
            }
        }
    }

    async fn save(&self, session: &PersistedSession) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(session)?;
        tokio::fs::write(&self.path, content).await?;
        debug!(
            target: LOG_TARGET,
            "Saved session at chapter {:?} word {}",
            session.selected_chapter_idx,
            session.current_word_idx
        );
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                info!(target: LOG_TARGET, "Cleared stored session");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Write every published session snapshot to `store`, latest value wins.
///
/// Snapshots arriving faster than they can be written are coalesced. On
/// cancellation any snapshot not yet written is flushed before the task ends.
pub fn spawn_persister(
    store: Arc<dyn SessionStore>,
    mut updates: watch::Receiver<Option<PersistedSession>>,
    cancel_token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = cancel_token.cancelled() => {
                    if updates.has_changed().unwrap_or(false) {
                        let latest = updates.borrow_and_update().clone();
                        write(store.as_ref(), latest).await;
                    }
                    debug!(target: LOG_TARGET, "Session persister shutting down");
                    break;
                }
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let latest = updates.borrow_and_update().clone();
                    write(store.as_ref(), latest).await;
                }
            }
        }
    })
}

async fn write(store: &dyn SessionStore, session: Option<PersistedSession>) {
    let Some(session) = session else {
        return;
    };
    if let Err(e) = store.save(&session.stamped(chrono::Utc::now())).await {
        warn!(target: LOG_TARGET, "Failed to persist session: {}", e);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// In-memory store recording every save.
    #[derive(Debug, Default)]
    pub(crate) struct MemoryStore {
        pub saved: Mutex<Vec<PersistedSession>>,
        pub initial: Option<PersistedSession>,
    }

    impl MemoryStore {
        pub fn last(&self) -> Option<PersistedSession> {
            self.saved.lock().unwrap().last().cloned()
        }
    }

    #[async_trait]
    impl SessionStore for MemoryStore {
        async fn load(&self) -> Option<PersistedSession> {
            self.last().or_else(|| self.initial.clone())
        }

        async fn save(&self, session: &PersistedSession) -> Result<()> {
            self.saved.lock().unwrap().push(session.clone());
            Ok(())
        }

        async fn clear(&self) -> Result<()> {
            self.saved.lock().unwrap().clear();
            Ok(())
        }
    }

    fn session(word: usize) -> PersistedSession {
        PersistedSession {
            file_name: "book.epub".into(),
            selected_chapter_idx: Some(1),
            current_word_idx: word,
            show_chapters: true,
            saved_at: None,
        }
    }

    #[tokio::test]
    async fn test_json_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested").join("session.json"));

        assert!(store.load().await.is_none());

        store.save(&session(12)).await.unwrap();
        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, session(12));

        store.clear().await.unwrap();
        assert!(store.load().await.is_none());
        // Clearing twice is fine
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(JsonFileStore::new(&path).load().await.is_none());

        std::fs::write(&path, r#"{"file_name": 3}"#).unwrap();
        assert!(JsonFileStore::new(&path).load().await.is_none());
    }

    #[tokio::test]
    async fn test_persister_writes_latest_with_timestamp() {
        let store = Arc::new(MemoryStore::default());
        let (tx, rx) = watch::channel(None);
        let cancel = CancellationToken::new();
        let handle = spawn_persister(store.clone(), rx, cancel.clone());

        tx.send_replace(Some(session(1)));
        tx.send_replace(Some(session(2)));
        tx.send_replace(Some(session(3)));

        cancel.cancel();
        handle.await.unwrap();

        let last = store.last().unwrap();
        assert_eq!(last.current_word_idx, 3);
        assert!(last.saved_at.is_some());
    }

    #[tokio::test]
    async fn test_persister_skips_empty_snapshots() {
        let store = Arc::new(MemoryStore::default());
        let (tx, rx) = watch::channel(None);
        let cancel = CancellationToken::new();
        let handle = spawn_persister(store.clone(), rx, cancel.clone());

        tx.send_replace(None);
        tokio::task::yield_now().await;
        cancel.cancel();
        handle.await.unwrap();

        assert!(store.last().is_none());
    }

    #[tokio::test]
    async fn test_persister_stops_when_sender_dropped() {
        let store = Arc::new(MemoryStore::default());
        let (tx, rx) = watch::channel(None);
        let handle = spawn_persister(store.clone(), rx, CancellationToken::new());

        tx.send_replace(Some(session(7)));
        drop(tx);
        handle.await.unwrap();

        assert_eq!(store.last().unwrap().current_word_idx, 7);
    }
}
