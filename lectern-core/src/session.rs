//! The reading session: one imported document, its playback and its resume state.

use crate::document::Document;
use crate::error::LoadError;
use crate::loader::DocumentLoader;
use crate::playback::{
    Playback, PlaybackState, ReadingCursor, SelectionHighlight, TICK_INTERVAL, TickOutcome,
};
use crate::resume::{PendingResume, PersistedSession, ResumeOffer, ResumePlan, reconcile};
use crate::ticker::TickSource;
use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Weak};
use tokio::sync::{RwLock, broadcast, mpsc, watch};
use tracing::{debug, info, warn};

const LOG_TARGET: &str = "lectern::session";

/// Events emitted by the reading session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// An import began
    ImportStarted { file_name: String },
    /// An import succeeded and its first (or resumed) chapter is active
    DocumentLoaded {
        file_name: String,
        chapter_count: usize,
        resumed: bool,
    },
    /// An import failed; `message` is meant for the reader
    ImportFailed { message: String },
    /// A chapter became active
    ChapterSelected {
        chapter: usize,
        title: String,
        word_count: usize,
    },
    /// Playback state changed
    StateChanged { state: PlaybackState },
    /// The cursor moved
    WordChanged { word_index: usize, word: String },
    /// The last word of the chapter was reached
    Finished,
    /// The reader picked a word
    Highlighted { highlight: SelectionHighlight },
    /// Chapter list visibility changed
    ChaptersToggled { visible: bool },
}

/// Listing entry for one chapter of the active document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterSummary {
    /// Position in the chapter list, as used by [`ReadingSession::select_chapter`]
    pub position: usize,
    /// Spine index in the source document
    pub index: usize,
    pub title: String,
    pub word_count: usize,
}

/// Point-in-time view of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub file_name: Option<String>,
    pub chapter_count: usize,
    pub cursor: ReadingCursor,
    pub state: PlaybackState,
    pub current_word: Option<String>,
    pub word_count: usize,
    pub highlight: Option<SelectionHighlight>,
    pub show_chapters: bool,
    pub loading: bool,
    pub last_error: Option<String>,
    pub pending_resume: bool,
}

struct SessionInner {
    document: Option<Document>,
    playback: Playback,
    highlight: Option<SelectionHighlight>,
    show_chapters: bool,
    loading: bool,
    last_error: Option<String>,
    pending_resume: Option<PendingResume>,
    /// Bumped on every start and stop of the tick source; ticks carry the value
    /// they were scheduled under
    tick_generation: u64,
    /// Bumped when an import starts; only the newest import may install its result
    import_generation: u64,
}

/// Controller owning the active document and everything the reader does with it.
pub struct ReadingSession {
    inner: RwLock<SessionInner>,
    loader: DocumentLoader,
    ticker: Arc<dyn TickSource>,
    tick_tx: mpsc::UnboundedSender<u64>,
    event_tx: broadcast::Sender<SessionEvent>,
    persisted_tx: watch::Sender<Option<PersistedSession>>,
}

impl ReadingSession {
    /// Create an empty session.
    ///
    /// Must be called from within a tokio runtime; a task applying ticks is
    /// spawned alongside the session and ends when the session is dropped.
    #[must_use]
    pub fn new(loader: DocumentLoader, ticker: Arc<dyn TickSource>, show_chapters: bool) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(64);
        let (persisted_tx, _) = watch::channel(None);
        let (tick_tx, tick_rx) = mpsc::unbounded_channel();

        let session = Arc::new(Self {
            inner: RwLock::new(SessionInner {
                document: None,
                playback: Playback::new(),
                highlight: None,
                show_chapters,
                loading: false,
                last_error: None,
                pending_resume: None,
                tick_generation: 0,
                import_generation: 0,
            }),
            loader,
            ticker,
            tick_tx,
            event_tx,
            persisted_tx,
        });

        spawn_tick_driver(Arc::downgrade(&session), tick_rx);
        session
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// Subscribe to the persisted tuple, republished whenever any of its fields change
    pub fn persisted_updates(&self) -> watch::Receiver<Option<PersistedSession>> {
        self.persisted_tx.subscribe()
    }

    /// Import a file from disk, replacing the current document on success.
    ///
    /// # Errors
    ///
    /// Returns the [`LoadError`] of a failed import; the session keeps its
    /// previous document and records the failure's reader-facing message.
    pub async fn import_path(&self, path: &Path) -> Result<ResumePlan, LoadError> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.import_with(&file_name, self.loader.load_path(path)).await
    }

    /// Import an in-memory file.
    ///
    /// # Errors
    ///
    /// See [`Self::import_path`].
    pub async fn import_bytes(&self, file_name: &str, bytes: Vec<u8>) -> Result<ResumePlan, LoadError> {
        self.import_with(file_name, self.loader.load_bytes(file_name, bytes))
            .await
    }

    async fn import_with(
        &self,
        file_name: &str,
        load: impl Future<Output = Result<Document, LoadError>>,
    ) -> Result<ResumePlan, LoadError> {
        let generation = {
            let mut inner = self.inner.write().await;
            self.stop_ticking(&mut inner);
            self.pause_locked(&mut inner);
            inner.import_generation += 1;
            inner.loading = true;
            inner.last_error = None;
            inner.import_generation
        };
        self.emit(SessionEvent::ImportStarted {
            file_name: file_name.to_owned(),
        });

        let result = load.await;

        let mut inner = self.inner.write().await;
        if inner.import_generation != generation {
            debug!(
                target: LOG_TARGET,
                "Dropping result of {}, a newer import was started", file_name
            );
            return Err(LoadError::Superseded);
        }
        inner.loading = false;

        let document = match result {
            Ok(document) => document,
            Err(e) => {
                warn!(target: LOG_TARGET, "Import of {} failed: {}", file_name, e);
                if inner.pending_resume.take().is_some() {
                    info!(target: LOG_TARGET, "Discarding pending resume after failed import");
                }
                let message = e.user_message().to_owned();
                inner.last_error = Some(message.clone());
                self.emit(SessionEvent::ImportFailed { message });
                return Err(e);
            }
        };

        let pending = inner.pending_resume.take();
        if let Some(pending) = &pending
            && pending.file_name != document.file_name
        {
            warn!(
                target: LOG_TARGET,
                "Resuming {} with position saved for {}",
                document.file_name,
                pending.file_name
            );
        }

        let plan = reconcile(pending.as_ref(), document.len());
        if pending.is_some() && plan == ResumePlan::Fresh {
            info!(
                target: LOG_TARGET,
                "Saved chapter does not exist in {}, starting from the beginning",
                document.file_name
            );
        }

        let loaded_name = document.file_name.clone();
        let chapter_count = document.len();
        inner.document = Some(document);
        inner.highlight = None;

        match plan {
            ResumePlan::Fresh => {
                self.activate_chapter(&mut inner, 0);
            }
            ResumePlan::Restore {
                chapter,
                word_index,
                show_chapters,
            } => {
                self.activate_chapter(&mut inner, chapter);
                inner.playback.set_word_index(word_index);
                inner.show_chapters = show_chapters;
                info!(
                    target: LOG_TARGET,
                    "Resumed at chapter {} word {}",
                    chapter,
                    inner.playback.cursor().word_index
                );
            }
        }

        self.emit(SessionEvent::DocumentLoaded {
            file_name: loaded_name,
            chapter_count,
            resumed: matches!(plan, ResumePlan::Restore { .. }),
        });
        self.emit_word(&inner);
        self.publish_persisted(&inner);

        Ok(plan)
    }

    /// Remember an accepted resume offer until the next successful import.
    pub async fn accept_resume(&self, offer: &ResumeOffer) {
        info!(
            target: LOG_TARGET,
            "Resume accepted, waiting for {}",
            offer.file_name()
        );
        self.inner.write().await.pending_resume = Some(offer.accept());
    }

    /// Drop any outstanding resume intent.
    pub async fn cancel_resume(&self) {
        self.inner.write().await.pending_resume = None;
    }

    /// Make a chapter active, starting from its first word.
    ///
    /// Returns `false` when no chapter exists at `position`.
    pub async fn select_chapter(&self, position: usize) -> bool {
        let mut inner = self.inner.write().await;
        if !self.activate_chapter(&mut inner, position) {
            return false;
        }
        inner.highlight = None;
        self.emit_word(&inner);
        self.publish_persisted(&inner);
        true
    }

    /// Start playing; returns whether playback actually started.
    pub async fn play(&self) -> bool {
        let mut inner = self.inner.write().await;
        if !inner.playback.play() {
            debug!(target: LOG_TARGET, "Play ignored in {:?}", inner.playback.state());
            return false;
        }
        self.start_ticking(&mut inner);
        self.emit_state(&inner);
        true
    }

    pub async fn pause(&self) {
        let mut inner = self.inner.write().await;
        self.stop_ticking(&mut inner);
        self.pause_locked(&mut inner);
    }

    /// Back to the first word of the chapter.
    pub async fn reset(&self) {
        let mut inner = self.inner.write().await;
        self.stop_ticking(&mut inner);
        inner.playback.reset();
        self.emit_state(&inner);
        self.emit_word(&inner);
        self.publish_persisted(&inner);
    }

    /// Jump to a word the reader picked and highlight it.
    pub async fn seek(&self, word_index: usize) -> Option<SelectionHighlight> {
        let mut inner = self.inner.write().await;
        self.stop_ticking(&mut inner);
        let highlight = inner.playback.seek(word_index);
        inner.highlight.clone_from(&highlight);

        if let Some(highlight) = &highlight {
            self.emit(SessionEvent::Highlighted {
                highlight: highlight.clone(),
            });
        }
        self.emit_state(&inner);
        self.emit_word(&inner);
        self.publish_persisted(&inner);
        highlight
    }

    /// Highlight the word under the cursor, typically before looking it up.
    ///
    /// Playback is left untouched.
    pub async fn highlight_current(&self) -> Option<SelectionHighlight> {
        let mut inner = self.inner.write().await;
        let highlight = inner.playback.current_word().map(|word| SelectionHighlight {
            word: word.to_owned(),
            word_index: inner.playback.cursor().word_index,
        })?;

        inner.highlight = Some(highlight.clone());
        self.emit(SessionEvent::Highlighted {
            highlight: highlight.clone(),
        });
        Some(highlight)
    }

    /// Move the cursor by `delta` words.
    pub async fn step(&self, delta: isize) {
        let mut inner = self.inner.write().await;
        self.stop_ticking(&mut inner);
        inner.playback.step(delta);
        self.emit_state(&inner);
        self.emit_word(&inner);
        self.publish_persisted(&inner);
    }

    pub async fn set_show_chapters(&self, visible: bool) {
        let mut inner = self.inner.write().await;
        if inner.show_chapters == visible {
            return;
        }
        inner.show_chapters = visible;
        self.emit(SessionEvent::ChaptersToggled { visible });
        self.publish_persisted(&inner);
    }

    /// Flip chapter list visibility, returning the new value.
    pub async fn toggle_chapters(&self) -> bool {
        let visible = !self.inner.read().await.show_chapters;
        self.set_show_chapters(visible).await;
        visible
    }

    /// Get a snapshot of the current session state
    pub async fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.read().await;
        SessionSnapshot {
            file_name: inner.document.as_ref().map(|doc| doc.file_name.clone()),
            chapter_count: inner.document.as_ref().map_or(0, Document::len),
            cursor: inner.playback.cursor(),
            state: inner.playback.state(),
            current_word: inner.playback.current_word().map(str::to_owned),
            word_count: inner.playback.tokens().len(),
            highlight: inner.highlight.clone(),
            show_chapters: inner.show_chapters,
            loading: inner.loading,
            last_error: inner.last_error.clone(),
            pending_resume: inner.pending_resume.is_some(),
        }
    }

    /// List the chapters of the active document
    pub async fn chapters(&self) -> Vec<ChapterSummary> {
        let inner = self.inner.read().await;
        inner
            .document
            .iter()
            .flat_map(|doc| doc.chapters().iter().enumerate())
            .map(|(position, chapter)| ChapterSummary {
                position,
                index: chapter.index,
                title: chapter.title.clone(),
                word_count: chapter.word_count(),
            })
            .collect()
    }

    /// Get the word under the cursor
    pub async fn current_word(&self) -> Option<String> {
        self.inner
            .read()
            .await
            .playback
            .current_word()
            .map(str::to_owned)
    }

    async fn apply_tick(&self, generation: u64) {
        let mut inner = self.inner.write().await;
        if inner.tick_generation != generation {
            debug!(target: LOG_TARGET, "Ignoring tick from a stopped schedule");
            return;
        }

        match inner.playback.tick() {
            TickOutcome::Advanced(_) => {
                self.emit_word(&inner);
                self.publish_persisted(&inner);
            }
            TickOutcome::Finished => {
                self.stop_ticking(&mut inner);
                debug!(target: LOG_TARGET, "Reached the end of the chapter");
                self.emit_state(&inner);
                self.emit(SessionEvent::Finished);
            }
            TickOutcome::Ignored => {}
        }
    }

    fn activate_chapter(&self, inner: &mut SessionInner, position: usize) -> bool {
        self.stop_ticking(inner);

        let Some(chapter) = inner.document.as_ref().and_then(|doc| doc.chapter(position)) else {
            debug!(target: LOG_TARGET, "No chapter at position {}", position);
            return false;
        };

        inner.playback.select_chapter(position, &chapter.text);
        let event = SessionEvent::ChapterSelected {
            chapter: position,
            title: chapter.title.clone(),
            word_count: inner.playback.tokens().len(),
        };
        self.emit(event);
        self.emit_state(inner);
        true
    }

    fn pause_locked(&self, inner: &mut SessionInner) {
        if inner.playback.state().is_playing() {
            inner.playback.pause();
            self.emit_state(inner);
        }
    }

    fn start_ticking(&self, inner: &mut SessionInner) {
        inner.tick_generation += 1;
        let generation = inner.tick_generation;
        let tick_tx = self.tick_tx.clone();
        self.ticker.start(
            TICK_INTERVAL,
            Arc::new(move || {
                let _ = tick_tx.send(generation);
            }),
        );
    }

    fn stop_ticking(&self, inner: &mut SessionInner) {
        inner.tick_generation += 1;
        self.ticker.stop();
    }

    fn publish_persisted(&self, inner: &SessionInner) {
        let Some(document) = &inner.document else {
            return;
        };
        let cursor = inner.playback.cursor();
        let latest = Some(PersistedSession {
            file_name: document.file_name.clone(),
            selected_chapter_idx: cursor.chapter_index,
            current_word_idx: cursor.word_index,
            show_chapters: inner.show_chapters,
            saved_at: None,
        });

        self.persisted_tx.send_if_modified(move |current| {
            if *current == latest {
                return false;
            }
            *current = latest;
            true
        });
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.event_tx.send(event);
    }

    fn emit_state(&self, inner: &SessionInner) {
        self.emit(SessionEvent::StateChanged {
            state: inner.playback.state(),
        });
    }

    fn emit_word(&self, inner: &SessionInner) {
        if let Some(word) = inner.playback.current_word() {
            self.emit(SessionEvent::WordChanged {
                word_index: inner.playback.cursor().word_index,
                word: word.to_owned(),
            });
        }
    }
}

/// Apply scheduled ticks one at a time, in order.
fn spawn_tick_driver(session: Weak<ReadingSession>, mut ticks: mpsc::UnboundedReceiver<u64>) {
    tokio::spawn(async move {
        while let Some(generation) = ticks.recv().await {
            let Some(session) = session.upgrade() else {
                break;
            };
            session.apply_tick(generation).await;
        }
    });
}
