//! Persisted reading position and the protocol that re-applies it after a restart.
//!
//! Resuming happens in two steps. At startup the stored [`PersistedSession`]
//! is offered to the reader. Accepting the offer only records a
//! [`PendingResume`]; the document itself has to be imported again, and the
//! pending intent is reconciled against whatever chapters that import yields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The reading coordinates written to local storage.
///
/// Never holds document bytes or chapter text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSession {
    pub file_name: String,
    pub selected_chapter_idx: Option<usize>,
    pub current_word_idx: usize,
    pub show_chapters: bool,
    /// When this snapshot was written; absent in snapshots that were never saved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

impl PersistedSession {
    /// Copy stamped with a save time.
    #[must_use]
    pub fn stamped(&self, saved_at: DateTime<Utc>) -> Self {
        Self {
            saved_at: Some(saved_at),
            ..self.clone()
        }
    }
}

/// A stored session presented to the reader at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeOffer {
    pub session: PersistedSession,
}

impl ResumeOffer {
    #[must_use]
    pub const fn new(session: PersistedSession) -> Self {
        Self { session }
    }

    /// File the reader needs to supply again
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.session.file_name
    }

    /// Record the reader's intent to pick up where they left off.
    #[must_use]
    pub fn accept(&self) -> PendingResume {
        PendingResume {
            file_name: self.session.file_name.clone(),
            selected_chapter_idx: self.session.selected_chapter_idx,
            current_word_idx: self.session.current_word_idx,
            show_chapters: self.session.show_chapters,
        }
    }
}

/// Resume intent waiting for the next successful import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingResume {
    /// File the intent was recorded for
    pub file_name: String,
    pub selected_chapter_idx: Option<usize>,
    pub current_word_idx: usize,
    pub show_chapters: bool,
}

/// What to do with a freshly imported document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumePlan {
    /// Start at the first chapter
    Fresh,
    /// Select `chapter`, then move the cursor to `word_index` (clamped by the caller)
    Restore {
        chapter: usize,
        word_index: usize,
        show_chapters: bool,
    },
}

/// Decide how a successful import with `chapter_count` chapters starts.
///
/// The stored chapter index is a position in the chapter list; one that is out
/// of bounds for the new list discards the whole intent.
#[must_use]
pub fn reconcile(pending: Option<&PendingResume>, chapter_count: usize) -> ResumePlan {
    let Some(pending) = pending else {
        return ResumePlan::Fresh;
    };

    match pending.selected_chapter_idx {
        Some(chapter) if chapter < chapter_count => ResumePlan::Restore {
            chapter,
            word_index: pending.current_word_idx,
            show_chapters: pending.show_chapters,
        },
        _ => ResumePlan::Fresh,
    }
}
