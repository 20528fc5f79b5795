use crate::tokenize::TokenSequence;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fixed pace: one word every 200 ms (300 words per minute)
pub const TICK_INTERVAL: Duration = Duration::from_millis(200);

/// Where playback is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    /// Initial state, and the rest state after finishing or resetting
    #[default]
    Idle,
    Playing,
    Paused,
}

impl PlaybackState {
    #[must_use]
    pub const fn is_playing(self) -> bool {
        matches!(self, Self::Playing)
    }
}

/// Active chapter and word position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadingCursor {
    /// Position of the active chapter in the document's chapter list,
    /// `None` before anything is selected
    pub chapter_index: Option<usize>,
    pub word_index: usize,
}

/// A word the reader explicitly picked, independent of the cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionHighlight {
    pub word: String,
    pub word_index: usize,
}

/// Result of one scheduled tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Cursor moved to this word
    Advanced(usize),
    /// Cursor was on the last word; playback is now idle
    Finished,
    /// Not playing, nothing changed
    Ignored,
}

/// Word-at-a-time playback over one chapter's tokens.
///
/// This type only tracks state. Whoever owns it is responsible for running a
/// tick source while [`Self::state`] is [`PlaybackState::Playing`] and for
/// stopping it on every other transition.
#[derive(Debug, Clone, Default)]
pub struct Playback {
    tokens: TokenSequence,
    cursor: ReadingCursor,
    state: PlaybackState,
}

impl Playback {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn state(&self) -> PlaybackState {
        self.state
    }

    #[must_use]
    pub const fn cursor(&self) -> ReadingCursor {
        self.cursor
    }

    #[must_use]
    pub const fn tokens(&self) -> &TokenSequence {
        &self.tokens
    }

    /// Token under the cursor
    #[must_use]
    pub fn current_word(&self) -> Option<&str> {
        self.tokens.get(self.cursor.word_index)
    }

    /// Activate a chapter: fresh tokens, first word, idle.
    pub fn select_chapter(&mut self, chapter_index: usize, text: &str) {
        self.tokens = TokenSequence::from_text(text);
        self.cursor = ReadingCursor {
            chapter_index: Some(chapter_index),
            word_index: 0,
        };
        self.state = PlaybackState::Idle;
    }

    /// Drop the active chapter entirely.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Start playing.
    ///
    /// Returns `true` only when this call moved playback into
    /// [`PlaybackState::Playing`]; the caller should then start ticking.
    pub fn play(&mut self) -> bool {
        if self.state.is_playing() || self.tokens.is_empty() {
            return false;
        }
        if self.state == PlaybackState::Idle && self.is_at_last_word() {
            return false;
        }
        self.state = PlaybackState::Playing;
        true
    }

    pub fn pause(&mut self) {
        if self.state.is_playing() {
            self.state = PlaybackState::Paused;
        }
    }

    /// Back to the first word, idle.
    pub fn reset(&mut self) {
        self.cursor.word_index = 0;
        self.state = PlaybackState::Idle;
    }

    /// Jump to a word picked by the reader.
    ///
    /// The index is clamped into the token range. Playing or paused playback
    /// ends up paused; idle stays idle. Returns the highlight for the picked
    /// word, or `None` when there are no tokens.
    pub fn seek(&mut self, word_index: usize) -> Option<SelectionHighlight> {
        self.move_to(self.tokens.clamp(word_index));
        self.current_word().map(|word| SelectionHighlight {
            word: word.to_owned(),
            word_index: self.cursor.word_index,
        })
    }

    /// Nudge the cursor by `delta` words, clamped into the token range.
    pub fn step(&mut self, delta: isize) {
        let target = self.cursor.word_index.saturating_add_signed(delta);
        self.move_to(self.tokens.clamp(target));
    }

    /// Place the cursor without touching the playback state (clamped).
    pub fn set_word_index(&mut self, word_index: usize) {
        self.cursor.word_index = self.tokens.clamp(word_index);
    }

    /// Advance one word if playing.
    pub fn tick(&mut self) -> TickOutcome {
        if !self.state.is_playing() {
            return TickOutcome::Ignored;
        }
        if self.is_at_last_word() || self.tokens.is_empty() {
            self.state = PlaybackState::Idle;
            return TickOutcome::Finished;
        }
        self.cursor.word_index += 1;
        TickOutcome::Advanced(self.cursor.word_index)
    }

    fn move_to(&mut self, word_index: usize) {
        self.cursor.word_index = word_index;
        if self.state.is_playing() {
            self.state = PlaybackState::Paused;
        }
    }

    fn is_at_last_word(&self) -> bool {
        self.tokens.last_index() == Some(self.cursor.word_index)
    }
}
