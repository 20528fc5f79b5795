//! On-demand word definitions where only the most recently requested word is shown.

use crate::error::LookupError;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info, warn};

const LOG_TARGET: &str = "lectern::dictionary";

/// Shown when the dictionary has no entry for a word
pub const NOT_FOUND_MESSAGE: &str = "No definition found.";

/// Shown when the dictionary could not be reached or understood
pub const ERROR_MESSAGE: &str = "Error fetching definition.";

/// One meaning of a word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sense {
    pub part_of_speech: Option<String>,
    pub definitions: Vec<String>,
}

/// Source of word definitions.
#[async_trait]
pub trait DefinitionProvider: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &'static str;

    /// Look up all senses of `word`.
    ///
    /// An empty list means the dictionary has no entry for the word.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] for transport failures, unreadable responses and
    /// unexpected HTTP statuses.
    async fn senses(&self, word: &str) -> Result<Vec<Sense>, LookupError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LookupStatus {
    #[default]
    Idle,
    Loading,
    Found,
    NotFound,
    Error,
}

/// The lookup currently on display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefinitionLookup {
    pub word: String,
    pub status: LookupStatus,
    /// Definition or status message, empty while idle or loading
    pub text: String,
}

impl DefinitionLookup {
    fn loading(word: &str) -> Self {
        Self {
            word: word.to_owned(),
            status: LookupStatus::Loading,
            text: String::new(),
        }
    }

    fn resolved(word: &str, status: LookupStatus, text: impl Into<String>) -> Self {
        Self {
            word: word.to_owned(),
            status,
            text: text.into(),
        }
    }
}

/// Strip punctuation surrounding a token so it can be used as a query.
#[must_use]
pub fn query_for(word: &str) -> &str {
    word.trim_matches(|c: char| !c.is_alphanumeric())
}

/// Issues lookups and publishes the newest one.
///
/// A response is published only if no newer lookup was issued while it was in
/// flight.
pub struct DictionaryLookup {
    provider: Arc<dyn DefinitionProvider>,
    issued: Mutex<u64>,
    state_tx: watch::Sender<DefinitionLookup>,
}

impl DictionaryLookup {
    pub fn new(provider: Arc<dyn DefinitionProvider>) -> Self {
        let (state_tx, _) = watch::channel(DefinitionLookup::default());
        Self {
            provider,
            issued: Mutex::new(0),
            state_tx,
        }
    }

    /// Subscribe to the lookup on display
    pub fn subscribe(&self) -> watch::Receiver<DefinitionLookup> {
        self.state_tx.subscribe()
    }

    /// Get the lookup on display
    #[must_use]
    pub fn current(&self) -> DefinitionLookup {
        self.state_tx.borrow().clone()
    }

    /// Look up `word`, showing it as loading until the provider answers.
    ///
    /// Returns this call's own outcome, which is only displayed if nothing newer
    /// was issued meanwhile.
    pub async fn define(&self, word: &str) -> DefinitionLookup {
        let generation = {
            let mut issued = self.issued.lock().unwrap_or_else(PoisonError::into_inner);
            *issued += 1;
            self.state_tx.send_replace(DefinitionLookup::loading(word));
            *issued
        };

        let query = query_for(word);
        let outcome = if query.is_empty() {
            debug!(target: LOG_TARGET, "Nothing to look up in {:?}", word);
            DefinitionLookup::resolved(word, LookupStatus::NotFound, NOT_FOUND_MESSAGE)
        } else {
            info!(
                target: LOG_TARGET,
                "Looking up {:?} with {}",
                query,
                self.provider.name()
            );
            resolve(word, self.provider.senses(query).await)
        };

        let issued = self.issued.lock().unwrap_or_else(PoisonError::into_inner);
        if *issued == generation {
            self.state_tx.send_replace(outcome.clone());
        } else {
            debug!(
                target: LOG_TARGET,
                "Dropping superseded lookup for {:?}", word
            );
        }

        outcome
    }
}

fn resolve(word: &str, response: Result<Vec<Sense>, LookupError>) -> DefinitionLookup {
    match response {
        Ok(senses) => {
            let first = senses
                .iter()
                .find_map(|sense| sense.definitions.iter().find(|d| !d.trim().is_empty()));
            match first {
                Some(definition) => {
                    DefinitionLookup::resolved(word, LookupStatus::Found, definition.trim())
                }
                None => DefinitionLookup::resolved(word, LookupStatus::NotFound, NOT_FOUND_MESSAGE),
            }
        }
        Err(LookupError::Status(status)) => {
            debug!(target: LOG_TARGET, "Dictionary answered {} for {:?}", status, word);
            DefinitionLookup::resolved(word, LookupStatus::NotFound, NOT_FOUND_MESSAGE)
        }
        Err(e) => {
            warn!(target: LOG_TARGET, "Lookup for {:?} failed: {}", word, e);
            DefinitionLookup::resolved(word, LookupStatus::Error, ERROR_MESSAGE)
        }
    }
}
