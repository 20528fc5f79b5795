use crate::error::LoadError;
use crate::tokenize::word_count;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Title used for formats without per-section structure
pub const FULL_TEXT_TITLE: &str = "Full Text";

/// Supported import formats, selected by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Epub,
    Pdf,
    Txt,
}

impl DocumentFormat {
    /// Select the format from a file name's extension (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::UnsupportedFormat`] for any other extension.
    pub fn from_file_name(file_name: &str) -> Result<Self, LoadError> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "epub" => Ok(Self::Epub),
            "pdf" => Ok(Self::Pdf),
            "txt" => Ok(Self::Txt),
            _ => Err(LoadError::UnsupportedFormat { extension }),
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Epub => "epub",
            Self::Pdf => "pdf",
            Self::Txt => "txt",
        }
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One readable chapter of an imported document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub title: String,
    /// Normalized prose
    pub text: String,
    /// Position in the source spine, kept even when earlier sections were dropped
    pub index: usize,
}

impl Chapter {
    pub fn new(title: impl Into<String>, text: impl Into<String>, index: usize) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
            index,
        }
    }

    #[must_use]
    pub fn word_count(&self) -> usize {
        word_count(&self.text)
    }
}

/// Every chapter produced from one imported file.
#[derive(Debug, Clone)]
pub struct Document {
    pub file_name: String,
    pub format: DocumentFormat,
    chapters: Vec<Chapter>,
}

impl Document {
    /// Build a document; `None` when there is nothing to read.
    #[must_use]
    pub fn new(
        file_name: impl Into<String>,
        format: DocumentFormat,
        chapters: Vec<Chapter>,
    ) -> Option<Self> {
        if chapters.is_empty() {
            return None;
        }
        Some(Self {
            file_name: file_name.into(),
            format,
            chapters,
        })
    }

    #[must_use]
    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    /// Chapter at a position in the (possibly sparse) chapter list
    #[must_use]
    pub fn chapter(&self, position: usize) -> Option<&Chapter> {
        self.chapters.get(position)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }
}
