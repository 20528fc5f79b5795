//! EPUB adapter: spine walk, TOC titles and the per-section extraction chain.

use crate::document::Chapter;
use crate::error::DecodeError;
use crate::normalize::{normalize_markup, normalize_text};
use epub::doc::{EpubDoc, NavPoint};
use std::io::Cursor;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const LOG_TARGET: &str = "lectern::loader::epub";

/// Column width handed to html2text; wide enough that it never wraps prose.
const PLAIN_TEXT_WIDTH: usize = 10_000;

/// One flattened table-of-contents entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub label: String,
    /// Target path inside the container, possibly with a `#fragment`
    pub path: String,
}

impl TocEntry {
    pub fn new(label: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            path: path.into(),
        }
    }
}

/// An opened EPUB container.
///
/// Sections are addressed by their spine position. At most one section is
/// loaded at a time; the loader always calls [`Self::unload_section`] before
/// moving on.
pub trait EpubContainer {
    /// Section paths in reading order.
    fn spine(&self) -> Vec<String>;

    /// Table of contents, flattened depth-first.
    fn toc(&self) -> Vec<TocEntry>;

    /// Fetch a section's content.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Section`] when the section cannot be read.
    fn load_section(&mut self, position: usize) -> Result<(), DecodeError>;

    /// Loaded section as (X)HTML markup.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Section`] when no markup is available.
    fn render_markup(&mut self, position: usize) -> Result<String, DecodeError>;

    /// Loaded section as plain text.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Section`] when no text can be extracted.
    fn plain_text(&mut self, position: usize) -> Result<String, DecodeError>;

    /// Release whatever [`Self::load_section`] holds.
    fn unload_section(&mut self, position: usize);
}

/// Opens EPUB containers from raw bytes.
pub trait EpubDecoder: Send + Sync {
    /// # Errors
    ///
    /// Returns [`DecodeError::Container`] when the bytes are not a readable EPUB.
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn EpubContainer>, DecodeError>;
}

/// Ways of turning a loaded section into normalized prose, tried in order.
#[derive(Debug, Clone, Copy)]
enum Extraction {
    RenderedMarkup,
    PlainText,
}

impl Extraction {
    const CHAIN: [Self; 2] = [Self::RenderedMarkup, Self::PlainText];

    fn apply(self, container: &mut dyn EpubContainer, position: usize) -> Result<String, DecodeError> {
        match self {
            Self::RenderedMarkup => container
                .render_markup(position)
                .map(|markup| normalize_markup(&markup)),
            Self::PlainText => container
                .plain_text(position)
                .map(|text| normalize_text(&text)),
        }
    }
}

/// Walk the spine and emit one chapter per section with readable text.
///
/// Dropped sections still consume their spine position, so chapter indices
/// may be sparse.
pub(crate) fn extract(
    decoder: &dyn EpubDecoder,
    bytes: &[u8],
    cancel: &CancellationToken,
) -> Result<Vec<Chapter>, DecodeError> {
    let mut container = decoder.open(bytes)?;
    let spine = container.spine();
    let toc = container.toc();

    info!(
        target: LOG_TARGET,
        "EPUB has {} spine section(s) and {} TOC entries",
        spine.len(),
        toc.len()
    );

    let mut chapters = Vec::new();
    for (position, section_path) in spine.iter().enumerate() {
        if cancel.is_cancelled() {
            debug!(target: LOG_TARGET, "Cancelled before section {}", position);
            return Err(DecodeError::Cancelled);
        }

        let text = extract_section(container.as_mut(), position);
        container.unload_section(position);

        let Some(text) = text else {
            debug!(
                target: LOG_TARGET,
                "Dropping section {} ({}): no readable text",
                position,
                section_path
            );
            continue;
        };

        let title = resolve_title(&toc, section_path)
            .map_or_else(|| format!("Chapter {}", position + 1), str::to_owned);
        chapters.push(Chapter::new(title, text, position));
    }

    Ok(chapters)
}

fn extract_section(container: &mut dyn EpubContainer, position: usize) -> Option<String> {
    if let Err(e) = container.load_section(position) {
        warn!(target: LOG_TARGET, "Failed to load section {}: {}", position, e);
        return None;
    }

    Extraction::CHAIN.into_iter().find_map(|strategy| {
        match strategy.apply(container, position) {
            Ok(text) if !text.is_empty() => Some(text),
            Ok(_) => {
                debug!(
                    target: LOG_TARGET,
                    "{:?} produced no text for section {}", strategy, position
                );
                None
            }
            Err(e) => {
                debug!(
                    target: LOG_TARGET,
                    "{:?} failed for section {}: {}", strategy, position, e
                );
                None
            }
        }
    })
}

/// Title of the first TOC entry whose target names this section.
fn resolve_title<'a>(toc: &'a [TocEntry], section_path: &str) -> Option<&'a str> {
    toc.iter()
        .filter(|entry| !entry.label.trim().is_empty())
        .find(|entry| paths_match(section_path, strip_fragment(&entry.path)))
        .map(|entry| entry.label.trim())
}

fn strip_fragment(path: &str) -> &str {
    path.split_once('#').map_or(path, |(before, _)| before)
}

/// Either path is a suffix of the other, ending on a path segment boundary.
fn paths_match(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    is_path_suffix(a, b) || is_path_suffix(b, a)
}

fn is_path_suffix(path: &str, suffix: &str) -> bool {
    path.strip_suffix(suffix)
        .is_some_and(|rest| rest.is_empty() || rest.ends_with('/'))
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// [`EpubDecoder`] built on the `epub` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct EpubDocDecoder;

impl EpubDecoder for EpubDocDecoder {
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn EpubContainer>, DecodeError> {
        let doc = EpubDoc::from_reader(Cursor::new(bytes.to_vec()))
            .map_err(|e| DecodeError::Container(e.to_string()))?;
        Ok(Box::new(EpubDocContainer { doc, loaded: None }))
    }
}

struct EpubDocContainer {
    doc: EpubDoc<Cursor<Vec<u8>>>,
    /// Spine position and markup of the currently loaded section
    loaded: Option<(usize, String)>,
}

impl EpubDocContainer {
    fn loaded_markup(&self, position: usize) -> Result<&str, DecodeError> {
        match &self.loaded {
            Some((loaded, markup)) if *loaded == position => Ok(markup),
            _ => Err(DecodeError::Section {
                index: position,
                reason: "section is not loaded".into(),
            }),
        }
    }
}

fn flatten_toc(points: &[NavPoint], out: &mut Vec<TocEntry>) {
    for point in points {
        out.push(TocEntry::new(point.label.clone(), path_string(&point.content)));
        flatten_toc(&point.children, out);
    }
}

impl EpubContainer for EpubDocContainer {
    fn spine(&self) -> Vec<String> {
        self.doc
            .spine
            .iter()
            .map(|item| {
                self.doc
                    .resources
                    .get(&item.idref)
                    .map(|resource| path_string(&resource.path))
                    .unwrap_or_default()
            })
            .collect()
    }

    fn toc(&self) -> Vec<TocEntry> {
        let mut entries = Vec::new();
        flatten_toc(&self.doc.toc, &mut entries);
        entries
    }

    fn load_section(&mut self, position: usize) -> Result<(), DecodeError> {
        let idref = self
            .doc
            .spine
            .get(position)
            .map(|item| item.idref.clone())
            .ok_or_else(|| DecodeError::Section {
                index: position,
                reason: "no such spine item".into(),
            })?;

        let (markup, _mime) =
            self.doc
                .get_resource_str(&idref)
                .ok_or_else(|| DecodeError::Section {
                    index: position,
                    reason: format!("resource {idref} missing from container"),
                })?;

        self.loaded = Some((position, markup));
        Ok(())
    }

    fn render_markup(&mut self, position: usize) -> Result<String, DecodeError> {
        self.loaded_markup(position).map(str::to_owned)
    }

    fn plain_text(&mut self, position: usize) -> Result<String, DecodeError> {
        let markup = self.loaded_markup(position)?;
        html2text::from_read(markup.as_bytes(), PLAIN_TEXT_WIDTH).map_err(|e| DecodeError::Section {
            index: position,
            reason: e.to_string(),
        })
    }

    fn unload_section(&mut self, _position: usize) {
        self.loaded = None;
    }
}
