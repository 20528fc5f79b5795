use crate::document::{Chapter, FULL_TEXT_TITLE};
use crate::error::DecodeError;
use crate::normalize::normalize_text;
use pdfium_render::prelude::*;
use std::ops::ControlFlow;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const LOG_TARGET: &str = "lectern::loader::pdf";

/// Page-by-page PDF text decoder.
pub trait PdfDecoder: Send + Sync {
    /// Decode `bytes` and hand each page's text runs to `on_page`, in page order.
    ///
    /// Decoding stops early when `on_page` returns [`ControlFlow::Break`].
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Container`] when the buffer is not a readable PDF.
    fn decode_pages(
        &self,
        bytes: &[u8],
        on_page: &mut dyn FnMut(Vec<String>) -> ControlFlow<()>,
    ) -> Result<(), DecodeError>;
}

/// Join page runs into one "Full Text" chapter.
pub(crate) fn extract(
    decoder: &dyn PdfDecoder,
    bytes: &[u8],
    cancel: &CancellationToken,
) -> Result<Vec<Chapter>, DecodeError> {
    let mut pages: Vec<String> = Vec::new();

    decoder.decode_pages(bytes, &mut |runs| {
        if cancel.is_cancelled() {
            return ControlFlow::Break(());
        }
        pages.push(runs.join(" "));
        ControlFlow::Continue(())
    })?;

    if cancel.is_cancelled() {
        return Err(DecodeError::Cancelled);
    }

    debug!(target: LOG_TARGET, "Decoded {} page(s)", pages.len());

    let text = normalize_text(&pages.join("\n\n"));
    if text.is_empty() {
        return Ok(Vec::new());
    }
    Ok(vec![Chapter::new(FULL_TEXT_TITLE, text, 0)])
}

/// [`PdfDecoder`] backed by a pdfium shared library.
///
/// The library is bound per decode so that nothing pdfium owns has to cross
/// threads.
#[derive(Debug, Clone, Default)]
pub struct PdfiumDecoder {
    library_dir: Option<PathBuf>,
}

impl PdfiumDecoder {
    #[must_use]
    pub const fn new(library_dir: Option<PathBuf>) -> Self {
        Self { library_dir }
    }

    fn bind(&self) -> Result<Pdfium, PdfiumError> {
        let bindings = match &self.library_dir {
            Some(dir) => {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))?
            }
            None => Pdfium::bind_to_system_library()?,
        };
        Ok(Pdfium::new(bindings))
    }
}

impl PdfDecoder for PdfiumDecoder {
    fn decode_pages(
        &self,
        bytes: &[u8],
        on_page: &mut dyn FnMut(Vec<String>) -> ControlFlow<()>,
    ) -> Result<(), DecodeError> {
        let pdfium = self
            .bind()
            .map_err(|e| DecodeError::Container(format!("pdfium unavailable: {e}")))?;

        let document = pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| DecodeError::Container(e.to_string()))?;

        info!(
            target: LOG_TARGET,
            "Opened PDF with {} page(s)",
            document.pages().len()
        );

        for (index, page) in document.pages().iter().enumerate() {
            let runs = match page.text() {
                Ok(text) => text.segments().iter().map(|segment| segment.text()).collect(),
                Err(e) => {
                    debug!(target: LOG_TARGET, "Page {} has no text layer: {}", index, e);
                    Vec::new()
                }
            };

            if on_page(runs).is_break() {
                break;
            }
        }

        Ok(())
    }
}
