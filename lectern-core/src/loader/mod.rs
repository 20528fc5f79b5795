//! Document import: extension dispatch, off-thread extraction and the load deadline.
//!
//! Each format adapter turns raw bytes into a list of [`Chapter`]s. Extraction
//! runs on tokio's blocking pool under a fixed deadline. When the deadline
//! passes the load is abandoned, the worker is told to stop at its next section
//! boundary and whatever it produced is discarded.

pub mod epub;
pub mod pdf;
pub mod txt;

use crate::document::{Chapter, Document, DocumentFormat};
use crate::error::{DecodeError, LoadError};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use self::epub::{EpubContainer, EpubDecoder, EpubDocDecoder, TocEntry};
pub use self::pdf::{PdfDecoder, PdfiumDecoder};

const LOG_TARGET: &str = "lectern::loader";

/// Upper bound on decode + extraction for any format
pub const LOAD_TIMEOUT: Duration = Duration::from_secs(20);

/// Imports documents through pluggable EPUB and PDF decoders.
#[derive(Clone)]
pub struct DocumentLoader {
    epub: Arc<dyn EpubDecoder>,
    pdf: Arc<dyn PdfDecoder>,
    deadline: Duration,
}

impl DocumentLoader {
    /// Create a loader backed by the given decoders.
    pub fn new(epub: Arc<dyn EpubDecoder>, pdf: Arc<dyn PdfDecoder>) -> Self {
        Self {
            epub,
            pdf,
            deadline: LOAD_TIMEOUT,
        }
    }

    /// Create a loader using the `epub` crate and a pdfium library.
    ///
    /// `pdf_library_dir` points at the directory holding the pdfium shared
    /// library; `None` binds to the system library.
    #[must_use]
    pub fn with_default_decoders(pdf_library_dir: Option<std::path::PathBuf>) -> Self {
        Self::new(
            Arc::new(EpubDocDecoder),
            Arc::new(PdfiumDecoder::new(pdf_library_dir)),
        )
    }

    #[cfg(test)]
    pub(crate) fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Read and import a file from disk.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::UnsupportedFormat`] before touching the file when the
    /// extension is not recognized, [`LoadError::ReadError`] when the file cannot be
    /// read, and any error from [`Self::load_bytes`].
    pub async fn load_path(&self, path: &Path) -> Result<Document, LoadError> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let format = DocumentFormat::from_file_name(&file_name)?;

        let bytes = tokio::fs::read(path).await?;
        debug!(
            target: LOG_TARGET,
            "Read {} bytes from {}",
            bytes.len(),
            path.display()
        );

        self.load_format(file_name, format, bytes).await
    }

    /// Import a document from an in-memory buffer.
    ///
    /// # Errors
    ///
    /// See [`LoadError`] for the failure kinds. No partial document is ever
    /// returned alongside an error.
    pub async fn load_bytes(&self, file_name: &str, bytes: Vec<u8>) -> Result<Document, LoadError> {
        let format = DocumentFormat::from_file_name(file_name)?;
        self.load_format(file_name.to_owned(), format, bytes).await
    }

    async fn load_format(
        &self,
        file_name: String,
        format: DocumentFormat,
        bytes: Vec<u8>,
    ) -> Result<Document, LoadError> {
        info!(target: LOG_TARGET, "Importing {} as {}", file_name, format);

        let cancel = CancellationToken::new();
        let worker_cancel = cancel.clone();
        let epub_decoder = Arc::clone(&self.epub);
        let pdf_decoder = Arc::clone(&self.pdf);

        let handle = tokio::task::spawn_blocking(move || {
            extract(
                format,
                &bytes,
                epub_decoder.as_ref(),
                pdf_decoder.as_ref(),
                &worker_cancel,
            )
        });

        let chapters = match tokio::time::timeout(self.deadline, handle).await {
            Ok(Ok(result)) => result?,
            Ok(Err(join_error)) => {
                warn!(target: LOG_TARGET, "Extraction worker failed: {}", join_error);
                return Err(LoadError::CorruptContainer {
                    reason: join_error.to_string(),
                });
            }
            Err(_) => {
                cancel.cancel();
                warn!(
                    target: LOG_TARGET,
                    "Import of {} exceeded {:?}, abandoning",
                    file_name,
                    self.deadline
                );
                return Err(LoadError::TimedOut);
            }
        };

        info!(
            target: LOG_TARGET,
            "Imported {} with {} chapter(s)",
            file_name,
            chapters.len()
        );

        Document::new(file_name, format, chapters).ok_or(LoadError::NoChaptersFound)
    }
}

/// Run the format adapter on the calling (blocking) thread.
fn extract(
    format: DocumentFormat,
    bytes: &[u8],
    epub_decoder: &dyn EpubDecoder,
    pdf_decoder: &dyn PdfDecoder,
    cancel: &CancellationToken,
) -> Result<Vec<Chapter>, LoadError> {
    let chapters = match format {
        DocumentFormat::Txt => txt::extract(bytes),
        DocumentFormat::Pdf => pdf::extract(pdf_decoder, bytes, cancel),
        DocumentFormat::Epub => epub::extract(epub_decoder, bytes, cancel),
    }
    .map_err(|e| match e {
        DecodeError::Cancelled => LoadError::TimedOut,
        other => LoadError::CorruptContainer {
            reason: other.to_string(),
        },
    })?;

    if chapters.is_empty() {
        return Err(LoadError::NoChaptersFound);
    }
    Ok(chapters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::epub::tests::{FakeEpub, FakeSection};
    use crate::loader::pdf::tests::FakePdf;

    fn loader() -> DocumentLoader {
        DocumentLoader::new(Arc::new(FakeEpub::default()), Arc::new(FakePdf::default()))
    }

    #[tokio::test]
    async fn test_unsupported_format_rejected_before_read() {
        let missing = Path::new("/definitely/not/here/report.docx");
        let err = loader().load_path(missing).await.unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedFormat { ref extension } if extension == "docx"));
    }

    #[tokio::test]
    async fn test_missing_file_is_read_error() {
        let missing = Path::new("/definitely/not/here/book.txt");
        let err = loader().load_path(missing).await.unwrap_err();
        assert!(matches!(err, LoadError::ReadError(_)));
    }

    #[tokio::test]
    async fn test_load_txt_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.TXT");
        std::fs::write(&path, "First line.\r\n\r\n\r\nSecond   line.").unwrap();

        let doc = loader().load_path(&path).await.unwrap();
        assert_eq!(doc.file_name, "notes.TXT");
        assert_eq!(doc.format, DocumentFormat::Txt);
        assert_eq!(doc.len(), 1);

        let chapter = doc.chapter(0).unwrap();
        assert_eq!(chapter.title, "Full Text");
        assert_eq!(chapter.index, 0);
        assert_eq!(chapter.text, "First line.\n\nSecond line.");
    }

    #[tokio::test]
    async fn test_blank_txt_has_no_chapters() {
        let err = loader().load_bytes("empty.txt", b" \n\t ".to_vec()).await.unwrap_err();
        assert!(matches!(err, LoadError::NoChaptersFound));
    }

    #[tokio::test]
    async fn test_dispatch_by_extension() {
        let epub = FakeEpub::with_sections(vec![
            FakeSection::markup("a.xhtml", "<p>From the epub</p>"),
        ]);
        let pdf = FakePdf {
            pages: vec![vec!["From", "the", "pdf"]],
            reject: false,
        };
        let loader = DocumentLoader::new(Arc::new(epub), Arc::new(pdf));

        let doc = loader.load_bytes("Book.EPUB", Vec::new()).await.unwrap();
        assert_eq!(doc.format, DocumentFormat::Epub);
        assert_eq!(doc.chapter(0).unwrap().text, "From the epub");

        let doc = loader.load_bytes("paper.pdf", Vec::new()).await.unwrap();
        assert_eq!(doc.format, DocumentFormat::Pdf);
        assert_eq!(doc.chapter(0).unwrap().text, "From the pdf");
    }

    #[tokio::test]
    async fn test_epub_without_readable_sections() {
        let epub = FakeEpub::with_sections(vec![FakeSection::default()]);
        let loader = DocumentLoader::new(Arc::new(epub), Arc::new(FakePdf::default()));

        let err = loader.load_bytes("empty.epub", Vec::new()).await.unwrap_err();
        assert!(matches!(err, LoadError::NoChaptersFound));
    }

    #[tokio::test]
    async fn test_corrupt_epub_container() {
        let epub = FakeEpub {
            reject_container: true,
            ..FakeEpub::default()
        };
        let loader = DocumentLoader::new(Arc::new(epub), Arc::new(FakePdf::default()));

        let err = loader.load_bytes("book.epub", vec![1, 2, 3]).await.unwrap_err();
        assert!(matches!(err, LoadError::CorruptContainer { .. }));
    }

    #[tokio::test]
    async fn test_slow_extraction_times_out_and_stops() {
        let epub = FakeEpub::slow(200, Duration::from_millis(20));
        let progress = epub.progress();
        let loader = DocumentLoader::new(Arc::new(epub), Arc::new(FakePdf::default()))
            .with_deadline(Duration::from_millis(100));

        let err = loader.load_bytes("slow.epub", Vec::new()).await.unwrap_err();
        assert!(matches!(err, LoadError::TimedOut));

        // The worker notices cancellation at its next section boundary.
        tokio::time::sleep(Duration::from_millis(150)).await;
        let settled = progress.load(std::sync::atomic::Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(progress.load(std::sync::atomic::Ordering::SeqCst), settled);
        assert!(settled < 200);
    }
}
