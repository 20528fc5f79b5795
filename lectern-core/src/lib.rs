pub mod config;
pub mod dictionary;
pub mod document;
pub mod error;
pub mod loader;
pub mod normalize;
pub mod paths;
pub mod playback;
pub mod resume;
pub mod session;
pub mod store;
pub mod ticker;
pub mod tokenize;

pub use config::{
    DictionaryConfig, LecternConfig, LoggingConfig, PdfConfig, ReaderConfig, build_config_template,
};
pub use dictionary::{
    DefinitionLookup, DefinitionProvider, DictionaryLookup, ERROR_MESSAGE, LookupStatus,
    NOT_FOUND_MESSAGE, Sense,
};
pub use document::{Chapter, Document, DocumentFormat};
pub use error::{CoreError, DecodeError, LoadError, LookupError};
pub use loader::{DocumentLoader, EpubContainer, EpubDecoder, LOAD_TIMEOUT, PdfDecoder, TocEntry};
pub use normalize::{normalize, normalize_markup, normalize_text};
pub use paths::{
    CONFIG_DIR_NAME, CONFIG_FILE_NAME, LOG_FILE_NAME, SESSION_FILE_NAME, config_dir, config_path,
    log_file_path, session_path,
};
pub use playback::{PlaybackState, ReadingCursor, SelectionHighlight, TICK_INTERVAL};
pub use resume::{PendingResume, PersistedSession, ResumeOffer, ResumePlan};
pub use session::{ChapterSummary, ReadingSession, SessionEvent, SessionSnapshot};
pub use store::{JsonFileStore, SessionStore, spawn_persister};
pub use ticker::{TickSource, TokioTicker};
pub use tokenize::{TokenSequence, tokenize};
/// Re-export toml error type for config parsing error handling
pub use toml::de::Error as TomlParseError;
