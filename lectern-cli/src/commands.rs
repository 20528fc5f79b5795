use crate::cli::ReadArgs;
use lectern_core::{
    CoreError, DictionaryLookup, DocumentLoader, JsonFileStore, LecternConfig, LoadError,
    LookupStatus, ReadingSession, ResumeOffer, SessionEvent, SessionStore, TokioTicker,
    spawn_persister,
};
use lectern_dictionary_api::DictionaryApiProvider;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{}", .0.user_message())]
    Load(#[from] LoadError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("There is no chapter {0}; run `lectern chapters` to list them.")]
    MissingChapter(usize),

    #[error("Dictionary lookups are disabled in the config file.")]
    DictionaryDisabled,
}

/// Play one chapter to the terminal until it ends or Ctrl+C is pressed.
pub async fn read(
    config: &LecternConfig,
    args: &ReadArgs,
    cancel_token: &CancellationToken,
) -> Result<(), CommandError> {
    let store: Arc<dyn SessionStore> = Arc::new(JsonFileStore::default_location());
    let session = ReadingSession::new(
        DocumentLoader::with_default_decoders(config.pdf.library_dir()),
        Arc::new(TokioTicker::new()),
        config.reader.show_chapters,
    );

    match (store.load().await, args.resume) {
        (Some(stored), true) => session.accept_resume(&ResumeOffer::new(stored)).await,
        (Some(stored), false) => println!("{}", resume_hint(&ResumeOffer::new(stored))),
        (None, true) => println!("No saved position, starting from the beginning."),
        (None, false) => {}
    }

    // Started before the import so the restored position is written back as well
    let persister_token = CancellationToken::new();
    let persister = spawn_persister(
        Arc::clone(&store),
        session.persisted_updates(),
        persister_token.clone(),
    );

    let outcome = play_document(&session, args, cancel_token).await;

    persister_token.cancel();
    if let Err(e) = persister.await {
        warn!("Session persister ended abnormally: {}", e);
    }
    outcome
}

async fn play_document(
    session: &Arc<ReadingSession>,
    args: &ReadArgs,
    cancel_token: &CancellationToken,
) -> Result<(), CommandError> {
    session.import_path(&args.file).await?;

    if let Some(position) = args.chapter
        && !session.select_chapter(position).await
    {
        return Err(CommandError::MissingChapter(position));
    }
    if let Some(word_index) = args.from {
        session.seek(word_index).await;
    }

    let chapters = session.chapters().await;
    let snapshot = session.snapshot().await;
    if let Some(summary) = snapshot
        .cursor
        .chapter_index
        .and_then(|position| chapters.get(position))
    {
        println!(
            "{} ({} words, starting at word {})",
            summary.title, summary.word_count, snapshot.cursor.word_index
        );
    }

    let mut events = session.subscribe();
    if !session.play().await {
        // Already on the last word
        if let Some(word) = session.current_word().await {
            println!("{word}");
        }
        return Ok(());
    }
    if let Some(word) = session.current_word().await {
        show_word(&word);
    }

    loop {
        tokio::select! {
            () = cancel_token.cancelled() => {
                session.pause().await;
                let cursor = session.snapshot().await.cursor;
                println!();
                println!("Paused at word {}.", cursor.word_index);
                break;
            }
            event = events.recv() => match event {
                Ok(SessionEvent::WordChanged { word, .. }) => show_word(&word),
                Ok(SessionEvent::Finished) => {
                    println!();
                    info!("Finished chapter");
                    break;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(n)) => debug!("Display skipped {} events", n),
                Err(RecvError::Closed) => break,
            },
        }
    }

    Ok(())
}

/// Tell the reader a saved position exists that this run will overwrite.
fn resume_hint(offer: &ResumeOffer) -> String {
    let chapter = offer
        .session
        .selected_chapter_idx
        .map_or_else(String::new, |position| format!("chapter {position}, "));
    format!(
        "A saved position exists for {} ({chapter}word {}); pass --resume to continue from it.",
        offer.file_name(),
        offer.session.current_word_idx
    )
}

fn show_word(word: &str) {
    let mut stdout = std::io::stdout().lock();
    let _ = write!(stdout, "\r\x1b[2K{word}");
    let _ = stdout.flush();
}

/// Print the chapter list of a document.
pub async fn chapters(config: &LecternConfig, file: &Path) -> Result<(), CommandError> {
    let loader = DocumentLoader::with_default_decoders(config.pdf.library_dir());
    let document = loader.load_path(file).await?;

    println!("{} ({})", document.file_name, document.format);
    for (position, chapter) in document.chapters().iter().enumerate() {
        println!(
            "{position:>4}  {:<48} {:>7} words",
            chapter.title,
            chapter.word_count()
        );
    }
    Ok(())
}

/// Look up one word and print the outcome.
pub async fn define(config: &LecternConfig, word: &str) -> Result<(), CommandError> {
    if !config.dictionary.enabled {
        return Err(CommandError::DictionaryDisabled);
    }

    let provider = DictionaryApiProvider::from_config(&config.dictionary)?;
    let lookup = DictionaryLookup::new(Arc::new(provider));
    let result = lookup.define(word).await;

    match result.status {
        LookupStatus::Found => println!("{}: {}", result.word, result.text),
        _ => println!("{}", result.text),
    }
    Ok(())
}

/// Show or clear the stored reading position.
pub async fn session(clear: bool) -> Result<(), CommandError> {
    let store = JsonFileStore::default_location();

    if clear {
        store.clear().await?;
        println!("Forgot the saved reading position.");
        return Ok(());
    }

    match store.load().await {
        Some(stored) => {
            let offer = ResumeOffer::new(stored);
            let chapter = offer
                .session
                .selected_chapter_idx
                .map_or_else(|| "-".to_owned(), |position| position.to_string());
            println!("File:     {}", offer.file_name());
            println!("Chapter:  {chapter}");
            println!("Word:     {}", offer.session.current_word_idx);
            if let Some(saved_at) = offer.session.saved_at {
                println!("Saved at: {}", saved_at.format("%Y-%m-%d %H:%M:%S UTC"));
            }
            println!();
            println!("Run `lectern read <FILE> --resume` to continue.");
        }
        None => println!("No saved reading position."),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_core::PersistedSession;

    fn stored(chapter: Option<usize>) -> ResumeOffer {
        ResumeOffer::new(PersistedSession {
            file_name: "moby.epub".into(),
            selected_chapter_idx: chapter,
            current_word_idx: 812,
            show_chapters: true,
            saved_at: None,
        })
    }

    #[test]
    fn test_resume_hint_names_saved_position() {
        assert_eq!(
            resume_hint(&stored(Some(4))),
            "A saved position exists for moby.epub (chapter 4, word 812); pass --resume to continue from it."
        );
    }

    #[test]
    fn test_resume_hint_without_chapter() {
        assert_eq!(
            resume_hint(&stored(None)),
            "A saved position exists for moby.epub (word 812); pass --resume to continue from it."
        );
    }
}
