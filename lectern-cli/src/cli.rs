use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Read EPUB, PDF and plain text documents one word at a time.
#[derive(Debug, Parser)]
#[command(name = "lectern", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Play a chapter of a document word by word
    Read(ReadArgs),
    /// List the chapters of a document
    Chapters {
        /// Document to inspect (.epub, .pdf or .txt)
        file: PathBuf,
    },
    /// Look up a word in the dictionary
    Define {
        word: String,
    },
    /// Show the stored reading position
    Session {
        /// Forget the stored reading position
        #[arg(long)]
        clear: bool,
    },
}

#[derive(Debug, Args)]
pub struct ReadArgs {
    /// Document to read (.epub, .pdf or .txt)
    pub file: PathBuf,

    /// Continue from the stored reading position
    #[arg(long, conflicts_with = "chapter")]
    pub resume: bool,

    /// Chapter to read, as listed by `lectern chapters`
    #[arg(long, value_name = "N")]
    pub chapter: Option<usize>,

    /// Word to start from within the chapter
    #[arg(long, value_name = "WORD")]
    pub from: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_read_args() {
        let cli = Cli::try_parse_from(["lectern", "read", "book.epub", "--chapter", "3", "--from", "40"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Command::Read(ReadArgs {
                ref file,
                resume: false,
                chapter: Some(3),
                from: Some(40),
            }) if file == &PathBuf::from("book.epub")
        ));
    }

    #[test]
    fn test_resume_conflicts_with_chapter() {
        let result = Cli::try_parse_from(["lectern", "read", "book.epub", "--resume", "--chapter", "1"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_session_clear_flag() {
        let cli = Cli::try_parse_from(["lectern", "session", "--clear"]).unwrap();
        assert!(matches!(cli.command, Command::Session { clear: true }));
    }
}
