use crate::document::{Chapter, FULL_TEXT_TITLE};
use crate::error::DecodeError;
use crate::normalize::normalize_text;
use std::borrow::Cow;
use tracing::debug;

const LOG_TARGET: &str = "lectern::loader::txt";

/// Decode a plain text file into at most one "Full Text" chapter.
///
/// Returns an empty list when the file holds nothing but whitespace.
pub(crate) fn extract(bytes: &[u8]) -> Result<Vec<Chapter>, DecodeError> {
    let decoded = decode_text(bytes);
    let text = normalize_text(&decoded);

    if text.is_empty() {
        debug!(target: LOG_TARGET, "Text file is blank");
        return Ok(Vec::new());
    }

    Ok(vec![Chapter::new(FULL_TEXT_TITLE, text, 0)])
}

/// Decode bytes as UTF-8 (honouring a byte order mark), falling back to Windows-1252.
fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    let (result, encoding, malformed) = encoding_rs::UTF_8.decode(bytes);

    if !malformed {
        return result;
    }

    debug!(
        target: LOG_TARGET,
        "Input is not valid {}, decoding as windows-1252",
        encoding.name()
    );
    let (result, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_full_text_chapter() {
        let chapters = extract(b"Call me Ishmael.Some years ago").unwrap();
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].title, "Full Text");
        assert_eq!(chapters[0].index, 0);
        assert_eq!(chapters[0].text, "Call me Ishmael. Some years ago");
    }

    #[test]
    fn test_markup_in_text_file_is_kept_verbatim() {
        let chapters = extract(b"a <p> tag").unwrap();
        assert_eq!(chapters[0].text, "a <p> tag");
    }

    #[test]
    fn test_utf8_bom_stripped() {
        let chapters = extract(b"\xEF\xBB\xBFhello").unwrap();
        assert_eq!(chapters[0].text, "hello");
    }

    #[test]
    fn test_utf16_bom_decoded() {
        let chapters = extract(b"\xFF\xFEh\x00i\x00").unwrap();
        assert_eq!(chapters[0].text, "hi");
    }

    #[test]
    fn test_windows_1252_fallback() {
        // "café" with a bare 0xE9
        let chapters = extract(b"caf\xE9").unwrap();
        assert_eq!(chapters[0].text, "café");
    }

    #[test]
    fn test_blank_file_yields_nothing() {
        assert!(extract(b"").unwrap().is_empty());
        assert!(extract(b"\r\n  \t").unwrap().is_empty());
    }
}
