//! Raw section markup or extracted text → clean, paragraph-delimited prose.
//!
//! Normalization is intentionally lossy: only paragraph and list-item text
//! survives from markup, and everything is reduced to single spaces between
//! words and a blank line between paragraphs. The output is a fixed point:
//! normalizing it again returns it unchanged, as long as it does not quote a
//! complete element such as `<p>..</p>`.

use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::debug;

const LOG_TARGET: &str = "lectern::normalize";

/// Normalize either markup or plain text, sniffing which one was given.
#[must_use]
pub fn normalize(input: &str) -> String {
    if looks_like_markup(input) {
        normalize_markup(input)
    } else {
        normalize_text(input)
    }
}

/// Normalize HTML/XHTML section markup.
///
/// Keeps the text of `p` and `li` blocks, one paragraph per block. When no
/// block carries any text the whole document text is used instead.
#[must_use]
pub fn normalize_markup(markup: &str) -> String {
    let extracted = extract_blocks(markup);
    if extracted.blocks.trim().is_empty() {
        canonicalize(&extracted.fallback)
    } else {
        canonicalize(&extracted.blocks)
    }
}

/// Normalize already-extracted plain text.
#[must_use]
pub fn normalize_text(text: &str) -> String {
    canonicalize(text)
}

/// Elements whose paired open and close tags mark the input as markup.
const MARKUP_ELEMENTS: &[&str] = &[
    "html", "body", "head", "p", "li", "ul", "ol", "div", "span", "section", "article",
    "blockquote", "h1", "h2", "h3", "h4", "h5", "h6", "em", "strong", "b", "i", "a", "table",
    "tr", "td", "th",
];

/// Whether the input is a markup document rather than text that mentions tags.
///
/// Requires an XML declaration, a doctype, or a known element with both an
/// opening and a closing tag. A lone `<b>` in prose stays text, so normalized
/// output quoting a tag is not parsed again.
#[must_use]
pub fn looks_like_markup(input: &str) -> bool {
    let lower = input.to_ascii_lowercase();
    if lower.contains("<?xml") || lower.contains("<!doctype") {
        return true;
    }
    MARKUP_ELEMENTS
        .iter()
        .any(|name| has_open_tag(&lower, name) && lower.contains(&format!("</{name}>")))
}

fn has_open_tag(lower: &str, name: &str) -> bool {
    let needle = format!("<{name}");
    lower.match_indices(&needle).any(|(at, _)| {
        lower
            .as_bytes()
            .get(at + needle.len())
            .is_some_and(|next| matches!(next, b'>' | b'/') || next.is_ascii_whitespace())
    })
}

#[derive(Debug, Default)]
struct Extracted {
    /// Block texts, each followed by a blank line
    blocks: String,
    /// Every text node outside skipped elements
    fallback: String,
}

fn is_block(name: &[u8]) -> bool {
    name.eq_ignore_ascii_case(b"p") || name.eq_ignore_ascii_case(b"li")
}

fn is_skipped(name: &[u8]) -> bool {
    [b"script".as_slice(), b"style", b"head", b"template"]
        .iter()
        .any(|skip| name.eq_ignore_ascii_case(skip))
}

/// Elements whose end separates words in the fallback text.
fn breaks_fallback(name: &[u8]) -> bool {
    [
        b"p".as_slice(),
        b"li",
        b"div",
        b"section",
        b"article",
        b"blockquote",
        b"h1",
        b"h2",
        b"h3",
        b"h4",
        b"h5",
        b"h6",
        b"tr",
        b"td",
        b"th",
        b"dt",
        b"dd",
        b"figcaption",
        b"pre",
    ]
    .iter()
    .any(|tag| name.eq_ignore_ascii_case(tag))
}

fn is_line_break(name: &[u8]) -> bool {
    name.eq_ignore_ascii_case(b"br")
}

struct BlockCollector {
    out: Extracted,
    block: String,
    depth: usize,
    skipping: Option<Vec<u8>>,
}

impl BlockCollector {
    fn new() -> Self {
        Self {
            out: Extracted::default(),
            block: String::new(),
            depth: 0,
            skipping: None,
        }
    }

    fn text(&mut self, text: &str) {
        if self.skipping.is_some() {
            return;
        }
        if self.depth > 0 {
            self.block.push_str(text);
        }
        self.out.fallback.push_str(text);
    }

    fn start(&mut self, name: &[u8]) {
        if self.skipping.is_some() {
            return;
        }
        if is_skipped(name) {
            self.skipping = Some(name.to_ascii_lowercase());
        } else if is_block(name) {
            if self.depth > 0 {
                self.block.push(' ');
            }
            self.depth += 1;
        } else if is_line_break(name) {
            self.text(" ");
        }
    }

    fn end(&mut self, name: &[u8]) {
        if let Some(skipped) = &self.skipping {
            if name.eq_ignore_ascii_case(skipped) {
                self.skipping = None;
            }
            return;
        }
        if breaks_fallback(name) {
            self.out.fallback.push('\n');
        }
        if is_block(name) && self.depth > 0 {
            self.depth -= 1;
            if self.depth == 0 {
                self.flush_block();
            }
        }
    }

    fn flush_block(&mut self) {
        let collapsed = self.block.split_whitespace().collect::<Vec<_>>().join(" ");
        self.block.clear();
        if collapsed.is_empty() {
            return;
        }
        self.out.blocks.push_str(&collapsed);
        self.out.blocks.push_str("\n\n");
    }

    fn finish(mut self) -> Extracted {
        // Unclosed block at end of input still counts
        if !self.block.is_empty() {
            self.flush_block();
        }
        self.out
    }
}

fn extract_blocks(markup: &str) -> Extracted {
    let mut reader = Reader::from_str(markup);
    {
        let config = reader.config_mut();
        config.trim_text(false);
        config.check_end_names = false;
        config.allow_unmatched_ends = true;
        config.allow_dangling_amp = true;
    }

    let mut collector = BlockCollector::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => collector.start(e.local_name().as_ref()),
            Ok(Event::Empty(e)) => {
                if is_line_break(e.local_name().as_ref()) {
                    collector.text(" ");
                }
            }
            Ok(Event::End(e)) => collector.end(e.local_name().as_ref()),
            Ok(Event::Text(e)) => collector.text(&String::from_utf8_lossy(e.as_ref())),
            Ok(Event::CData(e)) => collector.text(&String::from_utf8_lossy(&e)),
            Ok(Event::GeneralRef(e)) => {
                let entity = String::from_utf8_lossy(e.as_ref());
                if let Some(resolved) = resolve_entity(&entity) {
                    collector.text(resolved.encode_utf8(&mut [0; 4]));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(
                    target: LOG_TARGET,
                    "Markup parse stopped at byte {}: {}",
                    reader.buffer_position(),
                    e
                );
                break;
            }
        }
    }

    collector.finish()
}

/// Resolve a character or named entity reference (without `&` and `;`).
fn resolve_entity(entity: &str) -> Option<char> {
    if let Some(numeric) = entity.strip_prefix('#') {
        let code = match numeric.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => numeric.parse().ok()?,
        };
        return char::from_u32(code);
    }

    let resolved = match entity {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "mdash" => '\u{2014}',
        "ndash" => '\u{2013}',
        "hellip" => '\u{2026}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201c}',
        "rdquo" => '\u{201d}',
        "laquo" => '\u{ab}',
        "raquo" => '\u{bb}',
        "copy" => '\u{a9}',
        "reg" => '\u{ae}',
        "trade" => '\u{2122}',
        "eacute" => '\u{e9}',
        _ => return None,
    };
    Some(resolved)
}

/// Whitespace and punctuation canonicalization shared by both entry points.
fn canonicalize(raw: &str) -> String {
    let unified = raw.replace("\r\n", "\n").replace('\r', "\n");

    // Single spaces inside lines, nothing at line edges
    let lines: Vec<String> = unified
        .split('\n')
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect();
    let joined = lines.join("\n");

    // At most one blank line between paragraphs
    let mut collapsed = String::with_capacity(joined.len());
    let mut newline_run = 0usize;
    for ch in joined.chars() {
        if ch == '\n' {
            newline_run += 1;
            if newline_run > 2 {
                continue;
            }
        } else {
            newline_run = 0;
        }
        collapsed.push(ch);
    }

    // Repair missing inter-sentence spacing
    let mut spaced = String::with_capacity(collapsed.len());
    let mut chars = collapsed.chars().peekable();
    while let Some(ch) = chars.next() {
        spaced.push(ch);
        if matches!(ch, '.' | '!' | '?')
            && chars.peek().is_some_and(|next| !next.is_whitespace())
        {
            spaced.push(' ');
        }
    }

    spaced.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_paragraph_blocks_joined_with_blank_line() {
        let input = "<p>Hello  world.</p><p>Next.See</p>";
        assert_eq!(normalize(input), "Hello world.\n\nNext. See");
    }

    #[test]
    fn test_headings_and_tables_discarded() {
        let input = r"<html><head><title>Ignored</title></head><body>
            <h1>Chapter One</h1>
            <p>First <em>paragraph</em> here.</p>
            <table><tr><td>cell</td></tr></table>
            <ul><li>Item one</li><li>Item two</li></ul>
        </body></html>";
        assert_eq!(
            normalize_markup(input),
            "First paragraph here.\n\nItem one\n\nItem two"
        );
    }

    #[test]
    fn test_fallback_to_document_text_without_blocks() {
        let input = "<div><h2>Only</h2><div>a heading and a div</div></div>";
        assert_eq!(normalize_markup(input), "Only\na heading and a div");
    }

    #[test]
    fn test_script_and_style_never_contribute() {
        let input = "<body><script>var x = 1;</script><style>p { color: red }</style><div>Body text</div></body>";
        assert_eq!(normalize_markup(input), "Body text");
    }

    #[test]
    fn test_head_with_void_meta_is_skipped() {
        let input = "<html><head><meta charset=\"utf-8\"><title>T</title></head><body><p>Kept</p></body></html>";
        assert_eq!(normalize_markup(input), "Kept");
    }

    #[test]
    fn test_entities_resolved() {
        let input = "<p>Fish &amp; chips&#160;&mdash; &#x41;BC</p>";
        assert_eq!(normalize_markup(input), "Fish & chips \u{2014} ABC");
    }

    #[test]
    fn test_newlines_inside_block_collapse() {
        let input = "<p>line one\n   line two</p>";
        assert_eq!(normalize_markup(input), "line one line two");
    }

    #[test]
    fn test_line_break_separates_words() {
        assert_eq!(normalize_markup("<p>one<br/>two</p>"), "one two");
    }

    #[test]
    fn test_nested_blocks_counted_once() {
        let input = "<ul><li>Outer<ul><li>inner</li></ul></li></ul>";
        assert_eq!(normalize_markup(input), "Outer inner");
    }

    #[test]
    fn test_unclosed_block_at_end_is_kept() {
        assert_eq!(normalize_markup("<p>Dangling text"), "Dangling text");
    }

    #[test]
    fn test_malformed_markup_keeps_text_so_far() {
        let input = "<p>Good paragraph.</p><p>Second <b attr=\"unterminated>";
        let result = normalize_markup(input);
        assert!(result.starts_with("Good paragraph."));
    }

    #[test]
    fn test_text_collapses_blank_lines() {
        let input = "First.\r\n\r\n\r\n\r\nSecond  line\t here\n\n\n";
        assert_eq!(normalize_text(input), "First.\n\nSecond line here");
    }

    #[test]
    fn test_text_space_inserted_after_sentence_end() {
        assert_eq!(normalize_text("Stop!Go?Yes.No"), "Stop! Go? Yes. No");
    }

    #[test]
    fn test_text_edges_of_lines_trimmed() {
        assert_eq!(normalize_text("  a  \n \n  b  "), "a\n\nb");
    }

    #[test]
    fn test_sniffing() {
        assert!(looks_like_markup("<p>x</p>"));
        assert!(looks_like_markup("<P class=\"first\">Hi</P>"));
        assert!(looks_like_markup("<?xml version=\"1.0\"?><html/>"));
        assert!(!looks_like_markup("a < b and c > d"));
        assert!(!looks_like_markup("plain text"));
        assert!(!looks_like_markup("Use the <b> tag for bold."));
        assert!(!looks_like_markup("<pre> is not <p>"));
        assert_eq!(normalize("3 < 4 is true."), "3 < 4 is true.");
    }

    #[test]
    fn test_escaped_tag_survives_second_pass() {
        let once = normalize("<p>Use the &lt;b&gt; tag for bold.</p>");
        assert_eq!(once, "Use the <b> tag for bold.");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn test_whitespace_only_input() {
        assert_eq!(normalize_text(" \n\t \n"), "");
        assert_eq!(normalize_markup("<p>   </p>"), "");
    }

    proptest! {
        #[test]
        fn prop_text_normalization_is_fixed_point(input in "\\PC*") {
            let once = normalize_text(&input);
            prop_assert_eq!(normalize_text(&once), once);
        }

        #[test]
        fn prop_markup_normalization_is_fixed_point(
            paragraphs in proptest::collection::vec("[a-zA-Z<>&;/ .!?\n]{0,40}", 0..6)
        ) {
            let markup: String = paragraphs
                .iter()
                .map(|p| {
                    let escaped = p.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;");
                    format!("<p>{escaped}</p>")
                })
                .collect();
            let once = normalize_markup(&markup);
            prop_assert_eq!(normalize(&once), once);
        }
    }
}
