//! Text normalization applied before any facet sees the text

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Mojibake sequences produced by decoding UTF-8 as Windows-1252.
/// Longer sequences first so their prefixes do not match early.
const MOJIBAKE: &[(&str, &str)] = &[
    ("\u{e2}\u{20ac}\u{2122}", "'"),
    ("\u{e2}\u{20ac}\u{153}", "\""),
    ("\u{e2}\u{20ac}\u{201d}", "\u{2014}"),
    ("\u{e2}\u{20ac}\u{201c}", "\u{2013}"),
    ("\u{e2}\u{20ac}", "\""),
    ("\u{c3}\u{a9}", "\u{e9}"),
    ("\u{c3}\u{a8}", "\u{e8}"),
    ("\u{c3}\u{a2}", "\u{e2}"),
    ("\u{c3}\u{b4}", "\u{f4}"),
    ("\u{c3}\u{ae}", "\u{ee}"),
    ("\u{c3}\u{a7}", "\u{e7}"),
    ("\u{c3}\u{2030}", "\u{c9}"),
];

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).unwrap())
}

/// Normalize raw text for analysis.
///
/// Applied in order: NUL removal, mojibake repair, whitespace normalization,
/// quote normalization, control character removal, sentence spacing, trim.
pub fn preprocess(raw: &str) -> String {
    let text = raw.replace('\0', "");
    let text = fix_encoding_issues(&text);
    let text = normalize_whitespace(&text);
    let text = normalize_quotes(&text);
    let text = remove_control_characters(&text);
    let text = fix_sentence_spacing(&text);
    text.trim().to_string()
}

fn fix_encoding_issues(text: &str) -> String {
    let mut out = text.to_string();
    for (broken, fixed) in MOJIBAKE {
        if out.contains(broken) {
            out = out.replace(broken, fixed);
        }
    }
    out
}

fn normalize_whitespace(text: &str) -> String {
    static SPACES: OnceLock<Regex> = OnceLock::new();
    static BLANK_LINES: OnceLock<Regex> = OnceLock::new();
    static SPACE_BEFORE_PUNCT: OnceLock<Regex> = OnceLock::new();
    static NO_SPACE_AFTER_PUNCT: OnceLock<Regex> = OnceLock::new();

    let text = regex(&SPACES, r" +").replace_all(text, " ");
    let text = regex(&BLANK_LINES, r"\n\s*\n").replace_all(&text, "\n\n");
    let text = regex(&SPACE_BEFORE_PUNCT, r" +([.,!?;:])").replace_all(&text, "$1");
    let text = regex(&NO_SPACE_AFTER_PUNCT, r"([.,!?;:])([A-Za-z])").replace_all(&text, "$1 $2");
    text.into_owned()
}

fn normalize_quotes(text: &str) -> String {
    text.replace(['\u{201c}', '\u{201d}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
}

fn remove_control_characters(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\t' | '\r'))
        .collect()
}

fn fix_sentence_spacing(text: &str) -> String {
    static SENTENCE_GAP: OnceLock<Regex> = OnceLock::new();
    static COMMA_GAP: OnceLock<Regex> = OnceLock::new();

    // Horizontal whitespace only, paragraph breaks must survive
    let text = regex(&SENTENCE_GAP, r"([.!?])[ \t]*([A-Z])").replace_all(text, "$1 $2");
    let text = regex(&COMMA_GAP, r",([A-Za-z])").replace_all(&text, ", $1");
    text.into_owned()
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),
    #[error("Failed to decode text: {0}")]
    Decode(String),
}

/// Extract analyzable text from raw bytes of a declared type (`txt`, `md`).
pub fn extract_text(bytes: &[u8], declared_type: &str) -> Result<String, ExtractError> {
    let kind = declared_type.trim().trim_start_matches('.').to_lowercase();
    match kind.as_str() {
        "txt" | "text" | "md" | "markdown" => {
            let text = match std::str::from_utf8(bytes) {
                Ok(s) => s.to_string(),
                Err(e) => {
                    tracing::warn!("Invalid UTF-8 at byte {}, replacing undecodable bytes", e.valid_up_to());
                    String::from_utf8_lossy(bytes).into_owned()
                }
            };
            if text.trim().is_empty() && !bytes.is_empty() {
                return Err(ExtractError::Decode("no readable text".to_string()));
            }
            Ok(preprocess(&text))
        }
        other => Err(ExtractError::UnsupportedFormat(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_spaces_and_blank_lines() {
        let out = preprocess("Hello   world.\n\n\n\nNext   paragraph here.");
        assert_eq!(out, "Hello world.\n\nNext paragraph here.");
    }

    #[test]
    fn test_spacing_around_punctuation() {
        assert_eq!(preprocess("Wait ,what?Yes."), "Wait, what? Yes.");
        assert_eq!(preprocess("One.Two"), "One. Two");
    }

    #[test]
    fn test_quotes_and_control_chars() {
        let out = preprocess("\u{201c}Hi\u{201d} it\u{2019}s\u{7} fine\0.");
        assert_eq!(out, "\"Hi\" it's fine.");
    }

    #[test]
    fn test_mojibake_apostrophe() {
        assert_eq!(preprocess("don\u{e2}\u{20ac}\u{2122}t"), "don't");
        assert_eq!(preprocess("caf\u{c3}\u{a9}"), "caf\u{e9}");
    }

    #[test]
    fn test_paragraph_break_survives_sentence_spacing() {
        let out = preprocess("First sentence.\n\nSecond paragraph.");
        assert!(out.contains("\n\n"));
    }

    #[test]
    fn test_extract_text_formats() {
        assert_eq!(extract_text(b"Hello  there.", "txt").unwrap(), "Hello there.");
        assert_eq!(extract_text(b"# Title", ".MD").unwrap(), "# Title");
        assert!(matches!(
            extract_text(b"%PDF", "pdf"),
            Err(ExtractError::UnsupportedFormat(ext)) if ext == "pdf"
        ));
    }

    #[test]
    fn test_extract_text_lossy_utf8() {
        let out = extract_text(&[b'o', b'k', 0xff, b'!'], "txt").unwrap();
        assert!(out.starts_with("ok"));
    }
}
