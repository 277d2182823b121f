//! Text extraction from uploaded document bytes.

/// Turns a document's raw bytes into text.
///
/// Extraction failures are reported as an empty string, which indexing
/// treats as [`RagError::EmptyDocument`](crate::RagError::EmptyDocument).
/// Format-specific extractors (PDF and the like) live outside this crate.
pub trait TextExtractor: Send + Sync {
    /// Extract the text content of `source`.
    fn extract_text(&self, source: &[u8]) -> String;
}

/// Extracts text from UTF-8 bytes, replacing invalid sequences.
///
/// Strips a leading byte-order mark and NUL characters. Input that holds
/// nothing but whitespace extracts to an empty string.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract_text(&self, source: &[u8]) -> String {
        let text = String::from_utf8_lossy(source);
        let text = text.strip_prefix('\u{feff}').unwrap_or(&text);
        let text: String = text.chars().filter(|c| *c != '\0').collect();
        if text.trim().is_empty() { String::new() } else { text }
    }
}
