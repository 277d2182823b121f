//! Text segmentation strategies.
//!
//! This module provides the [`Segmenter`] trait and two implementations:
//!
//! - [`RecursiveSegmenter`] — prefers paragraph, then sentence, then word
//!   breakpoints, falling back to a hard character cut
//! - [`FixedSizeSegmenter`] — hard cuts at a fixed character stride
//!
//! Sizes are counted in characters (Unicode scalar values), never bytes, so
//! a chunk boundary can never split a multi-byte character. Both strategies
//! are deterministic and make consecutive chunks share exactly `overlap`
//! characters: stripping the first `overlap` characters from every chunk but
//! the first and concatenating reconstructs the input.

use tracing::debug;

use crate::config::{RagConfig, validate_chunking};
use crate::error::Result;

/// A strategy for splitting text into overlapping chunks.
pub trait Segmenter: Send + Sync {
    /// Split text into chunks. Returns an empty `Vec` for empty text.
    fn segment(&self, text: &str) -> Vec<String>;
}

/// Split `text` with a [`RecursiveSegmenter`].
///
/// # Errors
///
/// Returns [`RagError::ConfigError`](crate::RagError::ConfigError) if
/// `chunk_size` is zero or `overlap >= chunk_size`.
pub fn segment(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>> {
    Ok(RecursiveSegmenter::new(chunk_size, overlap)?.segment(text))
}

/// Splits text into chunks of at most `chunk_size` characters, ending each
/// chunk at the latest natural breakpoint available.
///
/// Breakpoints are tried in order: paragraph (`\n\n`), sentence end
/// (`.`, `!`, `?` next to whitespace), word (any whitespace edge). When the
/// window holds none of them the chunk is cut at exactly `chunk_size`.
/// The next chunk starts `overlap` characters before the previous cut.
///
/// # Example
///
/// ```rust,ignore
/// use docrag::{RecursiveSegmenter, Segmenter};
///
/// let segmenter = RecursiveSegmenter::new(1000, 200)?;
/// let chunks = segmenter.segment(&text);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveSegmenter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveSegmenter {
    /// Create a new `RecursiveSegmenter`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` — maximum number of characters per chunk
    /// * `chunk_overlap` — number of characters shared by consecutive chunks
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`](crate::RagError::ConfigError) if
    /// `chunk_size` is zero or `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate_chunking(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }

    /// Create a segmenter from the chunking parameters of a [`RagConfig`].
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }
}

impl Default for RecursiveSegmenter {
    fn default() -> Self {
        let config = RagConfig::default();
        Self { chunk_size: config.chunk_size, chunk_overlap: config.chunk_overlap }
    }
}

#[derive(Debug, Clone, Copy)]
enum Breakpoint {
    Paragraph,
    Sentence,
    Word,
}

const BREAKPOINTS: [Breakpoint; 3] =
    [Breakpoint::Paragraph, Breakpoint::Sentence, Breakpoint::Word];

fn is_sentence_end(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

impl Breakpoint {
    /// Whether cutting between `chars[pos - 1]` and `chars[pos]` lands on this
    /// kind of breakpoint. Requires `0 < pos < chars.len()`.
    fn matches(self, chars: &[char], pos: usize) -> bool {
        let before = chars[pos - 1];
        let after = chars[pos];
        match self {
            Breakpoint::Paragraph => {
                let after_blank_line = before == '\n' && pos >= 2 && chars[pos - 2] == '\n';
                let before_blank_line =
                    after == '\n' && chars.get(pos + 1) == Some(&'\n') && before != '\n';
                after_blank_line || before_blank_line
            }
            Breakpoint::Sentence => {
                let after_terminator = is_sentence_end(before) && after.is_whitespace();
                let after_gap = before.is_whitespace()
                    && !after.is_whitespace()
                    && pos >= 2
                    && is_sentence_end(chars[pos - 2]);
                after_terminator || after_gap
            }
            Breakpoint::Word => before.is_whitespace() || after.is_whitespace(),
        }
    }
}

/// Find the latest cut position in `lo..=hi`, trying coarser breakpoints first.
fn find_breakpoint(chars: &[char], lo: usize, hi: usize) -> Option<usize> {
    BREAKPOINTS
        .iter()
        .find_map(|kind| (lo..=hi).rev().find(|&pos| kind.matches(chars, pos)))
}

impl Segmenter for RecursiveSegmenter {
    fn segment(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            return Vec::new();
        }

        let mut chunks = Vec::new();
        let mut start = 0;
        loop {
            let limit = start + self.chunk_size;
            if limit >= chars.len() {
                chunks.push(chars[start..].iter().collect());
                break;
            }
            // Cutting at or before `start + overlap` would stall the walk.
            let end = find_breakpoint(&chars, start + self.chunk_overlap + 1, limit)
                .unwrap_or(limit);
            chunks.push(chars[start..end].iter().collect());
            start = end - self.chunk_overlap;
        }

        debug!(
            chunk_count = chunks.len(),
            chunk_size = self.chunk_size,
            chunk_overlap = self.chunk_overlap,
            "segmented text"
        );
        chunks
    }
}

/// Splits text into fixed-size chunks by character count with configurable overlap.
///
/// Each chunk starts `chunk_size - chunk_overlap` characters after the
/// previous one. The last chunk is the first one that reaches the end of the
/// text and may be shorter than `chunk_size`.
///
/// # Example
///
/// ```rust,ignore
/// use docrag::{FixedSizeSegmenter, Segmenter};
///
/// let segmenter = FixedSizeSegmenter::new(256, 50)?;
/// let chunks = segmenter.segment(&text);
/// ```
#[derive(Debug, Clone)]
pub struct FixedSizeSegmenter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeSegmenter {
    /// Create a new `FixedSizeSegmenter`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` — maximum number of characters per chunk
    /// * `chunk_overlap` — number of characters shared by consecutive chunks
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`](crate::RagError::ConfigError) if
    /// `chunk_size` is zero or `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate_chunking(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }
}

impl Segmenter for FixedSizeSegmenter {
    fn segment(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let step = self.chunk_size - self.chunk_overlap;
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < chars.len() {
            let end = (start + self.chunk_size).min(chars.len());
            chunks.push(chars[start..end].iter().collect());
            if end == chars.len() {
                break;
            }
            start += step;
        }

        chunks
    }
}
