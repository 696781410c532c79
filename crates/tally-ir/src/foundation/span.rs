//! Source location tracking for diagnostics.
//!
//! A formula is short, but diagnostics still want precise locations, so
//! spans stay compact and the heavy lifting (line lookup, snippets) lives
//! in [`SourceMap`].
//!
//! # Design
//!
//! - `Span` — byte range into one source, with a cached start line
//! - `SourceMap` — all sources of a compilation, lookup by `Span`
//! - `SourceFile` — one source with a line-start index
//!
//! # Examples
//!
//! ```
//! # use tally_ir::foundation::span::*;
//! let mut map = SourceMap::new();
//! let file_id = map.add_source("formula1".to_string(), "Name & Age".to_string());
//! let span = Span::new(file_id, 0, 4, 1);
//!
//! assert_eq!(map.snippet(&span), "Name");
//! assert_eq!(map.line_col(&span), (1, 1));
//! ```

use serde::{Deserialize, Serialize};

/// Compact source location reference.
///
/// Points to a byte range in a source with a cached 1-based line number so
/// production error paths avoid a line lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    /// Index into `SourceMap` sources
    pub file_id: u16,
    /// Byte offset of start position
    pub start: u32,
    /// Byte offset of end position (exclusive)
    pub end: u32,
    /// Cached line number (1-based) of the start position
    pub start_line: u16,
}

impl Span {
    /// Create a new span.
    pub fn new(file_id: u16, start: u32, end: u32, start_line: u16) -> Self {
        Self {
            file_id,
            start,
            end,
            start_line,
        }
    }

    /// Create a zero-length span at the start of a source.
    pub fn zero(file_id: u16) -> Self {
        Self::new(file_id, 0, 0, 1)
    }

    /// Check if this span is zero-length.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Length of this span in bytes.
    ///
    /// # Panics
    /// Panics if end < start (malformed span).
    pub fn len(&self) -> u32 {
        assert!(
            self.end >= self.start,
            "malformed span: end ({}) < start ({})",
            self.end,
            self.start
        );
        self.end - self.start
    }

    /// Span covering both `self` and `other`.
    ///
    /// # Panics
    /// Panics if the spans come from different sources.
    pub fn merge(&self, other: &Span) -> Span {
        assert_eq!(
            self.file_id, other.file_id,
            "cannot merge spans from different sources"
        );
        Span {
            file_id: self.file_id,
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            start_line: self.start_line.min(other.start_line),
        }
    }
}

/// All sources of one compilation.
///
/// Formulas arrive as named sources (a formula column, a named formula, a
/// test snippet), each indexed by the `file_id` their spans carry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceMap {
    sources: Vec<SourceFile>,
}

/// A single source with a line-start index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    /// Display name of the source (formula name, file path, ...)
    pub name: String,
    /// Original source text
    pub text: String,
    /// Byte offsets of each line start, with an EOF sentinel at the end
    line_starts: Vec<u32>,
}

impl SourceMap {
    /// Create an empty source map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source and return its id.
    pub fn add_source(&mut self, name: String, text: String) -> u16 {
        let file_id = self.sources.len();
        assert!(file_id < u16::MAX as usize, "too many sources");
        self.sources.push(SourceFile::new(name, text));
        file_id as u16
    }

    /// The source a span points into.
    pub fn source(&self, span: &Span) -> &SourceFile {
        &self.sources[span.file_id as usize]
    }

    /// The text a span covers.
    pub fn snippet(&self, span: &Span) -> &str {
        let source = self.source(span);
        &source.text[span.start as usize..span.end as usize]
    }

    /// The (line, column) of a span's start, both 1-based.
    pub fn line_col(&self, span: &Span) -> (u32, u32) {
        self.source(span).line_col(span.start)
    }

    /// Number of sources in this map.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Check if the map holds no sources.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl SourceFile {
    /// Create a source and compute its line index.
    pub fn new(name: String, text: String) -> Self {
        let line_starts = line_starts(&text);
        Self {
            name,
            text,
            line_starts,
        }
    }

    /// The (line, column) of a byte offset, both 1-based.
    ///
    /// # Panics
    /// Panics if the offset is beyond EOF.
    pub fn line_col(&self, offset: u32) -> (u32, u32) {
        assert!(
            offset <= self.text.len() as u32,
            "offset {} is beyond EOF (len = {})",
            offset,
            self.text.len()
        );
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx.max(1) - 1,
        };
        let line = (line_idx + 1) as u32;
        let col = (offset - self.line_starts[line_idx]) + 1;
        (line, col)
    }

    /// Text of a 1-based line, or None when out of bounds.
    pub fn line_text(&self, line: u32) -> Option<&str> {
        if line == 0 || line as usize >= self.line_starts.len() {
            return None;
        }
        let idx = (line - 1) as usize;
        let start = self.line_starts[idx] as usize;
        let end = self.line_starts[idx + 1] as usize;
        Some(&self.text[start..end])
    }
}

/// Byte offsets of line starts, with an EOF sentinel appended.
fn line_starts(text: &str) -> Vec<u32> {
    let mut starts = vec![0];
    for (idx, ch) in text.char_indices() {
        if ch == '\n' {
            starts.push((idx + 1) as u32);
        }
    }
    if starts.last() != Some(&(text.len() as u32)) {
        starts.push(text.len() as u32);
    }
    starts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_basics() {
        let span = Span::new(0, 5, 9, 1);
        assert_eq!(span.len(), 4);
        assert!(!span.is_empty());
        assert!(Span::zero(0).is_empty());
    }

    #[test]
    fn span_merge_covers_both() {
        let a = Span::new(0, 4, 10, 1);
        let b = Span::new(0, 8, 20, 2);
        let merged = a.merge(&b);
        assert_eq!((merged.start, merged.end), (4, 20));
        assert_eq!(merged.start_line, 1);
    }

    #[test]
    #[should_panic(expected = "different sources")]
    fn span_merge_rejects_foreign_source() {
        let a = Span::new(0, 0, 1, 1);
        let b = Span::new(1, 0, 1, 1);
        let _ = a.merge(&b);
    }

    #[test]
    #[should_panic(expected = "malformed span")]
    fn span_len_rejects_inverted() {
        let _ = Span::new(0, 10, 4, 1).len();
    }

    #[test]
    fn source_map_lookup() {
        let mut map = SourceMap::new();
        let id = map.add_source("f".into(), "Name & Age\nAge * 2".into());
        let span = Span::new(id, 11, 14, 2);

        assert_eq!(map.snippet(&span), "Age");
        assert_eq!(map.line_col(&span), (2, 1));
        assert_eq!(map.source(&span).name, "f");
    }

    #[test]
    fn line_text_handles_bounds() {
        let source = SourceFile::new("f".into(), "ab\ncd".into());
        assert_eq!(source.line_text(1), Some("ab\n"));
        assert_eq!(source.line_text(2), Some("cd"));
        assert_eq!(source.line_text(3), None);
        assert_eq!(source.line_text(0), None);
    }

    #[test]
    fn line_col_at_boundaries() {
        let source = SourceFile::new("f".into(), "ab\ncd\n".into());
        assert_eq!(source.line_col(0), (1, 1));
        assert_eq!(source.line_col(3), (2, 1));
        assert_eq!(source.line_col(4), (2, 2));
    }
}
