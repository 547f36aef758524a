//! Source spans.
//!
//! Spans are half-open byte ranges `[start, end)` over UTF-8 source text.
//! Offsets are `u32` byte offsets from the start of the owning document;
//! conversion to editor positions (line + UTF-16 character) happens at the
//! external boundary via [`crate::LineIndex`].

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// A half-open byte span `[start, end)` within a known document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TextSpan {
    /// Start byte offset, inclusive.
    pub start: u32,
    /// End byte offset, exclusive.
    pub end: u32,
}

impl TextSpan {
    /// Create a new span. Debug-asserts `start <= end`.
    #[inline]
    pub const fn new(start: u32, end: u32) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    /// The empty span at an offset.
    #[inline]
    pub const fn empty(offset: u32) -> Self {
        Self {
            start: offset,
            end: offset,
        }
    }

    /// Length in bytes.
    #[inline]
    pub const fn len(&self) -> u32 {
        self.end - self.start
    }

    /// Whether the span covers zero bytes.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether `offset` falls inside the span (half-open).
    #[inline]
    pub const fn covers(&self, offset: u32) -> bool {
        self.start <= offset && offset < self.end
    }

    /// Whether `other` lies entirely within this span.
    #[inline]
    pub const fn contains_span(&self, other: TextSpan) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Reorder an inverted span and clamp it to `max_len`.
    pub fn normalize(self, max_len: u32) -> Self {
        let (mut start, mut end) = (self.start, self.end);
        if start > end {
            std::mem::swap(&mut start, &mut end);
        }
        Self {
            start: start.min(max_len),
            end: end.min(max_len),
        }
    }

    /// Shift both ends by `delta` bytes.
    #[inline]
    pub const fn shifted(self, delta: u32) -> Self {
        Self {
            start: self.start + delta,
            end: self.end + delta,
        }
    }

    /// Slice `text` with this span. Returns `""` when out of bounds rather
    /// than panicking; spans are produced from the same text they index.
    pub fn slice<'t>(&self, text: &'t str) -> &'t str {
        text.get(self.start as usize..self.end as usize).unwrap_or("")
    }

    /// Shrink the span so it covers no leading or trailing ASCII whitespace
    /// of `text`. An all-whitespace span collapses to its start.
    pub fn trim_whitespace(self, text: &str) -> Self {
        let slice = self.slice(text);
        if slice.is_empty() {
            return self;
        }
        let trimmed_start = slice.len() - slice.trim_start().len();
        let trimmed_end = slice.len() - slice.trim_end().len();
        if trimmed_start as u32 + trimmed_end as u32 >= self.len() {
            return Self::empty(self.start + trimmed_start as u32);
        }
        Self {
            start: self.start + trimmed_start as u32,
            end: self.end - trimmed_end as u32,
        }
    }
}

/// A [`TextSpan`] tagged with the document it indexes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceSpan {
    /// The span within `file`.
    pub span: TextSpan,
    /// Normalized document URI. `None` inside a single-document context.
    pub file: Option<CompactString>,
}

impl SourceSpan {
    /// Create a span without a file tag.
    #[inline]
    pub fn local(span: TextSpan) -> Self {
        Self { span, file: None }
    }

    /// Create a span tagged with a document URI.
    pub fn in_file(span: TextSpan, file: impl Into<CompactString>) -> Self {
        Self {
            span,
            file: Some(file.into()),
        }
    }

    /// Drop the file tag.
    #[inline]
    pub fn strip_file(mut self) -> Self {
        self.file = None;
        self
    }
}
