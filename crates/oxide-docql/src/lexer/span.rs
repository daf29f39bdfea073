//! Byte ranges into the SQL text a token was read from.

/// A half-open byte range `start..end`.
///
/// Rewrites copy untouched SQL through by slicing between spans, so offsets
/// always fall on `char` boundaries of the original input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// First byte of the token.
    pub start: usize,
    /// One past the last byte.
    pub end: usize,
}

impl Span {
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Returns the text under this span.
    #[must_use]
    pub fn slice<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }
}
