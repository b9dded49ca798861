//! Byte spans into one source file's text.

/// Half-open byte range `[start, end)` into a source string.
///
/// Spans stay as raw offsets for the whole compilation; they are
/// converted to a line and column only when an error is raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Span {
        Span { start, end }
    }

    /// Smallest span covering both `self` and `other`.
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}
