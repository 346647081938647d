//! Source position tracking for parsed nodes.

/// A location within a source text.
///
/// Lines and columns are 0-indexed. Columns count Unicode scalar values, not
/// bytes.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Position {
    /// The byte offset of the position.
    pub offset: usize,
    /// The line number.
    pub line: usize,
    /// The column number.
    pub column: usize,
}

impl Position {
    /// Advances this position over `text`, tracking line breaks.
    pub(crate) fn advance(&mut self, text: &str) {
        self.offset += text.len();
        for c in text.chars() {
            if c == '\n' {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += 1;
            }
        }
    }
}

impl core::fmt::Display for Position {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.line + 1, self.column + 1)
    }
}

/// A range of text within a source string.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct SourceSpan {
    /// The position of the first character of the span.
    pub start: Position,
    /// The position after the last character of the span.
    pub end: Position,
}

impl SourceSpan {
    /// Creates a new span.
    #[inline]
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Returns true if this span is empty.
    #[inline]
    pub fn is_empty(self) -> bool {
        self.start.offset >= self.end.offset
    }

    /// The length of the span, in bytes.
    #[inline]
    pub fn len(self) -> usize {
        self.end.offset - self.start.offset
    }

    /// Creates a span that encloses both `self` and `other`.
    #[inline]
    pub fn merge(self, other: SourceSpan) -> SourceSpan {
        SourceSpan {
            start: if self.start.offset <= other.start.offset {
                self.start
            } else {
                other.start
            },
            end: if self.end.offset >= other.end.offset {
                self.end
            } else {
                other.end
            },
        }
    }

    #[inline]
    /// Converts the span into a range that can be used for string indexing.
    pub fn into_range(self) -> core::ops::Range<usize> {
        self.start.offset..self.end.offset
    }
}
