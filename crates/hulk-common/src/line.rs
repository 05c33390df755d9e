use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

/// A 1-based source line.
///
/// Line `0` is reserved for synthetic nodes (built-ins, nodes created by a
/// driver without source text). It never maps to a byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Line(pub u32);

impl Line {
    /// The line used for nodes that have no source position.
    pub const SYNTHETIC: Line = Line(0);

    pub fn new(line: u32) -> Self {
        Line(line)
    }

    /// Whether this line points into real source text.
    pub fn is_synthetic(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for Line {
    fn from(line: u32) -> Self {
        Line(line)
    }
}

/// Pre-computed index of line start positions.
///
/// Constructed once per source file, then used to turn a [`Line`] into the
/// byte range covering that line (without its trailing newline), or a byte
/// offset back into a line.
#[derive(Debug)]
pub struct LineIndex {
    /// Byte offset of the start of each line. The first entry is always 0.
    line_starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    /// Build a line index by scanning the source text for newline characters.
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, byte) in source.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self {
            line_starts,
            len: source.len(),
        }
    }

    /// Byte range of the given line, excluding the newline.
    ///
    /// Returns `None` for synthetic lines and lines past the end of the source.
    pub fn line_range(&self, line: Line) -> Option<Range<usize>> {
        if line.is_synthetic() {
            return None;
        }
        let idx = (line.0 - 1) as usize;
        let start = *self.line_starts.get(idx)?;
        let end = match self.line_starts.get(idx + 1) {
            Some(next) => next - 1,
            None => self.len,
        };
        Some(start..end.max(start))
    }

    /// The line containing a byte offset.
    pub fn line_of(&self, offset: usize) -> Line {
        let idx = self.line_starts.partition_point(|&start| start <= offset);
        Line(idx.max(1) as u32)
    }

    /// Number of lines in the source.
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_line_has_no_range() {
        let idx = LineIndex::new("let x = 1 in x");
        assert!(Line::SYNTHETIC.is_synthetic());
        assert_eq!(idx.line_range(Line::SYNTHETIC), None);
    }

    #[test]
    fn line_range_single_line() {
        let idx = LineIndex::new("hello");
        assert_eq!(idx.line_range(Line(1)), Some(0..5));
        assert_eq!(idx.line_range(Line(2)), None);
    }

    #[test]
    fn line_range_multiple_lines() {
        let src = "hello\nworld\nfoo";
        let idx = LineIndex::new(src);
        assert_eq!(idx.line_range(Line(1)), Some(0..5));
        assert_eq!(&src[idx.line_range(Line(2)).unwrap()], "world");
        assert_eq!(&src[idx.line_range(Line(3)).unwrap()], "foo");
    }

    #[test]
    fn empty_line_range() {
        let src = "a\n\nb";
        let idx = LineIndex::new(src);
        assert_eq!(idx.line_range(Line(2)), Some(2..2));
    }

    #[test]
    fn line_of_offset() {
        let idx = LineIndex::new("ab\ncd");
        assert_eq!(idx.line_of(0), Line(1));
        assert_eq!(idx.line_of(2), Line(1));
        assert_eq!(idx.line_of(3), Line(2));
        assert_eq!(idx.line_count(), 2);
    }
}
