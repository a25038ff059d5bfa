//! Text position utilities for converting byte offsets to line/column positions.

use serde::Serialize;

/// A zero-indexed line/column position.
///
/// Columns count characters, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct LineCol {
    pub line: u32,
    pub column: u32,
}

/// Precomputed line starts for one source text.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<u32>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        Self {
            line_starts: compute_line_starts(source),
        }
    }

    /// Zero-indexed line containing `offset`.
    pub fn line(&self, offset: u32) -> u32 {
        match self.line_starts.binary_search(&offset) {
            Ok(line) => line as u32,
            Err(line) => line.saturating_sub(1) as u32,
        }
    }

    /// Convert a byte offset to a line/column position.
    ///
    /// Handles UTF-8 correctly by counting characters, not bytes.
    pub fn line_col(&self, source: &str, offset: u32) -> LineCol {
        let line = self.line(offset);
        let start = self.line_starts[line as usize] as usize;
        let end = (offset as usize).min(source.len());
        let column = source
            .get(start..end)
            .map(|text| text.chars().count() as u32)
            .unwrap_or(0);
        LineCol { line, column }
    }

    /// Number of lines in the indexed text.
    pub fn len(&self) -> usize {
        self.line_starts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.line_starts.is_empty()
    }
}

/// Compute line start offsets for a source string.
fn compute_line_starts(source: &str) -> Vec<u32> {
    let mut starts = vec![0];
    for (i, c) in source.char_indices() {
        if c == '\n' {
            starts.push((i + 1) as u32);
        }
    }
    starts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_col_simple() {
        let text = "hello\nworld";
        let index = LineIndex::new(text);
        assert_eq!(index.line_col(text, 0), LineCol { line: 0, column: 0 });
        assert_eq!(index.line_col(text, 5), LineCol { line: 0, column: 5 });
        assert_eq!(index.line_col(text, 6), LineCol { line: 1, column: 0 });
        assert_eq!(index.line_col(text, 11), LineCol { line: 1, column: 5 });
    }

    #[test]
    fn test_columns_count_chars() {
        let text = "let é = f();";
        let index = LineIndex::new(text);
        let offset = text.find('f').unwrap() as u32;
        assert_eq!(index.line_col(text, offset), LineCol { line: 0, column: 8 });
    }

    #[test]
    fn test_line_count() {
        assert_eq!(LineIndex::new("a\nb\nc").len(), 3);
        assert_eq!(LineIndex::new("").len(), 1);
    }
}
