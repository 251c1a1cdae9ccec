//! Conversion between byte offsets and (line, UTF-16 column) positions.

use crate::types::{Position, Range};

/// Line-start table over a borrowed text.
#[derive(Debug, Clone)]
pub struct LineIndex<'a> {
    text: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut line_starts = Vec::with_capacity(text.len() / 32 + 1);
        line_starts.push(0);
        line_starts.extend(memchr::memchr_iter(b'\n', text.as_bytes()).map(|nl| nl + 1));
        Self { text, line_starts }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Zero-based line containing `offset` (clamped to the text).
    pub fn line_of(&self, offset: usize) -> u32 {
        let offset = offset.min(self.text.len());
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        line as u32
    }

    /// Byte offset of the start of `line`.
    pub fn line_start(&self, line: u32) -> Option<usize> {
        self.line_starts.get(line as usize).copied()
    }

    /// End of `line`, excluding its newline.
    fn line_end(&self, line: usize) -> usize {
        match self.line_starts.get(line + 1) {
            Some(next) => next - 1,
            None => self.text.len(),
        }
    }

    /// Position of a byte offset. Offsets inside a multi-byte character
    /// resolve to the start of that character.
    pub fn position(&self, offset: usize) -> Position {
        let offset = offset.min(self.text.len());
        let line = self.line_of(offset);
        let start = self.line_starts[line as usize];
        let mut character = 0u32;
        for (idx, ch) in self.text[start..].char_indices() {
            if start + idx + ch.len_utf8() > offset {
                break;
            }
            character += ch.len_utf16() as u32;
        }
        Position::new(line, character)
    }

    /// Byte offset of a position. Characters past the end of the line clamp to
    /// the line end; lines past the end of the text yield `None`.
    pub fn offset(&self, position: Position) -> Option<usize> {
        let line = position.line as usize;
        let start = *self.line_starts.get(line)?;
        let end = self.line_end(line);
        let mut remaining = position.character as usize;
        for (idx, ch) in self.text[start..end].char_indices() {
            if remaining == 0 {
                return Some(start + idx);
            }
            remaining = remaining.saturating_sub(ch.len_utf16());
        }
        Some(end)
    }

    pub fn range(&self, start: usize, end: usize) -> Range {
        Range::new(self.position(start), self.position(end))
    }
}

/// Width of `text` in UTF-16 code units.
pub fn utf16_len(text: &str) -> u32 {
    text.chars().map(|c| c.len_utf16() as u32).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_round_trip_ascii() {
        let text = "hello\nworld\n";
        let index = LineIndex::new(text);
        assert_eq!(index.line_count(), 3);
        assert_eq!(index.position(0), Position::new(0, 0));
        assert_eq!(index.position(6), Position::new(1, 0));
        assert_eq!(index.position(9), Position::new(1, 3));
        assert_eq!(index.offset(Position::new(1, 3)), Some(9));
        assert_eq!(index.offset(Position::new(2, 0)), Some(12));
        assert_eq!(index.offset(Position::new(3, 0)), None);
    }

    #[test]
    fn columns_are_utf16() {
        // "é" is 2 bytes / 1 unit, "😀" is 4 bytes / 2 units.
        let text = "é😀x\n";
        let index = LineIndex::new(text);
        assert_eq!(index.position(2), Position::new(0, 1));
        assert_eq!(index.position(6), Position::new(0, 3));
        assert_eq!(index.offset(Position::new(0, 3)), Some(6));
        assert_eq!(utf16_len("é😀x"), 4);
    }

    #[test]
    fn characters_clamp_to_line_end() {
        let index = LineIndex::new("ab\ncd");
        assert_eq!(index.offset(Position::new(0, 40)), Some(2));
        assert_eq!(index.offset(Position::new(1, 40)), Some(5));
    }
}
