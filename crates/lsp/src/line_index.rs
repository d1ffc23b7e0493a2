//! Byte offset <-> LSP position conversion.
//!
//! Everything below the protocol boundary works in byte offsets. LSP
//! positions count UTF-16 code units within a line, so conversion walks the
//! characters of a single line.

use lsp_types::{Position, Range};

use crate::error::ServiceError;

pub struct LineIndex<'a> {
    text: &'a str,
    /// Byte offset of the first character of every line.
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        LineIndex { text, line_starts }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Offsets past the end are clamped, and an offset inside a multi-byte
    /// character maps to the start of that character.
    pub fn position(&self, offset: usize) -> Position {
        let mut offset = offset.min(self.text.len());
        while !self.text.is_char_boundary(offset) {
            offset -= 1;
        }
        let line = self.line_starts.partition_point(|&start| start <= offset) - 1;
        let start = self.line_starts[line];
        let character = self.text[start..offset].encode_utf16().count();
        Position::new(line as u32, character as u32)
    }

    pub fn range(&self, start: usize, end: usize) -> Range {
        Range::new(self.position(start), self.position(end))
    }

    /// Byte offset of `position`. A column inside a surrogate pair maps to
    /// the start of that character.
    pub fn offset(&self, position: Position) -> Result<usize, ServiceError> {
        let out_of_bounds = || ServiceError::PositionOutOfBounds {
            line: position.line,
            character: position.character,
            lines: self.line_count(),
        };
        let line = position.line as usize;
        let start = *self.line_starts.get(line).ok_or_else(out_of_bounds)?;
        let end = self
            .line_starts
            .get(line + 1)
            .map_or(self.text.len(), |next| next - 1);

        let mut remaining = position.character as usize;
        let mut offset = start;
        for ch in self.text[start..end].chars() {
            if remaining == 0 {
                break;
            }
            let width = ch.len_utf16();
            if width > remaining {
                remaining = 0;
                break;
            }
            remaining -= width;
            offset += ch.len_utf8();
        }
        if remaining > 0 {
            return Err(out_of_bounds());
        }
        Ok(offset)
    }
}
