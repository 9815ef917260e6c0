use super::tree::Position;

/// Line start offsets of a document, for converting editor positions.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<u32>,
    len: u32,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            text.bytes()
                .enumerate()
                .filter(|(_, byte)| *byte == b'\n')
                .map(|(index, _)| index as u32 + 1),
        );
        Self {
            line_starts,
            len: text.len() as u32,
        }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Byte offset of `position`, or `None` past the end of its line.
    pub fn offset(&self, position: Position) -> Option<u32> {
        let start = *self.line_starts.get(position.line as usize)?;
        let end = self
            .line_starts
            .get(position.line as usize + 1)
            .map(|next| next - 1)
            .unwrap_or(self.len);
        let offset = start + position.character;
        (offset <= end).then_some(offset)
    }

    pub fn position(&self, offset: u32) -> Position {
        let offset = offset.min(self.len);
        let line = self.line_starts.partition_point(|start| *start <= offset) - 1;
        Position::new(line as u32, offset - self.line_starts[line])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_and_positions_agree() {
        let index = LineIndex::new("<?php\n$a = 1;\n\n$b;");

        assert_eq!(index.line_count(), 4);
        assert_eq!(index.offset(Position::new(1, 0)), Some(6));
        assert_eq!(index.offset(Position::new(3, 2)), Some(17));
        assert_eq!(index.position(6), Position::new(1, 0));
        assert_eq!(index.position(14), Position::new(2, 0));
    }

    #[test]
    fn test_out_of_range_positions() {
        let index = LineIndex::new("ab\ncd");

        assert_eq!(index.offset(Position::new(0, 3)), None);
        assert_eq!(index.offset(Position::new(5, 0)), None);
        assert_eq!(index.offset(Position::new(1, 2)), Some(5));
        assert_eq!(index.position(99), Position::new(1, 2));
    }
}
