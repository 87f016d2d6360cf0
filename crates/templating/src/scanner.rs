//! Block extent scanning.

use std::ops::Range;

use crate::error::{RenderError, RenderResult};
use crate::syntax::Syntax;

/// One header (or continuation) and the body lines it governs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Statement text after the marker, trimmed.
    pub statement: String,
    /// 0-based index of the header or continuation line.
    pub header_line: usize,
    /// Body lines, excluding the header and the next marker.
    pub body: Range<usize>,
}

/// Segmentation of one block: the begin segment, then one segment per
/// continuation at depth 1, and the index of the closing end line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockExtent {
    pub segments: Vec<Segment>,
    pub end: usize,
}

/// Finds where a block ends, honouring nested blocks.
#[derive(Debug, Clone, Copy)]
pub struct StatementBlockScanner<'s> {
    syntax: &'s Syntax,
}

impl<'s> StatementBlockScanner<'s> {
    pub fn new(syntax: &'s Syntax) -> Self {
        Self { syntax }
    }

    /// Scan the block whose begin line is `lines[begin]`, never looking at
    /// `lines[limit..]`.
    ///
    /// An end marker closes the innermost open block; a nested begin opens
    /// one; a continuation only splits the block when no nested block is
    /// open.
    pub fn scan(&self, lines: &[String], begin: usize, limit: usize) -> RenderResult<BlockExtent> {
        let limit = limit.min(lines.len());
        let statement = lines
            .get(begin)
            .and_then(|line| self.syntax.begin_statement(line))
            .ok_or_else(|| RenderError::invalid_statement(begin + 1, "not a block begin line"))?;

        let mut segments = Vec::new();
        let mut current = (statement.to_string(), begin);
        let mut body_start = begin + 1;
        let mut nesting = 1usize;

        for (i, line) in lines.iter().enumerate().take(limit).skip(begin + 1) {
            if self.syntax.is_end(line) {
                nesting -= 1;
                if nesting == 0 {
                    segments.push(Segment {
                        statement: current.0,
                        header_line: current.1,
                        body: body_start..i,
                    });
                    return Ok(BlockExtent { segments, end: i });
                }
            } else if self.syntax.is_begin(line) {
                nesting += 1;
            } else if nesting == 1 {
                if let Some(next) = self.syntax.continuation_statement(line) {
                    let (statement, header_line) =
                        std::mem::replace(&mut current, (next.to_string(), i));
                    segments.push(Segment {
                        statement,
                        header_line,
                        body: body_start..i,
                    });
                    body_start = i + 1;
                }
            }
        }

        Err(RenderError::UnterminatedBlock { line: begin + 1 })
    }
}
