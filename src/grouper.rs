//! Splits a line stream into records at blank-line sentinels.

use crate::error::Result;
use crate::io::lines::{RawLine, is_sentinel};

/// The content lines of one source record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewGroup {
    /// Zero-based ordinal of this record in the source.
    pub position: u64,
    /// Non-sentinel lines, terminators included.
    pub lines: Vec<RawLine>,
}

/// Iterator adapter yielding one [`ReviewGroup`] per maximal run of
/// non-sentinel lines.
///
/// Runs of sentinels collapse into a single boundary and end of input closes
/// the last group. Only the group being assembled is buffered. An upstream
/// error is yielded in place and ends the iteration.
pub struct RecordGroups<I> {
    lines: I,
    next_position: u64,
    done: bool,
}

impl<I> RecordGroups<I> {
    pub fn new(lines: I) -> Self {
        Self {
            lines,
            next_position: 0,
            done: false,
        }
    }

    pub fn inner(&self) -> &I {
        &self.lines
    }
}

/// Group `lines` into records.
pub fn group<I>(lines: I) -> RecordGroups<I::IntoIter>
where
    I: IntoIterator<Item = Result<RawLine>>,
{
    RecordGroups::new(lines.into_iter())
}

impl<I> Iterator for RecordGroups<I>
where
    I: Iterator<Item = Result<RawLine>>,
{
    type Item = Result<ReviewGroup>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut lines = Vec::new();
        loop {
            match self.lines.next() {
                Some(Ok(line)) if is_sentinel(&line) => {
                    if !lines.is_empty() {
                        break;
                    }
                }
                Some(Ok(line)) => lines.push(line),
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    if lines.is_empty() {
                        return None;
                    }
                    break;
                }
            }
        }
        let position = self.next_position;
        self.next_position += 1;
        Some(Ok(ReviewGroup { position, lines }))
    }
}
