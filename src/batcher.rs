//! Fixed-size batching of parsed records.

use crate::error::{PipelineError, Result};
use crate::parser::RawRecord;
use std::mem;
use tracing::debug;

/// Up to `batch_size` raw records destined for one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBatch {
    /// Zero-based, gap-free batch number.
    pub index: usize,
    pub records: Vec<RawRecord>,
}

/// Iterator adapter grouping records into [`RawBatch`]es of exactly
/// `batch_size`, the last one possibly shorter but never empty.
///
/// Upstream is pulled only while the current batch is filling. When an
/// upstream error arrives it is yielded (a malformed record is tagged with the
/// index of the batch being filled) and the records collected so far stay
/// available through [`Batches::take_partial`].
pub struct Batches<I> {
    records: I,
    batch_size: usize,
    next_index: usize,
    pending: Vec<RawRecord>,
    done: bool,
}

impl<I> Batches<I> {
    /// # Errors
    /// [`PipelineError::Config`] when `batch_size` is zero.
    pub fn new(records: I, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(PipelineError::Config("batch_size must be positive".into()));
        }
        Ok(Self {
            records,
            batch_size,
            next_index: 0,
            pending: Vec::new(),
            done: false,
        })
    }

    /// Index the next emitted batch will carry.
    #[must_use]
    pub fn next_index(&self) -> usize {
        self.next_index
    }

    /// Records collected for the batch in progress.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Take the incomplete batch left behind by an upstream failure.
    ///
    /// It is numbered as the next batch, so numbering stays gap-free.
    pub fn take_partial(&mut self) -> Option<RawBatch> {
        if self.pending.is_empty() {
            return None;
        }
        Some(self.emit())
    }

    pub fn inner(&self) -> &I {
        &self.records
    }

    fn emit(&mut self) -> RawBatch {
        let index = self.next_index;
        self.next_index += 1;
        RawBatch {
            index,
            records: mem::take(&mut self.pending),
        }
    }
}

impl<I> Iterator for Batches<I>
where
    I: Iterator<Item = Result<RawRecord>>,
{
    type Item = Result<RawBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        while self.pending.len() < self.batch_size {
            match self.records.next() {
                Some(Ok(record)) => self.pending.push(record),
                Some(Err(mut e)) => {
                    self.done = true;
                    if let PipelineError::MalformedRecordLine { batch, .. } = &mut e {
                        *batch = Some(self.next_index);
                    }
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    break;
                }
            }
        }
        if self.pending.is_empty() {
            return None;
        }
        let batch = self.emit();
        debug!(batch = batch.index, records = batch.records.len(), "batch assembled");
        Some(Ok(batch))
    }
}
