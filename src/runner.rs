//! Composes the stages into one pull-driven conversion run.
//!
//! ```text
//! bytes -> LineSource -> RecordGroups -> ParsedRecords -> Batches
//!       -> normalize_batch -> BatchSink
//! ```
//!
//! Each stage is an iterator advanced only when the next one asks for an
//! item, so at any moment the run holds one record group, one batch in
//! progress, and one artifact being written.

use crate::batcher::{Batches, RawBatch};
use crate::error::{PipelineError, Result, RunError};
use crate::grouper::group;
use crate::io::compression::CodecRegistry;
use crate::io::lines::LineSource;
use crate::normalize::normalize_batch;
use crate::parser::{MalformedPolicy, ParsedRecords};
use crate::schema::Schema;
use crate::sink::BatchSink;
use std::io::{BufRead, Read};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Records per artifact when nothing else is configured.
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Progress signal emitted after each artifact is durably written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchWritten {
    pub index: usize,
    pub records: usize,
    pub path: PathBuf,
}

/// Totals of a successful run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub batches_written: usize,
    pub records_written: usize,
    /// NUL-prefixed input lines dropped by the line source.
    pub skipped_null_lines: u64,
    /// Malformed records dropped under [`MalformedPolicy::Skip`].
    pub skipped_records: u64,
}

/// Run options. A `Runner` holds no state between runs.
#[derive(Clone)]
pub struct Runner {
    pub schema: Schema,
    pub batch_size: usize,
    /// Codec name for artifacts; `None` writes plain CSV.
    pub compression: Option<String>,
    pub malformed: MalformedPolicy,
    /// Write the incomplete batch in progress when the run fails.
    pub flush_partial: bool,
    pub codecs: CodecRegistry,
}

impl Default for Runner {
    fn default() -> Self {
        Self {
            schema: Schema::beer_reviews(),
            batch_size: DEFAULT_BATCH_SIZE,
            compression: Some("gzip".to_string()),
            malformed: MalformedPolicy::Fail,
            flush_partial: false,
            codecs: CodecRegistry::builtin(),
        }
    }
}

impl Runner {
    #[must_use]
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    #[must_use]
    pub fn with_compression(mut self, codec: Option<&str>) -> Self {
        self.compression = codec.map(str::to_string);
        self
    }

    #[must_use]
    pub fn with_malformed(mut self, policy: MalformedPolicy) -> Self {
        self.malformed = policy;
        self
    }

    #[must_use]
    pub fn with_flush_partial(mut self, flush: bool) -> Self {
        self.flush_partial = flush;
        self
    }

    #[must_use]
    pub fn with_codecs(mut self, codecs: CodecRegistry) -> Self {
        self.codecs = codecs;
        self
    }

    /// Convert `source` into artifacts under `sink_dir`.
    ///
    /// # Errors
    /// The first fatal stage failure, with the last completed batch index.
    pub fn run<R: Read>(&self, source: R, sink_dir: impl AsRef<Path>) -> Result<RunSummary, RunError> {
        self.run_with_progress(source, sink_dir, |_| {})
    }

    /// Like [`Runner::run`], calling `on_batch` after every durable write.
    ///
    /// `source` is decompressed according to its magic bytes.
    pub fn run_with_progress<R, F>(
        &self,
        source: R,
        sink_dir: impl AsRef<Path>,
        on_batch: F,
    ) -> Result<RunSummary, RunError>
    where
        R: Read,
        F: FnMut(&BatchWritten),
    {
        let lines = LineSource::detect(source, "", &self.codecs).map_err(|e| RunError::new(None, e))?;
        self.run_lines(lines, sink_dir, on_batch)
    }

    /// Drive the pipeline from an already opened [`LineSource`], e.g. one
    /// from [`LineSource::open`] that detected compression by file name.
    pub fn run_lines<B, F>(
        &self,
        lines: LineSource<B>,
        sink_dir: impl AsRef<Path>,
        mut on_batch: F,
    ) -> Result<RunSummary, RunError>
    where
        B: BufRead,
        F: FnMut(&BatchWritten),
    {
        let setup = |e: PipelineError| RunError::new(None, e);
        self.schema.check().map_err(|m| setup(PipelineError::Config(m)))?;
        let codec = match self.compression.as_deref() {
            Some(name) => Some(self.codecs.by_name(name).ok_or_else(|| {
                setup(PipelineError::Config(format!("unknown compression codec `{name}`")))
            })?),
            None => None,
        };

        let records = ParsedRecords::new(group(lines), self.malformed);
        let mut batches = Batches::new(records, self.batch_size).map_err(setup)?;
        let sink = BatchSink::create(sink_dir, codec).map_err(setup)?;

        let mut summary = RunSummary::default();
        let mut last_completed = None;
        while let Some(next) = batches.next() {
            let outcome = next.and_then(|raw| self.persist(&sink, raw));
            match outcome {
                Ok(written) => {
                    summary.batches_written += 1;
                    summary.records_written += written.records;
                    last_completed = Some(written.index);
                    on_batch(&written);
                }
                Err(e) => {
                    if self.flush_partial
                        && let Some(partial) = batches.take_partial()
                    {
                        match self.persist(&sink, partial) {
                            Ok(written) => {
                                warn!(batch = written.index, records = written.records, "flushed partial batch");
                                last_completed = Some(written.index);
                                on_batch(&written);
                            }
                            Err(flush_err) => warn!(error = %flush_err, "partial batch discarded"),
                        }
                    }
                    return Err(RunError::new(last_completed, e));
                }
            }
        }

        let parsed = batches.inner();
        summary.skipped_records = parsed.skipped_records();
        summary.skipped_null_lines = parsed.inner().inner().skipped_null_lines();
        info!(
            batches = summary.batches_written,
            records = summary.records_written,
            skipped_null_lines = summary.skipped_null_lines,
            skipped_records = summary.skipped_records,
            "run complete"
        );
        Ok(summary)
    }

    fn persist(&self, sink: &BatchSink, raw: RawBatch) -> Result<BatchWritten> {
        let records = raw.records.len();
        let batch = normalize_batch(&self.schema, raw.index, raw.records)?;
        let path = sink.write(&batch)?;
        info!(batch = batch.index, records, path = %path.display(), "batch written");
        Ok(BatchWritten {
            index: batch.index,
            records,
            path,
        })
    }
}

/// Convert `source` with the default schema and gzip artifacts.
///
/// Returns the number of artifacts written.
///
/// # Errors
/// See [`Runner::run`].
pub fn run<R: Read>(source: R, sink_dir: impl AsRef<Path>, batch_size: usize) -> Result<usize, RunError> {
    Runner::new(batch_size)
        .run(source, sink_dir)
        .map(|summary| summary.batches_written)
}
