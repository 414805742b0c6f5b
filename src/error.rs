//! Error taxonomy for a conversion run.
//!
//! Every variant of [`PipelineError`] is fatal to the run. [`RunError`] wraps
//! the failure together with the last batch that was durably written, so a
//! caller knows which artifacts on disk are complete.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used by the streaming stages.
pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

/// A failure in one of the pipeline stages.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The input could not be decompressed or decoded past `line`.
    #[error("stream corrupted after line {line}: {source}")]
    StreamCorruption {
        /// 1-based number of the line that failed to decode.
        line: u64,
        #[source]
        source: io::Error,
    },

    /// A content line has no `": "` delimiter.
    #[error("{}record #{record}: line without ': ' delimiter: {line:?}", in_batch(.batch))]
    MalformedRecordLine {
        /// Batch the record was headed for; `None` outside a batched run.
        batch: Option<usize>,
        /// Zero-based position of the record in the source.
        record: u64,
        /// The offending line, terminator stripped.
        line: String,
    },

    /// A designated numeric or timestamp column holds unparseable text.
    #[error("batch {batch}, record #{record}: column `{column}` expects {expected}, got {value:?}")]
    SchemaViolation {
        batch: usize,
        /// Zero-based position of the record in the source.
        record: u64,
        column: String,
        expected: &'static str,
        value: String,
    },

    /// An unmapped key is spelled like a canonical column, so it cannot pass
    /// through under its own name.
    #[error("batch {batch}, record #{record}: key `{key}` collides with a canonical column")]
    ColumnCollision { batch: usize, record: u64, key: String },

    /// Persisting an artifact, or preparing its directory, failed.
    #[error("failed to {} {}: {source}", sink_target(.batch), path.display())]
    SinkWriteFailure {
        /// `None` when the output directory itself could not be created.
        batch: Option<usize>,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The run was configured with invalid options.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl PipelineError {
    pub(crate) fn sink(batch: Option<usize>, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::SinkWriteFailure {
            batch,
            path: path.into(),
            source,
        }
    }
}

/// A fatal run failure along with how far the run got.
///
/// Artifacts `0..=last_completed_batch` are complete and stay on disk.
#[derive(Debug, Error)]
#[error("{source} (last completed batch: {})", fmt_last(.last_completed_batch))]
pub struct RunError {
    pub last_completed_batch: Option<usize>,
    #[source]
    pub source: PipelineError,
}

fn in_batch(batch: &Option<usize>) -> String {
    batch.map(|b| format!("batch {b}, ")).unwrap_or_default()
}

fn sink_target(batch: &Option<usize>) -> String {
    match batch {
        Some(b) => format!("write batch {b} to"),
        None => "create output directory".to_string(),
    }
}

fn fmt_last(last: &Option<usize>) -> String {
    match last {
        Some(i) => i.to_string(),
        None => "none".to_string(),
    }
}

impl RunError {
    pub(crate) fn new(last_completed_batch: Option<usize>, source: PipelineError) -> Self {
        Self {
            last_completed_batch,
            source,
        }
    }

    /// The underlying stage failure.
    pub fn kind(&self) -> &PipelineError {
        &self.source
    }
}
