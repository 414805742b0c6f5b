//! # kvbatch
//!
//! Streams a large dump of blank-line separated `key: value` records into
//! fixed-size batches of typed rows, written one compressed CSV artifact per
//! batch.
//!
//! ## Pipeline
//!
//! Every stage is a lazy iterator pulled by the next one:
//!
//! 1. [`LineSource`] decodes (and decompresses) the byte stream into lines,
//!    dropping NUL-prefixed lines.
//! 2. [`RecordGroups`] cuts the lines into records at sentinel lines.
//! 3. [`ParsedRecords`] splits each line once at `": "` into a [`RawRecord`].
//! 4. [`Batches`] collects `batch_size` records.
//! 5. [`normalize_batch`] renames keys through the [`Schema`], turns empty
//!    strings into nulls and coerces float and timestamp columns.
//! 6. [`BatchSink`] writes `0.csv.gz`, `1.csv.gz`, ... atomically.
//!
//! Peak memory is one record group plus one batch, whatever the input size.
//!
//! ## Quick Start
//!
//! ```no_run
//! use kvbatch::Runner;
//! use std::fs::File;
//!
//! # fn main() -> anyhow::Result<()> {
//! let input = File::open("beeradvocate.txt.gz")?;
//! let summary = Runner::new(50_000).run(input, "batches")?;
//! println!("wrote {} batches", summary.batches_written);
//! # Ok(())
//! # }
//! ```
//!
//! ## Errors
//!
//! Every [`PipelineError`] aborts the run. Artifacts written before the
//! failure stay valid, and the returned [`RunError`] names the last one.
//!
//! ## Feature Flags
//!
//! - `compression-gzip`, `compression-zstd`, `compression-bzip2`,
//!   `compression-xz` - codecs for input detection and artifact output
//!   (all on by default)

pub mod batcher;
pub mod config;
pub mod error;
pub mod grouper;
pub mod io;
pub mod logging;
pub mod normalize;
pub mod parser;
pub mod runner;
pub mod schema;
pub mod sink;
pub mod testing;

pub use batcher::{Batches, RawBatch};
pub use config::RunConfig;
pub use error::{PipelineError, RunError};
pub use grouper::{RecordGroups, ReviewGroup, group};
pub use io::artifact::{Artifact, read_artifact};
pub use io::compression::{CodecRegistry, CompressionCodec};
pub use io::lines::{LineSource, RawLine};
pub use normalize::{NormalizedBatch, Value, normalize_batch};
pub use parser::{MalformedPolicy, ParsedRecords, RawRecord, parse_one};
pub use runner::{BatchWritten, Runner, RunSummary, run};
pub use schema::{ColumnKind, ColumnSpec, EpochUnit, Schema};
pub use sink::BatchSink;
