//! CSV serialization of normalized batches, and reading them back.
//!
//! An artifact is a (usually compressed) CSV file with one header row of
//! canonical column names and one row per record. There is no row-index
//! column; null cells are empty fields.

use crate::io::compression::{CodecRegistry, CompressionCodec, wrap_writer};
use crate::normalize::NormalizedBatch;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

/// File name of artifact `index`, e.g. `7.csv.gz`.
#[must_use]
pub fn artifact_file_name(index: usize, codec: Option<&dyn CompressionCodec>) -> String {
    let ext = codec
        .and_then(|c| c.extensions().first().copied())
        .unwrap_or("");
    format!("{index}.csv{ext}")
}

/// Serialize `batch` as CSV into `writer`, compressed with `codec`.
///
/// The stream is finished before returning, so an `Ok` means every byte
/// including the codec trailer reached `writer`.
pub fn write_batch<W: Write>(
    writer: W,
    codec: Option<&dyn CompressionCodec>,
    batch: &NormalizedBatch,
) -> io::Result<()> {
    let w = wrap_writer(codec, writer)?;
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(w);
    wtr.write_record(&batch.columns)?;
    let mut cells: Vec<String> = Vec::with_capacity(batch.columns.len());
    for row in &batch.rows {
        cells.clear();
        cells.extend(row.iter().map(ToString::to_string));
        wtr.write_record(&cells)?;
    }
    let w = wtr.into_inner().map_err(|e| e.into_error())?;
    w.finish()
}

/// An artifact loaded back into memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub headers: Vec<String>,
    /// Cells per row; empty fields read back as `None`.
    pub rows: Vec<Vec<Option<String>>>,
}

impl Artifact {
    /// Cell at `row` for the column named `column`.
    #[must_use]
    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let col = self.headers.iter().position(|h| h == column)?;
        self.rows.get(row)?.get(col)?.as_deref()
    }
}

/// Read an artifact, decompressing by extension or magic bytes.
///
/// # Errors
/// Returns an error if the file cannot be opened or any row is not valid CSV.
pub fn read_artifact(path: impl AsRef<Path>, codecs: &CodecRegistry) -> Result<Artifact> {
    let path = path.as_ref();
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let rdr = codecs
        .auto_detect_reader(f, path)
        .with_context(|| format!("setup decompression for {}", path.display()))?;
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(rdr);
    let headers = rdr
        .headers()
        .with_context(|| format!("read header of {}", path.display()))?
        .iter()
        .map(str::to_string)
        .collect();
    let mut rows = Vec::new();
    for (i, rec) in rdr.records().enumerate() {
        let rec = rec.with_context(|| format!("parse CSV record #{}", i + 1))?;
        rows.push(
            rec.iter()
                .map(|cell| (!cell.is_empty()).then(|| cell.to_string()))
                .collect(),
        );
    }
    Ok(Artifact { headers, rows })
}
