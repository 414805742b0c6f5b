//! Batch-wide renaming and type coercion.
//!
//! A batch is normalized column by column: the column layout is fixed once
//! for the whole batch, then every column is coerced in a single pass over
//! its values.

use crate::error::{PipelineError, Result};
use crate::parser::RawRecord;
use crate::schema::{ColumnKind, EpochUnit, Schema};
use chrono::{DateTime, Utc};
use std::fmt;

/// A typed cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Float(f64),
    Timestamp(DateTime<Utc>),
}

impl Value {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// Renders the cell as it appears in an artifact; `Null` is empty.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Text(s) => f.write_str(s),
            Value::Float(v) => write!(f, "{v:?}"),
            Value::Timestamp(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S%.f")),
        }
    }
}

/// Normalized records sharing one column layout.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedBatch {
    /// Zero-based batch number.
    pub index: usize,
    /// Canonical names, schema columns first, then pass-through keys.
    pub columns: Vec<String>,
    /// One row per record, cells aligned with `columns`.
    pub rows: Vec<Vec<Value>>,
}

impl NormalizedBatch {
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell at `row` for the column named `column`.
    #[must_use]
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let col = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(col)
    }
}

/// Where a column's raw values come from.
struct Source<'a> {
    raw: &'a str,
    kind: ColumnKind,
}

/// Rename, null, and coerce a whole batch.
///
/// # Errors
/// [`PipelineError::SchemaViolation`] when a non-empty value in a float or
/// timestamp column does not parse, and [`PipelineError::ColumnCollision`]
/// when an unmapped key is spelled like a canonical column.
pub fn normalize_batch(schema: &Schema, index: usize, records: Vec<RawRecord>) -> Result<NormalizedBatch> {
    let mut columns: Vec<String> = schema.canonical_names().map(str::to_string).collect();
    let mut sources: Vec<Source<'_>> = schema
        .columns
        .iter()
        .map(|c| Source {
            raw: c.raw.as_str(),
            kind: c.kind,
        })
        .collect();

    for record in &records {
        for (key, _) in record.iter() {
            if sources.iter().any(|s| s.raw == key) {
                continue;
            }
            if columns.iter().any(|c| c == key) {
                return Err(PipelineError::ColumnCollision {
                    batch: index,
                    record: record.position,
                    key: key.to_string(),
                });
            }
            columns.push(key.to_string());
            sources.push(Source { raw: key, kind: ColumnKind::Text });
        }
    }

    let mut rows = vec![vec![Value::Null; columns.len()]; records.len()];
    for (col, source) in sources.iter().enumerate() {
        for (row, record) in records.iter().enumerate() {
            let Some(raw) = record.get(source.raw) else {
                continue;
            };
            if raw.is_empty() {
                continue;
            }
            rows[row][col] = coerce(raw, source.kind, schema.epoch_unit).ok_or_else(|| {
                PipelineError::SchemaViolation {
                    batch: index,
                    record: record.position,
                    column: columns[col].clone(),
                    expected: source.kind.expected(),
                    value: raw.to_string(),
                }
            })?;
        }
    }

    Ok(NormalizedBatch {
        index,
        columns,
        rows,
    })
}

/// Text is kept verbatim; numeric kinds ignore surrounding whitespace.
fn coerce(raw: &str, kind: ColumnKind, unit: EpochUnit) -> Option<Value> {
    match kind {
        ColumnKind::Text => Some(Value::Text(raw.to_string())),
        ColumnKind::Float => raw.trim().parse::<f64>().ok().map(Value::Float),
        ColumnKind::Timestamp => {
            let n = raw.trim().parse::<i64>().ok()?;
            let t = match unit {
                EpochUnit::Seconds => DateTime::<Utc>::from_timestamp(n, 0),
                EpochUnit::Milliseconds => DateTime::<Utc>::from_timestamp_millis(n),
            };
            t.map(Value::Timestamp)
        }
    }
}
