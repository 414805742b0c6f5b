//! Turns a [`ReviewGroup`] into a [`RawRecord`] of `key: value` fields.

use crate::error::{PipelineError, Result};
use crate::grouper::ReviewGroup;
use crate::io::lines::strip_terminator;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Separator between a field key and its value.
pub const DELIMITER: &str = ": ";

/// Raw string fields of one record, in first-seen key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    /// Zero-based ordinal of the source record.
    pub position: u64,
    fields: Vec<(String, String)>,
}

impl RawRecord {
    pub fn new(position: u64) -> Self {
        Self {
            position,
            fields: Vec::new(),
        }
    }

    /// Set `key` to `value`, replacing an earlier value for the same key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.fields.push((key, value)),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Split `line` once, at the first `": "`.
///
/// Returns `None` when the delimiter is absent.
#[must_use]
pub fn split_field(line: &str) -> Option<(&str, &str)> {
    line.split_once(DELIMITER)
}

/// Parse every line of `group` into a [`RawRecord`].
///
/// # Errors
/// [`PipelineError::MalformedRecordLine`] for the first line lacking the
/// delimiter.
pub fn parse_one(group: &ReviewGroup) -> Result<RawRecord> {
    let mut record = RawRecord::new(group.position);
    for raw in &group.lines {
        let line = strip_terminator(raw);
        let (key, value) = split_field(line).ok_or_else(|| PipelineError::MalformedRecordLine {
            batch: None,
            record: group.position,
            line: line.to_string(),
        })?;
        record.insert(key, value);
    }
    Ok(record)
}

/// What to do with a record containing a malformed line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedPolicy {
    /// Abort the run on the first malformed line.
    #[default]
    Fail,
    /// Drop the whole record, log it, and continue.
    Skip,
}

/// Iterator adapter parsing a group stream into a record stream.
pub struct ParsedRecords<I> {
    groups: I,
    policy: MalformedPolicy,
    skipped: u64,
}

impl<I> ParsedRecords<I> {
    pub fn new(groups: I, policy: MalformedPolicy) -> Self {
        Self {
            groups,
            policy,
            skipped: 0,
        }
    }

    /// Records dropped under [`MalformedPolicy::Skip`].
    #[must_use]
    pub fn skipped_records(&self) -> u64 {
        self.skipped
    }

    pub fn inner(&self) -> &I {
        &self.groups
    }
}

impl<I> Iterator for ParsedRecords<I>
where
    I: Iterator<Item = Result<ReviewGroup>>,
{
    type Item = Result<RawRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let group = match self.groups.next()? {
                Ok(g) => g,
                Err(e) => return Some(Err(e)),
            };
            match (parse_one(&group), self.policy) {
                (Err(e @ PipelineError::MalformedRecordLine { .. }), MalformedPolicy::Skip) => {
                    self.skipped += 1;
                    warn!(error = %e, "skipping malformed record");
                }
                (res, _) => return Some(res),
            }
        }
    }
}
