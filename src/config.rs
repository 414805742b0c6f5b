//! Run configuration loaded from a JSON file.
//!
//! Every field is optional in the file; missing ones take the defaults of
//! [`RunConfig::default`]. Command-line flags are applied on top by the
//! binary.
//!
//! ```json
//! {
//!   "input": "beeradvocate.txt.gz",
//!   "output_dir": "batches",
//!   "batch_size": 50000,
//!   "compression": "zstd",
//!   "malformed": "skip",
//!   "flush_partial": true
//! }
//! ```

use crate::parser::MalformedPolicy;
use crate::runner::{DEFAULT_BATCH_SIZE, Runner};
use crate::schema::Schema;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Codec name that selects uncompressed artifacts.
pub const NO_COMPRESSION: &str = "none";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub input: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub batch_size: usize,
    /// Artifact codec name, or `"none"` for plain CSV.
    pub compression: String,
    pub malformed: MalformedPolicy,
    pub flush_partial: bool,
    /// Column table; the beer review table when absent.
    pub schema: Option<Schema>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            input: None,
            output_dir: None,
            batch_size: DEFAULT_BATCH_SIZE,
            compression: "gzip".to_string(),
            malformed: MalformedPolicy::Fail,
            flush_partial: false,
            schema: None,
        }
    }
}

impl RunConfig {
    /// Parse a JSON config document.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("parse run config")
    }

    /// Read and parse a JSON config file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("load config {}", path.display()))
    }

    /// Build the [`Runner`] these settings describe.
    #[must_use]
    pub fn runner(&self) -> Runner {
        let compression = (!self.compression.eq_ignore_ascii_case(NO_COMPRESSION)).then_some(self.compression.as_str());
        Runner::new(self.batch_size)
            .with_schema(self.schema.clone().unwrap_or_default())
            .with_compression(compression)
            .with_malformed(self.malformed)
            .with_flush_partial(self.flush_partial)
    }
}
