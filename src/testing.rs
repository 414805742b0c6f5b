//! Fixtures for tests: review dumps in the `key: value` format and helpers
//! for inspecting an output directory.

use crate::io::compression::{CodecRegistry, wrap_writer};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// One record as ordered `(raw key, value)` pairs.
pub type Fields = Vec<(String, String)>;

/// Build a record from string pairs.
#[must_use]
pub fn fields(pairs: &[(&str, &str)]) -> Fields {
    pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
}

/// A handful of BeerAdvocate-style reviews.
#[must_use]
pub fn sample_reviews() -> Vec<Fields> {
    vec![
        fields(&[
            ("beer/name", "Sausa Weizen"),
            ("beer/beerId", "47986"),
            ("beer/brewerId", "10325"),
            ("beer/ABV", "5.00"),
            ("beer/style", "Hefeweizen"),
            ("review/appearance", "2.5"),
            ("review/aroma", "2"),
            ("review/palate", "1.5"),
            ("review/taste", "1.5"),
            ("review/overall", "1.5"),
            ("review/time", "1234817823"),
            ("review/profileName", "stcules"),
            ("review/text", "A lot of foam. But a lot. In the smell: some banana, and then lactic."),
        ]),
        fields(&[
            ("beer/name", "Red Moon"),
            ("beer/beerId", "48213"),
            ("beer/brewerId", "10325"),
            ("beer/ABV", "6.20"),
            ("beer/style", "English Strong Ale"),
            ("review/appearance", "3"),
            ("review/aroma", "2.5"),
            ("review/palate", "3"),
            ("review/taste", "3"),
            ("review/overall", "3"),
            ("review/time", "1235915097"),
            ("review/profileName", "stcules"),
            ("review/text", "Dark red color, light beige foam, average."),
        ]),
        fields(&[
            ("beer/name", "Black Horse Black Beer"),
            ("beer/beerId", "48215"),
            ("beer/brewerId", "10325"),
            ("beer/ABV", ""),
            ("beer/style", "Foreign / Export Stout"),
            ("review/appearance", "3"),
            ("review/aroma", "2.5"),
            ("review/palate", "3"),
            ("review/taste", "3"),
            ("review/overall", "3"),
            ("review/time", "1236538138"),
            ("review/profileName", "stcules"),
            ("review/text", "Almost totally black. Beige foam: quite compact, not bad."),
        ]),
    ]
}

/// Render records as a review dump: `key: value` lines, records separated
/// by `separator` (one or more sentinel lines).
#[must_use]
pub fn review_dump(records: &[Fields], separator: &str) -> String {
    let mut out = String::new();
    for (i, record) in records.iter().enumerate() {
        if i > 0 {
            out.push_str(separator);
        }
        for (k, v) in record {
            out.push_str(k);
            out.push_str(": ");
            out.push_str(v);
            out.push('\n');
        }
    }
    out
}

/// `text` compressed with the named codec from the built-in registry.
pub fn compressed(text: &str, codec: &str) -> io::Result<Vec<u8>> {
    let registry = CodecRegistry::builtin();
    let codec = registry
        .by_name(codec)
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("codec {codec} not enabled")))?;
    let mut out = Vec::new();
    let mut w = wrap_writer(Some(codec.as_ref()), &mut out)?;
    w.write_all(text.as_bytes())?;
    w.finish()?;
    Ok(out)
}

/// Artifact files in `dir` ordered by batch index; other files are ignored.
pub fn artifact_paths(dir: impl AsRef<Path>) -> io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let index = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.split_once(".csv"))
            .and_then(|(stem, _)| stem.parse::<usize>().ok());
        if let Some(index) = index {
            found.push((index, path));
        }
    }
    found.sort();
    Ok(found.into_iter().map(|(_, p)| p).collect())
}
