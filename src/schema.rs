//! The ordered column table driving normalization.

use serde::{Deserialize, Serialize};

/// How a canonical column is typed in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    /// Kept as text.
    Text,
    /// Parsed as a 64-bit float.
    Float,
    /// Parsed as an integer epoch offset and converted to a UTC timestamp.
    Timestamp,
}

impl ColumnKind {
    pub(crate) fn expected(self) -> &'static str {
        match self {
            ColumnKind::Text => "text",
            ColumnKind::Float => "a floating point number",
            ColumnKind::Timestamp => "an integer epoch offset",
        }
    }
}

/// Unit of the integer stored in a timestamp column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpochUnit {
    #[default]
    Seconds,
    Milliseconds,
}

/// Maps one raw source key to a canonical output column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub canonical: String,
    pub raw: String,
    pub kind: ColumnKind,
}

impl ColumnSpec {
    pub fn new(canonical: impl Into<String>, raw: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            canonical: canonical.into(),
            raw: raw.into(),
            kind,
        }
    }
}

/// Ordered column table plus the epoch unit for timestamp columns.
///
/// Raw keys not named in the table pass through under their own name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub columns: Vec<ColumnSpec>,
    #[serde(default)]
    pub epoch_unit: EpochUnit,
}

impl Default for Schema {
    fn default() -> Self {
        Self::beer_reviews()
    }
}

impl Schema {
    pub fn new(columns: Vec<ColumnSpec>, epoch_unit: EpochUnit) -> Self {
        Self {
            columns,
            epoch_unit,
        }
    }

    /// Table for BeerAdvocate-style review dumps.
    #[must_use]
    pub fn beer_reviews() -> Self {
        use ColumnKind::{Float, Text, Timestamp};
        let columns = [
            ("beer_name", "beer/name", Text),
            ("beer_id", "beer/beerId", Text),
            ("brewer_id", "beer/brewerId", Text),
            ("abv", "beer/ABV", Float),
            ("beer_style", "beer/style", Text),
            ("review_appearance", "review/appearance", Float),
            ("review_aroma", "review/aroma", Float),
            ("review_palate", "review/palate", Float),
            ("review_taste", "review/taste", Float),
            ("review_overall", "review/overall", Float),
            ("time", "review/time", Timestamp),
            ("profile_name", "review/profileName", Text),
            ("review_text", "review/text", Text),
        ]
        .into_iter()
        .map(|(canonical, raw, kind)| ColumnSpec::new(canonical, raw, kind))
        .collect();
        Self::new(columns, EpochUnit::Seconds)
    }

    /// The column fed by `raw`, if any.
    #[must_use]
    pub fn by_raw(&self, raw: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.raw == raw)
    }

    /// Canonical names in table order.
    pub fn canonical_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.canonical.as_str())
    }

    /// Reject tables with duplicate raw keys or canonical names.
    pub fn check(&self) -> Result<(), String> {
        for (i, col) in self.columns.iter().enumerate() {
            let rest = &self.columns[i + 1..];
            if rest.iter().any(|c| c.raw == col.raw) {
                return Err(format!("raw key `{}` mapped twice", col.raw));
            }
            if rest.iter().any(|c| c.canonical == col.canonical) {
                return Err(format!("canonical column `{}` declared twice", col.canonical));
            }
        }
        Ok(())
    }
}
