//! Raw grade-table representation.
//!
//! A stored grade table is a JSON array of row objects keyed by column id.
//! These types mirror that wire shape exactly; the storage layer encodes
//! and decodes them without looking inside. All structural rules (which
//! columns are legal, what counts as a valid row) belong to the table
//! model, not to these types.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single cell: a numeric score or a piece of text (a student id, an
/// info field, or the empty string for an unfilled cell).
///
/// Serializes untagged, so `88.5` and `"ann"` round-trip as bare JSON
/// scalars rather than wrapped objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    /// Numeric cell, used by score columns.
    Num(f64),
    /// Text cell, used by id and info columns. The empty string marks an
    /// unfilled cell.
    Str(String),
}

impl CellValue {
    /// The empty cell. New columns are filled with this, and patching a
    /// cell to it clears the cell.
    #[must_use]
    pub const fn empty() -> Self {
        Self::Str(String::new())
    }

    /// Whether this cell is unfilled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Str(s) if s.is_empty())
    }

    /// Numeric view, if this is a number cell.
    #[must_use]
    pub const fn as_num(&self) -> Option<f64> {
        match self {
            Self::Num(n) => Some(*n),
            Self::Str(_) => None,
        }
    }

    /// Text view, if this is a text cell.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Num(_) => None,
            Self::Str(s) => Some(s),
        }
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        Self::Num(n)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "{s}"),
        }
    }
}

/// One table row: column id to cell value, including the id column.
pub type RawRow = BTreeMap<String, CellValue>;

/// An ordered grade table as it is persisted: one [`RawRow`] per student.
pub type RawTable = Vec<RawRow>;

/// Cell-level edits: row id to the cells being rewritten in that row.
pub type Patches = BTreeMap<String, RawRow>;
