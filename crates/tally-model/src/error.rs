//! Validation errors raised by the table model.

use thiserror::Error;

/// A structural or semantic violation found while materializing or
/// mutating a grade table.
///
/// Every variant is a validation failure: mutations are checked against
/// a copy of the table before anything is persisted, so a failing
/// operation never reaches storage.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TableError {
    /// Column id is not declared for the course.
    #[error("unknown column `{0}` for this course")]
    UnknownColumn(String),

    /// Column is calculated; calc cells are computed on demand, never
    /// stored.
    #[error("column `{0}` is calculated and cannot be written")]
    CalcColumn(String),

    /// Row does not name the course's id column.
    #[error("row is missing the id column `{0}`")]
    MissingId(String),

    /// Row id cell is empty or not text.
    #[error("row has an empty or non-text value in id column `{0}`")]
    InvalidId(String),

    /// Row lacks a column the table has.
    #[error("row is missing table column `{0}`")]
    MissingColumn(String),

    /// Row carries a column the table does not have.
    #[error("row has column `{0}` which is not in the table")]
    ExtraColumn(String),

    /// Column being added is already present.
    #[error("column `{0}` is already in the table")]
    DuplicateColumn(String),

    /// Column kind cannot be added to an existing table.
    #[error("column `{0}` is not addable; only score and info columns are")]
    NotAddable(String),

    /// Patch addresses a row id not in the table.
    #[error("no row with id `{0}`")]
    UnknownRow(String),

    /// Patch addresses a column not in the table.
    #[error("column `{0}` is not in the table")]
    NotInTable(String),

    /// Patch tries to rewrite the id column.
    #[error("id column `{0}` cannot be patched")]
    IdNotPatchable(String),

    /// Score value lies outside the column's declared bounds.
    #[error("value {value} for score column `{col_id}` is outside [{min}, {max}]")]
    OutOfRange {
        col_id: String,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Score cell holds non-empty, non-numeric data.
    #[error("score column `{0}` requires a numeric value")]
    NonNumericScore(String),

    /// Numeric cell is NaN or infinite. The JSON wire form has no
    /// representation for these, so they can never be stored.
    #[error("non-finite numeric value in column `{0}`")]
    NonFiniteValue(String),
}
