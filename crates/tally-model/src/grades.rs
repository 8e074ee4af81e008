//! The materialized grade table and its mutation semantics.
//!
//! [`Grades`] is a validated, in-memory view of one course's table. All
//! mutations are functional: they return a new table and leave the
//! receiver untouched, so a failed batch never leaves a half-applied
//! table behind.
//!
//! Invariants held by every `Grades` value:
//! - every cell belongs to a column the course declares, and calc
//!   columns never appear in stored rows
//! - every row carries a non-empty text id in the course's id column
//! - all rows share the same column set, kept in the course's canonical
//!   declaration order, and a non-empty column set contains the id column
//! - every score cell is empty or a number within the column's bounds
//! - every numeric cell is finite; the JSON wire form cannot represent
//!   NaN or infinities

use tally_core::catalog::{ColKind, ColSpec, CourseInfo};
use tally_core::table::{CellValue, Patches, RawRow, RawTable};

use crate::error::TableError;

/// Capability trait the storage layer drives grade tables through.
///
/// `tally-db` validates nothing about table contents itself: it reads a
/// raw table, asks a model to materialize and mutate it, and persists
/// the raw form the model hands back. Substituting the model swaps the
/// table semantics without touching the storage protocol.
pub trait TableModel {
    /// The materialized table handed back to callers.
    type Table;

    /// Build a validated table from its raw stored form.
    ///
    /// # Errors
    /// Fails when the raw data violates the course's structure. For data
    /// read back from storage this means the stored document is bad.
    fn materialize(&self, course: &CourseInfo, raw: RawTable) -> Result<Self::Table, TableError>;

    /// Insert-or-replace whole rows, keyed by the id column.
    ///
    /// # Errors
    /// Fails when any row is invalid; no part of the batch is applied.
    fn upsert_rows(
        &self,
        table: &Self::Table,
        rows: Vec<RawRow>,
    ) -> Result<Self::Table, TableError>;

    /// Add empty columns to the table.
    ///
    /// # Errors
    /// Fails when any column is unknown, not addable, or already present.
    fn add_columns(
        &self,
        table: &Self::Table,
        col_ids: &[String],
    ) -> Result<Self::Table, TableError>;

    /// Apply cell-level edits.
    ///
    /// # Errors
    /// Fails when a patch addresses a missing row or column, the id
    /// column, or writes an invalid score.
    fn patch(&self, table: &Self::Table, patches: &Patches) -> Result<Self::Table, TableError>;

    /// The raw form of `table`, exactly as it should be persisted.
    fn raw_table(&self, table: &Self::Table) -> RawTable;
}

/// The production model: course tables materialize to [`Grades`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CourseTableModel;

impl TableModel for CourseTableModel {
    type Table = Grades;

    fn materialize(&self, course: &CourseInfo, raw: RawTable) -> Result<Grades, TableError> {
        Grades::materialize(course, raw)
    }

    fn upsert_rows(&self, table: &Grades, rows: Vec<RawRow>) -> Result<Grades, TableError> {
        table.upsert_rows(rows)
    }

    fn add_columns(&self, table: &Grades, col_ids: &[String]) -> Result<Grades, TableError> {
        table.add_columns(col_ids)
    }

    fn patch(&self, table: &Grades, patches: &Patches) -> Result<Grades, TableError> {
        table.patch(patches)
    }

    fn raw_table(&self, table: &Grades) -> RawTable {
        table.raw_table().clone()
    }
}

/// A validated, in-memory grade table for one course.
#[derive(Debug, Clone, PartialEq)]
pub struct Grades {
    course: CourseInfo,
    col_ids: Vec<String>,
    rows: Vec<RawRow>,
}

impl Grades {
    /// Validate `raw` and build the materialized table.
    ///
    /// Raw rows are folded in as an upsert sequence into a fresh table:
    /// the first row fixes the column set, later rows must match it, and
    /// a repeated id keeps the last occurrence.
    ///
    /// # Errors
    /// Fails with a [`TableError`] when any row violates the course's
    /// structure.
    pub fn materialize(course: &CourseInfo, raw: RawTable) -> Result<Self, TableError> {
        let empty = Self {
            course: course.clone(),
            col_ids: Vec::new(),
            rows: Vec::new(),
        };
        empty.upsert_rows(raw)
    }

    /// Insert-or-replace whole rows, keyed by the id column.
    ///
    /// A row whose id matches an existing row replaces it in place; a new
    /// id appends. Into an empty table, the first row defines the column
    /// set (in canonical course order); otherwise each row must carry
    /// exactly the table's columns.
    ///
    /// # Errors
    /// Fails on the first invalid row; the receiver is never modified.
    pub fn upsert_rows(&self, rows: Vec<RawRow>) -> Result<Self, TableError> {
        let mut next = self.clone();
        for row in rows {
            let id = check_row(&next.course, &next.col_ids, &row)?;
            if next.col_ids.is_empty() {
                next.col_ids = canonical_cols(&next.course, &row);
            }
            let pos = next
                .rows
                .iter()
                .position(|r| row_id(&next.course, r) == Some(id.as_str()));
            match pos {
                Some(i) => next.rows[i] = row,
                None => next.rows.push(row),
            }
        }
        Ok(next)
    }

    /// Add columns to the table, filling every existing row with empty
    /// cells. Only score and info columns declared by the course can be
    /// added, and each at most once.
    ///
    /// # Errors
    /// Fails if any column is unknown, not addable, or already present
    /// (including repeats within `col_ids`); nothing is applied.
    pub fn add_columns(&self, col_ids: &[String]) -> Result<Self, TableError> {
        let mut adding: Vec<&str> = Vec::with_capacity(col_ids.len());
        for col_id in col_ids {
            let Some(spec) = self.course.col(col_id) else {
                return Err(TableError::UnknownColumn(col_id.clone()));
            };
            if !spec.kind.is_addable() {
                return Err(TableError::NotAddable(col_id.clone()));
            }
            if self.col_ids.contains(col_id) || adding.contains(&col_id.as_str()) {
                return Err(TableError::DuplicateColumn(col_id.clone()));
            }
            adding.push(col_id.as_str());
        }

        let mut next = self.clone();
        // A non-empty column set always contains the id column.
        if next.col_ids.is_empty() {
            next.col_ids.push(next.course.id_col().id.clone());
        }
        for col_id in &adding {
            next.col_ids.push((*col_id).to_string());
            for r in &mut next.rows {
                r.insert((*col_id).to_string(), CellValue::empty());
            }
        }
        next.canonicalize();
        Ok(next)
    }

    /// Apply cell-level edits. Each patch addresses an existing row by id
    /// and rewrites individual cells; writing the empty cell clears one.
    ///
    /// # Errors
    /// Fails if a patch names a missing row, a column not in the table,
    /// the id column, or an invalid score value; nothing is applied.
    pub fn patch(&self, patches: &Patches) -> Result<Self, TableError> {
        let mut next = self.clone();
        for (target_id, cells) in patches {
            let Some(i) = next
                .rows
                .iter()
                .position(|r| row_id(&next.course, r) == Some(target_id.as_str()))
            else {
                return Err(TableError::UnknownRow(target_id.clone()));
            };
            for (col_id, value) in cells {
                if !next.col_ids.contains(col_id) {
                    return Err(TableError::NotInTable(col_id.clone()));
                }
                let Some(spec) = next.course.col(col_id) else {
                    return Err(TableError::NotInTable(col_id.clone()));
                };
                if spec.kind == ColKind::Id {
                    return Err(TableError::IdNotPatchable(col_id.clone()));
                }
                check_cell(spec, value)?;
                next.rows[i].insert(col_id.clone(), value.clone());
            }
        }
        Ok(next)
    }

    /// The stored rows extended with the course's calc columns. Each calc
    /// cell is the mean of the row's filled score cells, rounded to one
    /// decimal, or the empty cell when no score is filled.
    #[must_use]
    pub fn full_table(&self) -> RawTable {
        self.rows
            .iter()
            .map(|r| {
                let mut full = r.clone();
                for spec in &self.course.cols {
                    if spec.kind == ColKind::Calc {
                        full.insert(spec.id.clone(), calc_cell(&self.course, r));
                    }
                }
                full
            })
            .collect()
    }

    /// The course this table belongs to.
    #[must_use]
    pub const fn course(&self) -> &CourseInfo {
        &self.course
    }

    /// Column ids currently in the table, in canonical course order.
    #[must_use]
    pub fn col_ids(&self) -> &[String] {
        &self.col_ids
    }

    /// The rows exactly as they are persisted, in stored order.
    #[must_use]
    pub const fn raw_table(&self) -> &RawTable {
        &self.rows
    }

    /// Find a row by its id-column value.
    #[must_use]
    pub fn row(&self, id: &str) -> Option<&RawRow> {
        self.rows.iter().find(|r| row_id(&self.course, r) == Some(id))
    }

    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn canonicalize(&mut self) {
        let canonical: Vec<String> = self
            .course
            .cols
            .iter()
            .filter(|c| self.col_ids.contains(&c.id))
            .map(|c| c.id.clone())
            .collect();
        self.col_ids = canonical;
    }
}

/// Validate one incoming row and return its id-column value.
fn check_row(course: &CourseInfo, col_ids: &[String], row: &RawRow) -> Result<String, TableError> {
    for (col_id, value) in row {
        let Some(spec) = course.col(col_id) else {
            return Err(TableError::UnknownColumn(col_id.clone()));
        };
        if !spec.kind.is_enterable() {
            return Err(TableError::CalcColumn(col_id.clone()));
        }
        check_cell(spec, value)?;
    }

    // An empty column set means the table is empty and this row will
    // define the columns; otherwise the sets must match exactly.
    if !col_ids.is_empty() {
        for col_id in col_ids {
            if !row.contains_key(col_id) {
                return Err(TableError::MissingColumn(col_id.clone()));
            }
        }
        for col_id in row.keys() {
            if !col_ids.contains(col_id) {
                return Err(TableError::ExtraColumn(col_id.clone()));
            }
        }
    }

    let id_spec = course.id_col();
    match row.get(&id_spec.id) {
        Some(CellValue::Str(s)) if !s.is_empty() => Ok(s.clone()),
        Some(_) => Err(TableError::InvalidId(id_spec.id.clone())),
        None => Err(TableError::MissingId(id_spec.id.clone())),
    }
}

/// Validate one cell value against its column declaration. Numeric
/// cells must be finite whatever the column kind: the persisted form is
/// JSON, which cannot represent NaN or infinities.
fn check_cell(spec: &ColSpec, value: &CellValue) -> Result<(), TableError> {
    if value.as_num().is_some_and(|n| !n.is_finite()) {
        return Err(TableError::NonFiniteValue(spec.id.clone()));
    }
    if spec.kind == ColKind::Score {
        check_score(spec, value)?;
    }
    Ok(())
}

fn check_score(spec: &ColSpec, value: &CellValue) -> Result<(), TableError> {
    if value.is_empty() {
        return Ok(());
    }
    let Some(n) = value.as_num() else {
        return Err(TableError::NonNumericScore(spec.id.clone()));
    };
    if let Some(range) = spec.range {
        if !range.contains(n) {
            return Err(TableError::OutOfRange {
                col_id: spec.id.clone(),
                value: n,
                min: range.min,
                max: range.max,
            });
        }
    }
    Ok(())
}

fn row_id<'a>(course: &CourseInfo, row: &'a RawRow) -> Option<&'a str> {
    row.get(&course.id_col().id)?
        .as_str()
        .filter(|s| !s.is_empty())
}

/// Course declaration order restricted to the columns `row` carries.
fn canonical_cols(course: &CourseInfo, row: &RawRow) -> Vec<String> {
    course
        .cols
        .iter()
        .filter(|c| row.contains_key(&c.id))
        .map(|c| c.id.clone())
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn calc_cell(course: &CourseInfo, row: &RawRow) -> CellValue {
    let scores: Vec<f64> = row
        .iter()
        .filter_map(|(col_id, value)| {
            course.col(col_id).filter(|c| c.kind == ColKind::Score)?;
            value.as_num()
        })
        .collect();
    if scores.is_empty() {
        return CellValue::empty();
    }
    let mean = scores.iter().sum::<f64>() / scores.len() as f64;
    CellValue::Num((mean * 10.0).round() / 10.0)
}
