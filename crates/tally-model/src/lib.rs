//! # tally-model
//!
//! The table-model collaborator for Tally. Every structural and semantic
//! rule of a grade table lives here: which columns a row may carry, score
//! range checks, insert-or-replace merging, column addition, cell-level
//! patching, and on-demand calculated columns.
//!
//! The rules sit behind the [`TableModel`] capability trait so the
//! storage layer in `tally-db` never interprets table contents itself;
//! it hands raw tables to a model and persists whatever comes back.
//! [`CourseTableModel`] is the production implementation; tests swap in
//! stubs to drive the storage protocol down unhappy paths.
//!
//! Everything in this crate is pure and synchronous.

pub mod error;
pub mod grades;

pub use error::TableError;
pub use grades::{CourseTableModel, Grades, TableModel};
