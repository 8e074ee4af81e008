//! # tally-core
//!
//! Shared types for the Tally grades workspace.
//!
//! This crate provides:
//! - `table`: the raw grade-table representation (cells, rows, patches)
//!   that the storage layer round-trips as JSON without interpreting
//! - `catalog`: the static course registry declaring which courses exist
//!   and which columns each course's table may contain
//!
//! Everything here is plain data. Table semantics (validation, merging,
//! calculated columns) live in `tally-model`; persistence lives in
//! `tally-db`.

pub mod catalog;
pub mod table;
