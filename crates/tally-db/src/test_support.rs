//! Shared test utilities for tally-db tests.

pub(crate) mod helpers {
    use tally_core::table::{CellValue, RawRow};

    use crate::service::GradesStore;

    /// In-memory store with the production table model.
    pub async fn test_store() -> GradesStore {
        GradesStore::open(":memory:").await.unwrap()
    }

    /// Build a row from (column id, cell) pairs.
    pub fn row(cells: &[(&str, CellValue)]) -> RawRow {
        cells
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    pub fn num(n: f64) -> CellValue {
        CellValue::Num(n)
    }

    pub fn text(s: &str) -> CellValue {
        CellValue::Str(s.to_string())
    }

    /// A minimal cs101 row: student id plus one homework score.
    pub fn cs101_row(student: &str, hw1: f64) -> RawRow {
        row(&[("studentId", text(student)), ("hw1", num(hw1))])
    }

    /// Number of stored course documents, via direct SQL.
    pub async fn count_documents(conn: &libsql::Connection) -> i64 {
        let mut rows = conn.query("SELECT count(*) FROM grades", ()).await.unwrap();
        rows.next().await.unwrap().unwrap().get::<i64>(0).unwrap()
    }

    /// The raw stored JSON for a course, if a document exists.
    pub async fn stored_json(conn: &libsql::Connection, course_id: &str) -> Option<String> {
        let mut rows = conn
            .query(
                "SELECT raw_table FROM grades WHERE course_id = ?1",
                [course_id],
            )
            .await
            .unwrap();
        rows.next()
            .await
            .unwrap()
            .map(|row| row.get::<String>(0).unwrap())
    }
}
