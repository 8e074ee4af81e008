//! The static course registry.
//!
//! Tally serves a fixed set of courses. Each course declares the columns
//! its grade table may contain: exactly one id column, plus info, score,
//! and calculated columns. The catalog is built once at startup from
//! compiled-in definitions and shared immutably; "known course id"
//! everywhere in the workspace means membership here.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// The role a column plays in a grade table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColKind {
    /// Identifies the row. Each course declares exactly one.
    Id,
    /// Free-form text, like a section or an email address.
    Info,
    /// Numeric score with inclusive bounds.
    Score,
    /// Computed from score cells on demand; never stored.
    Calc,
}

impl ColKind {
    /// String form matching the serde representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Info => "info",
            Self::Score => "score",
            Self::Calc => "calc",
        }
    }

    /// Whether cells of this kind may appear in stored rows.
    #[must_use]
    pub const fn is_enterable(self) -> bool {
        !matches!(self, Self::Calc)
    }

    /// Whether a column of this kind may be added to an existing table.
    #[must_use]
    pub const fn is_addable(self) -> bool {
        matches!(self, Self::Info | Self::Score)
    }
}

impl fmt::Display for ColKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Inclusive bounds for a score column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreRange {
    pub min: f64,
    pub max: f64,
}

impl ScoreRange {
    #[must_use]
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Whether `value` lies within the bounds, endpoints included.
    #[must_use]
    pub fn contains(self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Declaration of one column of a course's grade table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColSpec {
    /// Key the column is stored under in row objects.
    pub id: String,
    /// Human-readable column name.
    pub name: String,
    pub kind: ColKind,
    /// Bounds for score columns; `None` for every other kind.
    pub range: Option<ScoreRange>,
}

impl ColSpec {
    #[must_use]
    pub fn id_col(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            kind: ColKind::Id,
            range: None,
        }
    }

    #[must_use]
    pub fn info(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            kind: ColKind::Info,
            range: None,
        }
    }

    #[must_use]
    pub fn score(id: &str, name: &str, min: f64, max: f64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            kind: ColKind::Score,
            range: Some(ScoreRange::new(min, max)),
        }
    }

    #[must_use]
    pub fn calc(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            kind: ColKind::Calc,
            range: None,
        }
    }
}

/// A course known to the registry and the columns its table may contain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseInfo {
    pub id: String,
    pub name: String,
    /// Declaration order is the canonical column order for the course.
    pub cols: Vec<ColSpec>,
}

impl CourseInfo {
    /// Look up a column declaration by id.
    #[must_use]
    pub fn col(&self, col_id: &str) -> Option<&ColSpec> {
        self.cols.iter().find(|c| c.id == col_id)
    }

    /// The id column of this course.
    ///
    /// # Panics
    ///
    /// Panics if the course declares no id column. Courses obtained from
    /// a [`CourseCatalog`] always have one; catalog construction rejects
    /// definitions without it.
    #[must_use]
    pub fn id_col(&self) -> &ColSpec {
        self.cols
            .iter()
            .find(|c| c.kind == ColKind::Id)
            .expect("course declares an id column")
    }
}

/// The fixed registry of known courses.
#[derive(Debug, Clone)]
pub struct CourseCatalog {
    courses: HashMap<String, CourseInfo>,
}

impl CourseCatalog {
    /// Build a catalog from course definitions.
    ///
    /// # Panics
    ///
    /// Panics if a course id repeats, a course does not declare exactly
    /// one id column, or a column id repeats within a course. Course
    /// definitions are compiled-in static data, so a malformed one is a
    /// programming error, not a runtime condition.
    #[must_use]
    pub fn new(courses: Vec<CourseInfo>) -> Self {
        let mut map = HashMap::with_capacity(courses.len());
        for course in courses {
            let id_cols = course
                .cols
                .iter()
                .filter(|c| c.kind == ColKind::Id)
                .count();
            assert_eq!(
                id_cols, 1,
                "course `{}` must declare exactly one id column",
                course.id
            );

            let mut seen = HashSet::with_capacity(course.cols.len());
            for col in &course.cols {
                assert!(
                    seen.insert(col.id.clone()),
                    "course `{}` declares column `{}` twice",
                    course.id,
                    col.id
                );
            }

            let course_id = course.id.clone();
            assert!(
                map.insert(course_id.clone(), course).is_none(),
                "duplicate course id `{course_id}`"
            );
        }
        Self { courses: map }
    }

    /// The built-in registry served by the production store.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new(vec![
            CourseInfo {
                id: "cs101".to_string(),
                name: "Introduction to Programming".to_string(),
                cols: vec![
                    ColSpec::id_col("studentId", "Student Id"),
                    ColSpec::info("section", "Section"),
                    ColSpec::score("hw1", "Homework 1", 0.0, 100.0),
                    ColSpec::score("hw2", "Homework 2", 0.0, 100.0),
                    ColSpec::score("hw3", "Homework 3", 0.0, 100.0),
                    ColSpec::score("final", "Final Exam", 0.0, 100.0),
                    ColSpec::calc("average", "Average"),
                ],
            },
            CourseInfo {
                id: "cs310".to_string(),
                name: "Data Structures and Algorithms".to_string(),
                cols: vec![
                    ColSpec::id_col("studentId", "Student Id"),
                    ColSpec::info("email", "Email"),
                    ColSpec::score("prj1", "Project 1", 0.0, 100.0),
                    ColSpec::score("prj2", "Project 2", 0.0, 100.0),
                    ColSpec::score("mid", "Midterm Exam", 0.0, 100.0),
                    ColSpec::score("final", "Final Exam", 0.0, 100.0),
                    ColSpec::calc("total", "Course Total"),
                ],
            },
            CourseInfo {
                id: "cs420".to_string(),
                name: "Database Systems".to_string(),
                cols: vec![
                    ColSpec::id_col("studentId", "Student Id"),
                    ColSpec::score("quiz1", "Quiz 1", 0.0, 10.0),
                    ColSpec::score("quiz2", "Quiz 2", 0.0, 10.0),
                    ColSpec::score("quiz3", "Quiz 3", 0.0, 10.0),
                    ColSpec::score("paper", "Term Paper", 0.0, 50.0),
                    ColSpec::calc("average", "Average"),
                ],
            },
        ])
    }

    /// Whether `course_id` names a known course.
    #[must_use]
    pub fn is_known(&self, course_id: &str) -> bool {
        self.courses.contains_key(course_id)
    }

    /// Look up a course by id.
    #[must_use]
    pub fn get(&self, course_id: &str) -> Option<&CourseInfo> {
        self.courses.get(course_id)
    }

    /// All known course ids, sorted.
    #[must_use]
    pub fn course_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.courses.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.courses.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }
}
