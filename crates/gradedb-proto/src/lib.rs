//! GradeDB data model and query IR.
//!
//! This crate defines the plain data types shared across GradeDB: the
//! student/mark model, the mark and document filter IR, and the
//! aggregation pipeline IR. Evaluation and storage live in `gradedb-core`.
//!
//! # Modules
//!
//! - [`model`] - Students, marks, and derived result shapes
//! - [`filter`] - Predicates over mark lists and whole documents
//! - [`pipeline`] - Aggregation pipeline stages and the row model

pub mod filter;
pub mod model;
pub mod pipeline;

// Re-export commonly used types at crate root
pub use filter::{DocFilter, MarkPredicate};
pub use model::{Mark, Student, StudentAvgScore};
pub use pipeline::{Accumulator, Expr, Pipeline, Row, RowFilter, Stage, Value};
