//! GradeDB Core - document store adapter, query engine, and service.
//!
//! This crate provides the engine behind GradeDB: a sled-backed document
//! store for student records, pure predicate evaluation over embedded mark
//! lists, an aggregation pipeline executor, ranking queries, and the
//! [`StudentsService`] orchestrator that ties them together.

pub mod error;
pub mod query;
pub mod service;
pub mod storage;

pub use error::Error;
pub use query::{month_range, PipelineExecutor, RankingEngine, DEFAULT_PASS_THRESHOLD};
pub use service::StudentsService;
pub use storage::{StorageConfig, StudentDoc, StudentStore};

/// Re-export the data model and query IR.
pub use gradedb_proto as proto;
