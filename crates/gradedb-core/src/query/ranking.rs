//! Ranked, aggregated views over the whole collection.

use std::collections::BTreeMap;

use tracing::debug;

use gradedb_proto::{Accumulator, Expr, Pipeline, RowFilter, StudentAvgScore, Value};

use crate::error::Error;
use crate::query::PipelineExecutor;
use crate::storage::StudentStore;

/// Pass threshold a mark must strictly exceed to count toward the "best
/// student" rank.
pub const DEFAULT_PASS_THRESHOLD: i32 = 80;

/// Computes ordered, aggregated views over the student collection.
///
/// All orderings are deterministic: ties are broken by ascending student
/// id, which falls out of stable sorts over rows that enter in
/// ascending-id order.
pub struct RankingEngine<'a> {
    store: &'a StudentStore,
}

impl<'a> RankingEngine<'a> {
    /// Create a new ranking engine borrowing the store.
    pub fn new(store: &'a StudentStore) -> Self {
        Self { store }
    }

    fn executor(&self) -> PipelineExecutor<'_> {
        PipelineExecutor::new(self.store)
    }

    /// Students whose mean score is strictly greater than `threshold`,
    /// best mean first.
    pub fn avg_score_above(&self, threshold: i32) -> Result<Vec<StudentAvgScore>, Error> {
        let pipeline = Pipeline::new()
            .unwind("marks")
            .group("id", Accumulator::Avg("marks.score".into()), "avg_score")
            .matching(RowFilter::gt("avg_score", Value::Float(threshold as f64)))
            .sort_desc("avg_score");
        let rows = self.executor().execute(&pipeline)?;

        let result: Vec<StudentAvgScore> = rows
            .iter()
            .filter_map(|row| {
                Some(StudentAvgScore {
                    id: row.get("id")?.as_i64()?,
                    avg_score: row.get("avg_score")?.as_f64()?,
                })
            })
            .collect();
        debug!(threshold, students = result.len(), "averages ranked");
        Ok(result)
    }

    /// Ids of the top `n` students by count of marks scoring strictly
    /// above `pass_threshold`.
    ///
    /// Students with no qualifying marks rank with count 0; they are never
    /// excluded. If `n` exceeds the collection, everyone ranks.
    pub fn best_students(&self, n: usize, pass_threshold: i32) -> Result<Vec<i64>, Error> {
        let pipeline = Pipeline::new()
            .unwind("marks")
            .matching(RowFilter::gt("marks.score", Value::Int(pass_threshold as i64)))
            .group("id", Accumulator::Count, "qualifying");
        let rows = self.executor().execute(&pipeline)?;

        // Students whose marks were all filtered out before grouping (or
        // who have none) still rank, with count 0.
        let mut counts: BTreeMap<i64, i64> = rows
            .iter()
            .filter_map(|row| Some((row.get("id")?.as_i64()?, row.get("qualifying")?.as_i64()?)))
            .collect();
        for id in self.store.student_ids()? {
            counts.entry(id).or_insert(0);
        }

        let mut ranked: Vec<(i64, i64)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(n);

        let ids: Vec<i64> = ranked.into_iter().map(|(id, _)| id).collect();
        debug!(n, pass_threshold, best = ?ids, "best students ranked");
        Ok(ids)
    }

    /// Ids of the `n` students with the lowest total score, worst first.
    ///
    /// A student with no marks totals 0 and sorts as the worst; no marks
    /// is the minimum, not an exclusion.
    pub fn worst_students(&self, n: usize) -> Result<Vec<i64>, Error> {
        let pipeline = Pipeline::new()
            .project(vec![
                ("id".into(), Expr::field("id")),
                ("total".into(), Expr::sum("marks.score")),
            ])
            .sort_asc("total")
            .limit(n);
        let rows = self.executor().execute(&pipeline)?;

        let ids: Vec<i64> = rows.iter().filter_map(|row| row.get("id")?.as_i64()).collect();
        debug!(n, worst = ?ids, "worst students ranked");
        Ok(ids)
    }
}
