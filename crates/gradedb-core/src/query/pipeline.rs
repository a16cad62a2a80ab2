//! Pipeline execution over the student collection.
//!
//! Seeds one row per stored document (contact fields plus the marks list
//! as an embedded list value) and folds the pipeline stages over the row
//! set. Rows enter in ascending-id order and every sort is stable, so
//! equal sort keys keep ascending-id order throughout.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use gradedb_proto::{Accumulator, DocFilter, Expr, Pipeline, Row, RowFilter, Stage, Value};

use crate::error::Error;
use crate::storage::{StudentDoc, StudentStore};

/// Executes aggregation pipelines against the store.
pub struct PipelineExecutor<'a> {
    store: &'a StudentStore,
}

impl<'a> PipelineExecutor<'a> {
    /// Create a new executor borrowing the store.
    pub fn new(store: &'a StudentStore) -> Self {
        Self { store }
    }

    /// Run a pipeline over every student document.
    pub fn execute(&self, pipeline: &Pipeline) -> Result<Vec<Row>, Error> {
        let docs = self.store.scan(&DocFilter::All)?;
        let mut rows: Vec<Row> = docs.iter().map(doc_row).collect();
        for stage in &pipeline.stages {
            rows = apply_stage(stage, rows);
        }
        Ok(rows)
    }
}

/// Row representation of a stored document.
fn doc_row(doc: &StudentDoc) -> Row {
    let marks = doc
        .marks
        .iter()
        .map(|m| {
            Row::new()
                .with("subject", Value::Str(m.subject.clone()))
                .with("score", Value::Int(m.score as i64))
                .with("date", Value::Date(m.date))
        })
        .collect();
    Row::new()
        .with("id", Value::Int(doc.id))
        .with("phone", Value::Str(doc.phone.clone()))
        .with("marks", Value::List(marks))
}

fn apply_stage(stage: &Stage, rows: Vec<Row>) -> Vec<Row> {
    match stage {
        Stage::Unwind(field) => unwind(field, rows),
        Stage::Match(filter) => rows
            .into_iter()
            .filter(|row| row_matches(filter, row))
            .collect(),
        Stage::Group {
            by,
            accumulator,
            output,
        } => group(by, accumulator, output, rows),
        Stage::Sort { field, descending } => sort(field, *descending, rows),
        Stage::Limit(n) => {
            let mut rows = rows;
            rows.truncate(*n);
            rows
        }
        Stage::Project(exprs) => rows.into_iter().map(|row| project(exprs, &row)).collect(),
    }
}

/// One output row per element of the list field; element fields appear
/// under dotted names. Rows without elements vanish.
fn unwind(field: &str, rows: Vec<Row>) -> Vec<Row> {
    let mut out = Vec::new();
    for row in rows {
        let Some(Value::List(elements)) = row.get(field) else {
            continue;
        };
        for element in elements {
            let mut unwound = Row::new();
            for (name, value) in row.fields() {
                if name != field {
                    unwound.push(name.clone(), value.clone());
                }
            }
            for (name, value) in element.fields() {
                unwound.push(format!("{field}.{name}"), value.clone());
            }
            out.push(unwound);
        }
    }
    out
}

/// Evaluate a row filter against a row.
pub fn row_matches(filter: &RowFilter, row: &Row) -> bool {
    match filter {
        RowFilter::Eq { field, value } => cmp(row, field, value).is_some_and(Ordering::is_eq),
        RowFilter::Ne { field, value } => cmp(row, field, value).is_some_and(Ordering::is_ne),
        RowFilter::Lt { field, value } => cmp(row, field, value).is_some_and(Ordering::is_lt),
        RowFilter::Le { field, value } => cmp(row, field, value).is_some_and(Ordering::is_le),
        RowFilter::Gt { field, value } => cmp(row, field, value).is_some_and(Ordering::is_gt),
        RowFilter::Ge { field, value } => cmp(row, field, value).is_some_and(Ordering::is_ge),
        RowFilter::Between { field, from, to } => {
            cmp(row, field, from).is_some_and(Ordering::is_ge)
                && cmp(row, field, to).is_some_and(Ordering::is_le)
        }
        RowFilter::And(filters) => filters.iter().all(|f| row_matches(f, row)),
        RowFilter::Or(filters) => filters.iter().any(|f| row_matches(f, row)),
    }
}

fn cmp(row: &Row, field: &str, value: &Value) -> Option<Ordering> {
    compare_values(row.get(field)?, value)
}

/// Compare two values, returning their ordering if comparable.
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
        (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
        _ => None, // Incompatible types
    }
}

/// Group keys must be totally ordered; only integer and string keys occur
/// in practice.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum GroupKey {
    Int(i64),
    Str(String),
}

impl GroupKey {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(i) => Some(GroupKey::Int(*i)),
            Value::Str(s) => Some(GroupKey::Str(s.clone())),
            _ => None,
        }
    }

    fn into_value(self) -> Value {
        match self {
            GroupKey::Int(i) => Value::Int(i),
            GroupKey::Str(s) => Value::Str(s),
        }
    }
}

#[derive(Default)]
struct GroupAcc {
    rows: u64,
    samples: u64,
    sum: f64,
}

fn group(by: &str, accumulator: &Accumulator, output: &str, rows: Vec<Row>) -> Vec<Row> {
    // BTreeMap keyed by the group key, so grouped rows emerge in ascending
    // key order and later stable sorts break ties by key.
    let mut groups: BTreeMap<GroupKey, GroupAcc> = BTreeMap::new();
    for row in &rows {
        let Some(key) = row.get(by).and_then(GroupKey::from_value) else {
            continue;
        };
        let acc = groups.entry(key).or_default();
        acc.rows += 1;
        if let Accumulator::Sum(field) | Accumulator::Avg(field) = accumulator {
            if let Some(v) = row.get(field).and_then(Value::as_f64) {
                acc.samples += 1;
                acc.sum += v;
            }
        }
    }

    groups
        .into_iter()
        .map(|(key, acc)| {
            let value = match accumulator {
                Accumulator::Count => Value::Int(acc.rows as i64),
                Accumulator::Sum(_) => Value::Float(acc.sum),
                Accumulator::Avg(_) => {
                    if acc.samples > 0 {
                        Value::Float(acc.sum / acc.samples as f64)
                    } else {
                        Value::Null
                    }
                }
            };
            Row::new()
                .with(by, key.into_value())
                .with(output, value)
        })
        .collect()
}

fn sort(field: &str, descending: bool, mut rows: Vec<Row>) -> Vec<Row> {
    rows.sort_by(|a, b| {
        let ordering = match (a.get(field), b.get(field)) {
            (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        if descending {
            ordering.reverse()
        } else {
            ordering
        }
    });
    rows
}

fn project(exprs: &[(String, Expr)], row: &Row) -> Row {
    let mut out = Row::new();
    for (name, expr) in exprs {
        out.push(name.clone(), eval_expr(expr, row));
    }
    out
}

/// Evaluate a projection expression against a row.
fn eval_expr(expr: &Expr, row: &Row) -> Value {
    match expr {
        Expr::Field(name) => row.get(name).cloned().unwrap_or(Value::Null),
        Expr::Sum(path) => {
            let (sum, _) = fold_list(path, row);
            Value::Float(sum)
        }
        Expr::Count(path) => {
            let (list, attr) = split_path(path);
            match row.get(list) {
                Some(Value::List(elements)) => match attr {
                    None => Value::Int(elements.len() as i64),
                    Some(attr) => Value::Int(
                        elements
                            .iter()
                            .filter(|e| {
                                e.get(attr).is_some_and(|v| !matches!(v, Value::Null))
                            })
                            .count() as i64,
                    ),
                },
                _ => Value::Int(0),
            }
        }
        Expr::Avg(path) => {
            let (sum, samples) = fold_list(path, row);
            if samples > 0 {
                Value::Float(sum / samples as f64)
            } else {
                Value::Null
            }
        }
    }
}

fn split_path(path: &str) -> (&str, Option<&str>) {
    match path.split_once('.') {
        Some((list, attr)) => (list, Some(attr)),
        None => (path, None),
    }
}

/// Sum and sample count of a numeric attribute over an embedded list.
/// A missing or empty list folds to `(0.0, 0)`.
fn fold_list(path: &str, row: &Row) -> (f64, u64) {
    let (list, attr) = split_path(path);
    let Some(Value::List(elements)) = row.get(list) else {
        return (0.0, 0);
    };
    let mut sum = 0.0;
    let mut samples = 0;
    for element in elements {
        let value = attr.and_then(|a| element.get(a));
        if let Some(v) = value.and_then(Value::as_f64) {
            sum += v;
            samples += 1;
        }
    }
    (sum, samples)
}
