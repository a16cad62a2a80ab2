//! Aggregation pipeline IR.
//!
//! A [`Pipeline`] is a declarative sequence of stages executed against the
//! student collection: unwind an embedded list into one row per element,
//! match rows on any field, group by a key with count/sum/avg accumulators,
//! sort by a field, limit to N rows, and project a subset of fields
//! including computed list expressions.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A runtime value carried through pipeline rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Absent or undefined value.
    Null,
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit floating point.
    Float(f64),
    /// UTF-8 string.
    Str(String),
    /// Calendar date.
    Date(NaiveDate),
    /// An embedded list of sub-documents (e.g. the `marks` field).
    List(Vec<Row>),
}

impl Value {
    /// Try to get as i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get as f64. Integers widen.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get as string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as date.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Try to get as list reference.
    pub fn as_list(&self) -> Option<&[Row]> {
        match self {
            Value::List(rows) => Some(rows),
            _ => None,
        }
    }
}

/// A row of named field values flowing through a pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    fields: Vec<(String, Value)>,
}

impl Row {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field, builder style.
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.push(name, value);
        self
    }

    /// Append a field.
    pub fn push(&mut self, name: impl Into<String>, value: Value) {
        self.fields.push((name.into(), value));
    }

    /// Get a field value by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// All fields in insertion order.
    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }
}

/// A filter over pipeline rows.
///
/// Comparisons against a missing field never match; `Between` is inclusive
/// on both ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RowFilter {
    /// Field equals value.
    Eq { field: String, value: Value },
    /// Field differs from value (field must be present and comparable).
    Ne { field: String, value: Value },
    /// Field strictly less than value.
    Lt { field: String, value: Value },
    /// Field less than or equal to value.
    Le { field: String, value: Value },
    /// Field strictly greater than value.
    Gt { field: String, value: Value },
    /// Field greater than or equal to value.
    Ge { field: String, value: Value },
    /// Field within `[from, to]`.
    Between {
        field: String,
        from: Value,
        to: Value,
    },
    /// All conditions hold.
    And(Vec<RowFilter>),
    /// Any condition holds.
    Or(Vec<RowFilter>),
}

impl RowFilter {
    /// Field equals value.
    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Self::Eq {
            field: field.into(),
            value,
        }
    }

    /// Field strictly greater than value.
    pub fn gt(field: impl Into<String>, value: Value) -> Self {
        Self::Gt {
            field: field.into(),
            value,
        }
    }

    /// Field within `[from, to]`.
    pub fn between(field: impl Into<String>, from: Value, to: Value) -> Self {
        Self::Between {
            field: field.into(),
            from,
            to,
        }
    }
}

/// Accumulator folded over each group of rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Accumulator {
    /// Number of rows in the group.
    Count,
    /// Sum of a numeric field over the group.
    Sum(String),
    /// Arithmetic mean of a numeric field over the group. Empty sample
    /// sets yield null.
    Avg(String),
}

/// A projection expression.
///
/// List expressions take a dotted `list.attr` path and fold the embedded
/// list in place: a missing or empty list sums and counts to zero and
/// averages to null, so documents without elements still project a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Copy a field through.
    Field(String),
    /// Sum of `attr` over the elements of the list field.
    Sum(String),
    /// Count of elements (plain list name) or of elements carrying the
    /// attribute (dotted path).
    Count(String),
    /// Mean of `attr` over the elements of the list field.
    Avg(String),
}

impl Expr {
    /// Copy a field through.
    pub fn field(name: impl Into<String>) -> Self {
        Self::Field(name.into())
    }

    /// Sum over a `list.attr` path.
    pub fn sum(path: impl Into<String>) -> Self {
        Self::Sum(path.into())
    }

    /// Count over a list field or `list.attr` path.
    pub fn count(path: impl Into<String>) -> Self {
        Self::Count(path.into())
    }

    /// Mean over a `list.attr` path.
    pub fn avg(path: impl Into<String>) -> Self {
        Self::Avg(path.into())
    }
}

/// A single pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stage {
    /// Replace each row with one row per element of the named list field.
    /// Element fields are exposed under dotted names (`marks.score`); rows
    /// whose list is empty or missing produce no output rows.
    Unwind(String),

    /// Keep rows matching the filter.
    Match(RowFilter),

    /// Group rows by a key field and fold each group with the accumulator.
    /// Output rows carry the key field and the accumulated value under
    /// `output`, in ascending key order.
    Group {
        by: String,
        accumulator: Accumulator,
        output: String,
    },

    /// Stable sort by a field. Rows missing the field sort first.
    Sort { field: String, descending: bool },

    /// Keep at most the first `n` rows.
    Limit(usize),

    /// Project each row to the named expressions, in order.
    Project(Vec<(String, Expr)>),
}

/// An ordered sequence of stages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    /// Stages applied in order.
    pub stages: Vec<Stage>,
}

impl Pipeline {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an unwind stage.
    pub fn unwind(mut self, field: impl Into<String>) -> Self {
        self.stages.push(Stage::Unwind(field.into()));
        self
    }

    /// Append a match stage.
    pub fn matching(mut self, filter: RowFilter) -> Self {
        self.stages.push(Stage::Match(filter));
        self
    }

    /// Append a group stage.
    pub fn group(
        mut self,
        by: impl Into<String>,
        accumulator: Accumulator,
        output: impl Into<String>,
    ) -> Self {
        self.stages.push(Stage::Group {
            by: by.into(),
            accumulator,
            output: output.into(),
        });
        self
    }

    /// Append an ascending sort stage.
    pub fn sort_asc(mut self, field: impl Into<String>) -> Self {
        self.stages.push(Stage::Sort {
            field: field.into(),
            descending: false,
        });
        self
    }

    /// Append a descending sort stage.
    pub fn sort_desc(mut self, field: impl Into<String>) -> Self {
        self.stages.push(Stage::Sort {
            field: field.into(),
            descending: true,
        });
        self
    }

    /// Append a limit stage.
    pub fn limit(mut self, n: usize) -> Self {
        self.stages.push(Stage::Limit(n));
        self
    }

    /// Append a projection stage.
    pub fn project(mut self, exprs: Vec<(String, Expr)>) -> Self {
        self.stages.push(Stage::Project(exprs));
        self
    }
}
