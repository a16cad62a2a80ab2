//! Filter IR over students and their embedded marks.
//!
//! These types describe *what* to match; evaluation lives in the core
//! query module so the IR stays free of storage concerns.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A predicate over a student's mark list.
///
/// Every variant is a pure, total condition over any mark list, including
/// the empty one. The `AllAbove*` conditions are conjunctive over existing
/// marks and are never vacuously true for an empty list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkPredicate {
    /// Some mark is dated exactly this date.
    DateEquals(NaiveDate),

    /// Some mark's date lies in the closed interval `[from, to]`.
    DateRange { from: NaiveDate, to: NaiveDate },

    /// Some mark in `subject` has a score strictly greater than `threshold`.
    SubjectScoreGt { subject: String, threshold: i32 },

    /// The list is non-empty and every score is strictly greater than
    /// `threshold`.
    AllAbove { threshold: i32 },

    /// As `AllAbove`, restricted to marks in `subject`. A student with no
    /// marks in that subject does not satisfy it.
    AllAboveInSubject { subject: String, threshold: i32 },

    /// Fewer than `n` marks (strict).
    CountLt { n: usize },

    /// Mark count in `[min, max]`, inclusive on both ends.
    CountBetween { min: usize, max: usize },
}

impl MarkPredicate {
    /// Marks dated exactly `date`.
    pub fn date_equals(date: NaiveDate) -> Self {
        Self::DateEquals(date)
    }

    /// Marks dated within `[from, to]`.
    pub fn date_range(from: NaiveDate, to: NaiveDate) -> Self {
        Self::DateRange { from, to }
    }

    /// A mark in `subject` scoring strictly above `threshold`.
    pub fn subject_score_gt(subject: impl Into<String>, threshold: i32) -> Self {
        Self::SubjectScoreGt {
            subject: subject.into(),
            threshold,
        }
    }

    /// All marks scoring strictly above `threshold`.
    pub fn all_above(threshold: i32) -> Self {
        Self::AllAbove { threshold }
    }

    /// All marks in `subject` scoring strictly above `threshold`.
    pub fn all_above_in_subject(subject: impl Into<String>, threshold: i32) -> Self {
        Self::AllAboveInSubject {
            subject: subject.into(),
            threshold,
        }
    }

    /// Fewer than `n` marks.
    pub fn count_lt(n: usize) -> Self {
        Self::CountLt { n }
    }

    /// Between `min` and `max` marks, inclusive.
    pub fn count_between(min: usize, max: usize) -> Self {
        Self::CountBetween { min, max }
    }
}

/// A filter over whole student documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocFilter {
    /// Every document matches.
    All,

    /// Phone equals the given string exactly.
    PhoneEquals(String),

    /// Phone starts with the given prefix.
    PhonePrefix(String),

    /// The embedded mark list satisfies the predicate.
    Marks(MarkPredicate),
}

impl DocFilter {
    /// Whether evaluating this filter requires the marks payload.
    ///
    /// Scans use this to decode only the contact projection when possible.
    pub fn needs_marks(&self) -> bool {
        matches!(self, DocFilter::Marks(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructor_shapes() {
        let p = MarkPredicate::subject_score_gt("Math", 80);
        assert_eq!(
            p,
            MarkPredicate::SubjectScoreGt {
                subject: "Math".into(),
                threshold: 80
            }
        );

        let p = MarkPredicate::count_between(2, 5);
        assert_eq!(p, MarkPredicate::CountBetween { min: 2, max: 5 });
    }

    #[test]
    fn test_needs_marks() {
        assert!(!DocFilter::All.needs_marks());
        assert!(!DocFilter::PhoneEquals("051".into()).needs_marks());
        assert!(!DocFilter::PhonePrefix("051".into()).needs_marks());
        assert!(DocFilter::Marks(MarkPredicate::count_lt(3)).needs_marks());
    }
}
