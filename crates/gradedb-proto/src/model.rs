//! Data model types for students and their subject marks.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single subject mark.
///
/// Marks are value objects: two marks are equal when subject, score, and
/// date are all equal. A mark is never modified once appended to a
/// student's list; corrections are recorded as additional marks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mark {
    /// Subject the mark was given in.
    pub subject: String,

    /// Score, conventionally in 0-100 but not constrained here.
    pub score: i32,

    /// Calendar date of the mark. No time component.
    pub date: NaiveDate,
}

impl Mark {
    /// Create a new mark.
    pub fn new(subject: impl Into<String>, score: i32, date: NaiveDate) -> Self {
        Self {
            subject: subject.into(),
            score,
            date,
        }
    }
}

/// A student in the API shape: identity plus contact.
///
/// The embedded mark list is a storage-level concern; lookups that need it
/// fetch the marks projection separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    /// Externally assigned unique id. Never regenerated.
    pub id: i64,

    /// Contact phone number. An opaque, mutable string, used as a lookup
    /// key but not guaranteed unique.
    pub phone: String,
}

impl Student {
    /// Create a new student.
    pub fn new(id: i64, phone: impl Into<String>) -> Self {
        Self {
            id,
            phone: phone.into(),
        }
    }
}

/// A student id paired with the mean of its mark scores, produced by the
/// average-score ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentAvgScore {
    /// Student id.
    pub id: i64,

    /// Arithmetic mean of the student's scores.
    pub avg_score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_mark_equality_is_structural() {
        let a = Mark::new("Math", 90, date(2024, 2, 10));
        let b = Mark::new("Math", 90, date(2024, 2, 10));
        assert_eq!(a, b);

        assert_ne!(a, Mark::new("Physics", 90, date(2024, 2, 10)));
        assert_ne!(a, Mark::new("Math", 91, date(2024, 2, 10)));
        assert_ne!(a, Mark::new("Math", 90, date(2024, 2, 11)));
    }

    #[test]
    fn test_student_constructor() {
        let student = Student::new(1, "051-1111111");
        assert_eq!(student.id, 1);
        assert_eq!(student.phone, "051-1111111");
    }
}
