//! Mark predicate evaluation.
//!
//! Pure functions over a student's mark list implementing the named filter
//! conditions. Every predicate is total over any list, including the empty
//! one. The "all marks above" conditions are conjunctive over existing
//! marks: an empty list (or an empty subject slice) never satisfies them.

use chrono::{Months, NaiveDate};

use gradedb_proto::{DocFilter, Mark, MarkPredicate};

use crate::storage::StudentDoc;

/// Evaluate a mark predicate against a mark list.
pub fn matches(predicate: &MarkPredicate, marks: &[Mark]) -> bool {
    match predicate {
        MarkPredicate::DateEquals(date) => marks.iter().any(|m| m.date == *date),
        MarkPredicate::DateRange { from, to } => {
            marks.iter().any(|m| m.date >= *from && m.date <= *to)
        }
        MarkPredicate::SubjectScoreGt { subject, threshold } => marks
            .iter()
            .any(|m| m.subject == *subject && m.score > *threshold),
        MarkPredicate::AllAbove { threshold } => {
            !marks.is_empty() && marks.iter().all(|m| m.score > *threshold)
        }
        MarkPredicate::AllAboveInSubject { subject, threshold } => {
            let mut in_subject = marks.iter().filter(|m| m.subject == *subject).peekable();
            in_subject.peek().is_some() && in_subject.all(|m| m.score > *threshold)
        }
        MarkPredicate::CountLt { n } => marks.len() < *n,
        MarkPredicate::CountBetween { min, max } => (*min..=*max).contains(&marks.len()),
    }
}

/// Evaluate a document filter against a full document.
pub fn doc_matches(filter: &DocFilter, doc: &StudentDoc) -> bool {
    match filter {
        DocFilter::All => true,
        DocFilter::PhoneEquals(phone) => doc.phone == *phone,
        DocFilter::PhonePrefix(prefix) => doc.phone.starts_with(prefix.as_str()),
        DocFilter::Marks(predicate) => matches(predicate, &doc.marks),
    }
}

/// Evaluate a contact-level filter against a phone number alone.
///
/// Mark filters cannot be decided from the contact projection and never
/// match here; callers check [`DocFilter::needs_marks`] first.
pub fn phone_matches(filter: &DocFilter, phone: &str) -> bool {
    match filter {
        DocFilter::All => true,
        DocFilter::PhoneEquals(p) => phone == p,
        DocFilter::PhonePrefix(p) => phone.starts_with(p.as_str()),
        DocFilter::Marks(_) => false,
    }
}

/// Closed date interval covering one calendar month.
///
/// Respects variable month lengths and leap years. Returns `None` when
/// `month` is outside `1..=12`.
pub fn month_range(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let from = NaiveDate::from_ymd_opt(year, month, 1)?;
    let to = from.checked_add_months(Months::new(1))?.pred_opt()?;
    Some((from, to))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn marks() -> Vec<Mark> {
        vec![
            Mark::new("Math", 90, date(2024, 1, 15)),
            Mark::new("Physics", 85, date(2024, 1, 20)),
            Mark::new("Math", 70, date(2024, 2, 10)),
        ]
    }

    #[test]
    fn test_date_equals() {
        let marks = marks();
        assert!(matches(&MarkPredicate::date_equals(date(2024, 1, 20)), &marks));
        assert!(!matches(&MarkPredicate::date_equals(date(2024, 1, 21)), &marks));
        assert!(!matches(&MarkPredicate::date_equals(date(2024, 1, 20)), &[]));
    }

    #[test]
    fn test_date_range_is_closed() {
        let marks = marks();
        // Both endpoints inclusive
        let p = MarkPredicate::date_range(date(2024, 2, 10), date(2024, 2, 10));
        assert!(matches(&p, &marks));

        let p = MarkPredicate::date_range(date(2024, 2, 11), date(2024, 12, 31));
        assert!(!matches(&p, &marks));
    }

    #[test]
    fn test_subject_score_gt_is_strict() {
        let marks = marks();
        assert!(matches(&MarkPredicate::subject_score_gt("Math", 89), &marks));
        assert!(!matches(&MarkPredicate::subject_score_gt("Math", 90), &marks));
        // Score above threshold but wrong subject
        assert!(!matches(&MarkPredicate::subject_score_gt("History", 50), &marks));
    }

    #[test]
    fn test_all_above_never_vacuous() {
        assert!(!matches(&MarkPredicate::all_above(0), &[]));
        assert!(!matches(&MarkPredicate::all_above(-100), &[]));

        let marks = marks();
        assert!(matches(&MarkPredicate::all_above(69), &marks));
        assert!(!matches(&MarkPredicate::all_above(70), &marks));
    }

    #[test]
    fn test_all_above_in_subject() {
        let marks = marks();
        assert!(matches(&MarkPredicate::all_above_in_subject("Math", 69), &marks));
        assert!(!matches(&MarkPredicate::all_above_in_subject("Math", 70), &marks));
        // No marks in the subject is not a pass
        assert!(!matches(&MarkPredicate::all_above_in_subject("History", 0), &marks));
        assert!(!matches(&MarkPredicate::all_above_in_subject("Math", 0), &[]));
    }

    #[test]
    fn test_count_lt() {
        let marks = marks();
        assert!(matches(&MarkPredicate::count_lt(4), &marks));
        assert!(!matches(&MarkPredicate::count_lt(3), &marks));
        // Zero-mark students are counted
        assert!(matches(&MarkPredicate::count_lt(1), &[]));
    }

    #[test]
    fn test_count_between_inclusive() {
        let marks = marks();
        assert!(matches(&MarkPredicate::count_between(3, 3), &marks));
        assert!(matches(&MarkPredicate::count_between(1, 3), &marks));
        assert!(!matches(&MarkPredicate::count_between(4, 10), &marks));
        assert!(matches(&MarkPredicate::count_between(0, 0), &[]));
    }

    #[test]
    fn test_doc_filters() {
        let mut doc = StudentDoc::new(1, "051-1111111");
        doc.marks = marks();

        assert!(doc_matches(&DocFilter::All, &doc));
        assert!(doc_matches(&DocFilter::PhoneEquals("051-1111111".into()), &doc));
        assert!(!doc_matches(&DocFilter::PhoneEquals("051".into()), &doc));
        assert!(doc_matches(&DocFilter::PhonePrefix("051".into()), &doc));
        assert!(!doc_matches(&DocFilter::PhonePrefix("052".into()), &doc));
        assert!(doc_matches(
            &DocFilter::Marks(MarkPredicate::subject_score_gt("Math", 80)),
            &doc
        ));
    }

    #[test]
    fn test_phone_matches_never_decides_marks() {
        let filter = DocFilter::Marks(MarkPredicate::count_lt(10));
        assert!(!phone_matches(&filter, "051-1111111"));
        assert!(phone_matches(&DocFilter::All, "051-1111111"));
    }

    #[test]
    fn test_month_range_leap_february() {
        let (from, to) = month_range(2024, 2).unwrap();
        assert_eq!(from, date(2024, 2, 1));
        assert_eq!(to, date(2024, 2, 29));

        let (_, to) = month_range(2025, 2).unwrap();
        assert_eq!(to, date(2025, 2, 28));
    }

    #[test]
    fn test_month_range_lengths_and_year_wrap() {
        let (_, to) = month_range(2024, 4).unwrap();
        assert_eq!(to, date(2024, 4, 30));

        let (from, to) = month_range(2024, 12).unwrap();
        assert_eq!(from, date(2024, 12, 1));
        assert_eq!(to, date(2024, 12, 31));
    }

    #[test]
    fn test_month_range_invalid_month() {
        assert!(month_range(2024, 0).is_none());
        assert!(month_range(2024, 13).is_none());
    }
}
