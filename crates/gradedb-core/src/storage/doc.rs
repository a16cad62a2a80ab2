//! Persisted student document and its projections.

use gradedb_proto::{Mark, Student};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// The persisted student document: contact fields plus the embedded,
/// insertion-ordered mark list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentDoc {
    /// Primary key.
    pub id: i64,

    /// Contact phone number.
    pub phone: String,

    /// Marks in insertion order. Possibly empty, unbounded.
    pub marks: Vec<Mark>,
}

impl StudentDoc {
    /// Create a document with no marks.
    pub fn new(id: i64, phone: impl Into<String>) -> Self {
        Self {
            id,
            phone: phone.into(),
            marks: Vec::new(),
        }
    }

    /// Project the API student shape (id + phone).
    pub fn student(&self) -> Student {
        Student::new(self.id, self.phone.clone())
    }

    /// Serialize the document to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserialize a document from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Contact-only partial decode; the marks payload is skipped.
#[derive(Debug, Deserialize)]
pub(crate) struct ContactProjection {
    pub id: i64,
    pub phone: String,
}

impl ContactProjection {
    pub(crate) fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub(crate) fn student(self) -> Student {
        Student::new(self.id, self.phone)
    }
}

/// Marks-only partial decode; contact fields are skipped.
#[derive(Debug, Deserialize)]
pub(crate) struct MarksProjection {
    pub marks: Vec<Mark>,
}

impl MarksProjection {
    pub(crate) fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_doc_roundtrip() {
        let mut doc = StudentDoc::new(1, "051-1111111");
        doc.marks.push(Mark::new("Math", 90, date(2024, 2, 10)));

        let bytes = doc.to_bytes().unwrap();
        let decoded = StudentDoc::from_bytes(&bytes).unwrap();
        assert_eq!(doc, decoded);
    }

    #[test]
    fn test_contact_projection_skips_marks() {
        let mut doc = StudentDoc::new(7, "053-7777777");
        doc.marks.push(Mark::new("Physics", 85, date(2024, 1, 20)));
        let bytes = doc.to_bytes().unwrap();

        let contact = ContactProjection::from_bytes(&bytes).unwrap();
        assert_eq!(contact.id, 7);
        assert_eq!(contact.phone, "053-7777777");
    }

    #[test]
    fn test_marks_projection() {
        let mut doc = StudentDoc::new(7, "053-7777777");
        doc.marks.push(Mark::new("Physics", 85, date(2024, 1, 20)));
        let bytes = doc.to_bytes().unwrap();

        let marks = MarksProjection::from_bytes(&bytes).unwrap().marks;
        assert_eq!(marks, doc.marks);
    }

    #[test]
    fn test_student_shape() {
        let doc = StudentDoc::new(3, "051-3333333");
        assert_eq!(doc.student(), Student::new(3, "051-3333333"));
    }
}
