//! Document store adapter over sled.

use sled::{Db, Tree};
use tracing::debug;

use gradedb_proto::{DocFilter, Mark, Student};

use super::doc::{ContactProjection, MarksProjection};
use super::{StorageConfig, StudentDoc};
use crate::error::Error;
use crate::query::predicate;

/// Tree name for student documents.
const DOCS_TREE: &str = "students";

/// The student document store.
///
/// Documents are keyed by student id with an order-preserving encoding, so
/// every scan yields ascending-id order. Mutation of a single document goes
/// through sled compare-and-swap: documents of different students can be
/// written fully in parallel, while concurrent writes to the same student
/// serialize per document.
pub struct StudentStore {
    db: Db,
    docs: Tree,
}

/// Order-preserving key encoding: the sign bit is flipped so negative ids
/// sort before positive ones in the byte order sled uses.
fn encode_key(id: i64) -> [u8; 8] {
    ((id as u64) ^ (1 << 63)).to_be_bytes()
}

fn decode_key(bytes: &[u8]) -> Option<i64> {
    let raw: [u8; 8] = bytes.try_into().ok()?;
    Some((u64::from_be_bytes(raw) ^ (1 << 63)) as i64)
}

impl StudentStore {
    /// Open or create a store with the given configuration.
    pub fn open(config: StorageConfig) -> Result<Self, Error> {
        let db = config.to_sled_config().open()?;
        let docs = db.open_tree(DOCS_TREE)?;
        Ok(Self { db, docs })
    }

    /// Point lookup by id.
    pub fn get(&self, id: i64) -> Result<Option<StudentDoc>, Error> {
        match self.docs.get(encode_key(id))? {
            Some(bytes) => Ok(Some(StudentDoc::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Contact-only projected lookup; the marks payload is not decoded.
    pub fn get_contact(&self, id: i64) -> Result<Option<Student>, Error> {
        match self.docs.get(encode_key(id))? {
            Some(bytes) => Ok(Some(ContactProjection::from_bytes(&bytes)?.student())),
            None => Ok(None),
        }
    }

    /// Marks-only projected lookup; contact fields are not decoded.
    pub fn get_marks(&self, id: i64) -> Result<Option<Vec<Mark>>, Error> {
        match self.docs.get(encode_key(id))? {
            Some(bytes) => Ok(Some(MarksProjection::from_bytes(&bytes)?.marks)),
            None => Ok(None),
        }
    }

    /// Check whether a student exists.
    pub fn exists(&self, id: i64) -> Result<bool, Error> {
        Ok(self.docs.contains_key(encode_key(id))?)
    }

    /// Insert-or-replace a document.
    pub fn put(&self, doc: &StudentDoc) -> Result<(), Error> {
        self.docs.insert(encode_key(doc.id), doc.to_bytes()?)?;
        Ok(())
    }

    /// Insert only if the id is absent. Returns false when it is taken.
    pub fn create(&self, doc: &StudentDoc) -> Result<bool, Error> {
        let swapped =
            self.docs
                .compare_and_swap(encode_key(doc.id), None::<&[u8]>, Some(doc.to_bytes()?))?;
        Ok(swapped.is_ok())
    }

    /// Per-document compare-and-swap read-modify-write.
    ///
    /// `f` receives the current document and returns the replacement; an
    /// error from `f` aborts the update and propagates. The swap retries
    /// until it lands against an unchanged document, so `f` may run more
    /// than once and must be pure.
    ///
    /// Returns `None` when the student does not exist.
    pub fn update<F>(&self, id: i64, mut f: F) -> Result<Option<StudentDoc>, Error>
    where
        F: FnMut(StudentDoc) -> Result<StudentDoc, Error>,
    {
        let key = encode_key(id);
        loop {
            let Some(current) = self.docs.get(key)? else {
                return Ok(None);
            };
            let updated = f(StudentDoc::from_bytes(&current)?)?;
            let swapped =
                self.docs
                    .compare_and_swap(key, Some(&current), Some(updated.to_bytes()?))?;
            if swapped.is_ok() {
                return Ok(Some(updated));
            }
            debug!(id, "concurrent update, retrying compare-and-swap");
        }
    }

    /// Delete a document, returning the removed state.
    pub fn remove(&self, id: i64) -> Result<Option<StudentDoc>, Error> {
        match self.docs.remove(encode_key(id))? {
            Some(bytes) => Ok(Some(StudentDoc::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Filtered full scan in ascending-id order.
    pub fn scan(&self, filter: &DocFilter) -> Result<Vec<StudentDoc>, Error> {
        let mut out = Vec::new();
        for entry in self.docs.iter() {
            let (_, bytes) = entry?;
            let doc = StudentDoc::from_bytes(&bytes)?;
            if predicate::doc_matches(filter, &doc) {
                out.push(doc);
            }
        }
        Ok(out)
    }

    /// Filtered full scan projected to the contact shape.
    ///
    /// When the filter does not inspect marks, the marks payload is never
    /// decoded.
    pub fn scan_contacts(&self, filter: &DocFilter) -> Result<Vec<Student>, Error> {
        if filter.needs_marks() {
            return Ok(self.scan(filter)?.iter().map(StudentDoc::student).collect());
        }

        let mut out = Vec::new();
        for entry in self.docs.iter() {
            let (_, bytes) = entry?;
            let contact = ContactProjection::from_bytes(&bytes)?;
            if predicate::phone_matches(filter, &contact.phone) {
                out.push(contact.student());
            }
        }
        Ok(out)
    }

    /// All student ids, ascending.
    pub fn student_ids(&self) -> Result<Vec<i64>, Error> {
        let mut out = Vec::new();
        for key in self.docs.iter().keys() {
            if let Some(id) = decode_key(&key?) {
                out.push(id);
            }
        }
        Ok(out)
    }

    /// Number of stored students.
    pub fn count(&self) -> usize {
        self.docs.len()
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), Error> {
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use gradedb_proto::MarkPredicate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn store() -> StudentStore {
        StudentStore::open(StorageConfig::temporary()).unwrap()
    }

    #[test]
    fn test_key_encoding_orders_ids() {
        assert!(encode_key(1) < encode_key(2));
        assert!(encode_key(-5) < encode_key(0));
        assert_eq!(decode_key(&encode_key(42)), Some(42));
        assert_eq!(decode_key(&encode_key(-42)), Some(-42));
    }

    #[test]
    fn test_put_get_roundtrip() {
        let store = store();
        let mut doc = StudentDoc::new(1, "051-1111111");
        doc.marks.push(Mark::new("Math", 90, date(2024, 2, 10)));
        store.put(&doc).unwrap();

        assert_eq!(store.get(1).unwrap(), Some(doc));
        assert_eq!(store.get(2).unwrap(), None);
    }

    #[test]
    fn test_create_is_insert_only() {
        let store = store();
        let doc = StudentDoc::new(1, "051-1111111");
        assert!(store.create(&doc).unwrap());
        assert!(!store.create(&StudentDoc::new(1, "052-2222222")).unwrap());

        // The losing create must not have replaced the document
        assert_eq!(store.get(1).unwrap().unwrap().phone, "051-1111111");
    }

    #[test]
    fn test_update_applies_closure() {
        let store = store();
        store.put(&StudentDoc::new(1, "051-1111111")).unwrap();

        let updated = store
            .update(1, |mut doc| {
                doc.phone = "055-5555555".into();
                Ok(doc)
            })
            .unwrap()
            .unwrap();
        assert_eq!(updated.phone, "055-5555555");
        assert_eq!(store.get(1).unwrap().unwrap().phone, "055-5555555");
    }

    #[test]
    fn test_update_missing_student() {
        let store = store();
        let result = store.update(1, Ok).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_update_aborts_on_business_error() {
        let store = store();
        store.put(&StudentDoc::new(1, "051-1111111")).unwrap();

        let err = store
            .update(1, |_| Err(Error::DuplicateMark { id: 1 }))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateMark { id: 1 }));
        assert_eq!(store.get(1).unwrap().unwrap().phone, "051-1111111");
    }

    #[test]
    fn test_remove_returns_prior_document() {
        let store = store();
        store.put(&StudentDoc::new(1, "051-1111111")).unwrap();

        let removed = store.remove(1).unwrap().unwrap();
        assert_eq!(removed.id, 1);
        assert_eq!(store.get(1).unwrap(), None);
        assert_eq!(store.remove(1).unwrap(), None);
    }

    #[test]
    fn test_scan_ascending_order() {
        let store = store();
        for id in [5, 1, 3] {
            store.put(&StudentDoc::new(id, format!("05{id}-0000000"))).unwrap();
        }

        let ids: Vec<i64> = store
            .scan(&DocFilter::All)
            .unwrap()
            .iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec![1, 3, 5]);
        assert_eq!(store.student_ids().unwrap(), vec![1, 3, 5]);
    }

    #[test]
    fn test_scan_contacts_with_mark_filter() {
        let store = store();
        let mut with_marks = StudentDoc::new(1, "051-1111111");
        with_marks.marks.push(Mark::new("Math", 90, date(2024, 2, 10)));
        store.put(&with_marks).unwrap();
        store.put(&StudentDoc::new(2, "052-2222222")).unwrap();

        let matched = store
            .scan_contacts(&DocFilter::Marks(MarkPredicate::all_above(80)))
            .unwrap();
        assert_eq!(matched, vec![Student::new(1, "051-1111111")]);
    }

    #[test]
    fn test_scan_contacts_phone_prefix() {
        let store = store();
        store.put(&StudentDoc::new(1, "051-1111111")).unwrap();
        store.put(&StudentDoc::new(2, "052-2222222")).unwrap();
        store.put(&StudentDoc::new(3, "051-3333333")).unwrap();

        let matched = store
            .scan_contacts(&DocFilter::PhonePrefix("051".into()))
            .unwrap();
        let ids: Vec<i64> = matched.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }
}
