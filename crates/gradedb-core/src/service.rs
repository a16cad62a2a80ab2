//! The students service: the public query and mutation surface.
//!
//! One method per supported operation. Business-rule violations surface as
//! distinct [`Error`] variants; "no matching results" is a successful empty
//! collection or `None`, never an error. Analytic queries return students
//! in ascending-id order unless a ranking defines its own order.

use chrono::NaiveDate;
use tracing::{debug, error};

use gradedb_proto::{
    DocFilter, Expr, Mark, MarkPredicate, Pipeline, Row, RowFilter, Student, StudentAvgScore,
    Value,
};

use crate::error::Error;
use crate::query::{month_range, PipelineExecutor, RankingEngine, DEFAULT_PASS_THRESHOLD};
use crate::storage::{StorageConfig, StudentDoc, StudentStore};

/// The query orchestrator over the student collection.
pub struct StudentsService {
    store: StudentStore,
}

impl StudentsService {
    /// Open a service over a store at the configured location.
    pub fn open(config: StorageConfig) -> Result<Self, Error> {
        Ok(Self {
            store: StudentStore::open(config)?,
        })
    }

    /// Wrap an already-open store.
    pub fn new(store: StudentStore) -> Self {
        Self { store }
    }

    /// Direct access to the underlying store.
    pub fn store(&self) -> &StudentStore {
        &self.store
    }

    fn ranking(&self) -> RankingEngine<'_> {
        RankingEngine::new(&self.store)
    }

    fn pipelines(&self) -> PipelineExecutor<'_> {
        PipelineExecutor::new(&self.store)
    }

    // ========== Mutations ==========

    /// Persist a new student with an empty mark list.
    pub fn add_student(&self, student: Student) -> Result<Student, Error> {
        let doc = StudentDoc::new(student.id, student.phone.clone());
        if !self.store.create(&doc)? {
            error!(id = student.id, "student already exists");
            return Err(Error::AlreadyExists { id: student.id });
        }
        debug!(id = student.id, "student added");
        Ok(student)
    }

    /// Append a mark to a student's list and return it.
    ///
    /// A mark structurally equal to one already recorded is rejected and
    /// leaves the list unchanged.
    pub fn add_mark(&self, id: i64, mark: Mark) -> Result<Mark, Error> {
        let updated = self.store.update(id, |mut doc| {
            if doc.marks.contains(&mark) {
                return Err(Error::DuplicateMark { id });
            }
            doc.marks.push(mark.clone());
            Ok(doc)
        })?;

        match updated {
            Some(doc) => {
                debug!(id, marks = doc.marks.len(), "mark added");
                Ok(mark)
            }
            None => {
                error!(id, "student not found");
                Err(Error::NotFound { id })
            }
        }
    }

    /// Replace a student's phone number and return the updated student.
    pub fn update_phone(&self, id: i64, phone: &str) -> Result<Student, Error> {
        let updated = self.store.update(id, |mut doc| {
            doc.phone = phone.to_string();
            Ok(doc)
        })?;

        match updated {
            Some(doc) => {
                debug!(id, "phone updated");
                Ok(doc.student())
            }
            None => {
                error!(id, "student not found");
                Err(Error::NotFound { id })
            }
        }
    }

    /// Delete a student and all owned marks, returning the pre-deletion
    /// snapshot.
    pub fn remove_student(&self, id: i64) -> Result<Student, Error> {
        match self.store.remove(id)? {
            Some(doc) => {
                debug!(id, "student removed");
                Ok(doc.student())
            }
            None => {
                error!(id, "student not found");
                Err(Error::NotFound { id })
            }
        }
    }

    // ========== Lookups ==========

    /// Fetch a student's contact shape. The marks payload is not fetched.
    pub fn get_student(&self, id: i64) -> Result<Student, Error> {
        self.store.get_contact(id)?.ok_or(Error::NotFound { id })
    }

    /// Fetch a student's marks in insertion order. Contact fields are not
    /// fetched.
    pub fn get_marks(&self, id: i64) -> Result<Vec<Mark>, Error> {
        self.store.get_marks(id)?.ok_or(Error::NotFound { id })
    }

    /// The single student with this phone, if any. Colliding phones
    /// resolve to the lowest id.
    pub fn find_by_phone(&self, phone: &str) -> Result<Option<Student>, Error> {
        Ok(self
            .store
            .scan_contacts(&DocFilter::PhoneEquals(phone.to_string()))?
            .into_iter()
            .next())
    }

    /// All students whose phone starts with `prefix`, ascending id.
    pub fn find_by_phone_prefix(&self, prefix: &str) -> Result<Vec<Student>, Error> {
        self.store
            .scan_contacts(&DocFilter::PhonePrefix(prefix.to_string()))
    }

    // ========== Analytic queries over mark predicates ==========

    fn students_matching(&self, predicate: MarkPredicate) -> Result<Vec<Student>, Error> {
        let result = self.store.scan_contacts(&DocFilter::Marks(predicate))?;
        debug!(students = result.len(), "mark predicate scan");
        Ok(result)
    }

    /// Students with a mark dated exactly `date`.
    pub fn students_with_mark_on(&self, date: NaiveDate) -> Result<Vec<Student>, Error> {
        self.students_matching(MarkPredicate::date_equals(date))
    }

    /// Students with a mark in the closed interval `[from, to]`.
    pub fn students_with_marks_in(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Student>, Error> {
        self.students_matching(MarkPredicate::date_range(from, to))
    }

    /// Students with a mark in the given calendar month.
    pub fn students_with_marks_in_month(
        &self,
        year: i32,
        month: u32,
    ) -> Result<Vec<Student>, Error> {
        let (from, to) = month_range(year, month).ok_or(Error::InvalidMonth { month })?;
        self.students_with_marks_in(from, to)
    }

    /// Students with a mark in `subject` scoring strictly above
    /// `threshold`.
    pub fn students_with_subject_score_above(
        &self,
        subject: &str,
        threshold: i32,
    ) -> Result<Vec<Student>, Error> {
        self.students_matching(MarkPredicate::subject_score_gt(subject, threshold))
    }

    /// Students all of whose marks score strictly above `threshold`.
    /// Students without marks do not qualify.
    pub fn students_all_marks_above(&self, threshold: i32) -> Result<Vec<Student>, Error> {
        self.students_matching(MarkPredicate::all_above(threshold))
    }

    /// Students all of whose marks in `subject` score strictly above
    /// `threshold`. Students without marks in the subject do not qualify.
    pub fn students_all_marks_above_in_subject(
        &self,
        subject: &str,
        threshold: i32,
    ) -> Result<Vec<Student>, Error> {
        self.students_matching(MarkPredicate::all_above_in_subject(subject, threshold))
    }

    /// Students with strictly fewer than `n` marks.
    pub fn students_with_fewer_marks_than(&self, n: usize) -> Result<Vec<Student>, Error> {
        self.students_matching(MarkPredicate::count_lt(n))
    }

    /// Students with between `min` and `max` marks, inclusive.
    pub fn students_with_mark_count_between(
        &self,
        min: usize,
        max: usize,
    ) -> Result<Vec<Student>, Error> {
        self.students_matching(MarkPredicate::count_between(min, max))
    }

    // ========== Rankings ==========

    /// Students whose mean score strictly exceeds `threshold`, best mean
    /// first; ties by ascending id.
    pub fn students_avg_score_above(
        &self,
        threshold: i32,
    ) -> Result<Vec<StudentAvgScore>, Error> {
        self.ranking().avg_score_above(threshold)
    }

    /// Ids of the top `n` students by qualifying-mark count at the
    /// default pass threshold.
    pub fn best_students(&self, n: usize) -> Result<Vec<i64>, Error> {
        self.ranking().best_students(n, DEFAULT_PASS_THRESHOLD)
    }

    /// As [`best_students`](Self::best_students) with an explicit pass
    /// threshold.
    pub fn best_students_above(
        &self,
        n: usize,
        pass_threshold: i32,
    ) -> Result<Vec<i64>, Error> {
        self.ranking().best_students(n, pass_threshold)
    }

    /// Ids of the `n` students with the lowest total score, worst first.
    /// Students with no marks total 0 and rank worst.
    pub fn worst_students(&self, n: usize) -> Result<Vec<i64>, Error> {
        self.ranking().worst_students(n)
    }

    // ========== Per-student mark queries ==========

    /// Marks of one student in `subject`, insertion order preserved.
    /// Zero matches is a successful empty result.
    pub fn marks_for_subject(&self, id: i64, subject: &str) -> Result<Vec<Mark>, Error> {
        self.require_student(id)?;
        let pipeline = Pipeline::new()
            .matching(RowFilter::eq("id", Value::Int(id)))
            .unwind("marks")
            .matching(RowFilter::eq("marks.subject", Value::Str(subject.to_string())))
            .project(mark_projection());
        let rows = self.pipelines().execute(&pipeline)?;
        Ok(rows_to_marks(&rows))
    }

    /// Marks of one student dated within `[from, to]`, insertion order
    /// preserved.
    pub fn marks_in_date_range(
        &self,
        id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Mark>, Error> {
        self.require_student(id)?;
        let pipeline = Pipeline::new()
            .matching(RowFilter::eq("id", Value::Int(id)))
            .unwind("marks")
            .matching(RowFilter::between(
                "marks.date",
                Value::Date(from),
                Value::Date(to),
            ))
            .project(mark_projection());
        let rows = self.pipelines().execute(&pipeline)?;
        Ok(rows_to_marks(&rows))
    }

    fn require_student(&self, id: i64) -> Result<(), Error> {
        if self.store.exists(id)? {
            Ok(())
        } else {
            error!(id, "student not found");
            Err(Error::NotFound { id })
        }
    }
}

fn mark_projection() -> Vec<(String, Expr)> {
    vec![
        ("subject".into(), Expr::field("marks.subject")),
        ("score".into(), Expr::field("marks.score")),
        ("date".into(), Expr::field("marks.date")),
    ]
}

fn rows_to_marks(rows: &[Row]) -> Vec<Mark> {
    rows.iter()
        .filter_map(|row| {
            Some(Mark {
                subject: row.get("subject")?.as_str()?.to_string(),
                score: row.get("score")?.as_i64()? as i32,
                date: row.get("date")?.as_date()?,
            })
        })
        .collect()
}
