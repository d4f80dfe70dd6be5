//! Editable score grid for one student.
//!
//! A [`ScoreMatrix`] holds one row per course, each with exactly three
//! positional slots. Nothing reaches the gateway until [`ScoreMatrix::save`]
//! (or the partial save a persisted-row removal needs). Unsaved edits are
//! detected by comparing the rows against a snapshot taken at the last load
//! or successful save.

use async_trait::async_trait;
use thiserror::Error;

use crate::error::GatewayError;
use crate::models::{Course, CourseScoreEntry, CourseScores, SaveScoresRequest, StudentScores, SLOTS};

#[derive(Error, Debug)]
pub enum ScoreError {
    #[error("no course row at index {0}")]
    RowOutOfRange(usize),
    #[error("no score slot at index {0}")]
    SlotOutOfRange(usize),
    #[error("score {slot} of course {course_id} is not a number")]
    NotANumber { course_id: i64, slot: usize },
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Where a student's scores are loaded from and saved to.
#[async_trait]
pub trait ScoreStore: Send + Sync {
    async fn load_scores(&self, student_id: i64) -> Result<StudentScores, GatewayError>;

    async fn save_scores(
        &self,
        student_id: i64,
        request: &SaveScoresRequest,
    ) -> Result<StudentScores, GatewayError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// Row had nothing persisted; removed locally, no gateway call.
    RemovedLocally,
    /// Persisted slots were cleared on the gateway, then the row removed.
    RemovedAndPersisted,
    /// The caller declined the confirmation.
    Cancelled,
}

/// True iff all three slots hold a score.
pub fn is_completed(row: &CourseScores) -> bool {
    row.scores.iter().all(|s| s.score.is_some())
}

/// Mean of the filled slots, rounded to one decimal. `None` when every
/// slot is empty.
pub fn average(row: &CourseScores) -> Option<f64> {
    let filled: Vec<f64> = row.scores.iter().filter_map(|s| s.score).collect();
    if filled.is_empty() {
        return None;
    }
    let mean = filled.iter().sum::<f64>() / filled.len() as f64;
    Some(round_to(mean, 1))
}

/// Student-summary average: only defined once all three slots are filled,
/// rounded to two decimals. Same rule the gateway applies to a student's
/// `completedCourses`, so the list view can show a row's summary before it
/// is saved. Differs from [`average`].
pub fn completed_average(row: &CourseScores) -> Option<f64> {
    if !is_completed(row) {
        return None;
    }
    let sum: f64 = row.scores.iter().filter_map(|s| s.score).sum();
    Some(round_to(sum / SLOTS as f64, 2))
}

/// Empty string or `None` clears the slot. Anything else that is not a
/// number becomes NaN; bounds are not checked here.
pub fn parse_score(raw: Option<&str>) -> Option<f64> {
    match raw.map(str::trim) {
        None | Some("") => None,
        Some(s) => Some(s.parse::<f64>().unwrap_or(f64::NAN)),
    }
}

/// Courses from `all` (that have an id) not already present as a row.
pub fn available_courses(rows: &[CourseScores], all: &[Course]) -> Vec<Course> {
    all.iter()
        .filter(|c| match c.id {
            Some(id) => !rows.iter().any(|r| r.course_id == id),
            None => false,
        })
        .cloned()
        .collect()
}

/// Case-insensitive name match for the add-course picker.
pub fn filter_courses(available: &[Course], text: &str) -> Vec<Course> {
    let term = text.to_lowercase();
    available
        .iter()
        .filter(|c| c.name.to_lowercase().contains(&term))
        .cloned()
        .collect()
}

fn round_to(v: f64, places: i32) -> f64 {
    let f = 10f64.powi(places);
    (v * f).round() / f
}

#[derive(Debug, Clone)]
pub struct ScoreMatrix {
    student_id: i64,
    rows: Vec<CourseScores>,
    snapshot: Vec<CourseScores>,
}

impl ScoreMatrix {
    pub fn new(student_id: i64) -> Self {
        ScoreMatrix {
            student_id,
            rows: Vec::new(),
            snapshot: Vec::new(),
        }
    }

    pub fn student_id(&self) -> i64 {
        self.student_id
    }

    pub fn rows(&self) -> &[CourseScores] {
        &self.rows
    }

    /// Replaces all rows with a copy of `scores` and re-snapshots.
    pub fn load(&mut self, scores: StudentScores) {
        self.rows = scores.courses;
        self.snapshot = self.rows.clone();
    }

    pub async fn fetch<S: ScoreStore + ?Sized>(&mut self, store: &S) -> Result<(), ScoreError> {
        let scores = store.load_scores(self.student_id).await?;
        self.load(scores);
        Ok(())
    }

    /// Appends an empty row for `course`. Returns false (and changes
    /// nothing) if the course has no id or already has a row.
    pub fn add_course(&mut self, course: &Course) -> bool {
        let Some(id) = course.id else {
            return false;
        };
        if self.rows.iter().any(|r| r.course_id == id) {
            return false;
        }
        self.rows.push(CourseScores::empty(id, course.name.clone()));
        true
    }

    /// Removes the row at `index`.
    ///
    /// A row with no persisted slot is dropped locally. Otherwise `confirm`
    /// is asked first; if it agrees, null scores for that row are saved
    /// (slot ids kept, so the gateway deletes them) and the row is dropped
    /// only once that save succeeds. On failure the row is left untouched.
    pub async fn remove_course<S, F>(
        &mut self,
        index: usize,
        store: &S,
        confirm: F,
    ) -> Result<RemoveOutcome, ScoreError>
    where
        S: ScoreStore + ?Sized,
        F: FnOnce(&CourseScores) -> bool,
    {
        let row = self.rows.get(index).ok_or(ScoreError::RowOutOfRange(index))?;
        if !row.has_persisted_slots() {
            self.rows.remove(index);
            return Ok(RemoveOutcome::RemovedLocally);
        }
        if !confirm(row) {
            return Ok(RemoveOutcome::Cancelled);
        }

        let mut cleared = CourseScoreEntry::from(row);
        for slot in cleared.scores.iter_mut() {
            slot.score = None;
        }
        let course_id = cleared.course_id;
        let request = SaveScoresRequest {
            courses: vec![cleared],
        };
        store.save_scores(self.student_id, &request).await?;

        tracing::info!(student_id = self.student_id, course_id, "course scores removed");
        self.rows.remove(index);
        // Only this row was persisted; other pending edits stay dirty.
        self.snapshot.retain(|r| r.course_id != course_id);
        Ok(RemoveOutcome::RemovedAndPersisted)
    }

    pub fn set_score(
        &mut self,
        course_index: usize,
        slot_index: usize,
        raw: Option<&str>,
    ) -> Result<(), ScoreError> {
        let row = self
            .rows
            .get_mut(course_index)
            .ok_or(ScoreError::RowOutOfRange(course_index))?;
        let slot = row
            .scores
            .get_mut(slot_index)
            .ok_or(ScoreError::SlotOutOfRange(slot_index))?;
        slot.score = parse_score(raw);
        Ok(())
    }

    pub fn is_completed(&self, index: usize) -> Option<bool> {
        self.rows.get(index).map(is_completed)
    }

    pub fn average(&self, index: usize) -> Option<f64> {
        self.rows.get(index).and_then(average)
    }

    pub fn is_dirty(&self) -> bool {
        self.rows != self.snapshot
    }

    /// True when there is a slot the caller must fix before saving.
    pub fn has_invalid_scores(&self) -> bool {
        self.rows
            .iter()
            .flat_map(|r| r.scores.iter())
            .any(|s| !s.is_valid())
    }

    pub fn available_courses(&self, all: &[Course]) -> Vec<Course> {
        available_courses(&self.rows, all)
    }

    fn first_nan(&self) -> Option<(i64, usize)> {
        self.rows.iter().find_map(|r| {
            r.scores
                .iter()
                .position(|s| s.score.is_some_and(f64::is_nan))
                .map(|slot| (r.course_id, slot))
        })
    }

    pub fn save_request(&self) -> SaveScoresRequest {
        SaveScoresRequest {
            courses: self.rows.iter().map(CourseScoreEntry::from).collect(),
        }
    }

    /// Sends every row. On success the rows are replaced by the gateway's
    /// answer (which carries ids for new slots); on failure nothing changes.
    ///
    /// A NaN slot would go out as `null` and delete a persisted score, so
    /// the save is refused before any call. Out-of-range numbers are sent.
    pub async fn save<S: ScoreStore + ?Sized>(&mut self, store: &S) -> Result<StudentScores, ScoreError> {
        if let Some((course_id, slot)) = self.first_nan() {
            return Err(ScoreError::NotANumber { course_id, slot });
        }
        let request = self.save_request();
        let saved = store.save_scores(self.student_id, &request).await?;
        tracing::info!(student_id = self.student_id, courses = saved.courses.len(), "scores saved");
        self.load(saved.clone());
        Ok(saved)
    }

    /// Leaving is allowed when clean; otherwise `confirm` decides.
    pub fn confirm_leave<F: FnOnce() -> bool>(&self, confirm: F) -> bool {
        !self.is_dirty() || confirm()
    }
}
