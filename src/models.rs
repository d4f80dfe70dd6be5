use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// Number of positional score slots per student/course pairing.
pub const SLOTS: usize = 3;

#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: Option<i64>,
    pub full_name: String,
    pub number: i32,
    pub email: String,
    pub gsm_number: Option<String>,
    pub completed_courses: Option<Vec<CourseAverage>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CourseAverage {
    pub course_name: String,
    pub average: f64,
}

#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Course {
    pub id: Option<i64>,
    pub name: String,
}

/// One score slot. `id == None` means the slot has never been persisted,
/// `score == None` means nothing has been entered.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct ScoreEntry {
    pub id: Option<i64>,
    pub score: Option<f64>,
}

impl ScoreEntry {
    pub const EMPTY: ScoreEntry = ScoreEntry { id: None, score: None };

    /// Scores outside 0..=100 (or NaN from a bad parse) are only advisory
    /// UI concerns; callers check this before saving.
    pub fn is_valid(&self) -> bool {
        match self.score {
            None => true,
            Some(v) => (0.0..=100.0).contains(&v),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CourseScores {
    pub course_id: i64,
    pub course_name: String,
    pub scores: [ScoreEntry; SLOTS],
}

impl CourseScores {
    pub fn empty(course_id: i64, course_name: impl Into<String>) -> Self {
        CourseScores {
            course_id,
            course_name: course_name.into(),
            scores: [ScoreEntry::EMPTY; SLOTS],
        }
    }

    pub fn has_persisted_slots(&self) -> bool {
        self.scores.iter().any(|s| s.id.is_some())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct StudentScores {
    pub courses: Vec<CourseScores>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SaveScoresRequest {
    pub courses: Vec<CourseScoreEntry>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CourseScoreEntry {
    pub course_id: i64,
    pub scores: [ScoreEntry; SLOTS],
}

impl From<&CourseScores> for CourseScoreEntry {
    fn from(row: &CourseScores) -> Self {
        CourseScoreEntry {
            course_id: row.course_id,
            scores: row.scores,
        }
    }
}

/// Flat read-model row for the results listing.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExamResultRow {
    pub id: i64,
    pub student_id: i64,
    pub student_name: String,
    pub student_number: i32,
    pub course_id: i64,
    pub course_name: String,
    pub score: i32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_students: u64,
    pub total_courses: u64,
    pub total_exam_results: u64,
    pub average_score: f64,
    pub completed_pairs: u64,
    pub in_progress_pairs: u64,
    pub top_students: Vec<TopStudent>,
    pub recent_results: Vec<RecentResult>,
    pub score_distribution: ScoreDistribution,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TopStudent {
    pub student_id: i64,
    pub full_name: String,
    pub average_score: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecentResult {
    pub id: i64,
    pub student_name: String,
    pub course_name: String,
    pub score: i32,
    pub created_at: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScoreDistribution {
    #[serde(rename = "range0to20")]
    pub range_0_to_20: u32,
    #[serde(rename = "range21to40")]
    pub range_21_to_40: u32,
    #[serde(rename = "range41to60")]
    pub range_41_to_60: u32,
    #[serde(rename = "range61to80")]
    pub range_61_to_80: u32,
    #[serde(rename = "range81to100")]
    pub range_81_to_100: u32,
}

/// Pagination envelope. Extra fields the gateway sends are ignored.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub total_elements: u64,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Page {
            content: Vec::new(),
            total_elements: 0,
        }
    }
}
