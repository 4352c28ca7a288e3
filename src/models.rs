use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::grade::{grade_of, Grade};
use crate::semester::{Semester, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AccountType {
    Student,
    Admin,
    SuperAdmin,
}

impl AccountType {
    pub fn as_str(self) -> &'static str {
        match self {
            AccountType::Student => "student",
            AccountType::Admin => "admin",
            AccountType::SuperAdmin => "superAdmin",
        }
    }
}

impl FromStr for AccountType {
    type Err = CoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "student" => Ok(AccountType::Student),
            "admin" => Ok(AccountType::Admin),
            "superAdmin" => Ok(AccountType::SuperAdmin),
            other => Err(CoreError::Validation(format!(
                "unknown account type {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub id_number: String,
    pub account_type: AccountType,
    pub department: Option<String>,
    pub programme: Option<String>,
    /// Entry session, students only.
    pub session: Option<Session>,
}

impl UserProfile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub code: String,
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreComponent {
    Test,
    Exam,
}

impl ScoreComponent {
    pub fn max(self) -> f64 {
        match self {
            ScoreComponent::Test => 30.0,
            ScoreComponent::Exam => 70.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScoreComponent::Test => "test",
            ScoreComponent::Exam => "exam",
        }
    }
}

impl fmt::Display for ScoreComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScoreComponent {
    type Err = CoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "test" => Ok(ScoreComponent::Test),
            "exam" => Ok(ScoreComponent::Exam),
            _ => Err(CoreError::Validation(format!(
                "invalid result type {value:?}, must be 'test' or 'exam'"
            ))),
        }
    }
}

/// Natural key of a result: at most one record per tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResultKey {
    pub student_id: Uuid,
    pub course_code: String,
    pub semester: Semester,
    pub session: Session,
}

impl ResultKey {
    /// Same natural key; course codes compare without regard to case.
    pub fn same_as(&self, other: &ResultKey) -> bool {
        self.student_id == other.student_id
            && self.semester == other.semester
            && self.session == other.session
            && self
                .course_code
                .trim()
                .eq_ignore_ascii_case(other.course_code.trim())
    }
}

/// Recorded score components. A record always holds at least one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "recorded", rename_all = "camelCase")]
pub enum Scores {
    TestOnly { test: f64 },
    ExamOnly { exam: f64 },
    Both { test: f64, exam: f64 },
}

impl Scores {
    pub fn first(component: ScoreComponent, value: f64) -> Self {
        match component {
            ScoreComponent::Test => Scores::TestOnly { test: value },
            ScoreComponent::Exam => Scores::ExamOnly { exam: value },
        }
    }

    pub fn from_parts(test: Option<f64>, exam: Option<f64>) -> Option<Self> {
        match (test, exam) {
            (Some(test), Some(exam)) => Some(Scores::Both { test, exam }),
            (Some(test), None) => Some(Scores::TestOnly { test }),
            (None, Some(exam)) => Some(Scores::ExamOnly { exam }),
            (None, None) => None,
        }
    }

    pub fn with(self, component: ScoreComponent, value: f64) -> Self {
        let (test, exam) = match component {
            ScoreComponent::Test => (Some(value), self.exam()),
            ScoreComponent::Exam => (self.test(), Some(value)),
        };
        Scores::from_parts(test, exam).unwrap_or(Scores::first(component, value))
    }

    pub fn test(self) -> Option<f64> {
        match self {
            Scores::TestOnly { test } | Scores::Both { test, .. } => Some(test),
            Scores::ExamOnly { .. } => None,
        }
    }

    pub fn exam(self) -> Option<f64> {
        match self {
            Scores::ExamOnly { exam } | Scores::Both { exam, .. } => Some(exam),
            Scores::TestOnly { .. } => None,
        }
    }

    pub fn total(self) -> f64 {
        self.test().unwrap_or(0.0) + self.exam().unwrap_or(0.0)
    }

    pub fn is_complete(self) -> bool {
        matches!(self, Scores::Both { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Approval {
    pub by: Uuid,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    Unrecorded,
    PartiallyRecorded,
    FullyRecorded,
    Approved,
}

impl LifecycleState {
    pub fn of(record: Option<&ResultRecord>) -> Self {
        match record {
            None => LifecycleState::Unrecorded,
            Some(record) if record.approval.is_some() => LifecycleState::Approved,
            Some(record) if record.scores.is_complete() => LifecycleState::FullyRecorded,
            Some(_) => LifecycleState::PartiallyRecorded,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub id: Uuid,
    pub key: ResultKey,
    pub scores: Scores,
    pub unit: u32,
    pub uploaded_by: Uuid,
    pub uploaded_at: DateTime<Utc>,
    pub approval: Option<Approval>,
    /// Bumped on every write; used for optimistic concurrency.
    pub version: i64,
}

impl ResultRecord {
    pub fn total_score(&self) -> f64 {
        self.scores.total()
    }

    pub fn grade(&self) -> Grade {
        grade_of(self.total_score())
    }

    pub fn is_approved(&self) -> bool {
        self.approval.is_some()
    }

    pub fn state(&self) -> LifecycleState {
        LifecycleState::of(Some(self))
    }

    /// `"{semester} {session}"`, the label semester breakdowns group by.
    pub fn period_label(&self) -> String {
        format!("{} {}", self.key.semester, self.key.session)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivilegeStatus {
    Pending,
    Approved,
}

impl PrivilegeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PrivilegeStatus::Pending => "pending",
            PrivilegeStatus::Approved => "approved",
        }
    }
}

impl fmt::Display for PrivilegeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrivilegeStatus {
    type Err = CoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(PrivilegeStatus::Pending),
            "approved" => Ok(PrivilegeStatus::Approved),
            other => Err(CoreError::Validation(format!(
                "unknown privilege status {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivilegeRequest {
    pub id: Uuid,
    pub lecturer_id: Uuid,
    pub course_code: String,
    pub status: PrivilegeStatus,
    pub requested_at: DateTime<Utc>,
    pub approved_by: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcademicPeriod {
    pub id: Uuid,
    pub semester: Semester,
    pub session: Session,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SemesterGpa {
    pub label: String,
    pub semester: Semester,
    pub session: Session,
    pub gpa: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeShare {
    pub grade: Grade,
    pub count: usize,
    pub percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedResult {
    pub student_id: Uuid,
    pub course_code: String,
    pub total_score: f64,
    pub grade: Grade,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseSessionStats {
    pub results: usize,
    pub average: f64,
    pub highest: f64,
    pub lowest: f64,
    pub pass_rate: u32,
    /// Ten buckets of width ten; bucket 9 also holds a perfect 100.
    pub histogram: Vec<usize>,
    pub top: Vec<RankedResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepartmentPerformance {
    pub department: String,
    pub gpa: f64,
    pub pass_rate: u32,
    pub students: usize,
    pub results: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseRow {
    pub course_code: String,
    pub semester: Semester,
    pub session: Session,
    pub test_score: Option<f64>,
    pub exam_score: Option<f64>,
    pub total_score: f64,
    pub grade: Grade,
    pub grade_point: u32,
    pub unit: u32,
}

impl From<&ResultRecord> for CourseRow {
    fn from(record: &ResultRecord) -> Self {
        let grade = record.grade();
        CourseRow {
            course_code: record.key.course_code.clone(),
            semester: record.key.semester,
            session: record.key.session.clone(),
            test_score: record.scores.test(),
            exam_score: record.scores.exam(),
            total_score: record.total_score(),
            grade,
            grade_point: crate::grade::grade_point(grade),
            unit: record.unit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentSummary {
    pub student: UserProfile,
    pub level: Option<u32>,
    pub gpa: f64,
    pub cgpa: f64,
    pub total_units: u64,
    pub per_semester: Vec<SemesterGpa>,
    pub per_course: Vec<CourseRow>,
    pub grade_distribution: Vec<GradeShare>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SemesterView {
    pub student: UserProfile,
    pub semester: Semester,
    pub session: Session,
    pub gpa: f64,
    pub cgpa: f64,
    pub total_units: u64,
    pub courses: Vec<CourseRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseSessionAnalysis {
    pub course: Course,
    pub session: Session,
    /// Names of everyone who uploaded the approved results, first upload first.
    pub lecturers: Vec<String>,
    pub grade_distribution: Vec<GradeShare>,
    pub stats: CourseSessionStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionAnalysis {
    pub session: Session,
    pub department_performance: Vec<DepartmentPerformance>,
    pub top_performers: Vec<RankedResult>,
    pub grade_distribution: Vec<GradeShare>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewQueue {
    pub pending: Vec<ResultRecord>,
    pub approved: Vec<ResultRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DepartmentResultCount {
    pub department: String,
    pub students: usize,
    pub results: usize,
    pub approved: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub students: usize,
    pub lecturers: usize,
    pub super_admins: usize,
    pub courses: usize,
    pub departments: Vec<DepartmentResultCount>,
    pub results_total: usize,
    pub results_pending: usize,
    pub results_approved: usize,
    pub requests_total: usize,
    pub requests_pending: usize,
    pub requests_approved: usize,
    pub active_period: Option<AcademicPeriod>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scores_merge_components_in_either_order() {
        let test_first = Scores::first(ScoreComponent::Test, 20.0).with(ScoreComponent::Exam, 50.0);
        let exam_first = Scores::first(ScoreComponent::Exam, 50.0).with(ScoreComponent::Test, 20.0);
        assert_eq!(test_first, exam_first);
        assert_eq!(test_first.total(), 70.0);
        assert!(test_first.is_complete());
    }

    #[test]
    fn overwriting_a_component_keeps_the_other() {
        let scores = Scores::first(ScoreComponent::Test, 10.0)
            .with(ScoreComponent::Exam, 40.0)
            .with(ScoreComponent::Test, 25.0);
        assert_eq!(scores, Scores::Both { test: 25.0, exam: 40.0 });
    }

    #[test]
    fn partial_scores_count_missing_component_as_zero() {
        let scores = Scores::first(ScoreComponent::Exam, 44.0);
        assert_eq!(scores.total(), 44.0);
        assert_eq!(scores.test(), None);
        assert!(!scores.is_complete());
    }

    #[test]
    fn account_type_round_trips_stored_labels() {
        for label in ["student", "admin", "superAdmin"] {
            assert_eq!(label.parse::<AccountType>().unwrap().as_str(), label);
        }
        assert!("lecturer".parse::<AccountType>().is_err());
    }
}
