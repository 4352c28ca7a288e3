//! Persistence seams. `MemoryStore` and `PgStore` implement every trait here.
//!
//! Writes to results are version-checked: `update_result` and
//! `delete_result` fail with [`StoreError::Conflict`] when the stored
//! version no longer matches, and `insert_result` fails the same way when
//! the natural key is already taken.
//!
//! [`StoreError::Conflict`]: crate::error::StoreError::Conflict

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreResult;
use crate::models::{
    AcademicPeriod, AccountType, Course, PrivilegeRequest, PrivilegeStatus, ResultKey,
    ResultRecord, UserProfile,
};
use crate::semester::{Semester, Session};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultFilter {
    pub student_id: Option<Uuid>,
    pub course_code: Option<String>,
    pub semester: Option<Semester>,
    pub session: Option<Session>,
    pub approved: Option<bool>,
    pub uploaded_by: Option<Uuid>,
}

impl ResultFilter {
    pub fn for_student(student_id: Uuid) -> Self {
        Self {
            student_id: Some(student_id),
            ..Self::default()
        }
    }

    pub fn approved(mut self) -> Self {
        self.approved = Some(true);
        self
    }

    pub fn matches(&self, record: &ResultRecord) -> bool {
        self.student_id.map_or(true, |id| record.key.student_id == id)
            && self
                .course_code
                .as_deref()
                .map_or(true, |code| record.key.course_code.eq_ignore_ascii_case(code))
            && self.semester.map_or(true, |s| record.key.semester == s)
            && self.session.as_ref().map_or(true, |s| &record.key.session == s)
            && self.approved.map_or(true, |a| record.is_approved() == a)
            && self.uploaded_by.map_or(true, |id| record.uploaded_by == id)
    }
}

#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Course codes in the key compare case-insensitively.
    async fn find_result(&self, key: &ResultKey) -> StoreResult<Option<ResultRecord>>;

    async fn find_result_by_id(&self, id: Uuid) -> StoreResult<Option<ResultRecord>>;

    /// Matching records, oldest upload first.
    async fn find_results(&self, filter: &ResultFilter) -> StoreResult<Vec<ResultRecord>>;

    async fn insert_result(&self, record: &ResultRecord) -> StoreResult<()>;

    /// Replaces the stored record if its version is still `expected_version`.
    async fn update_result(&self, record: &ResultRecord, expected_version: i64)
        -> StoreResult<()>;

    async fn delete_result(&self, id: Uuid, expected_version: i64) -> StoreResult<()>;
}

/// Read-only identity and catalog lookups.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<UserProfile>>;

    async fn find_user_by_id_number(&self, id_number: &str) -> StoreResult<Option<UserProfile>>;

    async fn find_users(&self, ids: &[Uuid]) -> StoreResult<Vec<UserProfile>>;

    /// Case-insensitive on the course code.
    async fn find_course(&self, code: &str) -> StoreResult<Option<Course>>;

    async fn list_users(&self, account_type: AccountType) -> StoreResult<Vec<UserProfile>>;

    /// Catalog ordered by code.
    async fn list_courses(&self) -> StoreResult<Vec<Course>>;
}

#[async_trait]
pub trait PrivilegeStore: Send + Sync {
    async fn find_privilege(
        &self,
        lecturer_id: Uuid,
        course_code: &str,
    ) -> StoreResult<Option<PrivilegeRequest>>;

    async fn find_privilege_by_id(&self, id: Uuid) -> StoreResult<Option<PrivilegeRequest>>;

    /// Most recent request first.
    async fn list_privileges(
        &self,
        lecturer_id: Option<Uuid>,
        status: Option<PrivilegeStatus>,
    ) -> StoreResult<Vec<PrivilegeRequest>>;

    /// Fails with `Conflict` if the lecturer already has a request for the course.
    async fn insert_privilege(&self, request: &PrivilegeRequest) -> StoreResult<()>;

    /// Moves a pending request to approved. Returns false if it was not pending.
    async fn approve_privilege(&self, id: Uuid, approver_id: Uuid) -> StoreResult<bool>;

    /// Deletes the request only while it is still pending.
    async fn delete_pending_privilege(&self, id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait CurrentPeriodProvider: Send + Sync {
    async fn current_period(&self) -> StoreResult<Option<AcademicPeriod>>;
}

#[async_trait]
pub trait PeriodStore: CurrentPeriodProvider {
    async fn find_period(
        &self,
        semester: Semester,
        session: &Session,
    ) -> StoreResult<Option<AcademicPeriod>>;

    /// Most recently created first.
    async fn list_periods(&self) -> StoreResult<Vec<AcademicPeriod>>;

    /// Deactivates every period and stores `period` as the active one, atomically.
    async fn activate_period(&self, period: &AcademicPeriod) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Scores, ScoreComponent};
    use chrono::Utc;

    fn record(approved: bool) -> ResultRecord {
        ResultRecord {
            id: Uuid::new_v4(),
            key: ResultKey {
                student_id: Uuid::new_v4(),
                course_code: "CSE 202".to_string(),
                semester: Semester::Second,
                session: "2024/2025".parse().unwrap(),
            },
            scores: Scores::first(ScoreComponent::Test, 20.0),
            unit: 3,
            uploaded_by: Uuid::new_v4(),
            uploaded_at: Utc::now(),
            approval: approved.then(|| crate::models::Approval {
                by: Uuid::new_v4(),
                at: Utc::now(),
            }),
            version: 1,
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(ResultFilter::default().matches(&record(false)));
        assert!(ResultFilter::default().matches(&record(true)));
    }

    #[test]
    fn filter_combines_fields() {
        let pending = record(false);
        let filter = ResultFilter {
            course_code: Some("cse 202".to_string()),
            session: Some("2024/2025".parse().unwrap()),
            ..ResultFilter::for_student(pending.key.student_id)
        };
        assert!(filter.matches(&pending));
        assert!(!filter.clone().approved().matches(&pending));
        assert!(!ResultFilter::for_student(Uuid::new_v4()).matches(&pending));
    }
}
