//! In-process store backing tests and dry runs.

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::models::{
    AcademicPeriod, AccountType, Course, PrivilegeRequest, PrivilegeStatus, ResultKey,
    ResultRecord, UserProfile,
};
use crate::semester::{Semester, Session};
use crate::store::{
    CurrentPeriodProvider, Directory, PeriodStore, PrivilegeStore, ResultFilter, ResultStore,
};

#[derive(Default)]
struct Tables {
    users: Vec<UserProfile>,
    courses: Vec<Course>,
    results: Vec<ResultRecord>,
    privileges: Vec<PrivilegeRequest>,
    periods: Vec<AcademicPeriod>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, user: UserProfile) {
        self.tables.lock().await.users.push(user);
    }

    pub async fn add_course(&self, code: &str, title: &str) {
        self.tables.lock().await.courses.push(Course {
            code: code.to_string(),
            title: title.to_string(),
        });
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn find_result(&self, key: &ResultKey) -> StoreResult<Option<ResultRecord>> {
        let tables = self.tables.lock().await;
        Ok(tables.results.iter().find(|r| r.key.same_as(key)).cloned())
    }

    async fn find_result_by_id(&self, id: Uuid) -> StoreResult<Option<ResultRecord>> {
        let tables = self.tables.lock().await;
        Ok(tables.results.iter().find(|r| r.id == id).cloned())
    }

    async fn find_results(&self, filter: &ResultFilter) -> StoreResult<Vec<ResultRecord>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .results
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn insert_result(&self, record: &ResultRecord) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        if tables.results.iter().any(|r| r.key.same_as(&record.key)) {
            return Err(StoreError::Conflict);
        }
        tables.results.push(record.clone());
        Ok(())
    }

    async fn update_result(
        &self,
        record: &ResultRecord,
        expected_version: i64,
    ) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        match tables.results.iter_mut().find(|r| r.id == record.id) {
            Some(stored) if stored.version == expected_version => {
                *stored = record.clone();
                Ok(())
            }
            _ => Err(StoreError::Conflict),
        }
    }

    async fn delete_result(&self, id: Uuid, expected_version: i64) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        let position = tables
            .results
            .iter()
            .position(|r| r.id == id && r.version == expected_version)
            .ok_or(StoreError::Conflict)?;
        tables.results.remove(position);
        Ok(())
    }
}

#[async_trait]
impl Directory for MemoryStore {
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<UserProfile>> {
        let tables = self.tables.lock().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_id_number(&self, id_number: &str) -> StoreResult<Option<UserProfile>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .iter()
            .find(|u| u.id_number == id_number)
            .cloned())
    }

    async fn find_users(&self, ids: &[Uuid]) -> StoreResult<Vec<UserProfile>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .iter()
            .filter(|u| ids.contains(&u.id))
            .cloned()
            .collect())
    }

    async fn find_course(&self, code: &str) -> StoreResult<Option<Course>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .courses
            .iter()
            .find(|c| c.code.eq_ignore_ascii_case(code.trim()))
            .cloned())
    }

    async fn list_users(&self, account_type: AccountType) -> StoreResult<Vec<UserProfile>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .iter()
            .filter(|u| u.account_type == account_type)
            .cloned()
            .collect())
    }

    async fn list_courses(&self) -> StoreResult<Vec<Course>> {
        let tables = self.tables.lock().await;
        let mut courses = tables.courses.clone();
        courses.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(courses)
    }
}

#[async_trait]
impl PrivilegeStore for MemoryStore {
    async fn find_privilege(
        &self,
        lecturer_id: Uuid,
        course_code: &str,
    ) -> StoreResult<Option<PrivilegeRequest>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .privileges
            .iter()
            .find(|p| {
                p.lecturer_id == lecturer_id && p.course_code.eq_ignore_ascii_case(course_code)
            })
            .cloned())
    }

    async fn find_privilege_by_id(&self, id: Uuid) -> StoreResult<Option<PrivilegeRequest>> {
        let tables = self.tables.lock().await;
        Ok(tables.privileges.iter().find(|p| p.id == id).cloned())
    }

    async fn list_privileges(
        &self,
        lecturer_id: Option<Uuid>,
        status: Option<PrivilegeStatus>,
    ) -> StoreResult<Vec<PrivilegeRequest>> {
        let tables = self.tables.lock().await;
        let mut requests: Vec<PrivilegeRequest> = tables
            .privileges
            .iter()
            .filter(|p| lecturer_id.map_or(true, |id| p.lecturer_id == id))
            .filter(|p| status.map_or(true, |s| p.status == s))
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        Ok(requests)
    }

    async fn insert_privilege(&self, request: &PrivilegeRequest) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        let taken = tables.privileges.iter().any(|p| {
            p.lecturer_id == request.lecturer_id
                && p.course_code.eq_ignore_ascii_case(&request.course_code)
        });
        if taken {
            return Err(StoreError::Conflict);
        }
        tables.privileges.push(request.clone());
        Ok(())
    }

    async fn approve_privilege(&self, id: Uuid, approver_id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        match tables
            .privileges
            .iter_mut()
            .find(|p| p.id == id && p.status == PrivilegeStatus::Pending)
        {
            Some(request) => {
                request.status = PrivilegeStatus::Approved;
                request.approved_by = Some(approver_id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_pending_privilege(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        let before = tables.privileges.len();
        tables
            .privileges
            .retain(|p| !(p.id == id && p.status == PrivilegeStatus::Pending));
        Ok(tables.privileges.len() < before)
    }
}

#[async_trait]
impl CurrentPeriodProvider for MemoryStore {
    async fn current_period(&self) -> StoreResult<Option<AcademicPeriod>> {
        let tables = self.tables.lock().await;
        Ok(tables.periods.iter().find(|p| p.is_active).cloned())
    }
}

#[async_trait]
impl PeriodStore for MemoryStore {
    async fn find_period(
        &self,
        semester: Semester,
        session: &Session,
    ) -> StoreResult<Option<AcademicPeriod>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .periods
            .iter()
            .find(|p| p.semester == semester && &p.session == session)
            .cloned())
    }

    async fn list_periods(&self) -> StoreResult<Vec<AcademicPeriod>> {
        let tables = self.tables.lock().await;
        let mut periods = tables.periods.clone();
        periods.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(periods)
    }

    async fn activate_period(&self, period: &AcademicPeriod) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        for existing in tables.periods.iter_mut() {
            existing.is_active = false;
        }
        let mut period = period.clone();
        period.is_active = true;
        tables.periods.push(period);
        Ok(())
    }
}
