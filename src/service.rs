//! Operations offered to the transport layer.
//!
//! `ResultService` resolves identities and catalog entries, checks roles,
//! then hands off to the lifecycle, privilege workflow and aggregator.

use std::collections::HashSet;
use std::sync::Arc;

use uuid::Uuid;

use crate::aggregate;
use crate::error::{CoreError, CoreResult};
use crate::lifecycle::{ExamPolicy, ResultLifecycle, ResultRef, ScoreSubmission};
use crate::models::{
    AcademicPeriod, AccountType, CourseRow, CourseSessionAnalysis, Dashboard, PrivilegeRequest,
    PrivilegeStatus, ResultKey, ResultRecord, ReviewQueue, ScoreComponent, SemesterView,
    SessionAnalysis, StudentSummary, UserProfile,
};
use crate::period;
use crate::privilege::PrivilegeWorkflow;
use crate::semester::{Semester, Session};
use crate::store::{
    CurrentPeriodProvider, Directory, PeriodStore, PrivilegeStore, ResultFilter, ResultStore,
};

/// Everything the service needs from persistence.
pub trait Backend: ResultStore + Directory + PrivilegeStore + PeriodStore {}

impl<T> Backend for T where T: ResultStore + Directory + PrivilegeStore + PeriodStore {}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub exam_policy: ExamPolicy,
    pub require_upload_privilege: bool,
    pub top_performers: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            exam_policy: ExamPolicy::Independent,
            require_upload_privilege: true,
            top_performers: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StudentRef {
    Id(Uuid),
    /// Matriculation number.
    IdNumber(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreUpload {
    pub student: StudentRef,
    pub course_code: String,
    pub semester: Semester,
    pub session: Session,
    pub component: ScoreComponent,
    pub value: f64,
    pub unit: u32,
    pub uploader_id: Uuid,
}

pub struct ResultService<S> {
    store: Arc<S>,
    lifecycle: ResultLifecycle<S>,
    privileges: PrivilegeWorkflow<S>,
    config: ServiceConfig,
}

impl<S: Backend> ResultService<S> {
    pub fn new(store: Arc<S>, config: ServiceConfig) -> Self {
        Self {
            lifecycle: ResultLifecycle::new(store.clone(), config.exam_policy),
            privileges: PrivilegeWorkflow::new(store.clone()),
            store,
            config,
        }
    }

    pub fn privileges(&self) -> &PrivilegeWorkflow<S> {
        &self.privileges
    }

    pub async fn submit_score(&self, upload: &ScoreUpload) -> CoreResult<ResultRecord> {
        self.require_role(upload.uploader_id, AccountType::Admin).await?;
        let student = self.student(&upload.student).await?;
        let course = self
            .store
            .find_course(&upload.course_code)
            .await?
            .ok_or_else(|| CoreError::not_found("course"))?;

        if self.config.require_upload_privilege
            && !self
                .privileges
                .has_privilege(upload.uploader_id, &course.code)
                .await?
        {
            return Err(CoreError::Forbidden(format!(
                "no approved upload privilege for {}",
                course.code
            )));
        }

        let submission = ScoreSubmission {
            key: ResultKey {
                student_id: student.id,
                course_code: course.code,
                semester: upload.semester,
                session: upload.session.clone(),
            },
            component: upload.component,
            value: upload.value,
            unit: upload.unit,
            uploader_id: upload.uploader_id,
        };
        self.lifecycle.submit_score(&submission).await
    }

    pub async fn approve_result(
        &self,
        target: impl Into<ResultRef>,
        approver_id: Uuid,
    ) -> CoreResult<ResultRecord> {
        self.require_role(approver_id, AccountType::SuperAdmin).await?;
        self.lifecycle.approve(target, approver_id).await
    }

    pub async fn reject_result(
        &self,
        target: impl Into<ResultRef>,
        reviewer_id: Uuid,
    ) -> CoreResult<ResultRecord> {
        self.require_role(reviewer_id, AccountType::SuperAdmin).await?;
        self.lifecycle.reject(target).await
    }

    pub async fn approve_privilege(
        &self,
        request_id: Uuid,
        approver_id: Uuid,
    ) -> CoreResult<PrivilegeRequest> {
        self.require_role(approver_id, AccountType::SuperAdmin).await?;
        self.privileges.approve(request_id, approver_id).await
    }

    pub async fn reject_privilege(
        &self,
        request_id: Uuid,
        reviewer_id: Uuid,
    ) -> CoreResult<PrivilegeRequest> {
        self.require_role(reviewer_id, AccountType::SuperAdmin).await?;
        self.privileges.reject(request_id).await
    }

    /// GPA of the latest semester, CGPA and breakdowns over approved results.
    pub async fn student_summary(&self, student: &StudentRef) -> CoreResult<StudentSummary> {
        let student = self.student(student).await?;
        let results = self
            .store
            .find_results(&ResultFilter::for_student(student.id).approved())
            .await?;

        let gpa = match aggregate::latest_period(&results) {
            Some((session, semester)) => aggregate::compute_gpa(
                results
                    .iter()
                    .filter(|r| r.key.session == session && r.key.semester == semester),
            ),
            None => 0.0,
        };

        Ok(StudentSummary {
            level: period::current_level(self.store.as_ref(), &student).await?,
            gpa,
            cgpa: aggregate::compute_gpa(&results),
            total_units: aggregate::total_units(&results),
            per_semester: aggregate::compute_semester_breakdown(&results),
            per_course: results.iter().map(CourseRow::from).collect(),
            grade_distribution: aggregate::compute_grade_distribution(&results),
            student,
        })
    }

    pub async fn semester_view(
        &self,
        student: &StudentRef,
        semester: Semester,
        session: &Session,
    ) -> CoreResult<SemesterView> {
        let student = self.student(student).await?;
        let approved = self
            .store
            .find_results(&ResultFilter::for_student(student.id).approved())
            .await?;
        let current: Vec<ResultRecord> = approved
            .iter()
            .filter(|r| r.key.semester == semester && &r.key.session == session)
            .cloned()
            .collect();

        if current.is_empty() {
            return Err(CoreError::not_found("approved results for this semester and session"));
        }

        Ok(SemesterView {
            student,
            semester,
            session: session.clone(),
            gpa: aggregate::compute_gpa(&current),
            cgpa: aggregate::compute_gpa(&approved),
            total_units: aggregate::total_units(&current),
            courses: current.iter().map(CourseRow::from).collect(),
        })
    }

    /// Sessions the student has any result in, oldest first.
    pub async fn result_sessions(&self, student: &StudentRef) -> CoreResult<Vec<Session>> {
        let student = self.student(student).await?;
        let results = self
            .store
            .find_results(&ResultFilter::for_student(student.id))
            .await?;
        let mut sessions: Vec<Session> = results.into_iter().map(|r| r.key.session).collect();
        sessions.sort();
        sessions.dedup();
        Ok(sessions)
    }

    pub async fn course_session_analysis(
        &self,
        course_code: &str,
        session: &Session,
    ) -> CoreResult<CourseSessionAnalysis> {
        let course = self
            .store
            .find_course(course_code)
            .await?
            .ok_or_else(|| CoreError::not_found("course"))?;
        let filter = ResultFilter {
            course_code: Some(course.code.clone()),
            session: Some(session.clone()),
            ..ResultFilter::default()
        }
        .approved();
        let results = self.store.find_results(&filter).await?;

        let mut uploader_ids: Vec<Uuid> = Vec::new();
        for result in &results {
            if !uploader_ids.contains(&result.uploaded_by) {
                uploader_ids.push(result.uploaded_by);
            }
        }
        let uploaders = self.store.find_users(&uploader_ids).await?;
        let lecturers = uploader_ids
            .iter()
            .filter_map(|id| uploaders.iter().find(|u| u.id == *id))
            .map(UserProfile::full_name)
            .collect();

        Ok(CourseSessionAnalysis {
            course,
            session: session.clone(),
            lecturers,
            grade_distribution: aggregate::compute_grade_distribution(&results),
            stats: aggregate::compute_course_session_stats(&results, self.config.top_performers),
        })
    }

    pub async fn session_analysis(&self, session: &Session) -> CoreResult<SessionAnalysis> {
        let filter = ResultFilter {
            session: Some(session.clone()),
            ..ResultFilter::default()
        }
        .approved();
        let results = self.store.find_results(&filter).await?;

        let student_ids: Vec<Uuid> = results
            .iter()
            .map(|r| r.key.student_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let students = self.store.find_users(&student_ids).await?;

        Ok(SessionAnalysis {
            session: session.clone(),
            department_performance: aggregate::compute_cohort_stats(&results, &students),
            top_performers: aggregate::rank_results(&results, self.config.top_performers),
            grade_distribution: aggregate::compute_grade_distribution(&results),
        })
    }

    /// Latest fully recorded pending results and latest approved results.
    pub async fn review_queue(&self, actor_id: Uuid, limit: usize) -> CoreResult<ReviewQueue> {
        self.require_role(actor_id, AccountType::SuperAdmin).await?;
        let mut all = self.store.find_results(&ResultFilter::default()).await?;
        all.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));

        let (approved, pending): (Vec<ResultRecord>, Vec<ResultRecord>) =
            all.into_iter().partition(ResultRecord::is_approved);

        Ok(ReviewQueue {
            pending: pending
                .into_iter()
                .filter(|r| r.scores.is_complete())
                .take(limit)
                .collect(),
            approved: approved.into_iter().take(limit).collect(),
        })
    }

    pub async fn dashboard(&self, actor_id: Uuid) -> CoreResult<Dashboard> {
        self.require_role(actor_id, AccountType::SuperAdmin).await?;
        let results = self.store.find_results(&ResultFilter::default()).await?;
        let requests = self.store.list_privileges(None, None).await?;
        let students = self.store.list_users(AccountType::Student).await?;

        Ok(Dashboard {
            lecturers: self.store.list_users(AccountType::Admin).await?.len(),
            super_admins: self.store.list_users(AccountType::SuperAdmin).await?.len(),
            courses: self.store.list_courses().await?.len(),
            departments: aggregate::compute_department_counts(&results, &students),
            students: students.len(),
            results_total: results.len(),
            results_pending: results
                .iter()
                .filter(|r| !r.is_approved() && r.scores.is_complete())
                .count(),
            results_approved: results.iter().filter(|r| r.is_approved()).count(),
            requests_total: requests.len(),
            requests_pending: requests
                .iter()
                .filter(|r| r.status == PrivilegeStatus::Pending)
                .count(),
            requests_approved: requests
                .iter()
                .filter(|r| r.status == PrivilegeStatus::Approved)
                .count(),
            active_period: self.store.current_period().await?,
        })
    }

    /// Everything the admin has uploaded; admins see only their own.
    pub async fn uploads_by(&self, admin_id: Uuid) -> CoreResult<Vec<ResultRecord>> {
        self.require_role(admin_id, AccountType::Admin).await?;
        let filter = ResultFilter {
            uploaded_by: Some(admin_id),
            ..ResultFilter::default()
        };
        Ok(self.store.find_results(&filter).await?)
    }

    pub async fn open_period(
        &self,
        actor_id: Uuid,
        semester: Semester,
        session: Session,
    ) -> CoreResult<AcademicPeriod> {
        self.require_role(actor_id, AccountType::SuperAdmin).await?;
        period::open_period(self.store.as_ref(), semester, session).await
    }

    pub async fn student(&self, student: &StudentRef) -> CoreResult<UserProfile> {
        let found = match student {
            StudentRef::Id(id) => self.store.find_user(*id).await?,
            StudentRef::IdNumber(number) => self.store.find_user_by_id_number(number).await?,
        };
        found
            .filter(|u| u.account_type == AccountType::Student)
            .ok_or_else(|| CoreError::not_found("student"))
    }

    async fn require_role(&self, user_id: Uuid, role: AccountType) -> CoreResult<UserProfile> {
        let user = self
            .store
            .find_user(user_id)
            .await?
            .ok_or_else(|| CoreError::not_found("user"))?;
        if user.account_type != role {
            return Err(CoreError::Forbidden(format!(
                "{} access required",
                role.as_str()
            )));
        }
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grade::Grade;
    use crate::memory::MemoryStore;

    const LECTURER: Uuid = Uuid::from_u128(100);
    const REGISTRAR: Uuid = Uuid::from_u128(200);
    const ADA: Uuid = Uuid::from_u128(1);
    const BAYO: Uuid = Uuid::from_u128(2);

    fn user(id: Uuid, id_number: &str, account_type: AccountType, department: &str) -> UserProfile {
        UserProfile {
            id,
            first_name: "Test".to_string(),
            last_name: id_number.to_string(),
            email: format!("{id_number}@example.edu"),
            id_number: id_number.to_string(),
            account_type,
            department: Some(department.to_string()),
            programme: None,
            session: Some("2023/2024".parse().unwrap()),
        }
    }

    async fn service(require_upload_privilege: bool) -> ResultService<MemoryStore> {
        let store = MemoryStore::new();
        store.add_user(user(LECTURER, "STAFF/100", AccountType::Admin, "CSM")).await;
        store.add_user(user(REGISTRAR, "STAFF/200", AccountType::SuperAdmin, "Registry")).await;
        store.add_user(user(ADA, "MTU/001", AccountType::Student, "Computer Science")).await;
        store.add_user(user(BAYO, "MTU/002", AccountType::Student, "Biology")).await;
        for (code, title) in [
            ("CSE 201", "Introduction to Software Engineering"),
            ("CSE 203", "Discrete Structure"),
            ("CSE 205", "Software Requirements and Design"),
            ("CSE 202", "Computer Programming II"),
        ] {
            store.add_course(code, title).await;
        }

        ResultService::new(
            Arc::new(store),
            ServiceConfig {
                require_upload_privilege,
                ..ServiceConfig::default()
            },
        )
    }

    fn upload(
        student: &str,
        course: &str,
        component: ScoreComponent,
        value: f64,
        unit: u32,
    ) -> ScoreUpload {
        let semester = crate::semester::applicable_semester(course).unwrap();
        ScoreUpload {
            student: StudentRef::IdNumber(student.to_string()),
            course_code: course.to_string(),
            semester,
            session: "2024/2025".parse().unwrap(),
            component,
            value,
            unit,
            uploader_id: LECTURER,
        }
    }

    async fn record(
        service: &ResultService<MemoryStore>,
        student: &str,
        course: &str,
        test: f64,
        exam: f64,
        unit: u32,
    ) -> ResultRecord {
        service
            .submit_score(&upload(student, course, ScoreComponent::Test, test, unit))
            .await
            .unwrap();
        service
            .submit_score(&upload(student, course, ScoreComponent::Exam, exam, unit))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn upload_requires_an_approved_privilege() {
        let service = service(true).await;
        let err = service
            .submit_score(&upload("MTU/001", "CSE 201", ScoreComponent::Test, 20.0, 3))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));

        let request = service.privileges().request(LECTURER, "CSE 201").await.unwrap();
        assert!(matches!(
            service.approve_privilege(request.id, LECTURER).await.unwrap_err(),
            CoreError::Forbidden(_)
        ));
        service.approve_privilege(request.id, REGISTRAR).await.unwrap();
        assert!(matches!(
            service.reject_privilege(request.id, REGISTRAR).await.unwrap_err(),
            CoreError::PrivilegeExists(PrivilegeStatus::Approved)
        ));
        let record = service
            .submit_score(&upload("MTU/001", "CSE 201", ScoreComponent::Test, 20.0, 3))
            .await
            .unwrap();
        assert_eq!(record.key.student_id, ADA);
    }

    #[tokio::test]
    async fn unknown_references_are_not_found() {
        let service = service(false).await;
        let missing_student = service
            .submit_score(&upload("MTU/999", "CSE 201", ScoreComponent::Test, 20.0, 3))
            .await
            .unwrap_err();
        assert!(matches!(missing_student, CoreError::NotFound(_)));

        let missing_course = service
            .submit_score(&upload("MTU/001", "CSE 301", ScoreComponent::Test, 20.0, 3))
            .await
            .unwrap_err();
        assert!(matches!(missing_course, CoreError::NotFound(_)));

        let mut by_student = upload("MTU/001", "CSE 201", ScoreComponent::Test, 20.0, 3);
        by_student.uploader_id = ADA;
        assert!(matches!(
            service.submit_score(&by_student).await.unwrap_err(),
            CoreError::Forbidden(_)
        ));
    }

    #[tokio::test]
    async fn summary_counts_only_approved_results() {
        let service = service(false).await;
        let a = record(&service, "MTU/001", "CSE 201", 25.0, 50.0, 3).await;
        let b = record(&service, "MTU/001", "CSE 203", 20.0, 45.0, 2).await;
        let f = record(&service, "MTU/001", "CSE 205", 10.0, 20.0, 3).await;
        let pending = record(&service, "MTU/001", "CSE 202", 30.0, 70.0, 4).await;
        assert_eq!(pending.grade(), Grade::A);

        for result in [&a, &b, &f] {
            service.approve_result(result.id, REGISTRAR).await.unwrap();
        }

        let summary = service
            .student_summary(&StudentRef::Id(ADA))
            .await
            .unwrap();
        assert_eq!(summary.cgpa, 2.88);
        assert_eq!(summary.gpa, 2.88);
        assert_eq!(summary.total_units, 8);
        assert_eq!(summary.per_course.len(), 3);
        assert_eq!(summary.per_semester.len(), 1);
        assert_eq!(summary.level, None);
        assert_eq!(summary.grade_distribution[0].count, 1);
    }

    #[tokio::test]
    async fn summary_gpa_uses_latest_semester() {
        let service = service(false).await;
        let first = record(&service, "MTU/001", "CSE 201", 25.0, 50.0, 3).await;
        let second = record(&service, "MTU/001", "CSE 202", 20.0, 30.0, 3).await;
        service.approve_result(first.id, REGISTRAR).await.unwrap();
        service.approve_result(second.id, REGISTRAR).await.unwrap();
        service
            .open_period(REGISTRAR, Semester::Second, "2024/2025".parse().unwrap())
            .await
            .unwrap();

        let summary = service.student_summary(&StudentRef::Id(ADA)).await.unwrap();
        assert_eq!(summary.gpa, 3.0);
        assert_eq!(summary.cgpa, 4.0);
        assert_eq!(summary.level, Some(200));
    }

    #[tokio::test]
    async fn semester_view_needs_approved_results() {
        let service = service(false).await;
        let result = record(&service, "MTU/001", "CSE 201", 25.0, 50.0, 3).await;
        let session: Session = "2024/2025".parse().unwrap();
        let student = StudentRef::IdNumber("MTU/001".to_string());

        assert!(matches!(
            service.semester_view(&student, Semester::First, &session).await.unwrap_err(),
            CoreError::NotFound(_)
        ));

        service.approve_result(result.id, REGISTRAR).await.unwrap();
        let view = service.semester_view(&student, Semester::First, &session).await.unwrap();
        assert_eq!(view.gpa, 5.0);
        assert_eq!(view.courses[0].test_score, Some(25.0));
        assert_eq!(service.result_sessions(&student).await.unwrap(), vec![session]);
    }

    #[tokio::test]
    async fn approval_and_rejection_need_super_admin() {
        let service = service(false).await;
        let result = record(&service, "MTU/001", "CSE 201", 25.0, 50.0, 3).await;
        assert!(matches!(
            service.approve_result(result.id, LECTURER).await.unwrap_err(),
            CoreError::Forbidden(_)
        ));
        service.approve_result(result.id, REGISTRAR).await.unwrap();
        assert!(matches!(
            service.reject_result(result.id, REGISTRAR).await.unwrap_err(),
            CoreError::ApprovalLocked
        ));
    }

    #[tokio::test]
    async fn analyses_cover_course_and_session() {
        let service = service(false).await;
        let results = vec![
            record(&service, "MTU/001", "CSE 201", 28.0, 60.0, 3).await,
            record(&service, "MTU/002", "CSE 201", 10.0, 20.0, 3).await,
            record(&service, "MTU/002", "CSE 203", 20.0, 35.0, 2).await,
        ];
        for result in &results {
            service.approve_result(result.id, REGISTRAR).await.unwrap();
        }
        // Pending results stay out of every analysis.
        record(&service, "MTU/001", "CSE 203", 5.0, 5.0, 2).await;

        let session: Session = "2024/2025".parse().unwrap();
        let course = service.course_session_analysis("cse 201", &session).await.unwrap();
        assert_eq!(course.course.code, "CSE 201");
        assert_eq!(course.stats.results, 2);
        assert_eq!(course.stats.pass_rate, 50);
        assert_eq!(course.stats.average, 59.0);
        assert_eq!(course.stats.top[0].student_id, ADA);
        assert_eq!(course.lecturers, vec!["Test STAFF/100".to_string()]);

        let analysis = service.session_analysis(&session).await.unwrap();
        let biology = analysis
            .department_performance
            .iter()
            .find(|d| d.department == "Biology")
            .unwrap();
        assert_eq!(biology.students, 1);
        assert_eq!(biology.pass_rate, 100);
        assert_eq!(analysis.top_performers[0].total_score, 88.0);
        assert_eq!(analysis.grade_distribution.iter().map(|g| g.count).sum::<usize>(), 3);
    }

    #[tokio::test]
    async fn review_queue_and_dashboard_reflect_state() {
        let service = service(false).await;
        let complete = record(&service, "MTU/001", "CSE 201", 28.0, 60.0, 3).await;
        service
            .submit_score(&upload("MTU/002", "CSE 201", ScoreComponent::Test, 20.0, 3))
            .await
            .unwrap();
        let approved = record(&service, "MTU/002", "CSE 203", 20.0, 35.0, 2).await;
        service.approve_result(approved.id, REGISTRAR).await.unwrap();

        let queue = service.review_queue(REGISTRAR, 10).await.unwrap();
        assert_eq!(queue.pending.len(), 1);
        assert_eq!(queue.pending[0].id, complete.id);
        assert_eq!(queue.approved.len(), 1);

        let dashboard = service.dashboard(REGISTRAR).await.unwrap();
        assert_eq!(dashboard.results_total, 3);
        assert_eq!(dashboard.results_pending, 1);
        assert_eq!(dashboard.results_approved, 1);
        assert!(dashboard.active_period.is_none());
        assert_eq!(
            (dashboard.students, dashboard.lecturers, dashboard.super_admins),
            (2, 1, 1)
        );
        assert_eq!(dashboard.courses, 4);
        let biology = &dashboard.departments[0];
        assert_eq!(biology.department, "Biology");
        assert_eq!((biology.students, biology.results, biology.approved), (1, 2, 1));

        assert_eq!(service.uploads_by(LECTURER).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn audit_views_check_the_caller() {
        let service = service(false).await;
        record(&service, "MTU/001", "CSE 201", 28.0, 60.0, 3).await;

        for caller in [LECTURER, ADA] {
            assert!(matches!(
                service.review_queue(caller, 10).await.unwrap_err(),
                CoreError::Forbidden(_)
            ));
            assert!(matches!(
                service.dashboard(caller).await.unwrap_err(),
                CoreError::Forbidden(_)
            ));
        }
        for caller in [REGISTRAR, ADA] {
            assert!(matches!(
                service.uploads_by(caller).await.unwrap_err(),
                CoreError::Forbidden(_)
            ));
        }
        assert!(matches!(
            service.dashboard(Uuid::from_u128(999)).await.unwrap_err(),
            CoreError::NotFound(_)
        ));
    }
}
