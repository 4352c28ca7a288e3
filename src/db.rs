use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{StoreError, StoreResult};
use crate::models::{
    AcademicPeriod, AccountType, Approval, Course, PrivilegeRequest, PrivilegeStatus, ResultKey,
    ResultRecord, ScoreComponent, Scores, UserProfile,
};
use crate::semester::{Semester, Session};
use crate::service::{Backend, ResultService, ScoreUpload, ServiceConfig, StudentRef};
use crate::store::{
    CurrentPeriodProvider, Directory, PeriodStore, PrivilegeStore, ResultFilter, ResultStore,
};

const RESULT_COLUMNS: &str = "id, student_id, course_code, semester, session, test_score, \
     exam_score, unit, uploaded_by, uploaded_at, approved_by, approved_at, version";
const USER_COLUMNS: &str =
    "id, first_name, last_name, email, id_number, account_type, department, programme, session";
const PRIVILEGE_COLUMNS: &str = "id, lecturer_id, course_code, status, requested_at, approved_by";
const PERIOD_COLUMNS: &str = "id, semester, session, is_active, created_at";

pub async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect(&config.database_url)
        .await
        .context("failed to connect to Postgres")
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Postgres-backed implementation of every store trait.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn corrupt(err: impl std::error::Error + Send + Sync + 'static) -> StoreError {
    StoreError::Backend(Box::new(err))
}

fn row_to_result(row: &PgRow) -> StoreResult<ResultRecord> {
    let semester: String = row.try_get("semester")?;
    let session: String = row.try_get("session")?;
    let scores = Scores::from_parts(row.try_get("test_score")?, row.try_get("exam_score")?)
        .ok_or_else(|| StoreError::Backend("result row holds no scores".into()))?;
    let unit: i32 = row.try_get("unit")?;
    let approved_by: Option<Uuid> = row.try_get("approved_by")?;
    let approved_at: Option<DateTime<Utc>> = row.try_get("approved_at")?;

    Ok(ResultRecord {
        id: row.try_get("id")?,
        key: ResultKey {
            student_id: row.try_get("student_id")?,
            course_code: row.try_get("course_code")?,
            semester: semester.parse().map_err(corrupt)?,
            session: session.parse().map_err(corrupt)?,
        },
        scores,
        unit: u32::try_from(unit).map_err(corrupt)?,
        uploaded_by: row.try_get("uploaded_by")?,
        uploaded_at: row.try_get("uploaded_at")?,
        approval: approved_by
            .zip(approved_at)
            .map(|(by, at)| Approval { by, at }),
        version: row.try_get("version")?,
    })
}

fn row_to_user(row: &PgRow) -> StoreResult<UserProfile> {
    let account_type: String = row.try_get("account_type")?;
    let session: Option<String> = row.try_get("session")?;

    Ok(UserProfile {
        id: row.try_get("id")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        email: row.try_get("email")?,
        id_number: row.try_get("id_number")?,
        account_type: account_type.parse().map_err(corrupt)?,
        department: row.try_get("department")?,
        programme: row.try_get("programme")?,
        session: session
            .map(|s| s.parse::<Session>())
            .transpose()
            .map_err(corrupt)?,
    })
}

fn row_to_privilege(row: &PgRow) -> StoreResult<PrivilegeRequest> {
    let status: String = row.try_get("status")?;
    Ok(PrivilegeRequest {
        id: row.try_get("id")?,
        lecturer_id: row.try_get("lecturer_id")?,
        course_code: row.try_get("course_code")?,
        status: status.parse().map_err(corrupt)?,
        requested_at: row.try_get("requested_at")?,
        approved_by: row.try_get("approved_by")?,
    })
}

fn row_to_period(row: &PgRow) -> StoreResult<AcademicPeriod> {
    let semester: String = row.try_get("semester")?;
    let session: String = row.try_get("session")?;
    Ok(AcademicPeriod {
        id: row.try_get("id")?,
        semester: semester.parse().map_err(corrupt)?,
        session: session.parse().map_err(corrupt)?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl ResultStore for PgStore {
    async fn find_result(&self, key: &ResultKey) -> StoreResult<Option<ResultRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {RESULT_COLUMNS} FROM result_ledger.results \
             WHERE student_id = $1 AND lower(course_code) = lower($2) \
             AND semester = $3 AND session = $4"
        ))
        .bind(key.student_id)
        .bind(key.course_code.trim())
        .bind(key.semester.as_str())
        .bind(key.session.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_result).transpose()
    }

    async fn find_result_by_id(&self, id: Uuid) -> StoreResult<Option<ResultRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {RESULT_COLUMNS} FROM result_ledger.results WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_result).transpose()
    }

    async fn find_results(&self, filter: &ResultFilter) -> StoreResult<Vec<ResultRecord>> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {RESULT_COLUMNS} FROM result_ledger.results WHERE true"
        ));

        if let Some(student_id) = filter.student_id {
            query.push(" AND student_id = ").push_bind(student_id);
        }
        if let Some(code) = &filter.course_code {
            query
                .push(" AND lower(course_code) = lower(")
                .push_bind(code.as_str())
                .push(")");
        }
        if let Some(semester) = filter.semester {
            query.push(" AND semester = ").push_bind(semester.as_str());
        }
        if let Some(session) = &filter.session {
            query.push(" AND session = ").push_bind(session.as_str());
        }
        if let Some(approved) = filter.approved {
            query.push(" AND approved = ").push_bind(approved);
        }
        if let Some(uploader) = filter.uploaded_by {
            query.push(" AND uploaded_by = ").push_bind(uploader);
        }
        query.push(" ORDER BY uploaded_at, id");

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_result).collect()
    }

    async fn insert_result(&self, record: &ResultRecord) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO result_ledger.results
            (id, student_id, course_code, semester, session, test_score, exam_score,
             total_score, grade, unit, uploaded_by, uploaded_at, approved, approved_by,
             approved_at, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            ON CONFLICT (student_id, (lower(course_code)), semester, session) DO NOTHING
            "#,
        )
        .bind(record.id)
        .bind(record.key.student_id)
        .bind(&record.key.course_code)
        .bind(record.key.semester.as_str())
        .bind(record.key.session.as_str())
        .bind(record.scores.test())
        .bind(record.scores.exam())
        .bind(record.total_score())
        .bind(record.grade().as_str())
        .bind(i32::try_from(record.unit).map_err(corrupt)?)
        .bind(record.uploaded_by)
        .bind(record.uploaded_at)
        .bind(record.is_approved())
        .bind(record.approval.map(|a| a.by))
        .bind(record.approval.map(|a| a.at))
        .bind(record.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            debug!(course = %record.key.course_code, "result insert lost a race");
            return Err(StoreError::Conflict);
        }
        Ok(())
    }

    async fn update_result(
        &self,
        record: &ResultRecord,
        expected_version: i64,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE result_ledger.results
            SET test_score = $3, exam_score = $4, total_score = $5, grade = $6,
                approved = $7, approved_by = $8, approved_at = $9, version = $10
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(record.id)
        .bind(expected_version)
        .bind(record.scores.test())
        .bind(record.scores.exam())
        .bind(record.total_score())
        .bind(record.grade().as_str())
        .bind(record.is_approved())
        .bind(record.approval.map(|a| a.by))
        .bind(record.approval.map(|a| a.at))
        .bind(record.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            debug!(id = %record.id, expected_version, "stale result update");
            return Err(StoreError::Conflict);
        }
        Ok(())
    }

    async fn delete_result(&self, id: Uuid, expected_version: i64) -> StoreResult<()> {
        let result =
            sqlx::query("DELETE FROM result_ledger.results WHERE id = $1 AND version = $2")
                .bind(id)
                .bind(expected_version)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict);
        }
        Ok(())
    }
}

#[async_trait]
impl Directory for PgStore {
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<UserProfile>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM result_ledger.users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn find_user_by_id_number(&self, id_number: &str) -> StoreResult<Option<UserProfile>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM result_ledger.users WHERE id_number = $1"
        ))
        .bind(id_number)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn find_users(&self, ids: &[Uuid]) -> StoreResult<Vec<UserProfile>> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM result_ledger.users WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_user).collect()
    }

    async fn find_course(&self, code: &str) -> StoreResult<Option<Course>> {
        let row = sqlx::query(
            "SELECT code, title FROM result_ledger.courses WHERE lower(code) = lower($1)",
        )
        .bind(code.trim())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| {
            Ok::<_, StoreError>(Course {
                code: r.try_get("code")?,
                title: r.try_get("title")?,
            })
        })
        .transpose()
    }

    async fn list_users(&self, account_type: AccountType) -> StoreResult<Vec<UserProfile>> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM result_ledger.users WHERE account_type = $1 \
             ORDER BY last_name, first_name"
        ))
        .bind(account_type.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_user).collect()
    }

    async fn list_courses(&self) -> StoreResult<Vec<Course>> {
        let rows = sqlx::query("SELECT code, title FROM result_ledger.courses ORDER BY code")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|r| {
                Ok::<_, StoreError>(Course {
                    code: r.try_get("code")?,
                    title: r.try_get("title")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl PrivilegeStore for PgStore {
    async fn find_privilege(
        &self,
        lecturer_id: Uuid,
        course_code: &str,
    ) -> StoreResult<Option<PrivilegeRequest>> {
        let row = sqlx::query(&format!(
            "SELECT {PRIVILEGE_COLUMNS} FROM result_ledger.privilege_requests \
             WHERE lecturer_id = $1 AND lower(course_code) = lower($2)"
        ))
        .bind(lecturer_id)
        .bind(course_code)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_privilege).transpose()
    }

    async fn find_privilege_by_id(&self, id: Uuid) -> StoreResult<Option<PrivilegeRequest>> {
        let row = sqlx::query(&format!(
            "SELECT {PRIVILEGE_COLUMNS} FROM result_ledger.privilege_requests WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_privilege).transpose()
    }

    async fn list_privileges(
        &self,
        lecturer_id: Option<Uuid>,
        status: Option<PrivilegeStatus>,
    ) -> StoreResult<Vec<PrivilegeRequest>> {
        let rows = sqlx::query(&format!(
            "SELECT {PRIVILEGE_COLUMNS} FROM result_ledger.privilege_requests \
             WHERE ($1::uuid IS NULL OR lecturer_id = $1) \
             AND ($2::text IS NULL OR status = $2) \
             ORDER BY requested_at DESC"
        ))
        .bind(lecturer_id)
        .bind(status.map(PrivilegeStatus::as_str))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_privilege).collect()
    }

    async fn insert_privilege(&self, request: &PrivilegeRequest) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO result_ledger.privilege_requests
            (id, lecturer_id, course_code, status, requested_at, approved_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (lecturer_id, course_code) DO NOTHING
            "#,
        )
        .bind(request.id)
        .bind(request.lecturer_id)
        .bind(&request.course_code)
        .bind(request.status.as_str())
        .bind(request.requested_at)
        .bind(request.approved_by)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict);
        }
        Ok(())
    }

    async fn approve_privilege(&self, id: Uuid, approver_id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE result_ledger.privilege_requests \
             SET status = 'approved', approved_by = $2 \
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(id)
        .bind(approver_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_pending_privilege(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query(
            "DELETE FROM result_ledger.privilege_requests WHERE id = $1 AND status = 'pending'",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl CurrentPeriodProvider for PgStore {
    async fn current_period(&self) -> StoreResult<Option<AcademicPeriod>> {
        let row = sqlx::query(&format!(
            "SELECT {PERIOD_COLUMNS} FROM result_ledger.academic_periods WHERE is_active"
        ))
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_period).transpose()
    }
}

#[async_trait]
impl PeriodStore for PgStore {
    async fn find_period(
        &self,
        semester: Semester,
        session: &Session,
    ) -> StoreResult<Option<AcademicPeriod>> {
        let row = sqlx::query(&format!(
            "SELECT {PERIOD_COLUMNS} FROM result_ledger.academic_periods \
             WHERE semester = $1 AND session = $2"
        ))
        .bind(semester.as_str())
        .bind(session.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_period).transpose()
    }

    async fn list_periods(&self) -> StoreResult<Vec<AcademicPeriod>> {
        let rows = sqlx::query(&format!(
            "SELECT {PERIOD_COLUMNS} FROM result_ledger.academic_periods ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_period).collect()
    }

    async fn activate_period(&self, period: &AcademicPeriod) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE result_ledger.academic_periods SET is_active = false WHERE is_active")
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO result_ledger.academic_periods
            (id, semester, session, is_active, created_at)
            VALUES ($1, $2, $3, true, $4)
            "#,
        )
        .bind(period.id)
        .bind(period.semester.as_str())
        .bind(period.session.as_str())
        .bind(period.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(semester = %period.semester, session = %period.session, "activated academic period");
        Ok(())
    }
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let users = vec![
        (
            Uuid::parse_str("6b1f3c2e-8d4a-4f0e-9c57-1a2b3c4d5e60")?,
            "Folake",
            "Adeyemi",
            "registrar@mtu.edu.ng",
            "STAFF/0001",
            AccountType::SuperAdmin,
            None,
            None,
            None,
        ),
        (
            Uuid::parse_str("9e2d7a41-3b5c-4e6f-8a90-b1c2d3e4f501")?,
            "Tunde",
            "Bello",
            "t.bello@mtu.edu.ng",
            "STAFF/0102",
            AccountType::Admin,
            Some("Computer Science and Mathematics"),
            None,
            None,
        ),
        (
            Uuid::parse_str("2fc14a12-5ab6-4ff2-b571-ef9a0d7f0475")?,
            "Ada",
            "Okafor",
            "ada.okafor@mtu.edu.ng",
            "MTU/22/0001",
            AccountType::Student,
            Some("Computer Science and Mathematics"),
            Some("Software Engineering"),
            Some("2022/2023"),
        ),
        (
            Uuid::parse_str("48f852b5-ad48-4efa-86dd-529207f1b1c4")?,
            "Jide",
            "Martins",
            "jide.martins@mtu.edu.ng",
            "MTU/23/0042",
            AccountType::Student,
            Some("Computer Science and Mathematics"),
            Some("Computer Science"),
            Some("2023/2024"),
        ),
        (
            Uuid::parse_str("13aaa878-9b0a-4a2f-a9c6-af6234bb4cee")?,
            "Kemi",
            "Lawal",
            "kemi.lawal@mtu.edu.ng",
            "MTU/23/0107",
            AccountType::Student,
            Some("Biological Science"),
            Some("Microbiology"),
            Some("2023/2024"),
        ),
    ];

    for (id, first, last, email, id_number, account_type, department, programme, session) in
        users.iter().cloned()
    {
        sqlx::query(
            r#"
            INSERT INTO result_ledger.users
            (id, first_name, last_name, email, id_number, account_type, department, programme,
             session)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (email) DO UPDATE
            SET first_name = EXCLUDED.first_name, last_name = EXCLUDED.last_name,
                department = EXCLUDED.department, programme = EXCLUDED.programme,
                session = EXCLUDED.session
            "#,
        )
        .bind(id)
        .bind(first)
        .bind(last)
        .bind(email)
        .bind(id_number)
        .bind(account_type.as_str())
        .bind(department)
        .bind(programme)
        .bind(session)
        .execute(pool)
        .await?;
    }

    let courses = vec![
        ("CSE 201", "Introduction to Software Engineering"),
        ("CSE 202", "Computer Programming II"),
        ("CSE 203", "Discrete Structure"),
        ("CSE 204", "Logic and its Application in Computer Science"),
        ("MTH 203", "Linear Algebra I"),
        ("BIO 201", "General Microbiology"),
    ];

    for (code, title) in courses {
        sqlx::query(
            r#"
            INSERT INTO result_ledger.courses (code, title)
            VALUES ($1, $2)
            ON CONFLICT (code) DO UPDATE SET title = EXCLUDED.title
            "#,
        )
        .bind(code)
        .bind(title)
        .execute(pool)
        .await?;
    }

    let store = Arc::new(PgStore::new(pool.clone()));
    let registrar = users[0].0;
    let lecturer = users[1].0;

    if store.current_period().await?.is_none() {
        crate::period::open_period(
            store.as_ref(),
            Semester::First,
            "2024/2025".parse().context("invalid session")?,
        )
        .await?;
    }

    let service = ResultService::new(store.clone(), ServiceConfig::default());
    for code in ["CSE 201", "CSE 203", "MTH 203", "BIO 201"] {
        if store.find_privilege(lecturer, code).await?.is_none() {
            let request = service.privileges().request(lecturer, code).await?;
            service.approve_privilege(request.id, registrar).await?;
        }
    }

    let scores = vec![
        ("MTU/22/0001", "CSE 201", 26.0, 52.0, 3, true),
        ("MTU/22/0001", "CSE 203", 18.0, 44.0, 2, true),
        ("MTU/22/0001", "MTH 203", 9.0, 28.0, 3, true),
        ("MTU/23/0042", "CSE 201", 22.0, 41.0, 3, true),
        ("MTU/23/0042", "CSE 203", 15.0, 30.0, 2, false),
        ("MTU/23/0107", "BIO 201", 24.0, 47.0, 3, true),
    ];

    let session: Session = "2024/2025".parse().context("invalid session")?;
    for (matric, course_code, test, exam, unit, approve) in scores {
        let student = service
            .student(&StudentRef::IdNumber(matric.to_string()))
            .await?;
        let key = ResultKey {
            student_id: student.id,
            course_code: course_code.to_string(),
            semester: Semester::First,
            session: session.clone(),
        };
        if store.find_result(&key).await?.is_some() {
            continue;
        }

        let mut record = None;
        for (component, value) in [(ScoreComponent::Test, test), (ScoreComponent::Exam, exam)] {
            let upload = ScoreUpload {
                student: StudentRef::Id(student.id),
                course_code: course_code.to_string(),
                semester: Semester::First,
                session: session.clone(),
                component,
                value,
                unit,
                uploader_id: lecturer,
            };
            record = Some(service.submit_score(&upload).await?);
        }
        if let (Some(record), true) = (record, approve) {
            service.approve_result(record.id, registrar).await?;
        }
    }

    Ok(())
}

#[derive(Debug, Default)]
pub struct ImportSummary {
    pub recorded: usize,
    /// (CSV line, reason) for every row that was not recorded.
    pub failures: Vec<(usize, String)>,
}

pub async fn import_scores<S: Backend>(
    service: &ResultService<S>,
    csv_path: &Path,
    uploader_id: Uuid,
) -> anyhow::Result<ImportSummary> {
    let reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    import_scores_from(service, reader, uploader_id).await
}

pub async fn import_scores_from<S: Backend, R: Read>(
    service: &ResultService<S>,
    mut reader: csv::Reader<R>,
    uploader_id: Uuid,
) -> anyhow::Result<ImportSummary> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        matric_number: String,
        course_code: String,
        semester: String,
        session: String,
        component: String,
        score: f64,
        unit: u32,
    }

    let mut summary = ImportSummary::default();

    for (index, row) in reader.deserialize::<CsvRow>().enumerate() {
        // Header is line 1.
        let line = index + 2;
        let row = match row {
            Ok(row) => row,
            Err(err) => {
                warn!(line, %err, "skipping malformed row");
                summary.failures.push((line, err.to_string()));
                continue;
            }
        };

        let upload = match (
            row.semester.parse::<Semester>(),
            row.session.parse::<Session>(),
            row.component.parse::<ScoreComponent>(),
        ) {
            (Ok(semester), Ok(session), Ok(component)) => ScoreUpload {
                student: StudentRef::IdNumber(row.matric_number.trim().to_string()),
                course_code: row.course_code,
                semester,
                session,
                component,
                value: row.score,
                unit: row.unit,
                uploader_id,
            },
            (Err(err), _, _) | (_, Err(err), _) | (_, _, Err(err)) => {
                summary.failures.push((line, err.to_string()));
                continue;
            }
        };

        match service.submit_score(&upload).await {
            Ok(_) => summary.recorded += 1,
            Err(err) => {
                debug!(line, %err, "row rejected");
                summary.failures.push((line, err.to_string()));
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    const LECTURER: Uuid = Uuid::from_u128(100);

    async fn service() -> ResultService<MemoryStore> {
        let store = MemoryStore::new();
        store
            .add_user(UserProfile {
                id: LECTURER,
                first_name: "Tunde".to_string(),
                last_name: "Bello".to_string(),
                email: "t.bello@example.edu".to_string(),
                id_number: "STAFF/0102".to_string(),
                account_type: AccountType::Admin,
                department: None,
                programme: None,
                session: None,
            })
            .await;
        store
            .add_user(UserProfile {
                id: Uuid::from_u128(1),
                first_name: "Ada".to_string(),
                last_name: "Okafor".to_string(),
                email: "ada@example.edu".to_string(),
                id_number: "MTU/22/0001".to_string(),
                account_type: AccountType::Student,
                department: Some("Computer Science and Mathematics".to_string()),
                programme: None,
                session: None,
            })
            .await;
        store.add_course("CSE 201", "Introduction to Software Engineering").await;
        store.add_course("CSE 202", "Computer Programming II").await;

        ResultService::new(
            Arc::new(store),
            ServiceConfig {
                require_upload_privilege: false,
                ..ServiceConfig::default()
            },
        )
    }

    #[tokio::test]
    async fn import_records_good_rows_and_reports_the_rest() {
        let service = service().await;
        let data = "\
matric_number,course_code,semester,session,component,score,unit
MTU/22/0001,CSE 201,First,2024/2025,test,24,3
MTU/22/0001,CSE 201,First,2024/2025,exam,51,3
MTU/22/0001,CSE 202,First,2024/2025,test,20,3
MTU/22/0001,CSE 201,First,2024/2025,exam,40,2
MTU/22/0001,CSE 201,First,2024-2025,exam,40,3
MTU/99/0000,CSE 201,First,2024/2025,test,10,3
MTU/22/0001,CSE 201,First,2024/2025,test,abc,3
";
        let reader = csv::Reader::from_reader(data.as_bytes());
        let summary = import_scores_from(&service, reader, LECTURER).await.unwrap();

        assert_eq!(summary.recorded, 2);
        let lines: Vec<usize> = summary.failures.iter().map(|(line, _)| *line).collect();
        assert_eq!(lines, vec![4, 5, 6, 7, 8]);
        assert!(summary.failures[0].1.contains("Second"));
        assert!(summary.failures[1].1.contains("unit mismatch"));

        let record = service
            .submit_score(&ScoreUpload {
                student: StudentRef::IdNumber("MTU/22/0001".to_string()),
                course_code: "CSE 201".to_string(),
                semester: Semester::First,
                session: "2024/2025".parse().unwrap(),
                component: ScoreComponent::Test,
                value: 24.0,
                unit: 3,
                uploader_id: LECTURER,
            })
            .await
            .unwrap();
        assert_eq!(record.total_score(), 75.0);
    }
}
