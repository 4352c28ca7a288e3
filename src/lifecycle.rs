use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult, StoreError};
use crate::models::{Approval, ResultKey, ResultRecord, ScoreComponent, Scores};
use crate::semester;
use crate::store::ResultStore;

/// Read-modify-write attempts before a persistent conflict is surfaced.
const MAX_ATTEMPTS: usize = 3;

/// Largest credit unit a course can carry.
pub const MAX_UNIT: u32 = 12;

/// Whether an exam score may be recorded before the test score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExamPolicy {
    #[default]
    Independent,
    RequiresTest,
}

impl FromStr for ExamPolicy {
    type Err = CoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "independent" => Ok(ExamPolicy::Independent),
            "requires-test" => Ok(ExamPolicy::RequiresTest),
            other => Err(CoreError::Validation(format!(
                "unknown exam policy {other:?}, expected 'independent' or 'requires-test'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreSubmission {
    pub key: ResultKey,
    pub component: ScoreComponent,
    pub value: f64,
    pub unit: u32,
    pub uploader_id: Uuid,
}

/// How an existing result is addressed.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultRef {
    Key(ResultKey),
    Id(Uuid),
}

impl From<ResultKey> for ResultRef {
    fn from(key: ResultKey) -> Self {
        ResultRef::Key(key)
    }
}

impl From<Uuid> for ResultRef {
    fn from(id: Uuid) -> Self {
        ResultRef::Id(id)
    }
}

pub struct ResultLifecycle<S> {
    store: Arc<S>,
    policy: ExamPolicy,
}

impl<S: ResultStore> ResultLifecycle<S> {
    pub fn new(store: Arc<S>, policy: ExamPolicy) -> Self {
        Self { store, policy }
    }

    pub async fn submit_score(&self, submission: &ScoreSubmission) -> CoreResult<ResultRecord> {
        validate_submission(submission)?;
        let mut key = submission.key.clone();
        key.course_code = key.course_code.trim().to_string();

        for _ in 0..MAX_ATTEMPTS {
            let written = match self.store.find_result(&key).await? {
                Some(existing) => {
                    let updated = apply_score(&existing, submission)?;
                    self.store
                        .update_result(&updated, existing.version)
                        .await
                        .map(|_| updated)
                }
                None => {
                    if submission.component == ScoreComponent::Exam
                        && self.policy == ExamPolicy::RequiresTest
                    {
                        return Err(CoreError::TestRequired);
                    }
                    let created = ResultRecord {
                        id: Uuid::new_v4(),
                        key: key.clone(),
                        scores: Scores::first(submission.component, submission.value),
                        unit: submission.unit,
                        uploaded_by: submission.uploader_id,
                        uploaded_at: Utc::now(),
                        approval: None,
                        version: 1,
                    };
                    self.store.insert_result(&created).await.map(|_| created)
                }
            };

            match written {
                Err(StoreError::Conflict) => continue,
                other => return Ok(other?),
            }
        }

        Err(StoreError::Conflict.into())
    }

    /// One-way transition to approved. Approving twice keeps the first approval.
    pub async fn approve(
        &self,
        target: impl Into<ResultRef>,
        approver_id: Uuid,
    ) -> CoreResult<ResultRecord> {
        let target = target.into();

        for _ in 0..MAX_ATTEMPTS {
            let existing = self.load(&target).await?;
            if existing.is_approved() {
                return Ok(existing);
            }

            let mut approved = existing.clone();
            approved.approval = Some(Approval {
                by: approver_id,
                at: Utc::now(),
            });
            approved.version += 1;

            match self.store.update_result(&approved, existing.version).await {
                Err(StoreError::Conflict) => continue,
                other => return other.map(|_| approved).map_err(CoreError::from),
            }
        }

        Err(StoreError::Conflict.into())
    }

    /// Deletes an unapproved result.
    pub async fn reject(&self, target: impl Into<ResultRef>) -> CoreResult<ResultRecord> {
        let target = target.into();

        for _ in 0..MAX_ATTEMPTS {
            let existing = self.load(&target).await?;
            if existing.is_approved() {
                return Err(CoreError::ApprovalLocked);
            }

            match self.store.delete_result(existing.id, existing.version).await {
                Err(StoreError::Conflict) => continue,
                other => return other.map(|_| existing).map_err(CoreError::from),
            }
        }

        Err(StoreError::Conflict.into())
    }

    async fn load(&self, target: &ResultRef) -> CoreResult<ResultRecord> {
        let found = match target {
            ResultRef::Key(key) => self.store.find_result(key).await?,
            ResultRef::Id(id) => self.store.find_result_by_id(*id).await?,
        };
        found.ok_or_else(|| CoreError::not_found("result"))
    }
}

fn validate_submission(submission: &ScoreSubmission) -> CoreResult<()> {
    let max = submission.component.max();
    if !submission.value.is_finite() || submission.value < 0.0 || submission.value > max {
        return Err(CoreError::Validation(format!(
            "{} score must be between 0 and {max}",
            submission.component
        )));
    }
    if submission.unit == 0 || submission.unit > MAX_UNIT {
        return Err(CoreError::Validation(format!(
            "unit must be between 1 and {MAX_UNIT}"
        )));
    }
    semester::validate(&submission.key.course_code, submission.key.semester)
}

fn apply_score(existing: &ResultRecord, submission: &ScoreSubmission) -> CoreResult<ResultRecord> {
    if existing.is_approved() {
        return Err(CoreError::ApprovalLocked);
    }
    if existing.unit != submission.unit {
        return Err(CoreError::UnitMismatch {
            recorded: existing.unit,
        });
    }

    let mut updated = existing.clone();
    updated.scores = existing.scores.with(submission.component, submission.value);
    updated.version += 1;
    Ok(updated)
}
