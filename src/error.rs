use thiserror::Error;

use crate::models::PrivilegeStatus;
use crate::semester::Semester;

#[derive(Error, Debug)]
pub enum StoreError {
    /// The stored row changed (or already exists) since it was read.
    #[error("concurrent modification")]
    Conflict,

    #[error("storage backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Backend(Box::new(err))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("{0}")]
    Validation(String),

    #[error("{course_code} can only be recorded for the {expected} semester")]
    SemesterMismatch {
        course_code: String,
        expected: Semester,
    },

    #[error("unit mismatch: this result was originally created with {recorded} unit(s)")]
    UnitMismatch { recorded: u32 },

    #[error("result has been approved and can no longer be changed")]
    ApprovalLocked,

    #[error("an exam score requires a test score to be recorded first")]
    TestRequired,

    #[error("{0} not found")]
    NotFound(String),

    #[error("not permitted: {0}")]
    Forbidden(String),

    #[error("privilege request already {0}")]
    PrivilegeExists(PrivilegeStatus),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl CoreError {
    pub fn not_found(what: impl Into<String>) -> Self {
        CoreError::NotFound(what.into())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
