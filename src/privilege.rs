//! Lecturer requests for permission to upload results for a course.
//!
//! A request is pending until a super-administrator approves it (a durable
//! grant) or rejects it (the request is deleted).

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult, StoreError};
use crate::models::{AccountType, PrivilegeRequest, PrivilegeStatus};
use crate::store::{Directory, PrivilegeStore};

pub struct PrivilegeWorkflow<S> {
    store: Arc<S>,
}

impl<S: PrivilegeStore + Directory> PrivilegeWorkflow<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn request(
        &self,
        lecturer_id: Uuid,
        course_code: &str,
    ) -> CoreResult<PrivilegeRequest> {
        match self.store.find_user(lecturer_id).await? {
            Some(user) if user.account_type == AccountType::Admin => {}
            _ => return Err(CoreError::not_found("lecturer")),
        }
        let course = self
            .store
            .find_course(course_code)
            .await?
            .ok_or_else(|| CoreError::not_found("course"))?;

        if let Some(existing) = self.store.find_privilege(lecturer_id, &course.code).await? {
            return Err(CoreError::PrivilegeExists(existing.status));
        }

        let request = PrivilegeRequest {
            id: Uuid::new_v4(),
            lecturer_id,
            course_code: course.code,
            status: PrivilegeStatus::Pending,
            requested_at: Utc::now(),
            approved_by: None,
        };

        match self.store.insert_privilege(&request).await {
            Ok(()) => Ok(request),
            Err(StoreError::Conflict) => {
                match self.store.find_privilege(lecturer_id, &request.course_code).await? {
                    Some(existing) => Err(CoreError::PrivilegeExists(existing.status)),
                    None => Err(StoreError::Conflict.into()),
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn approve(
        &self,
        request_id: Uuid,
        approver_id: Uuid,
    ) -> CoreResult<PrivilegeRequest> {
        if !self.store.approve_privilege(request_id, approver_id).await? {
            // Already approved is fine; anything else is gone.
            return match self.store.find_privilege_by_id(request_id).await? {
                Some(existing) if existing.status == PrivilegeStatus::Approved => Ok(existing),
                _ => Err(CoreError::not_found("privilege request")),
            };
        }

        self.store
            .find_privilege_by_id(request_id)
            .await?
            .ok_or_else(|| CoreError::not_found("privilege request"))
    }

    /// Deletes a pending request. Approved grants cannot be rejected.
    pub async fn reject(&self, request_id: Uuid) -> CoreResult<PrivilegeRequest> {
        let existing = self
            .store
            .find_privilege_by_id(request_id)
            .await?
            .ok_or_else(|| CoreError::not_found("privilege request"))?;

        if existing.status == PrivilegeStatus::Approved
            || !self.store.delete_pending_privilege(request_id).await?
        {
            return match self.store.find_privilege_by_id(request_id).await? {
                Some(current) => Err(CoreError::PrivilegeExists(current.status)),
                None => Err(CoreError::not_found("privilege request")),
            };
        }

        Ok(existing)
    }

    /// The lecturer's own withdrawal of a pending request.
    pub async fn withdraw(
        &self,
        lecturer_id: Uuid,
        course_code: &str,
    ) -> CoreResult<PrivilegeRequest> {
        let pending = self
            .store
            .find_privilege(lecturer_id, course_code)
            .await?
            .filter(|p| p.status == PrivilegeStatus::Pending)
            .ok_or_else(|| CoreError::not_found("pending privilege request"))?;

        if !self.store.delete_pending_privilege(pending.id).await? {
            return Err(CoreError::not_found("pending privilege request"));
        }
        Ok(pending)
    }

    pub async fn requests_for(&self, lecturer_id: Uuid) -> CoreResult<Vec<PrivilegeRequest>> {
        Ok(self.store.list_privileges(Some(lecturer_id), None).await?)
    }

    /// Pending requests and approved grants, for the administrator's queue.
    pub async fn overview(&self) -> CoreResult<(Vec<PrivilegeRequest>, Vec<PrivilegeRequest>)> {
        let pending = self
            .store
            .list_privileges(None, Some(PrivilegeStatus::Pending))
            .await?;
        let approved = self
            .store
            .list_privileges(None, Some(PrivilegeStatus::Approved))
            .await?;
        Ok((pending, approved))
    }

    pub async fn has_privilege(&self, lecturer_id: Uuid, course_code: &str) -> CoreResult<bool> {
        Ok(self
            .store
            .find_privilege(lecturer_id, course_code)
            .await?
            .is_some_and(|p| p.status == PrivilegeStatus::Approved))
    }
}
