//! Peer reviewer assignment: at most one active reviewer per cohort.

use eesa_core::authz::require;
use eesa_core::error::{EesaError, EesaResult};
use eesa_core::models::audit::{AuditAction, AuditDraft, RequestContext};
use eesa_core::models::permission::{Action, ResourceType};
use eesa_core::models::principal::Actor;
use eesa_core::models::reviewer::{CreateReviewerAssignment, ReviewerAssignment};
use eesa_core::models::student::Cohort;
use eesa_core::repository::{ReviewerAssignOutcome, ReviewerRepository, StudentRepository};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::WorkflowConfig;
use crate::error::WorkflowError;

pub struct ReviewerService<S: StudentRepository, V: ReviewerRepository> {
    students: S,
    reviewers: V,
    config: WorkflowConfig,
}

impl<S: StudentRepository, V: ReviewerRepository> ReviewerService<S, V> {
    pub fn new(students: S, reviewers: V, config: WorkflowConfig) -> Self {
        Self {
            students,
            reviewers,
            config,
        }
    }

    /// Make `student_user_id` the reviewer of `cohort`, displacing the
    /// current one. Last writer wins.
    pub async fn assign(
        &self,
        actor: &Actor,
        student_user_id: Uuid,
        cohort: Cohort,
        ctx: Option<&RequestContext>,
    ) -> EesaResult<ReviewerAssignOutcome> {
        require(actor, Action::Add, ResourceType::Reviewer, None)?;
        let assigned_by = actor
            .user_id()
            .ok_or_else(|| EesaError::forbidden("authentication required"))?;

        let student = self.students.get(student_user_id).await?;
        if self.config.enforce_reviewer_cohort_match && student.cohort() != cohort {
            warn!(
                student_id = %student_user_id,
                student_cohort = %student.cohort(),
                %cohort,
                "Reviewer cohort mismatch"
            );
            return Err(WorkflowError::CohortMismatch {
                expected: cohort.to_string(),
                actual: student.cohort().to_string(),
            }
            .into());
        }

        let outcome = self
            .reviewers
            .assign(
                CreateReviewerAssignment {
                    student_id: student_user_id,
                    cohort,
                    assigned_by,
                },
                AuditDraft::for_actor(actor, AuditAction::Create, ctx),
            )
            .await?;
        info!(
            %cohort,
            student_id = %student_user_id,
            displaced = outcome.displaced.is_some(),
            "Reviewer assignment recorded"
        );
        Ok(outcome)
    }

    /// Deactivate an assignment, keeping it as history. Already inactive
    /// assignments are returned unchanged.
    pub async fn deactivate(
        &self,
        actor: &Actor,
        id: Uuid,
        ctx: Option<&RequestContext>,
    ) -> EesaResult<ReviewerAssignment> {
        require(actor, Action::Change, ResourceType::Reviewer, None)?;
        let assignment = self
            .reviewers
            .deactivate(id, AuditDraft::for_actor(actor, AuditAction::Deactivate, ctx))
            .await?;
        info!(%id, cohort = %assignment.cohort, "Reviewer deactivated");
        Ok(assignment)
    }

    pub async fn active_for_cohort(&self, cohort: Cohort) -> EesaResult<Option<ReviewerAssignment>> {
        self.reviewers.active_for_cohort(cohort).await
    }

    pub async fn list_active(&self) -> EesaResult<Vec<ReviewerAssignment>> {
        self.reviewers.list_active().await
    }

    pub async fn active_cohorts_for(&self, student_user_id: Uuid) -> EesaResult<Vec<Cohort>> {
        self.reviewers.active_cohorts_for(student_user_id).await
    }

    pub async fn history_for_cohort(&self, cohort: Cohort) -> EesaResult<Vec<ReviewerAssignment>> {
        self.reviewers.history_for_cohort(cohort).await
    }
}
