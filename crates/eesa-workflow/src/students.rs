//! Student academic records.

use eesa_core::authz::{can, require};
use eesa_core::error::{EesaError, EesaResult};
use eesa_core::models::audit::{AuditAction, AuditDraft, RequestContext};
use eesa_core::models::permission::{Action, ResourceType};
use eesa_core::models::principal::Actor;
use eesa_core::models::student::{CreateStudent, Student, UpdateStudent};
use eesa_core::repository::StudentRepository;
use tracing::info;
use uuid::Uuid;

pub struct StudentService<S: StudentRepository> {
    students: S,
}

impl<S: StudentRepository> StudentService<S> {
    pub fn new(students: S) -> Self {
        Self { students }
    }

    /// Create the academic record for a user. Allowed with `add_student`
    /// or for the user's own record.
    pub async fn register_student(
        &self,
        actor: &Actor,
        input: CreateStudent,
        ctx: Option<&RequestContext>,
    ) -> EesaResult<Student> {
        let is_self = actor.user_id() == Some(input.user_id)
            && actor.principal().is_some_and(|p| p.user.is_active);
        if !is_self {
            require(actor, Action::Add, ResourceType::Student, None)?;
        }

        let student = self
            .students
            .create(input, AuditDraft::for_actor(actor, AuditAction::Create, ctx))
            .await?;
        info!(
            user_id = %student.user_id,
            cohort = %student.cohort(),
            year_of_study = student.year_of_study,
            "Student registered"
        );
        Ok(student)
    }

    /// Update a record; the year of study follows the semester.
    pub async fn update_student(
        &self,
        actor: &Actor,
        user_id: Uuid,
        input: UpdateStudent,
        ctx: Option<&RequestContext>,
    ) -> EesaResult<Student> {
        let current = self.students.get(user_id).await?;
        require(actor, Action::Change, ResourceType::Student, Some(&current))?;

        let student = self
            .students
            .update(user_id, input, AuditDraft::for_actor(actor, AuditAction::Update, ctx))
            .await?;
        info!(%user_id, semester = student.ongoing_semester, "Student updated");
        Ok(student)
    }

    pub async fn get(&self, actor: &Actor, user_id: Uuid) -> EesaResult<Student> {
        let student = self.students.get(user_id).await?;
        if actor.user_id() == Some(user_id) || can(actor, Action::View, ResourceType::Student, None) {
            return Ok(student);
        }
        Err(EesaError::forbidden("student records are visible to their owner and staff"))
    }
}
