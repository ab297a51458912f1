// Engineer assignment

use chrono::Utc;
use tracing::{info, Instrument};

use super::errors::WorkflowError;
use super::policy::Action;
use super::state_machine::TicketWorkflow;
use crate::domain::{Request, RequestId, User, UserId};
use crate::store::{Entity, StoreError};
use crate::telemetry::{create_workflow_span, generate_correlation_id};

impl TicketWorkflow {
    /// Assign `engineer_id` to a request. The state is left untouched and no
    /// notification is sent.
    pub async fn assign_engineer(
        &self,
        request_id: RequestId,
        actor: &User,
        engineer_id: UserId,
    ) -> Result<Request, WorkflowError> {
        let correlation_id = generate_correlation_id();
        let span = create_workflow_span(
            "assign_engineer",
            Some(request_id),
            Some(actor.id),
            Some(&correlation_id),
        );

        async move {
            self.authorize(actor, Action::AssignEngineer)?;

            let mut request = self.store.get_request(request_id).await?;
            let engineer = self.assignable_engineer(engineer_id).await?;

            request.assigned_engineer = Some(engineer.id);
            request.updated_at = Utc::now();
            let saved = self.store.save_request(&request).await?;
            info!(
                request_id,
                engineer_id = engineer.id,
                engineer = %engineer.username,
                "Engineer assigned"
            );
            Ok(saved)
        }
        .instrument(span)
        .await
    }

    /// Resolve a user that may hold an assignment: existing, active, engineer
    async fn assignable_engineer(&self, engineer_id: UserId) -> Result<User, WorkflowError> {
        let not_found = WorkflowError::NotFound {
            entity: Entity::Engineer,
            id: engineer_id,
        };
        match self.store.get_user(engineer_id).await {
            Ok(user) if user.is_assignable_engineer() => Ok(user),
            Ok(_) | Err(StoreError::NotFound { .. }) => Err(not_found),
            Err(e) => Err(e.into()),
        }
    }
}
