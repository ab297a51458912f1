// Request lifecycle: creation, state transitions and queries

use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

use super::errors::WorkflowError;
use super::policy::{self, Action, Decision};
use crate::documents::ReportGenerator;
use crate::domain::{MachineId, NewRequest, Request, RequestId, RequestState, Role, User};
use crate::notifications::NotificationDispatcher;
use crate::store::{RequestFilter, TicketStore, UserFilter};
use crate::telemetry::{create_workflow_span, generate_correlation_id};

/// Entry point for every ticket mutation.
///
/// Each operation takes the acting user explicitly, consults the policy
/// table, performs one read-modify-write against the store and then calls
/// out to the notification and document collaborators.
pub struct TicketWorkflow {
    pub(super) store: Arc<dyn TicketStore>,
    pub(super) notifier: Arc<dyn NotificationDispatcher>,
    pub(super) documents: Arc<dyn ReportGenerator>,
}

impl TicketWorkflow {
    pub fn new(
        store: Arc<dyn TicketStore>,
        notifier: Arc<dyn NotificationDispatcher>,
        documents: Arc<dyn ReportGenerator>,
    ) -> Self {
        Self {
            store,
            notifier,
            documents,
        }
    }

    pub fn store(&self) -> &Arc<dyn TicketStore> {
        &self.store
    }

    /// Look up `action` for `actor`, turning a denial into `Forbidden`
    pub(super) fn authorize(&self, actor: &User, action: Action) -> Result<Decision, WorkflowError> {
        match policy::decide(actor, action) {
            Decision::Deny => {
                debug!(actor_id = actor.id, %action, "Permission denied");
                Err(WorkflowError::Forbidden {
                    actor_id: actor.id,
                    action,
                })
            }
            decision => Ok(decision),
        }
    }

    /// Open a new request in the Pending state on behalf of `actor`
    pub async fn create_request(
        &self,
        actor: &User,
        machine_id: MachineId,
        description: &str,
        scheduled_for: Option<NaiveDate>,
    ) -> Result<Request, WorkflowError> {
        let correlation_id = generate_correlation_id();
        let span = create_workflow_span("create_request", None, Some(actor.id), Some(&correlation_id));

        async move {
            self.authorize(actor, Action::CreateRequest)?;

            let description = description.trim();
            if description.is_empty() {
                return Err(WorkflowError::invalid_input(
                    "description",
                    "must not be blank",
                ));
            }
            self.store.get_machine(machine_id).await?;

            let request = self
                .store
                .insert_request(NewRequest {
                    machine_id,
                    created_by: actor.id,
                    description: description.to_string(),
                    scheduled_for,
                    created_at: Utc::now(),
                })
                .await?;
            info!(request_id = request.id, machine_id, "Request created");

            if let Err(e) = self.notifier.notify_new_request(&request).await {
                warn!(request_id = request.id, error = %e, "New-request notification failed");
            }

            Ok(request)
        }
        .instrument(span)
        .await
    }

    /// Move a request to the state encoded by `target_code`.
    ///
    /// Administrators and supervisors may move between any of the three
    /// workflow states. Engineers may only advance requests assigned to them.
    /// Re-applying the current state is accepted and refreshes `updated_at`.
    pub async fn change_state(
        &self,
        request_id: RequestId,
        actor: &User,
        target_code: i64,
    ) -> Result<Request, WorkflowError> {
        let correlation_id = generate_correlation_id();
        let span = create_workflow_span(
            "change_state",
            Some(request_id),
            Some(actor.id),
            Some(&correlation_id),
        );

        async move {
            let target = RequestState::transition_target(target_code)
                .ok_or(WorkflowError::InvalidState { code: target_code })?;

            let decision = self.authorize(actor, Action::ChangeState)?;
            let mut request = self.store.get_request(request_id).await?;
            let previous = request.state;

            if decision == Decision::AssignedForwardOnly {
                if !request.is_assigned_to(actor.id) {
                    return Err(WorkflowError::Forbidden {
                        actor_id: actor.id,
                        action: Action::ChangeState,
                    });
                }
                if target.code() < previous.code() {
                    return Err(WorkflowError::IllegalRegression {
                        request_id,
                        from: previous,
                        to: target,
                    });
                }
            }

            request.state = target;
            request.updated_at = Utc::now();
            let saved = self.store.save_request(&request).await?;
            info!(
                request_id,
                from = %previous,
                to = %target,
                version = saved.version,
                "Request state changed"
            );

            if previous != target {
                if let Err(e) = self.notifier.notify_state_change(&saved, previous).await {
                    warn!(request_id, error = %e, "State-change notification failed");
                }
            }

            Ok(saved)
        }
        .instrument(span)
        .await
    }

    pub async fn get_request(&self, request_id: RequestId) -> Result<Request, WorkflowError> {
        Ok(self.store.get_request(request_id).await?)
    }

    /// Requests matching `filter`, newest first
    pub async fn list_requests(&self, filter: &RequestFilter) -> Result<Vec<Request>, WorkflowError> {
        Ok(self.store.list_requests(filter).await?)
    }

    pub async fn open_requests(&self) -> Result<Vec<Request>, WorkflowError> {
        self.list_requests(&RequestFilter::open()).await
    }

    pub async fn completed_requests(&self) -> Result<Vec<Request>, WorkflowError> {
        self.list_requests(&RequestFilter::completed()).await
    }

    pub async fn engineers(&self) -> Result<Vec<User>, WorkflowError> {
        Ok(self
            .store
            .list_users(&UserFilter {
                role: Some(Role::Engineer),
                active: None,
            })
            .await?)
    }

    pub async fn supervisors(&self) -> Result<Vec<User>, WorkflowError> {
        Ok(self
            .store
            .list_users(&UserFilter {
                role: Some(Role::Supervisor),
                active: None,
            })
            .await?)
    }
}
