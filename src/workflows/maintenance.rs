// Machine upkeep and the machine catalog

use chrono::Utc;
use tracing::{info, Instrument};

use super::errors::WorkflowError;
use super::policy::Action;
use super::state_machine::TicketWorkflow;
use crate::domain::{Machine, MachineId, User};
use crate::store::MachineFilter;
use crate::telemetry::{create_workflow_span, generate_correlation_id};

impl TicketWorkflow {
    /// Stamp today's date as the machine's last maintenance
    pub async fn record_maintenance(
        &self,
        actor: &User,
        machine_id: MachineId,
    ) -> Result<Machine, WorkflowError> {
        let correlation_id = generate_correlation_id();
        let span = create_workflow_span(
            "record_maintenance",
            None,
            Some(actor.id),
            Some(&correlation_id),
        );

        async move {
            self.authorize(actor, Action::RecordMaintenance)?;

            let mut machine = self.store.get_machine(machine_id).await?;
            let today = Utc::now().date_naive();
            machine.last_maintenance_on = Some(today);
            self.store.save_machine(&machine).await?;

            info!(machine_id, actor_id = actor.id, %today, "Maintenance recorded");
            Ok(machine)
        }
        .instrument(span)
        .await
    }

    /// Machines by branch, brand or a model/brand search
    pub async fn list_machines(&self, filter: &MachineFilter) -> Result<Vec<Machine>, WorkflowError> {
        Ok(self.store.list_machines(filter).await?)
    }
}
