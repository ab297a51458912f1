use anyhow::Result;

use super::{print_json, AppContext};
use crate::cli::MachineCommand;
use crate::store::MachineFilter;

pub async fn execute(command: MachineCommand, context: &AppContext) -> Result<()> {
    match command {
        MachineCommand::List {
            branch,
            brand,
            search,
        } => {
            let filter = MachineFilter {
                branch_id: branch,
                brand,
                search,
            };
            let machines = context.workflow.list_machines(&filter).await?;
            print_json(&machines)
        }
        MachineCommand::Maintained { actor, machine } => {
            let actor = context.actor(actor.actor).await?;
            let machine = context.workflow.record_maintenance(&actor, machine).await?;
            print_json(&machine)
        }
    }
}
