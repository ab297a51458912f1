use anyhow::Result;

use super::{print_json, AppContext};
use crate::cli::RequestCommand;
use crate::store::RequestFilter;

fn list_filter(
    open: bool,
    completed: bool,
    machine: Option<i64>,
    engineer: Option<i64>,
    search: Option<String>,
) -> RequestFilter {
    let base = if open {
        RequestFilter::open()
    } else if completed {
        RequestFilter::completed()
    } else {
        RequestFilter::default()
    };
    RequestFilter {
        machine_id: machine,
        assigned_engineer: engineer,
        search,
        ..base
    }
}

pub async fn execute(command: RequestCommand, context: &AppContext) -> Result<()> {
    match command {
        RequestCommand::Create {
            actor,
            machine,
            description,
            scheduled,
        } => {
            let actor = context.actor(actor.actor).await?;
            let request = context
                .workflow
                .create_request(&actor, machine, &description, scheduled)
                .await?;
            print_json(&request)
        }
        RequestCommand::State { actor, request, to } => {
            let actor = context.actor(actor.actor).await?;
            let updated = context.workflow.change_state(request, &actor, to).await?;
            print_json(&updated)
        }
        RequestCommand::Assign {
            actor,
            request,
            engineer,
        } => {
            let actor = context.actor(actor.actor).await?;
            let updated = context
                .workflow
                .assign_engineer(request, &actor, engineer)
                .await?;
            print_json(&updated)
        }
        RequestCommand::List {
            open,
            completed,
            machine,
            engineer,
            search,
        } => {
            let filter = list_filter(open, completed, machine, engineer, search);
            let requests = context.workflow.list_requests(&filter).await?;
            print_json(&requests)
        }
        RequestCommand::Show { request } => {
            let request = context.workflow.get_request(request).await?;
            print_json(&request)
        }
    }
}
