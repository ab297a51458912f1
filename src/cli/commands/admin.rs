use anyhow::Result;
use serde_json::json;

use super::{print_json, AppContext};
use crate::cli::AdminCommand;

pub async fn execute(command: AdminCommand, context: &AppContext) -> Result<()> {
    match command {
        AdminCommand::Stats { actor } => {
            let actor = context.actor(actor.actor).await?;
            let stats = context.admin.dashboard(&actor).await?;
            print_json(&stats)
        }
        AdminCommand::SetLevel { actor, user, level } => {
            let actor = context.actor(actor.actor).await?;
            let user = context.admin.set_access_level(&actor, user, level).await?;
            print_json(&user)
        }
        AdminCommand::SetRole { actor, user, role } => {
            let actor = context.actor(actor.actor).await?;
            let user = context.admin.set_role(&actor, user, role).await?;
            print_json(&user)
        }
        AdminCommand::ToggleActive { actor, user } => {
            let actor = context.actor(actor.actor).await?;
            let active = context.admin.toggle_active(&actor, user).await?;
            print_json(&json!({ "user_id": user, "active": active }))
        }
    }
}
