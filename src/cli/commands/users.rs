use anyhow::Result;

use super::{print_json, AppContext};
use crate::cli::UsersCommand;

pub async fn execute(command: UsersCommand, context: &AppContext) -> Result<()> {
    let users = match command {
        UsersCommand::Engineers => context.workflow.engineers().await?,
        UsersCommand::Supervisors => context.workflow.supervisors().await?,
    };
    print_json(&users)
}
