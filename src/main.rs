use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;

use mantentask::cli::commands::{dispatch, init::InitCommand, show_how_to_get_started, AppContext};
use mantentask::cli::{Cli, Commands};
use mantentask::{config, init_telemetry, WorkflowError};

/// Exit status for rejected workflow operations, distinct from crashes (1)
const WORKFLOW_REJECTED: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => match e.downcast_ref::<WorkflowError>() {
            Some(workflow_error) => {
                eprintln!("error[{}]: {}", workflow_error.kind(), workflow_error);
                ExitCode::from(WORKFLOW_REJECTED)
            }
            None => {
                eprintln!("error: {e:#}");
                ExitCode::FAILURE
            }
        },
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = config()?;
    if let Err(e) = init_telemetry(&config.observability) {
        eprintln!("warning: logging not initialized: {e}");
    }

    let Some(command) = cli.command else {
        return show_how_to_get_started();
    };

    if let Commands::Init { force, dry_run } = command {
        return InitCommand::new(force, dry_run).execute(config).await;
    }

    let context = AppContext::from_config(config).await?;
    let result = dispatch(command, &context).await;
    context.shutdown().await;
    result
}
