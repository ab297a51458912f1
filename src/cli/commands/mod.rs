use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::Commands;
use crate::admin::AdminService;
use crate::config::MantenTaskConfig;
use crate::documents::PdfReportGenerator;
use crate::domain::User;
use crate::notifications::dispatcher_from_config;
use crate::store::{MemoryTicketStore, TicketStore};
use crate::workflows::{TicketWorkflow, WorkflowError};

#[cfg(feature = "database")]
use crate::database::DatabaseManager;

pub mod admin;
pub mod init;
pub mod machines;
pub mod policy;
pub mod reports;
pub mod requests;
pub mod seed;
pub mod users;

/// Everything a command needs, wired from configuration
pub struct AppContext {
    pub store: Arc<dyn TicketStore>,
    pub workflow: TicketWorkflow,
    pub admin: AdminService,
    #[cfg(feature = "database")]
    database: Option<DatabaseManager>,
}

impl AppContext {
    /// Build the store and collaborators selected by `config`
    pub async fn from_config(config: &MantenTaskConfig) -> Result<Self> {
        #[cfg(feature = "database")]
        if let Some(db_config) = &config.database {
            let manager = DatabaseManager::new(db_config).await?;
            let store: Arc<dyn TicketStore> = Arc::new(manager.ticket_store());
            let mut context = Self::with_store(config, store);
            context.database = Some(manager);
            return Ok(context);
        }

        warn!("No database configured; using a throwaway in-memory store");
        Ok(Self::with_store(config, Arc::new(MemoryTicketStore::new())))
    }

    pub fn with_store(config: &MantenTaskConfig, store: Arc<dyn TicketStore>) -> Self {
        let notifier = dispatcher_from_config(&config.notifications, store.clone());
        let documents = Arc::new(PdfReportGenerator::new(&config.documents.output_dir));
        Self {
            workflow: TicketWorkflow::new(store.clone(), notifier, documents),
            admin: AdminService::new(store.clone()),
            store,
            #[cfg(feature = "database")]
            database: None,
        }
    }

    /// Resolve the `--actor` id to a user record
    pub async fn actor(&self, id: i64) -> Result<User, WorkflowError> {
        Ok(self.store.get_user(id).await?)
    }

    pub async fn shutdown(&self) {
        #[cfg(feature = "database")]
        if let Some(manager) = &self.database {
            manager.shutdown().await;
        }
    }
}

/// Print a command result as pretty JSON on stdout
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Run every command except `init`, which prepares the context itself
pub async fn dispatch(command: Commands, context: &AppContext) -> Result<()> {
    match command {
        Commands::Init { .. } => {
            info!("init is handled before the application context is built");
            Ok(())
        }
        Commands::Seed => seed::SeedCommand::new().execute(context).await,
        Commands::Request(command) => requests::execute(command, context).await,
        Commands::Report(command) => reports::execute(command, context).await,
        Commands::Machine(command) => machines::execute(command, context).await,
        Commands::Admin(command) => admin::execute(command, context).await,
        Commands::Users(command) => users::execute(command, context).await,
        Commands::Policy => policy::execute(),
    }
}

pub fn show_how_to_get_started() -> Result<()> {
    println!("MantenTask - maintenance request tracking");
    println!();
    println!("To get started:");
    println!("  mantentask init                       # Write mantentask.toml and create the database");
    println!("  mantentask seed                       # Load sample users, machines and requests");
    println!("  mantentask users engineers            # Find user ids to act as");
    println!();
    println!("Day to day:");
    println!("  mantentask request list --open");
    println!("  mantentask request state --actor <id> --request <id> --to 2");
    println!("  mantentask report create --actor <id> --request <id> --description \"...\"");
    println!();
    println!("Run 'mantentask --help' for every command.");
    Ok(())
}
