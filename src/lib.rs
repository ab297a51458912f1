// MantenTask Library - maintenance ticketing core
// Exposes the workflow, its collaborators and the CLI for the binary and tests

pub mod admin;
pub mod cli;
pub mod config;
#[cfg(feature = "database")]
pub mod database;
pub mod documents;
pub mod domain;
pub mod fs;
pub mod notifications;
pub mod store;
pub mod telemetry;
pub mod workflows;

// Re-export key types for easy access
pub use admin::AdminService;
pub use config::{config, MantenTaskConfig};
#[cfg(feature = "database")]
pub use database::{DatabaseManager, SqliteTicketStore};
pub use documents::{DocumentError, PdfReportGenerator, ReportContext, ReportGenerator};
pub use domain::{
    AccessLevel, Branch, DocumentHandle, Machine, Report, ReportFields, Request, RequestState,
    Role, User,
};
pub use notifications::{
    dispatcher_from_config, DisabledNotifier, EmailNotifier, NotificationDispatcher,
    NotificationError,
};
pub use store::{
    MachineFilter, MemoryTicketStore, ReportFilter, RequestFilter, StoreError, TicketStore,
    UserFilter,
};
pub use telemetry::{create_workflow_span, generate_correlation_id, init_telemetry};
pub use workflows::{Action, Decision, ErrorKind, TicketWorkflow, WorkflowError};
