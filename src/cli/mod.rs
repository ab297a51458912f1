use clap::{Args, Parser, Subcommand};

pub mod commands;

#[derive(Parser)]
#[command(name = "mantentask")]
#[command(version)]
#[command(about = "Maintenance ticketing: requests, engineer assignment and reports")]
#[command(long_about = "MantenTask tracks machines, maintenance requests and the reports written \
                       once the work is done. Every command that changes data acts on behalf of \
                       the user given with --actor. Start with 'mantentask init' and 'mantentask seed'.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// The acting user for commands that read or change tickets
#[derive(Args, Debug, Clone, Copy)]
pub struct ActorArg {
    /// Id of the user performing the operation
    #[arg(long, help = "User id the operation is performed as")]
    pub actor: i64,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default configuration and prepare the data directories and database
    Init {
        /// Overwrite an existing mantentask.toml
        #[arg(long, help = "Overwrite an existing configuration file")]
        force: bool,
        /// Show what would be created without making changes
        #[arg(long, help = "Show what would be created without making changes")]
        dry_run: bool,
    },
    /// Load sample branches, users, machines, requests and reports into an empty database
    Seed,
    /// Create, move, assign and inspect maintenance requests
    #[command(subcommand)]
    Request(RequestCommand),
    /// Write, render and deliver maintenance reports
    #[command(subcommand)]
    Report(ReportCommand),
    /// Machine registry operations
    #[command(subcommand)]
    Machine(MachineCommand),
    /// Administrator dashboard and user management
    #[command(subcommand)]
    Admin(AdminCommand),
    /// List users by role
    #[command(subcommand)]
    Users(UsersCommand),
    /// Print the permission rule table
    Policy,
}

#[derive(Subcommand)]
pub enum RequestCommand {
    /// Open a new request for a machine
    Create {
        #[command(flatten)]
        actor: ActorArg,
        #[arg(long, help = "Machine the request is about")]
        machine: i64,
        #[arg(long, help = "What is wrong with the machine")]
        description: String,
        #[arg(long, help = "Planned service date (YYYY-MM-DD)")]
        scheduled: Option<chrono::NaiveDate>,
    },
    /// Move a request to another state (1 pending, 2 in progress, 3 completed)
    State {
        #[command(flatten)]
        actor: ActorArg,
        #[arg(long, help = "Request id")]
        request: i64,
        #[arg(long, help = "Target state code: 1, 2 or 3")]
        to: i64,
    },
    /// Assign an active engineer to a request
    Assign {
        #[command(flatten)]
        actor: ActorArg,
        #[arg(long, help = "Request id")]
        request: i64,
        #[arg(long, help = "User id of the engineer")]
        engineer: i64,
    },
    /// List requests, newest first
    List {
        /// Only pending and in-progress requests
        #[arg(long, conflicts_with = "completed", help = "Only pending and in-progress requests")]
        open: bool,
        /// Only completed requests
        #[arg(long, help = "Only completed requests")]
        completed: bool,
        #[arg(long, help = "Only requests for this machine")]
        machine: Option<i64>,
        #[arg(long, help = "Only requests assigned to this engineer")]
        engineer: Option<i64>,
        #[arg(long, help = "Case-insensitive text to look for in descriptions")]
        search: Option<String>,
    },
    /// Show one request
    Show {
        #[arg(long, help = "Request id")]
        request: i64,
    },
}

#[derive(Subcommand)]
pub enum ReportCommand {
    /// Write the report for a request and render its PDF
    Create {
        #[command(flatten)]
        actor: ActorArg,
        #[arg(long, help = "Request id")]
        request: i64,
        #[arg(long, help = "Summary of the intervention")]
        description: String,
        #[arg(long, help = "Work carried out")]
        work_performed: Option<String>,
        #[arg(long, help = "Parts that were replaced")]
        parts_replaced: Option<String>,
        #[arg(long, help = "Follow-up recommendations")]
        recommendations: Option<String>,
    },
    /// Render the PDF for an existing report again
    Regenerate {
        #[command(flatten)]
        actor: ActorArg,
        #[arg(long, help = "Request id")]
        request: i64,
    },
    /// Email the report PDF
    Email {
        #[command(flatten)]
        actor: ActorArg,
        #[arg(long, help = "Request id")]
        request: i64,
        #[arg(long, help = "Recipient email address")]
        to: String,
    },
    /// Show the report for a request
    Show {
        #[arg(long, help = "Request id")]
        request: i64,
    },
    /// List reports, newest first
    List {
        #[arg(long, help = "Only reports about this machine")]
        machine: Option<i64>,
        #[arg(long, help = "Only reports written by this user")]
        author: Option<i64>,
    },
}

#[derive(Subcommand)]
pub enum MachineCommand {
    /// List registered machines
    List {
        #[arg(long, help = "Only machines at this branch")]
        branch: Option<i64>,
        #[arg(long, help = "Only machines of this brand (case-insensitive)")]
        brand: Option<String>,
        #[arg(long, help = "Text to look for in model or brand")]
        search: Option<String>,
    },
    /// Record that maintenance was performed today
    Maintained {
        #[command(flatten)]
        actor: ActorArg,
        #[arg(long, help = "Machine id")]
        machine: i64,
    },
}

#[derive(Subcommand)]
pub enum AdminCommand {
    /// Record totals and per-state request counts
    Stats {
        #[command(flatten)]
        actor: ActorArg,
    },
    /// Change a user's access level (1 basic .. 4 administrator)
    SetLevel {
        #[command(flatten)]
        actor: ActorArg,
        #[arg(long, help = "User id to change")]
        user: i64,
        #[arg(long, help = "Access level code 1-4")]
        level: i64,
    },
    /// Change a user's role (1 engineer, 2 supervisor)
    SetRole {
        #[command(flatten)]
        actor: ActorArg,
        #[arg(long, help = "User id to change")]
        user: i64,
        #[arg(long, help = "Role code 1-2")]
        role: i64,
    },
    /// Activate or deactivate a user
    ToggleActive {
        #[command(flatten)]
        actor: ActorArg,
        #[arg(long, help = "User id to change")]
        user: i64,
    },
}

#[derive(Subcommand)]
pub enum UsersCommand {
    /// Users with the engineer role
    Engineers,
    /// Users with the supervisor role
    Supervisors,
}
