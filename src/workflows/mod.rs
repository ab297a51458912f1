// Ticket workflow core
//
// Every mutation takes the acting user explicitly and is checked against the
// policy table before touching the store.

pub mod assignment;
pub mod errors;
pub mod maintenance;
pub mod policy;
pub mod reports;
pub mod state_machine;


pub use errors::{ErrorKind, WorkflowError};
pub use policy::{decide, policy_rules, Action, Decision, PolicyRule};
pub use state_machine::TicketWorkflow;
