/// Ticket store abstraction
///
/// The workflow never talks to a database directly. Everything it reads or
/// writes goes through [`TicketStore`], which keeps the permission and
/// transition rules testable against [`MemoryTicketStore`] or a `mockall`
/// double, while production uses the SQLite implementation in
/// [`crate::database`].
///
/// # Concurrency
///
/// Requests carry a `version` counter. [`TicketStore::save_request`] only
/// writes when the stored version still equals the version on the record
/// being saved, so two writers racing on the same stale snapshot cannot both
/// succeed. The loser receives [`StoreError::VersionConflict`].
use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{
    Branch, BranchId, DocumentHandle, Machine, MachineId, NewMachine, NewRequest, NewUser, Report,
    Request, RequestId, RequestState, Role, User, UserId,
};

pub mod memory;

pub use memory::MemoryTicketStore;

#[cfg(test)]
use mockall::automock;

/// Kinds of records held by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    Branch,
    User,
    /// An active user holding the engineer role
    Engineer,
    Machine,
    Request,
    Report,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Branch => write!(f, "branch"),
            Self::User => write!(f, "user"),
            Self::Engineer => write!(f, "active engineer"),
            Self::Machine => write!(f, "machine"),
            Self::Request => write!(f, "request"),
            Self::Report => write!(f, "report"),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: i64 },

    #[error("{entity} {id} already exists")]
    Duplicate { entity: Entity, id: i64 },

    #[error("request {request_id} was modified concurrently (expected version {expected})")]
    VersionConflict { request_id: RequestId, expected: i64 },

    #[error("stored data is invalid: {0}")]
    Corrupt(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(entity: Entity, id: i64) -> Self {
        StoreError::NotFound { entity, id }
    }
}

/// Predicate over requests. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestFilter {
    pub states: Vec<RequestState>,
    pub machine_id: Option<MachineId>,
    pub created_by: Option<UserId>,
    pub assigned_engineer: Option<UserId>,
    /// Case-insensitive substring of the description
    pub search: Option<String>,
}

impl RequestFilter {
    /// Pending and in-progress requests
    pub fn open() -> Self {
        Self {
            states: vec![RequestState::Pending, RequestState::InProgress],
            ..Default::default()
        }
    }

    pub fn completed() -> Self {
        Self {
            states: vec![RequestState::Completed],
            ..Default::default()
        }
    }

    pub fn matches(&self, request: &Request) -> bool {
        if !self.states.is_empty() && !self.states.contains(&request.state) {
            return false;
        }
        if self.machine_id.is_some_and(|id| id != request.machine_id) {
            return false;
        }
        if self.created_by.is_some_and(|id| id != request.created_by) {
            return false;
        }
        if self
            .assigned_engineer
            .is_some_and(|id| !request.is_assigned_to(id))
        {
            return false;
        }
        match &self.search {
            Some(needle) => request
                .description
                .to_lowercase()
                .contains(&needle.to_lowercase()),
            None => true,
        }
    }
}

/// Predicate over reports
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportFilter {
    pub machine_id: Option<MachineId>,
    pub author_id: Option<UserId>,
}

impl ReportFilter {
    pub fn matches(&self, report: &Report) -> bool {
        self.machine_id.map_or(true, |id| id == report.machine_id)
            && self.author_id.map_or(true, |id| id == report.author_id)
    }
}

/// Predicate over machines
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MachineFilter {
    pub branch_id: Option<BranchId>,
    /// Exact brand, ignoring case
    pub brand: Option<String>,
    /// Case-insensitive substring of model or brand
    pub search: Option<String>,
}

impl MachineFilter {
    pub fn matches(&self, machine: &Machine) -> bool {
        if self.branch_id.is_some_and(|id| id != machine.branch_id) {
            return false;
        }
        if let Some(brand) = &self.brand {
            if machine.brand.to_lowercase() != brand.to_lowercase() {
                return false;
            }
        }
        match &self.search {
            Some(needle) => {
                let needle = needle.to_lowercase();
                machine.model.to_lowercase().contains(&needle)
                    || machine.brand.to_lowercase().contains(&needle)
            }
            None => true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub active: Option<bool>,
}

impl UserFilter {
    pub fn active_with_role(role: Role) -> Self {
        Self {
            role: Some(role),
            active: Some(true),
        }
    }

    pub fn matches(&self, user: &User) -> bool {
        self.role.map_or(true, |role| role == user.role)
            && self.active.map_or(true, |active| active == user.active)
    }
}

/// Record counts for the administration dashboard
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct StoreStatistics {
    pub users: u64,
    pub requests: u64,
    pub machines: u64,
    pub branches: u64,
    pub pending_requests: u64,
    pub in_progress_requests: u64,
    pub completed_requests: u64,
}

/// Persistence interface consumed by the workflow
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn get_request(&self, id: RequestId) -> Result<Request, StoreError>;

    /// Persist a new request in the Pending state with version 0
    async fn insert_request(&self, request: NewRequest) -> Result<Request, StoreError>;

    /// Write back a modified request.
    ///
    /// Succeeds only if the stored version equals `request.version`; the
    /// returned record carries the incremented version.
    async fn save_request(&self, request: &Request) -> Result<Request, StoreError>;

    async fn list_requests(&self, filter: &RequestFilter) -> Result<Vec<Request>, StoreError>;

    async fn get_user(&self, id: UserId) -> Result<User, StoreError>;

    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError>;

    async fn save_user(&self, user: &User) -> Result<(), StoreError>;

    async fn list_users(&self, filter: &UserFilter) -> Result<Vec<User>, StoreError>;

    async fn get_branch(&self, id: BranchId) -> Result<Branch, StoreError>;

    async fn insert_branch(&self, name: &str) -> Result<Branch, StoreError>;

    async fn get_machine(&self, id: MachineId) -> Result<Machine, StoreError>;

    async fn insert_machine(&self, machine: NewMachine) -> Result<Machine, StoreError>;

    async fn save_machine(&self, machine: &Machine) -> Result<(), StoreError>;

    /// Machines matching `filter`, in id order
    async fn list_machines(&self, filter: &MachineFilter) -> Result<Vec<Machine>, StoreError>;

    /// Insert a report. Fails with [`StoreError::Duplicate`] when the request already has one.
    async fn save_report(&self, report: &Report) -> Result<(), StoreError>;

    async fn get_report(&self, request_id: RequestId) -> Result<Report, StoreError>;

    async fn report_exists_for(&self, request_id: RequestId) -> Result<bool, StoreError>;

    /// Reports matching `filter`, newest first
    async fn list_reports(&self, filter: &ReportFilter) -> Result<Vec<Report>, StoreError>;

    async fn attach_document(
        &self,
        request_id: RequestId,
        document: &DocumentHandle,
    ) -> Result<(), StoreError>;

    async fn statistics(&self) -> Result<StoreStatistics, StoreError>;
}
