// Core records of the maintenance ticketing domain

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub type UserId = i64;
pub type BranchId = i64;
pub type MachineId = i64;
pub type RequestId = i64;

/// Lifecycle state of a maintenance request.
///
/// The numeric codes are part of the storage and wire format and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    Pending,
    InProgress,
    Completed,
    /// Present in the catalog but never reachable through `change_state`
    Cancelled,
}

impl RequestState {
    pub const ALL: [RequestState; 4] = [
        RequestState::Pending,
        RequestState::InProgress,
        RequestState::Completed,
        RequestState::Cancelled,
    ];

    pub fn code(self) -> i64 {
        match self {
            RequestState::Pending => 1,
            RequestState::InProgress => 2,
            RequestState::Completed => 3,
            RequestState::Cancelled => 4,
        }
    }

    /// Decode any catalog value, including `Cancelled`
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(RequestState::Pending),
            2 => Some(RequestState::InProgress),
            3 => Some(RequestState::Completed),
            4 => Some(RequestState::Cancelled),
            _ => None,
        }
    }

    /// Decode a value accepted as a transition target. Only 1..=3 qualify.
    pub fn transition_target(code: i64) -> Option<Self> {
        match Self::from_code(code)? {
            RequestState::Cancelled => None,
            state => Some(state),
        }
    }

    /// Catalog display name
    pub fn label(self) -> &'static str {
        match self {
            RequestState::Pending => "Pendiente",
            RequestState::InProgress => "En Proceso",
            RequestState::Completed => "Completado",
            RequestState::Cancelled => "Cancelado",
        }
    }

    pub fn is_open(self) -> bool {
        matches!(self, RequestState::Pending | RequestState::InProgress)
    }
}

impl std::fmt::Display for RequestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in-progress"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Functional role of a user, independent of access level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Engineer,
    /// "Encargado": the person responsible for a site's machines
    Supervisor,
}

impl Role {
    pub fn code(self) -> i64 {
        match self {
            Role::Engineer => 1,
            Role::Supervisor => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Role::Engineer),
            2 => Some(Role::Supervisor),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Role::Engineer => "Ingeniero",
            Role::Supervisor => "Encargado",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Engineer => write!(f, "engineer"),
            Self::Supervisor => write!(f, "supervisor"),
        }
    }
}

/// Access level, ordered from least to most privileged
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    Basic,
    Intermediate,
    Advanced,
    Administrator,
}

impl AccessLevel {
    pub fn code(self) -> i64 {
        match self {
            AccessLevel::Basic => 1,
            AccessLevel::Intermediate => 2,
            AccessLevel::Advanced => 3,
            AccessLevel::Administrator => 4,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(AccessLevel::Basic),
            2 => Some(AccessLevel::Intermediate),
            3 => Some(AccessLevel::Advanced),
            4 => Some(AccessLevel::Administrator),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AccessLevel::Basic => "Básico",
            AccessLevel::Intermediate => "Intermedio",
            AccessLevel::Advanced => "Avanzado",
            AccessLevel::Administrator => "Administrador",
        }
    }
}

impl std::fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Basic => write!(f, "basic"),
            Self::Intermediate => write!(f, "intermediate"),
            Self::Advanced => write!(f, "advanced"),
            Self::Administrator => write!(f, "administrator"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub id: BranchId,
    pub name: String,
}

/// A system user. Every workflow call receives one of these as its actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub first_name: String,
    pub paternal_surname: String,
    pub maternal_surname: String,
    pub email: String,
    pub phone: Option<String>,
    pub branch_id: Option<BranchId>,
    pub role: Role,
    pub access_level: AccessLevel,
    pub active: bool,
    pub joined_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!(
            "{} {} {}",
            self.first_name, self.paternal_surname, self.maternal_surname
        )
    }

    /// Administrator status depends on access level alone, never on role
    pub fn is_admin(&self) -> bool {
        self.access_level == AccessLevel::Administrator
    }

    pub fn is_supervisor(&self) -> bool {
        self.role == Role::Supervisor
    }

    pub fn is_engineer(&self) -> bool {
        self.role == Role::Engineer
    }

    /// Whether this user may hold an engineer assignment
    pub fn is_assignable_engineer(&self) -> bool {
        self.is_engineer() && self.active
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {
    pub id: MachineId,
    pub branch_id: BranchId,
    pub model: String,
    pub brand: String,
    pub serial_number: Option<String>,
    pub purchased_on: NaiveDate,
    pub installed_on: NaiveDate,
    pub last_maintenance_on: Option<NaiveDate>,
}

impl Machine {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.brand, self.model)
    }
}

/// A maintenance request ("solicitud")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    pub machine_id: MachineId,
    pub created_by: UserId,
    pub description: String,
    pub scheduled_for: Option<NaiveDate>,
    pub state: RequestState,
    pub assigned_engineer: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency token, bumped by every successful save
    pub version: i64,
}

impl Request {
    pub fn is_assigned_to(&self, user: UserId) -> bool {
        self.assigned_engineer == Some(user)
    }
}

/// Reference to a generated report document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentHandle {
    pub location: String,
    pub generated_at: DateTime<Utc>,
}

/// Free-text content supplied by the engineer writing a report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportFields {
    pub description: String,
    pub work_performed: Option<String>,
    pub parts_replaced: Option<String>,
    pub recommendations: Option<String>,
}

/// A maintenance report ("informe"), keyed by the request it documents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub request_id: RequestId,
    pub machine_id: MachineId,
    pub author_id: UserId,
    pub fields: ReportFields,
    pub created_at: DateTime<Utc>,
    pub document: Option<DocumentHandle>,
}

/// Input for a new request, before the store assigns an id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRequest {
    pub machine_id: MachineId,
    pub created_by: UserId,
    pub description: String,
    pub scheduled_for: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub first_name: String,
    pub paternal_surname: String,
    pub maternal_surname: String,
    pub email: String,
    pub phone: Option<String>,
    pub branch_id: Option<BranchId>,
    pub role: Role,
    pub access_level: AccessLevel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMachine {
    pub branch_id: BranchId,
    pub model: String,
    pub brand: String,
    pub serial_number: Option<String>,
    pub purchased_on: NaiveDate,
    pub installed_on: NaiveDate,
    pub last_maintenance_on: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_codes_are_stable() {
        for state in RequestState::ALL {
            assert_eq!(RequestState::from_code(state.code()), Some(state));
        }
        assert_eq!(RequestState::Pending.code(), 1);
        assert_eq!(RequestState::InProgress.code(), 2);
        assert_eq!(RequestState::Completed.code(), 3);
        assert_eq!(RequestState::Cancelled.code(), 4);
        assert_eq!(RequestState::from_code(0), None);
    }

    #[test]
    fn cancelled_is_not_a_transition_target() {
        assert_eq!(RequestState::transition_target(3), Some(RequestState::Completed));
        assert_eq!(RequestState::transition_target(4), None);
        assert_eq!(RequestState::transition_target(-1), None);
    }

    #[test]
    fn access_levels_are_ordered() {
        assert!(AccessLevel::Basic < AccessLevel::Intermediate);
        assert!(AccessLevel::Advanced < AccessLevel::Administrator);
        assert_eq!(AccessLevel::from_code(4), Some(AccessLevel::Administrator));
        assert_eq!(AccessLevel::from_code(5), None);
        assert_eq!(Role::from_code(2), Some(Role::Supervisor));
        assert_eq!(Role::from_code(3), None);
    }
}
