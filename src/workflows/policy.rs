// Permission policy: a first-match rule table over (role, access level, action)

use serde::Serialize;

use crate::domain::{AccessLevel, Role, User};

/// Operations subject to permission checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    CreateRequest,
    ChangeState,
    AssignEngineer,
    CreateReport,
    RegenerateDocument,
    EmailReport,
    RecordMaintenance,
    ViewDashboard,
    ManageUsers,
}

impl Action {
    pub const ALL: [Action; 9] = [
        Action::CreateRequest,
        Action::ChangeState,
        Action::AssignEngineer,
        Action::CreateReport,
        Action::RegenerateDocument,
        Action::EmailReport,
        Action::RecordMaintenance,
        Action::ViewDashboard,
        Action::ManageUsers,
    ];
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CreateRequest => write!(f, "create requests"),
            Self::ChangeState => write!(f, "change request state"),
            Self::AssignEngineer => write!(f, "assign engineers"),
            Self::CreateReport => write!(f, "create reports"),
            Self::RegenerateDocument => write!(f, "regenerate report documents"),
            Self::EmailReport => write!(f, "email reports"),
            Self::RecordMaintenance => write!(f, "record machine maintenance"),
            Self::ViewDashboard => write!(f, "view the administration dashboard"),
            Self::ManageUsers => write!(f, "manage users"),
        }
    }
}

/// Outcome of a policy lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allow,
    /// Allowed only on requests assigned to the actor, and never backwards
    AssignedForwardOnly,
    Deny,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleMatch {
    Any,
    Is(Role),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelMatch {
    Any,
    Is(AccessLevel),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionMatch {
    Any,
    Is(Action),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PolicyRule {
    pub id: &'static str,
    pub role: RoleMatch,
    pub level: LevelMatch,
    pub action: ActionMatch,
    pub decision: Decision,
}

impl PolicyRule {
    fn matches(&self, actor: &User, action: Action) -> bool {
        let role = match self.role {
            RoleMatch::Any => true,
            RoleMatch::Is(role) => actor.role == role,
        };
        let level = match self.level {
            LevelMatch::Any => true,
            LevelMatch::Is(level) => actor.access_level == level,
        };
        let action = match self.action {
            ActionMatch::Any => true,
            ActionMatch::Is(expected) => expected == action,
        };
        role && level && action
    }
}

const POLICY_RULES: &[PolicyRule] = &[
    PolicyRule {
        id: "admin.all",
        role: RoleMatch::Any,
        level: LevelMatch::Is(AccessLevel::Administrator),
        action: ActionMatch::Any,
        decision: Decision::Allow,
    },
    PolicyRule {
        id: "supervisor.change_state",
        role: RoleMatch::Is(Role::Supervisor),
        level: LevelMatch::Any,
        action: ActionMatch::Is(Action::ChangeState),
        decision: Decision::Allow,
    },
    PolicyRule {
        id: "supervisor.assign_engineer",
        role: RoleMatch::Is(Role::Supervisor),
        level: LevelMatch::Any,
        action: ActionMatch::Is(Action::AssignEngineer),
        decision: Decision::Allow,
    },
    PolicyRule {
        id: "engineer.change_state.assigned_forward",
        role: RoleMatch::Is(Role::Engineer),
        level: LevelMatch::Any,
        action: ActionMatch::Is(Action::ChangeState),
        decision: Decision::AssignedForwardOnly,
    },
    PolicyRule {
        id: "engineer.create_report",
        role: RoleMatch::Is(Role::Engineer),
        level: LevelMatch::Any,
        action: ActionMatch::Is(Action::CreateReport),
        decision: Decision::Allow,
    },
    PolicyRule {
        id: "any.create_request",
        role: RoleMatch::Any,
        level: LevelMatch::Any,
        action: ActionMatch::Is(Action::CreateRequest),
        decision: Decision::Allow,
    },
    PolicyRule {
        id: "any.regenerate_document",
        role: RoleMatch::Any,
        level: LevelMatch::Any,
        action: ActionMatch::Is(Action::RegenerateDocument),
        decision: Decision::Allow,
    },
    PolicyRule {
        id: "any.email_report",
        role: RoleMatch::Any,
        level: LevelMatch::Any,
        action: ActionMatch::Is(Action::EmailReport),
        decision: Decision::Allow,
    },
    PolicyRule {
        id: "any.record_maintenance",
        role: RoleMatch::Any,
        level: LevelMatch::Any,
        action: ActionMatch::Is(Action::RecordMaintenance),
        decision: Decision::Allow,
    },
];

/// The ordered rule table. Lookups stop at the first matching rule.
pub fn policy_rules() -> &'static [PolicyRule] {
    POLICY_RULES
}

/// Decide what `actor` may do. Inactive users are denied everything;
/// anything no rule covers is denied.
pub fn decide(actor: &User, action: Action) -> Decision {
    if !actor.active {
        return Decision::Deny;
    }
    POLICY_RULES
        .iter()
        .find(|rule| rule.matches(actor, action))
        .map(|rule| rule.decision)
        .unwrap_or(Decision::Deny)
}
