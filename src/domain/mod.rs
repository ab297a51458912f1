// Domain records: users, machines, requests and reports

pub mod types;

pub use types::{
    AccessLevel, Branch, BranchId, DocumentHandle, Machine, MachineId, NewMachine, NewRequest,
    NewUser, Report, ReportFields, Request, RequestId, RequestState, Role, User, UserId,
};
